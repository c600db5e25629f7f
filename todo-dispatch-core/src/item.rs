//! Item lifecycle controller
//!
//! One [`ItemController`] per list entry. It is the only writer of its item's
//! key, done flag and lifecycle state, reacts to bus events addressed to it,
//! validates key changes against the [`ListStore`](crate::ListStore), and
//! drives the enter/exit transitions of its node.
//!
//! ```text
//! Connecting --attach--> Live --remove--> Removing --exit transition--> Disposed
//! ```
//!
//! Every bus subscription an item makes is scoped to one cancellation token.
//! Removal cancels it before anything else happens, so a removed item never
//! reacts to a later event.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde::{Deserialize, Serialize};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info};

use crate::context::WidgetContext;
use crate::error::{HandlerError, TodoError};
use crate::event::{names, RenameTransaction, TodoEvent};
use crate::sync::lock;
use crate::transition::{flash, pause, TransitionGate};
use crate::view::{bool_attr, NodeHandle, NodeKind, VisualClass};

static NEXT_ITEM_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of an item, independent of its key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(u64);

impl ItemId {
    fn next() -> Self {
        Self(NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Created, not yet attached to the view
    Connecting,
    /// Attached and interactive
    Live,
    /// Exit transition started
    Removing,
    /// Exit transition finished, node detached
    Disposed,
}

impl LifecycleState {
    /// Live and Connecting items take part in key uniqueness.
    pub fn is_live(self) -> bool {
        matches!(self, LifecycleState::Connecting | LifecycleState::Live)
    }
}

/// Point-in-time copy of an item's attributes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub key: String,
    pub done: bool,
    pub state: LifecycleState,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ItemNodes {
    root: NodeHandle,
    checkbox: NodeHandle,
    label: NodeHandle,
}

#[derive(Debug)]
struct Attrs {
    key: String,
    done: bool,
    state: LifecycleState,
    nodes: Option<ItemNodes>,
}

/// Owns one item's attributes and lifecycle.
pub struct ItemController {
    id: ItemId,
    attrs: Mutex<Attrs>,
    cancel: CancellationToken,
    /// Cancels `cancel` when taken or when the controller is dropped
    scope: Mutex<Option<DropGuard>>,
    gate: TransitionGate,
    ctx: WidgetContext,
}

impl fmt::Debug for ItemController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let attrs = lock(&self.attrs);
        f.debug_struct("ItemController")
            .field("id", &self.id)
            .field("key", &attrs.key)
            .field("done", &attrs.done)
            .field("state", &attrs.state)
            .finish()
    }
}

/// Wrap an item handler so it only holds a weak reference to the item.
fn scoped<F>(
    item: &Weak<ItemController>,
    handler: F,
) -> impl Fn(&TodoEvent) -> Result<(), HandlerError> + Send + Sync + 'static
where
    F: Fn(&Arc<ItemController>, &TodoEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    let item = item.clone();
    move |event: &TodoEvent| match item.upgrade() {
        Some(item) => handler(&item, event),
        None => Ok(()),
    }
}

impl ItemController {
    /// Create an item in the `Connecting` state.
    pub fn new(key: impl Into<String>, ctx: WidgetContext) -> Arc<Self> {
        let cancel = CancellationToken::new();
        Arc::new(Self {
            id: ItemId::next(),
            attrs: Mutex::new(Attrs {
                key: key.into(),
                done: false,
                state: LifecycleState::Connecting,
                nodes: None,
            }),
            scope: Mutex::new(Some(cancel.clone().drop_guard())),
            cancel,
            gate: TransitionGate::new(),
            ctx,
        })
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn key(&self) -> String {
        lock(&self.attrs).key.clone()
    }

    pub fn done(&self) -> bool {
        lock(&self.attrs).done
    }

    pub fn state(&self) -> LifecycleState {
        lock(&self.attrs).state
    }

    pub fn is_live(&self) -> bool {
        self.state().is_live()
    }

    /// Root node, once attached
    pub fn node(&self) -> Option<NodeHandle> {
        lock(&self.attrs).nodes.map(|n| n.root)
    }

    pub fn snapshot(&self) -> Item {
        let attrs = lock(&self.attrs);
        Item {
            id: self.id,
            key: attrs.key.clone(),
            done: attrs.done,
            state: attrs.state,
        }
    }

    /// Token scoping this item's subscriptions
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Materialise the item, subscribe it to the bus and start the enter transition.
    ///
    /// Only the first attach of a `Connecting` item does anything.
    pub fn attach(self: &Arc<Self>) -> bool {
        let (key, done) = {
            let mut attrs = lock(&self.attrs);
            if attrs.state != LifecycleState::Connecting {
                return false;
            }
            attrs.state = LifecycleState::Live;
            (attrs.key.clone(), attrs.done)
        };

        let nodes = self.build_nodes(&key, done);
        lock(&self.attrs).nodes = Some(nodes);
        self.subscribe();

        info!(key = %key, item = ?self.id, "todo connected");
        self.ctx.toast(format!("connecting todo {key}"));
        self.enter(nodes.root);
        true
    }

    fn build_nodes(&self, key: &str, done: bool) -> ItemNodes {
        let view = &self.ctx.view;
        let up = view.build(NodeKind::Button, &[("label", "↑"), ("action", "up")], vec![]);
        let down = view.build(NodeKind::Button, &[("label", "↓"), ("action", "down")], vec![]);
        let checkbox = view.build(NodeKind::Checkbox, &[("checked", bool_attr(done))], vec![]);
        let label = view.build(NodeKind::Text, &[("text", key)], vec![]);
        let root = view.build(
            NodeKind::TodoItem,
            &[("text", key), ("done", bool_attr(done)), ("draggable", "true")],
            vec![up, down, checkbox, label],
        );
        ItemNodes {
            root,
            checkbox,
            label,
        }
    }

    fn subscribe(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let bus = &self.ctx.bus;
        let token = Some(&self.cancel);

        bus.on(
            names::ALL_CLEAR,
            token,
            scoped(&weak, |item, _| {
                item.remove();
                Ok(())
            }),
        );
        bus.on(
            names::REMOVE_CHECKED,
            token,
            scoped(&weak, |item, _| {
                debug!(key = %item.key(), done = item.done(), "removechecked");
                if item.done() {
                    item.remove();
                }
                Ok(())
            }),
        );
        bus.on(
            names::REMOVE_TODO,
            token,
            scoped(&weak, |item, event| {
                match event {
                    TodoEvent::RemoveTodo(key) if *key == item.key() => {
                        item.remove();
                    }
                    _ => {}
                }
                Ok(())
            }),
        );
        bus.on(
            names::RENAME_TODO,
            token,
            scoped(&weak, |item, event| match event {
                TodoEvent::RenameTodo(tx) if tx.before == item.key() => {
                    item.apply_rename(&tx.after).map_err(HandlerError::from)
                }
                _ => Ok(()),
            }),
        );
    }

    fn enter(&self, node: NodeHandle) {
        let delay = self.ctx.delay();
        let view = self.ctx.view.clone();
        if delay.is_zero() {
            view.add_class(node, VisualClass::INSERT);
            view.remove_class(node, VisualClass::INSERT);
            return;
        }

        let gate = self.gate.clone();
        let held = gate.try_acquire();
        self.ctx.transitions.spawn("enter", async move {
            let _held = match held {
                Some(held) => held,
                None => gate.acquire().await,
            };
            flash(view.as_ref(), &[(node, VisualClass::INSERT)], delay).await;
        });
    }

    /// Start removing the item
    ///
    /// Retracts its subscriptions, drops it from the store's logical order,
    /// then runs the exit transition. Returns false if removal already started.
    pub fn remove(self: &Arc<Self>) -> bool {
        let (key, nodes) = {
            let mut attrs = lock(&self.attrs);
            if !attrs.state.is_live() {
                return false;
            }
            attrs.state = LifecycleState::Removing;
            (attrs.key.clone(), attrs.nodes)
        };

        let scope = lock(&self.scope).take();
        drop(scope);
        self.ctx.store.remove_id(self.id);

        info!(key = %key, item = ?self.id, "todo removing");
        self.ctx.toast(format!("removing todo {key}"));

        match nodes {
            Some(nodes) => self.exit(nodes.root),
            None => self.dispose(),
        }
        true
    }

    fn exit(self: &Arc<Self>, node: NodeHandle) {
        let delay = self.ctx.delay();
        let view = self.ctx.view.clone();
        if delay.is_zero() && !self.gate.is_busy() {
            view.add_class(node, VisualClass::REMOVE);
            view.detach(node);
            self.dispose();
            return;
        }

        let item = self.clone();
        let gate = self.gate.clone();
        let spawned = self.ctx.transitions.spawn("exit", async move {
            // Let a running enter transition clean up first
            let _held = gate.acquire().await;
            view.add_class(node, VisualClass::REMOVE);
            pause(delay).await;
            view.detach(node);
            item.dispose();
        });
        if !spawned {
            self.ctx.view.detach(node);
            self.dispose();
        }
    }

    fn dispose(&self) {
        let key = {
            let mut attrs = lock(&self.attrs);
            attrs.state = LifecycleState::Disposed;
            attrs.nodes = None;
            attrs.key.clone()
        };
        debug!(key = %key, item = ?self.id, "todo disposed");
        self.ctx.toast(format!("disconnected todo {key}"));
    }

    /// Ask for a key change, as a direct edit would
    ///
    /// An empty (or whitespace-only) key removes the item instead.
    ///
    /// # Errors
    ///
    /// [`TodoError::StaleReference`] if the item is being removed or no
    /// longer listens to the bus, [`TodoError::DuplicateKey`] if another item
    /// holds `after` (the key is left unchanged).
    pub fn request_rename(&self, after: &str) -> Result<(), TodoError> {
        let before = self.key();
        if !self.is_live() || self.cancel.is_cancelled() {
            return Err(TodoError::stale(before));
        }
        if after == before {
            return Ok(());
        }
        if after.trim().is_empty() {
            self.ctx.bus.publish(TodoEvent::RemoveTodo(before));
            return Ok(());
        }

        let report = self
            .ctx
            .bus
            .publish(TodoEvent::RenameTodo(RenameTransaction::new(&before, after)));
        if self.key() == after {
            Ok(())
        } else if report.is_clean() {
            Err(TodoError::stale(before))
        } else {
            Err(TodoError::duplicate(after))
        }
    }

    /// Validate and commit a key change
    ///
    /// On conflict the key stays as it was and a toast reports the problem.
    ///
    /// # Errors
    ///
    /// [`TodoError::DuplicateKey`] on conflict, [`TodoError::EmptyKey`] for a
    /// blank key, [`TodoError::StaleReference`] once removal started.
    pub fn apply_rename(&self, after: &str) -> Result<(), TodoError> {
        let before = self.key();
        if !self.is_live() {
            return Err(TodoError::stale(before));
        }
        if before == after {
            return Ok(());
        }

        let checked = if after.trim().is_empty() {
            Err(TodoError::EmptyKey)
        } else {
            self.ctx.store.check_rename(self.id, after)
        };
        if let Err(err) = checked {
            info!(before = %before, after = %after, %err, "rename rejected");
            self.ctx.toast(err.toast_message());
            return Err(err);
        }

        let nodes = {
            let mut attrs = lock(&self.attrs);
            attrs.key = after.to_string();
            attrs.nodes
        };
        if let Some(nodes) = nodes {
            self.ctx.view.set_attribute(nodes.root, "text", after);
            self.ctx.view.set_attribute(nodes.label, "text", after);
        }
        debug!(before = %before, after = %after, "rename committed");
        self.ctx.toast(format!("todo {after} attribute text changed"));
        Ok(())
    }

    /// Set the done flag. No validation; always notifies.
    ///
    /// # Errors
    ///
    /// [`TodoError::StaleReference`] once removal started.
    pub fn set_done(&self, done: bool) -> Result<(), TodoError> {
        let (key, nodes) = {
            let mut attrs = lock(&self.attrs);
            if !attrs.state.is_live() {
                return Err(TodoError::stale(attrs.key.clone()));
            }
            attrs.done = done;
            (attrs.key.clone(), attrs.nodes)
        };
        if let Some(nodes) = nodes {
            self.ctx.view.set_attribute(nodes.root, "done", bool_attr(done));
            self.ctx.view.set_attribute(nodes.checkbox, "checked", bool_attr(done));
        }
        self.ctx.bus.publish(TodoEvent::DoneStateChanged {
            key: key.clone(),
            done,
        });
        self.ctx.toast(format!("todo {key} attribute done changed"));
        Ok(())
    }

    /// Flip the done flag, returning the new value
    ///
    /// # Errors
    ///
    /// [`TodoError::StaleReference`] once removal started.
    pub fn toggle_done(&self) -> Result<bool, TodoError> {
        let done = !self.done();
        self.set_done(done)?;
        Ok(done)
    }

    /// A dragged item entered this one
    pub fn drag_enter(&self) {
        if let Some(node) = self.node().filter(|_| self.is_live()) {
            self.ctx.view.add_class(node, VisualClass::DRAG_TARGET);
        }
    }

    /// A dragged item left this one, or was dropped on it
    pub fn drag_leave(&self) {
        if let Some(node) = self.node() {
            self.ctx.view.remove_class(node, VisualClass::DRAG_TARGET);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::WidgetHarness;
    use crate::view::NodeKind;
    use std::time::Duration;

    #[test]
    fn test_attach_goes_live_and_builds_node() {
        let harness = WidgetHarness::instant();
        let item = harness.widget.add("milk").unwrap();

        assert_eq!(item.state(), LifecycleState::Live);
        let node = harness.view.node(item.node().unwrap()).unwrap();
        assert_eq!(node.attribute("text"), Some("milk"));
        assert_eq!(node.attribute("done"), Some("false"));
        assert_eq!(node.children.len(), 4);
        assert!(harness.view.saw_class(node.handle, VisualClass::INSERT));
        assert!(harness.recorder.toasts().contains(&"connecting todo milk".to_string()));
        assert!(!item.attach());
    }

    #[test]
    fn test_set_done_notifies() {
        let harness = WidgetHarness::instant();
        let item = harness.widget.add("milk").unwrap();
        harness.recorder.clear();

        item.set_done(true).unwrap();

        assert!(item.done());
        assert_eq!(
            harness.recorder.events(),
            vec![
                TodoEvent::DoneStateChanged {
                    key: "milk".into(),
                    done: true
                },
                TodoEvent::toast("todo milk attribute done changed"),
            ]
        );
        let node = harness.view.node(item.node().unwrap()).unwrap();
        assert_eq!(node.attribute("done"), Some("true"));
    }

    #[test]
    fn test_rename_commit() {
        let harness = WidgetHarness::instant();
        let item = harness.widget.add("milk").unwrap();

        item.request_rename("oat milk").unwrap();

        assert_eq!(item.key(), "oat milk");
        assert_eq!(harness.widget.keys(), vec!["oat milk"]);
        assert_eq!(harness.view.texts(NodeKind::TodoItem), vec!["oat milk"]);
        assert!(harness
            .recorder
            .toasts()
            .contains(&"todo oat milk attribute text changed".to_string()));
    }

    #[test]
    fn test_rename_conflict_rolls_back() {
        let harness = WidgetHarness::instant();
        let a = harness.widget.add("a").unwrap();
        harness.widget.add("b").unwrap();
        harness.recorder.clear();

        let err = a.request_rename("b").unwrap_err();

        assert_eq!(err, TodoError::duplicate("b"));
        assert_eq!(a.key(), "a");
        assert_eq!(harness.widget.keys(), vec!["a", "b"]);
        assert_eq!(harness.recorder.toasts(), vec!["error: todo b exists"]);
    }

    #[test]
    fn test_rename_after_shutdown_is_stale() {
        let harness = WidgetHarness::instant();
        let item = harness.widget.add("milk").unwrap();
        harness.widget.shutdown();
        harness.recorder.clear();

        let err = item.request_rename("oat milk").unwrap_err();

        assert_eq!(err, TodoError::stale("milk"));
        assert_eq!(item.key(), "milk");
        assert!(harness.recorder.events().is_empty());
    }

    #[test]
    fn test_rename_to_empty_removes() {
        let harness = WidgetHarness::instant();
        let item = harness.widget.add("milk").unwrap();

        item.request_rename("  ").unwrap();

        assert_eq!(item.state(), LifecycleState::Disposed);
        assert!(harness.widget.keys().is_empty());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let harness = WidgetHarness::instant();
        let item = harness.widget.add("milk").unwrap();

        assert!(item.remove());
        assert!(!item.remove());

        assert_eq!(item.state(), LifecycleState::Disposed);
        assert!(item.cancel_token().is_cancelled());
        let removing = harness
            .recorder
            .toasts()
            .into_iter()
            .filter(|t| t == "removing todo milk")
            .count();
        assert_eq!(removing, 1);
        assert_eq!(item.set_done(true), Err(TodoError::stale("milk")));
    }

    #[test]
    fn test_removed_item_stops_reacting() {
        let harness = WidgetHarness::instant();
        let x = harness.widget.add("x").unwrap();
        let y = harness.widget.add("y").unwrap();
        x.set_done(true).unwrap();
        y.set_done(true).unwrap();
        x.remove();

        harness.widget.bus().publish(TodoEvent::RenameTodo(RenameTransaction::new("x", "z")));
        harness.widget.bus().publish(TodoEvent::RemoveChecked);

        assert_eq!(x.key(), "x");
        assert_eq!(y.state(), LifecycleState::Disposed);
        assert_eq!(harness.widget.bus().subscriber_count(names::RENAME_TODO), 0);
    }

    #[test]
    fn test_drag_target_class() {
        let harness = WidgetHarness::instant();
        let item = harness.widget.add("milk").unwrap();
        let node = item.node().unwrap();

        item.drag_enter();
        assert_eq!(harness.view.classes(node), VisualClass::DRAG_TARGET);
        item.drag_leave();
        assert_eq!(harness.view.classes(node), VisualClass::empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_waits_for_enter_cleanup() {
        let harness = WidgetHarness::animated();
        let item = harness.widget.add("milk").unwrap();
        let node = item.node().unwrap();
        tokio::task::yield_now().await;
        assert_eq!(harness.view.classes(node), VisualClass::INSERT);

        // Removal mid-enter: logical order updates now, visuals queue up
        tokio::time::sleep(Duration::from_millis(200)).await;
        item.remove();
        assert!(harness.widget.keys().is_empty());
        assert_eq!(item.state(), LifecycleState::Removing);
        assert_eq!(harness.view.classes(node), VisualClass::INSERT);

        tokio::time::sleep(Duration::from_millis(301)).await;
        assert_eq!(harness.view.classes(node), VisualClass::REMOVE);

        harness.settle().await;
        assert_eq!(item.state(), LifecycleState::Disposed);
        assert!(!harness.view.is_attached(node));
        assert!(harness
            .recorder
            .toasts()
            .contains(&"disconnected todo milk".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_key_reusable_during_exit() {
        let harness = WidgetHarness::animated();
        let old = harness.widget.add("milk").unwrap();
        harness.settle().await;

        old.remove();
        let new = harness.widget.add("milk").unwrap();

        assert_eq!(old.state(), LifecycleState::Removing);
        assert_eq!(new.state(), LifecycleState::Live);
        assert_eq!(harness.widget.keys(), vec!["milk"]);

        harness.widget.bus().publish(TodoEvent::RemoveTodo("milk".into()));
        assert_eq!(new.state(), LifecycleState::Removing);
        harness.settle().await;
        assert_eq!(old.state(), LifecycleState::Disposed);
        assert_eq!(new.state(), LifecycleState::Disposed);
    }
}
