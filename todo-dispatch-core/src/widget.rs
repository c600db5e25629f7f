//! Widget wiring
//!
//! [`TodoWidget`] is constructed explicitly and owns everything one list
//! needs: the bus, the store, the view, the reorder engine and the toast
//! notifier. Dropping the widget (or calling [`TodoWidget::shutdown`]) retracts
//! every subscription it made and empties the store.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::bus::{EventBus, LoggingMiddleware, PublishReport};
use crate::config::WidgetConfig;
use crate::context::WidgetContext;
use crate::drag::DragSession;
use crate::error::{HandlerError, TodoError};
use crate::event::{names, Direction, TodoEvent};
use crate::item::{Item, ItemController};
use crate::reorder::ReorderEngine;
use crate::store::{ListStore, MoveOutcome};
use crate::toast::ToastNotifier;
use crate::view::ViewBuilder;

/// Create, append and attach an item for `key`
///
/// Rejections are announced with an error toast before being returned.
///
/// # Errors
///
/// [`TodoError::EmptyKey`] for a blank key, [`TodoError::DuplicateKey`] if a
/// Live or Connecting item already holds it.
pub fn add_item(ctx: &WidgetContext, key: &str) -> Result<Arc<ItemController>, TodoError> {
    let added = if key.trim().is_empty() {
        Err(TodoError::EmptyKey)
    } else {
        let item = ItemController::new(key, ctx.clone());
        ctx.store.insert_at_end(item.clone()).map(|_| item)
    };

    match added {
        Ok(item) => {
            item.attach();
            Ok(item)
        }
        Err(err) => {
            info!(key, %err, "todo rejected");
            ctx.toast(err.toast_message());
            Err(err)
        }
    }
}

/// An ordered, editable todo list.
pub struct TodoWidget {
    ctx: WidgetContext,
    reorder: ReorderEngine,
    toasts: Arc<ToastNotifier>,
    drag: DragSession,
    token: CancellationToken,
}

impl fmt::Debug for TodoWidget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TodoWidget")
            .field("ctx", &self.ctx)
            .field("toasts", &self.toasts)
            .field("drag", &self.drag)
            .field("shut_down", &self.token.is_cancelled())
            .finish()
    }
}

impl TodoWidget {
    /// Create a widget with its own bus, which logs every publish
    pub fn new(config: WidgetConfig, view: Arc<dyn ViewBuilder>) -> Self {
        let bus = Arc::new(EventBus::with_middleware(LoggingMiddleware::new()));
        Self::with_bus(bus, view, config)
    }

    /// Create a widget on an existing bus
    pub fn with_bus(
        bus: Arc<EventBus<TodoEvent>>,
        view: Arc<dyn ViewBuilder>,
        config: WidgetConfig,
    ) -> Self {
        let ctx = WidgetContext::new(bus, view, config);
        let token = CancellationToken::new();
        let toasts = ToastNotifier::install(ctx.clone(), &token);

        let handler_ctx = ctx.clone();
        ctx.bus
            .on(names::ADD_TODO, Some(&token), move |event: &TodoEvent| {
                match event {
                    TodoEvent::AddTodo(key) => add_item(&handler_ctx, key)
                        .map(|_| ())
                        .map_err(HandlerError::from),
                    _ => Ok(()),
                }
            });

        info!(
            transition_ms = ctx.delay().as_millis() as u64,
            reduced_motion = ctx.config.reduced_motion,
            "todo widget ready"
        );
        Self {
            reorder: ReorderEngine::new(ctx.clone()),
            ctx,
            toasts,
            drag: DragSession::new(),
            token,
        }
    }

    pub fn bus(&self) -> &Arc<EventBus<TodoEvent>> {
        &self.ctx.bus
    }

    pub fn store(&self) -> &Arc<ListStore> {
        &self.ctx.store
    }

    pub fn view(&self) -> &Arc<dyn ViewBuilder> {
        &self.ctx.view
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.ctx.config
    }

    pub fn context(&self) -> &WidgetContext {
        &self.ctx
    }

    pub fn toasts(&self) -> &Arc<ToastNotifier> {
        &self.toasts
    }

    pub fn reorder(&self) -> &ReorderEngine {
        &self.reorder
    }

    pub fn drag(&self) -> &DragSession {
        &self.drag
    }

    /// Publish an event on the widget's bus
    pub fn publish(&self, event: TodoEvent) -> PublishReport {
        self.ctx.bus.publish(event)
    }

    /// Add an item directly, as the `addtodo` handler does
    ///
    /// # Errors
    ///
    /// See [`add_item`].
    pub fn add(&self, key: &str) -> Result<Arc<ItemController>, TodoError> {
        add_item(&self.ctx, key)
    }

    pub fn remove(&self, key: &str) -> PublishReport {
        self.publish(TodoEvent::RemoveTodo(key.to_string()))
    }

    pub fn clear_all(&self) -> PublishReport {
        self.publish(TodoEvent::AllClear)
    }

    pub fn remove_checked(&self) -> PublishReport {
        self.publish(TodoEvent::RemoveChecked)
    }

    fn live(&self, key: &str) -> Result<Arc<ItemController>, TodoError> {
        self.ctx
            .store
            .controller(key)
            .ok_or_else(|| TodoError::stale(key))
    }

    /// Rename the item holding `key`; an empty `after` removes it
    ///
    /// # Errors
    ///
    /// [`TodoError::StaleReference`] for an unknown key,
    /// [`TodoError::DuplicateKey`] if `after` is taken.
    pub fn rename(&self, key: &str, after: &str) -> Result<(), TodoError> {
        self.live(key)?.request_rename(after)
    }

    /// # Errors
    ///
    /// [`TodoError::StaleReference`] for an unknown key.
    pub fn set_done(&self, key: &str, done: bool) -> Result<(), TodoError> {
        self.live(key)?.set_done(done)
    }

    /// # Errors
    ///
    /// [`TodoError::StaleReference`] for an unknown key.
    pub fn toggle_done(&self, key: &str) -> Result<bool, TodoError> {
        self.live(key)?.toggle_done()
    }

    /// Swap `key` with its neighbour, see [`ReorderEngine::swap`]
    pub async fn move_item(&self, key: &str, direction: Direction) -> MoveOutcome {
        self.reorder.swap(key, direction).await
    }

    pub fn drop_before(&self, dragged: &str, target: &str) -> MoveOutcome {
        self.reorder.drop_before(dragged, target)
    }

    /// Start dragging `key`. Returns false if no attached item holds it.
    pub fn drag_start(&self, key: &str) -> bool {
        match self.ctx.store.controller(key).and_then(|item| item.node()) {
            Some(node) => {
                self.drag.start(node, key);
                true
            }
            None => false,
        }
    }

    /// The drag moved over `key`
    pub fn drag_enter(&self, key: &str) {
        if let Some(item) = self.ctx.store.controller(key) {
            item.drag_enter();
        }
    }

    /// The drag left `key`
    pub fn drag_leave(&self, key: &str) {
        if let Some(item) = self.ctx.store.controller(key) {
            item.drag_leave();
        }
    }

    /// Drop the current drag on `target`
    pub fn drop_on(&self, target: &str) -> MoveOutcome {
        self.reorder.drop_on(&self.drag, target)
    }

    pub fn snapshot(&self) -> Vec<Item> {
        self.ctx.store.snapshot()
    }

    pub fn keys(&self) -> Vec<String> {
        self.ctx.store.keys()
    }

    pub fn controller(&self, key: &str) -> Option<Arc<ItemController>> {
        self.ctx.store.controller(key)
    }

    /// Wait until every running transition, toasts included, has finished.
    pub async fn settle(&self) {
        self.ctx.transitions.settle().await;
    }

    /// Tear the widget down
    ///
    /// Retracts the widget's and every item's subscriptions and empties the
    /// store. Running transitions finish on their own. Calling it again does
    /// nothing.
    pub fn shutdown(&self) {
        if self.token.is_cancelled() {
            return;
        }
        self.token.cancel();
        self.drag.cancel();
        let items = self.ctx.store.clear();
        for item in &items {
            item.cancel_token().cancel();
        }
        self.ctx.bus.prune();
        info!(items = items.len(), "todo widget shut down");
    }
}

impl Drop for TodoWidget {
    fn drop(&mut self) {
        self.shutdown();
    }
}
