//! View-builder collaborator
//!
//! The core never renders anything itself. Items and toasts are materialised
//! through a [`ViewBuilder`], which hands back opaque [`NodeHandle`]s that the
//! core decorates with attributes and [`VisualClass`]es during transitions.
//! [`MemoryView`] keeps the resulting node tree in memory; the demo renders
//! it and the tests inspect it.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Mutex;

use bitflags::bitflags;

use crate::event::Direction;
use crate::sync::lock;

/// Opaque reference to a node created by a [`ViewBuilder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub u64);

/// Kinds of node the core asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    TodoItem,
    Toast,
    Button,
    Checkbox,
    Text,
}

bitflags! {
    /// Transient visual state toggled by transitions
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct VisualClass: u8 {
        /// Enter transition running
        const INSERT = 1 << 0;
        /// Exit transition running
        const REMOVE = 1 << 1;
        /// Gliding one slot up
        const MOVE_UP = 1 << 2;
        /// Gliding one slot down
        const MOVE_DOWN = 1 << 3;
        /// A dragged item hovers over this one
        const DRAG_TARGET = 1 << 4;
    }
}

impl VisualClass {
    /// Glide class for an item moving in `direction`.
    pub fn glide(direction: Direction) -> Self {
        match direction {
            Direction::Up => VisualClass::MOVE_UP,
            Direction::Down => VisualClass::MOVE_DOWN,
        }
    }
}

/// Attribute serialisation for booleans at the view boundary.
pub fn bool_attr(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// Materialises nodes and applies attributes and classes.
///
/// Calls on a detached or unknown node are ignored.
pub trait ViewBuilder: Send + Sync {
    /// Create a node with attributes and children, attached to the view.
    fn build(
        &self,
        kind: NodeKind,
        attributes: &[(&str, &str)],
        children: Vec<NodeHandle>,
    ) -> NodeHandle;

    fn set_attribute(&self, node: NodeHandle, name: &str, value: &str);

    fn add_class(&self, node: NodeHandle, class: VisualClass);

    fn remove_class(&self, node: NodeHandle, class: VisualClass);

    /// Remove the node and its children from the view.
    fn detach(&self, node: NodeHandle);
}

/// Read-only copy of a node in a [`MemoryView`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub handle: NodeHandle,
    pub kind: NodeKind,
    pub attributes: BTreeMap<String, String>,
    pub classes: VisualClass,
    pub children: Vec<NodeHandle>,
}

impl NodeSnapshot {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

#[derive(Default)]
struct ViewState {
    next: u64,
    nodes: HashMap<NodeHandle, NodeSnapshot>,
    /// Top-level nodes in attach order
    roots: Vec<NodeHandle>,
    /// Classes added to attached nodes, in order, for inspection
    class_history: Vec<(NodeHandle, VisualClass)>,
}

/// In-memory [`ViewBuilder`].
#[derive(Default)]
pub struct MemoryView {
    state: Mutex<ViewState>,
}

impl fmt::Debug for MemoryView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("MemoryView")
            .field("nodes", &state.nodes.len())
            .field("roots", &state.roots.len())
            .finish()
    }
}

impl MemoryView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, handle: NodeHandle) -> Option<NodeSnapshot> {
        lock(&self.state).nodes.get(&handle).cloned()
    }

    pub fn is_attached(&self, handle: NodeHandle) -> bool {
        lock(&self.state).nodes.contains_key(&handle)
    }

    /// Attached top-level nodes of `kind`, in attach order
    pub fn roots(&self, kind: NodeKind) -> Vec<NodeSnapshot> {
        let state = lock(&self.state);
        state
            .roots
            .iter()
            .filter_map(|h| state.nodes.get(h))
            .filter(|n| n.kind == kind)
            .cloned()
            .collect()
    }

    /// `text` attribute of every attached top-level node of `kind`
    pub fn texts(&self, kind: NodeKind) -> Vec<String> {
        self.roots(kind)
            .into_iter()
            .filter_map(|n| n.attributes.get("text").cloned())
            .collect()
    }

    /// Classes currently set on a node (empty when detached)
    pub fn classes(&self, handle: NodeHandle) -> VisualClass {
        lock(&self.state)
            .nodes
            .get(&handle)
            .map(|n| n.classes)
            .unwrap_or_default()
    }

    /// Returns true if `class` was ever added to `handle` while it is attached
    pub fn saw_class(&self, handle: NodeHandle, class: VisualClass) -> bool {
        lock(&self.state)
            .class_history
            .iter()
            .any(|(h, c)| *h == handle && c.contains(class))
    }

    /// Number of class additions still held for [`saw_class`](Self::saw_class)
    pub fn class_history_len(&self) -> usize {
        lock(&self.state).class_history.len()
    }

    pub fn node_count(&self) -> usize {
        lock(&self.state).nodes.len()
    }
}

impl ViewBuilder for MemoryView {
    fn build(
        &self,
        kind: NodeKind,
        attributes: &[(&str, &str)],
        children: Vec<NodeHandle>,
    ) -> NodeHandle {
        let mut state = lock(&self.state);
        state.next += 1;
        let handle = NodeHandle(state.next);
        state.roots.retain(|r| !children.contains(r));
        state.nodes.insert(
            handle,
            NodeSnapshot {
                handle,
                kind,
                attributes: attributes
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
                classes: VisualClass::empty(),
                children,
            },
        );
        state.roots.push(handle);
        handle
    }

    fn set_attribute(&self, node: NodeHandle, name: &str, value: &str) {
        if let Some(n) = lock(&self.state).nodes.get_mut(&node) {
            n.attributes.insert(name.to_string(), value.to_string());
        }
    }

    fn add_class(&self, node: NodeHandle, class: VisualClass) {
        let mut state = lock(&self.state);
        if let Some(n) = state.nodes.get_mut(&node) {
            n.classes.insert(class);
            state.class_history.push((node, class));
        }
    }

    fn remove_class(&self, node: NodeHandle, class: VisualClass) {
        if let Some(n) = lock(&self.state).nodes.get_mut(&node) {
            n.classes.remove(class);
        }
    }

    fn detach(&self, node: NodeHandle) {
        let mut state = lock(&self.state);
        let mut pending = vec![node];
        while let Some(handle) = pending.pop() {
            if let Some(removed) = state.nodes.remove(&handle) {
                pending.extend(removed.children);
            }
        }
        let ViewState {
            nodes,
            roots,
            class_history,
            ..
        } = &mut *state;
        roots.retain(|r| *r != node);
        class_history.retain(|(h, _)| nodes.contains_key(h));
    }
}
