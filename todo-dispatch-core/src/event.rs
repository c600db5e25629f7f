//! Events exchanged on the todo bus

use serde::{Deserialize, Serialize};

use crate::Action;

/// Event names, as used for subscriptions.
pub mod names {
    pub const ADD_TODO: &str = "addtodo";
    pub const REMOVE_TODO: &str = "removetodo";
    pub const ALL_CLEAR: &str = "allclear";
    pub const REMOVE_CHECKED: &str = "removechecked";
    pub const RENAME_TODO: &str = "renametodo";
    pub const DONE_STATE_CHANGED: &str = "todo-done-state-changed";
    pub const TOAST: &str = "toast";

    /// Every event name the widget publishes or reacts to.
    pub const ALL: &[&str] = &[
        ADD_TODO,
        REMOVE_TODO,
        ALL_CLEAR,
        REMOVE_CHECKED,
        RENAME_TODO,
        DONE_STATE_CHANGED,
        TOAST,
    ];
}

/// Key change request for one item.
///
/// Addressed to the item currently holding `before`. Validation is done by
/// [`ListStore::check_rename`](crate::ListStore::check_rename), not by the payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameTransaction {
    pub before: String,
    pub after: String,
}

impl RenameTransaction {
    pub fn new(before: impl Into<String>, after: impl Into<String>) -> Self {
        Self {
            before: before.into(),
            after: after.into(),
        }
    }
}

/// Direction of a swap move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

/// Logical events on the todo bus.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TodoEvent {
    /// Request to create an item
    AddTodo(String),
    /// Request to remove one item by key
    RemoveTodo(String),
    /// Remove all items
    AllClear,
    /// Remove all items marked done
    RemoveChecked,
    /// Key change request
    RenameTodo(RenameTransaction),
    /// Done flag changed
    DoneStateChanged { key: String, done: bool },
    /// User-visible transient notice
    Toast(String),
}

impl TodoEvent {
    pub fn toast(message: impl Into<String>) -> Self {
        TodoEvent::Toast(message.into())
    }

    /// Toast text, if this is a toast.
    pub fn as_toast(&self) -> Option<&str> {
        match self {
            TodoEvent::Toast(message) => Some(message),
            _ => None,
        }
    }
}

impl Action for TodoEvent {
    fn name(&self) -> &'static str {
        match self {
            TodoEvent::AddTodo(_) => names::ADD_TODO,
            TodoEvent::RemoveTodo(_) => names::REMOVE_TODO,
            TodoEvent::AllClear => names::ALL_CLEAR,
            TodoEvent::RemoveChecked => names::REMOVE_CHECKED,
            TodoEvent::RenameTodo(_) => names::RENAME_TODO,
            TodoEvent::DoneStateChanged { .. } => names::DONE_STATE_CHANGED,
            TodoEvent::Toast(_) => names::TOAST,
        }
    }
}
