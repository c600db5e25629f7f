//! Core traits and types for todo-dispatch
//!
//! This crate provides the engine behind an ordered, editable todo list whose
//! components talk to each other only through a named-event bus.
//!
//! # Core Concepts
//!
//! - **EventBus**: Named publish/subscribe with cancellable subscriptions
//! - **ListStore**: The authoritative display order of items
//! - **ItemController**: One item's key, done flag and lifecycle
//! - **ReorderEngine**: Neighbour swaps and drag-drop repositioning
//! - **ToastNotifier**: Transient notices for every state change
//! - **ViewBuilder**: The rendering collaborator; [`MemoryView`] keeps nodes in memory
//!
//! # Basic Example
//!
//! ```
//! use std::sync::Arc;
//! use todo_dispatch_core::prelude::*;
//!
//! let view = Arc::new(MemoryView::new());
//! let widget = TodoWidget::new(WidgetConfig::default().with_reduced_motion(true), view.clone());
//!
//! widget.publish(TodoEvent::AddTodo("milk".into()));
//! widget.publish(TodoEvent::AddTodo("eggs".into()));
//! widget.set_done("milk", true).unwrap();
//! widget.remove_checked();
//!
//! assert_eq!(widget.keys(), vec!["eggs"]);
//! assert_eq!(view.texts(NodeKind::TodoItem), vec!["eggs"]);
//! ```
//!
//! # Transitions
//!
//! Enter, exit, glide and toast transitions are tokio tasks. Logical state
//! (the store order, an item's key) always changes before the visual delay
//! starts, so other operations never observe a half-applied change. Under
//! reduced motion the delay is zero and item transitions complete inside the
//! call that started them.

pub mod action;
pub mod bus;
pub mod config;
pub mod context;
pub mod drag;
pub mod error;
pub mod event;
pub mod event_log;
pub mod item;
pub mod reorder;
pub mod store;
mod sync;
pub mod testing;
pub mod toast;
pub mod transition;
pub mod view;
pub mod widget;

// Core trait exports
pub use action::Action;

// Event system exports
pub use bus::{
    BusMiddleware, ComposedMiddleware, EventBus, Handler, HandlerFailure, LoggingMiddleware,
    NoopMiddleware, PublishReport, SubscriptionId,
};
pub use event::{names, Direction, RenameTransaction, TodoEvent};
pub use event_log::{EventLog, EventLogConfig, EventLogEntry, EventLogFilter};

// Store and item exports
pub use item::{Item, ItemController, ItemId, LifecycleState};
pub use store::{ListStore, MoveOutcome};

// Widget exports
pub use config::{WidgetConfig, REDUCED_MOTION_ENV};
pub use context::WidgetContext;
pub use drag::{DragPayload, DragSession};
pub use error::{ConfigError, HandlerError, TodoError};
pub use reorder::ReorderEngine;
pub use toast::ToastNotifier;
pub use transition::{TransitionGate, TransitionTracker};
pub use view::{MemoryView, NodeHandle, NodeKind, NodeSnapshot, ViewBuilder, VisualClass};
pub use widget::{add_item, TodoWidget};

// Testing exports
pub use testing::{detached_item, EventRecorder, WidgetHarness};

#[cfg(feature = "testing-time")]
pub use testing::{advance_time, pause_time, resume_time};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::action::Action;
    pub use crate::bus::{BusMiddleware, EventBus, LoggingMiddleware, PublishReport};
    pub use crate::config::WidgetConfig;
    pub use crate::error::{HandlerError, TodoError};
    pub use crate::event::{names, Direction, RenameTransaction, TodoEvent};
    pub use crate::event_log::{EventLog, EventLogConfig, EventLogFilter};
    pub use crate::item::{Item, ItemController, LifecycleState};
    pub use crate::store::{ListStore, MoveOutcome};
    pub use crate::view::{MemoryView, NodeKind, ViewBuilder, VisualClass};
    pub use crate::widget::TodoWidget;
}
