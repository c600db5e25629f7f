//! todo-dispatch: an ordered, editable todo list driven by named events
//!
//! Components never call each other. Input publishes events such as
//! `addtodo` or `renametodo` on an [`EventBus`], each item reacts to the
//! events addressed to it, and every state change is announced with a
//! `toast`.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use todo_dispatch::prelude::*;
//!
//! #[derive(Action, Clone, Debug)]
//! enum UiEvent {
//!     Submit(String),
//!     #[action(name = "quit-requested")]
//!     Quit,
//! }
//!
//! assert_eq!(UiEvent::Submit("milk".into()).name(), "submit");
//! assert_eq!(UiEvent::Quit.name(), "quit-requested");
//!
//! let widget = TodoWidget::new(
//!     WidgetConfig::default().with_reduced_motion(true),
//!     Arc::new(MemoryView::new()),
//! );
//! widget.add("milk").unwrap();
//! assert_eq!(widget.keys(), vec!["milk"]);
//! ```

// Re-export everything from core
pub use todo_dispatch_core::*;

// Re-export derive macros
pub use todo_dispatch_macros::Action;

/// Prelude for convenient imports
pub mod prelude {
    // Traits and derive
    pub use todo_dispatch_core::{Action, BusMiddleware, ViewBuilder};
    pub use todo_dispatch_macros::Action;

    // Event system
    pub use todo_dispatch_core::{
        names, ComposedMiddleware, Direction, EventBus, EventLog, EventLogConfig, EventLogFilter,
        LoggingMiddleware, PublishReport, RenameTransaction, TodoEvent,
    };

    // Widget
    pub use todo_dispatch_core::{
        Item, ItemController, LifecycleState, ListStore, MemoryView, MoveOutcome, NodeKind,
        TodoError, TodoWidget, VisualClass, WidgetConfig,
    };
}
