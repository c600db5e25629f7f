//! Action trait for events routed through the bus

use std::fmt::Debug;

/// Marker trait for events that can be published on an [`EventBus`](crate::EventBus)
///
/// Events describe intents and notifications. They should be:
/// - Clone: Events may be logged, recorded, or replayed in tests
/// - Debug: For debugging and logging
/// - Send + Sync + 'static: Handlers and transitions run on tokio tasks
///
/// Use `#[derive(Action)]` from `todo-dispatch-macros` to auto-implement this trait.
pub trait Action: Clone + Debug + Send + Sync + 'static {
    /// Routing key for the event. Handlers subscribe to this name.
    fn name(&self) -> &'static str;
}
