//! Test utilities for todo-dispatch widgets
//!
//! - [`WidgetHarness`]: a widget on a [`MemoryView`] with an [`EventRecorder`]
//!   installed on its bus
//! - [`EventRecorder`]: bus middleware keeping every published event
//! - [`detached_item`]: a `Connecting` item for store-level tests
//! - Assertion macros for verifying published events
//!
//! # Example
//!
//! ```
//! use todo_dispatch_core::testing::WidgetHarness;
//! use todo_dispatch_core::assert_emitted;
//! use todo_dispatch_core::TodoEvent;
//!
//! let harness = WidgetHarness::instant();
//! harness.widget.add("milk").unwrap();
//!
//! let events = harness.recorder.events();
//! assert_emitted!(events, TodoEvent::Toast(msg) if msg == "connecting todo milk");
//! ```

use std::sync::{Arc, Mutex};

use crate::bus::{BusMiddleware, EventBus, PublishReport};
use crate::config::WidgetConfig;
use crate::context::WidgetContext;
use crate::event::TodoEvent;
use crate::item::ItemController;
use crate::sync::lock;
use crate::view::MemoryView;
use crate::widget::TodoWidget;
use crate::Action;

/// A `Connecting` item bound to a throwaway context.
///
/// Never attached, so it has no node and no subscriptions.
pub fn detached_item(key: &str) -> Arc<ItemController> {
    let ctx = WidgetContext::new(
        Arc::new(EventBus::new()),
        Arc::new(MemoryView::new()),
        WidgetConfig::default().with_reduced_motion(true),
    );
    ItemController::new(key, ctx)
}

/// Records every event published on a bus, nested publishes included.
///
/// Installed as middleware rather than as a subscriber, so it never shows up
/// in subscriber counts.
#[derive(Clone, Debug, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<TodoEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events in publish order
    pub fn events(&self) -> Vec<TodoEvent> {
        lock(&self.events).clone()
    }

    /// Messages of every `toast` event, in publish order
    pub fn toasts(&self) -> Vec<String> {
        lock(&self.events)
            .iter()
            .filter_map(|e| e.as_toast().map(str::to_string))
            .collect()
    }

    /// Number of recorded events named `name`
    pub fn count(&self, name: &str) -> usize {
        lock(&self.events)
            .iter()
            .filter(|e| e.name() == name)
            .count()
    }

    pub fn clear(&self) {
        lock(&self.events).clear();
    }
}

impl BusMiddleware<TodoEvent> for EventRecorder {
    fn before(&mut self, event: &TodoEvent) {
        lock(&self.events).push(event.clone());
    }

    fn after(&mut self, _event: &TodoEvent, _report: &PublishReport) {}
}

/// A widget rendered into a [`MemoryView`], with its events recorded.
pub struct WidgetHarness {
    pub widget: TodoWidget,
    pub view: Arc<MemoryView>,
    pub recorder: EventRecorder,
}

impl WidgetHarness {
    pub fn new(config: WidgetConfig) -> Self {
        let recorder = EventRecorder::new();
        let view = Arc::new(MemoryView::new());
        let bus = Arc::new(EventBus::with_middleware(recorder.clone()));
        let widget = TodoWidget::with_bus(bus, view.clone(), config);
        Self {
            widget,
            view,
            recorder,
        }
    }

    /// Reduced motion: item transitions complete synchronously.
    pub fn instant() -> Self {
        Self::new(WidgetConfig::default().with_reduced_motion(true))
    }

    /// Default timings. Needs a tokio runtime, ideally with paused time.
    pub fn animated() -> Self {
        Self::new(WidgetConfig::default())
    }

    /// Wait for every running transition, toasts included.
    pub async fn settle(&self) {
        self.widget.settle().await;
    }
}

/// Pause the tokio clock of the current runtime.
///
/// Requires a `current_thread` runtime.
#[cfg(any(test, feature = "testing-time"))]
pub fn pause_time() {
    tokio::time::pause();
}

/// Resume a clock paused with [`pause_time`].
#[cfg(any(test, feature = "testing-time"))]
pub fn resume_time() {
    tokio::time::resume();
}

/// Move a paused clock forward, firing due transitions.
#[cfg(any(test, feature = "testing-time"))]
pub async fn advance_time(duration: std::time::Duration) {
    tokio::time::advance(duration).await;
}

/// Assert that an event matching a pattern was published.
///
/// # Example
///
/// ```ignore
/// let events = harness.recorder.events();
/// assert_emitted!(events, TodoEvent::AllClear);
/// assert_emitted!(events, TodoEvent::Toast(msg) if msg.starts_with("moving"));
/// ```
#[macro_export]
macro_rules! assert_emitted {
    ($events:expr, $pattern:pat $(if $guard:expr)?) => {
        assert!(
            $events.iter().any(|e| matches!(e, $pattern $(if $guard)?)),
            "Expected event matching `{}` to be published, but got: {:?}",
            stringify!($pattern),
            $events
        );
    };
}

/// Assert that no event matching a pattern was published.
#[macro_export]
macro_rules! assert_not_emitted {
    ($events:expr, $pattern:pat $(if $guard:expr)?) => {
        assert!(
            !$events.iter().any(|e| matches!(e, $pattern $(if $guard)?)),
            "Expected event matching `{}` NOT to be published, but it was: {:?}",
            stringify!($pattern),
            $events
        );
    };
}

/// Count how many events match a pattern.
#[macro_export]
macro_rules! count_emitted {
    ($events:expr, $pattern:pat $(if $guard:expr)?) => {
        $events.iter().filter(|e| matches!(e, $pattern $(if $guard)?)).count()
    };
}
