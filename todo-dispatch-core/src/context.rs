//! Shared collaborators handed to every component of one widget

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::bus::{EventBus, PublishReport};
use crate::config::WidgetConfig;
use crate::event::TodoEvent;
use crate::store::ListStore;
use crate::transition::TransitionTracker;
use crate::view::ViewBuilder;

/// Everything an item, the reorder engine or the notifier needs.
///
/// Cloning is cheap; all clones refer to the same bus, store and view.
#[derive(Clone)]
pub struct WidgetContext {
    pub bus: Arc<EventBus<TodoEvent>>,
    pub store: Arc<ListStore>,
    pub view: Arc<dyn ViewBuilder>,
    pub config: WidgetConfig,
    pub transitions: TransitionTracker,
}

impl fmt::Debug for WidgetContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetContext")
            .field("store", &self.store)
            .field("config", &self.config)
            .field("transitions", &self.transitions.in_flight())
            .finish_non_exhaustive()
    }
}

impl WidgetContext {
    pub fn new(bus: Arc<EventBus<TodoEvent>>, view: Arc<dyn ViewBuilder>, config: WidgetConfig) -> Self {
        Self {
            bus,
            store: Arc::new(ListStore::new()),
            view,
            config,
            transitions: TransitionTracker::new(),
        }
    }

    /// Publish a user-visible notice
    pub fn toast(&self, message: impl Into<String>) -> PublishReport {
        self.bus.publish(TodoEvent::toast(message))
    }

    /// Effective transition length
    pub fn delay(&self) -> Duration {
        self.config.effective_transition()
    }
}
