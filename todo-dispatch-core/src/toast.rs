//! Toast notifier
//!
//! Turns every `toast` event into a transient node: enter transition, display
//! for [`WidgetConfig::toast_display`](crate::WidgetConfig) counted from
//! creation, exit transition, detach. Each toast runs on its own task, so a
//! toast on its way out never holds up a new one.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::context::WidgetContext;
use crate::event::{names, TodoEvent};
use crate::sync::lock;
use crate::transition::pause;
use crate::view::{NodeKind, VisualClass};

/// Displays toast notifications.
pub struct ToastNotifier {
    ctx: WidgetContext,
    active: Arc<AtomicUsize>,
    history: Mutex<VecDeque<String>>,
}

impl std::fmt::Debug for ToastNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToastNotifier")
            .field("active", &self.active())
            .field("history", &lock(&self.history).len())
            .finish()
    }
}

struct Shown(Arc<AtomicUsize>);

impl Drop for Shown {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ToastNotifier {
    /// Create a notifier and subscribe it to `toast` until `scope` is cancelled.
    pub fn install(ctx: WidgetContext, scope: &CancellationToken) -> Arc<Self> {
        let notifier = Arc::new(Self {
            ctx,
            active: Arc::new(AtomicUsize::new(0)),
            history: Mutex::new(VecDeque::new()),
        });

        let weak: Weak<Self> = Arc::downgrade(&notifier);
        notifier
            .ctx
            .bus
            .on(names::TOAST, Some(scope), move |event: &TodoEvent| {
                if let (Some(notifier), Some(message)) = (weak.upgrade(), event.as_toast()) {
                    notifier.show(message);
                }
                Ok(())
            });
        notifier
    }

    /// Toasts currently on screen
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Most recent messages, oldest first
    pub fn history(&self) -> Vec<String> {
        lock(&self.history).iter().cloned().collect()
    }

    fn show(&self, message: &str) {
        {
            let mut history = lock(&self.history);
            history.push_back(message.to_string());
            while history.len() > self.ctx.config.toast_history {
                history.pop_front();
            }
        }

        let view = self.ctx.view.clone();
        let node = view.build(NodeKind::Toast, &[("text", message)], vec![]);
        self.active.fetch_add(1, Ordering::SeqCst);
        let shown = Shown(self.active.clone());
        debug!(message, node = node.0, "toast");

        let delay = self.ctx.delay();
        let display = self.ctx.config.toast_display;
        let spawned = self.ctx.transitions.spawn("toast", async move {
            let _shown = shown;
            let start = Instant::now();
            view.add_class(node, VisualClass::INSERT);
            pause(delay).await;
            view.remove_class(node, VisualClass::INSERT);

            tokio::time::sleep_until(start + display).await;
            view.add_class(node, VisualClass::REMOVE);
            pause(delay).await;
            view.detach(node);
        });
        if !spawned {
            self.ctx.view.detach(node);
        }
    }
}
