//! Event bus for publishing events to subscribed handlers
//!
//! Handlers are registered per event name and invoked synchronously, in
//! registration order, on every [`EventBus::publish`]. A subscription may be
//! scoped to a [`CancellationToken`]: once the token is cancelled the handler
//! never runs again and the subscription is pruned on the next publish.
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use todo_dispatch_core::{EventBus, TodoEvent};
//! use tokio_util::sync::CancellationToken;
//!
//! let bus = EventBus::<TodoEvent>::new();
//! let seen = Arc::new(AtomicUsize::new(0));
//! let token = CancellationToken::new();
//!
//! let counter = seen.clone();
//! bus.on("toast", Some(&token), move |_| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//!     Ok(())
//! });
//!
//! bus.publish(TodoEvent::toast("hello"));
//! token.cancel();
//! bus.publish(TodoEvent::toast("ignored"));
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::HandlerError;
use crate::sync::lock;
use crate::Action;

/// A bus handler. Compared by pointer identity for [`EventBus::unsubscribe`].
pub type Handler<E> = Arc<dyn Fn(&E) -> Result<(), HandlerError> + Send + Sync>;

/// Identifies one subscription on a bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Subscription<E> {
    id: SubscriptionId,
    handler: Handler<E>,
    cancel: Option<CancellationToken>,
}

impl<E> Subscription<E> {
    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

/// A handler that failed during a publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    pub event: &'static str,
    pub subscription: SubscriptionId,
    pub message: String,
    /// The handler panicked instead of returning an error
    pub panicked: bool,
}

/// Outcome of one [`EventBus::publish`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub event: &'static str,
    /// Number of handlers invoked
    pub delivered: usize,
    /// Handlers that returned an error or panicked
    pub failures: Vec<HandlerFailure>,
}

impl PublishReport {
    fn new(event: &'static str) -> Self {
        Self {
            event,
            delivered: 0,
            failures: Vec::new(),
        }
    }

    /// Returns true if every invoked handler succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Middleware trait for observing publishes
///
/// Implement this trait to add logging, recording, or other
/// cross-cutting concerns to a bus.
pub trait BusMiddleware<E: Action>: Send {
    /// Called before any handler runs
    fn before(&mut self, event: &E);

    /// Called after every handler ran
    fn after(&mut self, event: &E, report: &PublishReport);
}

/// A no-op middleware that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMiddleware;

impl<E: Action> BusMiddleware<E> for NoopMiddleware {
    fn before(&mut self, _event: &E) {}
    fn after(&mut self, _event: &E, _report: &PublishReport) {}
}

/// Middleware that logs publishes (for debugging)
#[derive(Debug, Clone, Default)]
pub struct LoggingMiddleware {
    /// Whether to log before handlers run
    pub log_before: bool,
    /// Whether to log after handlers ran
    pub log_after: bool,
}

impl LoggingMiddleware {
    /// Create a new logging middleware with default settings (log after only)
    pub fn new() -> Self {
        Self {
            log_before: false,
            log_after: true,
        }
    }

    /// Create a logging middleware that logs both before and after
    pub fn verbose() -> Self {
        Self {
            log_before: true,
            log_after: true,
        }
    }
}

impl<E: Action> BusMiddleware<E> for LoggingMiddleware {
    fn before(&mut self, event: &E) {
        if self.log_before {
            debug!(event = %event.name(), "Publishing event");
        }
    }

    fn after(&mut self, event: &E, report: &PublishReport) {
        if self.log_after {
            debug!(
                event = %event.name(),
                delivered = report.delivered,
                failures = report.failures.len(),
                "Event published"
            );
        }
    }
}

/// Compose multiple middleware into a single middleware
pub struct ComposedMiddleware<E: Action> {
    middlewares: Vec<Box<dyn BusMiddleware<E>>>,
}

impl<E: Action> fmt::Debug for ComposedMiddleware<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposedMiddleware")
            .field("middlewares_count", &self.middlewares.len())
            .finish()
    }
}

impl<E: Action> Default for ComposedMiddleware<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Action> ComposedMiddleware<E> {
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    /// Add a middleware to the composition
    pub fn add<M: BusMiddleware<E> + 'static>(&mut self, middleware: M) -> &mut Self {
        self.middlewares.push(Box::new(middleware));
        self
    }
}

impl<E: Action> BusMiddleware<E> for ComposedMiddleware<E> {
    fn before(&mut self, event: &E) {
        for middleware in &mut self.middlewares {
            middleware.before(event);
        }
    }

    fn after(&mut self, event: &E, report: &PublishReport) {
        // Reverse order for proper nesting
        for middleware in self.middlewares.iter_mut().rev() {
            middleware.after(event, report);
        }
    }
}

/// Typed publish/subscribe registry.
///
/// The bus is constructed explicitly and shared through an `Arc`; it lives
/// as long as the widget that created it.
pub struct EventBus<E: Action> {
    subscriptions: Mutex<HashMap<&'static str, Vec<Subscription<E>>>>,
    next_id: AtomicU64,
    middleware: Mutex<Box<dyn BusMiddleware<E>>>,
}

impl<E: Action> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subs = lock(&self.subscriptions);
        let counts: HashMap<&str, usize> = subs.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("EventBus")
            .field("subscriptions", &counts)
            .finish_non_exhaustive()
    }
}

impl<E: Action> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Action> EventBus<E> {
    /// Create a new event bus
    pub fn new() -> Self {
        Self::with_middleware(NoopMiddleware)
    }

    /// Create an event bus that reports every publish to `middleware`
    pub fn with_middleware<M: BusMiddleware<E> + 'static>(middleware: M) -> Self {
        Self {
            subscriptions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            middleware: Mutex::new(Box::new(middleware)),
        }
    }

    /// Subscribe a handler to an event name
    ///
    /// With a cancel token, the subscription is retracted as soon as the token
    /// is cancelled. Cancelling twice, or after an explicit unsubscribe, is harmless.
    pub fn subscribe(
        &self,
        event: &'static str,
        handler: Handler<E>,
        cancel: Option<&CancellationToken>,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut subs = lock(&self.subscriptions);
        let list = subs.entry(event).or_default();
        list.retain(|s| !s.is_cancelled());
        list.push(Subscription {
            id,
            handler,
            cancel: cancel.cloned(),
        });
        debug!(event, subscription = id.0, "subscribe");
        id
    }

    /// Subscribe a closure to an event name
    pub fn on<F>(
        &self,
        event: &'static str,
        cancel: Option<&CancellationToken>,
        handler: F,
    ) -> SubscriptionId
    where
        F: Fn(&E) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.subscribe(event, Arc::new(handler), cancel)
    }

    /// Remove the first subscription for `event` whose handler is `handler`
    ///
    /// Removing a handler that is not subscribed is a no-op.
    pub fn unsubscribe(&self, event: &'static str, handler: &Handler<E>) {
        let mut subs = lock(&self.subscriptions);
        if let Some(list) = subs.get_mut(event) {
            if let Some(pos) = list.iter().position(|s| Arc::ptr_eq(&s.handler, handler)) {
                let removed = list.remove(pos);
                debug!(event, subscription = removed.id.0, "unsubscribe");
            }
        }
    }

    /// Remove a subscription by id
    pub fn unsubscribe_id(&self, id: SubscriptionId) {
        let mut subs = lock(&self.subscriptions);
        for list in subs.values_mut() {
            list.retain(|s| s.id != id);
        }
    }

    /// Number of live subscriptions for an event name
    pub fn subscriber_count(&self, event: &str) -> usize {
        lock(&self.subscriptions)
            .get(event)
            .map(|list| list.iter().filter(|s| !s.is_cancelled()).count())
            .unwrap_or(0)
    }

    /// Drop every subscription whose cancel token has fired
    pub fn prune(&self) {
        let mut subs = lock(&self.subscriptions);
        for list in subs.values_mut() {
            list.retain(|s| !s.is_cancelled());
        }
        subs.retain(|_, list| !list.is_empty());
    }

    /// Publish an event to all handlers subscribed to its name
    ///
    /// Handlers run synchronously in registration order. A handler returning
    /// an error or panicking is logged and recorded in the report; the
    /// remaining handlers still run. Handlers may publish further events.
    pub fn publish(&self, event: E) -> PublishReport {
        let name = event.name();
        lock(&self.middleware).before(&event);

        let snapshot: Vec<(SubscriptionId, Handler<E>, Option<CancellationToken>)> = {
            let mut subs = lock(&self.subscriptions);
            match subs.get_mut(name) {
                Some(list) => {
                    list.retain(|s| !s.is_cancelled());
                    list.iter()
                        .map(|s| (s.id, s.handler.clone(), s.cancel.clone()))
                        .collect()
                }
                None => Vec::new(),
            }
        };

        let mut report = PublishReport::new(name);
        for (id, handler, cancel) in snapshot {
            // An earlier handler in this publish may have cancelled the scope
            if cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                continue;
            }
            report.delivered += 1;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(&event)));
            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some((err.to_string(), false)),
                Err(payload) => Some((panic_message(payload.as_ref()), true)),
            };
            if let Some((message, panicked)) = failure {
                warn!(event = name, subscription = id.0, panicked, %message, "handler failed");
                report.failures.push(HandlerFailure {
                    event: name,
                    subscription: id,
                    message,
                    panicked,
                });
            }
        }

        lock(&self.middleware).after(&event, &report);
        report
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TodoEvent;

    fn recorder(
        bus: &EventBus<TodoEvent>,
        event: &'static str,
        tag: &'static str,
        log: &Arc<Mutex<Vec<String>>>,
    ) -> Handler<TodoEvent> {
        let log = log.clone();
        let handler: Handler<TodoEvent> = Arc::new(move |e: &TodoEvent| -> Result<(), HandlerError> {
            log.lock().unwrap().push(format!("{tag}:{}", e.as_toast().unwrap_or("-")));
            Ok(())
        });
        bus.subscribe(event, handler.clone(), None);
        handler
    }

    #[test]
    fn test_publish_in_registration_order() {
        let bus = EventBus::<TodoEvent>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        recorder(&bus, "toast", "a", &log);
        recorder(&bus, "toast", "b", &log);
        recorder(&bus, "allclear", "c", &log);

        let report = bus.publish(TodoEvent::toast("hi"));

        assert_eq!(report.delivered, 2);
        assert!(report.is_clean());
        assert_eq!(*log.lock().unwrap(), vec!["a:hi", "b:hi"]);
    }

    #[test]
    fn test_unsubscribe_first_match_only() {
        let bus = EventBus::<TodoEvent>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler = recorder(&bus, "toast", "a", &log);
        bus.subscribe("toast", handler.clone(), None);
        assert_eq!(bus.subscriber_count("toast"), 2);

        bus.unsubscribe("toast", &handler);
        assert_eq!(bus.subscriber_count("toast"), 1);

        bus.publish(TodoEvent::toast("x"));
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_unsubscribe_missing_is_noop() {
        let bus = EventBus::<TodoEvent>::new();
        let stray: Handler<TodoEvent> = Arc::new(|_: &TodoEvent| -> Result<(), HandlerError> { Ok(()) });
        bus.unsubscribe("toast", &stray);
        bus.unsubscribe("never-registered", &stray);
        assert_eq!(bus.subscriber_count("toast"), 0);
    }

    #[test]
    fn test_cancel_token_retracts_only_its_subscriptions() {
        let bus = EventBus::<TodoEvent>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let scoped = CancellationToken::new();
        let other = CancellationToken::new();

        for (tag, token) in [("scoped", &scoped), ("other", &other)] {
            let log = log.clone();
            bus.on("allclear", Some(token), move |_| {
                log.lock().unwrap().push(tag);
                Ok(())
            });
        }

        scoped.cancel();
        scoped.cancel();
        bus.publish(TodoEvent::AllClear);

        assert_eq!(*log.lock().unwrap(), vec!["other"]);
        assert_eq!(bus.subscriber_count("allclear"), 1);
    }

    #[test]
    fn test_cancel_during_publish_skips_later_handler() {
        let bus = EventBus::<TodoEvent>::new();
        let token = CancellationToken::new();
        let ran = Arc::new(Mutex::new(false));

        let t = token.clone();
        bus.on("allclear", None, move |_| {
            t.cancel();
            Ok(())
        });
        let flag = ran.clone();
        bus.on("allclear", Some(&token), move |_| {
            *flag.lock().unwrap() = true;
            Ok(())
        });

        let report = bus.publish(TodoEvent::AllClear);
        assert_eq!(report.delivered, 1);
        assert!(!*ran.lock().unwrap());
    }

    #[test]
    fn test_failing_handler_is_isolated() {
        let bus = EventBus::<TodoEvent>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.on("toast", None, |_| Err(HandlerError::other("boom")));
        bus.on("toast", None, |_| panic!("kaboom"));
        recorder(&bus, "toast", "after", &log);

        let report = bus.publish(TodoEvent::toast("x"));

        assert_eq!(report.delivered, 3);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].message, "boom");
        assert!(!report.failures[0].panicked);
        assert_eq!(report.failures[1].message, "kaboom");
        assert!(report.failures[1].panicked);
        assert_eq!(*log.lock().unwrap(), vec!["after:x"]);
    }

    #[test]
    fn test_reentrant_publish() {
        let bus = Arc::new(EventBus::<TodoEvent>::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        recorder(&bus, "toast", "t", &log);

        let inner = Arc::downgrade(&bus);
        bus.on("addtodo", None, move |e| {
            if let (Some(bus), TodoEvent::AddTodo(key)) = (inner.upgrade(), e) {
                bus.publish(TodoEvent::toast(format!("added {key}")));
            }
            Ok(())
        });

        bus.publish(TodoEvent::AddTodo("milk".into()));
        assert_eq!(*log.lock().unwrap(), vec!["t:added milk"]);
    }

    #[derive(Default)]
    struct CountingMiddleware {
        before: Arc<Mutex<usize>>,
        after: Arc<Mutex<usize>>,
    }

    impl BusMiddleware<TodoEvent> for CountingMiddleware {
        fn before(&mut self, _event: &TodoEvent) {
            *self.before.lock().unwrap() += 1;
        }

        fn after(&mut self, _event: &TodoEvent, _report: &PublishReport) {
            *self.after.lock().unwrap() += 1;
        }
    }

    #[test]
    fn test_middleware_sees_every_publish() {
        let middleware = CountingMiddleware::default();
        let before = middleware.before.clone();
        let after = middleware.after.clone();
        let bus = EventBus::with_middleware(middleware);

        bus.publish(TodoEvent::AllClear);
        bus.publish(TodoEvent::toast("x"));

        assert_eq!(*before.lock().unwrap(), 2);
        assert_eq!(*after.lock().unwrap(), 2);
    }

    #[test]
    fn test_prune() {
        let bus = EventBus::<TodoEvent>::new();
        let token = CancellationToken::new();
        bus.on("toast", Some(&token), |_| Ok(()));
        let id = bus.on("allclear", None, |_| Ok(()));
        token.cancel();
        bus.prune();
        assert_eq!(bus.subscriber_count("toast"), 0);

        bus.unsubscribe_id(id);
        assert_eq!(bus.subscriber_count("allclear"), 0);
    }
}
