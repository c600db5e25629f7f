//! Event logging with pattern-based filtering and in-memory storage
//!
//! [`EventLog`] is a bus middleware that records published events in a ring
//! buffer, filtered by glob patterns on the event name. The log is a cheap
//! handle: clone it, install one clone on the bus, read from the other.
//!
//! # Example
//!
//! ```
//! use todo_dispatch_core::event_log::{EventLog, EventLogConfig, EventLogFilter};
//! use todo_dispatch_core::{EventBus, TodoEvent};
//!
//! let log = EventLog::new(EventLogConfig::new(10, EventLogFilter::new(None, Some("toast"))));
//! let bus = EventBus::with_middleware(log.clone());
//!
//! bus.publish(TodoEvent::toast("hidden"));
//! bus.publish(TodoEvent::AllClear);
//!
//! let names: Vec<_> = log.recent(10).iter().map(|e| e.name).collect();
//! assert_eq!(names, vec!["allclear"]);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::bus::{BusMiddleware, PublishReport};
use crate::sync::lock;
use crate::Action;

/// Include/exclude glob patterns over event names.
///
/// Patterns support:
/// - `*` matches any sequence of characters
/// - `?` matches any single character
/// - Literal text matches exactly
#[derive(Debug, Clone, Default)]
pub struct EventLogFilter {
    /// If non-empty, only record events matching these patterns
    pub include_patterns: Vec<String>,
    /// Skip events matching these patterns (applied after include)
    pub exclude_patterns: Vec<String>,
}

impl EventLogFilter {
    /// Create a filter from comma-separated pattern strings
    ///
    /// ```
    /// use todo_dispatch_core::event_log::EventLogFilter;
    ///
    /// let filter = EventLogFilter::new(Some("*todo*"), Some("addtodo"));
    /// assert!(filter.should_log("removetodo"));
    /// assert!(filter.should_log("todo-done-state-changed"));
    /// assert!(!filter.should_log("addtodo"));
    /// assert!(!filter.should_log("toast"));
    /// ```
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Self {
        Self {
            include_patterns: split_patterns(include),
            exclude_patterns: split_patterns(exclude),
        }
    }

    /// Check if an event name passes the include/exclude patterns
    pub fn should_log(&self, name: &str) -> bool {
        if !self.include_patterns.is_empty()
            && !self.include_patterns.iter().any(|p| glob_match(p, name))
        {
            return false;
        }
        !self.exclude_patterns.iter().any(|p| glob_match(p, name))
    }
}

fn split_patterns(patterns: Option<&str>) -> Vec<String> {
    patterns
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// An entry in the event log
#[derive(Debug, Clone)]
pub struct EventLogEntry {
    /// Event name (from Action::name())
    pub name: &'static str,
    /// Debug rendering of the event
    pub summary: String,
    pub timestamp: Instant,
    /// Sequence number for ordering
    pub sequence: u64,
    /// Handlers invoked (set after the publish finished)
    pub delivered: Option<usize>,
    /// Handler failures during the publish
    pub failures: usize,
}

impl EventLogEntry {
    /// Time since this event was logged
    pub fn elapsed(&self) -> Duration {
        self.timestamp.elapsed()
    }

    /// Format the elapsed time for display (e.g., "2.3s", "150ms")
    pub fn elapsed_display(&self) -> String {
        let elapsed = self.elapsed();
        if elapsed.as_secs() >= 1 {
            format!("{:.1}s", elapsed.as_secs_f64())
        } else {
            format!("{}ms", elapsed.as_millis())
        }
    }
}

/// Configuration for the event log ring buffer
#[derive(Debug, Clone)]
pub struct EventLogConfig {
    /// Maximum number of entries to keep
    pub capacity: usize,
    pub filter: EventLogFilter,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            filter: EventLogFilter::default(),
        }
    }
}

impl EventLogConfig {
    pub fn new(capacity: usize, filter: EventLogFilter) -> Self {
        Self { capacity, filter }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }
}

#[derive(Debug)]
struct LogState {
    entries: VecDeque<EventLogEntry>,
    config: EventLogConfig,
    next_sequence: u64,
    /// Sequence numbers of entries awaiting their publish report, innermost last
    pending: Vec<u64>,
}

/// Shared in-memory ring buffer of recent events
///
/// Older entries are discarded when capacity is reached.
#[derive(Debug, Clone)]
pub struct EventLog {
    state: Arc<Mutex<LogState>>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(EventLogConfig::default())
    }
}

impl EventLog {
    pub fn new(config: EventLogConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(LogState {
                entries: VecDeque::with_capacity(config.capacity),
                config,
                next_sequence: 0,
                pending: Vec::new(),
            })),
        }
    }

    /// Record an event (if it passes the filter)
    ///
    /// Returns the sequence number if it was recorded.
    pub fn record<E: Action>(&self, event: &E) -> Option<u64> {
        let mut state = lock(&self.state);
        let name = event.name();
        if !state.config.filter.should_log(name) {
            return None;
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        if state.config.capacity == 0 {
            return None;
        }
        if state.entries.len() >= state.config.capacity {
            state.entries.pop_front();
        }
        state.entries.push_back(EventLogEntry {
            name,
            summary: format!("{event:?}"),
            timestamp: Instant::now(),
            sequence,
            delivered: None,
            failures: 0,
        });
        Some(sequence)
    }

    fn complete(&self, sequence: u64, report: &PublishReport) {
        let mut state = lock(&self.state);
        if let Some(entry) = state.entries.iter_mut().find(|e| e.sequence == sequence) {
            entry.delivered = Some(report.delivered);
            entry.failures = report.failures.len();
        }
    }

    /// Most recent `count` entries, newest first
    pub fn recent(&self, count: usize) -> Vec<EventLogEntry> {
        lock(&self.state)
            .entries
            .iter()
            .rev()
            .take(count)
            .cloned()
            .collect()
    }

    /// All entries, oldest first
    pub fn entries(&self) -> Vec<EventLogEntry> {
        lock(&self.state).entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.state).entries.is_empty()
    }

    pub fn clear(&self) {
        lock(&self.state).entries.clear();
    }
}

impl<E: Action> BusMiddleware<E> for EventLog {
    fn before(&mut self, event: &E) {
        let name = event.name();
        let recorded = self.record(event);
        if recorded.is_some() {
            tracing::debug!(event = %name, "event");
        }
        // Publishes nest, so pending reports resolve innermost first
        lock(&self.state).pending.push(recorded.unwrap_or(u64::MAX));
    }

    fn after(&mut self, _event: &E, report: &PublishReport) {
        let sequence = lock(&self.state).pending.pop();
        if let Some(sequence) = sequence.filter(|s| *s != u64::MAX) {
            self.complete(sequence, report);
        }
    }
}

/// Simple glob pattern matching supporting `*` and `?`.
///
/// - `*` matches zero or more characters
/// - `?` matches exactly one character
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let mut pi = 0;
    let mut ti = 0;
    let mut star_pi = None;
    let mut star_ti = 0;

    while ti < text.len() {
        if pi < pattern.len() && (pattern[pi] == '?' || pattern[pi] == text[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < pattern.len() && pattern[pi] == '*' {
            star_pi = Some(pi);
            star_ti = ti;
            pi += 1;
        } else if let Some(spi) = star_pi {
            pi = spi + 1;
            star_ti += 1;
            ti = star_ti;
        } else {
            return false;
        }
    }

    while pi < pattern.len() && pattern[pi] == '*' {
        pi += 1;
    }

    pi == pattern.len()
}
