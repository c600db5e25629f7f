//! Drag payload channel
//!
//! A drag carries one piece of text, the dragged item's key, from the drag
//! source to the drop target. The payload is read at most once.

use std::sync::Mutex;

use tracing::debug;

use crate::sync::lock;
use crate::view::NodeHandle;

/// What a drag started with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DragPayload {
    /// Node the drag started on
    pub source: NodeHandle,
    /// Key of the dragged item at drag start
    pub key: String,
}

/// Holds the payload of the drag in progress, if any.
#[derive(Debug, Default)]
pub struct DragSession {
    payload: Mutex<Option<DragPayload>>,
}

impl DragSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a drag, replacing any unfinished one
    pub fn start(&self, source: NodeHandle, key: impl Into<String>) {
        let key = key.into();
        debug!(key = %key, node = source.0, "drag start");
        *lock(&self.payload) = Some(DragPayload { source, key });
    }

    /// Read the payload, ending the drag
    pub fn take(&self) -> Option<DragPayload> {
        lock(&self.payload).take()
    }

    /// Key being dragged, without ending the drag
    pub fn dragging(&self) -> Option<String> {
        lock(&self.payload).as_ref().map(|p| p.key.clone())
    }

    pub fn is_active(&self) -> bool {
        lock(&self.payload).is_some()
    }

    /// Abandon the drag
    pub fn cancel(&self) {
        if let Some(payload) = self.take() {
            debug!(key = %payload.key, "drag cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_read_once() {
        let session = DragSession::new();
        assert!(session.take().is_none());

        session.start(NodeHandle(7), "milk");
        assert!(session.is_active());
        assert_eq!(session.dragging().as_deref(), Some("milk"));

        let payload = session.take().unwrap();
        assert_eq!(payload.source, NodeHandle(7));
        assert_eq!(payload.key, "milk");
        assert!(session.take().is_none());
        assert!(!session.is_active());
    }

    #[test]
    fn test_restart_replaces_payload() {
        let session = DragSession::new();
        session.start(NodeHandle(1), "a");
        session.start(NodeHandle(2), "b");
        assert_eq!(session.take().map(|p| p.key), Some("b".to_string()));

        session.start(NodeHandle(3), "c");
        session.cancel();
        assert!(session.take().is_none());
    }
}
