//! Error types for todo-dispatch

use thiserror::Error;

/// Recoverable policy violations raised by list operations.
///
/// None of these are fatal: the operation is aborted, nothing is committed,
/// and the widget reports the problem as a toast.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TodoError {
    /// Another live item already holds the key
    #[error("todo {key} exists")]
    DuplicateKey { key: String },

    /// Keys must contain something other than whitespace
    #[error("todo text is empty")]
    EmptyKey,

    /// The target was removed before the operation reached it
    #[error("todo {key} no longer exists")]
    StaleReference { key: String },
}

impl TodoError {
    pub fn duplicate(key: impl Into<String>) -> Self {
        TodoError::DuplicateKey { key: key.into() }
    }

    pub fn stale(key: impl Into<String>) -> Self {
        TodoError::StaleReference { key: key.into() }
    }

    /// Text shown to the user as a toast.
    pub fn toast_message(&self) -> String {
        format!("error: {self}")
    }
}

/// Error returned by a bus handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error(transparent)]
    Todo(#[from] TodoError),

    #[error("{0}")]
    Other(String),
}

impl HandlerError {
    pub fn other(message: impl Into<String>) -> Self {
        HandlerError::Other(message.into())
    }
}

/// Configuration loading failed
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid widget config: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("invalid value for {name}: {value}")]
    Env { name: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toast_message() {
        assert_eq!(
            TodoError::duplicate("milk").toast_message(),
            "error: todo milk exists"
        );
        assert_eq!(TodoError::EmptyKey.to_string(), "todo text is empty");
    }

    #[test]
    fn test_handler_error_from_todo() {
        let err: HandlerError = TodoError::stale("x").into();
        assert_eq!(err.to_string(), "todo x no longer exists");
    }
}
