//! Widget configuration

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Environment variable that forces reduced motion (`1`/`true`/`0`/`false`)
pub const REDUCED_MOTION_ENV: &str = "TODO_REDUCED_MOTION";

/// Process-wide timing and display settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetConfig {
    /// Length of enter, exit and glide transitions
    pub transition: Duration,
    /// How long a toast stays before its exit transition
    pub toast_display: Duration,
    /// Collapse every transition to zero
    pub reduced_motion: bool,
    /// Number of toast messages kept in the notifier history
    pub toast_history: usize,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            transition: Duration::from_millis(500),
            toast_display: Duration::from_millis(1000),
            reduced_motion: false,
            toast_history: 50,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    transition_ms: Option<u64>,
    toast_ms: Option<u64>,
    reduced_motion: Option<bool>,
    toast_history: Option<usize>,
}

impl WidgetConfig {
    pub fn with_transition(mut self, transition: Duration) -> Self {
        self.transition = transition;
        self
    }

    pub fn with_toast_display(mut self, toast_display: Duration) -> Self {
        self.toast_display = toast_display;
        self
    }

    pub fn with_reduced_motion(mut self, reduced_motion: bool) -> Self {
        self.reduced_motion = reduced_motion;
        self
    }

    pub fn with_toast_history(mut self, toast_history: usize) -> Self {
        self.toast_history = toast_history;
        self
    }

    /// Transition length actually used: zero under reduced motion.
    pub fn effective_transition(&self) -> Duration {
        if self.reduced_motion {
            Duration::ZERO
        } else {
            self.transition
        }
    }

    /// Returns true if transitions complete synchronously.
    pub fn is_instant(&self) -> bool {
        self.effective_transition().is_zero()
    }

    /// Parse a JSON config. Missing fields keep their defaults.
    ///
    /// ```
    /// use std::time::Duration;
    /// use todo_dispatch_core::WidgetConfig;
    ///
    /// let config = WidgetConfig::from_json(r#"{"transition_ms": 200, "reduced_motion": true}"#).unwrap();
    /// assert_eq!(config.transition, Duration::from_millis(200));
    /// assert!(config.is_instant());
    /// ```
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(json)?;
        let defaults = Self::default();
        Ok(Self {
            transition: raw
                .transition_ms
                .map_or(defaults.transition, Duration::from_millis),
            toast_display: raw
                .toast_ms
                .map_or(defaults.toast_display, Duration::from_millis),
            reduced_motion: raw.reduced_motion.unwrap_or(defaults.reduced_motion),
            toast_history: raw.toast_history.unwrap_or(defaults.toast_history),
        })
    }

    /// Apply overrides from the process environment
    pub fn from_env(self) -> Result<Self, ConfigError> {
        self.apply_env(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(REDUCED_MOTION_ENV) {
            self.reduced_motion = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "reduce" => true,
                "0" | "false" | "no" | "" => false,
                _ => {
                    return Err(ConfigError::Env {
                        name: REDUCED_MOTION_ENV,
                        value,
                    })
                }
            };
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WidgetConfig::default();
        assert_eq!(config.effective_transition(), Duration::from_millis(500));
        assert_eq!(config.toast_display, Duration::from_millis(1000));
        assert!(!config.is_instant());
    }

    #[test]
    fn test_reduced_motion_collapses_transition() {
        let config = WidgetConfig::default().with_reduced_motion(true);
        assert_eq!(config.transition, Duration::from_millis(500));
        assert_eq!(config.effective_transition(), Duration::ZERO);
    }

    #[test]
    fn test_from_json_partial() {
        let config = WidgetConfig::from_json(r#"{"toast_ms": 250, "toast_history": 3}"#).unwrap();
        assert_eq!(config.toast_display, Duration::from_millis(250));
        assert_eq!(config.toast_history, 3);
        assert_eq!(config.transition, Duration::from_millis(500));
    }

    #[test]
    fn test_from_json_rejects_unknown_fields() {
        assert!(WidgetConfig::from_json(r#"{"speed": 1}"#).is_err());
    }

    #[test]
    fn test_apply_env() {
        let config = WidgetConfig::default()
            .apply_env(|name| (name == REDUCED_MOTION_ENV).then(|| "true".to_string()))
            .unwrap();
        assert!(config.reduced_motion);

        let err = WidgetConfig::default()
            .apply_env(|_| Some("sometimes".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { .. }));

        let untouched = WidgetConfig::default().apply_env(|_| None).unwrap();
        assert_eq!(untouched, WidgetConfig::default());
    }
}
