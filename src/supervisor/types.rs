//! Supervisor types and error definitions.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::transport::HandleId;

/// Signal delivered to a controller by its supervisor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Notification {
    /// Only timeouts are acted on; anything else is ignored.
    pub timed_out: bool,
    /// Caller-supplied context passed through `expire_all`.
    pub data: Option<serde_json::Value>,
}

impl Notification {
    pub fn timeout(data: Option<serde_json::Value>) -> Self {
        Self {
            timed_out: true,
            data,
        }
    }
}

/// Callback fired once when a supervised request times out.
pub type TimeoutCallback = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Per-request supervision settings.
#[derive(Clone, Default)]
pub struct ControllerOptions {
    pub timeout: Option<Duration>,
    pub on_timeout: Option<TimeoutCallback>,
}

impl ControllerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout_ms(self, ms: u64) -> Self {
        self.timeout(Duration::from_millis(ms))
    }

    pub fn on_timeout<F>(mut self, f: F) -> Self
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.on_timeout = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for ControllerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerOptions")
            .field("timeout", &self.timeout)
            .field("on_timeout", &self.on_timeout.is_some())
            .finish()
    }
}

/// Result of one sweep tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries looked at.
    pub inspected: usize,
    /// Entries whose timeout fired during this tick.
    pub expired: usize,
}

impl SweepReport {
    pub fn is_idle(&self) -> bool {
        self.inspected == 0
    }
}

/// Errors raised by a supervisor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SupervisorError {
    /// Entries reached the sweep without a timeout. They were dropped from
    /// the registry; the rest of the tick still ran.
    #[error("supervisor `{supervisor}`: {} request(s) registered without a timeout", .handles.len())]
    MissingTimeout {
        supervisor: String,
        handles: Vec<HandleId>,
    },
}

pub type SupervisorResult<T> = Result<T, SupervisorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_builder() {
        let options = ControllerOptions::new().timeout_ms(1500).on_timeout(|_| {});
        assert_eq!(options.timeout, Some(Duration::from_millis(1500)));
        assert!(options.on_timeout.is_some());
    }

    #[test]
    fn test_error_display() {
        let err = SupervisorError::MissingTimeout {
            supervisor: "ajax".into(),
            handles: vec![],
        };
        assert!(err.to_string().starts_with("supervisor `ajax`"));
    }

    #[test]
    fn test_default_notification_is_not_a_timeout() {
        assert!(!Notification::default().timed_out);
        assert!(Notification::timeout(None).timed_out);
    }
}
