//! Bridges one request handle to a supervisor.

use std::sync::Arc;

use crate::supervisor::entry::ControllerEntry;
use crate::supervisor::registry::RequestSupervisor;
use crate::supervisor::types::{ControllerOptions, Notification};
use crate::transport::RequestHandle;

/// Supervises one request. Registers itself on construction.
///
/// Call [`unregister`](Self::unregister) when the request completes
/// normally; otherwise the supervisor cancels it once its timeout passes
/// and runs the `on_timeout` callback.
#[derive(Debug)]
pub struct RequestController {
    supervisor: Arc<RequestSupervisor>,
    entry: Arc<ControllerEntry>,
}

impl RequestController {
    /// Create and register a controller. A missing timeout falls back to
    /// the supervisor's default.
    pub fn new(
        supervisor: &Arc<RequestSupervisor>,
        handle: RequestHandle,
        options: ControllerOptions,
    ) -> Self {
        let timeout = options.timeout.or(supervisor.default_timeout());
        let entry = Arc::new(ControllerEntry::new(handle, timeout, options.on_timeout));
        supervisor.register(entry.clone());
        Self {
            supervisor: supervisor.clone(),
            entry,
        }
    }

    /// Handle a supervisor notification. Anything other than a timeout is
    /// ignored; a timeout unregisters, cancels and calls `on_timeout`.
    pub fn on_expire(&self, notification: &Notification) -> bool {
        self.entry.on_expire(&self.supervisor, notification)
    }

    /// Stop supervising. Idempotent.
    pub fn unregister(&self) -> bool {
        if self.entry.is_deleted() {
            return true;
        }
        self.supervisor.unregister(&self.entry)
    }

    /// Whether this controller's entry is live in the registry.
    pub fn is_registered(&self) -> bool {
        !self.entry.is_deleted() && self.supervisor.contains(&self.entry)
    }

    pub fn handle(&self) -> &RequestHandle {
        self.entry.handle()
    }

    pub fn entry(&self) -> &Arc<ControllerEntry> {
        &self.entry
    }

    pub fn supervisor(&self) -> &Arc<RequestSupervisor> {
        &self.supervisor
    }
}
