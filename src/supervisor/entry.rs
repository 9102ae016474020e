//! Registry entry for one supervised request.
//!
//! # State Transitions
//! ```text
//! Registered → Unregistered   (controller or caller stops supervising)
//! Registered → Expired        (sweep or expire_all fires the timeout)
//! ```
//! Both terminal states set the tombstone; nothing leads back to
//! Registered.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::supervisor::registry::{Detach, RequestSupervisor};
use crate::supervisor::types::{Notification, TimeoutCallback};
use crate::transport::RequestHandle;

/// A supervised request: its handle, when it was registered, and what to do
/// when it times out.
pub struct ControllerEntry {
    handle: RequestHandle,
    registered_at: Instant,
    timeout: Option<Duration>,
    on_timeout: Option<TimeoutCallback>,
    deleted: AtomicBool,
}

impl ControllerEntry {
    pub fn new(
        handle: RequestHandle,
        timeout: Option<Duration>,
        on_timeout: Option<TimeoutCallback>,
    ) -> Self {
        Self {
            handle,
            registered_at: Instant::now(),
            timeout,
            on_timeout,
            deleted: AtomicBool::new(false),
        }
    }

    pub fn handle(&self) -> &RequestHandle {
        &self.handle
    }

    pub fn registered_at(&self) -> Instant {
        self.registered_at
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Tombstone flag. Once set it is never cleared.
    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    /// Set the tombstone; returns whether it was already set.
    pub(crate) fn mark_deleted(&self) -> bool {
        self.deleted.swap(true, Ordering::AcqRel)
    }

    /// Whether the entry's deadline has passed at `now`. `None` when the
    /// entry has no timeout and so can never expire by sweep.
    pub fn is_expired_at(&self, now: Instant) -> Option<bool> {
        let timeout = self.timeout?;
        Some(now.saturating_duration_since(self.registered_at) > timeout)
    }

    /// React to a supervisor notification.
    ///
    /// Ignored when the entry is already tombstoned or the notification is
    /// not a timeout. Otherwise the entry is unregistered, the request is
    /// cancelled (fire-and-forget) and the timeout callback runs. Returns
    /// whether the timeout was acted on; at most one caller ever sees `true`.
    pub(crate) fn on_expire(&self, supervisor: &RequestSupervisor, notification: &Notification) -> bool {
        if self.is_deleted() || !notification.timed_out {
            return false;
        }

        match supervisor.detach(self) {
            Detach::Removed => {}
            Detach::AlreadyDeleted => return false,
            // Never made it into the registry (duplicate handle); the
            // tombstone alone decides who acts.
            Detach::NotFound => {
                if self.mark_deleted() {
                    return false;
                }
            }
        }

        self.handle.cancel();
        tracing::info!(
            supervisor = %supervisor.name(),
            handle = %self.handle.id(),
            url = %self.handle.url(),
            elapsed_ms = self.registered_at.elapsed().as_millis() as u64,
            "Request timed out"
        );

        if let Some(on_timeout) = &self.on_timeout {
            on_timeout(notification);
        }
        true
    }
}

impl fmt::Debug for ControllerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerEntry")
            .field("handle", &self.handle)
            .field("timeout", &self.timeout)
            .field("deleted", &self.is_deleted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Method;

    #[tokio::test(start_paused = true)]
    async fn test_expiry_is_strictly_after_timeout() {
        let entry = ControllerEntry::new(
            RequestHandle::new(Method::Get, "/api"),
            Some(Duration::from_millis(1000)),
            None,
        );
        let t0 = entry.registered_at();

        assert_eq!(entry.is_expired_at(t0), Some(false));
        assert_eq!(entry.is_expired_at(t0 + Duration::from_millis(1000)), Some(false));
        assert_eq!(entry.is_expired_at(t0 + Duration::from_millis(1001)), Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_timeout_never_expires() {
        let entry = ControllerEntry::new(RequestHandle::new(Method::Get, "/api"), None, None);
        assert_eq!(entry.is_expired_at(Instant::now() + Duration::from_secs(3600)), None);
    }

    #[test]
    fn test_tombstone_is_sticky() {
        let entry = ControllerEntry::new(RequestHandle::new(Method::Get, "/api"), None, None);
        assert!(!entry.mark_deleted());
        assert!(entry.mark_deleted());
        assert!(entry.is_deleted());
    }
}
