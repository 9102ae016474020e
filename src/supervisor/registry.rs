//! Registry of supervised requests and the timeout sweep.
//!
//! # Responsibilities
//! - Track live controller entries in registration order
//! - Keep at most one live entry per request handle
//! - Expire entries whose deadline passed, on demand or per sweep tick
//!
//! # Design Decisions
//! - One explicit instance per transport; no process-wide global
//! - Callbacks never run while the registry lock is held
//! - Entries without a timeout are a usage error: they are dropped and
//!   reported, and the rest of the tick still runs

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::config::SweepConfig;
use crate::supervisor::entry::ControllerEntry;
use crate::supervisor::types::{Notification, SupervisorError, SupervisorResult, SweepReport};
use crate::transport::RequestHandle;

/// Result of removing an entry from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Detach {
    /// This call removed and tombstoned the entry.
    Removed,
    /// The entry was tombstoned before this call.
    AlreadyDeleted,
    /// The entry is live but not in this registry.
    NotFound,
}

/// Supervises in-flight requests and times them out.
pub struct RequestSupervisor {
    name: String,
    interval: Duration,
    default_timeout: Option<Duration>,
    entries: Mutex<Vec<Arc<ControllerEntry>>>,
    /// Signalled when a registration lands on an empty registry.
    pub(crate) restart: Notify,
    ticks: AtomicU64,
}

impl RequestSupervisor {
    pub fn new(config: &SweepConfig) -> Self {
        Self {
            name: config.name.clone(),
            interval: Duration::from_millis(config.interval_ms),
            default_timeout: config.default_timeout_ms.map(Duration::from_millis),
            entries: Mutex::new(Vec::new()),
            restart: Notify::new(),
            ticks: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// Number of sweep ticks run so far, idle ones included.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<ControllerEntry>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_count(&self, count: usize) {
        metrics::gauge!("supervisor_active_requests", "supervisor" => self.name.clone()).set(count as f64);
    }

    /// Add `entry` unless it is tombstoned or its handle is already
    /// supervised here. Returns whether the entry was added.
    pub fn register(&self, entry: Arc<ControllerEntry>) -> bool {
        if entry.is_deleted() {
            tracing::debug!(supervisor = %self.name, handle = %entry.handle().id(), "Refusing to register a deleted entry");
            return false;
        }

        let mut entries = self.lock();
        if entries.iter().any(|e| e.handle().same_as(entry.handle())) {
            return false;
        }
        let was_empty = entries.is_empty();
        entries.push(entry.clone());
        let count = entries.len();
        drop(entries);

        if was_empty {
            self.restart.notify_one();
        }
        self.record_count(count);
        metrics::counter!("supervisor_registered_total", "supervisor" => self.name.clone()).increment(1);
        tracing::debug!(
            supervisor = %self.name,
            handle = %entry.handle().id(),
            timeout_ms = entry.timeout().map(|t| t.as_millis() as u64),
            count,
            "Request registered"
        );
        true
    }

    pub(crate) fn detach(&self, entry: &ControllerEntry) -> Detach {
        if entry.is_deleted() {
            return Detach::AlreadyDeleted;
        }

        let mut entries = self.lock();
        if entry.is_deleted() {
            return Detach::AlreadyDeleted;
        }
        match entries.iter().position(|e| std::ptr::eq(e.as_ref(), entry)) {
            Some(index) => {
                entries.remove(index);
                entry.mark_deleted();
                let count = entries.len();
                drop(entries);
                self.record_count(count);
                Detach::Removed
            }
            None => Detach::NotFound,
        }
    }

    /// Remove `entry`. Idempotent: a tombstoned entry returns `true`
    /// without further work. Returns `false` if the entry was never here.
    pub fn unregister(&self, entry: &ControllerEntry) -> bool {
        match self.detach(entry) {
            Detach::Removed | Detach::AlreadyDeleted => true,
            Detach::NotFound => false,
        }
    }

    /// Stop supervising whichever live entry wraps `handle`.
    pub fn stop_supervising(&self, handle: &RequestHandle) -> bool {
        let entry = self
            .lock()
            .iter()
            .find(|e| e.handle().same_as(handle))
            .cloned();
        match entry {
            Some(entry) => self.unregister(&entry),
            None => false,
        }
    }

    /// Number of live entries.
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    /// Whether this exact entry is live here.
    pub fn contains(&self, entry: &ControllerEntry) -> bool {
        self.lock().iter().any(|e| std::ptr::eq(e.as_ref(), entry))
    }

    pub fn is_supervising(&self, handle: &RequestHandle) -> bool {
        self.lock().iter().any(|e| e.handle().same_as(handle))
    }

    /// Drop every entry without notifying it. Dropped entries are
    /// tombstoned so they cannot come back.
    pub fn clear(&self) {
        let drained: Vec<_> = self.lock().drain(..).collect();
        for entry in &drained {
            entry.mark_deleted();
        }
        self.record_count(0);
        if !drained.is_empty() {
            tracing::info!(supervisor = %self.name, dropped = drained.len(), "Registry cleared");
        }
    }

    /// Notify each entry of a timeout, then unregister it, in order.
    /// Returns how many entries acted on the timeout.
    pub fn expire_all(&self, entries: &[Arc<ControllerEntry>], data: Option<serde_json::Value>) -> usize {
        let notification = Notification::timeout(data);
        let mut expired = 0;
        for entry in entries {
            if entry.on_expire(self, &notification) {
                expired += 1;
            }
            self.unregister(entry);
        }
        if expired > 0 {
            metrics::counter!("supervisor_expired_total", "supervisor" => self.name.clone())
                .increment(expired as u64);
        }
        expired
    }

    /// Time out every live entry now.
    pub fn expire_all_now(&self, data: Option<serde_json::Value>) -> usize {
        let snapshot = self.lock().clone();
        let expired = self.expire_all(&snapshot, data);
        tracing::info!(supervisor = %self.name, expired, "Expired all supervised requests");
        expired
    }

    /// Run one sweep tick as of now.
    pub fn sweep(&self) -> SupervisorResult<SweepReport> {
        self.sweep_at(Instant::now())
    }

    /// Run one sweep tick as of `now`.
    ///
    /// Victims are entries whose age exceeds their timeout; they are expired
    /// in registration order. Entries without a timeout are removed and
    /// reported as [`SupervisorError::MissingTimeout`] once the valid
    /// victims have been handled.
    pub fn sweep_at(&self, now: Instant) -> SupervisorResult<SweepReport> {
        self.ticks.fetch_add(1, Ordering::Relaxed);

        let mut victims = Vec::new();
        let mut invalid = Vec::new();
        let inspected = {
            let mut entries = self.lock();
            if entries.is_empty() {
                return Ok(SweepReport::default());
            }
            let inspected = entries.len();

            for entry in entries.iter() {
                match entry.is_expired_at(now) {
                    Some(true) => victims.push(entry.clone()),
                    Some(false) => {}
                    None => invalid.push(entry.clone()),
                }
            }

            if !invalid.is_empty() {
                entries.retain(|e| e.timeout().is_some());
                for entry in &invalid {
                    entry.mark_deleted();
                }
            }
            inspected
        };

        let expired = self.expire_all(&victims, None);
        let report = SweepReport { inspected, expired };
        tracing::trace!(supervisor = %self.name, inspected, expired, "Sweep tick");

        if invalid.is_empty() {
            return Ok(report);
        }

        self.record_count(self.count());
        metrics::counter!("supervisor_usage_errors_total", "supervisor" => self.name.clone())
            .increment(invalid.len() as u64);
        let handles: Vec<_> = invalid.iter().map(|e| e.handle().id()).collect();
        for entry in &invalid {
            tracing::error!(
                supervisor = %self.name,
                handle = %entry.handle().id(),
                url = %entry.handle().url(),
                "Request registered without a timeout; dropped from supervision"
            );
        }
        Err(SupervisorError::MissingTimeout {
            supervisor: self.name.clone(),
            handles,
        })
    }
}

impl std::fmt::Debug for RequestSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSupervisor")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("count", &self.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::types::TimeoutCallback;
    use crate::transport::Method;
    use std::sync::atomic::AtomicUsize;

    fn supervisor() -> RequestSupervisor {
        RequestSupervisor::new(&SweepConfig::new("test", 1000))
    }

    fn counter() -> (Arc<AtomicUsize>, TimeoutCallback) {
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        (fired, Arc::new(move |_: &Notification| {
            f.fetch_add(1, Ordering::SeqCst);
        }))
    }

    fn entry(timeout_ms: Option<u64>, on_timeout: Option<TimeoutCallback>) -> Arc<ControllerEntry> {
        Arc::new(ControllerEntry::new(
            RequestHandle::new(Method::Get, "/api"),
            timeout_ms.map(Duration::from_millis),
            on_timeout,
        ))
    }

    #[test]
    fn test_duplicate_handle_is_ignored() {
        let sup = supervisor();
        let first = entry(Some(1000), None);
        let second = Arc::new(ControllerEntry::new(first.handle().clone(), Some(Duration::from_secs(5)), None));

        assert!(sup.register(first.clone()));
        assert!(!sup.register(first.clone()));
        assert!(!sup.register(second));
        assert_eq!(sup.count(), 1);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let sup = supervisor();
        let (fired, cb) = counter();
        let e = entry(Some(1000), Some(cb));
        sup.register(e.clone());

        assert!(sup.unregister(&e));
        assert!(sup.unregister(&e));
        assert_eq!(sup.count(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!e.handle().is_complete());
    }

    #[test]
    fn test_unregister_unknown_entry() {
        let sup = supervisor();
        assert!(!sup.unregister(&entry(Some(1000), None)));
    }

    #[test]
    fn test_deleted_entry_is_never_resurrected() {
        let sup = supervisor();
        let e = entry(Some(1000), None);
        sup.register(e.clone());
        sup.unregister(&e);

        assert!(!sup.register(e));
        assert_eq!(sup.count(), 0);
    }

    #[test]
    fn test_stop_supervising_by_handle() {
        let sup = supervisor();
        let e = entry(Some(1000), None);
        sup.register(e.clone());

        assert!(sup.is_supervising(e.handle()));
        assert!(sup.stop_supervising(e.handle()));
        assert!(!sup.stop_supervising(e.handle()));
        assert!(e.is_deleted());
    }

    #[test]
    fn test_clear_does_not_notify() {
        let sup = supervisor();
        let (fired, cb) = counter();
        let a = entry(Some(1), Some(cb.clone()));
        let b = entry(Some(1), Some(cb));
        sup.register(a.clone());
        sup.register(b.clone());

        sup.clear();

        assert_eq!(sup.count(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(a.is_deleted() && b.is_deleted());
        assert!(sup.unregister(&a));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_expires_only_overdue_entries() {
        let sup = supervisor();
        let (fired, cb) = counter();
        let short = entry(Some(1000), Some(cb.clone()));
        let long = entry(Some(5000), Some(cb));
        sup.register(short.clone());
        sup.register(long.clone());
        let t0 = short.registered_at();

        let report = sup.sweep_at(t0 + Duration::from_millis(1000)).unwrap();
        assert_eq!(report, SweepReport { inspected: 2, expired: 0 });

        let report = sup.sweep_at(t0 + Duration::from_millis(1500)).unwrap();
        assert_eq!(report, SweepReport { inspected: 2, expired: 1 });
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(sup.count(), 1);
        assert_eq!(short.handle().outcome(), Some(crate::transport::Outcome::Aborted));
        assert!(!long.handle().is_complete());
    }

    #[test]
    fn test_idle_sweep_does_nothing() {
        let sup = supervisor();
        let report = sup.sweep().unwrap();
        assert!(report.is_idle());
        assert_eq!(sup.ticks(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_timeout_does_not_starve_valid_entries() {
        let sup = supervisor();
        let (fired, cb) = counter();
        let broken = entry(None, Some(cb.clone()));
        let valid = entry(Some(10), Some(cb));
        sup.register(broken.clone());
        sup.register(valid.clone());

        let err = sup
            .sweep_at(Instant::now() + Duration::from_millis(50))
            .unwrap_err();

        assert_eq!(
            err,
            SupervisorError::MissingTimeout {
                supervisor: "test".into(),
                handles: vec![broken.handle().id()],
            }
        );
        // The valid entry still expired; the broken one was dropped silently.
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(valid.handle().is_complete());
        assert!(!broken.handle().is_complete());
        assert!(broken.is_deleted());
        assert_eq!(sup.count(), 0);
    }

    #[test]
    fn test_expire_all_now_fires_each_once() {
        let sup = supervisor();
        let (fired, cb) = counter();
        let entries: Vec<_> = (0..3).map(|_| entry(Some(60_000), Some(cb.clone()))).collect();
        for e in &entries {
            sup.register(e.clone());
        }

        assert_eq!(sup.expire_all_now(Some(serde_json::json!({"reason": "shutdown"}))), 3);
        assert_eq!(sup.expire_all_now(None), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 3);
        assert_eq!(sup.count(), 0);
    }

    #[test]
    fn test_expire_all_passes_data_in_order() {
        let sup = supervisor();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut entries = Vec::new();
        for i in 0..3 {
            let seen = seen.clone();
            let cb: TimeoutCallback = Arc::new(move |n: &Notification| {
                seen.lock().unwrap().push((i, n.data.clone()));
            });
            let e = entry(Some(1000), Some(cb));
            sup.register(e.clone());
            entries.push(e);
        }

        sup.expire_all(&entries, Some(serde_json::json!(7)));

        let seen = seen.lock().unwrap();
        let order: Vec<_> = seen.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert!(seen.iter().all(|(_, d)| d == &Some(serde_json::json!(7))));
    }

    #[test]
    fn test_callback_may_reenter_supervisor() {
        let sup = Arc::new(supervisor());
        let inner = sup.clone();
        let cb: TimeoutCallback = Arc::new(move |_: &Notification| {
            // Re-registering a retry from inside the callback must not deadlock.
            inner.register(entry(Some(1000), None));
        });
        sup.register(entry(Some(1000), Some(cb)));

        assert_eq!(sup.expire_all_now(None), 1);
        assert_eq!(sup.count(), 1);
    }

    #[test]
    fn test_poisoned_registry_keeps_working() {
        let sup = Arc::new(supervisor());
        sup.register(entry(Some(1000), None));

        let poisoner = sup.clone();
        let result = std::thread::spawn(move || {
            let _guard = poisoner.entries.lock().unwrap();
            panic!("panic while holding the registry lock");
        })
        .join();
        assert!(result.is_err());
        assert!(sup.entries.is_poisoned());

        assert!(sup.register(entry(Some(1000), None)));
        assert_eq!(sup.count(), 2);
        assert_eq!(sup.expire_all_now(None), 2);
        assert_eq!(sup.count(), 0);
    }
}
