//! Handle for one in-flight network operation.
//!
//! # Responsibilities
//! - Give every operation a stable identity
//! - Record the terminal outcome exactly once
//! - Wrap the abort primitive behind an idempotent `cancel`
//!
//! # Design Decisions
//! - Completion and cancellation race on one atomic flag; the first wins
//! - Late completions after a cancel are dropped, never re-delivered
//! - Waiters share a watch channel, so a deduplicated handle fans out

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use uuid::Uuid;

use crate::transport::types::{Method, Outcome};

/// Identity of a [`RequestHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct HandleId(Uuid);

impl HandleId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Primitive that stops the underlying transport work.
pub trait Abort: Send + Sync + 'static {
    fn abort(&self);
}

impl Abort for tokio::task::AbortHandle {
    fn abort(&self) {
        tokio::task::AbortHandle::abort(self);
    }
}

struct HandleInner {
    id: HandleId,
    method: Method,
    url: String,
    complete: AtomicBool,
    aborter: Mutex<Option<Box<dyn Abort>>>,
    outcome: watch::Sender<Option<Outcome>>,
}

/// A shared reference to one outstanding request.
///
/// Clones refer to the same operation; equality is identity.
#[derive(Clone)]
pub struct RequestHandle {
    inner: Arc<HandleInner>,
}

impl RequestHandle {
    /// Create a pending handle. Transports attach their abort primitive once
    /// the work is spawned.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        let (outcome, _) = watch::channel(None);
        Self {
            inner: Arc::new(HandleInner {
                id: HandleId::new(),
                method,
                url: url.into(),
                complete: AtomicBool::new(false),
                aborter: Mutex::new(None),
                outcome,
            }),
        }
    }

    pub fn id(&self) -> HandleId {
        self.inner.id
    }

    pub fn method(&self) -> Method {
        self.inner.method
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn is_complete(&self) -> bool {
        self.inner.complete.load(Ordering::Acquire)
    }

    /// Attach the abort primitive. If the handle already completed (most
    /// likely cancelled before the primitive existed), it is fired
    /// immediately; aborting finished work must be a no-op for the transport.
    pub fn attach_abort(&self, aborter: impl Abort) {
        let mut slot = self.inner.aborter.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_complete() {
            aborter.abort();
            return;
        }
        *slot = Some(Box::new(aborter));
    }

    /// Record the terminal outcome. Returns false if the handle had already
    /// completed, in which case `outcome` is discarded.
    pub fn finish(&self, outcome: Outcome) -> bool {
        if self.inner.complete.swap(true, Ordering::AcqRel) {
            tracing::trace!(handle = %self.id(), outcome = outcome.label(), "Late outcome ignored");
            return false;
        }
        metrics::counter!("transport_outcomes_total", "outcome" => outcome.label()).increment(1);
        self.inner.outcome.send_replace(Some(outcome));
        true
    }

    /// Abort the operation. Idempotent; a no-op once the handle completed.
    pub fn cancel(&self) {
        if !self.finish(Outcome::Aborted) {
            return;
        }
        let aborter = self
            .inner
            .aborter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(aborter) = aborter {
            aborter.abort();
        }
        tracing::debug!(handle = %self.id(), url = %self.url(), "Request cancelled");
    }

    /// Terminal outcome, if any.
    pub fn outcome(&self) -> Option<Outcome> {
        self.inner.outcome.borrow().clone()
    }

    /// Wait for the terminal outcome.
    pub async fn wait(&self) -> Outcome {
        let mut rx = self.inner.outcome.subscribe();
        loop {
            if let Some(outcome) = rx.borrow_and_update().clone() {
                return outcome;
            }
            // The sender lives in `self`, so the channel cannot close here.
            if rx.changed().await.is_err() {
                return Outcome::Aborted;
            }
        }
    }

    pub fn same_as(&self, other: &RequestHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for RequestHandle {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for RequestHandle {}

impl fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle")
            .field("id", &self.inner.id)
            .field("method", &self.inner.method)
            .field("url", &self.inner.url)
            .field("complete", &self.is_complete())
            .finish()
    }
}
