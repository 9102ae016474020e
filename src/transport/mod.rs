//! Transport subsystem.
//!
//! # Data Flow
//! ```text
//! RequestSpec (method, url, params)
//!     → Transport::issue
//!     → RequestHandle returned immediately (pending)
//!     → work runs on a spawned task, abort handle attached to the handle
//!     → exactly one Outcome recorded: Completed | Failed | Aborted
//! ```
//!
//! # Design Decisions
//! - Issuing never blocks; completion is observed through the handle
//! - Handles are the only thing the supervisor and dedup cache see
//! - The JSONP transport reuses the HTTP send path and unwraps the callback

pub mod handle;
pub mod http;
pub mod jsonp;
pub mod types;

use std::future::Future;

pub use handle::{Abort, HandleId, RequestHandle};
pub use http::HttpTransport;
pub use jsonp::JsonpTransport;
pub use types::{Method, Outcome, Params, RequestSpec, Response, TransportError};

/// Starts network operations.
///
/// Implementations must finish every returned handle exactly once, either
/// from the work itself or through [`RequestHandle::cancel`].
pub trait Transport: Send + Sync + 'static {
    fn issue(&self, spec: RequestSpec) -> RequestHandle;
}

/// Run `work` on its own task and record its outcome on `handle`.
pub(crate) fn spawn_request<F>(handle: &RequestHandle, work: F)
where
    F: Future<Output = Outcome> + Send + 'static,
{
    let task_handle = handle.clone();
    let task = tokio::spawn(async move {
        let outcome = work.await;
        tracing::debug!(
            handle = %task_handle.id(),
            url = %task_handle.url(),
            outcome = outcome.label(),
            "Request finished"
        );
        task_handle.finish(outcome);
    });
    handle.attach_abort(task.abort_handle());
}
