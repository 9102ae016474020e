//! Request supervision library.
//!
//! Puts outstanding network requests under periodic timeout supervision and
//! collapses concurrent identical requests onto one in-flight handle.

pub mod config;
pub mod transport;
pub mod dedup;
pub mod supervisor;
pub mod client;
pub mod poller;
pub mod admin;
pub mod lifecycle;
pub mod observability;

pub use client::RequestClient;
pub use config::schema::ServiceConfig;
pub use dedup::DedupCache;
pub use lifecycle::Shutdown;
pub use supervisor::{ControllerOptions, Notification, RequestController, RequestSupervisor};
pub use transport::{HttpTransport, JsonpTransport, Method, Outcome, Params, RequestHandle, Transport};
