//! Request supervision subsystem.
//!
//! # Data Flow
//! ```text
//! Caller issues a request → RequestHandle
//!     → controller.rs (RequestController::new registers an entry)
//!     → registry.rs (live entries, insertion ordered, one per handle)
//!
//! Every interval (sweep.rs):
//!     → registry.rs sweep_at(now)
//!     → entries older than their timeout → expire_all
//!     → entry.rs on_expire: unregister → cancel handle → on_timeout
//!
//! Normal completion:
//!     → controller.unregister() (tombstone, idempotent)
//! ```
//!
//! # Design Decisions
//! - Poll-based sweep instead of one timer per request; precision is one
//!   interval, which is fine for multi-second network timeouts
//! - Two instances (ajax, jsonp) share this code with separate state and
//!   staggered intervals
//! - Tombstones make late notifications and repeated unregisters no-ops

pub mod controller;
pub mod entry;
pub mod registry;
pub mod sweep;
pub mod types;

pub use controller::RequestController;
pub use entry::ControllerEntry;
pub use registry::RequestSupervisor;
pub use types::{
    ControllerOptions, Notification, SupervisorError, SupervisorResult, SweepReport,
    TimeoutCallback,
};
