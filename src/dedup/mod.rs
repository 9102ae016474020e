//! Request deduplication subsystem.
//!
//! # Data Flow
//! ```text
//! issue_or_reuse(method, url, params, issue_fn)
//!     → fingerprint.rs (url + sorted, encoded params)
//!     → cache.rs (per-method map lookup)
//!         - live handle found      → return it, issue_fn not called
//!         - missing or completed   → issue_fn(), store, return new handle
//! ```
//!
//! # Design Decisions
//! - Fingerprints are value based: identical requests from unrelated call
//!   sites are merged
//! - GET and POST never deduplicate against each other
//! - Stale entries are replaced lazily, or dropped by `purge_completed`

pub mod cache;
pub mod fingerprint;

pub use cache::{DedupCache, DedupStats};
pub use fingerprint::Fingerprint;
