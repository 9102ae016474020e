//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::transport::Method;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Sweep settings for the two supervisor instances.
    pub supervisors: SupervisorsConfig,

    /// Transport settings shared by the HTTP and JSONP transports.
    pub transport: TransportConfig,

    /// Request deduplication settings.
    pub dedup: DedupConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,

    /// Endpoints polled by the daemon.
    pub watch: Vec<WatchConfig>,
}

/// The ajax and jsonp supervisors.
///
/// The intervals are staggered so both sweeps do not land on the same tick.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SupervisorsConfig {
    pub ajax: SweepConfig,
    pub jsonp: SweepConfig,
}

impl Default for SupervisorsConfig {
    fn default() -> Self {
        Self {
            ajax: SweepConfig::new("ajax", 1000),
            jsonp: SweepConfig::new("jsonp", 1001),
        }
    }
}

/// Settings for one supervisor instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SweepConfig {
    /// Name used in logs, metrics and the admin API.
    pub name: String,

    /// Sweep poll interval in milliseconds.
    pub interval_ms: u64,

    /// Timeout applied to controllers registered without one.
    #[serde(default)]
    pub default_timeout_ms: Option<u64>,
}

impl SweepConfig {
    pub fn new(name: impl Into<String>, interval_ms: u64) -> Self {
        Self {
            name: name.into(),
            interval_ms,
            default_timeout_ms: None,
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self::new("ajax", 1000)
    }
}

/// Transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// User-Agent header sent with every request.
    pub user_agent: String,

    /// Prefix of generated JSONP callback names.
    pub jsonp_callback_prefix: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            user_agent: format!("request-supervisor/{}", env!("CARGO_PKG_VERSION")),
            jsonp_callback_prefix: "__jsonp_".to_string(),
        }
    }
}

/// Deduplication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Route `*_single` calls through the dedup cache. When off, every call
    /// issues a fresh request.
    pub enabled: bool,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log filter (overridden by `RUST_LOG`).
    pub log_level: String,

    /// `pretty` or `json`.
    pub log_format: String,

    /// Expose Prometheus metrics.
    pub metrics_enabled: bool,

    /// Metrics listen address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "request_supervisor=info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Serve the admin API.
    pub enabled: bool,

    /// Bearer token required on every admin request.
    pub api_key: String,

    /// Admin listen address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Which supervisor/transport pair a watch target uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[default]
    Ajax,
    Jsonp,
}

/// An endpoint polled on a fixed period.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchConfig {
    /// Identifier for logs.
    pub name: String,

    pub url: String,

    #[serde(default)]
    pub method: Method,

    #[serde(default)]
    pub channel: Channel,

    #[serde(default)]
    pub params: BTreeMap<String, String>,

    /// Poll period in milliseconds.
    pub every_ms: u64,

    /// Per-request timeout. Optional only when the channel's supervisor
    /// sets `default_timeout_ms`; one of the two is required.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}
