//! Request supervisor service.
//!
//! # Architecture Overview
//!
//! ```text
//!   [[watch]] targets
//!         │
//!         ▼
//!   ┌──────────┐   single_supervised   ┌──────────────┐   issue   ┌───────────┐
//!   │  poller  │──────────────────────▶│ RequestClient│──────────▶│ transport │──▶ remote
//!   └──────────┘                       │  + dedup     │           │ http/jsonp│
//!                                      └──────┬───────┘           └───────────┘
//!                                             │ register
//!                                             ▼
//!                                      ┌──────────────┐
//!                                      │  supervisor  │  sweep every interval,
//!                                      │ ajax / jsonp │  cancel what timed out
//!                                      └──────────────┘
//!
//!   admin API (axum) ── inspects supervisors and dedup caches, forces expiry
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use request_supervisor::admin::{self, AdminState, ChannelState};
use request_supervisor::config::{load_config, AdminConfig, Channel, ServiceConfig};
use request_supervisor::lifecycle::{wait_for_shutdown, Shutdown};
use request_supervisor::observability::{logging, metrics};
use request_supervisor::poller::Poller;
use request_supervisor::{
    DedupCache, HttpTransport, JsonpTransport, RequestClient, RequestSupervisor,
};

#[derive(Parser)]
#[command(name = "request-supervisor")]
#[command(about = "Timeout supervision and deduplication for outstanding requests", long_about = None)]
struct Args {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "request-supervisor starting");

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let shutdown = Shutdown::new();

    let ajax = Arc::new(RequestSupervisor::new(&config.supervisors.ajax));
    let jsonp = Arc::new(RequestSupervisor::new(&config.supervisors.jsonp));
    let ajax_dedup = Arc::new(DedupCache::new());
    let jsonp_dedup = Arc::new(DedupCache::new());

    let ajax_client = RequestClient::new(
        Arc::new(HttpTransport::new(&config.transport)?),
        ajax.clone(),
        ajax_dedup.clone(),
    )
    .with_dedup(config.dedup.enabled);
    let jsonp_client = RequestClient::new(
        Arc::new(JsonpTransport::new(&config.transport)?),
        jsonp.clone(),
        jsonp_dedup.clone(),
    )
    .with_dedup(config.dedup.enabled);

    let mut tasks = vec![
        ajax.spawn(shutdown.subscribe()),
        jsonp.spawn(shutdown.subscribe()),
    ];

    for watch in &config.watch {
        let task = match watch.channel {
            Channel::Ajax => Poller::new(watch.clone(), ajax_client.clone()).spawn(shutdown.subscribe()),
            Channel::Jsonp => Poller::new(watch.clone(), jsonp_client.clone()).spawn(shutdown.subscribe()),
        };
        tasks.push(task);
    }
    tracing::info!(targets = config.watch.len(), "Pollers started");

    if config.admin.enabled {
        if config.admin.api_key == AdminConfig::default().api_key {
            tracing::warn!("Admin API is using the placeholder api_key; set admin.api_key");
        }
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AdminState::new(
            &config.admin.api_key,
            vec![
                ChannelState { supervisor: ajax.clone(), dedup: ajax_dedup },
                ChannelState { supervisor: jsonp.clone(), dedup: jsonp_dedup },
            ],
        );
        let rx = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = admin::serve(listener, state, rx).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        }));
    }

    wait_for_shutdown().await;
    shutdown.trigger();

    for task in tasks {
        let _ = task.await;
    }

    // In-flight requests are abandoned without firing timeout callbacks.
    ajax.clear();
    jsonp.clear();

    tracing::info!("Shutdown complete");
    Ok(())
}
