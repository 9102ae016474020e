//! Admin API.
//!
//! Bearer-token protected endpoints for inspecting the supervisors and
//! forcing timeouts.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::dedup::DedupCache;
use crate::supervisor::RequestSupervisor;
use self::auth::admin_auth_middleware;
use self::handlers::*;

/// A supervisor and the dedup cache feeding it.
#[derive(Clone)]
pub struct ChannelState {
    pub supervisor: Arc<RequestSupervisor>,
    pub dedup: Arc<DedupCache>,
}

/// Shared state for admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub api_key: Arc<str>,
    pub channels: Arc<Vec<ChannelState>>,
}

impl AdminState {
    pub fn new(api_key: &str, channels: Vec<ChannelState>) -> Self {
        Self {
            api_key: Arc::from(api_key),
            channels: Arc::new(channels),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/supervisors", get(get_supervisors))
        .route("/admin/supervisors/{name}/expire", post(expire_supervisor))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin API until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    state: AdminState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API listening");

    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    tracing::info!("Admin API stopped");
    Ok(())
}
