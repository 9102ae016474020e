use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::transport::Method;

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SupervisorStatus {
    pub name: String,
    pub interval_ms: u64,
    pub active: usize,
    pub ticks: u64,
    pub dedup_get: usize,
    pub dedup_post: usize,
    pub dedup_hit_ratio: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExpireResult {
    pub supervisor: String,
    pub expired: usize,
}

pub async fn get_status() -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "operational".to_string(),
    })
}

pub async fn get_supervisors(State(state): State<AdminState>) -> Json<Vec<SupervisorStatus>> {
    let statuses = state
        .channels
        .iter()
        .map(|c| SupervisorStatus {
            name: c.supervisor.name().to_string(),
            interval_ms: c.supervisor.interval().as_millis() as u64,
            active: c.supervisor.count(),
            ticks: c.supervisor.ticks(),
            dedup_get: c.dedup.len(Method::Get),
            dedup_post: c.dedup.len(Method::Post),
            dedup_hit_ratio: c.dedup.stats().hit_ratio(),
        })
        .collect();
    Json(statuses)
}

/// Time out everything the named supervisor is tracking.
pub async fn expire_supervisor(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<Json<ExpireResult>, StatusCode> {
    let channel = state
        .channels
        .iter()
        .find(|c| c.supervisor.name() == name)
        .ok_or(StatusCode::NOT_FOUND)?;

    let expired = channel
        .supervisor
        .expire_all_now(Some(serde_json::json!({ "reason": "admin" })));
    tracing::info!(supervisor = %name, expired, "Admin expired supervised requests");

    Ok(Json(ExpireResult {
        supervisor: name,
        expired,
    }))
}
