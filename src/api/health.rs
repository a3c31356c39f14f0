//! Health check endpoint

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Current status of the service
    pub status: String,
    /// Version of the service
    pub version: String,
    pub uptime_seconds: u64,
    /// Store connectivity: "up" or "down"
    pub database: String,
    /// Mail transport reachability: "up", "down" or "disabled"
    pub mail: String,
}

/// Health check endpoint: process uptime plus dependency probes
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service health report", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<crate::AppState>) -> Json<HealthResponse> {
    let database_up = state.services.database_reachable().await;
    let mail = match state.services.notify.transport_reachable().await {
        None => "disabled",
        Some(true) => "up",
        Some(false) => "down",
    };

    Json(HealthResponse {
        status: if database_up { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        database: if database_up { "up" } else { "down" }.to_string(),
        mail: mail.to_string(),
    })
}
