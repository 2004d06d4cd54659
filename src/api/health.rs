//! Health check endpoints

use axum::{Json, Router, routing::get};
use serde::Serialize;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Legacy status response
#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

/// Ping response
#[derive(Serialize)]
pub struct PingResponse {
    pub message: &'static str,
}

/// Liveness probe - is the service running?
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "API is running",
    })
}

async fn ping() -> Json<PingResponse> {
    Json(PingResponse { message: "pong" })
}

/// Build health router (no state needed)
pub fn router() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/ping", get(ping))
}
