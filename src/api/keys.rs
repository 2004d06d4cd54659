//! API key management endpoint

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::post,
};
use serde::{Deserialize, Serialize};

use super::ApiState;

/// Build key router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/set-api-key", post(set_api_key))
        .with_state(state)
}

/// Request body for setting the key
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetApiKeyRequest {
    api_key: Option<String>,
}

/// Result of setting the key
#[derive(Debug, Serialize)]
pub struct SetApiKeyResponse {
    pub success: bool,
    pub message: String,
}

impl SetApiKeyResponse {
    fn reply(status: StatusCode, success: bool, message: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            status,
            Json(Self {
                success,
                message: message.into(),
            }),
        )
    }
}

/// Persist a new API key and make it current
async fn set_api_key(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> (StatusCode, Json<SetApiKeyResponse>) {
    let api_key = serde_json::from_slice::<SetApiKeyRequest>(&body)
        .ok()
        .and_then(|req| req.api_key)
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty());

    let Some(api_key) = api_key else {
        tracing::warn!("set-api-key request without an API key");
        return SetApiKeyResponse::reply(StatusCode::BAD_REQUEST, false, "API key is required");
    };

    tracing::info!(
        key_len = api_key.len(),
        backend = state.credentials.backend_name().unwrap_or("none"),
        "setting API key"
    );

    match state.credentials.store_credential(&api_key).await {
        Ok(()) => SetApiKeyResponse::reply(StatusCode::OK, true, "API key set successfully"),
        Err(e) => {
            tracing::error!(error = %e, "failed to store API key");
            SetApiKeyResponse::reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                false,
                format!("Error: {e}"),
            )
        }
    }
}
