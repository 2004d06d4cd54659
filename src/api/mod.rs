//! HTTP API server for iris gateway

pub mod health;
pub mod keys;
pub mod upload;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::attachments::ImageAnalyzer;
use crate::credentials::CredentialResolver;
use crate::queue::HandoffSender;

/// Default request body limit for uploads (20 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Shared state for API handlers
pub struct ApiState {
    /// Directory uploaded images are written to
    pub upload_dir: PathBuf,
    /// Vision analyzer run on every accepted upload
    pub analyzer: Arc<dyn ImageAnalyzer>,
    /// Producer half of the hand-off queue
    pub queue: HandoffSender,
    /// Credential resolver, also used to persist new keys
    pub credentials: Arc<CredentialResolver>,
    /// Maximum accepted request body size
    pub max_upload_bytes: usize,
}

/// Build the router with all routes
pub fn router(state: Arc<ApiState>) -> Router {
    let body_limit = state.max_upload_bytes;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(health::router())
        .merge(upload::router(state.clone()))
        .nest("/api", keys::router(state))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    #[must_use]
    pub const fn new(state: Arc<ApiState>, port: u16) -> Self {
        Self { state, port }
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, router(self.state))
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
