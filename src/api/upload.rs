//! Image upload endpoint
//!
//! Accepted images are stored under a random name, analyzed, and queued for
//! the conversation loop. The response reports one entry per submitted file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Serialize;
use uuid::Uuid;

use super::ApiState;
use crate::attachments::analyze_upload;
use crate::{Error, Result as IrisResult};

/// Multipart field carrying the images
const IMAGE_FIELD: &str = "image";

/// Extensions accepted for upload (compared lowercase)
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

/// Build upload router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/upload", post(upload))
        .with_state(state)
}

/// Outcome for one submitted file
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum UploadResult {
    Saved {
        success: bool,
        filename: String,
        original_filename: String,
        file_path: String,
        analysis: String,
    },
    Rejected {
        error: String,
    },
}

/// Lowercase extension if the filename is an accepted image type
#[must_use]
pub fn allowed_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Reduce a client-supplied filename to a safe ASCII name
///
/// Path separators become word breaks, whitespace runs become `_`, anything
/// outside `[A-Za-z0-9_.-]` is dropped, and leading/trailing `.`/`_` are
/// trimmed.
#[must_use]
pub fn secure_filename(filename: &str) -> String {
    let spaced: String = filename
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");

    joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// Receive, store, and analyze uploaded images
async fn upload(
    State(state): State<Arc<ApiState>>,
    mut multipart: Multipart,
) -> Result<Json<Vec<UploadResult>>, UploadError> {
    let mut results = Vec::new();
    let mut saw_image_field = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        saw_image_field = true;

        let submitted = field.file_name().unwrap_or_default().to_string();
        let Some(extension) = allowed_extension(&submitted) else {
            tracing::info!(file = %submitted, "rejected upload with disallowed type");
            results.push(UploadResult::Rejected {
                error: format!("File type not allowed: {submitted}"),
            });
            continue;
        };

        let data = field
            .bytes()
            .await
            .map_err(|e| UploadError::BadRequest(e.body_text()))?;

        let original_filename = match secure_filename(&submitted) {
            name if name.is_empty() => format!("image.{extension}"),
            name => name,
        };
        let filename = format!("{}.{extension}", Uuid::new_v4().simple());
        let file_path = match store(&state.upload_dir, &filename, &data).await {
            Ok(path) => path,
            Err(e) => {
                tracing::error!(file = %original_filename, error = %e, "failed to store upload");
                results.push(UploadResult::Rejected {
                    error: e.to_string(),
                });
                continue;
            }
        };

        tracing::info!(
            file = %original_filename,
            path = %file_path.display(),
            bytes = data.len(),
            "image uploaded"
        );

        let message = analyze_upload(state.analyzer.as_ref(), &file_path, &original_filename).await;
        let analysis = message.analysis_text.clone();
        if let Err(e) = state.queue.enqueue(message) {
            tracing::warn!(error = %e, "analysis not queued");
        }

        results.push(UploadResult::Saved {
            success: true,
            filename,
            original_filename,
            file_path: file_path.display().to_string(),
            analysis,
        });
    }

    if !saw_image_field {
        return Err(UploadError::NoFilePart);
    }

    Ok(Json(results))
}

/// Write one upload into `dir`, creating the directory on first use
async fn store(dir: &Path, filename: &str, data: &[u8]) -> IrisResult<PathBuf> {
    let path = dir.join(filename);
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Error::Upload(format!("could not create {}: {e}", dir.display())))?;
    tokio::fs::write(&path, data)
        .await
        .map_err(|e| Error::Upload(format!("could not save {filename}: {e}")))?;
    Ok(path)
}

/// Upload API errors
#[derive(Debug)]
pub enum UploadError {
    NoFilePart,
    BadRequest(String),
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
        }

        let (status, error) = match self {
            Self::NoFilePart => (StatusCode::BAD_REQUEST, "No file part".to_string()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        (status, Json(ErrorResponse { error })).into_response()
    }
}
