//! Image analysis for uploaded files
//!
//! Turns an image on disk into an [`AnalysisMessage`] ready for the hand-off
//! queue. Analysis failures never escape: they become a spoken apology.

mod vision;

use std::path::Path;

use async_trait::async_trait;

use crate::queue::AnalysisMessage;
use crate::{Error, Result};

pub use vision::{
    DEFAULT_API_BASE, DEFAULT_MODEL, DEFAULT_PROMPT, DEFAULT_TIMEOUT, VisionClient,
    mime_type_for_extension,
};

/// Produces a text description of an image file
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    /// Describe the image stored at `path`
    async fn describe(&self, path: &Path) -> Result<String>;
}

#[async_trait]
impl ImageAnalyzer for VisionClient {
    async fn describe(&self, path: &Path) -> Result<String> {
        let image_data = tokio::fs::read(path)
            .await
            .map_err(|e| Error::Vision(format!("could not read {}: {e}", path.display())))?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        self.describe_image(&image_data, mime_type_for_extension(extension))
            .await
    }
}

/// Analyze one uploaded image and build the message to speak
///
/// `source_filename` is the name the user uploaded the file under.
pub async fn analyze_upload(
    analyzer: &dyn ImageAnalyzer,
    path: &Path,
    source_filename: &str,
) -> AnalysisMessage {
    match analyzer.describe(path).await {
        Ok(description) => {
            tracing::info!(file = %source_filename, "image analyzed");
            AnalysisMessage::from_analysis(source_filename, description)
        }
        Err(e) => {
            tracing::warn!(file = %source_filename, error = %e, "vision analysis failed");
            AnalysisMessage::analysis_failed(source_filename, &e.to_string())
        }
    }
}
