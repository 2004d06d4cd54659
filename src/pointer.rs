//! Single-slot upload pointer file
//!
//! An external uploader process records the path of its most recent upload in
//! a small text file; the conversation loop picks it up and deletes it. Each
//! write overwrites the previous one, so uploads that land between two polls
//! lose all but the last. In-process uploads go through the hand-off queue
//! instead and never touch this file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::Result;

/// Default pointer file name
pub const DEFAULT_POINTER_FILE: &str = "last_uploaded_image.txt";

/// Mailbox holding the path of the most recently uploaded image
#[derive(Debug, Clone)]
pub struct UploadPointer {
    path: PathBuf,
}

impl UploadPointer {
    /// Create a pointer backed by the given file
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the pointer file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Point at a newly uploaded image, replacing any previous value
    ///
    /// # Errors
    ///
    /// Returns error if the pointer file cannot be written
    pub async fn write(&self, image: &Path) -> Result<()> {
        tokio::fs::write(&self.path, image.to_string_lossy().as_bytes()).await?;
        Ok(())
    }

    /// Claim the pointed-at image
    ///
    /// Returns `None` and leaves the pointer untouched when there is no
    /// pointer or the image it names does not exist (yet). Otherwise deletes
    /// the pointer and returns the image path.
    ///
    /// # Errors
    ///
    /// Returns error if the pointer file exists but cannot be read or removed
    pub async fn take(&self) -> Result<Option<PathBuf>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let target = contents.trim();
        if target.is_empty() {
            return Ok(None);
        }

        let image = PathBuf::from(target);
        if !tokio::fs::try_exists(&image).await.unwrap_or(false) {
            tracing::debug!(image = %image.display(), "upload pointer names a missing file");
            return Ok(None);
        }

        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        Ok(Some(image))
    }
}
