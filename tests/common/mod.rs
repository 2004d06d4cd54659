//! Shared test utilities
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use iris_gateway::credentials::{CredentialResolver, KeyFile};
use iris_gateway::voice::{ChatMessage, ConversationHistory, VoiceSession};
use iris_gateway::{Error, ImageAnalyzer, Result};

/// Boundary used by [`multipart_body`]
pub const BOUNDARY: &str = "iris-test-boundary";

/// Analyzer returning a fixed description, or failing
pub struct FakeAnalyzer {
    pub description: Option<String>,
}

impl FakeAnalyzer {
    pub fn describing(text: &str) -> Arc<Self> {
        Arc::new(Self {
            description: Some(text.to_string()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { description: None })
    }
}

#[async_trait]
impl ImageAnalyzer for FakeAnalyzer {
    async fn describe(&self, _path: &Path) -> Result<String> {
        self.description
            .clone()
            .ok_or_else(|| Error::Vision("vision API unavailable".to_string()))
    }
}

/// Voice session that records what it was asked to say
#[derive(Default)]
pub struct RecordingSession {
    pub history: ConversationHistory,
    pub said: Vec<(String, bool)>,
    pub fail_say: bool,
    pub hang_say: bool,
}

impl RecordingSession {
    pub fn failing() -> Self {
        Self {
            fail_say: true,
            ..Self::default()
        }
    }

    /// Never finishes speaking, like a synthesis call that stalls
    pub fn hanging() -> Self {
        Self {
            hang_say: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl VoiceSession for RecordingSession {
    fn history(&self) -> &ConversationHistory {
        &self.history
    }

    fn append_message(&mut self, message: ChatMessage) -> Result<()> {
        self.history.push(message);
        Ok(())
    }

    async fn say(&mut self, text: &str, allow_interruptions: bool) -> Result<()> {
        if self.fail_say {
            return Err(Error::Voice("speaker unplugged".to_string()));
        }
        if self.hang_say {
            std::future::pending::<()>().await;
        }
        self.said.push((text.to_string(), allow_interruptions));
        Ok(())
    }
}

/// Resolver that ignores the process environment and stores keys in `key_file`
pub fn key_file_resolver(key_file: PathBuf) -> Arc<CredentialResolver> {
    Arc::new(
        CredentialResolver::new("IRIS_TEST_KEY")
            .with_env_lookup(|_| None)
            .with_backend(Arc::new(KeyFile::new(key_file))),
    )
}

/// Build a multipart/form-data body from `(field, filename, bytes)` parts
pub fn multipart_body(parts: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, filename, data) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}
