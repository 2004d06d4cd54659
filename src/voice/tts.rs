//! Text-to-speech (TTS) processing

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use serde::Serialize;

use crate::credentials::CredentialResolver;
use crate::{Error, Result};

pub const DEFAULT_TTS_MODEL: &str = "playai-tts";
pub const DEFAULT_TTS_VOICE: &str = "Chip-PlayAI";
pub const DEFAULT_TTS_TIMEOUT: Duration = Duration::from_secs(30);

/// Synthesizes speech from text through an OpenAI-compatible speech endpoint
pub struct TextToSpeech {
    client: reqwest::Client,
    credentials: Arc<CredentialResolver>,
    base_url: String,
    model: String,
    voice: String,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

impl TextToSpeech {
    /// Create a new TTS instance
    ///
    /// Each synthesis request is abandoned after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(
        credentials: Arc<CredentialResolver>,
        base_url: impl Into<String>,
        model: String,
        voice: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            credentials,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model,
            voice,
        })
    }

    /// Synthesize text to speech
    ///
    /// # Returns
    ///
    /// Audio bytes (WAV format)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Credential`] if no API key is available yet, or a TTS
    /// error if the API call fails
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let api_key = self
            .credentials
            .get_credential()
            .await
            .ok_or_else(|| Error::Credential("no API key for speech synthesis".to_string()))?;

        let request = SpeechRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            response_format: "wav",
        };

        let response = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Tts(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("API error {status}: {body}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Tts(format!("Read failed: {e}")))?;

        tracing::debug!(bytes = bytes.len(), "speech synthesized");
        Ok(bytes.to_vec())
    }
}
