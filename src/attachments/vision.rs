//! Vision API client for image analysis
//!
//! Talks to an OpenAI-compatible chat completions endpoint (Groq by default)
//! with the image inlined as a base64 data URL.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::credentials::CredentialResolver;
use crate::{Error, Result};

pub const DEFAULT_API_BASE: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";
pub const DEFAULT_PROMPT: &str = "Describe the image and where everything is in the image.";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Vision client for image analysis
pub struct VisionClient {
    client: reqwest::Client,
    credentials: Arc<CredentialResolver>,
    base_url: String,
    model: String,
    prompt: String,
}

/// Chat completion request
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_completion_tokens: u32,
    top_p: f32,
    stream: bool,
}

/// A message in the request
#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: Vec<ContentPart<'a>>,
}

/// Content part (text or image)
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart<'a> {
    #[serde(rename = "text")]
    Text { text: &'a str },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl VisionClient {
    /// Create a new vision client
    ///
    /// The API key is read from `credentials` on every call, so a key set
    /// after startup is picked up without rebuilding the client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(credentials: Arc<CredentialResolver>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            credentials,
            base_url: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            prompt: DEFAULT_PROMPT.to_string(),
        })
    }

    /// Use a different OpenAI-compatible API root
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Create with a specific model
    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    /// Replace the descriptive prompt
    #[must_use]
    pub fn with_prompt(mut self, prompt: String) -> Self {
        self.prompt = prompt;
        self
    }

    /// Describe an image
    ///
    /// # Arguments
    ///
    /// * `image_data` - Raw image bytes
    /// * `mime_type` - MIME type of the image
    ///
    /// # Errors
    ///
    /// Returns error if no API key is available or the API call fails
    pub async fn describe_image(&self, image_data: &[u8], mime_type: &str) -> Result<String> {
        let api_key = self
            .credentials
            .get_credential()
            .await
            .ok_or_else(|| Error::Vision("no API key configured".to_string()))?;

        let base64_data = base64::engine::general_purpose::STANDARD.encode(image_data);

        let request = CompletionRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentPart::Text { text: &self.prompt },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:{mime_type};base64,{base64_data}"),
                        },
                    },
                ],
            }],
            temperature: 1.0,
            max_completion_tokens: 1024,
            top_p: 1.0,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Vision(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Vision(format!("API error {status}: {body}")));
        }

        let result: CompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Vision(format!("Parse error: {e}")))?;

        let description = result
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();

        if description.is_empty() {
            return Err(Error::Vision("Empty response from vision API".to_string()));
        }

        tracing::debug!(description = %description, "image described");
        Ok(description)
    }
}

/// MIME type for an image file extension
pub fn mime_type_for_extension(extension: &str) -> &'static str {
    match extension.to_lowercase().as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        // jpeg, jpg, and any unknown type default to jpeg
        _ => "image/jpeg",
    }
}
