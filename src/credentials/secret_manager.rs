//! Google Cloud Secret Manager backend (REST API)

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use super::SecretBackend;
use crate::{Error, Result};

const SECRET_MANAGER_URL: &str = "https://secretmanager.googleapis.com/v1";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Per-request timeout for Secret Manager and metadata server calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default logical secret name shared by all services
pub const DEFAULT_SECRET_ID: &str = "groq-api-key";

/// Where OAuth access tokens come from
enum TokenSource {
    /// Pre-issued token (e.g. `gcloud auth print-access-token`)
    Static(SecretString),
    /// GCE/Cloud Run metadata server
    Metadata(String),
}

/// Reads and writes one secret in Google Cloud Secret Manager
pub struct SecretManager {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
    secret_id: String,
    token: TokenSource,
}

#[derive(Debug, Deserialize)]
struct AccessResponse {
    payload: Payload,
}

#[derive(Debug, Deserialize)]
struct Payload {
    data: String,
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
}

impl SecretManager {
    /// Create a client for `projects/{project_id}/secrets/{secret_id}`
    ///
    /// Uses `GOOGLE_OAUTH_ACCESS_TOKEN` when set, otherwise the metadata server.
    ///
    /// # Errors
    ///
    /// Returns error if the project id is empty or the HTTP client cannot be
    /// built
    pub fn new(project_id: String, secret_id: String) -> Result<Self> {
        if project_id.trim().is_empty() {
            return Err(Error::Config(
                "GCP project id required for Secret Manager".to_string(),
            ));
        }

        let token = std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .map_or_else(
                || TokenSource::Metadata(METADATA_TOKEN_URL.to_string()),
                |t| TokenSource::Static(SecretString::from(t)),
            );

        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            base_url: SECRET_MANAGER_URL.to_string(),
            project_id,
            secret_id,
            token,
        })
    }

    /// Point at a different API root
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Use a fixed access token
    #[must_use]
    pub fn with_access_token(mut self, token: SecretString) -> Self {
        self.token = TokenSource::Static(token);
        self
    }

    fn secret_path(&self) -> String {
        format!(
            "{}/projects/{}/secrets/{}",
            self.base_url, self.project_id, self.secret_id
        )
    }

    async fn access_token(&self) -> Result<String> {
        match &self.token {
            TokenSource::Static(token) => Ok(token.expose_secret().to_string()),
            TokenSource::Metadata(url) => {
                let response = self
                    .client
                    .get(url)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await
                    .map_err(|e| Error::SecretStore(format!("metadata token request failed: {e}")))?;

                if !response.status().is_success() {
                    return Err(Error::SecretStore(format!(
                        "metadata token request failed: {}",
                        response.status()
                    )));
                }

                let token: MetadataToken = response.json().await?;
                Ok(token.access_token)
            }
        }
    }

    /// Create the secret container if it does not exist yet
    async fn ensure_secret(&self, token: &str) -> Result<()> {
        let response = self
            .client
            .get(self.secret_path())
            .bearer_auth(token)
            .send()
            .await?;

        if response.status().is_success() {
            tracing::debug!(secret = %self.secret_id, "secret already exists");
            return Ok(());
        }
        if response.status() != reqwest::StatusCode::NOT_FOUND {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::SecretStore(format!("get secret failed {status}: {body}")));
        }

        let response = self
            .client
            .post(format!("{}/projects/{}/secrets", self.base_url, self.project_id))
            .query(&[("secretId", self.secret_id.as_str())])
            .bearer_auth(token)
            .json(&json!({ "replication": { "automatic": {} } }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::SecretStore(format!("create secret failed {status}: {body}")));
        }

        tracing::info!(secret = %self.secret_id, "secret created");
        Ok(())
    }
}

#[async_trait]
impl SecretBackend for SecretManager {
    fn name(&self) -> &'static str {
        "secret-manager"
    }

    async fn fetch(&self) -> Result<Option<String>> {
        let token = self.access_token().await?;
        let response = self
            .client
            .get(format!("{}/versions/latest:access", self.secret_path()))
            .bearer_auth(&token)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::SecretStore(format!("access secret failed {status}: {body}")));
        }

        let access: AccessResponse = response.json().await?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(access.payload.data.as_bytes())
            .map_err(|e| Error::SecretStore(format!("invalid secret payload: {e}")))?;
        let value = String::from_utf8(bytes)
            .map_err(|e| Error::SecretStore(format!("secret is not UTF-8: {e}")))?;

        Ok(Some(value.trim().to_string()))
    }

    async fn store(&self, value: &str) -> Result<()> {
        let token = self.access_token().await?;
        self.ensure_secret(&token).await?;

        let data = base64::engine::general_purpose::STANDARD.encode(value.trim().as_bytes());
        let response = self
            .client
            .post(format!("{}:addVersion", self.secret_path()))
            .bearer_auth(&token)
            .json(&json!({ "payload": { "data": data } }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::SecretStore(format!("add version failed {status}: {body}")));
        }

        tracing::info!(secret = %self.secret_id, "secret version added");
        Ok(())
    }
}
