//! Hosted API credential lookup and storage
//!
//! The credential is looked up in process memory, then the environment, then
//! a persistent backend (a local key file or Google Cloud Secret Manager).

mod file;
mod secret_manager;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::Result;

pub use file::{DEFAULT_KEY_FILE, KeyFile};
pub use secret_manager::{DEFAULT_SECRET_ID, SecretManager};

/// Persistent home for the credential
#[async_trait]
pub trait SecretBackend: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Read the stored credential, `None` if nothing is stored
    async fn fetch(&self) -> Result<Option<String>>;

    /// Replace the stored credential
    async fn store(&self, value: &str) -> Result<()>;
}

/// Environment lookup used by the resolver
pub type EnvLookup = fn(&str) -> Option<String>;

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Resolves the credential with in-memory caching
pub struct CredentialResolver {
    env_var: String,
    env_lookup: EnvLookup,
    backend: Option<Arc<dyn SecretBackend>>,
    cached: RwLock<Option<SecretString>>,
    backend_failure_logged: AtomicBool,
}

impl CredentialResolver {
    /// Create a resolver reading `env_var` from the process environment
    #[must_use]
    pub fn new(env_var: impl Into<String>) -> Self {
        Self {
            env_var: env_var.into(),
            env_lookup: process_env,
            backend: None,
            cached: RwLock::new(None),
            backend_failure_logged: AtomicBool::new(false),
        }
    }

    /// Fall back to a persistent backend when the environment has nothing
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn SecretBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Replace the environment lookup
    #[must_use]
    pub fn with_env_lookup(mut self, lookup: EnvLookup) -> Self {
        self.env_lookup = lookup;
        self
    }

    /// Name of the configured backend, if any
    #[must_use]
    pub fn backend_name(&self) -> Option<&'static str> {
        self.backend.as_ref().map(|b| b.name())
    }

    /// Get the credential if one is available anywhere
    ///
    /// Backend failures are logged and reported as absent.
    pub async fn get_credential(&self) -> Option<SecretString> {
        if let Some(cached) = self.cached.read().await.as_ref() {
            return Some(SecretString::from(cached.expose_secret().to_owned()));
        }

        let found = match (self.env_lookup)(&self.env_var).filter(|v| !v.trim().is_empty()) {
            Some(value) => Some(value.trim().to_string()),
            None => self.fetch_from_backend().await,
        }?;

        *self.cached.write().await = Some(SecretString::from(found.clone()));
        Some(SecretString::from(found))
    }

    /// Persist a new credential and make it current for this process
    ///
    /// # Errors
    ///
    /// Returns error if no backend is configured or the backend write fails
    pub async fn store_credential(&self, value: &str) -> Result<()> {
        let backend = self.backend.as_ref().ok_or_else(|| {
            crate::Error::Credential("no credential backend configured".to_string())
        })?;

        backend.store(value).await?;
        *self.cached.write().await = Some(SecretString::from(value.to_string()));

        tracing::info!(backend = backend.name(), "credential stored");
        Ok(())
    }

    async fn fetch_from_backend(&self) -> Option<String> {
        let backend = self.backend.as_ref()?;
        match backend.fetch().await {
            Ok(Some(value)) if !value.trim().is_empty() => {
                tracing::info!(backend = backend.name(), "credential loaded");
                Some(value.trim().to_string())
            }
            Ok(_) => None,
            Err(e) => {
                // Repeats every poll while waiting at startup
                if self.backend_failure_logged.swap(true, Ordering::Relaxed) {
                    tracing::debug!(backend = backend.name(), error = %e, "credential lookup failed");
                } else {
                    tracing::warn!(backend = backend.name(), error = %e, "credential lookup failed");
                }
                None
            }
        }
    }
}

/// Poll until a credential is available or `timeout` elapses
///
/// Returns `None` after the timeout; callers continue in degraded mode. A
/// lookup still in flight at the deadline is abandoned.
pub async fn wait_for_credential(
    resolver: &CredentialResolver,
    poll_interval: Duration,
    timeout: Duration,
) -> Option<SecretString> {
    let started = Instant::now();
    let deadline = started + timeout;

    loop {
        let lookup = tokio::time::timeout_at(deadline, resolver.get_credential()).await;
        if let Ok(Some(credential)) = lookup {
            tracing::info!(waited_ms = started.elapsed().as_millis(), "credential available");
            return Some(credential);
        }

        let now = Instant::now();
        if now >= deadline {
            tracing::warn!(
                timeout_secs = timeout.as_secs(),
                env_var = %resolver.env_var,
                "no credential after timeout, continuing in degraded mode"
            );
            return None;
        }

        tracing::debug!("waiting for credential");
        tokio::time::sleep(poll_interval.min(deadline - now)).await;
    }
}
