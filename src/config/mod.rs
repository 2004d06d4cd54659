//! Configuration management for iris gateway
//!
//! Values resolve env > toml > default.

pub mod file;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::api::DEFAULT_MAX_UPLOAD_BYTES;
use crate::attachments::{DEFAULT_API_BASE, DEFAULT_MODEL, DEFAULT_PROMPT, DEFAULT_TIMEOUT};
use crate::conversation::{DEFAULT_GREETING, DEFAULT_TICK};
use crate::credentials::{
    CredentialResolver, DEFAULT_KEY_FILE, DEFAULT_SECRET_ID, KeyFile, SecretBackend, SecretManager,
};
use crate::voice::{DEFAULT_PLAYER, DEFAULT_TTS_MODEL, DEFAULT_TTS_TIMEOUT, DEFAULT_TTS_VOICE};
use crate::{Error, Result};

use self::file::IrisConfigFile;

/// Default API server port
pub const DEFAULT_PORT: u16 = 5000;

/// Default directory for uploaded images
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Default environment variable holding the API key
pub const DEFAULT_KEY_ENV: &str = "GROQ_API_KEY";

/// Default assistant system prompt
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an image analyst assistant that answers questions. \
     Be nice. Respond in full words and plain text, without styling words or special characters.";

/// Iris gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP API server configuration
    pub api_server: ApiServerConfig,

    /// Credential lookup configuration
    pub credentials: CredentialsConfig,

    /// OpenAI-compatible API root shared by vision and TTS
    pub api_base: String,

    /// Vision analysis configuration
    pub vision: VisionConfig,

    /// Voice output configuration
    pub voice: VoiceConfig,

    /// Conversation loop configuration
    pub conversation: ConversationConfig,
}

/// HTTP API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Directory uploaded images are written to
    pub upload_dir: PathBuf,

    /// Request body limit for uploads
    pub max_upload_bytes: usize,
}

/// Credential lookup configuration
#[derive(Debug, Clone)]
pub struct CredentialsConfig {
    /// Environment variable checked first
    pub env_var: String,

    /// Local key file used when no GCP project is configured
    pub key_file: PathBuf,

    /// Google Cloud project; enables Secret Manager storage when set
    pub gcp_project_id: Option<String>,

    /// Secret Manager secret name
    pub secret_id: String,

    /// Interval between lookups during the startup wait
    pub poll_interval: Duration,

    /// How long startup waits before continuing without a key
    pub timeout: Duration,
}

/// Vision analysis configuration
#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub model: String,
    pub prompt: String,
    pub timeout: Duration,
}

/// Where spoken output goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceOutput {
    /// Hosted TTS played through the local audio player
    Speaker,
    /// Transcript printed to stdout
    Console,
}

impl VoiceOutput {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "speaker" => Some(Self::Speaker),
            "console" => Some(Self::Console),
            _ => None,
        }
    }
}

/// Voice output configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    pub output: VoiceOutput,

    /// TTS model (e.g. "playai-tts")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// Per-request timeout for speech synthesis
    pub tts_timeout: Duration,

    /// Command line of the WAV player
    pub player: String,

    /// Opening line spoken at startup
    pub greeting: String,

    /// System prompt seeding the conversation history
    pub system_prompt: String,
}

/// Conversation loop configuration
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    /// Pause between loop iterations
    pub tick: Duration,

    /// Pointer file polled for externally uploaded images
    pub upload_pointer: Option<PathBuf>,
}

impl Config {
    /// Load configuration, optionally forcing console voice output
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is invalid
    pub fn load_with_options(console_only: bool) -> Result<Self> {
        let fc = file::load_config_file();
        let mut config = Self::from_sources(fc, |key| std::env::var(key).ok())?;

        if console_only {
            tracing::info!("voice output forced to console");
            config.voice.output = VoiceOutput::Console;
        }

        Ok(config)
    }

    /// Resolve configuration from a parsed config file and an env lookup
    ///
    /// # Errors
    ///
    /// Returns error if the port or voice output cannot be parsed
    pub fn from_sources(fc: IrisConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = match env("IRIS_PORT").or_else(|| env("PORT")) {
            Some(raw) => raw
                .parse()
                .map_err(|_| Error::Config(format!("invalid port: {raw}")))?,
            None => fc.server.port.unwrap_or(DEFAULT_PORT),
        };

        let api_server = ApiServerConfig {
            port,
            upload_dir: env("IRIS_UPLOAD_DIR")
                .or(fc.server.upload_dir)
                .map_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR), PathBuf::from),
            max_upload_bytes: fc
                .server
                .max_upload_mb
                .map_or(DEFAULT_MAX_UPLOAD_BYTES, |mb| mb * 1024 * 1024),
        };

        let credentials = CredentialsConfig {
            env_var: fc
                .credentials
                .env_var
                .unwrap_or_else(|| DEFAULT_KEY_ENV.to_string()),
            key_file: env("IRIS_KEY_FILE")
                .or(fc.credentials.key_file)
                .map_or_else(|| PathBuf::from(DEFAULT_KEY_FILE), PathBuf::from),
            gcp_project_id: env("GCP_PROJECT_ID")
                .or(fc.credentials.gcp_project_id)
                .filter(|p| !p.trim().is_empty()),
            secret_id: env("IRIS_SECRET_ID")
                .or(fc.credentials.secret_id)
                .unwrap_or_else(|| DEFAULT_SECRET_ID.to_string()),
            poll_interval: Duration::from_secs(fc.credentials.poll_interval_secs.unwrap_or(1)),
            timeout: Duration::from_secs(fc.credentials.timeout_secs.unwrap_or(300)),
        };

        let api_base = env("IRIS_API_BASE")
            .or(fc.provider.base_url)
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let vision = VisionConfig {
            model: env("IRIS_VISION_MODEL")
                .or(fc.vision.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            prompt: fc.vision.prompt.unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
            timeout: fc
                .vision
                .timeout_secs
                .map_or(DEFAULT_TIMEOUT, Duration::from_secs),
        };

        let output = match env("IRIS_VOICE_OUTPUT").or(fc.voice.output) {
            Some(raw) => VoiceOutput::parse(&raw)
                .ok_or_else(|| Error::Config(format!("unknown voice output: {raw}")))?,
            None => VoiceOutput::Speaker,
        };

        let voice = VoiceConfig {
            output,
            tts_model: env("IRIS_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| DEFAULT_TTS_MODEL.to_string()),
            tts_voice: env("IRIS_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or_else(|| DEFAULT_TTS_VOICE.to_string()),
            tts_timeout: fc
                .voice
                .tts_timeout_secs
                .map_or(DEFAULT_TTS_TIMEOUT, Duration::from_secs),
            player: env("IRIS_PLAYER")
                .or(fc.voice.player)
                .unwrap_or_else(|| DEFAULT_PLAYER.to_string()),
            greeting: fc
                .voice
                .greeting
                .unwrap_or_else(|| DEFAULT_GREETING.to_string()),
            system_prompt: fc
                .voice
                .system_prompt
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        };

        let conversation = ConversationConfig {
            tick: fc
                .conversation
                .tick_ms
                .map_or(DEFAULT_TICK, Duration::from_millis),
            upload_pointer: env("IRIS_UPLOAD_POINTER")
                .or(fc.conversation.upload_pointer)
                .map(PathBuf::from),
        };

        Ok(Self {
            api_server,
            credentials,
            api_base,
            vision,
            voice,
            conversation,
        })
    }

    /// Build the credential resolver
    ///
    /// Secret Manager backs the key when a GCP project is configured,
    /// otherwise the local key file does.
    ///
    /// # Errors
    ///
    /// Returns error if the Secret Manager client cannot be built
    pub fn credential_resolver(&self) -> Result<CredentialResolver> {
        let backend: Arc<dyn SecretBackend> = match &self.credentials.gcp_project_id {
            Some(project) => Arc::new(SecretManager::new(
                project.clone(),
                self.credentials.secret_id.clone(),
            )?),
            None => Arc::new(KeyFile::new(self.credentials.key_file.clone())),
        };

        tracing::debug!(backend = backend.name(), "credential backend selected");

        Ok(CredentialResolver::new(self.credentials.env_var.clone()).with_backend(backend))
    }
}
