//! TOML configuration file loading
//!
//! Supports `~/.config/iris/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct IrisConfigFile {
    /// Hosted API provider configuration
    #[serde(default)]
    pub provider: ProviderFileConfig,

    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Credential lookup configuration
    #[serde(default)]
    pub credentials: CredentialsFileConfig,

    /// Vision analysis configuration
    #[serde(default)]
    pub vision: VisionFileConfig,

    /// Voice output configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Conversation loop configuration
    #[serde(default)]
    pub conversation: ConversationFileConfig,
}

/// Hosted OpenAI-compatible API
#[derive(Debug, Default, Deserialize)]
pub struct ProviderFileConfig {
    /// API root (e.g. `https://api.groq.com/openai/v1`)
    pub base_url: Option<String>,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,

    /// Directory for uploaded images
    pub upload_dir: Option<String>,

    /// Maximum upload request size in megabytes
    pub max_upload_mb: Option<usize>,
}

/// Credential lookup configuration
#[derive(Debug, Default, Deserialize)]
pub struct CredentialsFileConfig {
    /// Environment variable holding the key
    pub env_var: Option<String>,

    /// Local key file
    pub key_file: Option<String>,

    /// Google Cloud project for Secret Manager storage
    pub gcp_project_id: Option<String>,

    /// Secret Manager secret name
    pub secret_id: Option<String>,

    /// Seconds between lookups while waiting at startup
    pub poll_interval_secs: Option<u64>,

    /// Seconds to wait for a key before continuing without one
    pub timeout_secs: Option<u64>,
}

/// Vision analysis configuration
#[derive(Debug, Default, Deserialize)]
pub struct VisionFileConfig {
    pub model: Option<String>,
    pub prompt: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Voice output configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// "speaker" or "console"
    pub output: Option<String>,

    /// TTS model (e.g. "playai-tts")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "Chip-PlayAI")
    pub tts_voice: Option<String>,

    /// Seconds before a speech request is abandoned
    pub tts_timeout_secs: Option<u64>,

    /// Player command line for synthesized WAV audio
    pub player: Option<String>,

    /// Opening line
    pub greeting: Option<String>,

    /// Assistant system prompt
    pub system_prompt: Option<String>,
}

/// Conversation loop configuration
#[derive(Debug, Default, Deserialize)]
pub struct ConversationFileConfig {
    /// Milliseconds between loop iterations
    pub tick_ms: Option<u64>,

    /// Pointer file written by an external uploader
    pub upload_pointer: Option<String>,
}

/// Parse a config file body
///
/// # Errors
///
/// Returns error if the TOML is malformed
pub fn parse_config(content: &str) -> crate::Result<IrisConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Load the TOML config file from the standard path
///
/// Returns `IrisConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> IrisConfigFile {
    let Some(path) = config_file_path() else {
        return IrisConfigFile::default();
    };

    if !path.exists() {
        return IrisConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match parse_config(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                IrisConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            IrisConfigFile::default()
        }
    }
}

/// Return the config file path: `$IRIS_CONFIG` or `~/.config/iris/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("IRIS_CONFIG") {
        return Some(PathBuf::from(path));
    }

    directories::BaseDirs::new().map(|d| d.config_dir().join("iris").join("config.toml"))
}
