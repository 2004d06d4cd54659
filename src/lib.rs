//! Iris Gateway - speaks descriptions of uploaded images
//!
//! This library provides the core functionality for the Iris gateway:
//! - Image upload API with hosted vision analysis
//! - A hand-off queue from request handlers to the conversation loop
//! - Credential lookup from env, a key file, or Google Secret Manager
//! - Spoken (hosted TTS) or console voice output
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   HTTP API (axum)                    │
//! │   /upload  │  /api/set-api-key  │  /status  │ /ping │
//! └────────────────────┬────────────────────────────────┘
//!                      │ AnalysisMessage (hand-off queue)
//! ┌────────────────────▼────────────────────────────────┐
//! │                Conversation Loop                     │
//! │   history  │  say  │  upload pointer poll            │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │        Hosted OpenAI-compatible API (Groq)           │
//! │   vision chat completions  │  speech                 │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod attachments;
pub mod config;
pub mod conversation;
pub mod credentials;
pub mod daemon;
pub mod error;
pub mod pointer;
pub mod queue;
pub mod voice;

pub use attachments::{ImageAnalyzer, VisionClient};
pub use config::Config;
pub use conversation::ConversationLoop;
pub use credentials::{CredentialResolver, SecretBackend};
pub use daemon::Daemon;
pub use error::{Error, Result};
pub use queue::{AnalysisMessage, HandoffReceiver, HandoffSender, handoff_queue};
pub use voice::VoiceSession;
