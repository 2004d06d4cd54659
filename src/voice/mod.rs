//! Voice session module
//!
//! A voice session speaks on behalf of the assistant and owns the
//! conversation history. Speech recognition and turn-taking belong to the
//! hosted pipeline; this crate only appends context and asks for speech.

mod console;
mod playback;
mod speaker;
mod tts;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;

pub use console::ConsoleSession;
pub use playback::{AudioPlayback, DEFAULT_PLAYER};
pub use speaker::SpeakerSession;
pub use tts::{DEFAULT_TTS_MODEL, DEFAULT_TTS_TIMEOUT, DEFAULT_TTS_VOICE, TextToSpeech};

/// Who authored a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry in the conversation history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Ordered, append-only conversation history
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    messages: Vec<ChatMessage>,
}

impl ConversationHistory {
    /// Start a history seeded with the assistant's system prompt
    #[must_use]
    pub fn with_system_prompt(prompt: &str) -> Self {
        let mut history = Self::default();
        if !prompt.is_empty() {
            history.push(ChatMessage::system(prompt));
        }
        history
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[must_use]
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// The conversational agent the loop drives
#[async_trait]
pub trait VoiceSession: Send {
    /// Current conversation history
    fn history(&self) -> &ConversationHistory;

    /// Append an entry to the conversation history
    ///
    /// # Errors
    ///
    /// Returns error if the session can no longer accept context
    fn append_message(&mut self, message: ChatMessage) -> Result<()>;

    /// Speak `text` aloud
    ///
    /// When `allow_interruptions` is set the utterance may be cut short.
    ///
    /// # Errors
    ///
    /// Returns error if speech could not be produced
    async fn say(&mut self, text: &str, allow_interruptions: bool) -> Result<()>;
}
