//! Transcript-only voice session

use async_trait::async_trait;

use super::{ChatMessage, ConversationHistory, VoiceSession};
use crate::Result;

/// Writes what the assistant would say to stdout
///
/// Used for headless runs and as the fallback when speech synthesis has no
/// credential to work with.
#[derive(Debug, Default)]
pub struct ConsoleSession {
    history: ConversationHistory,
}

impl ConsoleSession {
    #[must_use]
    pub const fn new(history: ConversationHistory) -> Self {
        Self { history }
    }
}

#[async_trait]
impl VoiceSession for ConsoleSession {
    fn history(&self) -> &ConversationHistory {
        &self.history
    }

    fn append_message(&mut self, message: ChatMessage) -> Result<()> {
        tracing::debug!(role = ?message.role, content = %message.content, "context appended");
        self.history.push(message);
        Ok(())
    }

    async fn say(&mut self, text: &str, _allow_interruptions: bool) -> Result<()> {
        tracing::info!(text = %text, "assistant says");
        println!("assistant: {text}");
        self.history.push(ChatMessage::assistant(text));
        Ok(())
    }
}
