//! Spoken voice session: hosted TTS played on the local speaker

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{AudioPlayback, ChatMessage, ConversationHistory, TextToSpeech, VoiceSession};
use crate::{Error, Result};

/// Speaks through hosted TTS and a local audio player
pub struct SpeakerSession {
    history: ConversationHistory,
    tts: TextToSpeech,
    playback: AudioPlayback,
    interrupt: Arc<Notify>,
}

impl SpeakerSession {
    #[must_use]
    pub fn new(history: ConversationHistory, tts: TextToSpeech, playback: AudioPlayback) -> Self {
        Self {
            history,
            tts,
            playback,
            interrupt: Arc::new(Notify::new()),
        }
    }

    /// Share an interrupt handle owned elsewhere (e.g. a shutdown task)
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: Arc<Notify>) -> Self {
        self.interrupt = interrupt;
        self
    }
}

#[async_trait]
impl VoiceSession for SpeakerSession {
    fn history(&self) -> &ConversationHistory {
        &self.history
    }

    fn append_message(&mut self, message: ChatMessage) -> Result<()> {
        tracing::debug!(role = ?message.role, content = %message.content, "context appended");
        self.history.push(message);
        Ok(())
    }

    async fn say(&mut self, text: &str, allow_interruptions: bool) -> Result<()> {
        match self.tts.synthesize(text).await {
            Ok(audio) => {
                let interrupt = allow_interruptions.then_some(&*self.interrupt);
                self.playback.play_wav(&audio, interrupt).await?;
            }
            Err(Error::Credential(reason)) => {
                tracing::warn!(reason = %reason, "speaking to transcript until a credential is set");
                println!("assistant: {text}");
            }
            Err(e) => return Err(e),
        }

        self.history.push(ChatMessage::assistant(text));
        Ok(())
    }
}
