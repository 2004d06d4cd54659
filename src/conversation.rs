//! Conversation loop
//!
//! The single long-lived task that reacts to image uploads: each iteration it
//! speaks at most one queued analysis, checks the optional upload pointer, and
//! then yields for a short tick so the voice session's own work keeps running.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::attachments::{ImageAnalyzer, analyze_upload};
use crate::pointer::UploadPointer;
use crate::queue::{HandoffReceiver, HandoffSender};
use crate::voice::{ChatMessage, VoiceSession};
use crate::Result;

/// Pause between loop iterations
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

/// Opening line spoken once the session is up
pub const DEFAULT_GREETING: &str =
    "Hi there, how are you doing today? You can upload images and I'll analyze them for you.";

/// Drives a voice session from the image hand-off queue
pub struct ConversationLoop<S> {
    session: S,
    inbox: HandoffReceiver,
    outbox: HandoffSender,
    analyzer: Arc<dyn ImageAnalyzer>,
    pointer: Option<UploadPointer>,
    tick: Duration,
}

impl<S: VoiceSession> ConversationLoop<S> {
    /// Create a loop speaking through `session`
    ///
    /// `outbox` feeds the same queue as `inbox`; pointer-triggered analyses
    /// are enqueued there and spoken on the following iteration.
    #[must_use]
    pub fn new(
        session: S,
        inbox: HandoffReceiver,
        outbox: HandoffSender,
        analyzer: Arc<dyn ImageAnalyzer>,
    ) -> Self {
        Self {
            session,
            inbox,
            outbox,
            analyzer,
            pointer: None,
            tick: DEFAULT_TICK,
        }
    }

    /// Also poll an upload pointer file written by an external uploader
    #[must_use]
    pub fn with_pointer(mut self, pointer: UploadPointer) -> Self {
        self.pointer = Some(pointer);
        self
    }

    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    #[must_use]
    pub const fn session(&self) -> &S {
        &self.session
    }

    /// Speak the opening line
    ///
    /// # Errors
    ///
    /// Returns error if the session fails to speak
    pub async fn greet(&mut self, greeting: &str) -> Result<()> {
        self.session.say(greeting, true).await
    }

    /// Run one iteration without the trailing pause
    ///
    /// Returns whether a queued analysis was spoken.
    ///
    /// # Errors
    ///
    /// Returns error if appending context or speaking fails
    pub async fn step(&mut self) -> Result<bool> {
        let spoke = self.speak_next().await?;
        self.poll_pointer().await;
        Ok(spoke)
    }

    /// Iterate until `shutdown` fires
    ///
    /// A shutdown signal cancels an iteration in progress, including a
    /// `say` still waiting on synthesis. Dropping every sender does not
    /// count as a signal.
    ///
    /// # Errors
    ///
    /// Returns the first session error; the loop does not restart itself
    pub async fn run(mut self, shutdown: &mut mpsc::Receiver<()>) -> Result<()> {
        tracing::info!(tick_ms = self.tick.as_millis(), "conversation loop running");

        loop {
            tokio::select! {
                Some(()) = shutdown.recv() => break,
                result = self.step() => {
                    result?;
                }
            }

            tokio::select! {
                Some(()) = shutdown.recv() => break,
                () = tokio::time::sleep(self.tick) => {}
            }
        }

        tracing::info!("shutdown requested");
        Ok(())
    }

    /// Speak the oldest queued analysis, if any
    async fn speak_next(&mut self) -> Result<bool> {
        let Some(message) = self.inbox.try_dequeue() else {
            return Ok(false);
        };

        tracing::debug!(file = %message.source_filename, "speaking image analysis");
        self.session
            .append_message(ChatMessage::system(message.history_entry()))?;
        self.session.say(&message.message_to_say, true).await?;
        Ok(true)
    }

    async fn poll_pointer(&self) {
        let Some(pointer) = &self.pointer else {
            return;
        };

        let image = match pointer.take().await {
            Ok(Some(image)) => image,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(pointer = %pointer.path().display(), error = %e, "failed to read upload pointer");
                return;
            }
        };

        let filename = image
            .file_name()
            .map_or_else(|| image.display().to_string(), |n| n.to_string_lossy().into_owned());

        tracing::info!(image = %image.display(), "picked up pointed-to upload");
        let message = analyze_upload(self.analyzer.as_ref(), &image, &filename).await;
        if let Err(e) = self.outbox.enqueue(message) {
            tracing::warn!(error = %e, "failed to queue analysis");
        }
    }
}
