//! Daemon - the main gateway service
//!
//! Starts the upload API, waits for a credential, then runs the conversation
//! loop until Ctrl-C or a fatal error.

use std::sync::Arc;

use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;

use crate::api::{ApiServer, ApiState};
use crate::attachments::{ImageAnalyzer, VisionClient};
use crate::config::{Config, VoiceOutput};
use crate::conversation::ConversationLoop;
use crate::credentials::{CredentialResolver, wait_for_credential};
use crate::pointer::UploadPointer;
use crate::queue::{HandoffReceiver, HandoffSender, handoff_queue};
use crate::voice::{
    AudioPlayback, ConsoleSession, ConversationHistory, SpeakerSession, TextToSpeech, VoiceSession,
};
use crate::{Error, Result};

/// The iris daemon - serves uploads and speaks their analyses
pub struct Daemon {
    config: Config,
}

impl Daemon {
    /// Create a new daemon instance
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Build the vision client shared by the API and the conversation loop
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn vision_client(config: &Config, credentials: Arc<CredentialResolver>) -> Result<VisionClient> {
        Ok(VisionClient::new(credentials, config.vision.timeout)?
            .with_base_url(config.api_base.clone())
            .with_model(config.vision.model.clone())
            .with_prompt(config.vision.prompt.clone()))
    }

    /// Build the hosted TTS client
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn text_to_speech(config: &Config, credentials: Arc<CredentialResolver>) -> Result<TextToSpeech> {
        TextToSpeech::new(
            credentials,
            config.api_base.clone(),
            config.voice.tts_model.clone(),
            config.voice.tts_voice.clone(),
            config.voice.tts_timeout,
        )
    }

    /// Run the daemon
    ///
    /// # Errors
    ///
    /// Returns error if the API server fails or the conversation loop hits a
    /// fatal error
    pub async fn run(self) -> Result<()> {
        tracing::info!(
            port = self.config.api_server.port,
            output = ?self.config.voice.output,
            "daemon running"
        );

        let credentials = Arc::new(self.config.credential_resolver()?);
        let analyzer: Arc<dyn ImageAnalyzer> =
            Arc::new(Self::vision_client(&self.config, Arc::clone(&credentials))?);
        let (queue_tx, queue_rx) = handoff_queue();

        // Start the API first so a key can be set while we wait for one
        let state = Arc::new(ApiState {
            upload_dir: self.config.api_server.upload_dir.clone(),
            analyzer: Arc::clone(&analyzer),
            queue: queue_tx.clone(),
            credentials: Arc::clone(&credentials),
            max_upload_bytes: self.config.api_server.max_upload_bytes,
        });
        let mut api = ApiServer::new(state, self.config.api_server.port).spawn();

        // Set up shutdown signal
        let interrupt = Arc::new(Notify::new());
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let playback_interrupt = Arc::clone(&interrupt);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("ctrl-c received");
                playback_interrupt.notify_one();
                let _ = shutdown_tx.send(()).await;
            }
        });

        tokio::select! {
            credential = wait_for_credential(
                &credentials,
                self.config.credentials.poll_interval,
                self.config.credentials.timeout,
            ) => {
                if credential.is_none() {
                    tracing::warn!("hosted calls will fail until a key is set via /api/set-api-key");
                }
            }
            _ = shutdown_rx.recv() => {
                tracing::info!("daemon stopped during startup");
                return Ok(());
            }
            result = &mut api => return api_exit(result),
        }

        let history = ConversationHistory::with_system_prompt(&self.config.voice.system_prompt);

        match self.config.voice.output {
            VoiceOutput::Console => {
                let session = ConsoleSession::new(history);
                self.converse(session, queue_rx, queue_tx, analyzer, &mut shutdown_rx, &mut api)
                    .await?;
            }
            VoiceOutput::Speaker => {
                let tts = Self::text_to_speech(&self.config, Arc::clone(&credentials))?;
                let playback = AudioPlayback::new(&self.config.voice.player)?;
                let session = SpeakerSession::new(history, tts, playback).with_interrupt(interrupt);
                self.converse(session, queue_rx, queue_tx, analyzer, &mut shutdown_rx, &mut api)
                    .await?;
            }
        }

        api.abort();
        tracing::info!("daemon stopped");
        Ok(())
    }

    /// Greet, then drive the conversation loop alongside the API server
    async fn converse<S: VoiceSession>(
        &self,
        session: S,
        inbox: HandoffReceiver,
        outbox: HandoffSender,
        analyzer: Arc<dyn ImageAnalyzer>,
        shutdown: &mut mpsc::Receiver<()>,
        api: &mut JoinHandle<Result<()>>,
    ) -> Result<()> {
        let mut conversation = ConversationLoop::new(session, inbox, outbox, analyzer)
            .with_tick(self.config.conversation.tick);

        if let Some(path) = &self.config.conversation.upload_pointer {
            tracing::info!(path = %path.display(), "polling upload pointer");
            conversation = conversation.with_pointer(UploadPointer::new(path.clone()));
        }

        conversation.greet(&self.config.voice.greeting).await?;

        tokio::select! {
            result = conversation.run(shutdown) => result,
            result = api => api_exit(result),
        }
    }
}

/// Any exit of the API server task ends the daemon
fn api_exit(result: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    match result {
        Ok(Ok(())) => Err(Error::Config("API server exited unexpectedly".to_string())),
        Ok(Err(e)) => Err(e),
        Err(e) => Err(Error::Config(format!("API server task failed: {e}"))),
    }
}
