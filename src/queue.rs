//! Image hand-off queue
//!
//! Carries finished image analyses from upload handlers (any thread or task)
//! into the single conversation loop. Producers never wait on the consumer.

use tokio::sync::mpsc;

use crate::{Error, Result};

/// Prefix spoken before every successful image description
const UPLOAD_PREAMBLE: &str = "I received an image upload.";

/// Result of analyzing one uploaded image, waiting to be spoken
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisMessage {
    /// Text handed to the voice session verbatim
    pub message_to_say: String,
    /// Name of the uploaded file as the user sent it
    pub source_filename: String,
    /// Raw description returned by the vision model
    pub analysis_text: String,
}

impl AnalysisMessage {
    /// Build the message for a successful analysis
    #[must_use]
    pub fn from_analysis(source_filename: impl Into<String>, analysis_text: impl Into<String>) -> Self {
        let analysis_text = analysis_text.into();
        Self {
            message_to_say: format!("{UPLOAD_PREAMBLE} {analysis_text}"),
            source_filename: source_filename.into(),
            analysis_text,
        }
    }

    /// Build the apology spoken when analysis failed
    #[must_use]
    pub fn analysis_failed(source_filename: impl Into<String>, reason: &str) -> Self {
        let source_filename = source_filename.into();
        Self {
            message_to_say: format!(
                "{UPLOAD_PREAMBLE} Sorry, I wasn't able to analyze {source_filename} right now."
            ),
            analysis_text: format!("analysis failed: {reason}"),
            source_filename,
        }
    }

    /// System-role history entry describing this analysis
    #[must_use]
    pub fn history_entry(&self) -> String {
        format!(
            "[Image uploaded: {}] Analysis: {}",
            self.source_filename, self.analysis_text
        )
    }
}

/// Create a connected sender/receiver pair
#[must_use]
pub fn handoff_queue() -> (HandoffSender, HandoffReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (HandoffSender { tx }, HandoffReceiver { rx })
}

/// Producer half; cheap to clone into request handlers
#[derive(Debug, Clone)]
pub struct HandoffSender {
    tx: mpsc::UnboundedSender<AnalysisMessage>,
}

impl HandoffSender {
    /// Append a message to the back of the queue
    ///
    /// Never blocks.
    ///
    /// # Errors
    ///
    /// Returns error if the receiving conversation loop has shut down
    pub fn enqueue(&self, message: AnalysisMessage) -> Result<()> {
        self.tx.send(message).map_err(|e| {
            Error::Queue(format!(
                "conversation loop stopped, dropping analysis of {}",
                e.0.source_filename
            ))
        })
    }

    /// Whether the consumer is gone
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half, owned by the conversation loop
#[derive(Debug)]
pub struct HandoffReceiver {
    rx: mpsc::UnboundedReceiver<AnalysisMessage>,
}

impl HandoffReceiver {
    /// Take the oldest message without waiting
    pub fn try_dequeue(&mut self) -> Option<AnalysisMessage> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next message; `None` once every sender is dropped
    pub async fn recv(&mut self) -> Option<AnalysisMessage> {
        self.rx.recv().await
    }

    /// Number of messages waiting
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether nothing is waiting
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
