//! Audio playback through an external player command

use std::io::Write;

use tokio::process::Command;
use tokio::sync::Notify;

use crate::{Error, Result};

/// Default player for synthesized WAV audio
pub const DEFAULT_PLAYER: &str = "aplay -q";

/// Plays audio by handing a temporary file to a player program
#[derive(Debug, Clone)]
pub struct AudioPlayback {
    program: String,
    args: Vec<String>,
}

impl AudioPlayback {
    /// Create a playback instance from a command line such as `aplay -q`
    ///
    /// # Errors
    ///
    /// Returns error if the command line is empty
    pub fn new(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace().map(ToString::to_string);
        let program = parts
            .next()
            .ok_or_else(|| Error::Config("audio player command is empty".to_string()))?;

        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    /// Play WAV bytes, returning when playback finishes
    ///
    /// If `interrupt` is notified while playing, the player is stopped and
    /// playback counts as finished.
    ///
    /// # Errors
    ///
    /// Returns error if the player cannot be started or exits unsuccessfully
    pub async fn play_wav(&self, wav: &[u8], interrupt: Option<&Notify>) -> Result<()> {
        if wav.is_empty() {
            return Ok(());
        }

        let mut file = tempfile::Builder::new()
            .prefix("iris-")
            .suffix(".wav")
            .tempfile()?;
        file.write_all(wav)?;
        file.flush()?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(file.path())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Voice(format!("failed to start {}: {e}", self.program)))?;

        let status = match interrupt {
            Some(interrupt) => tokio::select! {
                status = child.wait() => status?,
                () = interrupt.notified() => {
                    child.kill().await?;
                    tracing::info!("playback interrupted");
                    return Ok(());
                }
            },
            None => child.wait().await?,
        };

        if !status.success() {
            return Err(Error::Voice(format!("{} exited with {status}", self.program)));
        }

        Ok(())
    }
}
