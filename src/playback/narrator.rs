use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// A voice the narration backend can speak with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceInfo {
    pub name: String,
    pub lang: String,
    /// True for voices synthesized entirely on-device; network-backed
    /// voices are generally higher quality.
    pub local: bool,
}

/// Narration failure taxonomy. Cancellation is caused by the sequencer
/// itself stopping narration and must never be surfaced as a user-visible
/// failure; anything else is a genuine playback error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NarrationError {
    #[error("narration cancelled")]
    Cancelled,

    #[error("Speech synthesis failed: {0}")]
    Failed(String),
}

/// Text-to-speech capability boundary.
#[async_trait]
pub trait Narrator: Send + Sync {
    /// Voices currently available, possibly empty.
    async fn voices(&self) -> Vec<VoiceInfo>;

    /// Speak one utterance to completion. Resolves with
    /// `NarrationError::Cancelled` when `cancel` interrupted it.
    async fn speak(
        &self,
        text: &str,
        voice: Option<&VoiceInfo>,
    ) -> std::result::Result<(), NarrationError>;

    /// Cancel the in-flight utterance, if any. Must be safe to call at any
    /// time, including when nothing is speaking.
    fn cancel(&self);
}

/// Narrator backed by a local TTS command (`espeak-ng` by default), one
/// child process per utterance. Cancellation kills the child.
pub struct ProcessNarrator {
    command: String,
    current: Mutex<Option<Child>>,
}

impl ProcessNarrator {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            current: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Narrator for ProcessNarrator {
    async fn voices(&self) -> Vec<VoiceInfo> {
        // The command backend speaks with its configured default voice.
        Vec::new()
    }

    async fn speak(
        &self,
        text: &str,
        voice: Option<&VoiceInfo>,
    ) -> std::result::Result<(), NarrationError> {
        let mut cmd = Command::new(&self.command);
        if let Some(voice) = voice {
            cmd.arg("-v").arg(&voice.name);
        }
        let child = cmd
            .arg(text)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| NarrationError::Failed(format!("{}: {}", self.command, e)))?;

        *self.current.lock().unwrap() = Some(child);

        loop {
            {
                let mut guard = self.current.lock().unwrap();
                match guard.as_mut() {
                    // cancel() took the child away.
                    None => return Err(NarrationError::Cancelled),
                    Some(child) => match child.try_wait() {
                        Ok(Some(status)) => {
                            guard.take();
                            if status.success() {
                                return Ok(());
                            }
                            return Err(NarrationError::Failed(format!(
                                "{} exited with {}",
                                self.command, status
                            )));
                        }
                        Ok(None) => {}
                        Err(e) => {
                            guard.take();
                            return Err(NarrationError::Failed(e.to_string()));
                        }
                    },
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    fn cancel(&self) {
        if let Some(mut child) = self.current.lock().unwrap().take() {
            debug!("Cancelling in-flight narration");
            child.kill().ok();
            child.wait().ok();
        }
    }
}
