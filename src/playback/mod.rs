pub mod narrator;
pub mod voice;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::error::{Result, VideoError};
use crate::playback::narrator::{NarrationError, Narrator, VoiceInfo};
use crate::playback::voice::choose_voice;
use crate::scene::ReadyScene;

/// Pan/zoom variants cycled across consecutive scenes so each one visibly
/// differs from the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionEffect {
    PanTopLeft,
    PanTopRight,
    PanBottomLeft,
    PanBottomRight,
}

impl MotionEffect {
    pub const ALL: [MotionEffect; 4] = [
        MotionEffect::PanTopLeft,
        MotionEffect::PanTopRight,
        MotionEffect::PanBottomLeft,
        MotionEffect::PanBottomRight,
    ];

    /// Deterministic variant for a scene index.
    pub fn for_scene(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing(usize),
    Finished,
    /// Stopped by an explicit close; never user-visible as a failure.
    Stopped,
    Failed(String),
}

type CloseCallback = Box<dyn FnOnce() + Send>;

/// Handle for closing the player from outside the play loop. Cloneable,
/// idempotent, safe to use from any state.
#[derive(Clone)]
pub struct CloseHandle {
    closed: Arc<AtomicBool>,
    narrator: Arc<dyn Narrator>,
    on_close: Arc<Mutex<Option<CloseCallback>>>,
}

impl CloseHandle {
    /// Cancel any in-flight narration and fire the completion callback.
    /// Only the first call has an effect.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("Closing playback");
        self.narrator.cancel();
        if let Some(callback) = self.on_close.lock().unwrap().take() {
            callback();
        }
    }
}

/// Drives timed, narrated playback of a ready-scene list: one scene at a
/// time, a motion effect and an utterance per scene, advancing only when
/// the utterance definitively ends.
pub struct Sequencer {
    scenes: Vec<ReadyScene>,
    narrator: Arc<dyn Narrator>,
    language: String,
    region: String,
    /// Cached result of voice selection; chosen once, reused across plays.
    voice: Option<VoiceInfo>,
    voice_chosen: bool,
    state: PlaybackState,
    closed: Arc<AtomicBool>,
    on_close: Arc<Mutex<Option<CloseCallback>>>,
}

impl Sequencer {
    pub fn new(scenes: Vec<ReadyScene>, narrator: Arc<dyn Narrator>) -> Self {
        Self {
            scenes,
            narrator,
            language: "en".to_string(),
            region: "en-US".to_string(),
            voice: None,
            voice_chosen: false,
            state: PlaybackState::Idle,
            closed: Arc::new(AtomicBool::new(false)),
            on_close: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>, region: impl Into<String>) -> Self {
        self.language = language.into();
        self.region = region.into();
        self
    }

    /// Register a callback fired exactly once when the player is closed.
    pub fn on_close(&mut self, callback: impl FnOnce() + Send + 'static) {
        *self.on_close.lock().unwrap() = Some(Box::new(callback));
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn handle(&self) -> CloseHandle {
        CloseHandle {
            closed: Arc::clone(&self.closed),
            narrator: Arc::clone(&self.narrator),
            on_close: Arc::clone(&self.on_close),
        }
    }

    pub fn close(&self) {
        self.handle().close();
    }

    /// Play all scenes from the start. Valid only from `Idle` or
    /// `Finished`; always resets to scene 0. Returns the terminal state:
    /// `Finished` after the last scene's narration completes, `Stopped`
    /// after a close (silently, even mid-utterance), or `Failed` on a
    /// genuine narration error.
    ///
    /// `on_scene` fires on each transition into a scene with its index,
    /// motion effect variant, and the scene itself.
    pub async fn play(
        &mut self,
        mut on_scene: impl FnMut(usize, MotionEffect, &ReadyScene) + Send,
    ) -> Result<PlaybackState> {
        match self.state {
            PlaybackState::Idle | PlaybackState::Finished => {}
            _ => {
                return Err(VideoError::Playback(format!(
                    "playback cannot start from {:?}",
                    self.state
                )))
            }
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(VideoError::Playback("player is closed".to_string()));
        }

        let voice = self.ensure_voice().await;

        for index in 0..self.scenes.len() {
            if self.closed.load(Ordering::SeqCst) {
                self.state = PlaybackState::Stopped;
                return Ok(self.state.clone());
            }

            self.state = PlaybackState::Playing(index);
            let effect = MotionEffect::for_scene(index);
            on_scene(index, effect, &self.scenes[index]);

            let narration = self.scenes[index].narration.clone();
            match self.narrator.speak(&narration, voice.as_ref()).await {
                Ok(()) => {}
                Err(NarrationError::Cancelled) => {
                    // Interrupted by our own close; not a failure.
                    info!("Narration interrupted, stopping playback");
                    self.state = PlaybackState::Stopped;
                    return Ok(self.state.clone());
                }
                Err(NarrationError::Failed(msg)) => {
                    warn!("Narration failed on scene {}: {}", index, msg);
                    let message =
                        format!("Speech synthesis failed: {}. Your platform might not support it.", msg);
                    self.state = PlaybackState::Failed(message);
                    return Ok(self.state.clone());
                }
            }
        }

        self.state = PlaybackState::Finished;
        Ok(self.state.clone())
    }

    /// Voice selection is a one-time preference: once the backend reports
    /// a non-empty voice list, resolve it through the ranked policy and
    /// cache the result. An empty list means the voices have not become
    /// available yet, so the next play asks again.
    async fn ensure_voice(&mut self) -> Option<VoiceInfo> {
        if !self.voice_chosen {
            let voices = self.narrator.voices().await;
            if !voices.is_empty() {
                self.voice = choose_voice(&voices, &self.language, &self.region).cloned();
                self.voice_chosen = true;
                debug!("Selected narration voice: {:?}", self.voice);
            }
        }
        self.voice.clone()
    }
}
