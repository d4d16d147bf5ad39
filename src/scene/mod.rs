pub mod materialize;

use serde::{Deserialize, Serialize};

/// One requested scene: what to say and what to draw.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SceneRequest {
    pub narration: String,
    pub image_prompt: String,
}

/// An ordered scene list parsed out of a chat response. Immutable after
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Script {
    pub scenes: Vec<SceneRequest>,
}

/// A scene after materialization. `image` is None only when generation
/// failed for that scene; the scene itself is never dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyScene {
    pub narration: String,
    pub image: Option<Vec<u8>>,
}

impl Script {
    /// Best-effort classifier: interpret a chat response as a video script.
    ///
    /// Strips an optional surrounding code fence, then requires a JSON
    /// object with a non-empty `scenes` array where every element carries
    /// non-empty `narration` and `image_prompt`. Anything else (plain
    /// prose, malformed JSON, a missing field on any scene) yields None:
    /// that is the normal path for non-video replies, not an error.
    pub fn from_response(text: &str) -> Option<Script> {
        let json_text = text
            .trim()
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();

        let script: Script = serde_json::from_str(json_text).ok()?;

        if script.scenes.is_empty() {
            return None;
        }
        let complete = script
            .scenes
            .iter()
            .all(|s| !s.narration.trim().is_empty() && !s.image_prompt.trim().is_empty());
        if !complete {
            return None;
        }

        Some(script)
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}
