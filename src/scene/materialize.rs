use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::Result;
use crate::scene::{ReadyScene, Script};

/// Image-generation collaborator boundary. The real implementation talks to
/// the image service; tests substitute a scripted fake.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Generate one raster image for the prompt, returned as encoded bytes.
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>>;
}

/// Outcome of materializing a script: one ready scene per request, in the
/// same order, plus a human-readable warning per failed scene.
#[derive(Debug)]
pub struct MaterializeOutcome {
    pub scenes: Vec<ReadyScene>,
    pub warnings: Vec<String>,
}

impl MaterializeOutcome {
    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Resolves a script's image prompts into ready scenes.
pub struct Materializer<'a> {
    source: &'a dyn ImageSource,
}

impl<'a> Materializer<'a> {
    pub fn new(source: &'a dyn ImageSource) -> Self {
        Self { source }
    }

    /// Materialize every scene, strictly in input order, one request in
    /// flight at a time. A per-scene failure sets that scene's image to
    /// None and records a warning; the remaining scenes still run. The
    /// output always has exactly as many scenes as the script.
    ///
    /// `on_progress` is called with (current, total), 1-based, before each
    /// request.
    pub async fn materialize(
        &self,
        script: &Script,
        mut on_progress: impl FnMut(usize, usize) + Send,
    ) -> MaterializeOutcome {
        let total = script.len();
        let mut scenes = Vec::with_capacity(total);
        let mut warnings = Vec::new();

        for (i, request) in script.scenes.iter().enumerate() {
            on_progress(i + 1, total);
            info!("Generating image for scene {}/{}", i + 1, total);

            let image = match self.source.generate_image(&request.image_prompt).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!("Image generation failed for scene {}: {}", i + 1, e);
                    warnings.push(format!(
                        "Image generation failed for scene {}: {}. The video may be incomplete.",
                        i + 1,
                        e
                    ));
                    None
                }
            };

            scenes.push(ReadyScene {
                narration: request.narration.clone(),
                image,
            });
        }

        MaterializeOutcome { scenes, warnings }
    }
}
