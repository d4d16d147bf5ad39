use std::path::Path;

use tracing::{error, info};

use crate::error::{Result, VideoError};
use crate::scene::ReadyScene;
use crate::video::engine::{EncodingEngine, EngineProvider};
use crate::video::subtitles::build_srt;

const SUBTITLE_FILE: &str = "subtitles.srt";
const OUTPUT_FILE: &str = "output.mp4";
const ZOOMPAN_FPS: u64 = 25;

/// User-facing message for any export failure; the underlying detail goes
/// to the log only.
const FAILURE_MESSAGE: &str =
    "Failed to create the video. Please ensure the encoding engine is available.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPhase {
    Idle,
    LoadingEngine,
    PreparingAssets,
    Encoding,
    Finalizing,
    Done,
    Failed,
}

impl ExportPhase {
    pub fn label(&self) -> &'static str {
        match self {
            ExportPhase::Idle => "Ready",
            ExportPhase::LoadingEngine => "Loading video engine...",
            ExportPhase::PreparingAssets => "Preparing assets...",
            ExportPhase::Encoding => "Encoding video... This can take a minute.",
            ExportPhase::Finalizing => "Finalizing...",
            ExportPhase::Done => "Done",
            ExportPhase::Failed => "Failed",
        }
    }

    /// True while a job owns the engine; a new export is rejected then.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            ExportPhase::LoadingEngine
                | ExportPhase::PreparingAssets
                | ExportPhase::Encoding
                | ExportPhase::Finalizing
        )
    }
}

#[derive(Debug, Clone)]
pub struct ExportStatus {
    pub phase: ExportPhase,
    pub progress: u8,
    pub error: Option<String>,
}

impl ExportStatus {
    fn idle() -> Self {
        Self {
            phase: ExportPhase::Idle,
            progress: 0,
            error: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub scene_duration_secs: u64,
    pub width: u32,
    pub height: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            scene_duration_secs: 5,
            width: 1280,
            height: 720,
        }
    }
}

/// Turns a ready-scene list into one downloadable video file: staged
/// stills, a pan/zoom motion filter, burned-in subtitles, fixed per-scene
/// timing. One job at a time; the engine is acquired fresh per job and
/// terminated whether the job succeeds or fails.
pub struct Exporter<'a> {
    provider: &'a dyn EngineProvider,
    config: ExportConfig,
    status: ExportStatus,
}

impl<'a> Exporter<'a> {
    pub fn new(provider: &'a dyn EngineProvider) -> Self {
        Self::with_config(provider, ExportConfig::default())
    }

    pub fn with_config(provider: &'a dyn EngineProvider, config: ExportConfig) -> Self {
        Self {
            provider,
            config,
            status: ExportStatus::idle(),
        }
    }

    pub fn status(&self) -> &ExportStatus {
        &self.status
    }

    /// Run one export job, writing the finished video to `output_path`.
    /// `on_status` fires on every phase or progress change.
    pub async fn export(
        &mut self,
        scenes: &[ReadyScene],
        output_path: &Path,
        mut on_status: impl FnMut(&ExportStatus) + Send,
    ) -> Result<()> {
        if self.status.phase.is_in_flight() {
            return Err(VideoError::ExportInProgress);
        }
        if scenes.is_empty() {
            return Err(VideoError::Export("there are no scenes to export".to_string()));
        }

        self.status = ExportStatus::idle();
        self.set_phase(ExportPhase::LoadingEngine, &mut on_status);

        let mut engine = match self.provider.acquire() {
            Ok(engine) => engine,
            Err(e) => {
                self.fail(&e, &mut on_status);
                return Err(e);
            }
        };

        let result = self
            .run_job(engine.as_mut(), scenes, output_path, &mut on_status)
            .await;

        // Guaranteed release: the engine never outlives its job.
        engine.terminate().await;

        match result {
            Ok(()) => {
                self.status.progress = 100;
                self.set_phase(ExportPhase::Done, &mut on_status);
                info!("Export finished: {}", output_path.display());
                Ok(())
            }
            Err(e) => {
                self.fail(&e, &mut on_status);
                Err(e)
            }
        }
    }

    async fn run_job(
        &mut self,
        engine: &mut dyn EncodingEngine,
        scenes: &[ReadyScene],
        output_path: &Path,
        on_status: &mut (dyn FnMut(&ExportStatus) + Send),
    ) -> Result<()> {
        engine.load().await?;

        self.set_phase(ExportPhase::PreparingAssets, on_status);
        // Lexicographically sortable names keep the implicit filename-order
        // concatenation deterministic. Scenes whose image generation failed
        // get a synthesized placeholder frame so the visual timeline stays
        // aligned with the subtitle track.
        let mut placeholder: Option<Vec<u8>> = None;
        for (i, scene) in scenes.iter().enumerate() {
            let name = format!("scene_{:02}.jpeg", i + 1);
            match &scene.image {
                Some(bytes) => engine.write_file(&name, bytes).await?,
                None => {
                    if placeholder.is_none() {
                        placeholder =
                            Some(placeholder_frame(self.config.width, self.config.height)?);
                    }
                    engine
                        .write_file(&name, placeholder.as_deref().unwrap_or_default())
                        .await?;
                }
            }
        }

        let duration = self.config.scene_duration_secs;
        let srt = build_srt(scenes, duration);
        engine.write_file(SUBTITLE_FILE, srt.as_bytes()).await?;

        self.set_phase(ExportPhase::Encoding, on_status);
        let total_secs = scenes.len() as u64 * duration;
        let args = self.encode_args(total_secs);

        let status = &mut self.status;
        let total = total_secs as f64;
        let mut on_progress = |encoded_secs: f64| {
            let percent = ((encoded_secs / total) * 100.0).round().clamp(0.0, 100.0) as u8;
            if percent != status.progress {
                status.progress = percent;
                on_status(status);
            }
        };
        engine.exec(&args, &mut on_progress).await?;

        self.set_phase(ExportPhase::Finalizing, on_status);
        let video = engine.read_file(OUTPUT_FILE).await?;
        tokio::fs::write(output_path, video).await?;

        Ok(())
    }

    fn encode_args(&self, total_secs: u64) -> Vec<String> {
        let d = self.config.scene_duration_secs;
        let filter = format!(
            "zoompan=z='min(zoom+0.0015,1.5)':d={}:x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':s={}x{},subtitles={},format=yuv420p",
            d * ZOOMPAN_FPS,
            self.config.width,
            self.config.height,
            SUBTITLE_FILE
        );
        vec![
            "-framerate".to_string(),
            format!("1/{}", d),
            "-i".to_string(),
            "scene_%02d.jpeg".to_string(),
            "-vf".to_string(),
            filter,
            "-c:v".to_string(),
            "libx264".to_string(),
            "-t".to_string(),
            total_secs.to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            "-y".to_string(),
            OUTPUT_FILE.to_string(),
        ]
    }

    fn set_phase(&mut self, phase: ExportPhase, on_status: &mut (dyn FnMut(&ExportStatus) + Send)) {
        self.status.phase = phase;
        info!("{}", phase.label());
        on_status(&self.status);
    }

    fn fail(&mut self, cause: &VideoError, on_status: &mut (dyn FnMut(&ExportStatus) + Send)) {
        error!("Export failed: {}", cause);
        self.status.phase = ExportPhase::Failed;
        self.status.error = Some(FAILURE_MESSAGE.to_string());
        on_status(&self.status);
    }
}

/// Solid dark frame standing in for a scene whose image generation failed.
fn placeholder_frame(width: u32, height: u32) -> Result<Vec<u8>> {
    let frame = image::RgbImage::from_pixel(width, height, image::Rgb([18, 18, 22]));
    let mut bytes = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(std::io::Cursor::new(&mut bytes), 85)
        .encode(frame.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .map_err(|e| VideoError::Export(format!("failed to synthesize placeholder frame: {}", e)))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct MockState {
        files: BTreeMap<String, Vec<u8>>,
        execs: Vec<Vec<String>>,
        loads: usize,
        terminations: usize,
    }

    struct MockEngine {
        state: Arc<Mutex<MockState>>,
        fail_load: bool,
        fail_exec: bool,
        /// Encoded-seconds values reported during exec.
        emit: Vec<f64>,
    }

    #[async_trait]
    impl EncodingEngine for MockEngine {
        async fn load(&mut self) -> crate::error::Result<()> {
            self.state.lock().unwrap().loads += 1;
            if self.fail_load {
                return Err(VideoError::Engine("engine bundle unavailable".to_string()));
            }
            Ok(())
        }

        async fn write_file(&mut self, name: &str, data: &[u8]) -> crate::error::Result<()> {
            self.state
                .lock()
                .unwrap()
                .files
                .insert(name.to_string(), data.to_vec());
            Ok(())
        }

        async fn exec(
            &mut self,
            args: &[String],
            on_progress: &mut (dyn FnMut(f64) + Send),
        ) -> crate::error::Result<()> {
            self.state.lock().unwrap().execs.push(args.to_vec());
            for secs in &self.emit {
                on_progress(*secs);
            }
            if self.fail_exec {
                return Err(VideoError::Engine("encode step crashed".to_string()));
            }
            self.state
                .lock()
                .unwrap()
                .files
                .insert(OUTPUT_FILE.to_string(), b"encoded-video".to_vec());
            Ok(())
        }

        async fn read_file(&mut self, name: &str) -> crate::error::Result<Vec<u8>> {
            self.state
                .lock()
                .unwrap()
                .files
                .get(name)
                .cloned()
                .ok_or_else(|| VideoError::Engine(format!("no such file: {name}")))
        }

        async fn terminate(&mut self) {
            self.state.lock().unwrap().terminations += 1;
        }
    }

    #[derive(Default)]
    struct MockProvider {
        state: Arc<Mutex<MockState>>,
        acquisitions: AtomicUsize,
        fail_load: bool,
        fail_exec: bool,
        emit: Vec<f64>,
    }

    impl EngineProvider for MockProvider {
        fn acquire(&self) -> crate::error::Result<Box<dyn EncodingEngine>> {
            self.acquisitions.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockEngine {
                state: Arc::clone(&self.state),
                fail_load: self.fail_load,
                fail_exec: self.fail_exec,
                emit: self.emit.clone(),
            }))
        }
    }

    fn scenes_with_images(n: usize) -> Vec<ReadyScene> {
        (0..n)
            .map(|i| ReadyScene {
                narration: format!("narration {i}"),
                image: Some(format!("jpeg-{i}").into_bytes()),
            })
            .collect()
    }

    fn out_path(dir: &tempfile::TempDir) -> std::path::PathBuf {
        dir.path().join("explanation_video.mp4")
    }

    #[tokio::test]
    async fn stages_assets_and_encodes_once() {
        let provider = MockProvider::default();
        let dir = tempfile::tempdir().unwrap();
        let output = out_path(&dir);

        let mut exporter = Exporter::new(&provider);
        exporter
            .export(&scenes_with_images(3), &output, |_| {})
            .await
            .unwrap();

        let state = provider.state.lock().unwrap();
        assert_eq!(state.files.get("scene_01.jpeg").unwrap(), b"jpeg-0");
        assert_eq!(state.files.get("scene_02.jpeg").unwrap(), b"jpeg-1");
        assert_eq!(state.files.get("scene_03.jpeg").unwrap(), b"jpeg-2");

        let srt = String::from_utf8(state.files.get(SUBTITLE_FILE).unwrap().clone()).unwrap();
        assert_eq!(srt.matches(" --> ").count(), 3);
        assert!(srt.contains("00:00:10,000 --> 00:00:15,000"));

        assert_eq!(state.execs.len(), 1);
        let args = &state.execs[0];
        assert!(args.windows(2).any(|w| w[0] == "-framerate" && w[1] == "1/5"));
        assert!(args.windows(2).any(|w| w[0] == "-t" && w[1] == "15"));
        assert!(args.contains(&"+faststart".to_string()));
        let filter = &args[args.iter().position(|a| a.as_str() == "-vf").unwrap() + 1];
        assert!(filter.contains("zoompan="));
        assert!(filter.contains("subtitles=subtitles.srt"));
        assert!(filter.contains("s=1280x720"));

        assert_eq!(state.terminations, 1);
        drop(state);

        assert_eq!(exporter.status().phase, ExportPhase::Done);
        assert_eq!(exporter.status().progress, 100);
        assert_eq!(std::fs::read(&output).unwrap(), b"encoded-video");
    }

    #[tokio::test]
    async fn absent_image_is_staged_as_placeholder() {
        let provider = MockProvider::default();
        let dir = tempfile::tempdir().unwrap();

        let mut scenes = scenes_with_images(2);
        scenes[0].image = None;

        let mut exporter = Exporter::new(&provider);
        exporter.export(&scenes, &out_path(&dir), |_| {}).await.unwrap();

        let state = provider.state.lock().unwrap();
        let placeholder = state.files.get("scene_01.jpeg").unwrap();
        // A real JPEG frame, not an empty gap: timing stays aligned with
        // the subtitle track.
        assert!(placeholder.starts_with(&[0xFF, 0xD8]));
        assert_eq!(state.files.get("scene_02.jpeg").unwrap(), b"jpeg-1");
        let srt = String::from_utf8(state.files.get(SUBTITLE_FILE).unwrap().clone()).unwrap();
        assert_eq!(srt.matches(" --> ").count(), 2);
    }

    #[tokio::test]
    async fn failure_still_releases_engine() {
        let provider = MockProvider {
            fail_exec: true,
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();

        let mut exporter = Exporter::new(&provider);
        let result = exporter
            .export(&scenes_with_images(2), &out_path(&dir), |_| {})
            .await;

        assert!(result.is_err());
        assert_eq!(exporter.status().phase, ExportPhase::Failed);
        // Generic user-facing message, not the engine detail.
        let message = exporter.status().error.as_deref().unwrap();
        assert!(!message.contains("crashed"));
        assert_eq!(provider.state.lock().unwrap().terminations, 1);
    }

    #[tokio::test]
    async fn engine_load_failure_is_a_stage_failure() {
        let provider = MockProvider {
            fail_load: true,
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();

        let mut exporter = Exporter::new(&provider);
        let result = exporter
            .export(&scenes_with_images(1), &out_path(&dir), |_| {})
            .await;

        assert!(result.is_err());
        assert_eq!(exporter.status().phase, ExportPhase::Failed);
        assert_eq!(provider.state.lock().unwrap().terminations, 1);
    }

    #[tokio::test]
    async fn in_flight_export_rejects_a_second_request() {
        let provider = MockProvider::default();
        let dir = tempfile::tempdir().unwrap();

        let mut exporter = Exporter::new(&provider);
        exporter.status.phase = ExportPhase::Encoding;

        let result = exporter
            .export(&scenes_with_images(1), &out_path(&dir), |_| {})
            .await;
        assert!(matches!(result, Err(VideoError::ExportInProgress)));
        assert_eq!(provider.acquisitions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_scene_list_is_rejected() {
        let provider = MockProvider::default();
        let dir = tempfile::tempdir().unwrap();

        let mut exporter = Exporter::new(&provider);
        assert!(exporter.export(&[], &out_path(&dir), |_| {}).await.is_err());
        assert_eq!(provider.acquisitions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn progress_tracks_engine_reports() {
        let provider = MockProvider {
            // 3 scenes x 5s = 15s total; 7.5s encoded is 50%.
            emit: vec![3.0, 7.5, 15.0],
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();

        let mut exporter = Exporter::new(&provider);
        let mut seen = Vec::new();
        exporter
            .export(&scenes_with_images(3), &out_path(&dir), |status| {
                seen.push((status.phase, status.progress));
            })
            .await
            .unwrap();

        assert!(seen.contains(&(ExportPhase::Encoding, 20)));
        assert!(seen.contains(&(ExportPhase::Encoding, 50)));
        assert!(seen.contains(&(ExportPhase::Encoding, 100)));
        assert_eq!(*seen.last().unwrap(), (ExportPhase::Done, 100));
    }

    #[tokio::test]
    async fn each_job_acquires_a_fresh_engine() {
        let provider = MockProvider::default();
        let dir = tempfile::tempdir().unwrap();
        let scenes = scenes_with_images(2);

        let mut exporter = Exporter::new(&provider);
        exporter.export(&scenes, &out_path(&dir), |_| {}).await.unwrap();
        exporter.export(&scenes, &out_path(&dir), |_| {}).await.unwrap();

        assert_eq!(provider.acquisitions.load(Ordering::SeqCst), 2);
        let state = provider.state.lock().unwrap();
        assert_eq!(state.loads, 2);
        assert_eq!(state.terminations, 2);
    }
}
