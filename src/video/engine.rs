use std::process::Stdio;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Result, VideoError};

/// Encoding backend owned exclusively by one export job: working storage
/// keyed by file name, a single encode invocation, readable output, and
/// explicit termination. A terminated engine is never reused; each job
/// acquires a fresh one from an [`EngineProvider`].
#[async_trait]
pub trait EncodingEngine: Send {
    /// Initialize the engine. Must be called before any other operation.
    async fn load(&mut self) -> Result<()>;

    /// Write a named file into the engine's working storage.
    async fn write_file(&mut self, name: &str, data: &[u8]) -> Result<()>;

    /// Run one encode invocation. `on_progress` receives the number of
    /// output seconds encoded so far as the engine reports them.
    async fn exec(
        &mut self,
        args: &[String],
        on_progress: &mut (dyn FnMut(f64) + Send),
    ) -> Result<()>;

    /// Read a named file back out of the engine's working storage.
    async fn read_file(&mut self, name: &str) -> Result<Vec<u8>>;

    /// Release all engine resources. Safe to call whether or not the job
    /// succeeded, and after a failed `load`.
    async fn terminate(&mut self);
}

/// Hands out a fresh engine per export job.
pub trait EngineProvider: Send + Sync {
    fn acquire(&self) -> Result<Box<dyn EncodingEngine>>;
}

/// Engine backed by the system `ffmpeg` binary with a temporary directory
/// as working storage.
pub struct FfmpegEngine {
    command: String,
    workdir: Option<TempDir>,
}

impl FfmpegEngine {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            workdir: None,
        }
    }

    fn workdir(&self) -> Result<&TempDir> {
        self.workdir
            .as_ref()
            .ok_or_else(|| VideoError::Engine("engine is not loaded".to_string()))
    }
}

#[async_trait]
impl EncodingEngine for FfmpegEngine {
    async fn load(&mut self) -> Result<()> {
        info!("Loading video engine ({})", self.command);
        let status = Command::new(&self.command)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| VideoError::Engine(format!("{} is not available: {}", self.command, e)))?;
        if !status.success() {
            return Err(VideoError::Engine(format!(
                "{} -version exited with {}",
                self.command, status
            )));
        }

        self.workdir = Some(TempDir::new()?);
        Ok(())
    }

    async fn write_file(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let path = self.workdir()?.path().join(name);
        tokio::fs::write(&path, data).await?;
        Ok(())
    }

    async fn exec(
        &mut self,
        args: &[String],
        on_progress: &mut (dyn FnMut(f64) + Send),
    ) -> Result<()> {
        let workdir = self.workdir()?;
        debug!("Running {} {}", self.command, args.join(" "));

        let mut child = Command::new(&self.command)
            .current_dir(workdir.path())
            .args(["-progress", "pipe:1", "-nostats"])
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| VideoError::Engine(format!("failed to start {}: {}", self.command, e)))?;

        // ffmpeg reports out_time_us in the -progress stream; translate it
        // to encoded output seconds for the caller.
        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                if let Some(value) = line.strip_prefix("out_time_us=") {
                    if let Ok(us) = value.trim().parse::<i64>() {
                        if us >= 0 {
                            on_progress(us as f64 / 1_000_000.0);
                        }
                    }
                }
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| VideoError::Engine(format!("{} did not finish: {}", self.command, e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VideoError::Engine(format!(
                "encode failed ({}): {}",
                output.status,
                stderr.lines().last().unwrap_or("no detail")
            )));
        }

        Ok(())
    }

    async fn read_file(&mut self, name: &str) -> Result<Vec<u8>> {
        let path = self.workdir()?.path().join(name);
        Ok(tokio::fs::read(&path).await?)
    }

    async fn terminate(&mut self) {
        if let Some(workdir) = self.workdir.take() {
            debug!("Terminating video engine");
            workdir.close().ok();
        }
    }
}

/// Provider for [`FfmpegEngine`] instances.
pub struct FfmpegEngineProvider {
    command: String,
}

impl FfmpegEngineProvider {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Default for FfmpegEngineProvider {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl EngineProvider for FfmpegEngineProvider {
    fn acquire(&self) -> Result<Box<dyn EncodingEngine>> {
        Ok(Box::new(FfmpegEngine::new(self.command.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn operations_require_load() {
        let mut engine = FfmpegEngine::new("ffmpeg");
        assert!(engine.write_file("a.jpeg", b"x").await.is_err());
        assert!(engine.read_file("a.jpeg").await.is_err());
        assert!(engine.exec(&[], &mut |_| {}).await.is_err());
    }

    #[tokio::test]
    async fn terminate_without_load_is_safe() {
        let mut engine = FfmpegEngine::new("ffmpeg");
        engine.terminate().await;
        engine.terminate().await;
    }
}
