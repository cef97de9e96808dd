use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::config::CaptureConfig;

/// Handle to a launched capture subprocess.
#[async_trait]
pub trait CaptureProcess: Send {
    /// Request a graceful exit, giving the tool a chance to finalize its
    /// output file.
    async fn terminate(&mut self) -> Result<()>;

    /// Wait until the process has exited.
    async fn wait(&mut self) -> Result<()>;

    /// Kill the process outright and reap it.
    async fn force_kill(&mut self) -> Result<()>;
}

/// Launches capture subprocesses. Injectable so tests can substitute a stub
/// for the real capture tool.
#[async_trait]
pub trait CaptureSpawner: Send + Sync {
    async fn spawn(&self, output_path: &Path) -> Result<Box<dyn CaptureProcess>>;
}

/// Spawns the configured sox binary with the invocation from `CaptureConfig`.
pub struct SoxSpawner {
    config: CaptureConfig,
}

impl SoxSpawner {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }

    /// Probe that the capture binary is runnable. A missing tool is fatal at
    /// startup rather than a per-request surprise.
    pub async fn check_available(&self) -> Result<()> {
        let status = Command::new(&self.config.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .with_context(|| format!("capture tool `{}` is not runnable", self.config.binary))?;

        anyhow::ensure!(
            status.success(),
            "capture tool `{}` exited with {}",
            self.config.binary,
            status
        );
        Ok(())
    }
}

#[async_trait]
impl CaptureSpawner for SoxSpawner {
    async fn spawn(&self, output_path: &Path) -> Result<Box<dyn CaptureProcess>> {
        let args = self.config.capture_args(output_path);

        let child = Command::new(&self.config.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to launch `{}`", self.config.binary))?;

        debug!(pid = child.id(), binary = %self.config.binary, "capture process launched");
        Ok(Box::new(SoxProcess { child }))
    }
}

struct SoxProcess {
    child: Child,
}

#[async_trait]
impl CaptureProcess for SoxProcess {
    async fn terminate(&mut self) -> Result<()> {
        // SIGTERM lets sox flush buffered samples and finalize the WAV
        // header before exiting.
        let Some(pid) = self.child.id() else {
            return Ok(());
        };

        let status = Command::new("kill")
            .args(["-TERM", &pid.to_string()])
            .status()
            .await
            .context("failed to signal capture process")?;

        if !status.success() {
            warn!(pid, "SIGTERM delivery failed");
        }
        Ok(())
    }

    async fn wait(&mut self) -> Result<()> {
        let status = self
            .child
            .wait()
            .await
            .context("failed waiting for capture process")?;
        debug!(%status, "capture process exited");
        Ok(())
    }

    async fn force_kill(&mut self) -> Result<()> {
        // start_kill errors if the process already exited; either way the
        // wait below reaps it.
        if let Err(err) = self.child.start_kill() {
            debug!(error = %err, "kill on exited capture process");
        }
        self.child
            .wait()
            .await
            .context("failed reaping capture process")?;
        Ok(())
    }
}
