//! Recording supervisor
//!
//! Owns the single capture subprocess slot. All mutation happens under one
//! lock spanning the whole operation, including the terminate/wait/kill
//! sequence, so concurrent start/stop calls from different connections can
//! never race on the process handle.

mod process;

pub use process::{CaptureProcess, CaptureSpawner, SoxSpawner};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

struct ActiveRecording {
    process: Box<dyn CaptureProcess>,
    output_path: PathBuf,
}

/// Supervises at most one live capture subprocess at a time.
pub struct Supervisor {
    spawner: Arc<dyn CaptureSpawner>,
    stop_timeout: Duration,
    session: Mutex<Option<ActiveRecording>>,
}

impl Supervisor {
    pub fn new(spawner: Arc<dyn CaptureSpawner>, stop_timeout: Duration) -> Self {
        Self {
            spawner,
            stop_timeout,
            session: Mutex::new(None),
        }
    }

    /// Launch a recording targeting `output_path`, stopping any recording
    /// that is already active first.
    ///
    /// Success means the subprocess was launched; the capture tool writes the
    /// output file lazily, so materialization is not checked here.
    pub async fn start(&self, output_path: &Path) -> Result<()> {
        let mut session = self.session.lock().await;

        if let Some(previous) = session.take() {
            info!(
                previous = %previous.output_path.display(),
                "replacing active recording"
            );
            shut_down(previous, self.stop_timeout).await;
        }

        let process = self
            .spawner
            .spawn(output_path)
            .await
            .context("failed to start recording")?;

        info!(output = %output_path.display(), "recording started");
        *session = Some(ActiveRecording {
            process,
            output_path: output_path.to_path_buf(),
        });

        Ok(())
    }

    /// Stop the active recording, if any. Returns false when idle; calling
    /// stop with nothing running is a no-op, not an error.
    pub async fn stop(&self) -> bool {
        let mut session = self.session.lock().await;

        match session.take() {
            Some(active) => {
                info!(output = %active.output_path.display(), "stopping recording");
                shut_down(active, self.stop_timeout).await;
                true
            }
            None => {
                debug!("stop requested with no active recording");
                false
            }
        }
    }

    pub async fn is_recording(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Output path of the active recording, if one is running.
    pub async fn output_path(&self) -> Option<PathBuf> {
        let session = self.session.lock().await;
        session.as_ref().map(|active| active.output_path.clone())
    }
}

/// Two-phase shutdown: graceful signal, bounded wait, forced kill. A timeout
/// here is recovered locally and never surfaced to the caller.
async fn shut_down(mut active: ActiveRecording, stop_timeout: Duration) {
    if let Err(err) = active.process.terminate().await {
        warn!(error = %err, "graceful terminate failed");
    }

    match tokio::time::timeout(stop_timeout, active.process.wait()).await {
        Ok(Ok(())) => debug!("capture process exited"),
        Ok(Err(err)) => warn!(error = %err, "wait for capture process failed"),
        Err(_) => {
            warn!(
                timeout_secs = stop_timeout.as_secs(),
                "capture process did not exit in time, force killing"
            );
            if let Err(err) = active.process.force_kill().await {
                warn!(error = %err, "force kill failed");
            }
        }
    }
}
