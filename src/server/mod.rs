//! Unix socket listener and per-connection request loop
//!
//! The listener accepts connections until the shutdown signal flips, handing
//! each one to its own task. A slow or broken client only ever affects its
//! own connection.

use anyhow::{Context, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::protocol::{Request, Response};
use crate::supervisor::Supervisor;

/// Bounded read buffer per message; the protocol has no length framing.
const MAX_REQUEST_BYTES: usize = 4096;

pub struct Server {
    socket_path: PathBuf,
    supervisor: Arc<Supervisor>,
}

impl Server {
    pub fn new(socket_path: PathBuf, supervisor: Arc<Supervisor>) -> Self {
        Self {
            socket_path,
            supervisor,
        }
    }

    /// Bind the control socket and serve until `shutdown` flips to true.
    ///
    /// Bind failures are fatal: the daemon must not run without its endpoint.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        if self.socket_path.exists() {
            fs::remove_file(&self.socket_path).with_context(|| {
                format!("failed to remove stale socket {}", self.socket_path.display())
            })?;
        }

        let listener = UnixListener::bind(&self.socket_path)
            .with_context(|| format!("failed to bind {}", self.socket_path.display()))?;

        // Any local user session may drive the recorder.
        fs::set_permissions(&self.socket_path, fs::Permissions::from_mode(0o666))
            .context("failed to set socket permissions")?;

        info!(socket = %self.socket_path.display(), "listening for commands");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                accept = listener.accept() => {
                    match accept {
                        Ok((stream, _addr)) => {
                            let supervisor = Arc::clone(&self.supervisor);
                            tokio::spawn(async move {
                                handle_connection(stream, supervisor).await;
                            });
                        }
                        Err(err) => {
                            warn!(error = %err, "accept failed");
                        }
                    }
                }
            }
        }

        drop(listener);
        if let Err(err) = fs::remove_file(&self.socket_path) {
            warn!(error = %err, "failed to remove socket on shutdown");
        }

        // Don't orphan an in-flight capture process across daemon shutdown.
        if self.supervisor.stop().await {
            info!("stopped active recording during shutdown");
        }

        info!("listener stopped");
        Ok(())
    }
}

/// Read-decode-dispatch-respond loop for one client connection.
///
/// Malformed payloads answer with an error response and keep the connection
/// open; only a peer disconnect or an I/O error ends the loop.
async fn handle_connection(mut stream: UnixStream, supervisor: Arc<Supervisor>) {
    let mut buf = vec![0u8; MAX_REQUEST_BYTES];

    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) => break, // peer closed
            Ok(n) => n,
            Err(err) => {
                debug!(error = %err, "connection read failed");
                break;
            }
        };

        let response = dispatch(&buf[..n], &supervisor).await;

        let payload = match response.encode() {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(error = %err, "response encode failed");
                break;
            }
        };

        if let Err(err) = stream.write_all(&payload).await {
            debug!(error = %err, "connection write failed");
            break;
        }
    }
}

async fn dispatch(payload: &[u8], supervisor: &Supervisor) -> Response {
    match Request::decode(payload) {
        Ok(Request::Start { output_path }) => {
            match supervisor.start(Path::new(&output_path)).await {
                Ok(()) => Response::success(),
                Err(err) => {
                    let message = format!("{err:#}");
                    warn!(error = %message, "start failed");
                    Response::error(message)
                }
            }
        }
        Ok(Request::Stop) => {
            if supervisor.stop().await {
                Response::success()
            } else {
                Response::error("no active recording")
            }
        }
        Err(err) => {
            debug!(error = %err, "request decode failed");
            Response::error(err.to_string())
        }
    }
}
