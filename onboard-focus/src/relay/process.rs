//! Relay child processes.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use process_utils::{ProcessExit, ProcessWaiter, spawn_process_waiter, tokio_command};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use super::command::{FfmpegRelayConfig, RelayTarget};
use crate::{Error, Result};

/// Default time allowed for a killed relay to be reaped.
pub const DEFAULT_TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

/// A running relay. Dropping it must stop the underlying process.
#[async_trait]
pub trait RelayChild: Send {
    /// The target this relay was launched with.
    fn target(&self) -> &RelayTarget;

    /// Non-blocking liveness check.
    fn has_exited(&mut self) -> bool;

    /// Stop the relay and wait for it to be reaped.
    async fn terminate(&mut self) -> Result<()>;
}

/// Starts relay processes.
#[async_trait]
pub trait RelayLauncher: Send + Sync {
    async fn launch(&self, target: &RelayTarget) -> Result<Box<dyn RelayChild>>;
}

/// Launches ffmpeg relays.
pub struct FfmpegLauncher {
    config: FfmpegRelayConfig,
    terminate_timeout: Duration,
}

impl FfmpegLauncher {
    pub fn new(config: FfmpegRelayConfig) -> Self {
        Self {
            config,
            terminate_timeout: DEFAULT_TERMINATE_TIMEOUT,
        }
    }

    pub fn with_terminate_timeout(mut self, timeout: Duration) -> Self {
        self.terminate_timeout = timeout;
        self
    }

    pub fn config(&self) -> &FfmpegRelayConfig {
        &self.config
    }

    /// First line of `ffmpeg -version`, if the binary runs.
    pub async fn detect_version(&self) -> Option<String> {
        let output = tokio_command(&self.config.binary_path)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .ok()?;

        String::from_utf8(output.stdout)
            .ok()
            .and_then(|s| s.lines().next().map(|l| l.to_string()))
    }
}

#[async_trait]
impl RelayLauncher for FfmpegLauncher {
    async fn launch(&self, target: &RelayTarget) -> Result<Box<dyn RelayChild>> {
        let args = self.config.build_args(target);

        info!(target = %target, "Starting ffmpeg relay with args: {:?}", args);

        let mut child = tokio_command(&self.config.binary_path)
            .args(&args)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn {
                program: self.config.binary_path.clone(),
                source,
            })?;

        if let Some(stderr) = child.stderr.take() {
            let target = target.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => {
                            if line.contains("Error") || line.contains("error") {
                                warn!(target = %target, "ffmpeg: {}", line);
                            } else {
                                debug!(target = %target, "ffmpeg: {}", line);
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            debug!(target = %target, "Stopped reading ffmpeg output: {}", e);
                            break;
                        }
                    }
                }
            });
        }

        let waiter = spawn_process_waiter(child);
        debug!(target = %target, pid = ?waiter.id(), "ffmpeg relay spawned");

        Ok(Box::new(FfmpegRelay {
            target: target.clone(),
            waiter,
            terminate_timeout: self.terminate_timeout,
            reported_exit: false,
        }))
    }
}

/// A running ffmpeg relay. The process is killed when this is dropped.
pub struct FfmpegRelay {
    target: RelayTarget,
    waiter: ProcessWaiter,
    terminate_timeout: Duration,
    reported_exit: bool,
}

impl FfmpegRelay {
    pub fn pid(&self) -> Option<u32> {
        self.waiter.id()
    }

    pub fn exit(&mut self) -> Option<ProcessExit> {
        self.waiter.try_exit()
    }
}

#[async_trait]
impl RelayChild for FfmpegRelay {
    fn target(&self) -> &RelayTarget {
        &self.target
    }

    fn has_exited(&mut self) -> bool {
        match self.waiter.try_exit() {
            Some(exit) => {
                if !self.reported_exit {
                    self.reported_exit = true;
                    warn!(target = %self.target, "ffmpeg relay {}", exit);
                }
                true
            }
            None => false,
        }
    }

    async fn terminate(&mut self) -> Result<()> {
        match self.waiter.terminate(self.terminate_timeout).await {
            Some(exit) => {
                debug!(target = %self.target, "ffmpeg relay stopped: {}", exit);
                Ok(())
            }
            None => Err(Error::Timeout(format!(
                "ffmpeg relay for {} was not reaped within {:?}",
                self.target, self.terminate_timeout
            ))),
        }
    }
}
