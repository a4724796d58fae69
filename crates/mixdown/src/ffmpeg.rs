//! Narrow wrapper around the ffmpeg binary.
//!
//! All codec work in the pipeline goes through [`Ffmpeg::run`]: one blocking
//! invocation with an explicit timeout, force-killed on expiry, stderr folded
//! into the error. Argument lists are built by the stage modules.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::error::{MixdownError, Result};

/// Default per-invocation timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Maximum stderr bytes kept in a [`MixdownError::CommandFailed`].
const STDERR_TAIL_BYTES: usize = 1024;

#[derive(Debug, Clone)]
pub struct Ffmpeg {
    path: String,
    timeout: Duration,
}

impl Ffmpeg {
    /// Binary path from `FFMPEG_PATH`, falling back to `ffmpeg` on `$PATH`.
    pub fn new() -> Self {
        Self::with_path(std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()))
    }

    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run one ffmpeg invocation to completion.
    ///
    /// The subprocess is killed if it outlives the configured timeout; a
    /// non-zero exit status carries the stderr tail in the error.
    pub async fn run(&self, args: &[String]) -> Result<()> {
        debug!(binary = %self.path, ?args, "running ffmpeg");

        let mut command = Command::new(&self.path);
        command
            .args(args)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn()?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                if output.status.success() {
                    Ok(())
                } else {
                    Err(MixdownError::CommandFailed {
                        code: output.status.code(),
                        stderr: stderr_tail(&output.stderr),
                    })
                }
            }
            // Dropping the wait future reaps the child via kill_on_drop.
            Err(_) => Err(MixdownError::CommandTimeout {
                command: format!("{} {}", self.path, args.join(" ")),
                timeout_secs: self.timeout.as_secs(),
            }),
        }
    }
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::new()
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    if trimmed.len() <= STDERR_TAIL_BYTES {
        return trimmed.to_string();
    }
    let start = trimmed
        .char_indices()
        .rev()
        .take_while(|(i, _)| trimmed.len() - i <= STDERR_TAIL_BYTES)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(0);
    trimmed[start..].to_string()
}
