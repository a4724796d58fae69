//! Engine-wide error types.

use thiserror::Error;

/// Engine-wide result type.
pub type Result<T> = std::result::Result<T, MixdownError>;

/// Errors produced while assembling a program.
#[derive(Error, Debug)]
pub enum MixdownError {
    #[error("ffmpeg exited with code {code:?}: {stderr}")]
    CommandFailed { code: Option<i32>, stderr: String },

    #[error("command timed out after {timeout_secs}s: {command}")]
    CommandTimeout { command: String, timeout_secs: u64 },

    #[error("failed to download recording {url}: {reason}")]
    MissingRecording { url: String, reason: String },

    #[error("nothing to assemble: no segment produced an audio file")]
    NothingToAssemble,

    #[error("invalid segment list: {0}")]
    InvalidSegments(String),

    #[error("WAV synthesis error: {0}")]
    Wav(#[from] hound::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MixdownError {
    /// A user recording could not be fetched; always fatal for the job.
    pub fn missing_recording(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MissingRecording {
            url: url.into(),
            reason: reason.into(),
        }
    }
}
