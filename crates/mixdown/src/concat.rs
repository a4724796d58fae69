//! Ordered concatenation of answer clips.
//!
//! Joins the answers of one question block into a single stream, preserving
//! list order. No background mixing happens here; that is deferred to the
//! single global mix to avoid rendering the bed once per question.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{MixdownError, Result};
use crate::ffmpeg::Ffmpeg;

/// Arguments for an N-input concat into one 44.1 kHz stereo stream.
///
/// The concat filter also normalizes heterogeneous input formats, so answer
/// clips may arrive as webm/mp3/wav in any mix.
pub fn build_concat_args(inputs: &[PathBuf], output: &Path) -> Vec<String> {
    let mut args = base_args();
    for input in inputs {
        args.push("-i".into());
        args.push(input.display().to_string());
    }

    let mut filter = String::new();
    for i in 0..inputs.len() {
        filter.push_str(&format!("[{i}:a]"));
    }
    filter.push_str(&format!("concat=n={}:v=0:a=1[out]", inputs.len()));

    args.extend([
        "-filter_complex".into(),
        filter,
        "-map".into(),
        "[out]".into(),
        "-ar".into(),
        "44100".into(),
        "-ac".into(),
        "2".into(),
        output.display().to_string(),
    ]);
    args
}

/// Arguments for single-pass loudness normalization of one clip.
pub fn build_normalize_args(input: &Path, output: &Path) -> Vec<String> {
    let mut args = base_args();
    args.extend([
        "-i".into(),
        input.display().to_string(),
        "-af".into(),
        "loudnorm=I=-16:TP=-1.5:LRA=11".into(),
        "-ar".into(),
        "44100".into(),
        "-ac".into(),
        "2".into(),
        output.display().to_string(),
    ]);
    args
}

fn base_args() -> Vec<String> {
    vec![
        "-y".into(),
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
    ]
}

/// Concatenate the ordered answer clips of one question into `output`.
pub async fn concatenate_answers(
    ffmpeg: &Ffmpeg,
    inputs: &[PathBuf],
    output: &Path,
) -> Result<PathBuf> {
    if inputs.is_empty() {
        return Err(MixdownError::InvalidSegments(
            "cannot concatenate an empty answer list".into(),
        ));
    }
    ffmpeg.run(&build_concat_args(inputs, output)).await?;
    Ok(output.to_path_buf())
}

/// Loudness-normalize one answer clip.
///
/// Normalization is best-effort: any codec failure or timeout falls back to
/// the unmodified clip instead of failing the job.
pub async fn normalize_clip(ffmpeg: &Ffmpeg, input: &Path, output: &Path) -> PathBuf {
    match ffmpeg.run(&build_normalize_args(input, output)).await {
        Ok(()) => output.to_path_buf(),
        Err(error) => {
            warn!(
                input = %input.display(),
                %error,
                "loudness normalization failed, using original clip"
            );
            input.to_path_buf()
        }
    }
}
