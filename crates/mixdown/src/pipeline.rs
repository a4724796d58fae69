//! End-to-end assembly pipeline.
//!
//! Fetch (concurrent) → per-question concatenation → final assembly. Scratch
//! storage is an exclusive per-run temp directory, removed on drop on both
//! success and failure paths.

use std::time::Duration;

use std::path::PathBuf;

use tempfile::TempDir;
use tracing::{debug, info};

use crate::concat::{concatenate_answers, normalize_clip};
use crate::error::{MixdownError, Result};
use crate::fetch::{FallbackDurations, FetchedPayload, SegmentFetcher};
use crate::ffmpeg::Ffmpeg;
use crate::mix::assemble;
use crate::segment::{global_background, ProcessedKind, ProcessedSegment, SegmentDescriptor};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct AssemblyConfig {
    /// ffmpeg binary path.
    pub ffmpeg_path: String,
    /// Per-invocation codec timeout.
    pub codec_timeout: Duration,
    /// Silence fallback durations for missing system assets.
    pub fallbacks: FallbackDurations,
    /// Loudness-normalize answer clips before concatenation.
    pub normalize_answers: bool,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            codec_timeout: crate::ffmpeg::DEFAULT_TIMEOUT,
            fallbacks: FallbackDurations::default(),
            normalize_answers: false,
        }
    }
}

/// A finished program, pinned to its scratch directory.
///
/// Dropping this value removes the scratch directory and the file with it;
/// read the bytes before letting go.
#[derive(Debug)]
pub struct AssembledProgram {
    /// Path of the rendered MP3 inside the scratch directory.
    pub path: PathBuf,
    /// Number of source clips that went into the program.
    pub file_count: usize,
    scratch: TempDir,
}

impl AssembledProgram {
    /// Wrap a rendered program rooted in `scratch`.
    pub fn new(scratch: TempDir, path: PathBuf, file_count: usize) -> Self {
        Self {
            path,
            file_count,
            scratch,
        }
    }

    /// The scratch directory holding the program file.
    pub fn scratch_path(&self) -> &std::path::Path {
        self.scratch.path()
    }
}

/// Drives one segment list to a rendered program file.
#[derive(Debug, Clone)]
pub struct AssemblyPipeline {
    ffmpeg: Ffmpeg,
    fetcher: SegmentFetcher,
    normalize_answers: bool,
}

impl AssemblyPipeline {
    pub fn new(config: &AssemblyConfig, client: reqwest::Client) -> Self {
        Self {
            ffmpeg: Ffmpeg::with_path(config.ffmpeg_path.clone())
                .with_timeout(config.codec_timeout),
            fetcher: SegmentFetcher::new(client, config.fallbacks.clone()),
            normalize_answers: config.normalize_answers,
        }
    }

    /// Assemble one program.
    ///
    /// Segment fetches run concurrently; reassembly uses the original input
    /// index, never completion order.
    pub async fn run(
        &self,
        segments: &[SegmentDescriptor],
        output_name: &str,
    ) -> Result<AssembledProgram> {
        if segments.is_empty() {
            return Err(MixdownError::NothingToAssemble);
        }

        let scratch = tempfile::tempdir()?;
        let dir = scratch.path();
        debug!(segments = segments.len(), scratch = %dir.display(), "assembly started");

        let fetched = futures::future::try_join_all(
            segments
                .iter()
                .enumerate()
                .map(|(index, segment)| self.fetcher.fetch_segment(segment, index, dir)),
        )
        .await?;

        let mut processed = Vec::new();
        let mut file_count = 0usize;
        for item in fetched.into_iter().flatten() {
            match item.payload {
                FetchedPayload::Clip(path) => {
                    file_count += 1;
                    processed.push(ProcessedSegment {
                        local_path: path,
                        kind: ProcessedKind::Single,
                        original_index: item.original_index,
                    });
                }
                FetchedPayload::Answers(paths) => {
                    file_count += paths.len();
                    let inputs = if self.normalize_answers {
                        let mut normalized = Vec::with_capacity(paths.len());
                        for (i, path) in paths.iter().enumerate() {
                            let out = dir.join(format!(
                                "segment_{:03}_norm_{i:02}.wav",
                                item.original_index
                            ));
                            normalized.push(normalize_clip(&self.ffmpeg, path, &out).await);
                        }
                        normalized
                    } else {
                        paths
                    };
                    let joined = dir.join(format!("question_{:03}.wav", item.original_index));
                    concatenate_answers(&self.ffmpeg, &inputs, &joined).await?;
                    processed.push(ProcessedSegment {
                        local_path: joined,
                        kind: ProcessedKind::Answers,
                        original_index: item.original_index,
                    });
                }
            }
        }

        let background = match global_background(segments) {
            Some(url) => Some(self.fetcher.fetch_background(url, dir).await?),
            None => None,
        };

        let output = dir.join(output_name);
        assemble(&self.ffmpeg, processed, background.as_deref(), &output).await?;

        info!(
            output = %output.display(),
            file_count,
            "assembly finished"
        );

        Ok(AssembledProgram {
            path: output,
            file_count,
            scratch,
        })
    }
}
