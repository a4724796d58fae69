//! Segment resolution: download or synthesize.
//!
//! Every descriptor resolves to local audio. Silence-like kinds never touch
//! the network. Downloads of recognized system assets degrade to synthesized
//! silence when the asset is missing; user recordings are load-bearing and a
//! failed download is fatal for the whole job.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{MixdownError, Result};
use crate::segment::SegmentDescriptor;
use crate::silence::write_silence_wav;

/// Role of a static system asset, used to pick a silence fallback duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetRole {
    /// Looped background music bed.
    Background,
    /// Question prompt clip.
    Prompt,
    /// Intro/outro and other short static clips.
    Other,
}

/// Silence fallback durations keyed by asset role.
///
/// Defaults preserve the production baseline: ~30s for loopable backgrounds,
/// ~5s for prompts, ~3s for everything else.
#[derive(Debug, Clone)]
pub struct FallbackDurations {
    pub background_secs: f64,
    pub prompt_secs: f64,
    pub other_secs: f64,
}

impl Default for FallbackDurations {
    fn default() -> Self {
        Self {
            background_secs: 30.0,
            prompt_secs: 5.0,
            other_secs: 3.0,
        }
    }
}

impl FallbackDurations {
    pub fn for_role(&self, role: AssetRole) -> f64 {
        match role {
            AssetRole::Background => self.background_secs,
            AssetRole::Prompt => self.prompt_secs,
            AssetRole::Other => self.other_secs,
        }
    }
}

/// Classify a URL as a static system asset.
///
/// System assets live under the static `/audio/` library path; anything else
/// is a user recording. Within the library, background beds and question
/// prompts are recognized by their filename conventions.
pub fn classify_system_asset(url: &str) -> Option<AssetRole> {
    let lower = url.to_ascii_lowercase();
    if !lower.contains("/audio/") {
        return None;
    }
    if lower.contains("background") || lower.contains("monkeys") {
        Some(AssetRole::Background)
    } else if lower.contains("-qid") || lower.contains("question") {
        Some(AssetRole::Prompt)
    } else {
        Some(AssetRole::Other)
    }
}

/// Payload of one resolved segment.
#[derive(Debug, Clone)]
pub enum FetchedPayload {
    /// A single local clip.
    Clip(PathBuf),
    /// The ordered answer clips of one question, not yet concatenated.
    Answers(Vec<PathBuf>),
}

/// One resolved segment, tagged with its input position.
#[derive(Debug, Clone)]
pub struct FetchedSegment {
    pub original_index: usize,
    pub payload: FetchedPayload,
}

/// Resolves segment descriptors into local audio files.
#[derive(Debug, Clone)]
pub struct SegmentFetcher {
    client: reqwest::Client,
    fallbacks: FallbackDurations,
}

impl SegmentFetcher {
    pub fn new(client: reqwest::Client, fallbacks: FallbackDurations) -> Self {
        Self { client, fallbacks }
    }

    /// Resolve one descriptor. Safe to run concurrently for the segments of a
    /// job: each index writes distinct files under `dir`.
    ///
    /// Returns `None` for segments that resolve to nothing (a question block
    /// with no answers).
    pub async fn fetch_segment(
        &self,
        segment: &SegmentDescriptor,
        index: usize,
        dir: &Path,
    ) -> Result<Option<FetchedSegment>> {
        let payload = match segment {
            SegmentDescriptor::Single { url } => {
                let dest = dir.join(format!("segment_{index:03}{}", url_extension(url)));
                let path = self.fetch_clip(url, &dest).await?;
                FetchedPayload::Clip(path)
            }
            SegmentDescriptor::Intro { .. }
            | SegmentDescriptor::Pause { .. }
            | SegmentDescriptor::Transition { .. }
            | SegmentDescriptor::Silence { .. } => {
                // silence_duration is Some for every kind in this arm
                let duration = segment.silence_duration().unwrap_or(1.0);
                let dest = dir.join(format!("segment_{index:03}.wav"));
                write_silence_wav(&dest, duration)?;
                FetchedPayload::Clip(dest)
            }
            SegmentDescriptor::CombineWithBackground {
                answer_urls,
                question_id,
                ..
            } => {
                if answer_urls.is_empty() {
                    warn!(question_id, "question block has no answers, skipping");
                    return Ok(None);
                }
                let mut paths = Vec::with_capacity(answer_urls.len());
                for (answer_index, url) in answer_urls.iter().enumerate() {
                    let dest = dir.join(format!(
                        "segment_{index:03}_answer_{answer_index:02}{}",
                        url_extension(url)
                    ));
                    paths.push(self.fetch_recording(url, &dest).await?);
                }
                FetchedPayload::Answers(paths)
            }
        };

        Ok(Some(FetchedSegment {
            original_index: index,
            payload,
        }))
    }

    /// Fetch the global background track. A missing background never fails the
    /// job: it degrades to a silence bed of the configured background length.
    pub async fn fetch_background(&self, url: &str, dir: &Path) -> Result<PathBuf> {
        let dest = dir.join(format!("background{}", url_extension(url)));
        match self.download(url, &dest).await {
            Ok(()) => Ok(dest),
            Err(error) => {
                warn!(url, %error, "background download failed, substituting silence");
                let silent = dir.join("background.wav");
                write_silence_wav(&silent, self.fallbacks.background_secs)?;
                Ok(silent)
            }
        }
    }

    /// Fetch a `single` clip. System assets degrade to silence; anything else
    /// is treated as a user recording and failure is fatal.
    async fn fetch_clip(&self, url: &str, dest: &Path) -> Result<PathBuf> {
        match self.download(url, dest).await {
            Ok(()) => Ok(dest.to_path_buf()),
            Err(error) => match classify_system_asset(url) {
                Some(role) => {
                    let duration = self.fallbacks.for_role(role);
                    warn!(
                        url,
                        %error,
                        duration_secs = duration,
                        "system asset unavailable, substituting silence"
                    );
                    let silent = dest.with_extension("wav");
                    write_silence_wav(&silent, duration)?;
                    Ok(silent)
                }
                None => Err(error),
            },
        }
    }

    /// Fetch a user recording; no fallback.
    async fn fetch_recording(&self, url: &str, dest: &Path) -> Result<PathBuf> {
        self.download(url, dest).await?;
        Ok(dest.to_path_buf())
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MixdownError::missing_recording(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MixdownError::missing_recording(
                url,
                format!("status {status}"),
            ));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| MixdownError::missing_recording(url, e.to_string()))?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        debug!(url, dest = %dest.display(), "downloaded segment");
        Ok(())
    }
}

/// File extension from a URL path, defaulting to `.mp3`.
fn url_extension(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    match path.rsplit('/').next().and_then(|name| {
        let (_, ext) = name.rsplit_once('.')?;
        (!ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .then(|| format!(".{}", ext.to_ascii_lowercase()))
    }) {
        Some(ext) => ext,
        None => ".mp3".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_system_assets_by_library_path() {
        assert_eq!(
            classify_system_asset("https://cdn.example.com/audio/spookyland/other/monkeys.mp3"),
            Some(AssetRole::Background)
        );
        assert_eq!(
            classify_system_asset("https://cdn.example.com/audio/spookyland/question-QID4.mp3"),
            Some(AssetRole::Prompt)
        );
        assert_eq!(
            classify_system_asset("https://cdn.example.com/audio/other/intro.mp3"),
            Some(AssetRole::Other)
        );
        // User recordings live outside the static library.
        assert_eq!(
            classify_system_asset("https://cdn.example.com/en/32/spookyland/answer-17.webm"),
            None
        );
    }

    #[test]
    fn fallback_durations_default_to_baseline() {
        let fallbacks = FallbackDurations::default();
        assert_eq!(fallbacks.for_role(AssetRole::Background), 30.0);
        assert_eq!(fallbacks.for_role(AssetRole::Prompt), 5.0);
        assert_eq!(fallbacks.for_role(AssetRole::Other), 3.0);
    }

    #[test]
    fn url_extension_handles_queries_and_defaults() {
        assert_eq!(url_extension("https://x.test/a/clip.webm?token=1"), ".webm");
        assert_eq!(url_extension("https://x.test/a/clip.MP3"), ".mp3");
        assert_eq!(url_extension("https://x.test/a/clip"), ".mp3");
    }

    #[tokio::test]
    async fn silence_like_segments_never_hit_the_network() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = SegmentFetcher::new(reqwest::Client::new(), FallbackDurations::default());

        let fetched = fetcher
            .fetch_segment(&SegmentDescriptor::Pause { duration: 2.0 }, 4, dir.path())
            .await
            .unwrap()
            .expect("pause resolves to a clip");

        assert_eq!(fetched.original_index, 4);
        match fetched.payload {
            FetchedPayload::Clip(path) => {
                let reader = hound::WavReader::open(path).unwrap();
                assert_eq!(reader.spec().sample_rate, crate::silence::SAMPLE_RATE);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    // Port 1 refuses connections, standing in for an unreachable CDN.
    const DEAD_HOST: &str = "http://127.0.0.1:1";

    #[tokio::test]
    async fn unreachable_system_asset_degrades_to_silence() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = SegmentFetcher::new(reqwest::Client::new(), FallbackDurations::default());

        let url = format!("{DEAD_HOST}/audio/spookyland/question-QID4.mp3");
        let fetched = fetcher
            .fetch_segment(&SegmentDescriptor::Single { url }, 1, dir.path())
            .await
            .unwrap()
            .expect("prompt resolves to a silence substitute");

        match fetched.payload {
            FetchedPayload::Clip(path) => {
                let reader = hound::WavReader::open(&path).unwrap();
                // Prompt fallback length, at the synthesized sample rate.
                let expected = (5.0 * f64::from(crate::silence::SAMPLE_RATE)).round() as u32
                    * u32::from(crate::silence::CHANNELS);
                assert_eq!(reader.len(), expected);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_user_recording_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = SegmentFetcher::new(reqwest::Client::new(), FallbackDurations::default());

        let url = format!("{DEAD_HOST}/en/32/spookyland/answer-1.webm");
        let result = fetcher
            .fetch_segment(
                &SegmentDescriptor::CombineWithBackground {
                    answer_urls: vec![url.clone()],
                    background_url: String::new(),
                    question_id: "QID1".into(),
                },
                0,
                dir.path(),
            )
            .await;

        match result {
            Err(MixdownError::MissingRecording { url: failed, .. }) => {
                assert_eq!(failed, url);
            }
            other => panic!("expected fatal missing recording, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_background_degrades_to_silence_bed() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = SegmentFetcher::new(reqwest::Client::new(), FallbackDurations::default());

        let bed = fetcher
            .fetch_background(&format!("{DEAD_HOST}/audio/bg.mp3"), dir.path())
            .await
            .unwrap();
        assert_eq!(bed.extension().and_then(|e| e.to_str()), Some("wav"));
        assert!(bed.exists());
    }

    #[tokio::test]
    async fn empty_answer_block_is_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = SegmentFetcher::new(reqwest::Client::new(), FallbackDurations::default());

        let fetched = fetcher
            .fetch_segment(
                &SegmentDescriptor::CombineWithBackground {
                    answer_urls: vec![],
                    background_url: "https://cdn.example.com/audio/bg.mp3".into(),
                    question_id: "QID1".into(),
                },
                0,
                dir.path(),
            )
            .await
            .unwrap();

        assert!(fetched.is_none());
    }
}
