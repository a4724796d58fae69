//! # Mixdown
//!
//! Audio assembly engine for radio program generation.
//!
//! A program is described as an ordered list of [`SegmentDescriptor`]s:
//! pre-rendered clips, synthesized silence gaps, and blocks of user-recorded
//! answers with an optional background track. The [`AssemblyPipeline`]
//! resolves every segment to a local audio file (downloading or synthesizing),
//! concatenates them strictly in input order and renders one MP3, mixing a
//! single global background track under the whole program.
//!
//! The crate knows nothing about job queues, databases or HTTP servers; it
//! turns segment lists into audio files and nothing else.

pub mod concat;
pub mod error;
pub mod fetch;
pub mod ffmpeg;
pub mod mix;
pub mod pipeline;
pub mod segment;
pub mod silence;

pub use error::{MixdownError, Result};
pub use fetch::{AssetRole, FallbackDurations, SegmentFetcher};
pub use ffmpeg::Ffmpeg;
pub use pipeline::{AssembledProgram, AssemblyConfig, AssemblyPipeline};
pub use segment::{ProcessedKind, ProcessedSegment, SegmentDescriptor};
