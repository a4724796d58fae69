//! Program segment model.
//!
//! A program is an ordered list of segments; the list order defines final
//! playback order and must survive every transformation stage.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One building block of a radio program.
///
/// Closed union over the finite segment kinds; adding a kind is a compile-time
/// event for every match site. Unknown `type` tags are rejected at parse time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum SegmentDescriptor {
    /// Pre-rendered clip: intro/outro, question prompt or a single recording.
    Single { url: String },
    /// Synthesized lead-in silence.
    Intro { duration: f64 },
    /// Synthesized pause between program blocks.
    Pause { duration: f64 },
    /// Synthesized transition gap.
    Transition { duration: f64 },
    /// Explicit silence of a given length.
    Silence { duration: f64 },
    /// Ordered spoken answers for one question. The background track is not
    /// mixed here; it is deferred to the single global mix.
    CombineWithBackground {
        answer_urls: Vec<String>,
        background_url: String,
        question_id: String,
    },
}

impl SegmentDescriptor {
    /// Duration for silence-like segments; `None` for anything that fetches.
    pub fn silence_duration(&self) -> Option<f64> {
        match self {
            Self::Intro { duration }
            | Self::Pause { duration }
            | Self::Transition { duration }
            | Self::Silence { duration } => Some(*duration),
            Self::Single { .. } | Self::CombineWithBackground { .. } => None,
        }
    }
}

/// The single global background reference for a job.
///
/// At most one background is applied per program: the first non-empty
/// `background_url` in segment order wins and is mixed once under the entire
/// final program, never per question.
pub fn global_background(segments: &[SegmentDescriptor]) -> Option<&str> {
    segments.iter().find_map(|segment| match segment {
        SegmentDescriptor::CombineWithBackground { background_url, .. }
            if !background_url.is_empty() =>
        {
            Some(background_url.as_str())
        }
        _ => None,
    })
}

/// What a processed segment originally was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessedKind {
    /// A single clip (pre-rendered or synthesized).
    Single,
    /// The concatenated answers of one question block.
    Answers,
}

/// A segment resolved to a local audio file.
///
/// `original_index` maps 1:1, monotonically, to the input segment order.
/// Reassembly sorts by this index; completion order of concurrent fetches is
/// never meaningful.
#[derive(Debug, Clone)]
pub struct ProcessedSegment {
    pub local_path: PathBuf,
    pub kind: ProcessedKind,
    pub original_index: usize,
}
