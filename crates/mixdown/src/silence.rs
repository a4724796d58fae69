//! Silence synthesis.
//!
//! Replaces missing system assets and renders the explicit silence-like
//! segment kinds. Pure function of the requested duration: no network, no
//! codec subprocess, fixed output format.

use std::path::Path;

use crate::error::Result;

/// Output sample rate shared by every synthesized clip.
pub const SAMPLE_RATE: u32 = 44_100;

/// Synthesized clips are stereo to match the final program format.
pub const CHANNELS: u16 = 2;

/// Requested durations below this are stretched up; zero-length inputs break
/// the concat filter downstream.
pub const MIN_DURATION_SECS: f64 = 1.0;

/// Write `duration_secs` of 16-bit stereo 44.1 kHz silence to `path` as WAV.
pub fn write_silence_wav(path: &Path, duration_secs: f64) -> Result<()> {
    let duration = if duration_secs.is_finite() {
        duration_secs.max(MIN_DURATION_SECS)
    } else {
        MIN_DURATION_SECS
    };

    let spec = hound::WavSpec {
        channels: CHANNELS,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    let frames = (duration * f64::from(SAMPLE_RATE)).round() as u32;
    for _ in 0..frames {
        for _ in 0..CHANNELS {
            writer.write_sample(0i16)?;
        }
    }
    writer.finalize()?;
    Ok(())
}
