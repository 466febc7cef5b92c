//! Analysis constants and per-operation parameter sets.

use crate::error::{Result, SliceError};

// Embedding pipeline constants
pub const EMBED_SAMPLE_RATE: u32 = 16000;
pub const MIN_EMBED_MS: f64 = 600.0;
pub const MIN_REFERENCE_MS: f64 = 500.0;

// Loudness analysis
pub const LOUDNESS_FRAME_MS: f64 = 10.0;

// Segment editing minimums
pub const MANUAL_ADD_MIN_MS: f64 = 10.0;
pub const DRAG_SELECT_MIN_MS: f64 = 100.0;

// Clustering
pub const KMEANS_MAX_ITERS: usize = 20;
pub const KMEANS_DEFAULT_SEED: u64 = 7;

/// Parameters for silence-based candidate detection.
///
/// The loudness threshold is relative to the track's mean loudness, not an
/// absolute dBFS value, because source recordings vary widely in gain.
#[derive(Debug, Clone)]
pub struct SilenceParams {
    /// How long loudness must stay below the threshold to count as a gap.
    pub min_silence_ms: f64,
    /// Offset from the track's mean dBFS; typically negative.
    pub threshold_offset_db: f64,
    /// Padding applied to both ends of each candidate segment.
    pub padding_ms: f64,
    /// Candidates shorter than this after padding are discarded.
    pub min_segment_ms: f64,
}

impl Default for SilenceParams {
    fn default() -> Self {
        Self {
            min_silence_ms: 500.0,
            threshold_offset_db: -16.0,
            padding_ms: 200.0,
            min_segment_ms: 500.0,
        }
    }
}

/// Parameters for voice-change splitting.
#[derive(Debug, Clone)]
pub struct SplitParams {
    /// Embedding window length in seconds.
    pub window_s: f64,
    /// Step between window starts in seconds. Must not exceed `window_s`.
    pub hop_s: f64,
    /// Adjacent windows below this cosine similarity mark a speaker change.
    pub similarity_threshold: f32,
    /// Minimum length of a resulting sub-segment in seconds.
    pub min_segment_s: f64,
}

impl Default for SplitParams {
    fn default() -> Self {
        Self {
            window_s: 1.5,
            hop_s: 0.5,
            similarity_threshold: 0.75,
            min_segment_s: 1.0,
        }
    }
}

impl SplitParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.window_s > 0.0) || !(self.hop_s > 0.0) {
            return Err(SliceError::InvalidParameter(format!(
                "window and hop must be positive, got window={} hop={}",
                self.window_s, self.hop_s
            )));
        }
        if self.hop_s > self.window_s {
            return Err(SliceError::InvalidParameter(format!(
                "hop ({}s) must not exceed window ({}s)",
                self.hop_s, self.window_s
            )));
        }
        if self.min_segment_s < 0.0 {
            return Err(SliceError::InvalidParameter(format!(
                "min_segment_s must be non-negative, got {}",
                self.min_segment_s
            )));
        }
        Ok(())
    }
}
