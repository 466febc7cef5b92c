// Voiceslice - Interactive audio segmentation and speaker-similarity engine
//
// The algorithmic core of a voice-dataset slicer: silence-based candidate
// detection, speaker-change splitting, reference-voice filtering, and
// unsupervised voice labeling over one loaded waveform. Audio decoding,
// persistence, and the UI live outside this crate; the neural speaker
// encoder is injected through the EmbeddingProvider trait.

// Core modules
pub mod analysis;
pub mod config;
pub mod embedding;
pub mod error;
pub mod segments;
pub mod session;
pub mod waveform;
pub mod worker;

#[cfg(test)]
pub(crate) mod testutil;

pub use analysis::{ClusterOutcome, FilterMode, FilterOutcome, VoiceReference};
pub use embedding::{cosine_similarity, EmbeddingCache, EmbeddingProvider};
pub use error::{Result, SliceError};
pub use segments::{LabeledSegment, Segment, SegmentSet};
pub use session::SlicerSession;
pub use waveform::WaveformSampleStore;
pub use worker::{spawn as spawn_analysis, AnalysisEvent, AnalysisHandle};
