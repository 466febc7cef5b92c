use thiserror::Error;

/// Errors returned by slicing and voice-analysis operations.
#[derive(Debug, Error)]
pub enum SliceError {
    #[error("invalid segment range {start_ms:.1}..{end_ms:.1} ms: {reason}")]
    InvalidRange {
        start_ms: f64,
        end_ms: f64,
        reason: String,
    },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("reference audio too short: need at least {min_ms:.0} ms, got {got_ms:.1} ms")]
    InsufficientReference { min_ms: f64, got_ms: f64 },

    #[error("no segment is long enough to compute a voice embedding")]
    InsufficientData,

    #[error("embedding backend unavailable: {0}")]
    DependencyUnavailable(String),
}

pub type Result<T> = std::result::Result<T, SliceError>;
