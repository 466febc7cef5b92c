// Embedding Module
//
// Split into focused files:
// - cache.rs: session-owned embedding cache
// - extractor.rs: segment → embedding pipeline

pub mod cache;
pub mod extractor;

pub use cache::EmbeddingCache;
pub use extractor::SegmentEmbedder;

/// Source of speaker embeddings; an injected black box wrapping whatever
/// neural encoder the application ships.
///
/// Implementations must perform their capability check (model file present,
/// runtime loadable) in their constructor and fail there with
/// [`crate::SliceError::DependencyUnavailable`] rather than deferring the
/// failure to the first `embed` call.
pub trait EmbeddingProvider: Send + Sync {
    /// Sample rate the encoder expects its input at.
    fn sample_rate(&self) -> u32;

    /// Compute one fixed-length embedding for a mono slice at `sample_rate()`.
    fn embed(&self, samples: &[f32]) -> anyhow::Result<Vec<f32>>;
}

/// Cosine similarity between two embeddings.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Scale a vector to unit L2 norm. Zero vectors are left unchanged.
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
