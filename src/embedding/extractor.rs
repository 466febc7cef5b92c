// Segment → embedding pipeline
//
// Clamps a segment to the waveform, brings the slice to the encoder's
// sample rate, and caches the normalized result. Per-item failures here are
// skip decisions, not errors; the strict variants exist for reference audio
// where a failure has to surface to the caller.

use log::{debug, warn};

use super::{cache::EmbeddingCache, l2_normalize, EmbeddingProvider};
use crate::error::{Result, SliceError};
use crate::waveform::{resample::resample_or_passthrough, WaveformSampleStore};

/// Computes embeddings for ranges of one session waveform.
pub struct SegmentEmbedder<'a> {
    waveform: &'a WaveformSampleStore,
    provider: &'a dyn EmbeddingProvider,
    cache: &'a mut EmbeddingCache,
}

impl<'a> SegmentEmbedder<'a> {
    pub fn new(
        waveform: &'a WaveformSampleStore,
        provider: &'a dyn EmbeddingProvider,
        cache: &'a mut EmbeddingCache,
    ) -> Self {
        Self {
            waveform,
            provider,
            cache,
        }
    }

    pub fn waveform(&self) -> &WaveformSampleStore {
        self.waveform
    }

    /// Normalized embedding for a ms range of the session waveform.
    ///
    /// Returns `None` when the clamped range contains no samples or the
    /// encoder fails on it; both are logged and counted by callers as skips.
    pub fn embed_range(&mut self, start_ms: f64, end_ms: f64) -> Option<Vec<f32>> {
        if let Some(hit) = self.cache.get(start_ms, end_ms) {
            return Some(hit.clone());
        }

        let slice = self.waveform.slice_ms(start_ms, end_ms);
        if slice.is_empty() {
            debug!(
                "Skipping empty range {:.1}..{:.1} ms after clamping",
                start_ms, end_ms
            );
            return None;
        }

        let at_rate = resample_or_passthrough(
            slice,
            self.waveform.sample_rate(),
            self.provider.sample_rate(),
        );

        match self.provider.embed(&at_rate) {
            Ok(mut embedding) => {
                l2_normalize(&mut embedding);
                self.cache.insert(start_ms, end_ms, embedding.clone());
                Some(embedding)
            }
            Err(e) => {
                warn!(
                    "Embedding failed for {:.1}..{:.1} ms: {}",
                    start_ms, end_ms, e
                );
                None
            }
        }
    }

    /// Strict variant for reference selections, where failure must surface.
    pub fn embed_range_strict(&mut self, start_ms: f64, end_ms: f64) -> Result<Vec<f32>> {
        if let Some(hit) = self.cache.get(start_ms, end_ms) {
            return Ok(hit.clone());
        }

        let slice = self.waveform.slice_ms(start_ms, end_ms);
        if slice.is_empty() {
            return Err(SliceError::InvalidRange {
                start_ms,
                end_ms,
                reason: "no samples in range after clamping".to_string(),
            });
        }

        let at_rate = resample_or_passthrough(
            slice,
            self.waveform.sample_rate(),
            self.provider.sample_rate(),
        );

        let mut embedding = self
            .provider
            .embed(&at_rate)
            .map_err(|e| SliceError::DependencyUnavailable(e.to_string()))?;
        l2_normalize(&mut embedding);
        self.cache.insert(start_ms, end_ms, embedding.clone());
        Ok(embedding)
    }

    /// Normalized embedding for an external reference clip at an arbitrary
    /// sample rate. Not cached; reference clips are one-shot.
    pub fn embed_clip(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<f32>> {
        if samples.is_empty() {
            return Err(SliceError::InvalidParameter(
                "reference clip is empty".to_string(),
            ));
        }

        let at_rate = resample_or_passthrough(samples, sample_rate, self.provider.sample_rate());
        let mut embedding = self
            .provider
            .embed(&at_rate)
            .map_err(|e| SliceError::DependencyUnavailable(e.to_string()))?;
        l2_normalize(&mut embedding);
        Ok(embedding)
    }
}
