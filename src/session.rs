// Slicer session
//
// One session per loaded audio file: the decoded waveform, the injected
// embedding provider, and the embedding cache scoped to that waveform.
// Methods are plain blocking calls; run them on a worker thread (see
// worker.rs) to keep a UI responsive.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use log::info;

use crate::analysis::{cluster, filter, silence, splitter};
use crate::analysis::{ClusterOutcome, FilterMode, FilterOutcome, VoiceReference};
use crate::config::{SilenceParams, SplitParams};
use crate::embedding::{EmbeddingCache, EmbeddingProvider, SegmentEmbedder};
use crate::error::Result;
use crate::segments::SegmentSet;
use crate::waveform::WaveformSampleStore;

pub struct SlicerSession {
    waveform: WaveformSampleStore,
    provider: Arc<dyn EmbeddingProvider>,
    cache: EmbeddingCache,
}

impl SlicerSession {
    pub fn new(waveform: WaveformSampleStore, provider: Arc<dyn EmbeddingProvider>) -> Self {
        info!(
            "Session opened: {:.1} s of audio at {} Hz",
            waveform.duration_ms() / 1000.0,
            waveform.sample_rate()
        );
        Self {
            waveform,
            provider,
            cache: EmbeddingCache::new(),
        }
    }

    pub fn waveform(&self) -> &WaveformSampleStore {
        &self.waveform
    }

    pub fn duration_ms(&self) -> f64 {
        self.waveform.duration_ms()
    }

    /// Fresh, empty segment set bounded by this session's audio.
    pub fn empty_segments(&self) -> SegmentSet {
        SegmentSet::new(self.waveform.duration_ms())
    }

    /// Swap in a newly loaded file. Cached embeddings belong to the old
    /// waveform and are dropped; any existing SegmentSet is the caller's to
    /// discard.
    pub fn replace_waveform(&mut self, waveform: WaveformSampleStore) {
        info!(
            "Replacing session audio ({:.1} s → {:.1} s)",
            self.waveform.duration_ms() / 1000.0,
            waveform.duration_ms() / 1000.0
        );
        self.waveform = waveform;
        self.cache.invalidate();
    }

    pub fn invalidate_cache(&mut self) {
        self.cache.invalidate();
    }

    /// Candidate segments from silence detection.
    pub fn detect_silence(&self, params: &SilenceParams) -> SegmentSet {
        silence::detect(&self.waveform, params)
    }

    /// Split segments at detected speaker changes.
    pub fn split_by_voice(&mut self, base: &SegmentSet, params: &SplitParams) -> Result<SegmentSet> {
        let mut embedder =
            SegmentEmbedder::new(&self.waveform, self.provider.as_ref(), &mut self.cache);
        splitter::split(&mut embedder, base, params)
    }

    /// Keep or remove segments by similarity to a reference voice.
    pub fn filter_by_voice<F: FnMut(usize, usize)>(
        &mut self,
        segments: &SegmentSet,
        reference: &VoiceReference,
        threshold: f32,
        mode: FilterMode,
        cancel: &AtomicBool,
        on_progress: F,
    ) -> Result<FilterOutcome> {
        let mut embedder =
            SegmentEmbedder::new(&self.waveform, self.provider.as_ref(), &mut self.cache);
        filter::filter(
            &mut embedder,
            segments,
            reference,
            threshold,
            mode,
            cancel,
            on_progress,
        )
    }

    /// Assign a voice id to every segment via clustering.
    pub fn label_voices<F: FnMut(usize, usize)>(
        &mut self,
        segments: &SegmentSet,
        k: usize,
        seed: u64,
        cancel: &AtomicBool,
        on_progress: F,
    ) -> Result<ClusterOutcome> {
        let mut embedder =
            SegmentEmbedder::new(&self.waveform, self.provider.as_ref(), &mut self.cache);
        cluster::label(&mut embedder, segments, k, seed, cancel, on_progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KMEANS_DEFAULT_SEED;
    use crate::testutil::{composed, AmplitudeBucketProvider};

    const RATE: u32 = 16000;

    fn no_progress(_: usize, _: usize) {}

    #[test]
    fn detect_then_label_end_to_end() {
        let _ = env_logger::builder().is_test(true).try_init();

        // Two speakers separated by a second of silence
        let samples = composed(
            &[
                (0.2, 2000.0),
                (0.0, 1000.0),
                (0.8, 2000.0),
                (0.0, 1000.0),
                (0.2, 2000.0),
            ],
            RATE,
        );
        let waveform = WaveformSampleStore::new(samples, RATE);
        let mut session =
            SlicerSession::new(waveform, Arc::new(AmplitudeBucketProvider::new(RATE)));

        let mut segments = session.detect_silence(&SilenceParams::default());
        assert_eq!(segments.len(), 3);

        let outcome = session
            .label_voices(
                &segments,
                2,
                KMEANS_DEFAULT_SEED,
                &AtomicBool::new(false),
                no_progress,
            )
            .unwrap();
        assert_eq!(outcome.labels, vec![1, 2, 1]);
        segments.set_voice_ids(&outcome.labels).unwrap();
        assert_eq!(segments.voice_id(1), Some(2));
    }

    #[test]
    fn replacing_the_waveform_drops_cached_embeddings() {
        let waveform = WaveformSampleStore::new(composed(&[(0.5, 2000.0)], RATE), RATE);
        let mut session =
            SlicerSession::new(waveform, Arc::new(AmplitudeBucketProvider::new(RATE)));

        let base = SegmentSet::from_segments(
            vec![crate::segments::Segment::new(0.0, 2000.0)],
            2000.0,
        );
        session
            .split_by_voice(&base, &SplitParams::default())
            .unwrap();
        assert!(!session.cache.is_empty());

        session.replace_waveform(WaveformSampleStore::new(
            composed(&[(0.3, 1000.0)], RATE),
            RATE,
        ));
        assert!(session.cache.is_empty());
        assert_eq!(session.duration_ms(), 1000.0);
    }
}
