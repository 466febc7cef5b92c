// Voice-change splitting
//
// Slides an embedding window across each segment and cuts where adjacent
// windows stop sounding like the same voice. Output sub-segments exactly
// tile each input segment: unlike silence detection, nothing is discarded,
// so total coverage is preserved to the sample.

use log::{debug, info};

use crate::config::SplitParams;
use crate::embedding::{cosine_similarity, SegmentEmbedder};
use crate::error::Result;
use crate::segments::{Segment, SegmentSet};

/// Split each base segment at detected speaker changes.
///
/// Segments too short for two analysis windows pass through unchanged.
/// Results keep the base order, unlabeled.
pub fn split(
    embedder: &mut SegmentEmbedder,
    base: &SegmentSet,
    params: &SplitParams,
) -> Result<SegmentSet> {
    params.validate()?;

    let window_ms = params.window_s * 1000.0;
    let hop_ms = params.hop_s * 1000.0;
    let min_ms = params.min_segment_s * 1000.0;

    let mut out: Vec<Segment> = Vec::new();
    let mut splits_made = 0usize;

    for seg in base.iter() {
        // One embedding per window position, tagged with its temporal center.
        let mut windows: Vec<(f64, Vec<f32>)> = Vec::new();
        let mut w = seg.start_ms;
        while w + window_ms <= seg.end_ms + 1e-6 {
            if let Some(embedding) = embedder.embed_range(w, w + window_ms) {
                windows.push((w + window_ms / 2.0, embedding));
            }
            w += hop_ms;
        }

        if windows.len() < 2 {
            out.push(seg);
            continue;
        }

        // A boundary lands at the center of the window where similarity
        // dropped, but only if it leaves at least min_ms since the previous
        // accepted boundary; that keeps one brief disruption from spraying
        // splits.
        let mut boundaries: Vec<f64> = Vec::new();
        let mut last_boundary = seg.start_ms;
        for pair in windows.windows(2) {
            let (_, ref prev_emb) = pair[0];
            let (center, ref next_emb) = pair[1];
            let similarity = cosine_similarity(prev_emb, next_emb);
            if similarity < params.similarity_threshold && center - last_boundary >= min_ms {
                debug!(
                    "Voice change at {:.0} ms (similarity {:.3})",
                    center, similarity
                );
                boundaries.push(center);
                last_boundary = center;
            }
        }

        let mut subs: Vec<Segment> = Vec::new();
        let mut cursor = seg.start_ms;
        for &b in &boundaries {
            subs.push(Segment::new(cursor, b));
            cursor = b;
        }
        subs.push(Segment::new(cursor, seg.end_ms));

        // Sweep left to right, absorbing short sub-segments into their
        // predecessor so the original span stays fully covered.
        let mut merged: Vec<Segment> = vec![subs[0]];
        for sub in subs.into_iter().skip(1) {
            if sub.duration_ms() < min_ms {
                merged.last_mut().unwrap().end_ms = sub.end_ms;
            } else {
                merged.push(sub);
            }
        }

        splits_made += merged.len() - 1;
        out.extend(merged);
    }

    info!(
        "Voice splitting: {} base segments → {} ({} splits)",
        base.len(),
        out.len(),
        splits_made
    );
    Ok(SegmentSet::from_segments(out, base.duration_ms()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SplitParams;
    use crate::embedding::EmbeddingCache;
    use crate::error::SliceError;
    use crate::testutil::{composed, AmplitudeBucketProvider};
    use crate::waveform::WaveformSampleStore;

    const RATE: u32 = 16000;

    fn params() -> SplitParams {
        SplitParams {
            window_s: 1.5,
            hop_s: 0.5,
            similarity_threshold: 0.5,
            min_segment_s: 2.0,
        }
    }

    fn assert_tiles(set: &SegmentSet, start_ms: f64, end_ms: f64) {
        let segs = set.segments();
        assert!(!segs.is_empty());
        assert_eq!(segs.first().unwrap().start_ms, start_ms);
        assert_eq!(segs.last().unwrap().end_ms, end_ms);
        for pair in segs.windows(2) {
            assert_eq!(pair[0].end_ms, pair[1].start_ms, "gap or overlap in {:?}", segs);
        }
    }

    #[test]
    fn rejects_hop_larger_than_window() {
        let store = WaveformSampleStore::new(vec![0.2; RATE as usize], RATE);
        let provider = AmplitudeBucketProvider::new(RATE);
        let mut cache = EmbeddingCache::new();
        let mut embedder = SegmentEmbedder::new(&store, &provider, &mut cache);
        let base = SegmentSet::from_segments(vec![Segment::new(0.0, 1000.0)], 1000.0);

        let bad = SplitParams {
            window_s: 0.5,
            hop_s: 1.0,
            ..params()
        };
        assert!(matches!(
            split(&mut embedder, &base, &bad),
            Err(SliceError::InvalidParameter(_))
        ));
    }

    #[test]
    fn two_speakers_split_once_near_the_change() {
        // Speaker A for 3 s, speaker B for 3 s
        let samples = composed(&[(0.2, 3000.0), (0.8, 3000.0)], RATE);
        let store = WaveformSampleStore::new(samples, RATE);
        let provider = AmplitudeBucketProvider::new(RATE);
        let mut cache = EmbeddingCache::new();
        let mut embedder = SegmentEmbedder::new(&store, &provider, &mut cache);
        let base = SegmentSet::from_segments(vec![Segment::new(0.0, 6000.0)], 6000.0);

        let result = split(&mut embedder, &base, &params()).unwrap();

        assert_eq!(result.len(), 2);
        assert_tiles(&result, 0.0, 6000.0);
        let boundary = result.get(0).unwrap().end_ms;
        assert!(
            (2500.0..=3500.0).contains(&boundary),
            "boundary {} not near the 3000 ms change",
            boundary
        );
        let total: f64 = result.iter().map(|s| s.duration_ms()).sum();
        assert_eq!(total, 6000.0);
    }

    #[test]
    fn single_voice_stays_whole() {
        let samples = composed(&[(0.4, 5000.0)], RATE);
        let store = WaveformSampleStore::new(samples, RATE);
        let provider = AmplitudeBucketProvider::new(RATE);
        let mut cache = EmbeddingCache::new();
        let mut embedder = SegmentEmbedder::new(&store, &provider, &mut cache);
        let base = SegmentSet::from_segments(vec![Segment::new(0.0, 5000.0)], 5000.0);

        let result = split(&mut embedder, &base, &params()).unwrap();
        assert_eq!(result.segments(), base.segments());
    }

    #[test]
    fn short_segment_passes_through() {
        let samples = composed(&[(0.2, 1000.0), (0.8, 2000.0)], RATE);
        let store = WaveformSampleStore::new(samples, RATE);
        let provider = AmplitudeBucketProvider::new(RATE);
        let mut cache = EmbeddingCache::new();
        let mut embedder = SegmentEmbedder::new(&store, &provider, &mut cache);
        // Under one 1.5 s window
        let base = SegmentSet::from_segments(vec![Segment::new(0.0, 1000.0)], 3000.0);

        let result = split(&mut embedder, &base, &params()).unwrap();
        assert_eq!(result.segments(), vec![Segment::new(0.0, 1000.0)]);
    }

    #[test]
    fn every_base_segment_tiles_independently() {
        // Two base segments, each with its own internal voice change
        let samples = composed(
            &[(0.2, 3000.0), (0.8, 3000.0), (0.2, 3000.0), (0.8, 3000.0)],
            RATE,
        );
        let store = WaveformSampleStore::new(samples, RATE);
        let provider = AmplitudeBucketProvider::new(RATE);
        let mut cache = EmbeddingCache::new();
        let mut embedder = SegmentEmbedder::new(&store, &provider, &mut cache);
        let base = SegmentSet::from_segments(
            vec![Segment::new(0.0, 6000.0), Segment::new(6000.0, 12000.0)],
            12000.0,
        );

        let result = split(&mut embedder, &base, &params()).unwrap();
        assert_tiles(&result, 0.0, 12000.0);
        assert_eq!(result.len(), 4);
        // The two halves split independently at their own changes
        assert!(result.iter().any(|s| s.start_ms == 6000.0 || s.end_ms == 6000.0));
    }
}
