// Voice clustering
//
// Unsupervised speaker labeling: embed every segment long enough to embed,
// k-means the embeddings, then renumber clusters by chronological first
// appearance so "voice 1" is always whoever speaks first and labels do not
// flicker across reruns.

use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{KMEANS_MAX_ITERS, MIN_EMBED_MS};
use crate::embedding::{l2_normalize, SegmentEmbedder};
use crate::error::{Result, SliceError};
use crate::segments::SegmentSet;

/// Result of one clustering run.
#[derive(Debug)]
pub struct ClusterOutcome {
    /// One 1-indexed voice id per input segment. Empty when cancelled.
    pub labels: Vec<u32>,
    /// Segments that contributed an embedding to the clustering.
    pub embedded: usize,
    /// Segments below the embeddable minimum; they inherit a neighbor label.
    pub skipped: usize,
    /// True when the run stopped early at the caller's cancel flag.
    pub cancelled: bool,
}

/// Partition the segments into up to `k` voices.
///
/// Segments shorter than the embeddable minimum are skipped during
/// extraction and afterwards inherit the nearest preceding label (or the
/// first assigned label when nothing precedes them). Short fragments are
/// assumed to belong to whichever voice surrounds them.
pub fn label<F: FnMut(usize, usize)>(
    embedder: &mut SegmentEmbedder,
    segments: &SegmentSet,
    k: usize,
    seed: u64,
    cancel: &AtomicBool,
    mut on_progress: F,
) -> Result<ClusterOutcome> {
    if k < 2 {
        return Err(SliceError::InvalidParameter(format!(
            "voice count must be at least 2, got {}",
            k
        )));
    }

    let total = segments.len();
    let mut points: Vec<(usize, Vec<f32>)> = Vec::new();
    let mut skipped = 0usize;

    for (i, seg) in segments.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            info!("Voice clustering cancelled after {} of {} segments", i, total);
            return Ok(ClusterOutcome {
                labels: Vec::new(),
                embedded: points.len(),
                skipped,
                cancelled: true,
            });
        }

        if seg.duration_ms() < MIN_EMBED_MS {
            debug!(
                "Segment {} ({:.0} ms) under the {:.0} ms embeddable minimum",
                i,
                seg.duration_ms(),
                MIN_EMBED_MS
            );
            skipped += 1;
        } else {
            match embedder.embed_range(seg.start_ms, seg.end_ms) {
                Some(embedding) => points.push((i, embedding)),
                None => skipped += 1,
            }
        }

        on_progress(i + 1, total);
    }

    if points.is_empty() {
        return Err(SliceError::InsufficientData);
    }

    let effective_k = k.min(points.len());
    if effective_k < k {
        warn!(
            "Only {} embeddable segments for {} requested voices, clustering into {}",
            points.len(),
            k,
            effective_k
        );
    }

    let embeddings: Vec<&[f32]> = points.iter().map(|(_, e)| e.as_slice()).collect();
    let assignments = kmeans(&embeddings, effective_k, seed);

    // Renumber clusters 1..k by the order their first member appears.
    let mut canonical: Vec<Option<u32>> = vec![None; effective_k];
    let mut next_label = 1u32;
    let mut labeled: Vec<Option<u32>> = vec![None; total];
    for ((seg_index, _), &cluster) in points.iter().zip(&assignments) {
        let label = *canonical[cluster].get_or_insert_with(|| {
            let l = next_label;
            next_label += 1;
            l
        });
        labeled[*seg_index] = Some(label);
    }

    // Short segments inherit the nearest preceding label; leading ones take
    // the first label assigned anywhere.
    let first_label = labeled.iter().flatten().copied().next().unwrap_or(1);
    let mut labels = Vec::with_capacity(total);
    let mut current = first_label;
    for slot in labeled {
        if let Some(l) = slot {
            current = l;
        }
        labels.push(current);
    }

    info!(
        "Voice clustering labeled {} segments into {} voices ({} inherited)",
        total,
        next_label - 1,
        skipped
    );
    Ok(ClusterOutcome {
        labels,
        embedded: points.len(),
        skipped,
        cancelled: false,
    })
}

/// K-means over L2-normalized vectors with cosine assignment.
///
/// Assignment picks the centroid with the highest dot product, which for
/// unit vectors is the cosine-nearest one. Centroids are re-normalized
/// after every update; an emptied cluster is reseeded from a random point.
fn kmeans(points: &[&[f32]], k: usize, seed: u64) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed);

    let init = rand::seq::index::sample(&mut rng, points.len(), k);
    let mut centroids: Vec<Vec<f32>> = init.iter().map(|i| points[i].to_vec()).collect();
    let mut assignments = vec![0usize; points.len()];
    let dim = points[0].len();

    let mut reseeded = false;
    for iteration in 0..KMEANS_MAX_ITERS {
        let mut changed = false;
        for (i, p) in points.iter().enumerate() {
            let mut best = 0usize;
            let mut best_dot = f32::NEG_INFINITY;
            for (c, centroid) in centroids.iter().enumerate() {
                let dot: f32 = p.iter().zip(centroid).map(|(a, b)| a * b).sum();
                if dot > best_dot {
                    best_dot = dot;
                    best = c;
                }
            }
            if assignments[i] != best {
                assignments[i] = best;
                changed = true;
            }
        }

        // A reseed in the previous update is a centroid change, so
        // convergence requires a full pass with neither.
        if !changed && !reseeded && iteration > 0 {
            debug!("K-means converged after {} iterations", iteration);
            break;
        }
        reseeded = false;

        let mut sums = vec![vec![0.0f32; dim]; k];
        let mut counts = vec![0usize; k];
        for (i, p) in points.iter().enumerate() {
            counts[assignments[i]] += 1;
            for (s, v) in sums[assignments[i]].iter_mut().zip(p.iter()) {
                *s += v;
            }
        }

        for c in 0..k {
            if counts[c] == 0 {
                // Reseed rather than leaving a dead centroid behind
                centroids[c] = points[rng.gen_range(0..points.len())].to_vec();
                reseeded = true;
            } else {
                let mut mean: Vec<f32> =
                    sums[c].iter().map(|s| s / counts[c] as f32).collect();
                l2_normalize(&mut mean);
                centroids[c] = mean;
            }
        }
    }

    assignments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KMEANS_DEFAULT_SEED;
    use crate::embedding::EmbeddingCache;
    use crate::segments::Segment;
    use crate::testutil::{composed, AmplitudeBucketProvider};
    use crate::waveform::WaveformSampleStore;

    const RATE: u32 = 16000;

    fn no_progress(_: usize, _: usize) {}

    fn session(blocks: &[(f32, f64)]) -> (WaveformSampleStore, SegmentSet) {
        let samples = composed(blocks, RATE);
        let duration: f64 = blocks.iter().map(|&(_, ms)| ms).sum();
        let store = WaveformSampleStore::new(samples, RATE);
        let mut cursor = 0.0;
        let segments: Vec<Segment> = blocks
            .iter()
            .map(|&(_, ms)| {
                let seg = Segment::new(cursor, cursor + ms);
                cursor += ms;
                seg
            })
            .collect();
        (store, SegmentSet::from_segments(segments, duration))
    }

    #[test]
    fn first_voice_heard_gets_label_one() {
        // A A B B A A
        let (store, segments) = session(&[
            (0.2, 1000.0),
            (0.2, 1000.0),
            (0.8, 1000.0),
            (0.8, 1000.0),
            (0.2, 1000.0),
            (0.2, 1000.0),
        ]);
        let provider = AmplitudeBucketProvider::new(RATE);
        let mut cache = EmbeddingCache::new();
        let mut embedder = SegmentEmbedder::new(&store, &provider, &mut cache);

        let outcome = label(
            &mut embedder,
            &segments,
            2,
            KMEANS_DEFAULT_SEED,
            &AtomicBool::new(false),
            no_progress,
        )
        .unwrap();

        assert_eq!(outcome.labels, vec![1, 1, 2, 2, 1, 1]);
        assert_eq!(outcome.embedded, 6);
        assert_eq!(outcome.skipped, 0);
    }

    #[test]
    fn canonicalization_does_not_depend_on_which_voice_it_is() {
        // B B A A: whoever is first still gets label 1
        let (store, segments) = session(&[
            (0.8, 1000.0),
            (0.8, 1000.0),
            (0.2, 1000.0),
            (0.2, 1000.0),
        ]);
        let provider = AmplitudeBucketProvider::new(RATE);
        let mut cache = EmbeddingCache::new();
        let mut embedder = SegmentEmbedder::new(&store, &provider, &mut cache);

        let outcome = label(
            &mut embedder,
            &segments,
            2,
            KMEANS_DEFAULT_SEED,
            &AtomicBool::new(false),
            no_progress,
        )
        .unwrap();

        assert_eq!(outcome.labels, vec![1, 1, 2, 2]);
    }

    #[test]
    fn short_segments_inherit_the_preceding_label() {
        // 400 ms fragments are under the embeddable minimum
        let (store, segments) = session(&[
            (0.2, 1000.0),
            (0.9, 400.0),
            (0.8, 1000.0),
            (0.1, 400.0),
        ]);
        let provider = AmplitudeBucketProvider::new(RATE);
        let mut cache = EmbeddingCache::new();
        let mut embedder = SegmentEmbedder::new(&store, &provider, &mut cache);

        let outcome = label(
            &mut embedder,
            &segments,
            2,
            KMEANS_DEFAULT_SEED,
            &AtomicBool::new(false),
            no_progress,
        )
        .unwrap();

        assert_eq!(outcome.labels, vec![1, 1, 2, 2]);
        assert_eq!(outcome.embedded, 2);
        assert_eq!(outcome.skipped, 2);
    }

    #[test]
    fn leading_short_segment_takes_the_first_label() {
        let (store, segments) = session(&[
            (0.9, 400.0),
            (0.2, 1000.0),
            (0.8, 1000.0),
        ]);
        let provider = AmplitudeBucketProvider::new(RATE);
        let mut cache = EmbeddingCache::new();
        let mut embedder = SegmentEmbedder::new(&store, &provider, &mut cache);

        let outcome = label(
            &mut embedder,
            &segments,
            2,
            KMEANS_DEFAULT_SEED,
            &AtomicBool::new(false),
            no_progress,
        )
        .unwrap();

        assert_eq!(outcome.labels, vec![1, 1, 2]);
    }

    #[test]
    fn k_below_two_is_rejected() {
        let (store, segments) = session(&[(0.2, 1000.0)]);
        let provider = AmplitudeBucketProvider::new(RATE);
        let mut cache = EmbeddingCache::new();
        let mut embedder = SegmentEmbedder::new(&store, &provider, &mut cache);

        assert!(matches!(
            label(
                &mut embedder,
                &segments,
                1,
                KMEANS_DEFAULT_SEED,
                &AtomicBool::new(false),
                no_progress
            ),
            Err(SliceError::InvalidParameter(_))
        ));
    }

    #[test]
    fn nothing_embeddable_is_an_error() {
        let (store, segments) = session(&[(0.2, 300.0), (0.8, 400.0)]);
        let provider = AmplitudeBucketProvider::new(RATE);
        let mut cache = EmbeddingCache::new();
        let mut embedder = SegmentEmbedder::new(&store, &provider, &mut cache);

        assert!(matches!(
            label(
                &mut embedder,
                &segments,
                2,
                KMEANS_DEFAULT_SEED,
                &AtomicBool::new(false),
                no_progress
            ),
            Err(SliceError::InsufficientData)
        ));
    }

    #[test]
    fn same_seed_gives_same_labels() {
        let (store, segments) = session(&[
            (0.2, 1000.0),
            (0.8, 1000.0),
            (0.5, 1000.0),
            (0.2, 1000.0),
            (0.8, 1000.0),
        ]);
        let provider = AmplitudeBucketProvider::new(RATE);

        let run = || {
            let mut cache = EmbeddingCache::new();
            let mut embedder = SegmentEmbedder::new(&store, &provider, &mut cache);
            label(
                &mut embedder,
                &segments,
                3,
                42,
                &AtomicBool::new(false),
                no_progress,
            )
            .unwrap()
            .labels
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn cancellation_returns_partial_accounting() {
        let (store, segments) = session(&[(0.2, 1000.0), (0.8, 1000.0), (0.2, 1000.0)]);
        let provider = AmplitudeBucketProvider::new(RATE);
        let mut cache = EmbeddingCache::new();
        let mut embedder = SegmentEmbedder::new(&store, &provider, &mut cache);

        let cancel = AtomicBool::new(false);
        let mut visited = 0usize;
        let outcome = label(
            &mut embedder,
            &segments,
            2,
            KMEANS_DEFAULT_SEED,
            &cancel,
            |_, _| {
                visited += 1;
                cancel.store(true, Ordering::Relaxed);
            },
        )
        .unwrap();

        assert!(outcome.cancelled);
        assert!(outcome.labels.is_empty());
        assert_eq!(outcome.embedded, 1);
    }
}
