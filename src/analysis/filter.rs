// Voice similarity filtering
//
// Classifies each candidate segment against one reference voice and keeps
// or drops it. O(n) embedding calls, so progress is reported per segment
// and the cancel flag is polled at every segment boundary.

use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info};

use crate::config::MIN_REFERENCE_MS;
use crate::embedding::{cosine_similarity, l2_normalize, SegmentEmbedder};
use crate::error::{Result, SliceError};
use crate::segments::{Segment, SegmentSet};

/// Whether matching segments are retained or excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// Keep segments matching the reference voice.
    Keep,
    /// Remove segments matching the reference voice.
    Remove,
}

/// Where the reference voice comes from.
pub enum VoiceReference<'a> {
    /// A previously computed embedding.
    Embedding(&'a [f32]),
    /// A user-selected time range within the session waveform.
    Selection { start_ms: f64, end_ms: f64 },
    /// An external reference clip at its own sample rate.
    Clip { samples: &'a [f32], sample_rate: u32 },
}

/// Result of one filtering run.
#[derive(Debug)]
pub struct FilterOutcome {
    /// Surviving segments in their original order, unlabeled.
    pub segments: SegmentSet,
    /// Number of surviving segments.
    pub kept: usize,
    /// Segments that were embedded and classified.
    pub processed: usize,
    /// Segments skipped without classification (empty after clamping, or the
    /// encoder failed on them).
    pub skipped: usize,
    /// True when the run stopped early at the caller's cancel flag.
    pub cancelled: bool,
}

/// Classify every segment against the reference voice and keep or drop it.
///
/// `on_progress` is invoked once per visited segment with
/// `(visited, total)`.
pub fn filter<F: FnMut(usize, usize)>(
    embedder: &mut SegmentEmbedder,
    segments: &SegmentSet,
    reference: &VoiceReference,
    threshold: f32,
    mode: FilterMode,
    cancel: &AtomicBool,
    mut on_progress: F,
) -> Result<FilterOutcome> {
    let reference_embedding = resolve_reference(embedder, reference)?;

    let total = segments.len();
    let mut kept: Vec<Segment> = Vec::new();
    let mut processed = 0usize;
    let mut skipped = 0usize;
    let mut cancelled = false;

    for (i, seg) in segments.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            info!("Voice filter cancelled after {} of {} segments", i, total);
            cancelled = true;
            break;
        }

        match embedder.embed_range(seg.start_ms, seg.end_ms) {
            Some(embedding) => {
                let similarity = cosine_similarity(&embedding, &reference_embedding);
                let matched = similarity > threshold;
                let keep = match mode {
                    FilterMode::Keep => matched,
                    FilterMode::Remove => !matched,
                };
                debug!(
                    "Segment {:.0}..{:.0} ms similarity {:.3} → {}",
                    seg.start_ms,
                    seg.end_ms,
                    similarity,
                    if keep { "keep" } else { "drop" }
                );
                if keep {
                    kept.push(seg);
                }
                processed += 1;
            }
            None => {
                skipped += 1;
            }
        }

        on_progress(i + 1, total);
    }

    info!(
        "Voice filter: kept {} of {} processed ({} skipped){}",
        kept.len(),
        processed,
        skipped,
        if cancelled { ", cancelled" } else { "" }
    );

    let kept_count = kept.len();
    Ok(FilterOutcome {
        segments: SegmentSet::from_segments(kept, segments.duration_ms()),
        kept: kept_count,
        processed,
        skipped,
        cancelled,
    })
}

fn resolve_reference(
    embedder: &mut SegmentEmbedder,
    reference: &VoiceReference,
) -> Result<Vec<f32>> {
    match reference {
        VoiceReference::Embedding(v) => {
            let mut embedding = v.to_vec();
            l2_normalize(&mut embedding);
            Ok(embedding)
        }
        VoiceReference::Selection { start_ms, end_ms } => {
            let got_ms = end_ms - start_ms;
            if got_ms < MIN_REFERENCE_MS {
                return Err(SliceError::InsufficientReference {
                    min_ms: MIN_REFERENCE_MS,
                    got_ms,
                });
            }
            embedder.embed_range_strict(*start_ms, *end_ms)
        }
        VoiceReference::Clip {
            samples,
            sample_rate,
        } => {
            let got_ms = samples.len() as f64 * 1000.0 / (*sample_rate).max(1) as f64;
            if got_ms < MIN_REFERENCE_MS {
                return Err(SliceError::InsufficientReference {
                    min_ms: MIN_REFERENCE_MS,
                    got_ms,
                });
            }
            embedder.embed_clip(samples, *sample_rate)
        }
    }
}
