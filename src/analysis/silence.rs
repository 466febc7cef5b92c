// Silence detection
//
// Finds candidate speech segments as the spans between long-enough silent
// runs. The threshold is relative to the track's mean loudness so the same
// offset works across recordings with very different gain.

use log::{debug, info};

use crate::config::{SilenceParams, LOUDNESS_FRAME_MS};
use crate::segments::{Segment, SegmentSet};
use crate::waveform::loudness::{loudness_profile, mean_dbfs, SILENCE_FLOOR_DB};
use crate::waveform::WaveformSampleStore;

/// Scan the waveform and return non-silent candidate segments in
/// chronological order, unlabeled. A silent or empty file yields an empty
/// set, not an error.
pub fn detect(waveform: &WaveformSampleStore, params: &SilenceParams) -> SegmentSet {
    let duration_ms = waveform.duration_ms();
    if waveform.is_empty() {
        return SegmentSet::new(duration_ms);
    }

    let track_db = mean_dbfs(waveform);
    if track_db <= SILENCE_FLOOR_DB {
        info!("Track has no measurable energy, nothing to detect");
        return SegmentSet::new(duration_ms);
    }

    let threshold_db = track_db + params.threshold_offset_db;
    let profile = loudness_profile(waveform, LOUDNESS_FRAME_MS);
    let min_silence_frames = ((params.min_silence_ms / LOUDNESS_FRAME_MS).ceil() as usize).max(1);

    debug!(
        "Silence scan: {} frames, threshold {:.1} dBFS (track mean {:+.1} dB offset)",
        profile.len(),
        threshold_db,
        params.threshold_offset_db
    );

    // Silent runs long enough to count as gaps, as frame index ranges.
    let mut gaps: Vec<(usize, usize)> = Vec::new();
    let mut run_start: Option<usize> = None;
    for (i, &level) in profile.iter().enumerate() {
        if level < threshold_db {
            run_start.get_or_insert(i);
        } else if let Some(start) = run_start.take() {
            if i - start >= min_silence_frames {
                gaps.push((start, i));
            }
        }
    }
    if let Some(start) = run_start {
        if profile.len() - start >= min_silence_frames {
            gaps.push((start, profile.len()));
        }
    }

    // Everything between the gaps is a candidate span.
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut cursor = 0;
    for &(gap_start, gap_end) in &gaps {
        if gap_start > cursor {
            spans.push((cursor, gap_start));
        }
        cursor = gap_end;
    }
    if cursor < profile.len() {
        spans.push((cursor, profile.len()));
    }

    let mut segments = Vec::new();
    for (frame_start, frame_end) in spans {
        let start_ms = (frame_start as f64 * LOUDNESS_FRAME_MS - params.padding_ms).max(0.0);
        let end_ms = (frame_end as f64 * LOUDNESS_FRAME_MS + params.padding_ms).min(duration_ms);
        if end_ms - start_ms >= params.min_segment_ms {
            segments.push(Segment::new(start_ms, end_ms));
        } else {
            debug!(
                "Dropping {:.0} ms blip at {:.0} ms (under {:.0} ms minimum)",
                end_ms - start_ms,
                start_ms,
                params.min_segment_ms
            );
        }
    }

    info!(
        "Silence detection found {} candidate segments in {:.1} s of audio",
        segments.len(),
        duration_ms / 1000.0
    );
    SegmentSet::from_segments(segments, duration_ms)
}
