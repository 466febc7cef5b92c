// Segment Model
//
// Ordered segment list with the editing operations the slicer UI exposes:
// manual add, selection remove/merge, gap merging, and short-segment cleanup.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SliceError};

/// A contiguous time interval of interest within the loaded audio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start_ms: f64,
    pub end_ms: f64,
}

impl Segment {
    pub fn new(start_ms: f64, end_ms: f64) -> Self {
        Self { start_ms, end_ms }
    }

    pub fn duration_ms(&self) -> f64 {
        self.end_ms - self.start_ms
    }
}

/// One list entry: a segment plus its optional speaker label.
///
/// The label lives next to the segment so that structural edits cannot leave
/// a stale label array of the wrong length behind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledSegment {
    pub segment: Segment,
    pub voice_id: Option<u32>,
}

/// Ordered collection of segments for one loaded audio file.
///
/// Segments are kept in chronological order; list indices are what the UI
/// uses for selection, and chronological position is what speaker-label
/// canonicalization is defined over. Every structural mutation clears any
/// voice-id labels, which would otherwise silently go stale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentSet {
    entries: Vec<LabeledSegment>,
    duration_ms: f64,
}

impl SegmentSet {
    /// Empty set bounded by the audio duration.
    pub fn new(duration_ms: f64) -> Self {
        Self {
            entries: Vec::new(),
            duration_ms,
        }
    }

    /// Build a set from detector or splitter output. Segments keep the given
    /// order (detectors emit chronologically) and carry no labels.
    pub fn from_segments(segments: Vec<Segment>, duration_ms: f64) -> Self {
        Self {
            entries: segments
                .into_iter()
                .map(|segment| LabeledSegment {
                    segment,
                    voice_id: None,
                })
                .collect(),
            duration_ms,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    pub fn get(&self, index: usize) -> Option<Segment> {
        self.entries.get(index).map(|e| e.segment)
    }

    pub fn voice_id(&self, index: usize) -> Option<u32> {
        self.entries.get(index).and_then(|e| e.voice_id)
    }

    pub fn entries(&self) -> &[LabeledSegment] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = Segment> + '_ {
        self.entries.iter().map(|e| e.segment)
    }

    pub fn segments(&self) -> Vec<Segment> {
        self.iter().collect()
    }

    /// Insert a segment at its chronological position.
    ///
    /// `min_len_ms` is the caller's minimum: 10 ms for a manual add, 100 ms
    /// when finalizing a drag selection.
    pub fn add(&mut self, start_ms: f64, end_ms: f64, min_len_ms: f64) -> Result<Segment> {
        if start_ms < 0.0 || end_ms > self.duration_ms {
            return Err(SliceError::InvalidRange {
                start_ms,
                end_ms,
                reason: format!("outside audio bounds 0..{:.1} ms", self.duration_ms),
            });
        }
        if end_ms - start_ms < min_len_ms {
            return Err(SliceError::InvalidRange {
                start_ms,
                end_ms,
                reason: format!("shorter than the {:.0} ms minimum", min_len_ms),
            });
        }

        let segment = Segment::new(start_ms, end_ms);
        let pos = self
            .entries
            .partition_point(|e| e.segment.start_ms <= start_ms);
        self.entries.insert(
            pos,
            LabeledSegment {
                segment,
                voice_id: None,
            },
        );
        self.clear_voice_ids();
        Ok(segment)
    }

    /// Remove the segments at the given indices. Unknown indices are ignored.
    pub fn remove(&mut self, indices: &[usize]) {
        let mut sorted: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&i| i < self.entries.len())
            .collect();
        sorted.sort_unstable();
        sorted.dedup();
        for i in sorted.into_iter().rev() {
            self.entries.remove(i);
        }
        self.clear_voice_ids();
    }

    /// Merge the selected segments into one spanning min(start)..max(end).
    ///
    /// The merged segment replaces the originals at the position of the
    /// earliest selected index. Selections of fewer than two valid indices
    /// are a no-op and return `None`.
    pub fn merge(&mut self, indices: &[usize]) -> Option<Segment> {
        let mut sorted: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&i| i < self.entries.len())
            .collect();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.len() < 2 {
            return None;
        }

        let start = sorted
            .iter()
            .map(|&i| self.entries[i].segment.start_ms)
            .fold(f64::INFINITY, f64::min);
        let end = sorted
            .iter()
            .map(|&i| self.entries[i].segment.end_ms)
            .fold(f64::NEG_INFINITY, f64::max);
        let insert_at = sorted[0];

        for &i in sorted.iter().rev() {
            self.entries.remove(i);
        }
        let merged = Segment::new(start, end);
        self.entries.insert(
            insert_at,
            LabeledSegment {
                segment: merged,
                voice_id: None,
            },
        );
        self.clear_voice_ids();
        debug!(
            "Merged {} segments into {:.1}..{:.1} ms",
            sorted.len(),
            start,
            end
        );
        Some(merged)
    }

    /// Merge every pair of neighbors whose gap is at most `max_gap_ms`.
    ///
    /// Single linear sweep over the segments in start order; overlapping
    /// neighbors (gap <= 0) are always absorbed. Running it twice with the
    /// same gap is a no-op the second time.
    pub fn merge_gaps_below(&mut self, max_gap_ms: f64) {
        if self.entries.is_empty() {
            return;
        }

        let mut segments = self.segments();
        segments.sort_by(|a, b| a.start_ms.total_cmp(&b.start_ms));

        let mut merged: Vec<Segment> = vec![segments[0]];
        for seg in segments.into_iter().skip(1) {
            let current = merged.last_mut().unwrap();
            if seg.start_ms - current.end_ms <= max_gap_ms {
                current.end_ms = current.end_ms.max(seg.end_ms);
            } else {
                merged.push(seg);
            }
        }

        let before = self.entries.len();
        self.entries = merged
            .into_iter()
            .map(|segment| LabeledSegment {
                segment,
                voice_id: None,
            })
            .collect();
        if self.entries.len() != before {
            debug!(
                "Gap merge: {} segments → {} (max gap {:.0} ms)",
                before,
                self.entries.len(),
                max_gap_ms
            );
        }
    }

    /// Drop every segment shorter than `min_duration_ms`.
    pub fn remove_shorter_than(&mut self, min_duration_ms: f64) {
        let before = self.entries.len();
        self.entries
            .retain(|e| e.segment.duration_ms() >= min_duration_ms);
        if self.entries.len() != before {
            debug!(
                "Removed {} segments shorter than {:.0} ms",
                before - self.entries.len(),
                min_duration_ms
            );
        }
        self.clear_voice_ids();
    }

    /// Attach one voice id per segment, index-aligned.
    pub fn set_voice_ids(&mut self, ids: &[u32]) -> Result<()> {
        if ids.len() != self.entries.len() {
            return Err(SliceError::InvalidParameter(format!(
                "voice id count {} does not match segment count {}",
                ids.len(),
                self.entries.len()
            )));
        }
        for (entry, &id) in self.entries.iter_mut().zip(ids) {
            entry.voice_id = Some(id);
        }
        Ok(())
    }

    pub fn clear_voice_ids(&mut self) {
        for entry in &mut self.entries {
            entry.voice_id = None;
        }
    }

    pub fn has_voice_ids(&self) -> bool {
        self.entries.iter().any(|e| e.voice_id.is_some())
    }
}
