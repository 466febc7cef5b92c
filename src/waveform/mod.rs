// Waveform Module
//
// Split into focused files:
// - loudness.rs: RMS loudness profile and track mean dBFS
// - resample.rs: Sample rate conversion

pub mod loudness;
pub mod resample;

use log::debug;

/// Decoded mono PCM for one loaded audio file.
///
/// Constructed once per file and immutable afterwards; analysis operations
/// request read-only views by millisecond range and never mutate the buffer.
pub struct WaveformSampleStore {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl WaveformSampleStore {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        debug!(
            "Waveform store created: {} samples at {} Hz ({:.1} ms)",
            samples.len(),
            sample_rate,
            samples.len() as f64 * 1000.0 / sample_rate.max(1) as f64
        );
        Self {
            samples,
            sample_rate,
        }
    }

    /// Build a store from interleaved multi-channel PCM by averaging channels.
    pub fn from_interleaved(interleaved: &[f32], channels: u16, sample_rate: u32) -> Self {
        Self::new(downmix_mono(interleaved, channels), sample_rate)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_ms(&self) -> f64 {
        self.samples.len() as f64 * 1000.0 / self.sample_rate as f64
    }

    /// Convert a millisecond position to a sample index, clamped to the buffer.
    pub fn index_at_ms(&self, ms: f64) -> usize {
        let idx = (ms.max(0.0) / 1000.0 * self.sample_rate as f64).round() as usize;
        idx.min(self.samples.len())
    }

    /// Read-only view of the given millisecond range, clamped to the file.
    /// Degenerate ranges yield an empty slice.
    pub fn slice_ms(&self, start_ms: f64, end_ms: f64) -> &[f32] {
        let start = self.index_at_ms(start_ms);
        let end = self.index_at_ms(end_ms);
        if end <= start {
            return &[];
        }
        &self.samples[start..end]
    }

    /// Decimated view for waveform rendering: the peak absolute amplitude of
    /// each of `bins` equal slices of the buffer, one value per pixel column.
    pub fn peaks(&self, bins: usize) -> Vec<f32> {
        if bins == 0 || self.samples.is_empty() {
            return Vec::new();
        }
        let chunk = (self.samples.len() + bins - 1) / bins;
        self.samples
            .chunks(chunk)
            .map(|c| c.iter().fold(0.0f32, |max, &s| max.max(s.abs())))
            .collect()
    }
}

/// Average interleaved channels down to mono.
pub fn downmix_mono(interleaved: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    let mut mono = Vec::with_capacity(interleaved.len() / channels as usize);
    for frame in interleaved.chunks(channels as usize) {
        let sum: f32 = frame.iter().sum();
        mono.push(sum / channels as f32);
    }
    mono
}
