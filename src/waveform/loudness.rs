// Waveform - RMS loudness measurement
//
// Loudness here is plain RMS level in dBFS against a ±1.0 full scale. The
// silence detector compares per-frame loudness to the track mean, so the
// absolute calibration only has to be self-consistent.

use super::WaveformSampleStore;

/// Level reported for frames with no energy at all.
pub const SILENCE_FLOOR_DB: f64 = -120.0;

/// RMS level of one frame in dBFS.
pub fn frame_dbfs(frame: &[f32]) -> f64 {
    if frame.is_empty() {
        return SILENCE_FLOOR_DB;
    }
    let mean_sq: f64 = frame.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>() / frame.len() as f64;
    let rms = mean_sq.sqrt();
    if rms <= 0.0 {
        return SILENCE_FLOOR_DB;
    }
    (20.0 * rms.log10()).max(SILENCE_FLOOR_DB)
}

/// RMS level of the whole track in dBFS.
pub fn mean_dbfs(store: &WaveformSampleStore) -> f64 {
    frame_dbfs(store.samples())
}

/// Per-frame loudness profile at the given frame length.
pub fn loudness_profile(store: &WaveformSampleStore, frame_ms: f64) -> Vec<f64> {
    let frame_len = ((frame_ms / 1000.0) * store.sample_rate() as f64).round() as usize;
    if frame_len == 0 || store.is_empty() {
        return Vec::new();
    }
    store.samples().chunks(frame_len).map(frame_dbfs).collect()
}
