// Embedding cache
//
// One cache per loaded waveform, owned by the session. Keys are exact
// millisecond ranges; the store is immutable, so a range fully identifies
// its audio. Replaced the source application's module-level caches so tests
// and parallel sessions get isolated instances.

use std::collections::HashMap;

use log::debug;

/// Session-owned cache of computed segment embeddings, keyed by ms range.
#[derive(Default)]
pub struct EmbeddingCache {
    entries: HashMap<(u64, u64), Vec<f32>>,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(start_ms: f64, end_ms: f64) -> (u64, u64) {
        (start_ms.to_bits(), end_ms.to_bits())
    }

    pub fn get(&self, start_ms: f64, end_ms: f64) -> Option<&Vec<f32>> {
        self.entries.get(&Self::key(start_ms, end_ms))
    }

    pub fn insert(&mut self, start_ms: f64, end_ms: f64, embedding: Vec<f32>) {
        self.entries.insert(Self::key(start_ms, end_ms), embedding);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all cached embeddings. Call when the waveform they were computed
    /// from is replaced.
    pub fn invalidate(&mut self) {
        if !self.entries.is_empty() {
            debug!("Invalidating {} cached embeddings", self.entries.len());
        }
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_invalidates() {
        let mut cache = EmbeddingCache::new();
        assert!(cache.get(0.0, 100.0).is_none());

        cache.insert(0.0, 100.0, vec![1.0, 2.0]);
        assert_eq!(cache.get(0.0, 100.0), Some(&vec![1.0, 2.0]));
        assert_eq!(cache.len(), 1);

        // A different range is a different entry
        cache.insert(0.0, 200.0, vec![3.0]);
        assert_eq!(cache.len(), 2);

        cache.invalidate();
        assert!(cache.is_empty());
        assert!(cache.get(0.0, 100.0).is_none());
    }
}
