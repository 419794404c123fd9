//! `VectorIndex`: brute-force cosine-similarity k-NN.
//!
//! Brute-force only — see DESIGN.md for the rationale on not reaching for an
//! approximate nearest-neighbor structure at this scale.

use crate::error::{Error, Result};

/// Outcome of a `rebuild` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildStats {
    pub added: usize,
    pub skipped: usize,
}

/// Cosine-similarity index over fixed-dimension embeddings.
///
/// Slots are append-only within a run; `rebuild` clears and repopulates them,
/// producing a fresh slot->memory-index mapping via the caller-supplied
/// `memory_indices` (parallel to the rebuilt vectors, skipped entries keep no
/// mapping).
pub struct VectorIndex {
    dimension: usize,
    vectors: Vec<Vec<f64>>,
}

impl VectorIndex {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    fn validate(&self, vector: &[f64]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(Error::NonFiniteEmbedding);
        }
        Ok(())
    }

    /// Append a vector, returning its stable slot id.
    pub fn add(&mut self, vector: Vec<f64>) -> Result<usize> {
        self.validate(&vector)?;
        let slot = self.vectors.len();
        self.vectors.push(vector);
        Ok(slot)
    }

    /// Clear and repopulate the index from `vectors`, skipping invalid ones.
    /// Returns `(stats, slot_to_source_index)` — the latter maps each
    /// surviving slot back to its index in the input slice, so the caller can
    /// rebuild its own slot<->memory mapping.
    pub fn rebuild(&mut self, vectors: &[Vec<f64>]) -> (RebuildStats, Vec<usize>) {
        self.vectors.clear();
        let mut stats = RebuildStats::default();
        let mut slot_to_source = Vec::new();
        for (source_index, vector) in vectors.iter().enumerate() {
            if self.validate(vector).is_ok() {
                self.vectors.push(vector.clone());
                slot_to_source.push(source_index);
                stats.added += 1;
            } else {
                stats.skipped += 1;
            }
        }
        (stats, slot_to_source)
    }

    /// Cosine similarity between two vectors; 0 if either norm is 0.
    #[must_use]
    pub fn cosine(a: &[f64], b: &[f64]) -> f64 {
        let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
        let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            0.0
        } else {
            dot / (norm_a * norm_b)
        }
    }

    /// Top-`k` nearest neighbors by descending cosine similarity, ties broken
    /// by ascending slot id.
    pub fn search(&self, query: &[f64], k: usize) -> Result<Vec<(usize, f64)>> {
        self.validate(query)?;
        let mut scored: Vec<(usize, f64)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(slot, vector)| (slot, Self::cosine(query, vector)))
            .collect();
        scored.sort_by(|a, b| match b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal) {
            std::cmp::Ordering::Equal => a.0.cmp(&b.0),
            other => other,
        });
        scored.truncate(k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_rejects_wrong_dimension() {
        let mut index = VectorIndex::new(3);
        assert!(matches!(
            index.add(vec![1.0, 2.0]),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn add_rejects_non_finite_components() {
        let mut index = VectorIndex::new(2);
        assert!(matches!(
            index.add(vec![1.0, f64::INFINITY]),
            Err(Error::NonFiniteEmbedding)
        ));
    }

    #[test]
    fn search_orders_by_descending_cosine() {
        let mut index = VectorIndex::new(2);
        index.add(vec![1.0, 0.0]).unwrap();
        index.add(vec![0.0, 1.0]).unwrap();
        index.add(vec![0.7, 0.7]).unwrap();

        let results = index.search(&[1.0, 0.0], 3).unwrap();
        assert_eq!(results[0].0, 0);
        assert!((results[0].1 - 1.0).abs() < 1e-9);
        assert_eq!(results[2].0, 1);
    }

    #[test]
    fn search_ties_break_by_ascending_slot() {
        let mut index = VectorIndex::new(2);
        index.add(vec![1.0, 0.0]).unwrap();
        index.add(vec![2.0, 0.0]).unwrap();
        let results = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(results[0].0, 0);
        assert_eq!(results[1].0, 1);
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert_eq!(VectorIndex::cosine(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn rebuild_skips_invalid_vectors_and_remaps_slots() {
        let mut index = VectorIndex::new(2);
        let vectors = vec![vec![1.0, 0.0], vec![1.0], vec![0.0, 1.0]];
        let (stats, slot_to_source) = index.rebuild(&vectors);
        assert_eq!(stats.added, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(index.len(), 2);
        assert_eq!(slot_to_source, vec![0, 2]);
    }

    #[test]
    fn size_matches_successful_adds() {
        let mut index = VectorIndex::new(2);
        for _ in 0..5 {
            index.add(vec![1.0, 1.0]).unwrap();
        }
        assert_eq!(index.len(), 5);
    }
}
