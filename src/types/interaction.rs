//! The `Interaction` entity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Classification bucket an interaction currently lives in.
///
/// Short-term and long-term are two buckets within the same store, differing
/// in decay treatment and promotion rules — not in physical location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemoryType {
    ShortTerm,
    LongTerm,
}

/// A stored prompt/response pair with its derived embedding and concepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: Uuid,
    pub prompt: String,
    pub output: String,
    /// Fixed-length vector of IEEE-754 doubles; length equals the store's configured dimension.
    pub embedding: Vec<f64>,
    /// De-duplicated, ordered list of concept labels extracted from prompt+output.
    pub concepts: Vec<String>,
    /// Monotonic creation time, milliseconds since epoch.
    pub timestamp: i64,
    pub access_count: u32,
    /// Multiplicative ranking weight in (0, 1].
    pub decay_factor: f64,
    pub memory_type: MemoryType,
}

impl Interaction {
    /// Construct a new short-term interaction, stamping `id`/`timestamp`/`access_count`/
    /// `decay_factor`/`memory_type` the way `MemoryStore::store` does.
    #[must_use]
    pub fn new(prompt: String, output: String, embedding: Vec<f64>, now_millis: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt,
            output,
            embedding,
            concepts: Vec::new(),
            timestamp: now_millis,
            access_count: 1,
            decay_factor: 1.0,
            memory_type: MemoryType::ShortTerm,
        }
    }

    /// De-duplicate `concepts` in place, preserving first-seen order.
    pub fn dedup_concepts(&mut self) {
        let mut seen = std::collections::HashSet::with_capacity(self.concepts.len());
        self.concepts.retain(|c| seen.insert(c.clone()));
    }

    /// Validate the embedding against the store's configured dimension.
    pub fn validate_embedding(&self, dimension: usize) -> Result<()> {
        if self.embedding.len() != dimension {
            return Err(Error::DimensionMismatch {
                expected: dimension,
                actual: self.embedding.len(),
            });
        }
        if self.embedding.iter().any(|v| !v.is_finite()) {
            return Err(Error::NonFiniteEmbedding);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_interaction_starts_short_term_with_defaults() {
        let i = Interaction::new("hi".into(), "hello".into(), vec![1.0, 0.0], 1_000);
        assert_eq!(i.memory_type, MemoryType::ShortTerm);
        assert_eq!(i.access_count, 1);
        assert_eq!(i.decay_factor, 1.0);
        assert_eq!(i.timestamp, 1_000);
    }

    #[test]
    fn dedup_concepts_preserves_first_seen_order() {
        let mut i = Interaction::new("p".into(), "o".into(), vec![], 0);
        i.concepts = vec!["a".into(), "b".into(), "a".into(), "c".into(), "b".into()];
        i.dedup_concepts();
        assert_eq!(i.concepts, vec!["a", "b", "c"]);
    }

    #[test]
    fn validate_embedding_rejects_wrong_length() {
        let i = Interaction::new("p".into(), "o".into(), vec![1.0, 2.0], 0);
        assert!(matches!(
            i.validate_embedding(3),
            Err(Error::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn validate_embedding_rejects_non_finite() {
        let i = Interaction::new("p".into(), "o".into(), vec![1.0, f64::NAN], 0);
        assert!(matches!(
            i.validate_embedding(2),
            Err(Error::NonFiniteEmbedding)
        ));
    }

    #[test]
    fn validate_embedding_accepts_conforming_vector() {
        let i = Interaction::new("p".into(), "o".into(), vec![1.0, 2.0, 3.0], 0);
        assert!(i.validate_embedding(3).is_ok());
    }
}
