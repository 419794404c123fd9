//! External collaborator contracts.
//!
//! The core never interprets model semantics; it only requires that
//! implementations honor the contracts below. Concrete LLM/embedding adapters
//! live in the wiring layer that constructs a `MemoryStore`.

use async_trait::async_trait;

/// Produces a fixed-dimension embedding vector for a piece of text.
///
/// Implementations must return a vector whose length equals the store's
/// configured `dimension` with every component finite; `MemoryStore::store`
/// re-validates this and fails with `DimensionMismatch`/`NonFiniteEmbedding`
/// rather than trusting the producer.
#[async_trait]
pub trait EmbeddingProducer: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f64>>;
}

/// Extracts concept labels from a piece of text.
///
/// Implementations should return de-duplicated, trimmed, non-empty strings;
/// an empty result is valid.
#[async_trait]
pub trait ConceptExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> anyhow::Result<Vec<String>>;
}

/// Test/demo collaborators, grounded on `do-memory-core`'s
/// `embeddings/mock_model.rs`.
#[cfg(any(test, feature = "test-support"))]
pub mod mock {
    use super::{ConceptExtractor, EmbeddingProducer};
    use async_trait::async_trait;

    /// Deterministic fixed-dimension embedding producer for tests: hashes the
    /// input text into a repeatable pseudo-embedding.
    pub struct MockEmbeddingProducer {
        pub dimension: usize,
    }

    #[async_trait]
    impl EmbeddingProducer for MockEmbeddingProducer {
        async fn embed(&self, text: &str) -> anyhow::Result<Vec<f64>> {
            let mut seed: u64 = 1_469_598_103_934_665_603;
            for byte in text.bytes() {
                seed ^= u64::from(byte);
                seed = seed.wrapping_mul(1_099_511_628_211);
            }
            let mut v = Vec::with_capacity(self.dimension);
            let mut state = seed;
            for _ in 0..self.dimension {
                state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
                let component = ((state >> 11) as f64 / (1u64 << 53) as f64) * 2.0 - 1.0;
                v.push(component);
            }
            Ok(v)
        }
    }

    /// Splits on whitespace and keeps unique lowercase tokens longer than 3 chars.
    pub struct MockConceptExtractor;

    #[async_trait]
    impl ConceptExtractor for MockConceptExtractor {
        async fn extract(&self, text: &str) -> anyhow::Result<Vec<String>> {
            let mut seen = std::collections::HashSet::new();
            let mut concepts = Vec::new();
            for word in text.split_whitespace() {
                let token: String = word
                    .chars()
                    .filter(|c| c.is_alphanumeric())
                    .collect::<String>()
                    .to_lowercase();
                if token.len() > 3 && seen.insert(token.clone()) {
                    concepts.push(token);
                }
            }
            Ok(concepts)
        }
    }
}
