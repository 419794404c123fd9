//! `RetrievalEngine`: cosine similarity + concept overlap + access-frequency
//! boost + temporal decay + spreading-activation overlay.

use crate::concepts::ConceptGraph;
use crate::error::Result;
use crate::types::{Interaction, SearchResult};
use crate::vector::VectorIndex;

/// Weights applied to the four scoring signals; must sum to ~1.0.
///
/// Grounded on `do-memory-core`'s `search/ranking.rs` `RankingWeights`
/// pattern (a plain struct with a `validate()` sum check).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalWeights {
    pub similarity: f64,
    pub concept_overlap: f64,
    pub activation: f64,
    pub frequency: f64,
}

impl Default for RetrievalWeights {
    fn default() -> Self {
        Self {
            similarity: 0.55,
            concept_overlap: 0.20,
            activation: 0.15,
            frequency: 0.10,
        }
    }
}

impl RetrievalWeights {
    pub fn validate(&self) -> std::result::Result<(), String> {
        let sum = self.similarity + self.concept_overlap + self.activation + self.frequency;
        if (sum - 1.0).abs() > 0.01 {
            return Err(format!("retrieval weights should sum to 1.0, got {sum}"));
        }
        Ok(())
    }
}

/// Jaccard-like overlap between two concept sets.
fn concept_overlap(query_concepts: &[String], interaction_concepts: &[String]) -> f64 {
    if query_concepts.is_empty() && interaction_concepts.is_empty() {
        return 0.0;
    }
    let query: std::collections::HashSet<&String> = query_concepts.iter().collect();
    let other: std::collections::HashSet<&String> = interaction_concepts.iter().collect();
    let intersection = query.intersection(&other).count();
    let union = query.union(&other).count().max(1);
    intersection as f64 / union as f64
}

fn activation_boost(activation: &std::collections::HashMap<String, f64>, concepts: &[String]) -> f64 {
    if concepts.is_empty() {
        return 0.0;
    }
    let sum: f64 = concepts.iter().map(|c| activation.get(c).copied().unwrap_or(0.0)).sum();
    sum / concepts.len() as f64
}

fn frequency_boost(access_count: u32, max_access_count: u32) -> f64 {
    if max_access_count == 0 {
        return 0.0;
    }
    let denom = (1.0 + f64::from(max_access_count)).ln();
    if denom == 0.0 {
        return 0.0;
    }
    (1.0 + f64::from(access_count)).ln() / denom
}

/// The similarity + concept-spreading retrieval algorithm.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetrievalEngine {
    pub weights: RetrievalWeights,
}

impl RetrievalEngine {
    #[must_use]
    pub fn new(weights: RetrievalWeights) -> Self {
        Self { weights }
    }

    /// Produce a ranked candidate list over `short_term`, given the current
    /// `vector_index` (slot-aligned with `short_term` by insertion order) and
    /// `concept_graph`.
    ///
    /// `threshold` and `exclude_last_n` apply here (not deferred to
    /// `SearchFilters`) because they are cheap to apply against the raw
    /// candidate pool and are parameters of retrieval itself, not the
    /// downstream filter pipeline.
    #[allow(clippy::too_many_arguments)]
    pub fn retrieve(
        &self,
        query_embedding: &[f64],
        query_concepts: &[String],
        short_term: &[Interaction],
        vector_index: &VectorIndex,
        concept_graph: &ConceptGraph,
        limit: usize,
        threshold: f64,
        exclude_last_n: usize,
    ) -> Result<Vec<SearchResult>> {
        if short_term.is_empty() {
            return Ok(Vec::new());
        }

        let k = (3 * limit.max(1)).max(30);
        let candidates = vector_index.search(query_embedding, k)?;

        let activation = if query_concepts.is_empty() {
            std::collections::HashMap::new()
        } else {
            concept_graph.spread(query_concepts, 2, 0.5)
        };

        let excluded_from = short_term.len().saturating_sub(exclude_last_n);

        let max_access_count = candidates
            .iter()
            .filter(|(slot, _)| *slot < short_term.len())
            .map(|(slot, _)| short_term[*slot].access_count)
            .max()
            .unwrap_or(0);

        let mut results: Vec<SearchResult> = candidates
            .into_iter()
            .filter(|(slot, _)| *slot < excluded_from)
            .filter_map(|(slot, cosine)| {
                let interaction = &short_term[slot];
                let sim = cosine.max(0.0);
                let overlap = concept_overlap(query_concepts, &interaction.concepts);
                let boost = activation_boost(&activation, &interaction.concepts);
                let freq = frequency_boost(interaction.access_count, max_access_count);
                let final_score = interaction.decay_factor
                    * (self.weights.similarity * sim
                        + self.weights.concept_overlap * overlap
                        + self.weights.activation * boost
                        + self.weights.frequency * freq);
                if final_score < threshold {
                    return None;
                }
                Some(SearchResult::new(interaction.clone(), sim, overlap, boost, final_score))
            })
            .collect();

        results.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| b.interaction.timestamp.cmp(&a.interaction.timestamp))
                .then_with(|| a.interaction.id.cmp(&b.interaction.id))
        });

        Ok(results)
    }
}
