//! The `SearchResult` entity.

use super::Interaction;

/// A single ranked retrieval record produced by the `RetrievalEngine`
/// and consumed by `SearchFilters`.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub interaction: Interaction,
    /// Cosine similarity vs. the query embedding, clipped to `[0, 1]`.
    pub similarity: f64,
    /// Jaccard-like concept overlap, in `[0, 1]`.
    pub concept_overlap: f64,
    /// Spreading-activation contribution, in `[0, 1]`.
    pub activation_boost: f64,
    /// Combined weighted score.
    pub final_score: f64,
    /// Score attached to the result before any `SearchFilters` normalization step;
    /// preserved alongside `normalized_score`.
    pub original_score: Option<f64>,
    pub normalized_score: Option<f64>,
    /// Context-enrichment fields attached by `SearchFilters`'s enrichment step
    /// (spec §4.7 step 4); absent when enrichment found nothing or wasn't run.
    pub relationships: Option<Vec<String>>,
    pub source_context: Option<String>,
    pub provenance: Option<String>,
}

impl SearchResult {
    #[must_use]
    pub fn new(interaction: Interaction, similarity: f64, concept_overlap: f64, activation_boost: f64, final_score: f64) -> Self {
        Self {
            interaction,
            similarity,
            concept_overlap,
            activation_boost,
            final_score,
            original_score: None,
            normalized_score: None,
            relationships: None,
            source_context: None,
            provenance: None,
        }
    }

    /// The raw ranking score, collapsed to a single field once the engine has run.
    #[must_use]
    pub fn score(&self) -> f64 {
        self.final_score
    }
}
