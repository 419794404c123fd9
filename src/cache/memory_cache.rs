//! `MemoryCache`: in-memory mirror of the persisted corpus.

use uuid::Uuid;

use crate::types::{Interaction, MemoryType};

/// Index-aligned arrays over `short_term`, kept for ranking-loop cache
/// locality. Invalidated on any `short_term` mutation and
/// rematerialized lazily by `MemoryCache::ensure_materialized`.
#[derive(Debug, Default, Clone)]
struct ParallelArrays {
    embeddings: Vec<Vec<f64>>,
    timestamps: Vec<i64>,
    access_counts: Vec<u32>,
    concepts: Vec<Vec<String>>,
}

/// In-memory mirror and fast-path structures for the persisted corpus.
#[derive(Debug, Default)]
pub struct MemoryCache {
    short_term: Vec<Interaction>,
    long_term: Vec<Interaction>,
    parallel: Option<ParallelArrays>,
    loaded_at: Option<i64>,
    dirty: bool,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn short_term(&self) -> &[Interaction] {
        &self.short_term
    }

    #[must_use]
    pub fn long_term(&self) -> &[Interaction] {
        &self.long_term
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    #[must_use]
    pub fn loaded_at(&self) -> Option<i64> {
        self.loaded_at
    }

    /// Replace both lists wholesale, as `loadHistory` does after parsing the
    /// persisted graph.
    pub fn replace_all(&mut self, short_term: Vec<Interaction>, long_term: Vec<Interaction>, now_millis: i64) {
        self.short_term = short_term;
        self.long_term = long_term;
        self.parallel = None;
        self.loaded_at = Some(now_millis);
        self.dirty = false;
    }

    /// Append a freshly stored interaction to `short_term`.
    pub fn push_short_term(&mut self, interaction: Interaction) {
        self.short_term.push(interaction);
        self.parallel = None;
        self.dirty = true;
    }

    /// Remove the appended interaction again (used to roll back a failed
    /// persist).
    pub fn pop_short_term(&mut self) {
        self.short_term.pop();
        self.parallel = None;
        self.dirty = true;
    }

    /// Find an interaction by id in either list.
    #[must_use]
    pub fn find(&self, id: Uuid) -> Option<&Interaction> {
        self.short_term
            .iter()
            .chain(self.long_term.iter())
            .find(|i| i.id == id)
    }

    /// Mutate every short-term interaction in place via `f`, applying
    /// classification transitions afterward.
    pub fn classify_and_decay(&mut self, mut f: impl FnMut(&mut Interaction) -> bool) {
        let mut promoted = Vec::new();
        self.short_term.retain_mut(|interaction| {
            let demote = f(interaction);
            if demote {
                promoted.push(interaction.clone());
                false
            } else {
                true
            }
        });
        for mut interaction in promoted {
            interaction.memory_type = MemoryType::LongTerm;
            self.long_term.push(interaction);
        }
        self.parallel = None;
        self.dirty = true;
    }

    /// Increment `access_count` (and bump `decay_factor` to 1.0 once it
    /// crosses the pin threshold) for an interaction found by id, wherever it
    /// lives. Read operations defer this write to the next `save`.
    pub fn record_access(&mut self, id: Uuid) {
        if let Some(interaction) = self.short_term.iter_mut().find(|i| i.id == id) {
            interaction.access_count += 1;
            self.parallel = None;
            return;
        }
        if let Some(interaction) = self.long_term.iter_mut().find(|i| i.id == id) {
            interaction.access_count += 1;
        }
    }

    fn ensure_materialized(&mut self) {
        if self.parallel.is_some() {
            return;
        }
        let mut arrays = ParallelArrays::default();
        for interaction in &self.short_term {
            arrays.embeddings.push(interaction.embedding.clone());
            arrays.timestamps.push(interaction.timestamp);
            arrays.access_counts.push(interaction.access_count);
            arrays.concepts.push(interaction.concepts.clone());
        }
        self.parallel = Some(arrays);
    }

    #[must_use]
    pub fn embeddings(&mut self) -> &[Vec<f64>] {
        self.ensure_materialized();
        &self.parallel.as_ref().unwrap().embeddings
    }

    #[must_use]
    pub fn timestamps(&mut self) -> &[i64] {
        self.ensure_materialized();
        &self.parallel.as_ref().unwrap().timestamps
    }

    #[must_use]
    pub fn access_counts(&mut self) -> &[u32] {
        self.ensure_materialized();
        &self.parallel.as_ref().unwrap().access_counts
    }

    /// Shift every short-term timestamp backward by `delta_millis`, for
    /// exercising age-dependent decay without a real clock.
    #[cfg(any(test, feature = "test-support"))]
    pub fn rewind_short_term(&mut self, delta_millis: i64) {
        for interaction in &mut self.short_term {
            interaction.timestamp -= delta_millis;
        }
        self.parallel = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(now: i64) -> Interaction {
        Interaction::new("p".into(), "o".into(), vec![1.0, 0.0], now)
    }

    #[test]
    fn push_invalidates_parallel_arrays() {
        let mut cache = MemoryCache::new();
        cache.push_short_term(sample(0));
        assert_eq!(cache.embeddings().len(), 1);
        cache.push_short_term(sample(1));
        assert_eq!(cache.embeddings().len(), 2);
    }

    #[test]
    fn pop_short_term_undoes_the_last_push() {
        let mut cache = MemoryCache::new();
        cache.push_short_term(sample(0));
        cache.pop_short_term();
        assert!(cache.short_term().is_empty());
    }

    #[test]
    fn classify_and_decay_moves_matching_interactions_to_long_term() {
        let mut cache = MemoryCache::new();
        cache.push_short_term(sample(0));
        cache.push_short_term(sample(1));
        cache.classify_and_decay(|interaction| interaction.timestamp == 0);
        assert_eq!(cache.short_term().len(), 1);
        assert_eq!(cache.long_term().len(), 1);
        assert_eq!(cache.long_term()[0].memory_type, MemoryType::LongTerm);
    }

    #[test]
    fn record_access_increments_count_in_either_list() {
        let mut cache = MemoryCache::new();
        let interaction = sample(0);
        let id = interaction.id;
        cache.push_short_term(interaction);
        cache.record_access(id);
        assert_eq!(cache.short_term()[0].access_count, 2);
    }

    #[test]
    fn replace_all_sets_loaded_at_and_clears_dirty() {
        let mut cache = MemoryCache::new();
        cache.push_short_term(sample(0));
        cache.replace_all(vec![sample(5)], vec![], 123);
        assert_eq!(cache.loaded_at(), Some(123));
        assert!(!cache.is_dirty());
    }
}
