//! `MemoryStore`: the public facade composing the SPARQL executor, vector
//! index, concept graph, and in-memory cache into one coherent unit.

mod classify;
mod persistence;

use std::collections::HashMap;
use std::sync::atomic::AtomicI64;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};

use crate::cache::{CacheKey, MemoryCache, QueryCache};
use crate::collaborators::{ConceptExtractor, EmbeddingProducer};
use crate::concepts::ConceptGraph;
use crate::config::{SparqlEndpointConfig, StoreConfig};
use crate::error::{Error, Result};
use crate::filters::{FilterConfig, FilterableRecord, SearchFilters};
use crate::retrieval::RetrievalEngine;
use crate::sparql::SparqlExecutor;
use crate::types::{Concept, Interaction, SearchResult};
use crate::vector::VectorIndex;

/// Everything a reader needs a consistent snapshot of; mutated only while
/// holding `MemoryStore::write_gate` and `MemoryStore::state`'s write lock.
pub(crate) struct CoreState {
    pub(crate) cache: MemoryCache,
    pub(crate) vector_index: VectorIndex,
    pub(crate) concept_graph: ConceptGraph,
}

/// Default candidate-pool size fed into `SearchFilters` when the caller
/// doesn't otherwise bound it; mirrors `FilterConfig::default().max_results`.
const DEFAULT_RETRIEVE_LIMIT: usize = 50;

pub struct MemoryStore {
    config: StoreConfig,
    executor: SparqlExecutor,
    embedding_producer: Arc<dyn EmbeddingProducer>,
    concept_extractor: Arc<dyn ConceptExtractor>,
    state: RwLock<CoreState>,
    query_cache: QueryCache,
    retrieval: RetrievalEngine,
    write_gate: Mutex<()>,
    last_classified_at_millis: AtomicI64,
}

pub(crate) fn now_millis() -> i64 {
    i64::try_from(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system clock before the Unix epoch")
            .as_millis(),
    )
    .expect("current time overflows i64 milliseconds")
}

impl MemoryStore {
    pub fn new(
        config: StoreConfig,
        endpoint: SparqlEndpointConfig,
        embedding_producer: Arc<dyn EmbeddingProducer>,
        concept_extractor: Arc<dyn ConceptExtractor>,
    ) -> Result<Self> {
        config.validate()?;
        endpoint.validate()?;
        let timeout = Duration::from_millis(config.timeout_ms);
        Ok(Self {
            executor: SparqlExecutor::new(endpoint, timeout),
            query_cache: QueryCache::new(config.max_cache_size, Duration::from_millis(config.cache_timeout_ms)),
            retrieval: RetrievalEngine::default(),
            state: RwLock::new(CoreState {
                cache: MemoryCache::new(),
                vector_index: VectorIndex::new(config.dimension),
                concept_graph: ConceptGraph::new(),
            }),
            write_gate: Mutex::new(()),
            last_classified_at_millis: AtomicI64::new(i64::MIN),
            config,
            embedding_producer,
            concept_extractor,
        })
    }

    /// Recompute `vector_index`/`concept_graph` from `cache`'s current
    /// contents. Used after `loadHistory` and to restore consistency when a
    /// write must be rolled back.
    pub(crate) fn rebuild_indexes(state: &mut CoreState) {
        let embeddings: Vec<Vec<f64>> = state.cache.short_term().iter().map(|i| i.embedding.clone()).collect();
        let (rebuild_stats, _) = state.vector_index.rebuild(&embeddings);
        if rebuild_stats.skipped > 0 {
            tracing::warn!(skipped = rebuild_stats.skipped, "skipped malformed embeddings while rebuilding vector index");
        }
        state.concept_graph = ConceptGraph::new();
        for interaction in state.cache.short_term().iter().chain(state.cache.long_term()) {
            state.concept_graph.add_concepts(&interaction.concepts);
        }
    }

    /// Append a new prompt/response pair: embed and extract concepts if not
    /// supplied, validate, append to every in-memory structure, and persist.
    /// On persistence failure the in-memory append is undone and the error
    /// is returned.
    pub async fn store(
        &self,
        prompt: String,
        output: String,
        embedding: Option<Vec<f64>>,
        concepts: Option<Vec<String>>,
    ) -> Result<Interaction> {
        let _writer = self.write_gate.lock().await;

        let text = format!("{prompt} {output}");
        let embedding = match embedding {
            Some(e) => e,
            None => self
                .embedding_producer
                .embed(&text)
                .await
                .map_err(|e| Error::Network(e.to_string()))?,
        };
        let concepts = match concepts {
            Some(c) => c,
            None => self
                .concept_extractor
                .extract(&text)
                .await
                .map_err(|e| Error::Network(e.to_string()))?,
        };

        let mut interaction = Interaction::new(prompt, output, embedding, now_millis());
        interaction.concepts = concepts;
        interaction.dedup_concepts();
        interaction.concepts.truncate(self.config.max_concepts_per_interaction);
        interaction.validate_embedding(self.config.dimension)?;

        let mut state = self.state.write().await;
        state.cache.push_short_term(interaction.clone());
        state.vector_index.add(interaction.embedding.clone())?;
        state.concept_graph.add_concepts(&interaction.concepts);

        if let Err(e) = self.save_memory_to_history(&state).await {
            state.cache.pop_short_term();
            Self::rebuild_indexes(&mut state);
            return Err(e);
        }
        drop(state);
        self.query_cache.invalidate_all();
        Ok(interaction)
    }

    /// Produce a ranked, filtered result list for a query.
    ///
    /// `threshold` values greater than 1 are treated as percentages
    /// (divided by 100) before being applied.
    pub async fn retrieve(
        &self,
        query_embedding: Vec<f64>,
        query_concepts: Vec<String>,
        threshold: f64,
        exclude_last_n: usize,
    ) -> Result<Vec<SearchResult>> {
        let threshold = if threshold > 1.0 { threshold / 100.0 } else { threshold };
        let cache_key = CacheKey::new(&query_embedding, &query_concepts, threshold, exclude_last_n);
        if let Some(cached) = self.query_cache.get(&cache_key) {
            return Ok(cached);
        }

        // Concept views (degree + co-occurrence weights) for every concept
        // touched by the candidate set, captured alongside the candidates
        // while the read lock is held so the later enrichment step doesn't
        // need to reacquire it.
        let (candidates, concept_views) = {
            let state = self.state.read().await;
            let candidates = self.retrieval.retrieve(
                &query_embedding,
                &query_concepts,
                state.cache.short_term(),
                &state.vector_index,
                &state.concept_graph,
                DEFAULT_RETRIEVE_LIMIT,
                threshold,
                exclude_last_n,
            )?;
            let mut concept_views: HashMap<String, Concept> = HashMap::new();
            for candidate in &candidates {
                for concept in &candidate.interaction.concepts {
                    if !concept_views.contains_key(concept) {
                        if let Some(view) = state.concept_graph.concept(concept) {
                            concept_views.insert(concept.clone(), view);
                        }
                    }
                }
            }
            (candidates, concept_views)
        };

        if !candidates.is_empty() {
            let mut state = self.state.write().await;
            for candidate in &candidates {
                state.cache.record_access(candidate.interaction.id);
            }
        }

        let records: Vec<FilterableRecord<SearchResult>> = candidates
            .into_iter()
            .map(|result| {
                let uri = result.interaction.id.to_string();
                let content = format!("{} {}", result.interaction.prompt, result.interaction.output);
                let score = result.final_score;
                FilterableRecord::new(result, "Interaction", uri, content).with_score(score)
            })
            .collect();

        // Context enrichment (spec §4.7 step 4): attach each result's concept
        // co-occurrence relationships, read from the concept views captured
        // above. A concept absent from the graph just yields no relationships
        // for that candidate, never an error.
        let enrich = |result: &SearchResult| {
            let mut relationships = Vec::new();
            for concept in &result.interaction.concepts {
                if let Some(view) = concept_views.get(concept) {
                    for (neighbor, weight) in &view.co_occurrence_weights {
                        relationships.push(format!("{concept} -> {neighbor} ({weight})"));
                    }
                }
            }
            Ok((if relationships.is_empty() { None } else { Some(relationships) }, None, None))
        };

        let filters = SearchFilters::new(FilterConfig::for_single_type("Interaction", threshold));
        let filtered = filters.run(records, Some(&enrich));

        let results: Vec<SearchResult> = filtered
            .into_iter()
            .map(|record| {
                let mut result = record.payload;
                result.original_score = record.original_score;
                result.normalized_score = record.normalized_score;
                result.relationships = record.relationships;
                result.source_context = record.source_context;
                result.provenance = record.provenance;
                result
            })
            .collect();

        self.query_cache.put(&cache_key, results.clone());
        Ok(results)
    }

    pub async fn is_in_transaction(&self) -> bool {
        self.executor.is_in_transaction().await
    }

    pub async fn dispose(&self) {
        self.executor.dispose().await;
    }

    pub(crate) fn dimension(&self) -> usize {
        self.config.dimension
    }

    /// Rewind every short-term interaction's timestamp by `delta_millis`, for
    /// exercising age-dependent decay without a real clock.
    #[cfg(any(test, feature = "test-support"))]
    #[allow(clippy::cast_possible_truncation)]
    pub async fn backdate_short_term_for_test(&self, delta_millis: f64) {
        let mut state = self.state.write().await;
        state.cache.rewind_short_term(delta_millis.round() as i64);
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").field("config", &self.config).finish_non_exhaustive()
    }
}
