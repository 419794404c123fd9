//! A transactional, graph-backed semantic memory store.
//!
//! Persists prompt/response interactions together with their embeddings and
//! extracted concepts, makes them retrievable by vector similarity and
//! conceptual association, and classifies them along a short-term/long-term
//! axis with time-based decay. State is persisted as RDF triples over a
//! remote SPARQL 1.1 endpoint, with graph-level transactions implemented via
//! `COPY`/`DROP`/`MOVE`.
//!
//! The [`MemoryStore`] facade composes the sub-components: [`SparqlExecutor`]
//! for persistence, [`VectorIndex`] for nearest-neighbor search,
//! [`ConceptGraph`] for spreading activation, and [`MemoryCache`] for the
//! in-memory mirror and query-result cache. [`RetrievalEngine`] ranks
//! candidates and [`SearchFilters`] post-processes the ranked list.

pub mod cache;
pub mod collaborators;
pub mod concepts;
pub mod config;
pub mod error;
pub mod filters;
pub mod logging;
pub mod retrieval;
mod store;
pub mod sparql;
pub mod types;
pub mod vector;

pub use cache::{CacheKey, CacheMetrics, MemoryCache, QueryCache};
pub use collaborators::{ConceptExtractor, EmbeddingProducer};
pub use concepts::ConceptGraph;
pub use config::{SparqlEndpointConfig, StoreConfig};
pub use error::{Error, Result};
pub use filters::{DedupStrategy, FilterConfig, NormalizationMethod, RankingStrategy, SearchFilters};
pub use logging::init_tracing;
pub use retrieval::{RetrievalEngine, RetrievalWeights};
pub use sparql::{SparqlExecutor, TransactionState};
pub use store::MemoryStore;
pub use types::{Concept, ConceptEdge, Interaction, MemoryType, SearchResult};
pub use vector::{RebuildStats, VectorIndex};
