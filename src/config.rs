//! Store configuration.

use crate::error::{Error, Result};

/// Endpoint + auth details for the backing SPARQL store.
#[derive(Debug, Clone)]
pub struct SparqlEndpointConfig {
    /// SPARQL 1.1 SELECT endpoint.
    pub query_url: String,
    /// SPARQL 1.1 UPDATE endpoint.
    pub update_url: String,
    /// HTTP Basic auth username, if the endpoint requires it.
    pub user: Option<String>,
    /// HTTP Basic auth password, if the endpoint requires it.
    pub password: Option<String>,
    /// Named graph IRI interactions are persisted into.
    pub graph_name: String,
}

/// Tunables for `MemoryStore` and its sub-components.
///
/// All fields have sensible defaults; `validate()` enforces the required
/// fields (`dimension`, `graph_name`) are non-degenerate.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Embedding vector length. Required, must be positive.
    pub dimension: usize,
    /// TTL for cached query results, in milliseconds.
    pub cache_timeout_ms: u64,
    /// Maximum number of entries retained in the query cache.
    pub max_cache_size: usize,
    /// Soft cap on concepts recorded per interaction.
    pub max_concepts_per_interaction: usize,
    /// Soft cap on edges retained per concept node.
    pub max_connections_per_entity: usize,
    /// Retry budget left to the caller's policy; the executor itself never retries.
    pub max_retries: u32,
    /// Per-SPARQL-request deadline, in milliseconds.
    pub timeout_ms: u64,
    /// Exponential decay rate applied to `decayFactor`, per hour of age.
    pub decay_lambda_per_hour: f64,
    /// Access-count threshold at which an interaction is pinned (`decayFactor` reset to 1.0).
    pub short_term_promotion_access_count: u32,
    /// `decayFactor` threshold below which a low-access interaction is demoted to long-term.
    pub long_term_demotion_decay: f64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dimension: 0,
            cache_timeout_ms: 300_000,
            max_cache_size: 1000,
            max_concepts_per_interaction: 10,
            max_connections_per_entity: 100,
            max_retries: 3,
            timeout_ms: 30_000,
            decay_lambda_per_hour: 0.01,
            short_term_promotion_access_count: 10,
            long_term_demotion_decay: 0.5,
        }
    }
}

impl StoreConfig {
    /// Build a config with the required fields set and all else defaulted.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ..Default::default()
        }
    }

    /// Validate the required invariants, returning `ConfigError` on failure.
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(Error::Config("dimension must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.long_term_demotion_decay) {
            return Err(Error::Config(
                "long_term_demotion_decay must be within [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

impl SparqlEndpointConfig {
    pub fn validate(&self) -> Result<()> {
        if self.graph_name.trim().is_empty() {
            return Err(Error::Config("graph_name must not be empty".into()));
        }
        if self.query_url.trim().is_empty() || self.update_url.trim().is_empty() {
            return Err(Error::Config(
                "query_url and update_url must both be set".into(),
            ));
        }
        Ok(())
    }
}
