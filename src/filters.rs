//! Deterministic, ordered post-processing of a ranked candidate list:
//! relevance filter, type filter, deduplication, context enrichment,
//! ranking, score normalization, and limiting.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::warn;

/// Attaches relationships/source-context/provenance to a record during
/// [`SearchFilters::run`]; failure is logged and leaves the fields unset.
pub type Enricher<'a, T> = dyn Fn(&T) -> anyhow::Result<(Option<Vec<String>>, Option<String>, Option<String>)> + 'a;

/// Wraps an arbitrary payload with the fields `SearchFilters` needs to reason
/// about it, decoupling the pipeline from any one result shape.
#[derive(Debug, Clone)]
pub struct FilterableRecord<T> {
    pub payload: T,
    pub score: Option<f64>,
    pub relevance: Option<f64>,
    pub similarity: Option<f64>,
    pub weight: Option<f64>,
    pub result_type: String,
    pub uri: String,
    pub content: String,
    pub relationships: Option<Vec<String>>,
    pub source_context: Option<String>,
    pub provenance: Option<String>,
    pub original_score: Option<f64>,
    pub normalized_score: Option<f64>,
}

impl<T> FilterableRecord<T> {
    #[must_use]
    pub fn new(payload: T, result_type: impl Into<String>, uri: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            payload,
            score: None,
            relevance: None,
            similarity: None,
            weight: None,
            result_type: result_type.into(),
            uri: uri.into(),
            content: content.into(),
            relationships: None,
            source_context: None,
            provenance: None,
            original_score: None,
            normalized_score: None,
        }
    }

    #[must_use]
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// First-available of `{score, relevance, similarity, weight}`, else 0.
    #[must_use]
    pub fn extracted_score(&self) -> f64 {
        self.score
            .or(self.relevance)
            .or(self.similarity)
            .or(self.weight)
            .unwrap_or(0.0)
    }
}

/// How duplicate records are detected and collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupStrategy {
    Uri,
    Content,
    Hybrid,
}

/// How the surviving records are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingStrategy {
    Weighted,
    Score,
    Type,
    Hybrid,
}

/// Optional score-normalization method, applied after ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizationMethod {
    MinMax,
    ZScore,
    Sigmoid,
}

/// Tunables for one `SearchFilters` pipeline run.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub threshold: f64,
    pub allowed_types: Vec<String>,
    pub dedup: DedupStrategy,
    pub content_similarity_threshold: f64,
    pub ranking: RankingStrategy,
    pub type_weights: HashMap<String, f64>,
    pub normalization: Option<NormalizationMethod>,
    pub max_results: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        let type_weights = [
            ("Entity", 1.0),
            ("Unit", 0.9),
            ("TextElement", 0.85),
            ("CommunityElement", 0.8),
            ("Attribute", 0.7),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            threshold: 0.7,
            allowed_types: vec![
                "Entity".into(),
                "Unit".into(),
                "TextElement".into(),
                "CommunityElement".into(),
                "Attribute".into(),
            ],
            dedup: DedupStrategy::Hybrid,
            content_similarity_threshold: 0.8,
            ranking: RankingStrategy::Weighted,
            type_weights,
            normalization: None,
            max_results: 50,
        }
    }
}

impl FilterConfig {
    /// A config specialized for a single-type record set, as `MemoryStore`
    /// feeds it interaction-backed results under a single synthetic type.
    #[must_use]
    pub fn for_single_type(type_name: impl Into<String>, threshold: f64) -> Self {
        let type_name = type_name.into();
        let mut type_weights = HashMap::new();
        type_weights.insert(type_name.clone(), 1.0);
        Self {
            threshold,
            allowed_types: vec![type_name],
            dedup: DedupStrategy::Content,
            content_similarity_threshold: 0.8,
            ranking: RankingStrategy::Score,
            type_weights,
            normalization: None,
            max_results: 50,
        }
    }
}

/// Running counters for one `SearchFilters` instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterStatistics {
    pub total_processed: u64,
    pub filtered: u64,
    pub deduplicated: u64,
    pub enriched: u64,
    pub ranked: u64,
}

fn type_weight(config: &FilterConfig, result_type: &str) -> f64 {
    config.type_weights.get(result_type).copied().unwrap_or(0.0)
}

fn content_tokens(content: &str) -> std::collections::HashSet<String> {
    content.to_lowercase().split_whitespace().map(str::to_string).collect()
}

fn jaccard(a: &std::collections::HashSet<String>, b: &std::collections::HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count().max(1);
    intersection as f64 / union as f64
}

/// The post-retrieval filter/rank/normalize pipeline.
pub struct SearchFilters {
    config: FilterConfig,
    stats: Mutex<FilterStatistics>,
}

impl SearchFilters {
    #[must_use]
    pub fn new(config: FilterConfig) -> Self {
        Self {
            config,
            stats: Mutex::new(FilterStatistics::default()),
        }
    }

    #[must_use]
    pub fn statistics(&self) -> FilterStatistics {
        *self.stats.lock().expect("filter statistics lock poisoned")
    }

    /// Run the full pipeline. `enrich` attempts to attach
    /// relationships/source-context/provenance to each surviving record;
    /// a failure there is logged and leaves the fields unset.
    pub fn run<T>(
        &self,
        records: Vec<FilterableRecord<T>>,
        enrich: Option<&Enricher<'_, T>>,
    ) -> Vec<FilterableRecord<T>> {
        let mut stats = self.stats.lock().expect("filter statistics lock poisoned");
        stats.total_processed += records.len() as u64;

        // 1. Relevance filter.
        let mut kept: Vec<FilterableRecord<T>> = records
            .into_iter()
            .filter(|r| r.extracted_score() >= self.config.threshold)
            .collect();
        stats.filtered += kept.len() as u64;

        // 2. Type filter.
        kept.retain(|r| self.config.allowed_types.iter().any(|t| t == &r.result_type));

        // 3. Deduplication.
        kept = self.dedup(kept, &mut stats);

        // 4. Context enrichment.
        if let Some(enrich) = enrich {
            for record in &mut kept {
                match enrich(&record.payload) {
                    Ok((relationships, source_context, provenance)) => {
                        record.relationships = relationships;
                        record.source_context = source_context;
                        record.provenance = provenance;
                        stats.enriched += 1;
                    }
                    Err(e) => {
                        warn!(error = %e, "context enrichment failed, leaving record unenriched");
                    }
                }
            }
        }

        // 5. Ranking.
        self.rank(&mut kept);
        stats.ranked += kept.len() as u64;

        // 6. Normalization.
        if let Some(method) = self.config.normalization {
            Self::normalize(&mut kept, method);
        }

        // 7. Limit.
        kept.truncate(self.config.max_results);
        kept
    }

    fn dedup<T>(&self, records: Vec<FilterableRecord<T>>, stats: &mut FilterStatistics) -> Vec<FilterableRecord<T>> {
        let before = records.len();
        let by_uri = matches!(self.config.dedup, DedupStrategy::Uri | DedupStrategy::Hybrid);
        let by_content = matches!(self.config.dedup, DedupStrategy::Content | DedupStrategy::Hybrid);

        let mut out = records;
        if by_uri {
            let mut seen = std::collections::HashSet::new();
            out.retain(|r| seen.insert(r.uri.clone()));
        }
        if by_content {
            let mut kept_tokens: Vec<std::collections::HashSet<String>> = Vec::new();
            out.retain(|r| {
                let tokens = content_tokens(&r.content);
                let is_dup = kept_tokens
                    .iter()
                    .any(|prior| jaccard(prior, &tokens) >= self.config.content_similarity_threshold);
                if is_dup {
                    false
                } else {
                    kept_tokens.push(tokens);
                    true
                }
            });
        }
        stats.deduplicated += (before - out.len()) as u64;
        out
    }

    fn rank<T>(&self, records: &mut [FilterableRecord<T>]) {
        let score_of = |r: &FilterableRecord<T>| -> f64 {
            let raw = r.extracted_score();
            match self.config.ranking {
                RankingStrategy::Weighted => raw * type_weight(&self.config, &r.result_type),
                RankingStrategy::Score => raw,
                RankingStrategy::Type => type_weight(&self.config, &r.result_type),
                RankingStrategy::Hybrid => 0.7 * raw + 0.3 * type_weight(&self.config, &r.result_type),
            }
        };
        records.sort_by(|a, b| {
            let ordering = score_of(b).partial_cmp(&score_of(a)).unwrap_or(std::cmp::Ordering::Equal);
            if self.config.ranking == RankingStrategy::Type {
                ordering.then_with(|| b.extracted_score().partial_cmp(&a.extracted_score()).unwrap_or(std::cmp::Ordering::Equal))
            } else {
                ordering
            }
        });
    }

    fn normalize<T>(records: &mut [FilterableRecord<T>], method: NormalizationMethod) {
        let scores: Vec<f64> = records.iter().map(FilterableRecord::extracted_score).collect();
        if scores.is_empty() {
            return;
        }
        match method {
            NormalizationMethod::MinMax => {
                let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
                let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let range = max - min;
                for (record, &score) in records.iter_mut().zip(&scores) {
                    record.original_score = Some(score);
                    record.normalized_score = Some(if range == 0.0 { 1.0 } else { (score - min) / range });
                }
            }
            NormalizationMethod::ZScore => {
                let mean = scores.iter().sum::<f64>() / scores.len() as f64;
                let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;
                let std_dev = variance.sqrt();
                for (record, &score) in records.iter_mut().zip(&scores) {
                    record.original_score = Some(score);
                    record.normalized_score = Some(if std_dev == 0.0 { 0.0 } else { (score - mean) / std_dev });
                }
            }
            NormalizationMethod::Sigmoid => {
                for (record, &score) in records.iter_mut().zip(&scores) {
                    record.original_score = Some(score);
                    record.normalized_score = Some(1.0 / (1.0 + (-score).exp()));
                }
            }
        }
    }
}
