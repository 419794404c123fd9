//! `loadHistory` and `saveMemoryToHistory`: the boundary between the
//! in-memory state and the persisted SPARQL graph.

use tracing::{error, warn};

use crate::error::Result;
use crate::sparql::vocabulary::{
    build_clear_concept_edges_update, build_clear_update, build_concept_edges_update, build_insert_update,
    RawInteractionRow,
};
use crate::types::{Interaction, MemoryType};

use super::{now_millis, CoreState, MemoryStore};

const SELECT_ALL_INTERACTIONS_TEMPLATE: &str = r"PREFIX semem: <http://purl.org/stuff/semem/>
SELECT ?id ?prompt ?output ?embedding ?timestamp ?accessCount ?concepts ?decayFactor ?memoryType
WHERE {{
  GRAPH <{graph}> {{
    ?s a semem:Interaction ;
       semem:id ?id ;
       semem:prompt ?prompt ;
       semem:output ?output ;
       semem:embedding ?embedding ;
       semem:timestamp ?timestamp ;
       semem:accessCount ?accessCount ;
       semem:concepts ?concepts ;
       semem:decayFactor ?decayFactor ;
       semem:memoryType ?memoryType .
  }}
}}";

fn row_to_interaction(row: &RawInteractionRow, dimension: usize) -> Interaction {
    let id = row
        .id
        .as_deref()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(uuid::Uuid::new_v4);

    let embedding = row
        .embedding_json
        .as_deref()
        .and_then(|s| serde_json::from_str::<Vec<f64>>(s).ok())
        .filter(|v| v.len() == dimension && v.iter().all(|x| x.is_finite()))
        .unwrap_or_else(|| {
            warn!(id = %id, "malformed embedding in persisted interaction, substituting zero vector");
            vec![0.0; dimension]
        });

    let concepts = row
        .concepts_json
        .as_deref()
        .and_then(|s| serde_json::from_str::<Vec<String>>(s).ok())
        .unwrap_or_else(|| {
            warn!(id = %id, "malformed concepts in persisted interaction, substituting empty list");
            Vec::new()
        });

    let memory_type = match row.memory_type.as_deref() {
        Some("long-term") => MemoryType::LongTerm,
        _ => MemoryType::ShortTerm,
    };

    Interaction {
        id,
        prompt: row.prompt.clone().unwrap_or_default(),
        output: row.output.clone().unwrap_or_default(),
        embedding,
        concepts,
        timestamp: row.timestamp.unwrap_or(0),
        access_count: row.access_count.unwrap_or(0),
        decay_factor: row.decay_factor.unwrap_or(1.0),
        memory_type,
    }
}

impl MemoryStore {
    /// Read every persisted `Interaction` back from the graph, populate the
    /// in-memory cache, and rebuild the vector index and concept graph from
    /// it. Rows with malformed embeddings or concepts are kept (with the
    /// affected field replaced) rather than dropped.
    pub async fn load_history(&self) -> Result<()> {
        let _writer = self.write_gate.lock().await;

        let graph = self.executor.graph_name().to_string();
        let query = SELECT_ALL_INTERACTIONS_TEMPLATE.replace("{graph}", &graph);
        let bindings = self.executor.select(&query).await?;

        let mut short_term = Vec::new();
        let mut long_term = Vec::new();
        for binding in &bindings.bindings {
            let row = RawInteractionRow {
                id: binding.get("id").cloned(),
                prompt: binding.get("prompt").cloned(),
                output: binding.get("output").cloned(),
                embedding_json: binding.get("embedding").cloned(),
                timestamp: binding.get("timestamp").and_then(|v| v.parse().ok()),
                access_count: binding.get("accessCount").and_then(|v| v.parse().ok()),
                concepts_json: binding.get("concepts").cloned(),
                decay_factor: binding.get("decayFactor").and_then(|v| v.parse().ok()),
                memory_type: binding.get("memoryType").cloned(),
            };
            let interaction = row_to_interaction(&row, self.dimension());
            match interaction.memory_type {
                MemoryType::ShortTerm => short_term.push(interaction),
                MemoryType::LongTerm => long_term.push(interaction),
            }
        }

        let mut state = self.state.write().await;
        state.cache.replace_all(short_term, long_term, now_millis());
        Self::rebuild_indexes(&mut state);
        Ok(())
    }

    /// `verifyGraph` → `beginTransaction` → clear prior triples → insert the
    /// full corpus → `commitTransaction`, rolling back on any failure.
    pub(crate) async fn save_memory_to_history(&self, state: &CoreState) -> Result<()> {
        self.executor.verify_graph().await?;
        self.executor.begin_transaction().await?;

        let graph = self.executor.graph_name().to_string();
        let result = self.persist_corpus(state, &graph).await;
        match result {
            Ok(()) => {
                self.executor.commit_transaction().await?;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "persisting memory corpus failed, rolling back");
                self.executor.rollback_transaction().await?;
                Err(e)
            }
        }
    }

    /// Persist the `Interaction` corpus plus the concept graph's co-occurrence
    /// edges, materialized as `ragno:connectsTo` triples per spec §6.1.
    async fn persist_corpus(&self, state: &CoreState, graph: &str) -> Result<()> {
        self.executor.update(&build_clear_update(graph)).await?;
        let all: Vec<&Interaction> = state.cache.short_term().iter().chain(state.cache.long_term()).collect();
        if !all.is_empty() {
            self.executor.update(&build_insert_update(&all, graph)).await?;
        }

        self.executor.update(&build_clear_concept_edges_update(graph)).await?;
        let edges = state.concept_graph.edges();
        if let Some(update) = build_concept_edges_update(&edges, graph) {
            self.executor.update(&update).await?;
        }
        Ok(())
    }
}
