//! RDF vocabulary and triple (de)serialization for persisted interactions.

use std::fmt::Write as _;

use crate::types::{ConceptEdge, Interaction, MemoryType};

/// URL-encode a concept label into the local part of a `ragno:` concept-unit
/// URI, per spec §6.1: "URI derived by URL-encoding the concept label."
/// Implemented directly (percent-encoding only the handful of characters that
/// would otherwise break a SPARQL IRIREF) rather than pulling in a URL crate,
/// since the input is always a short, already-trimmed concept label.
#[must_use]
pub fn concept_uri(label: &str) -> String {
    let mut out = String::from("http://purl.org/stuff/ragno/concept/");
    for byte in label.as_bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(*byte as char);
            }
            _ => {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
    out
}

/// Escape a string literal per SPARQL rules: `\` first, then `"`, then newline.
#[must_use]
pub fn escape_literal(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn memory_type_literal(memory_type: MemoryType) -> &'static str {
    match memory_type {
        MemoryType::ShortTerm => "short-term",
        MemoryType::LongTerm => "long-term",
    }
}

/// Render one interaction as a SPARQL `INSERT DATA` triple block, using a
/// blank node local to the block (`_:i<n>`).
#[must_use]
pub fn interaction_to_triples(interaction: &Interaction, graph: &str, blank_node: &str) -> String {
    let embedding_json = serde_json::to_string(&interaction.embedding).unwrap_or_default();
    let concepts_json = serde_json::to_string(&interaction.concepts).unwrap_or_default();

    format!(
        r#"GRAPH <{graph}> {{
  {blank_node} a semem:Interaction ;
    semem:id          "{id}" ;
    semem:prompt       "{prompt}" ;
    semem:output       "{output}" ;
    semem:embedding    "{embedding}" ;
    semem:timestamp    "{timestamp}"^^xsd:integer ;
    semem:accessCount   "{access_count}"^^xsd:integer ;
    semem:concepts      "{concepts}" ;
    semem:decayFactor  "{decay_factor}"^^xsd:decimal ;
    semem:memoryType    "{memory_type}" .
}}"#,
        graph = graph,
        blank_node = blank_node,
        id = interaction.id,
        prompt = escape_literal(&interaction.prompt),
        output = escape_literal(&interaction.output),
        embedding = escape_literal(&embedding_json),
        timestamp = interaction.timestamp,
        access_count = interaction.access_count,
        concepts = escape_literal(&concepts_json),
        decay_factor = interaction.decay_factor,
        memory_type = memory_type_literal(interaction.memory_type),
    )
}

/// Build the full `INSERT DATA` update persisting every interaction.
#[must_use]
pub fn build_insert_update(interactions: &[&Interaction], graph: &str) -> String {
    let mut blocks = String::from("PREFIX semem: <http://purl.org/stuff/semem/>\nPREFIX xsd: <http://www.w3.org/2001/XMLSchema#>\nINSERT DATA {\n");
    for (index, interaction) in interactions.iter().enumerate() {
        let blank_node = format!("_:i{index}");
        blocks.push_str(&interaction_to_triples(interaction, graph, &blank_node));
        blocks.push('\n');
    }
    blocks.push('}');
    blocks
}

/// Build the `INSERT DATA` update materializing concept co-occurrences as
/// `ragno:connectsTo` relationships between concept unit nodes, per spec
/// §6.1. Returns `None` when there are no edges to persist (an empty
/// `INSERT DATA {}` is needless traffic, not an error).
#[must_use]
pub fn build_concept_edges_update(edges: &[ConceptEdge], graph: &str) -> Option<String> {
    if edges.is_empty() {
        return None;
    }
    let mut body =
        String::from("PREFIX ragno: <http://purl.org/stuff/ragno/>\nINSERT DATA {\n");
    let _ = writeln!(body, "  GRAPH <{graph}> {{");
    for edge in edges {
        let a_uri = concept_uri(&edge.a);
        let b_uri = concept_uri(&edge.b);
        let _ = writeln!(body, "    <{a_uri}> ragno:connectsTo <{b_uri}> .");
    }
    body.push_str("  }\n}");
    Some(body)
}

/// Build the update that clears all prior `Interaction` triples from the graph.
#[must_use]
pub fn build_clear_update(graph: &str) -> String {
    format!(
        "PREFIX semem: <http://purl.org/stuff/semem/>\nDELETE {{ GRAPH <{graph}> {{ ?s ?p ?o }} }}\nWHERE {{ GRAPH <{graph}> {{ ?s a semem:Interaction ; ?p ?o }} }}"
    )
}

/// Build the update that clears all prior `ragno:connectsTo` concept-edge
/// triples from the graph, so re-persisting the corpus doesn't accumulate
/// duplicate edges across repeated `saveMemoryToHistory` calls.
#[must_use]
pub fn build_clear_concept_edges_update(graph: &str) -> String {
    format!(
        "PREFIX ragno: <http://purl.org/stuff/ragno/>\nDELETE {{ GRAPH <{graph}> {{ ?s ragno:connectsTo ?o }} }}\nWHERE {{ GRAPH <{graph}> {{ ?s ragno:connectsTo ?o }} }}"
    )
}

/// A single parsed `Interaction` row as read back from the SPARQL `SELECT` results.
///
/// Fields mirror the SPARQL-JSON binding names; parsing failures for
/// individual fields are the caller's responsibility to repair
/// (`loadHistory` replaces, rather than drops, malformed rows).
#[derive(Debug, Clone, Default)]
pub struct RawInteractionRow {
    pub id: Option<String>,
    pub prompt: Option<String>,
    pub output: Option<String>,
    pub embedding_json: Option<String>,
    pub timestamp: Option<i64>,
    pub access_count: Option<u32>,
    pub concepts_json: Option<String>,
    pub decay_factor: Option<f64>,
    pub memory_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Interaction;

    #[test]
    fn escapes_quotes_backslashes_and_newlines() {
        assert_eq!(escape_literal("say \"hi\"\n\\done"), "say \\\"hi\\\"\\n\\\\done");
    }

    #[test]
    fn round_trips_embedding_and_concepts_as_json_literals() {
        let mut interaction = Interaction::new("p".into(), "o".into(), vec![1.0, 2.5], 42);
        interaction.concepts = vec!["a".into(), "b".into()];
        let triples = interaction_to_triples(&interaction, "http://example.org/g", "_:i0");
        assert!(triples.contains("\"[1.0,2.5]\""));
        assert!(triples.contains("\"[\\\"a\\\",\\\"b\\\"]\""));
        assert!(triples.contains("short-term"));
    }

    #[test]
    fn insert_update_wraps_every_interaction_in_the_named_graph() {
        let interactions = [Interaction::new("p".into(), "o".into(), vec![], 0)];
        let refs: Vec<&Interaction> = interactions.iter().collect();
        let update = build_insert_update(&refs, "http://example.org/g");
        assert!(update.contains("INSERT DATA"));
        assert!(update.contains("GRAPH <http://example.org/g>"));
    }

    #[test]
    fn concept_uri_percent_encodes_non_alphanumeric_bytes() {
        let uri = concept_uri("machine learning!");
        assert!(uri.ends_with("machine%20learning%21"));
    }

    #[test]
    fn concept_edges_update_is_none_when_there_are_no_edges() {
        assert!(build_concept_edges_update(&[], "http://example.org/g").is_none());
    }

    #[test]
    fn concept_edges_update_materializes_connects_to_triples() {
        let edges = vec![ConceptEdge { a: "rust".into(), b: "ownership".into(), weight: 3 }];
        let update = build_concept_edges_update(&edges, "http://example.org/g").unwrap();
        assert!(update.contains("INSERT DATA"));
        assert!(update.contains("ragno:connectsTo"));
        assert!(update.contains(&concept_uri("rust")));
        assert!(update.contains(&concept_uri("ownership")));
    }

    #[test]
    fn clear_concept_edges_update_targets_connects_to_triples() {
        let update = build_clear_concept_edges_update("http://example.org/g");
        assert!(update.contains("ragno:connectsTo"));
        assert!(update.contains("DELETE"));
    }
}
