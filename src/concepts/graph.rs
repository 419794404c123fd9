//! `ConceptGraph`: an undirected weighted graph over concept labels, with
//! spreading activation.
//!
//! Concepts are interned into a dense arena (`Vec<String>` plus a
//! label->index map) and edges are stored as adjacency maps keyed by node
//! index, avoiding a pointer-based graph structure.

use std::collections::HashMap;

use crate::types::{normalize_label, Concept, ConceptEdge};

/// Undirected weighted concept co-occurrence graph.
#[derive(Debug, Default)]
pub struct ConceptGraph {
    labels: Vec<String>,
    index_of: HashMap<String, usize>,
    /// `adjacency[node][neighbor] = weight`; kept symmetric by construction.
    adjacency: Vec<HashMap<usize, u32>>,
}

impl ConceptGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, label: &str) -> usize {
        if let Some(&index) = self.index_of.get(label) {
            return index;
        }
        let index = self.labels.len();
        self.labels.push(label.to_string());
        self.adjacency.push(HashMap::new());
        self.index_of.insert(label.to_string(), index);
        index
    }

    fn find(&self, label: &str) -> Option<usize> {
        self.index_of.get(label).copied()
    }

    /// Increment the edge weight for every unordered pair in `labels` by 1,
    /// creating nodes/edges lazily. Duplicate labels are collapsed first;
    /// self-loops are never created.
    pub fn add_concepts(&mut self, labels: &[String]) {
        let mut normalized: Vec<String> = labels.iter().map(|l| normalize_label(l)).collect();
        normalized.sort();
        normalized.dedup();
        if normalized.len() < 2 {
            // still intern a lone concept so it is known to the graph
            for label in &normalized {
                self.intern(label);
            }
            return;
        }
        let indices: Vec<usize> = normalized.iter().map(|l| self.intern(l)).collect();
        for i in 0..indices.len() {
            for j in (i + 1)..indices.len() {
                let (a, b) = (indices[i], indices[j]);
                if a == b {
                    continue;
                }
                *self.adjacency[a].entry(b).or_insert(0) += 1;
                *self.adjacency[b].entry(a).or_insert(0) += 1;
            }
        }
    }

    /// `(neighbor label, edge weight)` pairs for `label`, empty if unknown.
    #[must_use]
    pub fn neighbors(&self, label: &str) -> Vec<(String, u32)> {
        let Some(index) = self.find(label) else {
            return Vec::new();
        };
        self.adjacency[index]
            .iter()
            .map(|(&neighbor, &weight)| (self.labels[neighbor].clone(), weight))
            .collect()
    }

    /// Edge weight between two labels, if an edge exists.
    #[must_use]
    pub fn weight(&self, a: &str, b: &str) -> Option<u32> {
        let a = self.find(a)?;
        let b = self.find(b)?;
        self.adjacency[a].get(&b).copied()
    }

    /// Every `ConceptEdge` in the graph, each unordered pair reported once.
    #[must_use]
    pub fn edges(&self) -> Vec<ConceptEdge> {
        let mut edges = Vec::with_capacity(self.edge_count());
        for (node, neighbors) in self.adjacency.iter().enumerate() {
            for (&neighbor, &weight) in neighbors {
                if node < neighbor {
                    edges.push(ConceptEdge {
                        a: self.labels[node].clone(),
                        b: self.labels[neighbor].clone(),
                        weight,
                    });
                }
            }
        }
        edges
    }

    /// A `Concept` view of `label`'s derived state (degree, co-occurrence
    /// weights), or `None` if the label isn't known to the graph.
    #[must_use]
    pub fn concept(&self, label: &str) -> Option<Concept> {
        let index = self.find(label)?;
        let co_occurrence_weights = self.neighbors(label);
        Some(Concept {
            label: self.labels[index].clone(),
            degree: co_occurrence_weights.len(),
            co_occurrence_weights,
        })
    }

    /// BFS spreading activation from `seeds`. At level `d`, a neighbor's
    /// contribution from an active node is `decay^d * (edge_weight /
    /// max_edge_weight_at_node)`; contributions from multiple paths sum.
    /// The result is normalized so the maximum observed activation is 1.0.
    #[must_use]
    pub fn spread(&self, seeds: &[String], depth: u32, decay: f64) -> HashMap<String, f64> {
        let mut raw: HashMap<usize, f64> = HashMap::new();

        for seed in seeds {
            let Some(seed_index) = self.find(&normalize_label(seed)) else {
                continue;
            };
            let mut frontier = vec![seed_index];
            for d in 1..=depth {
                let mut next_frontier_set: std::collections::HashSet<usize> =
                    std::collections::HashSet::new();
                for &node in &frontier {
                    let edges = &self.adjacency[node];
                    let max_edge = edges.values().copied().max().unwrap_or(1).max(1);
                    for (&neighbor, &edge_weight) in edges {
                        #[allow(clippy::cast_possible_wrap)]
                        let contribution = decay.powi(d as i32) * (f64::from(edge_weight) / f64::from(max_edge));
                        *raw.entry(neighbor).or_insert(0.0) += contribution;
                        next_frontier_set.insert(neighbor);
                    }
                }
                frontier = next_frontier_set.into_iter().collect();
                if frontier.is_empty() {
                    break;
                }
            }
        }

        let max_observed = raw.values().copied().fold(0.0_f64, f64::max);
        if max_observed <= 0.0 {
            return HashMap::new();
        }
        raw.into_iter()
            .map(|(index, value)| (self.labels[index].clone(), (value / max_observed).clamp(0.0, 1.0)))
            .collect()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(HashMap::len).sum::<usize>() / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_concepts_creates_symmetric_edges() {
        let mut graph = ConceptGraph::new();
        graph.add_concepts(&["A".into(), "B".into()]);
        assert_eq!(graph.weight("A", "B"), Some(1));
        assert_eq!(graph.weight("B", "A"), Some(1));
    }

    #[test]
    fn repeated_co_occurrence_increments_weight() {
        let mut graph = ConceptGraph::new();
        graph.add_concepts(&["A".into(), "B".into()]);
        graph.add_concepts(&["A".into(), "B".into()]);
        assert_eq!(graph.weight("A", "B"), Some(2));
    }

    #[test]
    fn self_loops_are_never_created() {
        let mut graph = ConceptGraph::new();
        graph.add_concepts(&["A".into(), "A".into(), "B".into()]);
        assert_eq!(graph.weight("A", "A"), None);
    }

    #[test]
    fn single_concept_interns_without_edges() {
        let mut graph = ConceptGraph::new();
        graph.add_concepts(&["lonely".into()]);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn spread_activation_decreases_with_distance() {
        let mut graph = ConceptGraph::new();
        graph.add_concepts(&["A".into(), "B".into()]);
        graph.add_concepts(&["B".into(), "C".into()]);
        graph.add_concepts(&["C".into(), "D".into()]);

        let activation = graph.spread(&["A".to_string()], 2, 0.5);
        let b = activation.get("B").copied().unwrap_or(0.0);
        let c = activation.get("C").copied().unwrap_or(0.0);
        let d = activation.get("D").copied().unwrap_or(0.0);
        assert!(b > c, "B ({b}) should outrank C ({c})");
        assert!(c > d, "C ({c}) should outrank D ({d}) which is unreached at depth 2");
        assert_eq!(d, 0.0);
    }

    #[test]
    fn spread_from_unknown_seed_returns_empty() {
        let graph = ConceptGraph::new();
        assert!(graph.spread(&["nope".to_string()], 2, 0.5).is_empty());
    }

    #[test]
    fn edges_reports_each_unordered_pair_once() {
        let mut graph = ConceptGraph::new();
        graph.add_concepts(&["A".into(), "B".into()]);
        graph.add_concepts(&["B".into(), "C".into()]);
        let edges = graph.edges();
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().any(|e| e.a == "A" && e.b == "B" && e.weight == 1));
        assert!(edges.iter().any(|e| e.a == "B" && e.b == "C" && e.weight == 1));
    }

    #[test]
    fn concept_reports_degree_and_co_occurrence_weights() {
        let mut graph = ConceptGraph::new();
        graph.add_concepts(&["A".into(), "B".into()]);
        graph.add_concepts(&["A".into(), "C".into()]);
        let concept = graph.concept("A").expect("A was interned");
        assert_eq!(concept.label, "A");
        assert_eq!(concept.degree, 2);
        assert_eq!(concept.co_occurrence_weights.len(), 2);
    }

    #[test]
    fn concept_returns_none_for_an_unknown_label() {
        let graph = ConceptGraph::new();
        assert!(graph.concept("nope").is_none());
    }

    #[test]
    fn weight_is_always_symmetric_for_any_interaction_sequence() {
        let mut graph = ConceptGraph::new();
        for pair in [["x", "y"], ["y", "z"], ["x", "z"], ["x", "y"]] {
            graph.add_concepts(&[pair[0].to_string(), pair[1].to_string()]);
        }
        for a in ["x", "y", "z"] {
            for b in ["x", "y", "z"] {
                assert_eq!(graph.weight(a, b), graph.weight(b, a));
            }
        }
    }
}
