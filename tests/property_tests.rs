//! Property-based invariant checks for `ConceptGraph` and `VectorIndex`.

use proptest::prelude::*;
use semem_core::{ConceptGraph, VectorIndex};

fn concept_label() -> impl Strategy<Value = String> {
    "[a-e]".prop_map(String::from)
}

fn interaction_concepts() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec(concept_label(), 0..4)
}

proptest! {
    #[test]
    fn concept_graph_edges_stay_symmetric_and_loop_free(
        interactions in proptest::collection::vec(interaction_concepts(), 0..20)
    ) {
        let mut graph = ConceptGraph::new();
        for concepts in &interactions {
            graph.add_concepts(concepts);
        }

        for label in ["a", "b", "c", "d", "e"] {
            for (neighbor, weight) in graph.neighbors(label) {
                prop_assert_ne!(neighbor.as_str(), label, "a concept must never be its own neighbor");
                prop_assert!(weight >= 1, "a recorded edge must have positive weight");
                prop_assert_eq!(
                    graph.weight(label, &neighbor),
                    graph.weight(&neighbor, label),
                    "edge weight must be symmetric"
                );
            }
        }
    }

    #[test]
    fn vector_index_len_tracks_successful_adds(
        vectors in proptest::collection::vec(
            proptest::collection::vec(-10.0f64..10.0, 3),
            0..20
        )
    ) {
        let mut index = VectorIndex::new(3);
        let mut expected = 0;
        for v in vectors {
            if index.add(v).is_ok() {
                expected += 1;
            }
        }
        prop_assert_eq!(index.len(), expected);
    }

    #[test]
    fn vector_index_rejects_wrong_dimension_without_changing_len(
        good in proptest::collection::vec(-10.0f64..10.0, 3),
        bad_len in 0usize..6,
    ) {
        prop_assume!(bad_len != 3);
        let mut index = VectorIndex::new(3);
        index.add(good).unwrap();
        let before = index.len();
        let bad = vec![1.0; bad_len];
        let result = index.add(bad);
        prop_assert!(result.is_err());
        prop_assert_eq!(index.len(), before);
    }
}
