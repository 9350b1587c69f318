//! # Persistence Format
//!
//! Lossless JSON documents for codebook graphs.
//!
//! ```json
//! {
//!   "nodes": [{"id", "label", "value", "formula_type", "formula_args"}],
//!   "edges": [{"source", "target"}]
//! }
//! ```
//!
//! Ids, literal values and edges are written verbatim, so a document
//! round-trips every formula variant, including edges whose endpoints have
//! no node. Loading is otherwise strict: a repeated id or a malformed formula
//! was not written by this module and is rejected. Graphs that have no
//! lossless document (repeated ids, non-finite float literals) are refused
//! on save.
//!
//! ## Limits
//!
//! The document size is checked before parsing, and node and edge counts
//! before any graph is built.

use crate::descriptor::{
    BuildOptions, DescriptorStyle, EdgeDescriptor, GraphDescriptor, NodeDescriptor, build_graph,
    formula_to_parts,
};
use crate::{CodebookError, Graph, NodeId};
use std::collections::BTreeSet;

/// Maximum accepted document size, in bytes.
pub const MAX_DOCUMENT_SIZE: usize = 64 * 1024 * 1024; // 64 MB

impl TryFrom<&Graph> for GraphDescriptor {
    type Error = CodebookError;

    fn try_from(graph: &Graph) -> Result<Self, Self::Error> {
        let mut seen: BTreeSet<&NodeId> = BTreeSet::new();
        let mut nodes = Vec::with_capacity(graph.node_count());

        for node in graph.nodes() {
            if !seen.insert(&node.id) {
                return Err(CodebookError::DuplicateNode(node.id.clone()));
            }
            let (formula_type, formula_args) = match &node.formula {
                Some(formula) => {
                    let (tag, args) = formula_to_parts(formula)?;
                    (Some(tag.to_string()), args)
                }
                None => (None, Vec::new()),
            };
            nodes.push(NodeDescriptor {
                id: node.id.to_string(),
                label: Some(node.label.clone()),
                value: node.value.to_document_json()?,
                formula_type,
                formula_args,
                valid_parent_sets: node.valid_parent_sets.as_ref().map(|sets| {
                    sets.iter()
                        .map(|set| set.iter().map(|id| id.to_string()).collect())
                        .collect()
                }),
            });
        }

        let edges = graph
            .edges()
            .iter()
            .map(|e| EdgeDescriptor {
                source: e.source.to_string(),
                target: e.target.to_string(),
            })
            .collect();

        Ok(Self { nodes, edges })
    }
}

/// Serialize a graph to a pretty-printed JSON document.
pub fn graph_to_json(graph: &Graph) -> Result<String, CodebookError> {
    let descriptor = GraphDescriptor::try_from(graph)?;
    serde_json::to_string_pretty(&descriptor)
        .map_err(|e| CodebookError::SerializationError(e.to_string()))
}

/// Deserialize a graph from a JSON document.
pub fn graph_from_json(json: &str) -> Result<Graph, CodebookError> {
    if json.len() > MAX_DOCUMENT_SIZE {
        return Err(CodebookError::DeserializationError(format!(
            "Document size {} bytes exceeds maximum allowed {} bytes",
            json.len(),
            MAX_DOCUMENT_SIZE
        )));
    }

    let descriptor: GraphDescriptor = serde_json::from_str(json).map_err(|e| {
        CodebookError::DeserializationError(format!("Failed to parse graph document: {}", e))
    })?;

    build_graph(&descriptor, DescriptorStyle::Persisted, BuildOptions::strict())
        .map(|built| built.graph)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::{Formula, Operand};
    use crate::graph::{Edge, Node};
    use crate::Value;

    fn every_variant() -> Graph {
        Graph::from_parts(
            vec![
                Node::new("Genre").with_value("fantasy"),
                Node::new("pages").with_value(320i64),
                Node::new("flag").with_value(true),
                Node::new("not-flag").with_formula(Formula::not("flag")),
                Node::new("is-fantasy").with_formula(Formula::equal("Genre", "fantasy")),
                Node::new("long").with_formula(Formula::is_in("pages", [320i64, 400])),
                Node::new("ratio").with_formula(Formula::equal("pages", 2.5)),
                Node::new("either").with_formula(Formula::or([
                    Operand::from("is-fantasy"),
                    Operand::from(Formula::and(["long", "not-flag"])),
                ])),
                Node::new("one").with_formula(Formula::xor(["long", "ratio"])),
                Node::new("end")
                    .with_label("The End")
                    .with_formula(Formula::and(["either", "one"]))
                    .with_valid_parent_sets(vec![std::iter::once(NodeId::from("either")).collect()]),
            ],
            vec![
                Edge::new("flag", "not-flag"),
                Edge::new("Genre", "is-fantasy"),
                Edge::new("pages", "long"),
                Edge::new("pages", "ratio"),
                Edge::new("is-fantasy", "either"),
                Edge::new("long", "either"),
                Edge::new("not-flag", "either"),
                Edge::new("long", "one"),
                Edge::new("ratio", "one"),
                Edge::new("either", "end"),
                Edge::new("one", "end"),
            ],
        )
    }

    #[test]
    fn json_roundtrip_preserves_graph() {
        let graph = every_variant();
        let json = graph_to_json(&graph).expect("serialize");
        let restored = graph_from_json(&json).expect("deserialize");

        assert_eq!(graph, restored);
        for node in graph.nodes() {
            let other = restored.node(node.id.as_str()).expect("node");
            assert_eq!(node.value, other.value);
            assert_eq!(node.label, other.label);
            assert_eq!(node.valid_parent_sets(), other.valid_parent_sets());
        }
    }

    #[test]
    fn json_roundtrip_is_stable() {
        let json1 = graph_to_json(&every_variant()).expect("first serialize");
        let restored = graph_from_json(&json1).expect("deserialize");
        let json2 = graph_to_json(&restored).expect("second serialize");
        assert_eq!(json1, json2, "save -> load -> save must produce identical text");
    }

    #[test]
    fn in_is_written_as_key_and_list() {
        let json = graph_to_json(&every_variant()).expect("serialize");
        let doc: serde_json::Value = serde_json::from_str(&json).expect("parse");
        let long = doc["nodes"]
            .as_array()
            .and_then(|nodes| nodes.iter().find(|n| n["id"] == "long"))
            .expect("long node");
        assert_eq!(long["formula_args"], serde_json::json!(["pages", [320, 400]]));
        assert_eq!(doc["nodes"][0]["value"], serde_json::json!("fantasy"));
        assert_eq!(doc["nodes"][3]["value"], serde_json::Value::Null);
        assert_eq!(doc["nodes"][0]["formula_type"], serde_json::Value::Null);
    }

    #[test]
    fn ids_are_not_folded_on_load() {
        let restored = graph_from_json(&graph_to_json(&every_variant()).expect("serialize"))
            .expect("deserialize");
        assert!(restored.contains_node("Genre"));
        assert_eq!(
            restored.node("pages").map(|n| n.value.clone()),
            Some(Value::Int(320))
        );
    }

    #[test]
    fn loading_is_strict() {
        let repeated = r#"{"nodes": [{"id": "a"}, {"id": "a"}], "edges": []}"#;
        assert!(matches!(
            graph_from_json(repeated),
            Err(CodebookError::DuplicateNode(_))
        ));

        let unknown = r#"{"nodes": [{"id": "a", "formula_type": "Unknown", "formula_args": []}]}"#;
        assert!(matches!(
            graph_from_json(unknown),
            Err(CodebookError::UnknownFormulaType(_))
        ));
    }

    #[test]
    fn edges_to_missing_nodes_roundtrip() {
        let graph = Graph::from_parts(
            vec![Node::new("a"), Node::new("c").with_formula(Formula::or(["a", "b"]))],
            vec![Edge::new("a", "c"), Edge::new("b", "c")],
        );
        let json = graph_to_json(&graph).expect("serialize");
        let restored = graph_from_json(&json).expect("deserialize");

        assert_eq!(graph, restored);
        assert_eq!(restored.edge_count(), 2);
        assert!(restored.contains_edge("b", "c"));
        assert_eq!(graph_to_json(&restored).expect("second serialize"), json);
    }

    #[test]
    fn repeated_ids_are_refused_on_save() {
        let graph = Graph::from_parts(vec![Node::new("a"), Node::new("a")], Vec::new());
        assert!(matches!(
            graph_to_json(&graph),
            Err(CodebookError::DuplicateNode(_))
        ));
    }

    #[test]
    fn non_finite_literals_are_refused_on_save() {
        let formula = Graph::from_parts(
            vec![Node::new("k"), Node::new("nan").with_formula(Formula::equal("k", f64::NAN))],
            vec![Edge::new("k", "nan")],
        );
        assert!(matches!(
            graph_to_json(&formula),
            Err(CodebookError::InvalidLiteral(_))
        ));

        let value = Graph::from_parts(vec![Node::new("k").with_value(f64::INFINITY)], Vec::new());
        assert!(graph_to_json(&value).is_err());
    }

    #[test]
    fn invalid_json_rejected() {
        assert!(matches!(
            graph_from_json("{not json"),
            Err(CodebookError::DeserializationError(_))
        ));
    }

    #[test]
    fn empty_graph_roundtrip() {
        let json = graph_to_json(&Graph::new()).expect("serialize");
        let restored = graph_from_json(&json).expect("deserialize");
        assert_eq!(restored.node_count(), 0);
    }
}
