//! Integration tests for the CLI commands over real files.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use codebook::cli::{
    apply_assignments, cmd_build, cmd_compare, cmd_evaluate, cmd_inspect, cmd_score, load_graph,
};
use codebook::config::Config;
use codebook_core::{CodebookError, EqualityMode, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// =============================================================================
// FIXTURES
// =============================================================================

/// Extractor output for `d = Not(And(a, b))` with mixed-case ids.
const DESCRIPTOR: &str = r#"{
  "nodes": [
    {"id": "A", "label": "first fact"},
    {"id": "B", "label": "second fact"},
    {"id": "C", "formula_type": "And", "formula_args": ["A", "B"]},
    {"id": "D", "label": "conclusion", "formula_type": "Not", "formula_args": ["C"]}
  ],
  "edges": [
    {"source": "A", "target": "C"},
    {"source": "B", "target": "C"},
    {"source": "C", "target": "D"}
  ]
}"#;

/// A prediction that only cites `a` on the way to the conclusion.
const PARTIAL_PREDICTION: &str = r#"{
  "nodes": [
    {"id": "a"},
    {"id": "c", "formula_type": "And", "formula_args": ["a", "b"]},
    {"id": "d", "formula_type": "Not", "formula_args": ["c"]}
  ],
  "edges": [
    {"source": "a", "target": "c"},
    {"source": "c", "target": "d"},
    {"source": "x", "target": "d"}
  ]
}"#;

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).expect("write fixture");
    path
}

fn built_graph(dir: &TempDir, name: &str) -> PathBuf {
    let input = write(dir, "descriptor.json", DESCRIPTOR);
    let output = dir.path().join(name);
    cmd_build(&Config::default(), false, &input, Some(&output), None).expect("build");
    output
}

fn parse(output: &str) -> serde_json::Value {
    serde_json::from_str(output).expect("command output is JSON")
}

fn rename(path: &Path, dir: &TempDir) -> PathBuf {
    let text = std::fs::read_to_string(path)
        .expect("read")
        .replace("\"a\"", "\"first\"")
        .replace("\"b\"", "\"second\"");
    write(dir, "renamed.json", &text)
}

// =============================================================================
// BUILD
// =============================================================================

#[test]
fn build_writes_persisted_graph() {
    let dir = TempDir::new().unwrap();
    let output = built_graph(&dir, "graph.json");

    let graph = load_graph(&output, &Config::default()).expect("load");
    assert_eq!(graph.node_count(), 4);
    assert_eq!(graph.edge_count(), 3);
    assert!(graph.contains_node("a"), "extracted ids are lowercased");
    assert_eq!(graph.node("d").map(|n| n.label.as_str()), Some("conclusion"));
}

#[test]
fn build_without_output_returns_document() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "descriptor.json", DESCRIPTOR);

    let document = cmd_build(&Config::default(), false, &input, None, None).expect("build");
    let doc = parse(&document);
    assert_eq!(doc["nodes"].as_array().map(Vec::len), Some(4));
    assert_eq!(doc["nodes"][2]["formula_type"], "And");
}

#[test]
fn build_reports_warnings_leniently_and_fails_strictly() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "prediction.json", PARTIAL_PREDICTION);
    let output = dir.path().join("out.json");

    let summary = cmd_build(&Config::default(), true, &input, Some(&output), None)
        .expect("lenient build");
    let summary = parse(&summary);
    assert_eq!(summary["edge_count"], 2);
    assert_eq!(summary["warnings"].as_array().map(Vec::len), Some(1));

    let strict = cmd_build(&Config::default(), false, &input, Some(&output), Some(true));
    assert!(matches!(strict, Err(CodebookError::DanglingEdge { .. })));

    let config = Config::from_toml_str("[build]\nstrict = true\n").expect("config");
    let from_config = cmd_build(&config, false, &input, Some(&output), None);
    assert!(matches!(from_config, Err(CodebookError::DanglingEdge { .. })));

    let overridden = cmd_build(&config, false, &input, Some(&output), Some(false));
    assert!(overridden.is_ok());
}

#[test]
fn build_rejects_missing_output_directory() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "descriptor.json", DESCRIPTOR);
    let output = dir.path().join("missing").join("graph.json");

    let result = cmd_build(&Config::default(), false, &input, Some(&output), None);
    assert!(matches!(result, Err(CodebookError::IoError(_))));
}

// =============================================================================
// EVALUATE
// =============================================================================

#[test]
fn evaluate_propagates_assignments() {
    let dir = TempDir::new().unwrap();
    let graph = built_graph(&dir, "graph.json");
    let leaves = write(&dir, "leaves.json", r#"{"a": true, "b": true}"#);
    let evaluated = dir.path().join("evaluated.json");

    let output = cmd_evaluate(
        &Config::default(),
        true,
        &graph,
        Some(&leaves),
        Some(&evaluated),
    )
    .expect("evaluate");
    let doc = parse(&output);
    assert_eq!(doc["values"]["c"], true);
    assert_eq!(doc["values"]["d"], false);
    assert_eq!(doc["end_node"], "d");
    assert_eq!(doc["end_value"], false);

    let saved = load_graph(&evaluated, &Config::default()).expect("load evaluated");
    assert_eq!(saved.node("c").map(|n| n.value.clone()), Some(Value::Bool(true)));
}

#[test]
fn evaluate_text_lists_nodes_in_order() {
    let dir = TempDir::new().unwrap();
    let graph = built_graph(&dir, "graph.json");
    let leaves = write(&dir, "leaves.json", r#"{"a": true, "b": false}"#);

    let output =
        cmd_evaluate(&Config::default(), false, &graph, Some(&leaves), None).expect("evaluate");
    let c = output.find("\nc ").expect("c listed");
    let d = output.find("\nd ").expect("d listed");
    assert!(c < d);
    assert!(output.ends_with("End node d = true"));
}

#[test]
fn evaluate_requires_every_leaf() {
    let dir = TempDir::new().unwrap();
    let graph = built_graph(&dir, "graph.json");
    let leaves = write(&dir, "leaves.json", r#"{"a": true}"#);

    let result = cmd_evaluate(&Config::default(), false, &graph, Some(&leaves), None);
    match result {
        Err(CodebookError::UndefinedLeafValues(ids)) => {
            assert_eq!(ids.len(), 1);
            assert_eq!(ids[0].as_str(), "b");
        }
        other => panic!("expected undefined leaves, got {:?}", other),
    }
}

#[test]
fn assignments_reject_unknown_nodes() {
    let dir = TempDir::new().unwrap();
    let mut graph = load_graph(&built_graph(&dir, "graph.json"), &Config::default()).unwrap();

    assert!(matches!(
        apply_assignments(&mut graph, r#"{"zzz": true}"#),
        Err(CodebookError::NodeNotFound(_))
    ));
    assert!(matches!(
        apply_assignments(&mut graph, "[true]"),
        Err(CodebookError::DeserializationError(_))
    ));
    assert_eq!(apply_assignments(&mut graph, r#"{"a": 1}"#).unwrap(), 1);
}

// =============================================================================
// COMPARE
// =============================================================================

#[test]
fn compare_modes() {
    let dir = TempDir::new().unwrap();
    let graph = built_graph(&dir, "graph.json");
    let renamed = rename(&graph, &dir);
    let config = Config::default();

    let same = cmd_compare(&config, false, &graph, &graph, None).expect("compare");
    assert_eq!(same, "Graphs are equal (exact mode)");

    let exact = cmd_compare(&config, true, &graph, &renamed, None).expect("compare");
    assert_eq!(parse(&exact)["equal"], false);

    let structural = cmd_compare(&config, true, &graph, &renamed, Some(EqualityMode::Structural))
        .expect("compare");
    assert_eq!(parse(&structural)["equal"], true);
    assert_eq!(parse(&structural)["mode"], "structural");

    let config = Config::from_toml_str("[compare]\nmode = \"canonical\"\n").expect("config");
    let canonical = cmd_compare(&config, false, &graph, &renamed, None).expect("compare");
    assert_eq!(canonical, "Graphs are equal (canonical mode)");
}

// =============================================================================
// SCORE
// =============================================================================

#[test]
fn score_self_is_full_match() {
    let dir = TempDir::new().unwrap();
    let graph = built_graph(&dir, "graph.json");

    let output =
        cmd_score(&Config::default(), true, &graph, &graph, false, None).expect("score");
    let report = parse(&output);
    assert_eq!(report["full_graph_match"], true);
    assert_eq!(report["correct_reasoning_edges"], 3);
    assert_eq!(report["reference_edges"], 3);
    assert_eq!(report["missing_reasoning_edges"], 0);
    assert_eq!(report["hallucinated_reasoning_edges"], 0);
    assert_eq!(report["check_values"], false);
}

#[test]
fn score_extracted_prediction() {
    let dir = TempDir::new().unwrap();
    let reference = built_graph(&dir, "graph.json");
    let predicted = write(&dir, "prediction.json", PARTIAL_PREDICTION);

    let output =
        cmd_score(&Config::default(), false, &reference, &predicted, true, None).expect("score");
    assert!(output.contains("Correct Reasoning Edges: 2 (Ideal: 3)"));
    assert!(output.contains("Missing Reasoning Edges: 1 (Ideal: 0)"));
    assert!(output.contains("Full Graph Match: false (Ideal: true)"));

    let config = Config::from_toml_str("[score]\ncheck_values = true\n").expect("config");
    let json = cmd_score(&config, true, &reference, &predicted, true, None).expect("score");
    assert_eq!(parse(&json)["check_values"], true);

    let json =
        cmd_score(&config, true, &reference, &predicted, true, Some(false)).expect("score");
    assert_eq!(parse(&json)["check_values"], false);
}

#[test]
fn score_needs_a_single_end_node() {
    let dir = TempDir::new().unwrap();
    let reference = write(
        &dir,
        "two-ends.json",
        r#"{"nodes": [{"id": "a"}, {"id": "b"}], "edges": []}"#,
    );

    let result = cmd_score(&Config::default(), false, &reference, &reference, false, None);
    assert!(matches!(
        result,
        Err(CodebookError::TerminalNodeCount { found: 2 })
    ));
}

// =============================================================================
// INSPECT
// =============================================================================

#[test]
fn inspect_reports_structure() {
    let dir = TempDir::new().unwrap();
    let graph = built_graph(&dir, "graph.json");

    let doc = parse(&cmd_inspect(&Config::default(), true, &graph).expect("inspect"));
    assert_eq!(doc["node_count"], 4);
    assert_eq!(doc["leaves"], serde_json::json!(["a", "b"]));
    assert_eq!(doc["end_nodes"], serde_json::json!(["d"]));
    assert_eq!(doc["has_cycle"], false);
    assert_eq!(doc["undefined_leaves"], serde_json::json!(["a", "b"]));
    assert_eq!(doc["derived_formulas_set"], true);
    assert_eq!(doc["topological_order"], serde_json::json!(["a", "b", "c", "d"]));

    let text = cmd_inspect(&Config::default(), false, &graph).expect("inspect");
    assert!(text.contains("Order:            a -> b -> c -> d"));
}

#[test]
fn inspect_flags_cycles() {
    let dir = TempDir::new().unwrap();
    let cyclic = write(
        &dir,
        "cycle.json",
        r#"{
          "nodes": [{"id": "a"}, {"id": "b", "formula_type": "Not", "formula_args": ["c"]},
                    {"id": "c", "formula_type": "Not", "formula_args": ["b"]}],
          "edges": [{"source": "a", "target": "b"}, {"source": "b", "target": "c"},
                    {"source": "c", "target": "b"}]
        }"#,
    );

    let doc = parse(&cmd_inspect(&Config::default(), true, &cyclic).expect("inspect"));
    assert_eq!(doc["has_cycle"], true);
    assert_eq!(doc["topological_order"], serde_json::json!([]));
}

// =============================================================================
// INPUT LIMITS
// =============================================================================

#[test]
fn oversized_and_missing_inputs_are_rejected() {
    let dir = TempDir::new().unwrap();
    let graph = built_graph(&dir, "graph.json");

    let tiny = Config::from_toml_str("[limits]\nmax_file_size = 16\n").expect("config");
    assert!(matches!(
        cmd_inspect(&tiny, false, &graph),
        Err(CodebookError::DeserializationError(_))
    ));

    let missing = dir.path().join("nope.json");
    assert!(matches!(
        cmd_inspect(&Config::default(), false, &missing),
        Err(CodebookError::IoError(_))
    ));
    assert!(matches!(
        cmd_inspect(&Config::default(), false, dir.path()),
        Err(CodebookError::IoError(_))
    ));
}
