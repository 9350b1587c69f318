//! # CLI Command Implementations
//!
//! Each command reads its inputs, runs the engine, and returns the text to
//! print. Construction warnings go to the log, never to the output.

use crate::config::Config;
use codebook_core::{
    BuiltGraph, CodebookError, EqualityMode, Graph, GraphDescriptor, MatchMetrics, Value,
    graph_from_json, graph_to_json,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

// =============================================================================
// FILE HANDLING
// =============================================================================

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), CodebookError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| CodebookError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(CodebookError::DeserializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve an input path to an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, CodebookError> {
    let canonical = path.canonicalize().map_err(|e| {
        CodebookError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(CodebookError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Resolve an output path whose parent directory must already exist.
fn validate_output_path(path: &Path) -> Result<PathBuf, CodebookError> {
    // A bare file name has an empty parent.
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let canonical_parent = parent.canonicalize().map_err(|e| {
        CodebookError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(CodebookError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| CodebookError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

fn read_input(path: &Path, config: &Config) -> Result<String, CodebookError> {
    let path = validate_file_path(path)?;
    validate_file_size(&path, config.limits.max_file_size)?;
    std::fs::read_to_string(&path)
        .map_err(|e| CodebookError::IoError(format!("Failed to read '{}': {}", path.display(), e)))
}

fn write_output(path: &Path, contents: &str) -> Result<PathBuf, CodebookError> {
    let path = validate_output_path(path)?;
    std::fs::write(&path, contents).map_err(|e| {
        CodebookError::IoError(format!("Failed to write '{}': {}", path.display(), e))
    })?;
    tracing::info!("Wrote {}", path.display());
    Ok(path)
}

/// Load a persisted graph document.
pub fn load_graph(path: &Path, config: &Config) -> Result<Graph, CodebookError> {
    let json = read_input(path, config)?;
    let graph = graph_from_json(&json)?;
    tracing::debug!(
        "Loaded {} ({} nodes, {} edges)",
        path.display(),
        graph.node_count(),
        graph.edge_count()
    );
    Ok(graph)
}

/// Load and build an extractor descriptor, logging every construction warning.
pub fn load_descriptor(
    path: &Path,
    config: &Config,
    strict: Option<bool>,
) -> Result<BuiltGraph, CodebookError> {
    let json = read_input(path, config)?;
    let descriptor = GraphDescriptor::from_json_str(&json)?;
    let built = descriptor.build(config.build_options(strict))?;
    for warning in &built.warnings {
        tracing::warn!("{}: {}", path.display(), warning);
    }
    Ok(built)
}

fn to_pretty_json<T: Serialize>(value: &T) -> Result<String, CodebookError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| CodebookError::SerializationError(e.to_string()))
}

// =============================================================================
// BUILD COMMAND
// =============================================================================

/// Build a graph from an extractor descriptor.
///
/// Without an output path the persisted document itself is returned.
pub fn cmd_build(
    config: &Config,
    json_mode: bool,
    input: &Path,
    output: Option<&Path>,
    strict: Option<bool>,
) -> Result<String, CodebookError> {
    let built = load_descriptor(input, config, strict)?;
    let document = graph_to_json(&built.graph)?;

    let Some(output) = output else {
        return Ok(document);
    };
    let written = write_output(output, &document)?;

    if json_mode {
        let warnings: Vec<String> = built.warnings.iter().map(|w| w.to_string()).collect();
        return to_pretty_json(&serde_json::json!({
            "output": written.to_string_lossy(),
            "node_count": built.graph.node_count(),
            "edge_count": built.graph.edge_count(),
            "warnings": warnings
        }));
    }

    Ok(format!(
        "Built graph with {} nodes and {} edges ({} warnings) -> {}",
        built.graph.node_count(),
        built.graph.edge_count(),
        built.warnings.len(),
        written.display()
    ))
}

// =============================================================================
// EVALUATE COMMAND
// =============================================================================

/// Apply a leaf assignment document to a graph.
///
/// The document is a JSON object mapping node ids to scalar values.
pub fn apply_assignments(graph: &mut Graph, json: &str) -> Result<usize, CodebookError> {
    let assignments: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)
        .map_err(|e| {
            CodebookError::DeserializationError(format!("Failed to parse assignments: {}", e))
        })?;

    for (id, raw) in &assignments {
        graph.set_value(id, Value::from_json(raw)?)?;
    }
    Ok(assignments.len())
}

/// Propagate leaf values through a graph.
pub fn cmd_evaluate(
    config: &Config,
    json_mode: bool,
    graph_path: &Path,
    assignments: Option<&Path>,
    output: Option<&Path>,
) -> Result<String, CodebookError> {
    let mut graph = load_graph(graph_path, config)?;

    if let Some(path) = assignments {
        let applied = apply_assignments(&mut graph, &read_input(path, config)?)?;
        tracing::debug!("Applied {} leaf assignments", applied);
    }

    graph.auto_infer_values()?;

    if let Some(output) = output {
        write_output(output, &graph_to_json(&graph)?)?;
    }

    let conclusion = graph.terminal_node().ok().map(|n| (n.id.to_string(), n.value.clone()));
    let order = graph.topological_sort();

    if json_mode {
        let values: serde_json::Map<String, serde_json::Value> = order
            .iter()
            .map(|n| (n.id.to_string(), n.value.to_json()))
            .collect();
        return to_pretty_json(&serde_json::json!({
            "values": values,
            "end_node": conclusion.as_ref().map(|(id, _)| id),
            "end_value": conclusion.as_ref().map(|(_, v)| v.to_json())
        }));
    }

    let mut out = String::from("Evaluated Values\n================\n");
    for node in &order {
        let kind = if node.is_derived() { "derived" } else { "leaf" };
        out.push_str(&format!("{:<24} {:<8} {}\n", node.id.as_str(), kind, node.value));
    }
    if let Some((id, value)) = conclusion {
        out.push_str(&format!("\nEnd node {} = {}", id, value));
    }
    Ok(out.trim_end().to_string())
}

// =============================================================================
// COMPARE COMMAND
// =============================================================================

/// Compare two graphs.
pub fn cmd_compare(
    config: &Config,
    json_mode: bool,
    left: &Path,
    right: &Path,
    mode: Option<EqualityMode>,
) -> Result<String, CodebookError> {
    let a = load_graph(left, config)?;
    let b = load_graph(right, config)?;
    let mode = config.equality_mode(mode);
    let equal = a.equals(&b, mode);

    if json_mode {
        return to_pretty_json(&serde_json::json!({
            "mode": mode,
            "equal": equal
        }));
    }

    let verdict = if equal { "equal" } else { "different" };
    Ok(format!("Graphs are {} ({} mode)", verdict, mode))
}

// =============================================================================
// SCORE COMMAND
// =============================================================================

/// Score a predicted derivation against a reference graph.
pub fn cmd_score(
    config: &Config,
    json_mode: bool,
    reference: &Path,
    predicted: &Path,
    extracted: bool,
    check_values: Option<bool>,
) -> Result<String, CodebookError> {
    let reference = load_graph(reference, config)?;
    let predicted = if extracted {
        load_descriptor(predicted, config, None)?.into_graph()
    } else {
        load_graph(predicted, config)?
    };

    let check_values = config.check_values(check_values);
    let report = MatchMetrics::new(&reference, &predicted).report(check_values)?;

    if json_mode {
        return to_pretty_json(&report);
    }
    Ok(report.to_string())
}

// =============================================================================
// INSPECT COMMAND
// =============================================================================

/// Show structure and diagnostics of a graph.
pub fn cmd_inspect(
    config: &Config,
    json_mode: bool,
    graph_path: &Path,
) -> Result<String, CodebookError> {
    let graph = load_graph(graph_path, config)?;

    let ids = |nodes: Vec<&codebook_core::Node>| -> Vec<String> {
        nodes.iter().map(|n| n.id.to_string()).collect()
    };
    let leaves = ids(graph.leaf_nodes());
    let terminals = ids(graph.terminal_nodes());
    let has_cycle = graph.has_cycle();
    let order = if has_cycle {
        Vec::new()
    } else {
        ids(graph.topological_sort())
    };
    let undefined: Vec<String> = graph.undefined_leaves().iter().map(|id| id.to_string()).collect();
    let formulas_set = graph.non_leaf_formula_set();

    if json_mode {
        return to_pretty_json(&serde_json::json!({
            "node_count": graph.node_count(),
            "edge_count": graph.edge_count(),
            "leaves": leaves,
            "end_nodes": terminals,
            "has_cycle": has_cycle,
            "undefined_leaves": undefined,
            "derived_formulas_set": formulas_set,
            "topological_order": order
        }));
    }

    let mut out = String::from("Codebook Graph\n==============\n");
    out.push_str(&format!("Nodes:            {}\n", graph.node_count()));
    out.push_str(&format!("Edges:            {}\n", graph.edge_count()));
    out.push_str(&format!("Leaves:           {}\n", leaves.join(", ")));
    out.push_str(&format!("End nodes:        {}\n", terminals.join(", ")));
    out.push_str(&format!("Cycle:            {}\n", has_cycle));
    out.push_str(&format!("Undefined leaves: {}\n", undefined.join(", ")));
    out.push_str(&format!("Formulas set:     {}\n", formulas_set));
    if !has_cycle {
        out.push_str(&format!("Order:            {}\n", order.join(" -> ")));
    }
    Ok(out.trim_end().to_string())
}
