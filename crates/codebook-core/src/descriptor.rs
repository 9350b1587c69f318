//! # Descriptor Builder
//!
//! Turns graph descriptors (plain JSON documents) into [`Graph`] instances.
//!
//! Two dialects share one document shape:
//!
//! - **Extracted**: written by a text-to-graph extractor. Ids are lower-cased,
//!   string literals in `Equal`/`In` are parsed (bool, then integer, then
//!   float, else text), and connectives need at least one argument.
//! - **Persisted**: written by [`crate::formats::graph_to_json`]. Ids,
//!   literals and edges are taken verbatim, including edges to ids that have
//!   no node, since a [`Graph`] may hold those.
//!
//! Malformed formulas, repeated ids and (in extracted descriptors) edges
//! naming unknown nodes are handled by one policy, chosen through
//! [`BuildOptions`]: collected as warnings (lenient) or turned into the
//! first error (strict).

use crate::formula::{Formula, FormulaKind, Operand, ParentSet};
use crate::graph::{Edge, Graph, Node};
use crate::primitives::{MAX_DOCUMENT_EDGES, MAX_DOCUMENT_NODES, MAX_FORMULA_DEPTH};
use crate::{CodebookError, ConstructionWarning, NodeId, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// DOCUMENT SHAPE
// =============================================================================

/// A graph as a JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDescriptor {
    #[serde(default)]
    pub nodes: Vec<NodeDescriptor>,
    #[serde(default)]
    pub edges: Vec<EdgeDescriptor>,
}

/// One node of a [`GraphDescriptor`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Node value as a JSON scalar; `null` when unknown.
    #[serde(default)]
    pub value: serde_json::Value,
    /// `"Not"`, `"And"`, `"Or"`, `"Xor"`, `"Equal"`, `"In"`, or `null` for leaves.
    #[serde(default)]
    pub formula_type: Option<String>,
    /// Node ids, literals, or nested `{"formula_type", "formula_args"}` objects.
    #[serde(default)]
    pub formula_args: Vec<serde_json::Value>,
    /// Explicit valid parent sets overriding those derived from the formula.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_parent_sets: Option<Vec<Vec<String>>>,
}

/// One edge of a [`GraphDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDescriptor {
    pub source: String,
    pub target: String,
}

impl GraphDescriptor {
    /// Parse a descriptor from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, CodebookError> {
        serde_json::from_str(json).map_err(|e| CodebookError::DeserializationError(e.to_string()))
    }

    /// Build a graph from an extractor-written descriptor.
    pub fn build(&self, options: BuildOptions) -> Result<BuiltGraph, CodebookError> {
        build_graph(self, DescriptorStyle::Extracted, options)
    }
}

/// Which producer wrote a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DescriptorStyle {
    /// Text-to-graph extractor output.
    #[default]
    Extracted,
    /// Lossless document written by this crate.
    Persisted,
}

impl DescriptorStyle {
    fn node_id(self, raw: &str) -> NodeId {
        match self {
            DescriptorStyle::Extracted => NodeId::new(raw.to_lowercase()),
            DescriptorStyle::Persisted => NodeId::new(raw),
        }
    }

    fn literal(self, json: &serde_json::Value) -> Result<Value, CodebookError> {
        match (self, json) {
            (DescriptorStyle::Extracted, serde_json::Value::String(s)) => Ok(Value::parse_literal(s)),
            _ => Value::from_json(json),
        }
    }

    fn keeps_dangling_edges(self) -> bool {
        matches!(self, DescriptorStyle::Persisted)
    }

    fn min_connective_args(self) -> usize {
        match self {
            DescriptorStyle::Extracted => 1,
            DescriptorStyle::Persisted => 0,
        }
    }
}

// =============================================================================
// BUILD OPTIONS
// =============================================================================

/// Construction policy for malformed formulas and dangling edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuildOptions {
    /// Fail on the first problem instead of collecting warnings.
    #[serde(default)]
    pub strict: bool,
}

impl BuildOptions {
    /// Collect problems as [`ConstructionWarning`]s.
    #[must_use]
    pub const fn lenient() -> Self {
        Self { strict: false }
    }

    /// Turn the first problem into an error.
    #[must_use]
    pub const fn strict() -> Self {
        Self { strict: true }
    }
}

/// A graph plus the warnings collected while building it.
#[derive(Debug, Clone)]
pub struct BuiltGraph {
    pub graph: Graph,
    pub warnings: Vec<ConstructionWarning>,
}

impl BuiltGraph {
    #[must_use]
    pub fn into_graph(self) -> Graph {
        self.graph
    }

    /// Returns `true` if construction found no problems.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

// =============================================================================
// FORMULA RESOLUTION
// =============================================================================

fn arity_error(kind: FormulaKind, expected: &'static str, got: usize) -> CodebookError {
    CodebookError::InvalidArity {
        formula: kind.name(),
        expected,
        got,
    }
}

fn operand_error(kind: FormulaKind, reason: impl Into<String>) -> CodebookError {
    CodebookError::InvalidOperand {
        formula: kind.name(),
        reason: reason.into(),
    }
}

/// A nested `{"formula_type", "formula_args"}` object, if `arg` is one.
fn nested_parts(arg: &serde_json::Value) -> Option<(&str, &[serde_json::Value])> {
    let object = arg.as_object()?;
    let tag = object.get("formula_type")?.as_str()?;
    let args = object
        .get("formula_args")
        .and_then(serde_json::Value::as_array)
        .map_or(&[][..], Vec::as_slice);
    Some((tag, args))
}

fn resolve_operand(
    kind: FormulaKind,
    arg: &serde_json::Value,
    style: DescriptorStyle,
    depth: usize,
) -> Result<Operand, CodebookError> {
    if let Some(id) = arg.as_str() {
        return Ok(Operand::Key(style.node_id(id)));
    }
    if let Some((tag, args)) = nested_parts(arg) {
        let inner = resolve_formula(tag, args, style, depth + 1)?;
        return Ok(Operand::from(inner));
    }
    Err(operand_error(
        kind,
        format!("expected a node id or nested formula, got {}", arg),
    ))
}

fn resolve_key(
    kind: FormulaKind,
    arg: &serde_json::Value,
    style: DescriptorStyle,
) -> Result<NodeId, CodebookError> {
    arg.as_str()
        .map(|id| style.node_id(id))
        .ok_or_else(|| operand_error(kind, format!("expected a node id, got {}", arg)))
}

fn resolve_formula(
    tag: &str,
    args: &[serde_json::Value],
    style: DescriptorStyle,
    depth: usize,
) -> Result<Formula, CodebookError> {
    let kind: FormulaKind = tag.parse()?;
    if depth > MAX_FORMULA_DEPTH {
        return Err(operand_error(
            kind,
            format!("nesting deeper than {} levels", MAX_FORMULA_DEPTH),
        ));
    }

    match kind {
        FormulaKind::Not => match args {
            [only] => Ok(Formula::Not(resolve_operand(kind, only, style, depth)?)),
            _ => Err(arity_error(kind, "1", args.len())),
        },
        FormulaKind::And | FormulaKind::Or | FormulaKind::Xor => {
            if args.len() < style.min_connective_args() {
                return Err(arity_error(kind, "at least 1", args.len()));
            }
            let ops = args
                .iter()
                .map(|a| resolve_operand(kind, a, style, depth))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(match kind {
                FormulaKind::And => Formula::And(ops),
                FormulaKind::Or => Formula::Or(ops),
                _ => Formula::Xor(ops),
            })
        }
        FormulaKind::Equal => match args {
            [key, value] => Ok(Formula::Equal {
                key: resolve_key(kind, key, style)?,
                value: style.literal(value)?,
            }),
            _ => Err(arity_error(kind, "2", args.len())),
        },
        FormulaKind::In => {
            let [key, rest @ ..] = args else {
                return Err(arity_error(kind, "at least 2", 0));
            };
            if rest.is_empty() {
                return Err(arity_error(kind, "at least 2", args.len()));
            }
            let candidates: &[serde_json::Value] = match rest {
                [serde_json::Value::Array(list)] => list.as_slice(),
                _ => rest,
            };
            let values = candidates
                .iter()
                .map(|v| style.literal(v))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Formula::In {
                key: resolve_key(kind, key, style)?,
                values,
            })
        }
    }
}

/// Build a formula from a variant tag and descriptor arguments.
pub fn formula_from_parts(
    tag: &str,
    args: &[serde_json::Value],
    style: DescriptorStyle,
) -> Result<Formula, CodebookError> {
    resolve_formula(tag, args, style, 0)
}

fn operand_to_json(op: &Operand) -> Result<serde_json::Value, CodebookError> {
    match op {
        Operand::Key(id) => Ok(serde_json::Value::String(id.to_string())),
        Operand::Formula(inner) => {
            let (tag, args) = formula_to_parts(inner)?;
            Ok(serde_json::json!({ "formula_type": tag, "formula_args": args }))
        }
    }
}

/// Split a formula into its persisted variant tag and arguments.
///
/// `In` is written as `[key, [values...]]`. Fails on a literal with no JSON
/// form (a non-finite float).
pub fn formula_to_parts(
    formula: &Formula,
) -> Result<(&'static str, Vec<serde_json::Value>), CodebookError> {
    let args = match formula {
        Formula::Not(op) => vec![operand_to_json(op)?],
        Formula::And(ops) | Formula::Or(ops) | Formula::Xor(ops) => {
            ops.iter().map(operand_to_json).collect::<Result<Vec<_>, _>>()?
        }
        Formula::Equal { key, value } => {
            vec![serde_json::Value::String(key.to_string()), value.to_document_json()?]
        }
        Formula::In { key, values } => vec![
            serde_json::Value::String(key.to_string()),
            serde_json::Value::Array(
                values
                    .iter()
                    .map(Value::to_document_json)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
        ],
    };
    Ok((formula.kind().name(), args))
}

// =============================================================================
// GRAPH CONSTRUCTION
// =============================================================================

/// Records problems or fails fast, per [`BuildOptions`].
struct Collector {
    strict: bool,
    warnings: Vec<ConstructionWarning>,
}

impl Collector {
    fn report(&mut self, warning: ConstructionWarning) -> Result<(), CodebookError> {
        if !self.strict {
            self.warnings.push(warning);
            return Ok(());
        }
        Err(match warning {
            ConstructionWarning::DanglingEdge { from, to } => {
                CodebookError::DanglingEdge { from, to }
            }
            ConstructionWarning::DuplicateNode(id) => CodebookError::DuplicateNode(id),
            ConstructionWarning::InvalidFormula { node, reason } => {
                CodebookError::DeserializationError(format!(
                    "invalid formula on node {}: {}",
                    node, reason
                ))
            }
        })
    }
}

fn build_node(
    desc: &NodeDescriptor,
    id: NodeId,
    style: DescriptorStyle,
    collector: &mut Collector,
) -> Result<Node, CodebookError> {
    let label = desc.label.clone().unwrap_or_else(|| id.to_string());
    let mut node = Node::new(id.clone())
        .with_label(label)
        .with_value(style.literal(&desc.value)?);

    if let Some(tag) = desc.formula_type.as_deref().filter(|t| !t.is_empty()) {
        match formula_from_parts(tag, &desc.formula_args, style) {
            Ok(formula) => node = node.with_formula(formula),
            Err(e) if collector.strict => return Err(e),
            Err(e) => collector.report(ConstructionWarning::InvalidFormula {
                node: id,
                reason: e.to_string(),
            })?,
        }
    }

    if let Some(sets) = &desc.valid_parent_sets {
        let sets: Vec<ParentSet> = sets
            .iter()
            .map(|set| set.iter().map(|p| style.node_id(p)).collect())
            .collect();
        node = node.with_valid_parent_sets(sets);
    }

    Ok(node)
}

/// Build a graph from a descriptor.
pub fn build_graph(
    descriptor: &GraphDescriptor,
    style: DescriptorStyle,
    options: BuildOptions,
) -> Result<BuiltGraph, CodebookError> {
    if descriptor.nodes.len() > MAX_DOCUMENT_NODES {
        return Err(CodebookError::DeserializationError(format!(
            "document has {} nodes, maximum is {}",
            descriptor.nodes.len(),
            MAX_DOCUMENT_NODES
        )));
    }
    if descriptor.edges.len() > MAX_DOCUMENT_EDGES {
        return Err(CodebookError::DeserializationError(format!(
            "document has {} edges, maximum is {}",
            descriptor.edges.len(),
            MAX_DOCUMENT_EDGES
        )));
    }

    let mut collector = Collector {
        strict: options.strict,
        warnings: Vec::new(),
    };
    let mut graph = Graph::new();
    let mut known: BTreeSet<NodeId> = BTreeSet::new();

    for desc in &descriptor.nodes {
        let id = style.node_id(&desc.id);
        if known.contains(&id) {
            collector.report(ConstructionWarning::DuplicateNode(id))?;
            continue;
        }
        graph.add_node(build_node(desc, id.clone(), style, &mut collector)?);
        known.insert(id);
    }

    for desc in &descriptor.edges {
        let source = style.node_id(&desc.source);
        let target = style.node_id(&desc.target);
        let dangling = !known.contains(&source) || !known.contains(&target);
        if dangling && !style.keeps_dangling_edges() {
            collector.report(ConstructionWarning::DanglingEdge {
                from: source,
                to: target,
            })?;
            continue;
        }
        graph.add_edge(Edge::new(source, target));
    }

    Ok(BuiltGraph {
        graph,
        warnings: collector.warnings,
    })
}

// =============================================================================
// EXTRACTOR BOUNDARY
// =============================================================================

/// Turns free-form text (a codebook or a reasoning trace) into a descriptor.
///
/// Implementations live outside this crate, typically behind a language
/// model. The engine only consumes their output.
pub trait GraphExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Result<GraphDescriptor, CodebookError>;
}

/// Run an extractor and build its descriptor.
pub fn extract_graph(
    extractor: &dyn GraphExtractor,
    text: &str,
    options: BuildOptions,
) -> Result<BuiltGraph, CodebookError> {
    extractor.extract(text)?.build(options)
}

// =============================================================================
// TESTS
// =============================================================================
