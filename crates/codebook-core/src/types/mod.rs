//! # Core Type Definitions
//!
//! This module contains the value-level types shared by every engine module:
//! - Node identifiers (`NodeId`)
//! - Node values (`Value`) and three-valued truth (`Truth`)
//! - Error types (`CodebookError`) and recoverable construction warnings
//!
//! ## Determinism Guarantees
//!
//! - `NodeId` implements `Ord` so it can key `BTreeMap`/`BTreeSet`
//! - `Truth` is an explicit three-case enum; "unknown" is never coerced to
//!   "false" by accident

use serde::{Deserialize, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use thiserror::Error;

// =============================================================================
// NODE IDENTIFIER
// =============================================================================

/// Identifier of a node, unique within one graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Create a new node identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-folded form used by the descriptor builder.
    #[must_use]
    pub fn folded(&self) -> Self {
        Self(self.0.to_lowercase())
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&NodeId> for NodeId {
    fn from(id: &NodeId) -> Self {
        id.clone()
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// THREE-VALUED TRUTH
// =============================================================================

/// Result of evaluating a formula: true, false, or not yet determinable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Truth {
    True,
    False,
    Unknown,
}

impl Truth {
    /// Returns `true` unless the value is `Unknown`.
    #[must_use]
    pub const fn is_known(self) -> bool {
        !matches!(self, Truth::Unknown)
    }

    /// Convert to an optional boolean.
    #[must_use]
    pub const fn to_bool(self) -> Option<bool> {
        match self {
            Truth::True => Some(true),
            Truth::False => Some(false),
            Truth::Unknown => None,
        }
    }

    /// Three-valued negation.
    #[must_use]
    pub const fn negate(self) -> Self {
        match self {
            Truth::True => Truth::False,
            Truth::False => Truth::True,
            Truth::Unknown => Truth::Unknown,
        }
    }
}

impl From<bool> for Truth {
    fn from(b: bool) -> Self {
        if b { Truth::True } else { Truth::False }
    }
}

impl fmt::Display for Truth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Truth::True => f.write_str("true"),
            Truth::False => f.write_str("false"),
            Truth::Unknown => f.write_str("unknown"),
        }
    }
}

// =============================================================================
// NODE VALUE
// =============================================================================

/// Value carried by a node.
///
/// Most nodes hold `Bool`; leaves feeding `Equal`/`In` formulas may hold
/// categorical (`Text`) or numeric values. `Unknown` marks an unset node.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Unknown,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Returns `true` unless the value is `Unknown`.
    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, Value::Unknown)
    }

    /// Truthiness used by the boolean connectives.
    ///
    /// Numbers are true when non-zero, text when non-empty.
    #[must_use]
    pub fn truth(&self) -> Truth {
        match self {
            Value::Unknown => Truth::Unknown,
            Value::Bool(b) => Truth::from(*b),
            Value::Int(n) => Truth::from(*n != 0),
            Value::Float(x) => Truth::from(*x != 0.0),
            Value::Text(s) => Truth::from(!s.is_empty()),
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(n) => Some(*n as f64),
            Value::Float(x) => Some(*x),
            Value::Unknown | Value::Text(_) => None,
        }
    }

    /// Comparison used by `Equal` and `In`.
    ///
    /// Booleans, integers and floats compare numerically (`true == 1`);
    /// text compares with text only. `Unknown` never matches.
    #[must_use]
    pub fn matches(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// Comparison used when metrics check node values.
    ///
    /// Like [`Value::matches`], except two unknown values agree.
    #[must_use]
    pub fn agrees_with(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Unknown, Value::Unknown) => true,
            _ => self.matches(other),
        }
    }

    /// Parse a literal written as text by an extractor.
    ///
    /// Tries boolean, then integer, then finite float; anything else stays
    /// text, so `NaN` and `inf` are read as words.
    #[must_use]
    pub fn parse_literal(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("true") {
            return Value::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Value::Bool(false);
        }
        if let Ok(n) = trimmed.parse::<i64>() {
            return Value::Int(n);
        }
        if let Some(x) = trimmed.parse::<f64>().ok().filter(|x| x.is_finite()) {
            return Value::Float(x);
        }
        Value::Text(trimmed.to_string())
    }

    /// Convert a JSON scalar into a value. `null` becomes `Unknown`.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, CodebookError> {
        match json {
            serde_json::Value::Null => Ok(Value::Unknown),
            serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Int(i))
                } else if let Some(x) = n.as_f64() {
                    Ok(Value::Float(x))
                } else {
                    Err(CodebookError::InvalidLiteral(n.to_string()))
                }
            }
            serde_json::Value::String(s) => Ok(Value::Text(s.clone())),
            other => Err(CodebookError::InvalidLiteral(other.to_string())),
        }
    }

    /// Convert into a JSON scalar. `Unknown` and non-finite floats become `null`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Unknown => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Float(x) => serde_json::Number::from_f64(*x)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
        }
    }

    /// Convert into a JSON scalar for a persisted document.
    ///
    /// Non-finite floats have no JSON form and are rejected.
    pub fn to_document_json(&self) -> Result<serde_json::Value, CodebookError> {
        match self {
            Value::Float(x) if !x.is_finite() => Err(CodebookError::InvalidLiteral(x.to_string())),
            other => Ok(other.to_json()),
        }
    }

    /// Stable rendering used inside formula signatures.
    pub(crate) fn signature_literal(&self) -> String {
        match self {
            Value::Unknown => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(x) => format!("{:?}", x),
            Value::Text(s) => format!("{:?}", s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Truth> for Value {
    fn from(t: Truth) -> Self {
        match t.to_bool() {
            Some(b) => Value::Bool(b),
            None => Value::Unknown,
        }
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Unknown)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unknown => f.write_str("unknown"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{:?}", s),
        }
    }
}

// =============================================================================
// CONSTRUCTION WARNINGS
// =============================================================================

/// A recoverable problem found while building a graph from a descriptor.
///
/// In lenient mode these are collected and returned next to the graph;
/// in strict mode the first one aborts construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstructionWarning {
    /// An edge names a node id that is not part of the node set. The edge was dropped.
    DanglingEdge { from: NodeId, to: NodeId },
    /// A node's formula could not be built. The node was kept without a formula.
    InvalidFormula { node: NodeId, reason: String },
    /// A node id appeared more than once. Later occurrences were dropped.
    DuplicateNode(NodeId),
}

impl fmt::Display for ConstructionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstructionWarning::DanglingEdge { from, to } => write!(
                f,
                "Edge {} -> {} references non-existent node, skipping",
                from, to
            ),
            ConstructionWarning::InvalidFormula { node, reason } => write!(
                f,
                "Node {} has an invalid formula ({}), keeping it without one",
                node, reason
            ),
            ConstructionWarning::DuplicateNode(id) => write!(
                f,
                "Node {} is defined more than once, keeping the first definition",
                id
            ),
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the codebook engine.
///
/// - Construction errors abort building a formula or graph
/// - Precondition errors abort a single operation on an existing graph
/// - Metric degeneracies (mismatches, hallucinations) are never errors
#[derive(Debug, Error)]
pub enum CodebookError {
    /// The formula variant tag is not one of the six known variants.
    #[error("Unknown formula type: {0}")]
    UnknownFormulaType(String),

    /// A formula variant received the wrong number of arguments.
    #[error("{formula} formula requires {expected} argument(s), got {got}")]
    InvalidArity {
        formula: &'static str,
        expected: &'static str,
        got: usize,
    },

    /// A formula argument has the wrong shape (e.g. a number where a node id is expected).
    #[error("Invalid {formula} argument: {reason}")]
    InvalidOperand {
        formula: &'static str,
        reason: String,
    },

    /// A literal could not be converted into a node value.
    #[error("Invalid literal: {0}")]
    InvalidLiteral(String),

    /// A node id was defined twice (strict construction only).
    #[error("Duplicate node: {0}")]
    DuplicateNode(NodeId),

    /// An edge references a node that does not exist (strict construction only).
    #[error("Edge {from} -> {to} references non-existent node")]
    DanglingEdge { from: NodeId, to: NodeId },

    /// Evaluation was requested while some leaves have no value.
    #[error("Graph has undefined leaf node values: {0:?}")]
    UndefinedLeafValues(Vec<NodeId>),

    /// The graph does not have exactly one node without outgoing edges.
    #[error("Graph must have exactly one end node, found {found}")]
    TerminalNodeCount { found: usize },

    /// The requested node was not found in the graph.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truth_negation_keeps_unknown() {
        assert_eq!(Truth::True.negate(), Truth::False);
        assert_eq!(Truth::False.negate(), Truth::True);
        assert_eq!(Truth::Unknown.negate(), Truth::Unknown);
    }

    #[test]
    fn value_truthiness() {
        assert_eq!(Value::Unknown.truth(), Truth::Unknown);
        assert_eq!(Value::Int(0).truth(), Truth::False);
        assert_eq!(Value::Float(0.5).truth(), Truth::True);
        assert_eq!(Value::from("").truth(), Truth::False);
        assert_eq!(Value::from("x").truth(), Truth::True);
    }

    #[test]
    fn matches_compares_numbers_across_kinds() {
        assert!(Value::Bool(true).matches(&Value::Int(1)));
        assert!(Value::Int(3).matches(&Value::Float(3.0)));
        assert!(!Value::from("1").matches(&Value::Int(1)));
        assert!(!Value::Unknown.matches(&Value::Unknown));
        assert!(Value::Unknown.agrees_with(&Value::Unknown));
    }

    #[test]
    fn parse_literal_order() {
        assert_eq!(Value::parse_literal(" TRUE "), Value::Bool(true));
        assert_eq!(Value::parse_literal("42"), Value::Int(42));
        assert_eq!(Value::parse_literal("2.5"), Value::Float(2.5));
        assert_eq!(Value::parse_literal("fantasy"), Value::from("fantasy"));
        assert_eq!(Value::parse_literal("NaN"), Value::from("NaN"));
        assert_eq!(Value::parse_literal("inf"), Value::from("inf"));
    }

    #[test]
    fn json_scalars_convert() {
        let v = Value::from_json(&serde_json::json!(null)).expect("null");
        assert_eq!(v, Value::Unknown);
        let v = Value::from_json(&serde_json::json!(7)).expect("int");
        assert_eq!(v.to_json(), serde_json::json!(7));
        assert!(Value::from_json(&serde_json::json!([1, 2])).is_err());
    }

    #[test]
    fn non_finite_floats_have_no_document_form() {
        assert_eq!(Value::Float(2.5).to_document_json().expect("finite"), serde_json::json!(2.5));
        assert!(matches!(
            Value::Float(f64::NAN).to_document_json(),
            Err(CodebookError::InvalidLiteral(_))
        ));
        assert!(Value::Float(f64::INFINITY).to_document_json().is_err());
    }

    #[test]
    fn node_id_borrows_as_str() {
        let mut set = std::collections::BTreeSet::new();
        set.insert(NodeId::from("Dense"));
        assert!(set.contains("Dense"));
        assert_eq!(NodeId::from("Dense").folded().as_str(), "dense");
    }
}
