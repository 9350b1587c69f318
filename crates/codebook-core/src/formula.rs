//! # Formula Engine
//!
//! The closed set of boolean formulas a derived node can carry.
//!
//! Every variant supports three operations:
//! - `compute`: three-valued evaluation against the known input values
//! - `required_keys`: every node id the formula reads, flattened through nesting
//! - `valid_parent_sets`: the minimal sets of parents that make the node
//!   validly derived, used by [`crate::metrics`] to accept minimal derivations
//!
//! Formula trees are immutable values. Nodes share them through `Arc`, so
//! copying a graph never copies a formula.

use crate::primitives::MAX_POWERSET_KEYS;
use crate::{CodebookError, NodeId, Truth, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// A set of parent node ids.
pub type ParentSet = BTreeSet<NodeId>;

/// Known input values keyed by node id.
pub type Inputs = BTreeMap<NodeId, Value>;

// =============================================================================
// FORMULA KIND
// =============================================================================

/// Variant tag of a formula, as written in descriptors (`"formula_type"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FormulaKind {
    Not,
    And,
    Or,
    Xor,
    Equal,
    In,
}

impl FormulaKind {
    /// Get the descriptor tag.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            FormulaKind::Not => "Not",
            FormulaKind::And => "And",
            FormulaKind::Or => "Or",
            FormulaKind::Xor => "Xor",
            FormulaKind::Equal => "Equal",
            FormulaKind::In => "In",
        }
    }
}

impl FromStr for FormulaKind {
    type Err = CodebookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Not" => Ok(FormulaKind::Not),
            "And" => Ok(FormulaKind::And),
            "Or" => Ok(FormulaKind::Or),
            "Xor" => Ok(FormulaKind::Xor),
            "Equal" => Ok(FormulaKind::Equal),
            "In" => Ok(FormulaKind::In),
            other => Err(CodebookError::UnknownFormulaType(other.to_string())),
        }
    }
}

impl fmt::Display for FormulaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// OPERAND
// =============================================================================

/// Argument of a boolean connective: a node id or a nested formula.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Key(NodeId),
    Formula(Box<Formula>),
}

impl Operand {
    fn eval(&self, inputs: &Inputs) -> Truth {
        match self {
            Operand::Key(id) => inputs.get(id).map_or(Truth::Unknown, Value::truth),
            Operand::Formula(inner) => inner.compute(inputs),
        }
    }

    fn collect_keys(&self, keys: &mut Vec<NodeId>) {
        match self {
            Operand::Key(id) => keys.push(id.clone()),
            Operand::Formula(inner) => inner.collect_keys(keys),
        }
    }

    fn render<F: Fn(&NodeId) -> String>(&self, rename: &F, sep: &str) -> String {
        match self {
            Operand::Key(id) => rename(id),
            Operand::Formula(inner) => inner.render(rename, sep),
        }
    }
}

impl From<&str> for Operand {
    fn from(s: &str) -> Self {
        Operand::Key(NodeId::from(s))
    }
}

impl From<String> for Operand {
    fn from(s: String) -> Self {
        Operand::Key(NodeId::from(s))
    }
}

impl From<NodeId> for Operand {
    fn from(id: NodeId) -> Self {
        Operand::Key(id)
    }
}

impl From<Formula> for Operand {
    fn from(f: Formula) -> Self {
        Operand::Formula(Box::new(f))
    }
}

// =============================================================================
// FORMULA
// =============================================================================

/// A boolean formula over node values.
#[derive(Debug, Clone, PartialEq)]
pub enum Formula {
    Not(Operand),
    And(Vec<Operand>),
    Or(Vec<Operand>),
    Xor(Vec<Operand>),
    Equal { key: NodeId, value: Value },
    In { key: NodeId, values: Vec<Value> },
}

fn operands<I, O>(ops: I) -> Vec<Operand>
where
    I: IntoIterator<Item = O>,
    O: Into<Operand>,
{
    ops.into_iter().map(Into::into).collect()
}

impl Formula {
    /// `Not(x)`.
    #[must_use]
    pub fn not(operand: impl Into<Operand>) -> Self {
        Formula::Not(operand.into())
    }

    /// `And(x₁, …, xₙ)`.
    #[must_use]
    pub fn and<I, O>(ops: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<Operand>,
    {
        Formula::And(operands(ops))
    }

    /// `Or(x₁, …, xₙ)`.
    #[must_use]
    pub fn or<I, O>(ops: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<Operand>,
    {
        Formula::Or(operands(ops))
    }

    /// `Xor(x₁, …, xₙ)`.
    #[must_use]
    pub fn xor<I, O>(ops: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<Operand>,
    {
        Formula::Xor(operands(ops))
    }

    /// `Equal(key, value)`.
    #[must_use]
    pub fn equal(key: impl Into<NodeId>, value: impl Into<Value>) -> Self {
        Formula::Equal {
            key: key.into(),
            value: value.into(),
        }
    }

    /// `In(key, values)`.
    #[must_use]
    pub fn is_in<I, V>(key: impl Into<NodeId>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Formula::In {
            key: key.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Get the variant tag.
    #[must_use]
    pub fn kind(&self) -> FormulaKind {
        match self {
            Formula::Not(_) => FormulaKind::Not,
            Formula::And(_) => FormulaKind::And,
            Formula::Or(_) => FormulaKind::Or,
            Formula::Xor(_) => FormulaKind::Xor,
            Formula::Equal { .. } => FormulaKind::Equal,
            Formula::In { .. } => FormulaKind::In,
        }
    }

    /// Evaluate the formula against the currently known input values.
    ///
    /// Missing keys and `Value::Unknown` entries both count as unknown.
    #[must_use]
    pub fn compute(&self, inputs: &Inputs) -> Truth {
        match self {
            Formula::Not(op) => op.eval(inputs).negate(),
            Formula::And(ops) => {
                let values: Vec<Truth> = ops.iter().map(|op| op.eval(inputs)).collect();
                if values.contains(&Truth::Unknown) {
                    Truth::Unknown
                } else {
                    Truth::from(values.iter().all(|t| *t == Truth::True))
                }
            }
            Formula::Or(ops) => {
                let values: Vec<Truth> = ops.iter().map(|op| op.eval(inputs)).collect();
                if values.contains(&Truth::True) {
                    Truth::True
                } else if values.contains(&Truth::Unknown) {
                    Truth::Unknown
                } else {
                    Truth::False
                }
            }
            Formula::Xor(ops) => {
                let values: Vec<Truth> = ops.iter().map(|op| op.eval(inputs)).collect();
                if values.contains(&Truth::Unknown) {
                    Truth::Unknown
                } else {
                    Truth::from(values.iter().filter(|t| **t == Truth::True).count() == 1)
                }
            }
            Formula::Equal { key, value } => match inputs.get(key) {
                Some(v) if v.is_known() => Truth::from(v.matches(value)),
                _ => Truth::Unknown,
            },
            Formula::In { key, values } => match inputs.get(key) {
                Some(v) if v.is_known() => Truth::from(values.iter().any(|c| v.matches(c))),
                _ => Truth::Unknown,
            },
        }
    }

    fn collect_keys(&self, keys: &mut Vec<NodeId>) {
        match self {
            Formula::Not(op) => op.collect_keys(keys),
            Formula::And(ops) | Formula::Or(ops) | Formula::Xor(ops) => {
                for op in ops {
                    op.collect_keys(keys);
                }
            }
            Formula::Equal { key, .. } | Formula::In { key, .. } => keys.push(key.clone()),
        }
    }

    /// Every node id the formula reads, in argument order, nesting flattened.
    #[must_use]
    pub fn required_keys(&self) -> Vec<NodeId> {
        let mut keys = Vec::new();
        self.collect_keys(&mut keys);
        keys
    }

    /// Minimal parent combinations that make a node carrying this formula
    /// validly derived.
    ///
    /// - `Not`, `And`, `Equal`, `In`: one set holding every required key
    /// - `Or`: every non-empty subset of the keys (singletons only past
    ///   [`MAX_POWERSET_KEYS`])
    /// - `Xor`: one singleton per key
    #[must_use]
    pub fn valid_parent_sets(&self) -> Vec<ParentSet> {
        match self {
            Formula::Not(_) | Formula::And(_) | Formula::Equal { .. } | Formula::In { .. } => {
                vec![self.required_keys().into_iter().collect()]
            }
            Formula::Or(_) => {
                let keys = distinct_keys(self.required_keys());
                if keys.len() > MAX_POWERSET_KEYS {
                    return singletons(keys);
                }
                let mut sets = Vec::new();
                for size in 1..=keys.len() {
                    combinations(&keys, size, 0, &mut Vec::new(), &mut sets);
                }
                sets
            }
            Formula::Xor(_) => singletons(distinct_keys(self.required_keys())),
        }
    }

    /// Canonical structural signature.
    ///
    /// Variant tag plus ordered argument signatures; node ids render as
    /// themselves and literals in a stable form.
    #[must_use]
    pub fn signature(&self) -> String {
        self.signature_with(&|id: &NodeId| id.to_string())
    }

    /// Signature with every node id passed through `rename`.
    ///
    /// Used for identifier-agnostic comparison, where ids are replaced by
    /// positions.
    #[must_use]
    pub fn signature_with<F: Fn(&NodeId) -> String>(&self, rename: &F) -> String {
        self.render(rename, ",")
    }

    fn render<F: Fn(&NodeId) -> String>(&self, rename: &F, sep: &str) -> String {
        let args: Vec<String> = match self {
            Formula::Not(op) => vec![op.render(rename, sep)],
            Formula::And(ops) | Formula::Or(ops) | Formula::Xor(ops) => {
                ops.iter().map(|op| op.render(rename, sep)).collect()
            }
            Formula::Equal { key, value } => vec![rename(key), value.signature_literal()],
            Formula::In { key, values } => {
                let literals: Vec<String> = values.iter().map(Value::signature_literal).collect();
                vec![rename(key), format!("[{}]", literals.join(sep))]
            }
        };
        format!("{}({})", self.kind(), args.join(sep))
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(&|id: &NodeId| id.to_string(), ", "))
    }
}

fn distinct_keys(keys: Vec<NodeId>) -> Vec<NodeId> {
    let mut seen = BTreeSet::new();
    keys.into_iter()
        .filter(|k| seen.insert(k.clone()))
        .collect()
}

fn singletons(keys: Vec<NodeId>) -> Vec<ParentSet> {
    keys.into_iter()
        .map(|k| std::iter::once(k).collect())
        .collect()
}

/// Push every `size`-combination of `keys[start..]` extending `current`,
/// in lexicographic index order.
fn combinations(
    keys: &[NodeId],
    size: usize,
    start: usize,
    current: &mut Vec<NodeId>,
    out: &mut Vec<ParentSet>,
) {
    if current.len() == size {
        out.push(current.iter().cloned().collect());
        return;
    }
    for (i, key) in keys.iter().enumerate().skip(start) {
        current.push(key.clone());
        combinations(keys, size, i + 1, current, out);
        current.pop();
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(pairs: &[(&str, Value)]) -> Inputs {
        pairs
            .iter()
            .map(|(k, v)| (NodeId::from(*k), v.clone()))
            .collect()
    }

    fn set(ids: &[&str]) -> ParentSet {
        ids.iter().map(|id| NodeId::from(*id)).collect()
    }

    #[test]
    fn partial_assignments() {
        let partial = inputs(&[("a", Value::Unknown), ("b", Value::Bool(true))]);
        assert_eq!(Formula::or(["a", "b"]).compute(&partial), Truth::True);
        assert_eq!(Formula::and(["a", "b"]).compute(&partial), Truth::Unknown);
        assert_eq!(Formula::xor(["a", "b"]).compute(&partial), Truth::Unknown);
    }

    #[test]
    fn or_unknown_without_true() {
        let partial = inputs(&[("b", Value::Bool(false))]);
        assert_eq!(Formula::or(["a", "b"]).compute(&partial), Truth::Unknown);
        assert_eq!(Formula::or(["a", "b"]).compute(&Inputs::new()), Truth::Unknown);
    }

    #[test]
    fn empty_connectives() {
        let none = Inputs::new();
        assert_eq!(Formula::and(Vec::<&str>::new()).compute(&none), Truth::True);
        assert_eq!(Formula::or(Vec::<&str>::new()).compute(&none), Truth::False);
        assert_eq!(Formula::xor(Vec::<&str>::new()).compute(&none), Truth::False);
    }

    #[test]
    fn xor_exactly_one() {
        let values = inputs(&[
            ("a", Value::Bool(true)),
            ("b", Value::Bool(true)),
            ("c", Value::Bool(false)),
        ]);
        assert_eq!(Formula::xor(["a", "b"]).compute(&values), Truth::False);
        assert_eq!(Formula::xor(["a", "c"]).compute(&values), Truth::True);
    }

    #[test]
    fn equal_and_in_use_raw_values() {
        let values = inputs(&[("genre", Value::from("fantasy")), ("pages", Value::Int(120))]);
        assert_eq!(Formula::equal("genre", "fantasy").compute(&values), Truth::True);
        assert_eq!(Formula::equal("pages", 121i64).compute(&values), Truth::False);
        assert_eq!(
            Formula::is_in("genre", ["horror", "fantasy"]).compute(&values),
            Truth::True
        );
        assert_eq!(Formula::equal("missing", true).compute(&values), Truth::Unknown);
    }

    #[test]
    fn nested_formulas_evaluate_and_flatten() {
        let formula = Formula::and([
            Operand::from("a"),
            Operand::from(Formula::not("b")),
        ]);
        let values = inputs(&[("a", Value::Bool(true)), ("b", Value::Bool(false))]);
        assert_eq!(formula.compute(&values), Truth::True);
        assert_eq!(
            formula.required_keys(),
            vec![NodeId::from("a"), NodeId::from("b")]
        );
    }

    #[test]
    fn parent_set_shapes() {
        assert_eq!(
            Formula::or(["a", "b"]).valid_parent_sets(),
            vec![set(&["a"]), set(&["b"]), set(&["a", "b"])]
        );
        assert_eq!(
            Formula::xor(["a", "b"]).valid_parent_sets(),
            vec![set(&["a"]), set(&["b"])]
        );
        assert_eq!(
            Formula::and(["a", "b"]).valid_parent_sets(),
            vec![set(&["a", "b"])]
        );
        assert_eq!(Formula::not("a").valid_parent_sets(), vec![set(&["a"])]);
        assert_eq!(
            Formula::is_in("a", [1i64, 2]).valid_parent_sets(),
            vec![set(&["a"])]
        );
    }

    #[test]
    fn or_powerset_size() {
        let sets = Formula::or(["a", "b", "c", "d"]).valid_parent_sets();
        assert_eq!(sets.len(), 15);
        assert!(sets.iter().all(|s| !s.is_empty()));
    }

    #[test]
    fn wide_or_falls_back_to_singletons() {
        let keys: Vec<String> = (0..=MAX_POWERSET_KEYS).map(|i| format!("k{}", i)).collect();
        let sets = Formula::or(keys.clone()).valid_parent_sets();
        assert_eq!(sets.len(), keys.len());
    }

    #[test]
    fn duplicate_disjuncts_are_merged() {
        let sets = Formula::or(["a", "a"]).valid_parent_sets();
        assert_eq!(sets, vec![set(&["a"])]);
    }

    #[test]
    fn signatures() {
        let formula = Formula::or([Operand::from("a"), Operand::from(Formula::not("b"))]);
        assert_eq!(formula.signature(), "Or(a,Not(b))");
        assert_eq!(formula.to_string(), "Or(a, Not(b))");
        assert_eq!(
            formula.signature_with(&|id: &NodeId| format!("#{}", id.as_str().len())),
            "Or(#1,Not(#1))"
        );
        assert_eq!(
            Formula::is_in("a", ["x", "y"]).signature(),
            "In(a,[\"x\",\"y\"])"
        );
        assert_ne!(
            Formula::equal("a", true).signature(),
            Formula::equal("a", "true").signature()
        );
    }

    #[test]
    fn kind_parses_tags() {
        assert_eq!("Xor".parse::<FormulaKind>().expect("tag"), FormulaKind::Xor);
        assert!(matches!(
            "Nand".parse::<FormulaKind>(),
            Err(CodebookError::UnknownFormulaType(_))
        ));
    }
}
