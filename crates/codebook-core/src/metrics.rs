//! # Match Metrics
//!
//! Scores a predicted derivation (a reasoning trace extracted from text)
//! against a reference codebook graph.
//!
//! Edge metrics accept minimal derivations: a predicted graph that supports a
//! node through only one disjunct of an `Or`, or through one input of a
//! `Xor`, is not penalised for the reference edges it left out. Omitting a
//! conjunct of an `And` is.
//!
//! Mismatches, hallucinations and incomplete derivations are reported as
//! metric values. The only error is a reference graph without a unique
//! terminal node.

use crate::formula::ParentSet;
use crate::graph::{Edge, Graph, Node};
use crate::{CodebookError, Value};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::ops::AddAssign;

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// Binary confusion counts over node values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ClassificationCounts {
    pub tp: u64,
    pub fp: u64,
    pub tn: u64,
    #[serde(rename = "fn")]
    pub fn_: u64,
}

impl ClassificationCounts {
    /// Counts for one (predicted, reference) pair.
    ///
    /// A pair where either side is unknown contributes nothing.
    #[must_use]
    pub fn of(predicted: &Value, reference: &Value) -> Self {
        match (predicted.truth().to_bool(), reference.truth().to_bool()) {
            (Some(p), Some(r)) => Self {
                tp: u64::from(p && r),
                fp: u64::from(p && !r),
                tn: u64::from(!p && !r),
                fn_: u64::from(!p && r),
            },
            _ => Self::default(),
        }
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.tp + self.fp + self.tn + self.fn_
    }

    /// Derive rates. Every division by zero yields `0.0`.
    #[must_use]
    pub fn scores(&self) -> ClassificationScores {
        let total = self.total();
        if total == 0 {
            return ClassificationScores::default();
        }

        let ratio = |num: u64, den: u64| if den > 0 { num as f64 / den as f64 } else { 0.0 };
        let accuracy = ratio(self.tp + self.tn, total);
        let precision = ratio(self.tp, self.tp + self.fp);
        let recall = ratio(self.tp, self.tp + self.fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        ClassificationScores {
            accuracy,
            precision,
            recall,
            f1,
        }
    }
}

impl AddAssign for ClassificationCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.tp += rhs.tp;
        self.fp += rhs.fp;
        self.tn += rhs.tn;
        self.fn_ += rhs.fn_;
    }
}

/// Accuracy, precision, recall and F1.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ClassificationScores {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl ClassificationScores {
    /// The best possible scores.
    pub const IDEAL: Self = Self {
        accuracy: 1.0,
        precision: 1.0,
        recall: 1.0,
        f1: 1.0,
    };
}

impl fmt::Display for ClassificationScores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:?}, {:?}, {:?}, {:?})",
            self.accuracy, self.precision, self.recall, self.f1
        )
    }
}

// =============================================================================
// MATCH METRICS
// =============================================================================

/// Compares a predicted graph to a reference graph.
#[derive(Debug, Clone, Copy)]
pub struct MatchMetrics<'a> {
    reference: &'a Graph,
    predicted: &'a Graph,
}

impl<'a> MatchMetrics<'a> {
    #[must_use]
    pub fn new(reference: &'a Graph, predicted: &'a Graph) -> Self {
        Self {
            reference,
            predicted,
        }
    }

    fn reference_edges(&self) -> BTreeSet<&'a Edge> {
        self.reference.edges().iter().collect()
    }

    fn predicted_edges(&self) -> BTreeSet<&'a Edge> {
        self.predicted.edges().iter().collect()
    }

    /// Whether the target of `edge` carries the same value in both graphs.
    fn target_values_agree(&self, edge: &Edge) -> bool {
        match (
            self.reference.node(edge.target.as_str()),
            self.predicted.node(edge.target.as_str()),
        ) {
            (Some(r), Some(p)) => r.value.agrees_with(&p.value),
            _ => false,
        }
    }

    /// Predicted edges that also exist in the reference.
    ///
    /// With `check_values`, the target node must also carry the same value in
    /// both graphs.
    #[must_use]
    pub fn correct_reasoning_edges(&self, check_values: bool) -> usize {
        let reference = self.reference_edges();
        self.predicted
            .edges()
            .iter()
            .filter(|e| reference.contains(e))
            .filter(|e| !check_values || self.target_values_agree(e))
            .count()
    }

    /// Predicted edges absent from the reference.
    #[must_use]
    pub fn hallucinated_reasoning_edges(&self) -> usize {
        let reference = self.reference_edges();
        self.predicted
            .edges()
            .iter()
            .filter(|e| !reference.contains(e))
            .count()
    }

    /// Whether a reference edge is needed for its target to be validly
    /// derived in the predicted graph.
    ///
    /// A target with no valid parent sets (an empty `Xor`) can never be
    /// completed, so no edge into it is required.
    #[must_use]
    pub fn is_edge_required(&self, edge: &Edge) -> bool {
        let Some(target) = self.predicted.node(edge.target.as_str()) else {
            return false;
        };
        if !target.is_derived() {
            return false;
        }
        let Some(valid_sets) = target.valid_parent_sets() else {
            return false;
        };

        let mut parents = self.predicted.parent_set(target.id.as_str());
        if covers_any(&parents, &valid_sets) {
            return false;
        }
        if !valid_sets.iter().any(|set| set.contains(&edge.source)) {
            return false;
        }

        parents.insert(edge.source.clone());
        covers_any(&parents, &valid_sets)
    }

    /// Reference edges absent from the predicted graph that its derivation
    /// actually needs.
    ///
    /// `check_values` is accepted for symmetry with the other edge metrics;
    /// derivation completeness does not depend on node values.
    #[must_use]
    pub fn missing_reasoning_edges(&self, _check_values: bool) -> usize {
        let predicted = self.predicted_edges();
        self.reference
            .edges()
            .iter()
            .filter(|e| !predicted.contains(e))
            .filter(|e| self.is_edge_required(e))
            .count()
    }

    /// Whether a predicted node's incoming parents cover one of its valid
    /// parent sets. Leaves and formula-less nodes always pass.
    #[must_use]
    pub fn has_valid_path(&self, node: &Node) -> bool {
        if !node.is_derived() || self.predicted.is_leaf(node.id.as_str()) {
            return true;
        }
        match node.valid_parent_sets() {
            Some(valid_sets) => {
                covers_any(&self.predicted.parent_set(node.id.as_str()), &valid_sets)
            }
            None => true,
        }
    }

    /// Whether the predicted graph is a valid, possibly minimal, match.
    #[must_use]
    pub fn full_graph_match(&self, check_values: bool) -> bool {
        if self.hallucinated_reasoning_edges() > 0 {
            return false;
        }
        if self.correct_reasoning_edges(check_values) != self.predicted.edge_count() {
            return false;
        }
        if !self.predicted.nodes().iter().all(|n| self.has_valid_path(n)) {
            return false;
        }
        self.missing_reasoning_edges(check_values) == 0
    }

    /// Longest chain of reference nodes, walking back from the terminal,
    /// that the predicted graph reproduces.
    ///
    /// Breadth-first over the reference's incoming edges. A branch stops at
    /// the first node missing from the prediction (or, with `check_values`,
    /// carrying a different value). A node re-reached without a longer path
    /// is not expanded again, which keeps the walk bounded on diamonds.
    pub fn longest_correct_reasoning_path(&self, check_values: bool) -> Result<usize, CodebookError> {
        let terminal = self.reference.terminal_node()?;
        let limit = self.reference.node_count();

        let mut best: BTreeMap<&str, usize> = BTreeMap::new();
        let mut queue: VecDeque<(&Node, usize)> = VecDeque::from([(terminal, 1)]);
        let mut longest = 0;

        while let Some((node, length)) = queue.pop_front() {
            let Some(predicted) = self.predicted.node(node.id.as_str()) else {
                continue;
            };
            if check_values && !predicted.value.agrees_with(&node.value) {
                continue;
            }
            if best.get(node.id.as_str()).is_some_and(|&seen| seen >= length) {
                continue;
            }
            best.insert(node.id.as_str(), length);
            longest = longest.max(length);

            if length < limit {
                for parent in self.reference.incoming_nodes(node.id.as_str()) {
                    queue.push_back((parent, length + 1));
                }
            }
        }

        Ok(longest)
    }

    /// Classification scores of the reference terminal node's value.
    ///
    /// All zero when the predicted graph lacks the node.
    pub fn end_node_metrics(&self) -> Result<ClassificationScores, CodebookError> {
        let terminal = self.reference.terminal_node()?;
        Ok(self
            .predicted
            .node(terminal.id.as_str())
            .map(|p| ClassificationCounts::of(&p.value, &terminal.value).scores())
            .unwrap_or_default())
    }

    /// Confusion counts accumulated over every node id present in both graphs.
    #[must_use]
    pub fn node_counts(&self) -> ClassificationCounts {
        let mut counts = ClassificationCounts::default();
        for reference in self.reference.nodes() {
            if let Some(predicted) = self.predicted.node(reference.id.as_str()) {
                counts += ClassificationCounts::of(&predicted.value, &reference.value);
            }
        }
        counts
    }

    /// Classification scores over every node shared by both graphs.
    #[must_use]
    pub fn average_node_metrics(&self) -> ClassificationScores {
        self.node_counts().scores()
    }

    /// Every metric at once.
    pub fn report(&self, check_values: bool) -> Result<MetricsReport, CodebookError> {
        Ok(MetricsReport {
            check_values,
            end_node: self.end_node_metrics()?,
            average_node: self.average_node_metrics(),
            longest_correct_reasoning_path: self.longest_correct_reasoning_path(check_values)?,
            correct_reasoning_edges: self.correct_reasoning_edges(check_values),
            reference_edges: self.reference.edge_count(),
            missing_reasoning_edges: self.missing_reasoning_edges(check_values),
            hallucinated_reasoning_edges: self.hallucinated_reasoning_edges(),
            full_graph_match: self.full_graph_match(check_values),
        })
    }
}

fn covers_any(parents: &ParentSet, valid_sets: &[ParentSet]) -> bool {
    valid_sets.iter().any(|set| set.is_subset(parents))
}

// =============================================================================
// REPORT
// =============================================================================

/// All match metrics for one (reference, predicted) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    pub check_values: bool,
    pub end_node: ClassificationScores,
    pub average_node: ClassificationScores,
    pub longest_correct_reasoning_path: usize,
    pub correct_reasoning_edges: usize,
    /// Ideal value of `correct_reasoning_edges`.
    pub reference_edges: usize,
    pub missing_reasoning_edges: usize,
    pub hallucinated_reasoning_edges: usize,
    pub full_graph_match: bool,
}

impl fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ideal = ClassificationScores::IDEAL;
        writeln!(
            f,
            "End Node Metrics (Acc, Prec, Rec, F1): {} (Ideal: {})",
            self.end_node, ideal
        )?;
        writeln!(
            f,
            "Average Node Metrics (Acc, Prec, Rec, F1): {} (Ideal: {})",
            self.average_node, ideal
        )?;
        writeln!(
            f,
            "Longest Correct Reasoning Path (Depth): {}",
            self.longest_correct_reasoning_path
        )?;
        writeln!(
            f,
            "Correct Reasoning Edges: {} (Ideal: {})",
            self.correct_reasoning_edges, self.reference_edges
        )?;
        writeln!(
            f,
            "Missing Reasoning Edges: {} (Ideal: 0)",
            self.missing_reasoning_edges
        )?;
        writeln!(
            f,
            "Hallucinated Reasoning Edges (Count): {} (Ideal: 0)",
            self.hallucinated_reasoning_edges
        )?;
        writeln!(
            f,
            "Full Graph Match: {} (Ideal: true)",
            self.full_graph_match
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
