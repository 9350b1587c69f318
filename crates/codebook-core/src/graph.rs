//! # Graph Model
//!
//! Nodes, edges, and the append-only codebook graph.
//!
//! Nodes and edges keep their insertion order. Every traversal is seeded in
//! that order, so evaluation is deterministic for a given construction
//! sequence.

use crate::formula::{Formula, Inputs, ParentSet};
use crate::{CodebookError, NodeId, Truth, Value};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::sync::Arc;

// =============================================================================
// NODE
// =============================================================================

/// A concept in the codebook graph.
///
/// Leaf nodes get their value from outside; derived nodes carry a formula.
/// Cloning a node shares its formula.
#[derive(Debug, Clone)]
pub struct Node {
    /// Identifier, unique within a graph.
    pub id: NodeId,
    /// Display label. Defaults to the id.
    pub label: String,
    /// Current value.
    pub value: Value,
    /// Formula deriving this node from its parents.
    pub formula: Option<Arc<Formula>>,
    /// Explicit valid parent sets, overriding the ones derived from the formula.
    pub valid_parent_sets: Option<Vec<ParentSet>>,
}

impl Node {
    /// Create a new node with an unknown value and no formula.
    #[must_use]
    pub fn new(id: impl Into<NodeId>) -> Self {
        let id = id.into();
        Self {
            label: id.to_string(),
            id,
            value: Value::Unknown,
            formula: None,
            valid_parent_sets: None,
        }
    }

    /// Set the display label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the initial value.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = value.into();
        self
    }

    /// Attach a formula.
    #[must_use]
    pub fn with_formula(self, formula: Formula) -> Self {
        self.with_shared_formula(Arc::new(formula))
    }

    /// Attach a formula shared with other nodes or graphs.
    #[must_use]
    pub fn with_shared_formula(mut self, formula: Arc<Formula>) -> Self {
        self.formula = Some(formula);
        self
    }

    /// Override the valid parent sets derived from the formula.
    #[must_use]
    pub fn with_valid_parent_sets(mut self, sets: Vec<ParentSet>) -> Self {
        self.valid_parent_sets = Some(sets);
        self
    }

    /// Assign a value.
    pub fn set_value(&mut self, value: impl Into<Value>) {
        self.value = value.into();
    }

    /// Returns `true` if the node carries a formula.
    #[must_use]
    pub fn is_derived(&self) -> bool {
        self.formula.is_some()
    }

    /// Evaluate the node's formula. `Unknown` for formula-less nodes.
    #[must_use]
    pub fn compute_value(&self, inputs: &Inputs) -> Truth {
        self.formula
            .as_ref()
            .map_or(Truth::Unknown, |f| f.compute(inputs))
    }

    /// Valid parent sets: the explicit override, else those of the formula.
    ///
    /// `None` when the node has neither.
    #[must_use]
    pub fn valid_parent_sets(&self) -> Option<Vec<ParentSet>> {
        match (&self.valid_parent_sets, &self.formula) {
            (Some(explicit), _) => Some(explicit.clone()),
            (None, Some(formula)) => Some(formula.valid_parent_sets()),
            (None, None) => None,
        }
    }
}

// =============================================================================
// EDGE
// =============================================================================

/// Directed edge: the source's value is an input to the target's formula.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
}

impl Edge {
    /// Create a new edge.
    #[must_use]
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

// =============================================================================
// GRAPH
// =============================================================================

/// An append-only codebook graph.
///
/// Edges are not checked against the node set; the descriptor builder is
/// responsible for that. Algorithms ignore edges whose endpoints are missing.
///
/// `Clone` duplicates nodes and edges and shares formula trees, so a clone
/// can be evaluated under a different assignment without touching the
/// original.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl Graph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a graph from nodes and edges, in order.
    #[must_use]
    pub fn from_parts(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        let mut graph = Self::new();
        for node in nodes {
            graph.add_node(node);
        }
        for edge in edges {
            graph.add_edge(edge);
        }
        graph
    }

    /// Append a node.
    pub fn add_node(&mut self, node: Node) {
        self.nodes.push(node);
    }

    /// Append an edge.
    pub fn add_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    /// All nodes in insertion order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// All edges in insertion order.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// First node with the given id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id.as_str() == id)
    }

    /// First node with the given id, mutably.
    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id.as_str() == id)
    }

    #[must_use]
    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    /// Check if the graph contains an edge.
    #[must_use]
    pub fn contains_edge(&self, source: &str, target: &str) -> bool {
        self.edges
            .iter()
            .any(|e| e.source.as_str() == source && e.target.as_str() == target)
    }

    /// Assign a value to a node.
    pub fn set_value(&mut self, id: &str, value: impl Into<Value>) -> Result<(), CodebookError> {
        let node = self
            .node_mut(id)
            .ok_or_else(|| CodebookError::NodeNotFound(NodeId::from(id)))?;
        node.set_value(value);
        Ok(())
    }

    /// Edges ending at `id`.
    pub fn incoming_edges<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target.as_str() == id)
    }

    /// Edges starting at `id`.
    pub fn outgoing_edges<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source.as_str() == id)
    }

    /// Sources of the edges ending at `id`, skipping ids that are not nodes.
    #[must_use]
    pub fn incoming_nodes(&self, id: &str) -> Vec<&Node> {
        self.incoming_edges(id)
            .filter_map(|e| self.node(e.source.as_str()))
            .collect()
    }

    /// Ids of the direct parents of `id`.
    #[must_use]
    pub fn parent_set(&self, id: &str) -> ParentSet {
        self.incoming_edges(id).map(|e| e.source.clone()).collect()
    }

    /// A leaf has no incoming edges.
    #[must_use]
    pub fn is_leaf(&self, id: &str) -> bool {
        self.incoming_edges(id).next().is_none()
    }

    #[must_use]
    pub fn leaf_nodes(&self) -> Vec<&Node> {
        self.nodes.iter().filter(|n| self.is_leaf(n.id.as_str())).collect()
    }

    /// Nodes without outgoing edges.
    #[must_use]
    pub fn terminal_nodes(&self) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|n| self.outgoing_edges(n.id.as_str()).next().is_none())
            .collect()
    }

    /// The unique node without outgoing edges: the conclusion of a derivation.
    pub fn terminal_node(&self) -> Result<&Node, CodebookError> {
        match self.terminal_nodes().as_slice() {
            [single] => Ok(*single),
            others => Err(CodebookError::TerminalNodeCount {
                found: others.len(),
            }),
        }
    }

    /// Returns `true` if every leaf has a known value.
    #[must_use]
    pub fn leaf_values_set(&self) -> bool {
        self.undefined_leaves().is_empty()
    }

    /// Ids of the leaves whose value is still unknown.
    #[must_use]
    pub fn undefined_leaves(&self) -> Vec<NodeId> {
        self.leaf_nodes()
            .into_iter()
            .filter(|n| !n.value.is_known())
            .map(|n| n.id.clone())
            .collect()
    }

    /// Returns `true` if every non-leaf node carries a formula.
    #[must_use]
    pub fn non_leaf_formula_set(&self) -> bool {
        self.nodes
            .iter()
            .all(|n| self.is_leaf(n.id.as_str()) || n.is_derived())
    }

    /// Node indices in topological order (Kahn's algorithm).
    ///
    /// The queue is seeded with zero in-degree nodes in insertion order, so
    /// independent branches come out in construction order. Edges naming
    /// unknown ids are ignored. Nodes on a cycle never reach zero in-degree
    /// and are left out; see [`Graph::has_cycle`].
    fn topological_indices(&self) -> Vec<usize> {
        let mut index: BTreeMap<&str, usize> = BTreeMap::new();
        for (i, node) in self.nodes.iter().enumerate() {
            index.entry(node.id.as_str()).or_insert(i);
        }

        let mut in_degree: BTreeMap<&str, usize> = index.keys().map(|id| (*id, 0)).collect();
        let mut children: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for edge in &self.edges {
            let (source, target) = (edge.source.as_str(), edge.target.as_str());
            if !index.contains_key(source) || !index.contains_key(target) {
                continue;
            }
            if let Some(degree) = in_degree.get_mut(target) {
                *degree = degree.saturating_add(1);
            }
            children.entry(source).or_default().push(target);
        }

        let mut queue: VecDeque<&str> = VecDeque::new();
        let mut seeded = BTreeSet::new();
        for node in &self.nodes {
            let id = node.id.as_str();
            if in_degree.get(id) == Some(&0) && seeded.insert(id) {
                queue.push_back(id);
            }
        }

        let mut order = Vec::with_capacity(index.len());
        while let Some(current) = queue.pop_front() {
            if let Some(&i) = index.get(current) {
                order.push(i);
            }
            for &child in children.get(current).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        queue.push_back(child);
                    }
                }
            }
        }

        order
    }

    /// Nodes in topological order.
    ///
    /// Not canonical when independent branches exist: the order follows node
    /// and edge insertion order. A cyclic graph yields a partial order.
    #[must_use]
    pub fn topological_sort(&self) -> Vec<&Node> {
        self.topological_indices()
            .into_iter()
            .map(|i| &self.nodes[i])
            .collect()
    }

    /// Returns `true` if some node could not be placed in topological order.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        let distinct: BTreeSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        self.topological_indices().len() < distinct.len()
    }

    /// Known values of the parents of `id`.
    fn known_inputs(&self, id: &str) -> Inputs {
        self.incoming_nodes(id)
            .into_iter()
            .filter(|n| n.value.is_known())
            .map(|n| (n.id.clone(), n.value.clone()))
            .collect()
    }

    /// Propagate leaf values through every formula, in topological order.
    ///
    /// Fails with [`CodebookError::UndefinedLeafValues`] if a leaf has no
    /// value. A formula result of `Unknown` never overwrites a node's value,
    /// so repeated calls with the same leaves are idempotent.
    pub fn auto_infer_values(&mut self) -> Result<(), CodebookError> {
        let undefined = self.undefined_leaves();
        if !undefined.is_empty() {
            return Err(CodebookError::UndefinedLeafValues(undefined));
        }

        for i in self.topological_indices() {
            if !self.nodes[i].is_derived() {
                continue;
            }
            let inputs = self.known_inputs(self.nodes[i].id.as_str());
            let computed = self.nodes[i].compute_value(&inputs);
            if computed.is_known() {
                self.nodes[i].value = Value::from(computed);
            }
        }

        Ok(())
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Graph with {} nodes and {} edges:",
            self.nodes.len(),
            self.edges.len()
        )?;
        for node in &self.nodes {
            write!(f, "Node {}: {} ({})", node.id, node.label, node.value)?;
            if let Some(formula) = &node.formula {
                write!(f, " = {}", formula)?;
            }
            writeln!(f)?;
        }
        for edge in &self.edges {
            writeln!(f, "Edge {} -> {}", edge.source, edge.target)?;
        }
        writeln!(f, "{}", "=".repeat(50))
    }
}

// =============================================================================
// TESTS
// =============================================================================
