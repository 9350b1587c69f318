//! # Equality Checker
//!
//! Three ways to compare codebook graphs:
//!
//! - **Exact**: node ids, edge pairs and formula signatures must match.
//! - **Structural**: ids are replaced by topological rank. Only sound when
//!   both graphs' topological orders line up, i.e. when they have no
//!   order-ambiguous independent branches or were built by the same
//!   procedure.
//! - **Canonical**: joint colour refinement over both graphs. Independent of
//!   insertion order. Equal colourings are a necessary condition for
//!   isomorphism, not a sufficient one.
//!
//! Node values are never compared.

use crate::graph::{Graph, Node};
use crate::primitives::MAX_REFINEMENT_ROUNDS;
use crate::{CodebookError, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// How node identity is judged when comparing graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EqualityMode {
    #[default]
    Exact,
    Structural,
    Canonical,
}

impl FromStr for EqualityMode {
    type Err = CodebookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exact" => Ok(EqualityMode::Exact),
            "structural" => Ok(EqualityMode::Structural),
            "canonical" => Ok(EqualityMode::Canonical),
            other => Err(CodebookError::DeserializationError(format!(
                "unknown equality mode '{}' (expected exact, structural or canonical)",
                other
            ))),
        }
    }
}

impl fmt::Display for EqualityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EqualityMode::Exact => f.write_str("exact"),
            EqualityMode::Structural => f.write_str("structural"),
            EqualityMode::Canonical => f.write_str("canonical"),
        }
    }
}

/// Compare two graphs under the given mode.
#[must_use]
pub fn graphs_equal(a: &Graph, b: &Graph, mode: EqualityMode) -> bool {
    match mode {
        EqualityMode::Exact => exact_eq(a, b),
        EqualityMode::Structural => structural_eq(a, b),
        EqualityMode::Canonical => canonical_eq(a, b),
    }
}

impl Graph {
    /// Compare with another graph under the given mode.
    #[must_use]
    pub fn equals(&self, other: &Graph, mode: EqualityMode) -> bool {
        graphs_equal(self, other, mode)
    }
}

impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        exact_eq(self, other)
    }
}

fn formula_signature(node: &Node) -> Option<String> {
    node.formula.as_ref().map(|f| f.signature())
}

// =============================================================================
// EXACT
// =============================================================================

/// Identifier-exact equality.
#[must_use]
pub fn exact_eq(a: &Graph, b: &Graph) -> bool {
    let ids_a: BTreeSet<&str> = a.nodes().iter().map(|n| n.id.as_str()).collect();
    let ids_b: BTreeSet<&str> = b.nodes().iter().map(|n| n.id.as_str()).collect();
    if ids_a != ids_b {
        return false;
    }

    let edges_a: BTreeSet<(&str, &str)> = a
        .edges()
        .iter()
        .map(|e| (e.source.as_str(), e.target.as_str()))
        .collect();
    let edges_b: BTreeSet<(&str, &str)> = b
        .edges()
        .iter()
        .map(|e| (e.source.as_str(), e.target.as_str()))
        .collect();
    if edges_a != edges_b {
        return false;
    }

    ids_a.iter().all(|id| {
        let sig_a = a.node(id).and_then(formula_signature);
        let sig_b = b.node(id).and_then(formula_signature);
        sig_a == sig_b
    })
}

// =============================================================================
// STRUCTURAL
// =============================================================================

/// Topological rank of every sorted node id.
fn rank_map(graph: &Graph) -> BTreeMap<&str, usize> {
    let mut ranks = BTreeMap::new();
    for (rank, node) in graph.topological_sort().into_iter().enumerate() {
        ranks.entry(node.id.as_str()).or_insert(rank);
    }
    ranks
}

fn ranked_signature(node: &Node, ranks: &BTreeMap<&str, usize>) -> Option<String> {
    node.formula.as_ref().map(|f| {
        f.signature_with(&|id: &NodeId| {
            ranks
                .get(id.as_str())
                .map_or_else(|| "?".to_string(), |r| r.to_string())
        })
    })
}

/// Identifier-agnostic equality via topological-position correspondence.
#[must_use]
pub fn structural_eq(a: &Graph, b: &Graph) -> bool {
    if a.node_count() != b.node_count() || a.edge_count() != b.edge_count() {
        return false;
    }

    let order_a = a.topological_sort();
    let order_b = b.topological_sort();
    if order_a.len() != order_b.len() {
        return false;
    }

    let ranks_a = rank_map(a);
    let ranks_b = rank_map(b);

    let ranked_edges = |graph: &Graph, ranks: &BTreeMap<&str, usize>| -> BTreeSet<(Option<usize>, Option<usize>)> {
        graph
            .edges()
            .iter()
            .map(|e| {
                (
                    ranks.get(e.source.as_str()).copied(),
                    ranks.get(e.target.as_str()).copied(),
                )
            })
            .collect()
    };
    if ranked_edges(a, &ranks_a) != ranked_edges(b, &ranks_b) {
        return false;
    }

    order_a
        .iter()
        .zip(&order_b)
        .all(|(na, nb)| ranked_signature(na, &ranks_a) == ranked_signature(nb, &ranks_b))
}

// =============================================================================
// CANONICAL
// =============================================================================

/// Adjacency of one graph over its distinct node ids.
struct Indexed<'a> {
    nodes: Vec<&'a Node>,
    index: BTreeMap<&'a str, usize>,
    parents: Vec<Vec<usize>>,
    children: Vec<Vec<usize>>,
    edges: Vec<(usize, usize)>,
}

impl<'a> Indexed<'a> {
    fn new(graph: &'a Graph) -> Self {
        let mut nodes = Vec::new();
        let mut index = BTreeMap::new();
        for node in graph.nodes() {
            if !index.contains_key(node.id.as_str()) {
                index.insert(node.id.as_str(), nodes.len());
                nodes.push(node);
            }
        }

        let mut parents = vec![Vec::new(); nodes.len()];
        let mut children = vec![Vec::new(); nodes.len()];
        let mut edges = Vec::new();
        for edge in graph.edges() {
            if let (Some(&s), Some(&t)) = (
                index.get(edge.source.as_str()),
                index.get(edge.target.as_str()),
            ) {
                parents[t].push(s);
                children[s].push(t);
                edges.push((s, t));
            }
        }

        Self {
            nodes,
            index,
            parents,
            children,
            edges,
        }
    }

    /// Formula shape with operands erased, or `-` for formula-less nodes.
    fn initial_keys(&self) -> Vec<String> {
        self.nodes
            .iter()
            .map(|n| {
                n.formula
                    .as_ref()
                    .map_or_else(|| "-".to_string(), |f| f.signature_with(&|_: &NodeId| "_".to_string()))
            })
            .collect()
    }

    fn refined_keys(&self, colours: &[usize]) -> Vec<String> {
        let colour_of = |i: &usize| colours[*i];
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| {
                let formula = node.formula.as_ref().map_or_else(String::new, |f| {
                    f.signature_with(&|id: &NodeId| {
                        self.index
                            .get(id.as_str())
                            .map_or_else(|| "?".to_string(), |&j| colours[j].to_string())
                    })
                });
                let mut parents: Vec<usize> = self.parents[i].iter().map(colour_of).collect();
                let mut children: Vec<usize> = self.children[i].iter().map(colour_of).collect();
                parents.sort_unstable();
                children.sort_unstable();
                format!("{}|{}|{:?}|{:?}", colours[i], formula, parents, children)
            })
            .collect()
    }
}

/// Map keys from both graphs onto one shared palette of dense colour ids.
fn paint(keys_a: Vec<String>, keys_b: Vec<String>) -> (Vec<usize>, Vec<usize>, usize) {
    let mut palette: BTreeMap<String, usize> = BTreeMap::new();
    for key in keys_a.iter().chain(&keys_b) {
        let next = palette.len();
        palette.entry(key.clone()).or_insert(next);
    }
    let lookup = |keys: Vec<String>| -> Vec<usize> {
        keys.iter()
            .map(|k| palette.get(k).copied().unwrap_or_default())
            .collect()
    };
    let distinct = palette.len();
    (lookup(keys_a), lookup(keys_b), distinct)
}

fn colour_histogram(colours: &[usize]) -> Vec<usize> {
    let mut sorted = colours.to_vec();
    sorted.sort_unstable();
    sorted
}

fn coloured_edges(graph: &Indexed<'_>, colours: &[usize]) -> Vec<(usize, usize)> {
    let mut edges: Vec<(usize, usize)> = graph
        .edges
        .iter()
        .map(|&(s, t)| (colours[s], colours[t]))
        .collect();
    edges.sort_unstable();
    edges
}

/// Order-independent, identifier-agnostic equality by colour refinement.
#[must_use]
pub fn canonical_eq(a: &Graph, b: &Graph) -> bool {
    if a.node_count() != b.node_count() || a.edge_count() != b.edge_count() {
        return false;
    }

    let ga = Indexed::new(a);
    let gb = Indexed::new(b);
    if ga.nodes.len() != gb.nodes.len() || ga.edges.len() != gb.edges.len() {
        return false;
    }

    let (mut colours_a, mut colours_b, mut distinct) = paint(ga.initial_keys(), gb.initial_keys());
    let max_rounds = MAX_REFINEMENT_ROUNDS.min(ga.nodes.len() + gb.nodes.len() + 1);
    for _ in 0..max_rounds {
        if colour_histogram(&colours_a) != colour_histogram(&colours_b) {
            return false;
        }
        let (next_a, next_b, next_distinct) =
            paint(ga.refined_keys(&colours_a), gb.refined_keys(&colours_b));
        colours_a = next_a;
        colours_b = next_b;
        if next_distinct == distinct {
            break;
        }
        distinct = next_distinct;
    }

    colour_histogram(&colours_a) == colour_histogram(&colours_b)
        && coloured_edges(&ga, &colours_a) == coloured_edges(&gb, &colours_b)
}

// =============================================================================
// TESTS
// =============================================================================
