//! # codebook-core
//!
//! The deterministic engine for codebook graphs.
//!
//! A codebook defines concepts ("nodes") whose truth value is either supplied
//! from outside (leaves) or derived from other nodes through a boolean
//! formula. This crate:
//!
//! - evaluates such graphs with three-valued logic
//! - compares graphs by identifier, by topological position, or by colour
//!   refinement
//! - scores a predicted derivation, typically a reasoning trace extracted
//!   from text, against a reference graph, accepting minimal derivations
//!
//! ## Architectural Constraints
//!
//! - Pure and synchronous: no I/O, no logging, no async
//! - Deterministic: every traversal follows insertion order or `BTreeMap` order
//! - Extraction of graphs from text is injected through [`GraphExtractor`]

// =============================================================================
// MODULES
// =============================================================================

pub mod descriptor;
pub mod equality;
pub mod formats;
pub mod formula;
pub mod graph;
pub mod metrics;
pub mod primitives;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{CodebookError, ConstructionWarning, NodeId, Truth, Value};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use descriptor::{
    BuildOptions, BuiltGraph, DescriptorStyle, EdgeDescriptor, GraphDescriptor, GraphExtractor,
    NodeDescriptor, build_graph, extract_graph,
};
pub use equality::{EqualityMode, canonical_eq, exact_eq, graphs_equal, structural_eq};
pub use formula::{Formula, FormulaKind, Inputs, Operand, ParentSet};
pub use graph::{Edge, Graph, Node};
pub use metrics::{ClassificationCounts, ClassificationScores, MatchMetrics, MetricsReport};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{MAX_DOCUMENT_SIZE, graph_from_json, graph_to_json};
