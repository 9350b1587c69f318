//! # Engine Primitives
//!
//! Hardcoded constants for the codebook engine.
//! These are compiled into the binary and are immutable at runtime.

/// Largest disjunction whose valid parent sets are enumerated as a full powerset.
///
/// An `Or` over more keys reports one singleton per key instead. For the
/// derivation checks in [`crate::metrics`] the two forms are interchangeable:
/// a parent set covers some non-empty subset exactly when it covers some
/// singleton.
pub const MAX_POWERSET_KEYS: usize = 12;

/// Maximum nesting depth accepted when resolving formula descriptors.
///
/// Prevents stack exhaustion from malicious or malformed documents.
pub const MAX_FORMULA_DEPTH: usize = 64;

/// Maximum number of nodes accepted in a single descriptor or document.
pub const MAX_DOCUMENT_NODES: usize = 100_000;

/// Maximum number of edges accepted in a single descriptor or document.
pub const MAX_DOCUMENT_EDGES: usize = 1_000_000;

/// Maximum number of colour refinement rounds in canonical equality.
///
/// Refinement stabilises after at most `node_count` rounds; this caps
/// pathological inputs.
pub const MAX_REFINEMENT_ROUNDS: usize = 1_000;
