//! Shared type definitions for the pysplit crate
//!
//! Hash collections used across the parser, resolver and partitioner. Index-ordered
//! variants are used wherever iteration order ends up in generated files, so output is
//! deterministic for a given input.

use std::hash::BuildHasherDefault;

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHasher;

/// Type alias for IndexMap with FxHasher for better performance
pub type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;
/// Type alias for IndexSet with FxHasher for better performance
pub type FxIndexSet<T> = IndexSet<T, BuildHasherDefault<FxHasher>>;

/// Index of a top-level statement in the parsed module body
pub type StmtIndex = usize;
