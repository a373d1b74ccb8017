//! Comorbid graphs: filtering and search over medical concept trees
//!
//! A toolkit for querying a hierarchy of disorders, symptoms and related
//! concepts by name, type, lineage and body text.
//! Core implementation in Rust with Python bindings.

// Core modules (leaves first)
pub mod config; // Load options and traversal limits
pub mod error;
pub mod filter; // Node predicates and labeled filters
pub mod loader; // JSON records to tree
pub mod merge; // Lineage-preserving merge
pub mod pool; // String interning
pub mod query; // Query language compiler
pub mod searcher; // End-to-end search (query + extraction + merge)
pub mod subgraph; // Ancestor-aware extraction
pub mod tree; // Arena tree and rendering

// Python bindings
#[cfg(feature = "pyo3")]
pub mod python;

// Re-exports for convenience
pub use config::{GraphOptions, Limits};
pub use error::{Error, Result};
pub use filter::{Dimension, FilterSpec, NodeFilter, Selector};
pub use merge::{TreeMerger, merge_nodes_into_tree};
pub use pool::{StringPool, Sym};
pub use query::{QueryError, build_query};
pub use searcher::{ComorbidGraph, SearchResult};
pub use subgraph::filter_subgraph;
pub use tree::{Node, NodeId, NodeKind, NodeRef, StableId, Tree};
