//! Crate-wide error type

use thiserror::Error;

use crate::loader::LoadError;
use crate::query::QueryError;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or unrecognized query directive
    #[error("Parse error: {0}")]
    Parse(#[from] QueryError),

    /// A node kind token that names no known constructor
    #[error("Unknown node kind: {0}")]
    Lookup(String),

    /// Traversal exceeded a configured bound
    #[error("Resource limit exceeded: {limit} (limit {max}, reached {value})")]
    Resource {
        limit: &'static str,
        max: usize,
        value: usize,
    },

    #[error("Load error: {0}")]
    Load(#[from] LoadError),
}

pub type Result<T> = std::result::Result<T, Error>;
