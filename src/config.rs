//! Load options and traversal bounds

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_MAX_DEPTH: usize = 4096;
pub const DEFAULT_MAX_NODES: usize = 1_000_000;

/// Bounds on tree depth and size, checked while loading and while building
/// any derived tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_depth: usize,
    pub max_nodes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_nodes: DEFAULT_MAX_NODES,
        }
    }
}

impl Limits {
    pub fn unbounded() -> Self {
        Self {
            max_depth: usize::MAX,
            max_nodes: usize::MAX,
        }
    }

    #[inline]
    pub fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            return Err(Error::Resource {
                limit: "max_depth",
                max: self.max_depth,
                value: depth,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn check_nodes(&self, count: usize) -> Result<()> {
        if count > self.max_nodes {
            return Err(Error::Resource {
                limit: "max_nodes",
                max: self.max_nodes,
                value: count,
            });
        }
        Ok(())
    }
}

/// Options for building a graph from records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphOptions {
    /// Give every loaded node a `StableId` in pre-order
    pub assign_ids: bool,
    pub limits: Limits,
}

impl GraphOptions {
    pub fn with_ids(mut self) -> Self {
        self.assign_ids = true;
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }
}
