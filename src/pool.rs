//! Shared string pool for node names and types
//!
//! Every tree derived from a source shares the source's pool, so a `Sym`
//! resolved in one tree compares equal to the same string in any other.

use lasso::{Spur, ThreadedRodeo};
use rustc_hash::FxBuildHasher;
use std::fmt;
use std::sync::Arc;

pub const STRING_POOL_CAPACITY: usize = 5000;

/// Interned string key
pub type Sym = Spur;

#[derive(Clone)]
pub struct StringPool(Arc<ThreadedRodeo<Spur, FxBuildHasher>>);

impl Default for StringPool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StringPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringPool")
            .field("len", &self.0.len())
            .finish()
    }
}

impl StringPool {
    pub fn new() -> Self {
        Self(Arc::new(ThreadedRodeo::with_capacity_and_hasher(
            lasso::Capacity::for_strings(STRING_POOL_CAPACITY),
            FxBuildHasher,
        )))
    }

    #[inline]
    pub fn get_or_intern(&self, s: &str) -> Sym {
        self.0.get_or_intern(s)
    }

    /// Look up a string without interning it
    #[inline]
    pub fn get(&self, s: &str) -> Option<Sym> {
        self.0.get(s)
    }

    #[inline]
    pub fn resolve(&self, sym: Sym) -> &str {
        self.0.resolve(&sym)
    }

    /// True when both handles point at the same pool
    pub fn same_pool(&self, other: &StringPool) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_and_resolve() {
        let pool = StringPool::new();
        let a = pool.get_or_intern("headache");
        let b = pool.get_or_intern("headache");
        let c = pool.get_or_intern("nausea");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(pool.resolve(c), "nausea");
    }

    #[test]
    fn test_get_does_not_intern() {
        let pool = StringPool::new();
        assert_eq!(pool.get("fever"), None);
        let sym = pool.get_or_intern("fever");
        assert_eq!(pool.get("fever"), Some(sym));
    }

    #[test]
    fn test_clones_share_storage() {
        let pool = StringPool::new();
        let clone = pool.clone();
        let sym = clone.get_or_intern("symptom");

        assert!(pool.same_pool(&clone));
        assert!(!pool.same_pool(&StringPool::new()));
        assert_eq!(pool.resolve(sym), "symptom");
    }
}
