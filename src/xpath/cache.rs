//! Compiled expression cache
//!
//! Patterns are compiled once and shared through `Arc`, bounded by an LRU.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tracing::trace;

use super::compiler::{compile, CompiledExpr};

/// Default number of compiled patterns kept
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

pub struct CompiledCache {
    entries: LruCache<String, Arc<CompiledExpr>>,
}

impl Default for CompiledCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl CompiledCache {
    /// A capacity of zero is raised to one
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        CompiledCache {
            entries: LruCache::new(capacity),
        }
    }

    /// Compiled form of `pattern`, compiling on a miss
    ///
    /// Compile errors are returned and not cached.
    pub fn get_or_compile(&mut self, pattern: &str) -> Result<Arc<CompiledExpr>, String> {
        if let Some(compiled) = self.entries.get(pattern) {
            trace!(pattern, "compiled expression cache hit");
            return Ok(Arc::clone(compiled));
        }
        let compiled = Arc::new(compile(pattern)?);
        self.entries.put(pattern.to_string(), Arc::clone(&compiled));
        Ok(compiled)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
