//! Parsed-path cache
//!
//! Descriptors tend to repeat the same handful of addresses (`@id`,
//! `name/text()`, ...). Parsing is namespace independent, so parsed steps are
//! shared across descriptors and only prefix binding is redone per owner.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;

use super::parser::{self, Step};
use crate::error::Result;

const DEFAULT_CAPACITY: usize = 256;

/// LRU cache from expression text to parsed steps
pub struct PathCache {
    inner: Mutex<LruCache<String, Arc<[Step]>>>,
}

impl Default for PathCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for PathCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathCache").field("len", &self.len()).finish()
    }
}

impl PathCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        PathCache {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Parse `expr`, reusing an earlier parse when one is cached
    pub fn parse(&self, expr: &str) -> Result<Arc<[Step]>> {
        if let Ok(mut cache) = self.inner.lock() {
            if let Some(steps) = cache.get(expr) {
                return Ok(Arc::clone(steps));
            }
        }
        let steps: Arc<[Step]> = parser::parse(expr)?.into();
        // a poisoned lock only costs us the cache entry
        if let Ok(mut cache) = self.inner.lock() {
            cache.put(expr.to_string(), Arc::clone(&steps));
        }
        Ok(steps)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
