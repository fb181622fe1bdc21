use std::sync::Arc;

use moka::{
    policy::EvictionPolicy,
    sync::{Cache, CacheBuilder},
};

use crate::{
    element::Element,
    image::{Cell, CellIndices, CellLoadError},
};

use super::{CellCache, CellInit};

/// A cell cache with a fixed size capacity.
pub struct CellCacheLruSizeLimit<T: Element> {
    cache: Cache<CellIndices, Arc<Cell<T>>>,
}

impl<T: Element> CellCacheLruSizeLimit<T> {
    /// Create a new [`CellCacheLruSizeLimit`] with a capacity in bytes of `capacity`.
    #[must_use]
    pub fn new(capacity: u64) -> Self {
        let cache = CacheBuilder::new(capacity)
            .eviction_policy(EvictionPolicy::lru())
            .weigher(|_k, v: &Arc<Cell<T>>| u32::try_from(v.size_bytes()).unwrap_or(u32::MAX))
            .build();
        Self { cache }
    }

    /// Return the size of the cache in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.cache.run_pending_tasks();
        usize::try_from(self.cache.weighted_size()).unwrap_or(usize::MAX)
    }
}

impl<T: Element> CellCache<T> for CellCacheLruSizeLimit<T> {
    fn get(&self, cell: &CellIndices) -> Option<Arc<Cell<T>>> {
        self.cache.get(cell)
    }

    fn insert(&self, cell: CellIndices, value: Arc<Cell<T>>) {
        self.cache.insert(cell, value);
    }

    fn try_get_or_insert_with(
        &self,
        cell: CellIndices,
        init: CellInit<'_, T>,
    ) -> Result<Arc<Cell<T>>, Arc<CellLoadError>> {
        self.cache.try_get_with(cell, init)
    }

    fn len(&self) -> usize {
        self.cache.run_pending_tasks();
        usize::try_from(self.cache.entry_count()).unwrap_or(usize::MAX)
    }

    fn contains(&self, cell: &CellIndices) -> bool {
        self.cache.contains_key(cell)
    }
}
