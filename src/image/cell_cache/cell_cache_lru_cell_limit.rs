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

/// A cell cache with a fixed cell capacity.
pub struct CellCacheLruCellLimit<T: Element> {
    cache: Cache<CellIndices, Arc<Cell<T>>>,
}

impl<T: Element> CellCacheLruCellLimit<T> {
    /// Create a new [`CellCacheLruCellLimit`] with a capacity in cells of `cell_capacity`.
    #[must_use]
    pub fn new(cell_capacity: u64) -> Self {
        let cache = CacheBuilder::new(cell_capacity)
            .eviction_policy(EvictionPolicy::lru())
            .build();
        Self { cache }
    }
}

impl<T: Element> CellCache<T> for CellCacheLruCellLimit<T> {
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
