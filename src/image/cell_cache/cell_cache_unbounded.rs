use std::sync::Arc;

use moka::sync::Cache;

use crate::{
    element::Element,
    image::{Cell, CellIndices, CellLoadError},
};

use super::{CellCache, CellInit};

/// A cell cache without eviction.
///
/// Every cell stays materialized for the lifetime of its volume.
pub struct CellCacheUnbounded<T: Element> {
    cache: Cache<CellIndices, Arc<Cell<T>>>,
}

impl<T: Element> CellCacheUnbounded<T> {
    /// Create a new [`CellCacheUnbounded`].
    #[must_use]
    pub fn new() -> Self {
        let cache = Cache::builder().build();
        Self { cache }
    }
}

impl<T: Element> Default for CellCacheUnbounded<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> CellCache<T> for CellCacheUnbounded<T> {
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
