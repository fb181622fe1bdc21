//! Cell caches.
//!
//! A cell cache is the memo-map of a [`CachedVolume`](super::CachedVolume), from cell indices to materialized cells.
//! All caches provide single-flight loading with [`CellCache::try_get_or_insert_with`]:
//! concurrent callers requesting the same missing cell share one load, while loads of different cells proceed in parallel.
//! A failed load is returned to every waiting caller and is not cached, so the next request retries.

use std::sync::Arc;

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::element::Element;

use super::{Cell, CellIndices, CellLoadError};

mod cell_cache_lru_cell_limit;
mod cell_cache_lru_size_limit;
mod cell_cache_unbounded;

pub use cell_cache_lru_cell_limit::CellCacheLruCellLimit;
pub use cell_cache_lru_size_limit::CellCacheLruSizeLimit;
pub use cell_cache_unbounded::CellCacheUnbounded;

/// A cell initialiser for [`CellCache::try_get_or_insert_with`].
pub type CellInit<'a, T> = &'a mut dyn FnMut() -> Result<Arc<Cell<T>>, CellLoadError>;

/// Traits for a cell cache.
pub trait CellCache<T: Element>: Send + Sync {
    /// Retrieve a cell from the cache. Returns [`None`] if the cell is not present.
    ///
    /// The cell cache implementation may modify the cache (e.g. update LRU cache) on retrieval.
    fn get(&self, cell: &CellIndices) -> Option<Arc<Cell<T>>>;

    /// Insert a cell into the cache.
    fn insert(&self, cell: CellIndices, value: Arc<Cell<T>>);

    /// Get a cell from the cache, or insert it with `init` if it is not present.
    ///
    /// `init` is called at most once across all concurrent callers for the same cell.
    ///
    /// # Errors
    /// Returns an error if `init` returns an error.
    fn try_get_or_insert_with(
        &self,
        cell: CellIndices,
        init: CellInit<'_, T>,
    ) -> Result<Arc<Cell<T>>, Arc<CellLoadError>>;

    /// Return the number of cells in the cache.
    #[must_use]
    fn len(&self) -> usize;

    /// Returns true if the cache is empty.
    #[must_use]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `cell` is in the cache.
    #[must_use]
    fn contains(&self, cell: &CellIndices) -> bool;
}

/// A cell cache policy.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, Display, Default)]
#[serde(tag = "policy", rename_all = "snake_case")]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub enum CellCachePolicy {
    /// Never evict cells. See [`CellCacheUnbounded`].
    #[default]
    Unbounded,
    /// Evict the least recently used cells beyond a cell capacity. See [`CellCacheLruCellLimit`].
    LruCellLimit {
        /// The capacity in cells.
        capacity: u64,
    },
    /// Evict the least recently used cells beyond a capacity in bytes. See [`CellCacheLruSizeLimit`].
    LruSizeLimit {
        /// The capacity in bytes.
        capacity: u64,
    },
}

impl CellCachePolicy {
    /// Create a new cell cache with this policy.
    ///
    /// Capacities apply to each volume independently.
    #[must_use]
    pub fn build<T: Element>(&self) -> Arc<dyn CellCache<T>> {
        match *self {
            Self::Unbounded => Arc::new(CellCacheUnbounded::new()),
            Self::LruCellLimit { capacity } => Arc::new(CellCacheLruCellLimit::new(capacity)),
            Self::LruSizeLimit { capacity } => Arc::new(CellCacheLruSizeLimit::new(capacity)),
        }
    }
}
