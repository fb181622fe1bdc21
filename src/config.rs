//! Global configuration options.

use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::image::CellCachePolicy;

/// Global configuration options for the `remote_cells` crate.
///
/// Retrieve the global [`Config`] with [`global_config`] and modify it with [`global_config_mut`].
///
/// ## Cell Concurrent Limit
/// > default: [`std::thread::available_parallelism`]`()`
///
/// The maximum number of cells loaded concurrently by a single [`read_region`](crate::image::CachedVolume::read_region).
/// Every load is a blocking remote call, so this also bounds the number of concurrent requests issued by one read.
/// The concurrent limit is disabled if set to zero.
///
/// ## Default Cell Size
/// > default: `[512, 512]`
///
/// The cell size used for images whose remote store reports no native tile size.
///
/// ## Default Cell Cache
/// > default: [`CellCachePolicy::Unbounded`]
///
/// The cell cache policy of [`ImageOpenOptions::new`](crate::image::ImageOpenOptions::new).
#[derive(Debug)]
pub struct Config {
    cell_concurrent_limit: usize,
    default_cell_size: [u64; 2],
    default_cell_cache: CellCachePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cell_concurrent_limit: std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(1),
            default_cell_size: [512, 512],
            default_cell_cache: CellCachePolicy::Unbounded,
        }
    }
}

impl Config {
    /// Get the [cell concurrent limit](#cell-concurrent-limit) configuration.
    #[must_use]
    pub fn cell_concurrent_limit(&self) -> usize {
        self.cell_concurrent_limit
    }

    /// Set the [cell concurrent limit](#cell-concurrent-limit) configuration.
    pub fn set_cell_concurrent_limit(&mut self, concurrent_limit: usize) {
        self.cell_concurrent_limit = concurrent_limit;
    }

    /// Get the [default cell size](#default-cell-size) configuration.
    #[must_use]
    pub fn default_cell_size(&self) -> [u64; 2] {
        self.default_cell_size
    }

    /// Set the [default cell size](#default-cell-size) configuration.
    ///
    /// Zero extents are replaced by one.
    pub fn set_default_cell_size(&mut self, cell_size: [u64; 2]) {
        self.default_cell_size = cell_size.map(|extent| extent.max(1));
    }

    /// Get the [default cell cache](#default-cell-cache) configuration.
    #[must_use]
    pub fn default_cell_cache(&self) -> CellCachePolicy {
        self.default_cell_cache
    }

    /// Set the [default cell cache](#default-cell-cache) configuration.
    pub fn set_default_cell_cache(&mut self, policy: CellCachePolicy) {
        self.default_cell_cache = policy;
    }
}

static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

/// Returns a reference to the global `remote_cells` configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config() -> RwLockReadGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .read()
        .unwrap()
}

/// Returns a mutable reference to the global `remote_cells` configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config_mut() -> RwLockWriteGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .write()
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_cell_size() {
        assert_eq!(global_config().default_cell_size(), [512, 512]);
        let mut config = Config::default();
        config.set_default_cell_size([256, 0]);
        assert_eq!(config.default_cell_size(), [256, 1]);
    }

    #[test]
    fn config_cell_cache() {
        let config = Config::default();
        assert_eq!(config.default_cell_cache(), CellCachePolicy::Unbounded);
        assert!(config.cell_concurrent_limit() >= 1);
    }
}
