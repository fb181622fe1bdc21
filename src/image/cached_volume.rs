use std::sync::Arc;

use derive_more::Display;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use rayon_iter_concurrent_limit::iter_concurrent_limit;
use serde::{Deserialize, Serialize};

use crate::{
    config::global_config,
    element::Element,
    region::{Region, RegionShape, VoxelIndices},
};

use super::{Cell, CellCache, CellGrid, CellIndices, CellLoaderTraits, VolumeError};

/// The key of a volume of an image: a resolution level, timepoint and channel.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, Display)]
#[display("level={level} t={t} c={c}")]
pub struct VolumeKey {
    /// The resolution level.
    pub level: usize,
    /// The timepoint.
    pub t: u64,
    /// The channel.
    pub c: u64,
}

impl VolumeKey {
    /// Create a new volume key.
    #[must_use]
    pub const fn new(level: usize, t: u64, c: u64) -> Self {
        Self { level, t, c }
    }
}

/// A lazily materialized `(x, y, z)` volume of one resolution level, timepoint and channel of a remote image.
///
/// The volume is partitioned into cells by its [`CellGrid`].
/// A cell is loaded from the remote store the first time it is read and then served from the cell cache.
/// Concurrent reads of the same missing cell issue a single load, and reads of different cells are never serialized.
pub struct CachedVolume<T: Element> {
    key: VolumeKey,
    grid: CellGrid,
    loader: Arc<dyn CellLoaderTraits<T>>,
    cache: Arc<dyn CellCache<T>>,
}

impl<T: Element> core::fmt::Debug for CachedVolume<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CachedVolume")
            .field("key", &self.key)
            .field("grid", &self.grid)
            .field("cached_cells", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl<T: Element> CachedVolume<T> {
    /// Create a new cached volume.
    ///
    /// The volume adopts the cell grid of `loader`.
    #[must_use]
    pub fn new(
        key: VolumeKey,
        loader: Arc<dyn CellLoaderTraits<T>>,
        cache: Arc<dyn CellCache<T>>,
    ) -> Self {
        let grid = *loader.cell_grid();
        Self {
            key,
            grid,
            loader,
            cache,
        }
    }

    /// Return the volume key.
    #[must_use]
    pub const fn key(&self) -> VolumeKey {
        self.key
    }

    /// Return the shape of the volume.
    #[must_use]
    pub const fn shape(&self) -> &RegionShape {
        self.grid.image_shape()
    }

    /// Return the cell grid.
    #[must_use]
    pub const fn grid(&self) -> &CellGrid {
        &self.grid
    }

    /// Return the number of materialized cells.
    #[must_use]
    pub fn cached_cells(&self) -> usize {
        self.cache.len()
    }

    /// Returns true if the cell at `cell_x`, `cell_y`, `cell_z` is materialized.
    #[must_use]
    pub fn is_cached(&self, cell_x: u64, cell_y: u64, cell_z: u64) -> bool {
        self.cache.contains(&[cell_x, cell_y, cell_z])
    }

    /// Get the cell at `cell_x`, `cell_y`, `cell_z`, loading it if it is not materialized.
    ///
    /// # Errors
    /// Returns [`VolumeError::InvalidCell`] if the cell is outside the grid, or [`VolumeError::CellLoadFailed`] if the load fails.
    /// A failed load is not cached.
    pub fn get_cell(
        &self,
        cell_x: u64,
        cell_y: u64,
        cell_z: u64,
    ) -> Result<Arc<Cell<T>>, VolumeError> {
        self.get_cell_indices([cell_x, cell_y, cell_z])
    }

    fn get_cell_indices(&self, cell: CellIndices) -> Result<Arc<Cell<T>>, VolumeError> {
        if !self.grid.contains_cell(&cell) {
            return Err(VolumeError::InvalidCell(self.key, cell));
        }
        if let Some(value) = self.cache.get(&cell) {
            log::trace!("cell cache hit {} cell={cell:?}", self.key);
            return Ok(value);
        }
        self.cache
            .try_get_or_insert_with(cell, &mut || self.loader.load(&cell).map(Arc::new))
            .map_err(VolumeError::CellLoadFailed)
    }

    /// Read `region` of the volume.
    ///
    /// The elements are ordered `x` fastest, then `y`, then `z`.
    /// Missing cells overlapping the region are loaded in parallel, limited by the [cell concurrent limit](crate::config::Config#cell-concurrent-limit).
    ///
    /// # Errors
    /// Returns [`VolumeError::InvalidRegion`] if `region` is not within the volume, or [`VolumeError::CellLoadFailed`] if a cell load fails.
    /// Cells that loaded successfully stay materialized even if another cell of the region fails.
    ///
    /// # Panics
    /// Panics if the number of elements in `region` exceeds [`usize::MAX`].
    pub fn read_region(&self, region: &Region) -> Result<Vec<T>, VolumeError> {
        let Some(cells) = self.grid.cells_in_region(region) else {
            return Err(VolumeError::InvalidRegion(*region, *self.shape()));
        };
        if region.is_empty() {
            return Ok(vec![]);
        }

        let indices: Vec<CellIndices> = cells.indices().collect();
        let cell_concurrent_limit = match global_config().cell_concurrent_limit() {
            0 => indices.len(),
            limit => limit,
        };
        let cells = iter_concurrent_limit!(cell_concurrent_limit, indices, map, |cell| {
            self.get_cell_indices(cell)
        })
        .collect::<Result<Vec<_>, VolumeError>>()?;

        let mut elements = vec![T::default(); region.num_elements_usize()];
        for cell in &cells {
            let Some(overlap) = cell.region().overlap(region) else {
                continue;
            };
            let row = usize::try_from(overlap.shape()[0]).unwrap();
            let [x, y0, z0] = *overlap.start();
            let [_, y1, z1] = overlap.end_exc();
            for (z, y) in itertools::iproduct!(z0..z1, y0..y1) {
                let src = usize::try_from(cell.region().linearised_index(&[x, y, z])).unwrap();
                let dst = usize::try_from(region.linearised_index(&[x, y, z])).unwrap();
                elements[dst..dst + row].copy_from_slice(&cell.as_slice()[src..src + row]);
            }
        }
        Ok(elements)
    }

    /// Read the element at `indices`.
    ///
    /// # Errors
    /// Returns [`VolumeError::InvalidRegion`] if `indices` is outside the volume, or [`VolumeError::CellLoadFailed`] if the cell load fails.
    pub fn value(&self, indices: &VoxelIndices) -> Result<T, VolumeError> {
        let Some(cell) = self.grid.cell_indices(indices) else {
            return Err(VolumeError::InvalidRegion(
                Region::new_with_ranges(&indices.map(|i| i..i.saturating_add(1))),
                *self.shape(),
            ));
        };
        let cell = self.get_cell_indices(cell)?;
        let origin = cell.region().start();
        Ok(cell.value(indices[0] - origin[0], indices[1] - origin[1]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        element::PixelType,
        image::{CellCachePolicy, PlaneBounds, TileCellLoader, TileFetcher},
        remote::{ImageId, MemoryImage, MemoryRemoteStore, PerformanceMetricsRemoteStore, PixelsMetadata},
    };

    fn volume(
        policy: CellCachePolicy,
    ) -> (
        Arc<PerformanceMetricsRemoteStore<MemoryRemoteStore>>,
        CachedVolume<u16>,
    ) {
        let store = MemoryRemoteStore::new();
        let metadata = PixelsMetadata {
            size_x: 100,
            size_y: 60,
            size_z: 3,
            size_c: 2,
            size_t: 1,
            pixel_type: PixelType::UInt16,
            physical_size_x: None,
            physical_size_y: None,
            physical_size_z: None,
        };
        store.add_image(
            ImageId(1),
            MemoryImage::new(metadata, vec![], |_, plane, x, y| {
                (plane.c * 10000 + plane.z * 1000 + y * 100 + x) as f64
            }),
        );
        let store = Arc::new(PerformanceMetricsRemoteStore::new(store));
        let bounds = PlaneBounds {
            size_x: 100,
            size_y: 60,
            size_z: 3,
            size_c: 2,
            size_t: 1,
        };
        let fetcher = TileFetcher::new(store.clone(), ImageId(1), 0, bounds);
        let key = VolumeKey::new(0, 0, 1);
        let loader = Arc::new(TileCellLoader::new(fetcher, key, [32, 32]));
        (store, CachedVolume::new(key, loader, policy.build()))
    }

    #[test]
    fn cached_volume_get_cell() {
        let (store, volume) = volume(CellCachePolicy::Unbounded);
        assert_eq!(volume.grid().grid_shape(), [4, 2, 3]);
        assert!(!volume.is_cached(3, 1, 2));
        let cell = volume.get_cell(3, 1, 2).unwrap();
        assert_eq!(cell.region().shape(), &[4, 28, 1]);
        assert_eq!(cell.value(1, 2), 10000 + 2000 + 34 * 100 + 97);
        let again = volume.get_cell(3, 1, 2).unwrap();
        assert!(Arc::ptr_eq(&cell, &again));
        assert!(volume.is_cached(3, 1, 2));
        assert_eq!(store.tile_fetches(), 1);
        assert_eq!(volume.cached_cells(), 1);

        assert!(matches!(
            volume.get_cell(4, 0, 0),
            Err(VolumeError::InvalidCell(_, [4, 0, 0]))
        ));
        assert_eq!(store.tile_fetches(), 1);
    }

    #[test]
    fn cached_volume_read_region() {
        let (store, volume) = volume(CellCachePolicy::Unbounded);
        let region = Region::new_with_ranges(&[30..70, 20..40, 1..3]);
        let elements = volume.read_region(&region).unwrap();
        assert_eq!(elements.len(), 40 * 20 * 2);
        for [x, y, z] in region.indices() {
            let index = usize::try_from(region.linearised_index(&[x, y, z])).unwrap();
            assert_eq!(
                u64::from(elements[index]),
                10000 + z * 1000 + y * 100 + x
            );
        }
        // cells x 0..3, y 0..2, z 1..3
        assert_eq!(store.tile_fetches(), 3 * 2 * 2);
        volume.read_region(&region).unwrap();
        assert_eq!(store.tile_fetches(), 3 * 2 * 2);

        assert_eq!(volume.value(&[99, 59, 0]).unwrap(), 10000 + 5900 + 99);
        assert!(volume.value(&[100, 0, 0]).is_err());
    }

    #[test]
    fn cached_volume_invalid_region() {
        let (store, volume) = volume(CellCachePolicy::Unbounded);
        assert!(matches!(
            volume.read_region(&Region::new_with_ranges(&[0..101, 0..1, 0..1])),
            Err(VolumeError::InvalidRegion(..))
        ));
        assert!(volume
            .read_region(&Region::new_with_ranges(&[0..0, 0..1, 0..1]))
            .unwrap()
            .is_empty());
        assert_eq!(store.fetches(), 0);
    }

    #[test]
    fn cached_volume_bounded_cache() {
        let (store, volume) = volume(CellCachePolicy::LruCellLimit { capacity: 1 });
        volume
            .read_region(&Region::new_with_ranges(&[0..100, 0..60, 0..1]))
            .unwrap();
        assert_eq!(store.tile_fetches(), 8);
        assert!(volume.cached_cells() <= 1);
    }
}
