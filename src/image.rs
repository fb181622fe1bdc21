//! Cached remote images.
//!
//! An image is opened from a [`RemoteStore`](crate::remote::RemoteStore) with [`open_image`] or [`ImageIndex::open`].
//! Opening resolves an immutable [`ImageDescriptor`] from [`ImageOpenOptions`], and then every read is served through this chain:
//!  - [`ImageIndex`]: one lazily created [`CachedVolume`] per resolution level, timepoint and channel,
//!  - [`CachedVolume`]: a [`CellGrid`] of cells memoized in a [`CellCache`] with single-flight loading,
//!  - [`TileCellLoader`] (or the legacy [`PlaneCellLoader`]): converts a cell to one remote fetch,
//!  - [`TileFetcher`]: validates and issues the fetch, releasing the remote access handle afterwards.
//!
//! Each cell is fetched at most once, even when many threads read overlapping regions concurrently.
//! Failed loads are reported to the caller and are not cached, so a later read retries.

mod cached_volume;
pub mod cell_cache;
mod cell_grid;
mod cell_loader;
mod image_descriptor;
mod image_errors;
mod image_index;
mod image_options;
mod transform;

pub use cached_volume::{CachedVolume, VolumeKey};
pub use cell_cache::{CellCache, CellCachePolicy};
pub use cell_grid::{CellGrid, CellIndices};
pub use cell_loader::{
    Cell, CellKey, CellLoadError, CellLoaderTraits, FetchError, PlaneBounds, PlaneCellLoader,
    TileCellLoader, TileFetcher,
};
pub use image_descriptor::{ImageDescriptor, LevelDescriptor, PhysicalCalibration};
pub use image_errors::{ImageOpenError, IndexError, VolumeError};
pub use image_index::{open_image, AnyImageIndex, ImageIndex};
pub use image_options::{CellSizePolicy, FetchMode, ImageOpenOptions, LevelVoxelSize};
pub use transform::AffineTransform3D;
