use std::marker::PhantomData;

use derive_more::Display;
use thiserror::Error;

use crate::{
    element::{Element, PixelType},
    region::Region,
    remote::{ImageId, Plane2D, PlaneCoord, RemoteError, RemoteStoreHandle, TileRect},
};

use super::{CellGrid, CellIndices, VolumeKey};

/// The extents of one resolution level of an image, as addressed by a [`TileFetcher`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Display)]
#[display("{size_x}x{size_y}x{size_z} c={size_c} t={size_t}")]
pub struct PlaneBounds {
    /// The width of the level.
    pub size_x: u64,
    /// The height of the level.
    pub size_y: u64,
    /// The number of z planes.
    pub size_z: u64,
    /// The number of channels.
    pub size_c: u64,
    /// The number of timepoints.
    pub size_t: u64,
}

/// A fetch error.
#[derive(Debug, Error)]
pub enum FetchError {
    /// A remote store error.
    #[error(transparent)]
    Remote(#[from] RemoteError),
    /// The request is outside of the bounds of the level.
    #[error("{plane} {rect} is outside of {bounds}")]
    InvalidPlane {
        /// The requested plane.
        plane: PlaneCoord,
        /// The requested rectangle.
        rect: TileRect,
        /// The bounds of the level.
        bounds: PlaneBounds,
    },
    /// The remote store returned a buffer of an unexpected shape.
    #[error("expected a {expected_w}x{expected_h} buffer for {rect}, got {w}x{h}")]
    UnexpectedTileShape {
        /// The requested rectangle.
        rect: TileRect,
        /// The expected width.
        expected_w: u64,
        /// The expected height.
        expected_h: u64,
        /// The returned width.
        w: u64,
        /// The returned height.
        h: u64,
    },
    /// A sample is not representable by the pixel type of the image.
    #[error("sample {value} is not representable as {pixel_type}")]
    ValueOutOfRange {
        /// The sample.
        value: f64,
        /// The pixel type.
        pixel_type: PixelType,
    },
}

/// Issues single remote fetches for one resolution level of an image.
///
/// Every fetch acquires a pixels access handle, issues exactly one remote call, and releases the handle, even on failure.
/// There is no caching or retrying at this layer.
#[derive(Clone)]
pub struct TileFetcher {
    store: RemoteStoreHandle,
    image: ImageId,
    level: usize,
    bounds: PlaneBounds,
}

impl core::fmt::Debug for TileFetcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TileFetcher")
            .field("image", &self.image)
            .field("level", &self.level)
            .field("bounds", &self.bounds)
            .finish_non_exhaustive()
    }
}

impl TileFetcher {
    /// Create a new tile fetcher for resolution `level` of `image`.
    #[must_use]
    pub fn new(store: RemoteStoreHandle, image: ImageId, level: usize, bounds: PlaneBounds) -> Self {
        Self {
            store,
            image,
            level,
            bounds,
        }
    }

    /// Return the image.
    #[must_use]
    pub const fn image(&self) -> ImageId {
        self.image
    }

    /// Return the resolution level.
    #[must_use]
    pub const fn level(&self) -> usize {
        self.level
    }

    /// Return the bounds of the resolution level.
    #[must_use]
    pub const fn bounds(&self) -> &PlaneBounds {
        &self.bounds
    }

    /// Check that `rect` of `plane` is within the bounds of the level.
    ///
    /// # Errors
    /// Returns [`FetchError::InvalidPlane`] if it is not.
    pub fn validate(&self, plane: PlaneCoord, rect: TileRect) -> Result<(), FetchError> {
        let bounds = &self.bounds;
        if plane.z < bounds.size_z
            && plane.c < bounds.size_c
            && plane.t < bounds.size_t
            && rect.inbounds(bounds.size_x, bounds.size_y)
        {
            Ok(())
        } else {
            Err(FetchError::InvalidPlane {
                plane,
                rect,
                bounds: *bounds,
            })
        }
    }

    /// Fetch `rect` of `plane`.
    ///
    /// The request is validated before any remote call is made.
    ///
    /// # Errors
    /// Returns a [`FetchError`] if the request is invalid, the remote call fails, or the returned buffer has an unexpected shape.
    pub fn fetch_tile(&self, plane: PlaneCoord, rect: TileRect) -> Result<Plane2D, FetchError> {
        self.validate(plane, rect)?;
        log::debug!(
            "fetch_tile {} level={} {plane} {rect}",
            self.image,
            self.level
        );
        let tile = {
            let mut access = self.store.open_pixels_access(self.image, self.level)?;
            access.fetch_tile(plane, rect)
        }?;
        check_shape(&tile, rect)?;
        Ok(tile)
    }

    /// Fetch the whole of `plane`.
    ///
    /// # Errors
    /// Returns a [`FetchError`] if the request is invalid, the remote call fails, or the returned buffer has an unexpected shape.
    pub fn fetch_plane(&self, plane: PlaneCoord) -> Result<Plane2D, FetchError> {
        let rect = TileRect::new(0, 0, self.bounds.size_x, self.bounds.size_y);
        self.validate(plane, rect)?;
        log::debug!("fetch_plane {} level={} {plane}", self.image, self.level);
        let buffer = {
            let mut access = self.store.open_pixels_access(self.image, self.level)?;
            access.fetch_plane(plane)
        }?;
        check_shape(&buffer, rect)?;
        Ok(buffer)
    }
}

fn check_shape(buffer: &Plane2D, rect: TileRect) -> Result<(), FetchError> {
    if buffer.width() == rect.w && buffer.height() == rect.h {
        Ok(())
    } else {
        Err(FetchError::UnexpectedTileShape {
            rect,
            expected_w: rect.w,
            expected_h: rect.h,
            w: buffer.width(),
            h: buffer.height(),
        })
    }
}

/// The key of a cell: its volume and its indices in the volume cell grid.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Display)]
#[display("level={level} t={t} c={c} cell={cell:?}")]
pub struct CellKey {
    /// The resolution level.
    pub level: usize,
    /// The timepoint.
    pub t: u64,
    /// The channel.
    pub c: u64,
    /// The cell indices.
    pub cell: CellIndices,
}

impl CellKey {
    /// Create the key of `cell` in the volume `volume`.
    #[must_use]
    pub const fn new(volume: VolumeKey, cell: CellIndices) -> Self {
        Self {
            level: volume.level,
            t: volume.t,
            c: volume.c,
            cell,
        }
    }
}

/// A cell load error.
#[derive(Debug, Error)]
#[error("failed to load cell {key}: {source}")]
pub struct CellLoadError {
    /// The key of the cell.
    pub key: CellKey,
    /// The underlying fetch error.
    pub source: FetchError,
}

/// A materialized cell.
///
/// The elements cover the cell region, `x` fastest then `y`.
/// A cell is never modified once loaded.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell<T> {
    region: Region,
    elements: Vec<T>,
}

impl<T: Element> Cell<T> {
    /// Create a new cell covering `region`.
    ///
    /// Returns [`None`] if the number of elements does not match the region.
    #[must_use]
    pub fn new(region: Region, elements: Vec<T>) -> Option<Self> {
        (elements.len() as u64 == region.num_elements()).then_some(Self { region, elements })
    }

    /// Return the region of the cell in volume coordinates.
    #[must_use]
    pub const fn region(&self) -> &Region {
        &self.region
    }

    /// Return the value at cell-local `(x, y)`.
    ///
    /// # Panics
    /// Panics if `(x, y)` is outside the cell.
    #[must_use]
    pub fn value(&self, x: u64, y: u64) -> T {
        let [w, h, _] = *self.region.shape();
        assert!(x < w && y < h, "({x}, {y}) is outside of a {w}x{h} cell");
        self.elements[usize::try_from(y * w + x).unwrap()]
    }

    /// Return the elements.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.elements
    }

    /// Return the elements as native endian bytes.
    #[must_use]
    pub fn as_ne_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.elements)
    }

    /// Return the size of the elements in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        std::mem::size_of_val(self.elements.as_slice())
    }
}

/// Traits for a cell loader.
pub trait CellLoaderTraits<T: Element>: Send + Sync {
    /// Return the cell grid of the volume loaded by this loader.
    fn cell_grid(&self) -> &CellGrid;

    /// Load `cell`.
    ///
    /// # Errors
    /// Returns a [`CellLoadError`] if the fetch fails or a sample is not representable.
    fn load(&self, cell: &CellIndices) -> Result<Cell<T>, CellLoadError>;
}

/// Convert an x-major remote buffer to `x` fastest elements.
fn buffer_to_elements<T: Element>(buffer: &Plane2D) -> Result<Vec<T>, FetchError> {
    let (w, h) = (buffer.width(), buffer.height());
    let values = buffer.values();
    itertools::iproduct!(0..h, 0..w)
        .map(|(y, x)| {
            let value = values[usize::try_from(x * h + y).unwrap()];
            T::from_f64(value).ok_or(FetchError::ValueOutOfRange {
                value,
                pixel_type: T::PIXEL_TYPE,
            })
        })
        .collect()
}

/// The tiled cell loader. Each cell is loaded with one tile fetch of exactly the cell region.
pub struct TileCellLoader<T> {
    fetcher: TileFetcher,
    volume: VolumeKey,
    grid: CellGrid,
    _phantom: PhantomData<T>,
}

impl<T: Element> TileCellLoader<T> {
    /// Create a new tiled cell loader for `volume` with cells of `cell_size`.
    #[must_use]
    pub fn new(fetcher: TileFetcher, volume: VolumeKey, cell_size: [u64; 2]) -> Self {
        let bounds = fetcher.bounds();
        let grid = CellGrid::new([bounds.size_x, bounds.size_y, bounds.size_z], cell_size);
        Self {
            fetcher,
            volume,
            grid,
            _phantom: PhantomData,
        }
    }

    fn load_cell(&self, cell: &CellIndices) -> Result<Cell<T>, FetchError> {
        let plane = PlaneCoord::new(cell[2], self.volume.c, self.volume.t);
        let [cell_w, cell_h] = *self.grid.cell_size();
        let Some(region) = self.grid.cell_region(cell) else {
            // outside of the grid, report the nominal rectangle
            let rect = TileRect::new(cell[0] * cell_w, cell[1] * cell_h, cell_w, cell_h);
            return Err(FetchError::InvalidPlane {
                plane,
                rect,
                bounds: *self.fetcher.bounds(),
            });
        };
        let [x, y, _] = *region.start();
        let [w, h, _] = *region.shape();
        let tile = self.fetcher.fetch_tile(plane, TileRect::new(x, y, w, h))?;
        let elements = buffer_to_elements(&tile)?;
        Ok(Cell { region, elements })
    }
}

impl<T: Element> CellLoaderTraits<T> for TileCellLoader<T> {
    fn cell_grid(&self) -> &CellGrid {
        &self.grid
    }

    fn load(&self, cell: &CellIndices) -> Result<Cell<T>, CellLoadError> {
        let key = CellKey::new(self.volume, *cell);
        log::debug!("load cell {key}");
        self.load_cell(cell)
            .map_err(|source| CellLoadError { key, source })
    }
}

/// The whole plane cell loader.
///
/// Each cell is an entire plane, loaded with one whole plane fetch.
/// This is the legacy retrieval path for stores without tiled access, and is not used unless [`FetchMode::WholePlane`](super::FetchMode::WholePlane) is selected.
pub struct PlaneCellLoader<T> {
    fetcher: TileFetcher,
    volume: VolumeKey,
    grid: CellGrid,
    _phantom: PhantomData<T>,
}

impl<T: Element> PlaneCellLoader<T> {
    /// Create a new whole plane cell loader for `volume`.
    #[must_use]
    pub fn new(fetcher: TileFetcher, volume: VolumeKey) -> Self {
        let bounds = fetcher.bounds();
        let grid = CellGrid::new(
            [bounds.size_x, bounds.size_y, bounds.size_z],
            [bounds.size_x, bounds.size_y],
        );
        Self {
            fetcher,
            volume,
            grid,
            _phantom: PhantomData,
        }
    }

    fn load_plane(&self, cell: &CellIndices) -> Result<Cell<T>, FetchError> {
        let plane = PlaneCoord::new(cell[2], self.volume.c, self.volume.t);
        let Some(region) = self.grid.cell_region(cell) else {
            let bounds = *self.fetcher.bounds();
            return Err(FetchError::InvalidPlane {
                plane,
                rect: TileRect::new(
                    cell[0] * bounds.size_x,
                    cell[1] * bounds.size_y,
                    bounds.size_x,
                    bounds.size_y,
                ),
                bounds,
            });
        };
        let buffer = self.fetcher.fetch_plane(plane)?;
        let elements = buffer_to_elements(&buffer)?;
        Ok(Cell { region, elements })
    }
}

impl<T: Element> CellLoaderTraits<T> for PlaneCellLoader<T> {
    fn cell_grid(&self) -> &CellGrid {
        &self.grid
    }

    fn load(&self, cell: &CellIndices) -> Result<Cell<T>, CellLoadError> {
        let key = CellKey::new(self.volume, *cell);
        log::debug!("load plane {key}");
        self.load_plane(cell)
            .map_err(|source| CellLoadError { key, source })
    }
}
