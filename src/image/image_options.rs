use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::{config::global_config, remote::{ImageId, LengthUnit}};

use super::CellCachePolicy;

/// The cell size policy of an image.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CellSizePolicy {
    /// The native tile size reported by the remote store for each level.
    ///
    /// The [default cell size](crate::config::Config#default-cell-size) is used if the store reports none.
    #[default]
    Native,
    /// A fixed cell size for every level.
    Fixed {
        /// The cell width.
        x: u64,
        /// The cell height.
        y: u64,
    },
}

/// The remote retrieval mode of an image.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Cells are fetched as tiles with [`TileCellLoader`](super::TileCellLoader).
    #[default]
    Tiled,
    /// Each plane is a single cell fetched whole with [`PlaneCellLoader`](super::PlaneCellLoader).
    WholePlane,
}

/// The physical voxel size reported for resolution levels other than the full resolution.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LevelVoxelSize {
    /// Every level reports the voxel size of the full resolution level.
    #[default]
    Base,
    /// The voxel size is scaled along `x` and `y` by the downsampling of the level relative to the full resolution level.
    ScaledByLevel,
}

fn default_cell_cache() -> CellCachePolicy {
    global_config().default_cell_cache()
}

/// Options for opening a remote image.
///
/// Options are immutable once constructed.
/// They are resolved against the remote store by [`ImageDescriptor::resolve`](super::ImageDescriptor::resolve).
///
/// ```
/// # use remote_cells::{image::{ImageOpenOptions, CellSizePolicy}, remote::{ImageId, LengthUnit}};
/// let options = ImageOpenOptions::new(ImageId(42))
///     .with_unit(LengthUnit::Micrometer)
///     .with_cell_size(CellSizePolicy::Fixed { x: 512, y: 512 });
/// assert_eq!(options.unit(), LengthUnit::Micrometer);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct ImageOpenOptions {
    image: ImageId,
    #[serde(default)]
    unit: LengthUnit,
    #[serde(default)]
    cell_size: CellSizePolicy,
    #[serde(default)]
    fetch_mode: FetchMode,
    #[serde(default = "default_cell_cache")]
    cell_cache: CellCachePolicy,
    #[serde(default)]
    level_voxel_size: LevelVoxelSize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl ImageOpenOptions {
    /// Create new image open options for `image`.
    ///
    /// The defaults are millimetre units, native cell sizes, tiled fetching, the [default cell cache](crate::config::Config#default-cell-cache),
    /// and the full resolution voxel size for every level.
    #[must_use]
    pub fn new(image: ImageId) -> Self {
        Self {
            image,
            unit: LengthUnit::default(),
            cell_size: CellSizePolicy::default(),
            fetch_mode: FetchMode::default(),
            cell_cache: default_cell_cache(),
            level_voxel_size: LevelVoxelSize::default(),
            name: None,
        }
    }

    /// Set the physical unit of the transforms.
    #[must_use]
    pub fn with_unit(mut self, unit: LengthUnit) -> Self {
        self.unit = unit;
        self
    }

    /// Set the cell size policy.
    #[must_use]
    pub fn with_cell_size(mut self, cell_size: CellSizePolicy) -> Self {
        self.cell_size = cell_size;
        self
    }

    /// Set the fetch mode.
    #[must_use]
    pub fn with_fetch_mode(mut self, fetch_mode: FetchMode) -> Self {
        self.fetch_mode = fetch_mode;
        self
    }

    /// Set the cell cache policy of each volume.
    #[must_use]
    pub fn with_cell_cache(mut self, cell_cache: CellCachePolicy) -> Self {
        self.cell_cache = cell_cache;
        self
    }

    /// Set the voxel size policy of resolution levels.
    #[must_use]
    pub fn with_level_voxel_size(mut self, level_voxel_size: LevelVoxelSize) -> Self {
        self.level_voxel_size = level_voxel_size;
        self
    }

    /// Set the display name of the image.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Return the image.
    #[must_use]
    pub const fn image(&self) -> ImageId {
        self.image
    }

    /// Return the physical unit.
    #[must_use]
    pub const fn unit(&self) -> LengthUnit {
        self.unit
    }

    /// Return the cell size policy.
    #[must_use]
    pub const fn cell_size(&self) -> CellSizePolicy {
        self.cell_size
    }

    /// Return the fetch mode.
    #[must_use]
    pub const fn fetch_mode(&self) -> FetchMode {
        self.fetch_mode
    }

    /// Return the cell cache policy.
    #[must_use]
    pub const fn cell_cache(&self) -> CellCachePolicy {
        self.cell_cache
    }

    /// Return the voxel size policy of resolution levels.
    #[must_use]
    pub const fn level_voxel_size(&self) -> LevelVoxelSize {
        self.level_voxel_size
    }

    /// Return the display name, if set.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}
