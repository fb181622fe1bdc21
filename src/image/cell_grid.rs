use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::region::{Region, RegionShape, VoxelIndices};

/// Cell grid indices in `(x, y, z)` order.
pub type CellIndices = [u64; 3];

/// A regular grid of cells over a volume.
///
/// Cells are `cell_size[0]` by `cell_size[1]` pixels in a plane and always one plane deep.
/// Cells in the last column or row are shrunk to the volume extent, so cells never overlap and never leave gaps.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, Display)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct CellGrid {
    image_shape: RegionShape,
    cell_size: [u64; 2],
}

impl CellGrid {
    /// Create a new cell grid over a volume of `image_shape` with cells of `cell_size`.
    ///
    /// A zero cell extent is treated as one.
    #[must_use]
    pub fn new(image_shape: RegionShape, cell_size: [u64; 2]) -> Self {
        Self {
            image_shape,
            cell_size: cell_size.map(|extent| extent.max(1)),
        }
    }

    /// Return the shape of the volume.
    #[must_use]
    pub const fn image_shape(&self) -> &RegionShape {
        &self.image_shape
    }

    /// Return the nominal cell size.
    #[must_use]
    pub const fn cell_size(&self) -> &[u64; 2] {
        &self.cell_size
    }

    /// Return the number of cells along each axis.
    #[must_use]
    pub fn grid_shape(&self) -> [u64; 3] {
        [
            self.image_shape[0].div_ceil(self.cell_size[0]),
            self.image_shape[1].div_ceil(self.cell_size[1]),
            self.image_shape[2],
        ]
    }

    /// Return the total number of cells.
    #[must_use]
    pub fn num_cells(&self) -> u64 {
        self.grid_shape().iter().product()
    }

    /// Returns true if `cell` is within the grid.
    #[must_use]
    pub fn contains_cell(&self, cell: &CellIndices) -> bool {
        std::iter::zip(cell, self.grid_shape()).all(|(&i, n)| i < n)
    }

    /// Return the origin of `cell`, or [`None`] if it is outside the grid.
    #[must_use]
    pub fn cell_origin(&self, cell: &CellIndices) -> Option<VoxelIndices> {
        self.contains_cell(cell).then(|| {
            [
                cell[0] * self.cell_size[0],
                cell[1] * self.cell_size[1],
                cell[2],
            ]
        })
    }

    /// Return the region of `cell`, or [`None`] if it is outside the grid.
    #[must_use]
    pub fn cell_region(&self, cell: &CellIndices) -> Option<Region> {
        let origin = self.cell_origin(cell)?;
        let shape = [
            self.cell_size[0].min(self.image_shape[0] - origin[0]),
            self.cell_size[1].min(self.image_shape[1] - origin[1]),
            1,
        ];
        Region::new_with_start_shape(origin, shape).ok()
    }

    /// Return the indices of the cell containing the voxel at `indices`, or [`None`] if it is outside the volume.
    #[must_use]
    pub fn cell_indices(&self, indices: &VoxelIndices) -> Option<CellIndices> {
        Region::new_with_shape(self.image_shape)
            .contains(indices)
            .then(|| {
                [
                    indices[0] / self.cell_size[0],
                    indices[1] / self.cell_size[1],
                    indices[2],
                ]
            })
    }

    /// Return the region of cell indices of the cells overlapping `region`.
    ///
    /// Returns [`None`] if `region` is not within the volume.
    #[must_use]
    pub fn cells_in_region(&self, region: &Region) -> Option<Region> {
        if !region.inbounds(&self.image_shape) {
            return None;
        }
        if region.is_empty() {
            return Some(Region::new_with_shape([0; 3]));
        }
        let start = region.start();
        let end = region.end_exc();
        Some(Region::new_with_ranges(&[
            start[0] / self.cell_size[0]..end[0].div_ceil(self.cell_size[0]),
            start[1] / self.cell_size[1]..end[1].div_ceil(self.cell_size[1]),
            start[2]..end[2],
        ]))
    }
}
