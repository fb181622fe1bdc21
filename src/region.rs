//! Axis-aligned regions of an image volume.
//!
//! A [`Region`] is a box in `(x, y, z)` voxel coordinates.
//! It is used to describe cells, and the sub-regions requested by [`read_region`](crate::image::CachedVolume::read_region).

use std::ops::Range;

use derive_more::Display;
use thiserror::Error;

/// Voxel indices in `(x, y, z)` order.
pub type VoxelIndices = [u64; 3];

/// A region shape in `(x, y, z)` order.
pub type RegionShape = [u64; 3];

/// An axis-aligned region of a volume.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Default)]
#[display("start {start:?} shape {shape:?}")]
pub struct Region {
    /// The start of the region.
    start: VoxelIndices,
    /// The shape of the region.
    shape: RegionShape,
}

/// The region end overflows `u64`.
#[derive(Copy, Clone, Debug, Error)]
#[error("region with start {0:?} and shape {1:?} overflows")]
pub struct RegionOverflowError(VoxelIndices, RegionShape);

impl Region {
    /// Create a new region with `shape` starting at the origin.
    #[must_use]
    pub const fn new_with_shape(shape: RegionShape) -> Self {
        Self {
            start: [0; 3],
            shape,
        }
    }

    /// Create a new region.
    ///
    /// # Errors
    /// Returns [`RegionOverflowError`] if `start + shape` overflows.
    pub fn new_with_start_shape(
        start: VoxelIndices,
        shape: RegionShape,
    ) -> Result<Self, RegionOverflowError> {
        if std::iter::zip(start, shape).all(|(s, n)| s.checked_add(n).is_some()) {
            Ok(Self { start, shape })
        } else {
            Err(RegionOverflowError(start, shape))
        }
    }

    /// Create a new region from ranges along `x`, `y`, and `z`.
    ///
    /// A range with `end < start` produces an empty extent.
    #[must_use]
    pub fn new_with_ranges(ranges: &[Range<u64>; 3]) -> Self {
        let start = ranges.clone().map(|range| range.start);
        let shape = ranges
            .clone()
            .map(|range| range.end.saturating_sub(range.start));
        Self { start, shape }
    }

    /// Return the start of the region.
    #[must_use]
    pub const fn start(&self) -> &VoxelIndices {
        &self.start
    }

    /// Return the shape of the region.
    #[must_use]
    pub const fn shape(&self) -> &RegionShape {
        &self.shape
    }

    /// Return the end (exclusive) of the region.
    #[must_use]
    pub fn end_exc(&self) -> VoxelIndices {
        [
            self.start[0] + self.shape[0],
            self.start[1] + self.shape[1],
            self.start[2] + self.shape[2],
        ]
    }

    /// Return the number of voxels in the region.
    ///
    /// # Panics
    /// Panics if the number of voxels exceeds [`u64::MAX`].
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.checked_num_elements().unwrap()
    }

    /// Return the number of voxels in the region, or [`None`] if it exceeds [`u64::MAX`].
    #[must_use]
    pub fn checked_num_elements(&self) -> Option<u64> {
        self.shape
            .iter()
            .try_fold(1u64, |acc, &extent| acc.checked_mul(extent))
    }

    /// Return the number of voxels in the region as a `usize`.
    ///
    /// # Panics
    /// Panics if the number of voxels exceeds [`usize::MAX`].
    #[must_use]
    pub fn num_elements_usize(&self) -> usize {
        usize::try_from(self.num_elements()).unwrap()
    }

    /// Returns true if the region contains no voxels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shape.contains(&0)
    }

    /// Returns true if `indices` are within the region.
    #[must_use]
    pub fn contains(&self, indices: &VoxelIndices) -> bool {
        itertools::izip!(indices, &self.start, &self.shape).all(|(&i, &s, &n)| i >= s && i - s < n)
    }

    /// Returns true if the region lies entirely within a volume of shape `volume_shape`.
    #[must_use]
    pub fn inbounds(&self, volume_shape: &RegionShape) -> bool {
        itertools::izip!(&self.start, &self.shape, volume_shape)
            .all(|(&s, &n, &extent)| s.checked_add(n).is_some_and(|end| end <= extent))
    }

    /// Return the overlap of this region with `other`, or [`None`] if they do not intersect.
    #[must_use]
    pub fn overlap(&self, other: &Self) -> Option<Self> {
        let mut start = [0; 3];
        let mut shape = [0; 3];
        for axis in 0..3 {
            let lo = self.start[axis].max(other.start[axis]);
            let hi = (self.start[axis] + self.shape[axis]).min(other.start[axis] + other.shape[axis]);
            if hi <= lo {
                return None;
            }
            start[axis] = lo;
            shape[axis] = hi - lo;
        }
        Some(Self { start, shape })
    }

    /// Return this region relative to `origin`.
    ///
    /// # Errors
    /// Returns [`RegionOverflowError`] if `origin` is beyond the start of the region along any axis.
    pub fn relative_to(&self, origin: &VoxelIndices) -> Result<Self, RegionOverflowError> {
        let mut start = [0; 3];
        for axis in 0..3 {
            start[axis] = self.start[axis]
                .checked_sub(origin[axis])
                .ok_or(RegionOverflowError(self.start, self.shape))?;
        }
        Ok(Self {
            start,
            shape: self.shape,
        })
    }

    /// Return the linearised (x fastest) index of `indices` within a buffer of this region.
    ///
    /// `indices` must be within the region.
    #[must_use]
    pub fn linearised_index(&self, indices: &VoxelIndices) -> u64 {
        debug_assert!(self.contains(indices));
        let [x, y, z] = [
            indices[0] - self.start[0],
            indices[1] - self.start[1],
            indices[2] - self.start[2],
        ];
        (z * self.shape[1] + y) * self.shape[0] + x
    }

    /// Return an iterator over the indices of every voxel in the region, `x` fastest then `y` then `z`.
    pub fn indices(&self) -> impl Iterator<Item = VoxelIndices> {
        let [x0, y0, z0] = self.start;
        let [x1, y1, z1] = self.end_exc();
        itertools::iproduct!(z0..z1, y0..y1, x0..x1).map(|(z, y, x)| [x, y, z])
    }
}

impl From<[Range<u64>; 3]> for Region {
    fn from(ranges: [Range<u64>; 3]) -> Self {
        Self::new_with_ranges(&ranges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_overlap() {
        let a = Region::new_with_ranges(&[0..512, 0..512, 0..1]);
        let b = Region::new_with_ranges(&[500..1000, 100..200, 0..1]);
        let overlap = a.overlap(&b).unwrap();
        assert_eq!(overlap, Region::new_with_ranges(&[500..512, 100..200, 0..1]));
        assert_eq!(
            overlap.relative_to(&[500, 0, 0]).unwrap(),
            Region::new_with_ranges(&[0..12, 100..200, 0..1])
        );
        assert!(overlap.relative_to(&[501, 0, 0]).is_err());

        let c = Region::new_with_ranges(&[512..600, 0..10, 0..1]);
        assert!(a.overlap(&c).is_none());
    }

    #[test]
    fn region_bounds() {
        let region = Region::new_with_start_shape([10, 20, 0], [5, 5, 2]).unwrap();
        assert_eq!(region.end_exc(), [15, 25, 2]);
        assert_eq!(region.num_elements(), 50);
        assert!(region.inbounds(&[15, 25, 2]));
        assert!(!region.inbounds(&[14, 25, 2]));
        assert!(region.contains(&[14, 24, 1]));
        assert!(!region.contains(&[15, 24, 1]));
        assert_eq!(region.linearised_index(&[11, 21, 1]), 25 + 5 + 1);
        assert!(Region::new_with_start_shape([u64::MAX, 0, 0], [1, 1, 1]).is_err());
        assert!(Region::new_with_ranges(&[3..1, 0..1, 0..1]).is_empty());
        assert_eq!(region.checked_num_elements(), Some(50));
        assert_eq!(
            Region::new_with_ranges(&[0..u64::MAX, 0..3, 0..1]).checked_num_elements(),
            None
        );
        assert_eq!(region.to_string(), "start [10, 20, 0] shape [5, 5, 2]");
    }

    #[test]
    fn region_indices() {
        let region = Region::new_with_ranges(&[1..3, 0..2, 4..5]);
        let indices: Vec<_> = region.indices().collect();
        assert_eq!(indices, vec![[1, 0, 4], [2, 0, 4], [1, 1, 4], [2, 1, 4]]);
        assert_eq!(Region::new_with_shape([0, 4, 4]).indices().count(), 0);
    }
}
