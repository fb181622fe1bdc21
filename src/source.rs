//! Random-access sources for a visualization layer.
//!
//! A [`Source`] presents one channel of an image as a set of volumes, one per timepoint and resolution level.
//! Sources never fail: errors from the cache layers are logged and read as zeros, so that a viewer can render what is available.

mod interpolated;

use std::sync::Arc;

pub use interpolated::{Interpolation, InterpolatedVolume};

use crate::{
    element::{Element, PixelType},
    image::{AffineTransform3D, CachedVolume, ImageIndex, IndexError, VolumeKey},
    region::{Region, RegionShape, VoxelIndices},
};

/// A random-access volume of a fixed sample type.
pub trait RandomAccessVolume<T: Element>: Send + Sync {
    /// Return the shape of the volume.
    fn shape(&self) -> RegionShape;

    /// Return the element at `indices`.
    ///
    /// Returns zero if `indices` is outside of the volume or the element cannot be read.
    fn get(&self, indices: &VoxelIndices) -> T;

    /// Read `region`, `x` fastest then `y` then `z`.
    ///
    /// Returns zeros for the region if it cannot be read, or an empty vector if `region` is not within the volume.
    fn read_region(&self, region: &Region) -> Vec<T>;
}

/// A multi-resolution, multi-timepoint volumetric source of a fixed sample type.
pub trait Source<T: Element>: Send + Sync {
    /// Returns true if the source has timepoint `t`.
    fn is_present(&self, t: i64) -> bool;

    /// Return the volume at timepoint `t` and resolution `level`, or [`None`] if it does not exist.
    fn volume_at(&self, t: i64, level: usize) -> Option<Arc<dyn RandomAccessVolume<T>>>;

    /// Return the zero-extended, interpolated volume at timepoint `t` and resolution `level`, or [`None`] if it does not exist.
    fn interpolated_volume_at(
        &self,
        t: i64,
        level: usize,
        interpolation: Interpolation,
    ) -> Option<InterpolatedVolume<T>> {
        self.volume_at(t, level)
            .map(|volume| InterpolatedVolume::new(volume, interpolation))
    }

    /// Return the voxel to physical transform at timepoint `t` and resolution `level`, or [`None`] if the level does not exist.
    fn transform_at(&self, t: i64, level: usize) -> Option<AffineTransform3D>;

    /// Return the sample type.
    fn sample_type(&self) -> PixelType {
        T::PIXEL_TYPE
    }

    /// Return the name of the source.
    fn name(&self) -> &str;

    /// Return the number of resolution levels.
    fn num_resolution_levels(&self) -> usize;
}

/// A [`RandomAccessVolume`] backed by a [`CachedVolume`].
///
/// Read failures are logged with [`log::warn!`] and read as zeros.
#[derive(Debug, Clone)]
pub struct SourceVolume<T: Element> {
    volume: Arc<CachedVolume<T>>,
}

impl<T: Element> SourceVolume<T> {
    /// Create a new source volume.
    #[must_use]
    pub fn new(volume: Arc<CachedVolume<T>>) -> Self {
        Self { volume }
    }

    /// Return the cached volume.
    #[must_use]
    pub fn cached_volume(&self) -> &Arc<CachedVolume<T>> {
        &self.volume
    }

    fn key(&self) -> VolumeKey {
        self.volume.key()
    }
}

impl<T: Element> RandomAccessVolume<T> for SourceVolume<T> {
    fn shape(&self) -> RegionShape {
        *self.volume.shape()
    }

    fn get(&self, indices: &VoxelIndices) -> T {
        if !Region::new_with_shape(self.shape()).contains(indices) {
            return T::default();
        }
        self.volume.value(indices).unwrap_or_else(|err| {
            log::warn!("{} reading {indices:?} as zero: {err}", self.key());
            T::default()
        })
    }

    fn read_region(&self, region: &Region) -> Vec<T> {
        if !region.inbounds(&self.shape()) {
            log::warn!(
                "{} reading {region} outside of shape {:?} as no data",
                self.key(),
                self.shape()
            );
            return vec![];
        }
        self.volume.read_region(region).unwrap_or_else(|err| {
            log::warn!("{} reading {region} as zeros: {err}", self.key());
            vec![T::default(); region.num_elements_usize()]
        })
    }
}

/// A [`Source`] of one channel of an [`ImageIndex`].
#[derive(Debug, Clone)]
pub struct RemoteSource<T: Element> {
    index: Arc<ImageIndex<T>>,
    channel: u64,
    name: String,
    num_levels: usize,
}

impl<T: Element> RemoteSource<T> {
    /// Create a new multi-resolution source of `channel` of `index`.
    ///
    /// # Errors
    /// Returns [`IndexError::InvalidVolume`] if the channel does not exist.
    pub fn new(index: Arc<ImageIndex<T>>, channel: u64) -> Result<Self, IndexError> {
        if channel >= index.size_c() {
            return Err(IndexError::InvalidVolume(
                VolumeKey::new(0, 0, channel),
                index.num_levels(),
                index.size_t(),
                index.size_c(),
            ));
        }
        let name = format!("{} - c{channel}", index.descriptor().name());
        let num_levels = index.num_levels();
        Ok(Self {
            index,
            channel,
            name,
            num_levels,
        })
    }

    /// Create a new source of `channel` of `index` exposing only the full resolution level.
    ///
    /// # Errors
    /// Returns [`IndexError::InvalidVolume`] if the channel does not exist.
    pub fn new_single_resolution(
        index: Arc<ImageIndex<T>>,
        channel: u64,
    ) -> Result<Self, IndexError> {
        let mut source = Self::new(index, channel)?;
        source.num_levels = 1;
        Ok(source)
    }

    /// Return the image index.
    #[must_use]
    pub fn index(&self) -> &Arc<ImageIndex<T>> {
        &self.index
    }

    /// Return the channel.
    #[must_use]
    pub const fn channel(&self) -> u64 {
        self.channel
    }

    /// Return the cached volume at timepoint `t` and resolution `level`.
    ///
    /// # Errors
    /// Returns [`IndexError::InvalidVolume`] if the timepoint or level does not exist.
    pub fn cached_volume_at(
        &self,
        t: u64,
        level: usize,
    ) -> Result<Arc<CachedVolume<T>>, IndexError> {
        if level >= self.num_levels {
            return Err(IndexError::InvalidVolume(
                VolumeKey::new(level, t, self.channel),
                self.num_levels,
                self.index.size_t(),
                self.index.size_c(),
            ));
        }
        self.index.get_volume(level, t, self.channel)
    }
}

impl<T: Element> Source<T> for RemoteSource<T> {
    fn is_present(&self, t: i64) -> bool {
        self.index.is_present(t)
    }

    fn volume_at(&self, t: i64, level: usize) -> Option<Arc<dyn RandomAccessVolume<T>>> {
        let t = u64::try_from(t).ok()?;
        match self.cached_volume_at(t, level) {
            Ok(volume) => Some(Arc::new(SourceVolume::new(volume))),
            Err(err) => {
                log::warn!("{}: {err}", self.name);
                None
            }
        }
    }

    fn transform_at(&self, _t: i64, level: usize) -> Option<AffineTransform3D> {
        if level < self.num_levels {
            self.index.get_transform(level).ok()
        } else {
            None
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn num_resolution_levels(&self) -> usize {
        self.num_levels
    }
}
