use std::sync::Arc;

use thiserror::Error;

use crate::{
    element::UnsupportedPixelTypeError,
    region::{Region, RegionShape},
    remote::RemoteError,
};

use super::{CellIndices, CellLoadError, VolumeKey};

/// A [`CachedVolume`](super::CachedVolume) error.
#[derive(Clone, Debug, Error)]
pub enum VolumeError {
    /// A cell load failed. The cell is left unmaterialized.
    #[error(transparent)]
    CellLoadFailed(Arc<CellLoadError>),
    /// The region is not within the volume.
    #[error("region {0} is not within a volume of shape {1:?}")]
    InvalidRegion(Region, RegionShape),
    /// The cell is outside the cell grid of the volume.
    #[error("cell {1:?} is outside the cell grid of volume {0}")]
    InvalidCell(VolumeKey, CellIndices),
}

/// An [`ImageIndex`](super::ImageIndex) error.
#[derive(Clone, Debug, Error)]
pub enum IndexError {
    /// The volume does not exist.
    #[error("volume {0} does not exist in an image with {1} levels, {2} timepoints and {3} channels")]
    InvalidVolume(VolumeKey, usize, u64, u64),
    /// The resolution level does not exist.
    #[error("resolution level {0} does not exist in an image with {1} levels")]
    InvalidLevel(usize, usize),
    /// A volume error.
    #[error(transparent)]
    VolumeError(#[from] VolumeError),
}

/// An image open error.
#[derive(Debug, Error)]
pub enum ImageOpenError {
    /// A remote store error.
    #[error(transparent)]
    Remote(#[from] RemoteError),
    /// The pixel type of the image is not supported.
    #[error(transparent)]
    UnsupportedPixelType(#[from] UnsupportedPixelTypeError),
    /// The image metadata is invalid.
    #[error("invalid image metadata: {0}")]
    InvalidMetadata(String),
}
