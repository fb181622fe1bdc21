//! The remote image store.
//!
//! Pixel data of an image lives on a remote server and is only retrievable through blocking remote calls,
//! each returning one rectangular tile or one full plane of a `(z, c, t)` plane.
//! This module defines the contract this crate requires of that server ([`RemoteStore`] and [`PixelsAccess`])
//! and the value types exchanged with it.
//!
//! Connecting, authenticating and keeping a session alive are the responsibility of the [`RemoteStore`] implementation.
//! The store is shared read-only between all threads reading an image, so it must support concurrent independent requests.
//!
//! Some stores are provided:
//!  - [`MemoryRemoteStore`]: procedurally generated in-memory images,
//!  - [`PerformanceMetricsRemoteStore`]: counts calls and transferred samples of an inner store,
//!  - [`UsageLogRemoteStore`]: logs calls to an inner store with the [`log`] facade.

mod memory;
mod performance_metrics;
mod usage_log;

use std::sync::Arc;

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::element::PixelType;

pub use memory::{MemoryImage, MemoryRemoteStore};
pub use performance_metrics::PerformanceMetricsRemoteStore;
pub use usage_log::UsageLogRemoteStore;

/// [`Arc`] wrapped remote store.
pub type RemoteStoreHandle = Arc<dyn RemoteStore>;

/// An opaque handle of a remote image.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize, Display, From)]
#[display("Image:{_0}")]
#[serde(transparent)]
pub struct ImageId(pub u64);

/// The coordinates of a plane of an image.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Display)]
#[display("z={z} c={c} t={t}")]
pub struct PlaneCoord {
    /// The z index.
    pub z: u64,
    /// The channel index.
    pub c: u64,
    /// The timepoint index.
    pub t: u64,
}

impl PlaneCoord {
    /// Create a new plane coordinate.
    #[must_use]
    pub const fn new(z: u64, c: u64, t: u64) -> Self {
        Self { z, c, t }
    }
}

/// A rectangle of pixels within a plane.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Display)]
#[display("x={x} y={y} w={w} h={h}")]
pub struct TileRect {
    /// The x offset.
    pub x: u64,
    /// The y offset.
    pub y: u64,
    /// The width.
    pub w: u64,
    /// The height.
    pub h: u64,
}

impl TileRect {
    /// Create a new tile rectangle.
    #[must_use]
    pub const fn new(x: u64, y: u64, w: u64, h: u64) -> Self {
        Self { x, y, w, h }
    }

    /// Returns true if the rectangle lies within a plane of `size_x` by `size_y` pixels.
    #[must_use]
    pub fn inbounds(&self, size_x: u64, size_y: u64) -> bool {
        self.x.checked_add(self.w).is_some_and(|end| end <= size_x)
            && self.y.checked_add(self.h).is_some_and(|end| end <= size_y)
    }

    /// Return the number of pixels in the rectangle.
    #[must_use]
    pub const fn num_elements(&self) -> u64 {
        self.w * self.h
    }
}

/// A length unit.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, Display, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum LengthUnit {
    /// Metres.
    #[display("m")]
    Meter,
    /// Millimetres.
    #[default]
    #[display("mm")]
    Millimeter,
    /// Micrometres.
    #[display("µm")]
    Micrometer,
    /// Nanometres.
    #[display("nm")]
    Nanometer,
}

impl LengthUnit {
    const fn metres_per_unit(self) -> f64 {
        match self {
            Self::Meter => 1.0,
            Self::Millimeter => 1e-3,
            Self::Micrometer => 1e-6,
            Self::Nanometer => 1e-9,
        }
    }
}

/// A physical length.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize, Display)]
#[display("{value}{unit}")]
pub struct Length {
    /// The value.
    pub value: f64,
    /// The unit of `value`.
    pub unit: LengthUnit,
}

impl Length {
    /// Create a new length.
    #[must_use]
    pub const fn new(value: f64, unit: LengthUnit) -> Self {
        Self { value, unit }
    }

    /// Return the value of this length in `unit`.
    #[must_use]
    pub fn value_in(&self, unit: LengthUnit) -> f64 {
        if self.unit == unit {
            self.value
        } else {
            self.value * self.unit.metres_per_unit() / unit.metres_per_unit()
        }
    }
}

/// The pixels metadata of a remote image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PixelsMetadata {
    /// The width of the full resolution image.
    pub size_x: u64,
    /// The height of the full resolution image.
    pub size_y: u64,
    /// The number of z planes.
    pub size_z: u64,
    /// The number of channels.
    pub size_c: u64,
    /// The number of timepoints.
    pub size_t: u64,
    /// The pixel type.
    pub pixel_type: PixelType,
    /// The physical size of a pixel along x.
    pub physical_size_x: Option<Length>,
    /// The physical size of a pixel along y.
    pub physical_size_y: Option<Length>,
    /// The physical size of a pixel along z. Absent for 2D images.
    pub physical_size_z: Option<Length>,
}

/// The description of one resolution level of a remote image pyramid.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ResolutionDescription {
    /// The width of the level.
    pub size_x: u64,
    /// The height of the level.
    pub size_y: u64,
    /// The native tile width of the store. Zero if the store has no preference.
    pub tile_size_x: u64,
    /// The native tile height of the store. Zero if the store has no preference.
    pub tile_size_y: u64,
}

/// A dense two dimensional buffer of pixel values returned by the remote store.
///
/// Values are stored x-major: the value of pixel `(x, y)` is at `x * height + y`.
#[derive(Clone, Debug, PartialEq)]
pub struct Plane2D {
    width: u64,
    height: u64,
    values: Vec<f64>,
}

impl Plane2D {
    /// Create a new plane buffer from x-major `values`.
    ///
    /// # Errors
    /// Returns [`RemoteError::Other`] if the length of `values` is not `width * height`.
    pub fn new(width: u64, height: u64, values: Vec<f64>) -> Result<Self, RemoteError> {
        if values.len() as u64 == width * height {
            Ok(Self {
                width,
                height,
                values,
            })
        } else {
            Err(RemoteError::Other(format!(
                "plane buffer of {width}x{height} has {} values",
                values.len()
            )))
        }
    }

    /// Create a new plane buffer by evaluating `f(x, y)` at every pixel.
    #[must_use]
    pub fn from_fn(width: u64, height: u64, f: impl Fn(u64, u64) -> f64) -> Self {
        let values = (0..width)
            .flat_map(|x| (0..height).map(move |y| (x, y)))
            .map(|(x, y)| f(x, y))
            .collect();
        Self {
            width,
            height,
            values,
        }
    }

    /// Return the width of the buffer.
    #[must_use]
    pub const fn width(&self) -> u64 {
        self.width
    }

    /// Return the height of the buffer.
    #[must_use]
    pub const fn height(&self) -> u64 {
        self.height
    }

    /// Return the value at `(x, y)`.
    ///
    /// # Panics
    /// Panics if `(x, y)` is outside the buffer.
    #[must_use]
    pub fn value(&self, x: u64, y: u64) -> f64 {
        assert!(x < self.width && y < self.height);
        self.values[usize::try_from(x * self.height + y).unwrap()]
    }

    /// Return the x-major values.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// A remote store error.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The connection or session to the remote store is broken.
    #[error("remote store unavailable: {0}")]
    Unavailable(String),
    /// The image does not exist or is not accessible.
    #[error("{0} not found")]
    ImageNotFound(ImageId),
    /// The requested plane or tile is outside the declared bounds of the image.
    #[error("invalid plane {0} {1}: {2}")]
    InvalidPlane(PlaneCoord, TileRect, String),
    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl From<&str> for RemoteError {
    fn from(err: &str) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<String> for RemoteError {
    fn from(err: String) -> Self {
        Self::Other(err)
    }
}

/// A handle to the pixel data of one resolution level of a remote image.
///
/// An access handle is a per-call resource: it is acquired immediately before a fetch and released when dropped.
/// Implementations must release any server-side resource in [`Drop`], so that it is released even if the fetch fails.
pub trait PixelsAccess {
    /// Fetch a rectangular tile of a plane.
    ///
    /// The returned buffer has width `rect.w` and height `rect.h`.
    ///
    /// # Errors
    /// Returns [`RemoteError::Unavailable`] if the session is broken, or [`RemoteError::InvalidPlane`] if the request is out of bounds.
    fn fetch_tile(&mut self, plane: PlaneCoord, rect: TileRect) -> Result<Plane2D, RemoteError>;

    /// Fetch a full plane.
    ///
    /// This is the whole-plane retrieval path, only used by [`PlaneCellLoader`](crate::image::PlaneCellLoader).
    ///
    /// # Errors
    /// Returns [`RemoteError::Unavailable`] if the session is broken, or [`RemoteError::InvalidPlane`] if the request is out of bounds.
    fn fetch_plane(&mut self, plane: PlaneCoord) -> Result<Plane2D, RemoteError>;
}

/// The interface of a remote image store.
pub trait RemoteStore: Send + Sync {
    /// Resolve the pixels metadata of `image`.
    ///
    /// # Errors
    /// Returns a [`RemoteError`] if the image cannot be resolved.
    fn resolve_pixels_metadata(&self, image: ImageId) -> Result<PixelsMetadata, RemoteError>;

    /// Resolve the resolution levels of `image`, full resolution first.
    ///
    /// An empty list indicates that the image is not pyramidal.
    ///
    /// # Errors
    /// Returns a [`RemoteError`] if the image cannot be resolved.
    fn resolve_resolution_levels(
        &self,
        image: ImageId,
    ) -> Result<Vec<ResolutionDescription>, RemoteError>;

    /// Acquire a pixel data access handle for resolution `level` of `image`.
    ///
    /// # Errors
    /// Returns a [`RemoteError`] if an access handle cannot be acquired.
    fn open_pixels_access(
        &self,
        image: ImageId,
        level: usize,
    ) -> Result<Box<dyn PixelsAccess + '_>, RemoteError>;
}

impl<TStore: ?Sized + RemoteStore> RemoteStore for Arc<TStore> {
    fn resolve_pixels_metadata(&self, image: ImageId) -> Result<PixelsMetadata, RemoteError> {
        (**self).resolve_pixels_metadata(image)
    }

    fn resolve_resolution_levels(
        &self,
        image: ImageId,
    ) -> Result<Vec<ResolutionDescription>, RemoteError> {
        (**self).resolve_resolution_levels(image)
    }

    fn open_pixels_access(
        &self,
        image: ImageId,
        level: usize,
    ) -> Result<Box<dyn PixelsAccess + '_>, RemoteError> {
        (**self).open_pixels_access(image, level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_2d_x_major() {
        let plane = Plane2D::from_fn(3, 2, |x, y| (x * 10 + y) as f64);
        assert_eq!(plane.values(), &[0.0, 1.0, 10.0, 11.0, 20.0, 21.0]);
        assert!((plane.value(2, 1) - 21.0).abs() < f64::EPSILON);
        assert!(Plane2D::new(3, 2, vec![0.0; 5]).is_err());
    }

    #[test]
    fn length_conversion() {
        let length = Length::new(0.25, LengthUnit::Micrometer);
        assert!((length.value_in(LengthUnit::Nanometer) - 250.0).abs() < 1e-9);
        assert!((length.value_in(LengthUnit::Millimeter) - 0.00025).abs() < 1e-12);
        assert_eq!(length.to_string(), "0.25µm");
    }

    #[test]
    fn tile_rect_bounds() {
        let rect = TileRect::new(512, 512, 488, 88);
        assert!(rect.inbounds(1000, 600));
        assert!(!rect.inbounds(999, 600));
        assert!(!TileRect::new(u64::MAX, 0, 1, 1).inbounds(u64::MAX, 1));
        assert_eq!(rect.num_elements(), 488 * 88);
    }
}
