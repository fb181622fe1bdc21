use std::sync::Arc;

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::element::Element;

use super::RandomAccessVolume;

/// An interpolation method.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, Display, Default)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// The value of the nearest voxel.
    #[default]
    #[display("nearest_neighbor")]
    NearestNeighbor,
    /// Trilinear interpolation of the eight surrounding voxels.
    #[display("n_linear")]
    NLinear,
}

/// A continuous-domain view of a [`RandomAccessVolume`].
///
/// Positions are in voxel coordinates, with voxel centres at integer positions.
/// The volume is extended with zeros beyond its bounds.
pub struct InterpolatedVolume<T: Element> {
    volume: Arc<dyn RandomAccessVolume<T>>,
    interpolation: Interpolation,
}

impl<T: Element> InterpolatedVolume<T> {
    /// Create a new interpolated view of `volume`.
    #[must_use]
    pub fn new(volume: Arc<dyn RandomAccessVolume<T>>, interpolation: Interpolation) -> Self {
        Self {
            volume,
            interpolation,
        }
    }

    /// Return the interpolation method.
    #[must_use]
    pub const fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// Return the underlying volume.
    #[must_use]
    pub fn volume(&self) -> &Arc<dyn RandomAccessVolume<T>> {
        &self.volume
    }

    #[allow(clippy::cast_sign_loss)]
    fn sample(&self, indices: [f64; 3]) -> f64 {
        let shape = self.volume.shape();
        if indices.iter().any(|i| *i < 0.0) {
            return 0.0;
        }
        let indices = indices.map(|i| i as u64);
        if std::iter::zip(indices, shape).all(|(i, n)| i < n) {
            self.volume.get(&indices).as_f64()
        } else {
            0.0
        }
    }

    /// Return the interpolated value at `position`.
    ///
    /// Non-finite positions are outside of the volume and read as zero.
    #[must_use]
    pub fn get(&self, position: [f64; 3]) -> f64 {
        if !position.iter().all(|p| p.is_finite()) {
            return 0.0;
        }
        match self.interpolation {
            Interpolation::NearestNeighbor => self.sample(position.map(|p| (p + 0.5).floor())),
            Interpolation::NLinear => {
                let [x0, y0, z0] = position.map(f64::floor);
                let [dx, dy, dz] = [position[0] - x0, position[1] - y0, position[2] - z0];
                let (x1, y1, z1) = (x0 + 1.0, y0 + 1.0, z0 + 1.0);

                let c00 = self.sample([x0, y0, z0]) * (1.0 - dx) + self.sample([x1, y0, z0]) * dx;
                let c10 = self.sample([x0, y1, z0]) * (1.0 - dx) + self.sample([x1, y1, z0]) * dx;
                let c01 = self.sample([x0, y0, z1]) * (1.0 - dx) + self.sample([x1, y0, z1]) * dx;
                let c11 = self.sample([x0, y1, z1]) * (1.0 - dx) + self.sample([x1, y1, z1]) * dx;

                let c0 = c00 * (1.0 - dy) + c10 * dy;
                let c1 = c01 * (1.0 - dy) + c11 * dy;

                c0 * (1.0 - dz) + c1 * dz
            }
        }
    }
}
