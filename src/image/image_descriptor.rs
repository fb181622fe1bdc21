use serde::{Deserialize, Serialize};

use crate::{
    config::global_config,
    element::PixelType,
    remote::{Length, LengthUnit, PixelsMetadata, RemoteStore, ResolutionDescription},
};

use super::{
    AffineTransform3D, CellSizePolicy, FetchMode, ImageOpenError, ImageOpenOptions,
    LevelVoxelSize, PlaneBounds,
};

/// The physical size of a voxel of the full resolution level.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhysicalCalibration {
    /// The voxel size along `x`.
    pub size_x: f64,
    /// The voxel size along `y`.
    pub size_y: f64,
    /// The voxel size along `z`.
    pub size_z: f64,
    /// The unit of the voxel sizes.
    pub unit: LengthUnit,
}

/// A resolved resolution level.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct LevelDescriptor {
    /// The shape of the level volume in `(x, y, z)` order.
    pub shape: [u64; 3],
    /// The cell size of the level.
    pub cell_size: [u64; 2],
}

/// An immutable description of a remote image, resolved from its [`ImageOpenOptions`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    options: ImageOpenOptions,
    name: String,
    pixel_type: PixelType,
    size_c: u64,
    size_t: u64,
    levels: Vec<LevelDescriptor>,
    calibration: PhysicalCalibration,
}

fn calibration_length(length: Option<&Length>, unit: LengthUnit, axis: &str) -> f64 {
    if let Some(length) = length {
        length.value_in(unit)
    } else {
        if axis != "z" {
            log::warn!("missing physical pixel size along {axis}, using 1{unit}");
        }
        1.0
    }
}

impl ImageDescriptor {
    /// Resolve the description of an image from `store`.
    ///
    /// The cell size of each level is clamped to the extent of the coarsest level, and to the extent of the level itself.
    /// An image without resolution levels is treated as having a single full resolution level.
    ///
    /// # Errors
    /// Returns [`ImageOpenError`] if the remote store fails or the image metadata is invalid.
    pub fn resolve(
        store: &dyn RemoteStore,
        options: &ImageOpenOptions,
    ) -> Result<Self, ImageOpenError> {
        let image = options.image();
        let metadata = store.resolve_pixels_metadata(image)?;
        let PixelsMetadata {
            size_x,
            size_y,
            size_z,
            size_c,
            size_t,
            pixel_type,
            ..
        } = metadata;
        if [size_x, size_y, size_z, size_c, size_t].contains(&0) {
            return Err(ImageOpenError::InvalidMetadata(format!(
                "{image} has an empty dimension: {size_x}x{size_y}x{size_z}, c={size_c}, t={size_t}"
            )));
        }

        let mut resolutions = store.resolve_resolution_levels(image)?;
        if resolutions.is_empty() {
            log::debug!("{image} has no resolution levels, using a single level");
            resolutions.push(ResolutionDescription {
                size_x,
                size_y,
                tile_size_x: 0,
                tile_size_y: 0,
            });
        }
        if let Some(resolution) = resolutions
            .iter()
            .find(|resolution| resolution.size_x == 0 || resolution.size_y == 0)
        {
            return Err(ImageOpenError::InvalidMetadata(format!(
                "{image} has an empty resolution level {}x{}",
                resolution.size_x, resolution.size_y
            )));
        }

        let default_cell_size = global_config().default_cell_size();
        let coarsest = resolutions[resolutions.len() - 1];
        let levels = resolutions
            .iter()
            .map(|resolution| {
                let nominal = match (options.fetch_mode(), options.cell_size()) {
                    (FetchMode::WholePlane, _) => [resolution.size_x, resolution.size_y],
                    (FetchMode::Tiled, CellSizePolicy::Fixed { x, y }) => [x, y],
                    (FetchMode::Tiled, CellSizePolicy::Native) => [
                        if resolution.tile_size_x == 0 {
                            default_cell_size[0]
                        } else {
                            resolution.tile_size_x
                        },
                        if resolution.tile_size_y == 0 {
                            default_cell_size[1]
                        } else {
                            resolution.tile_size_y
                        },
                    ],
                };
                let cell_size = match options.fetch_mode() {
                    FetchMode::WholePlane => nominal,
                    FetchMode::Tiled => [
                        nominal[0]
                            .min(coarsest.size_x)
                            .min(resolution.size_x)
                            .max(1),
                        nominal[1]
                            .min(coarsest.size_y)
                            .min(resolution.size_y)
                            .max(1),
                    ],
                };
                LevelDescriptor {
                    shape: [resolution.size_x, resolution.size_y, size_z],
                    cell_size,
                }
            })
            .collect();

        let unit = options.unit();
        let calibration = PhysicalCalibration {
            size_x: calibration_length(metadata.physical_size_x.as_ref(), unit, "x"),
            size_y: calibration_length(metadata.physical_size_y.as_ref(), unit, "y"),
            size_z: calibration_length(metadata.physical_size_z.as_ref(), unit, "z"),
            unit,
        };

        let name = options
            .name()
            .map_or_else(|| image.to_string(), ToString::to_string);

        Ok(Self {
            options: options.clone(),
            name,
            pixel_type,
            size_c,
            size_t,
            levels,
            calibration,
        })
    }

    /// Return the options the image was resolved from.
    #[must_use]
    pub const fn options(&self) -> &ImageOpenOptions {
        &self.options
    }

    /// Return the display name of the image.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the pixel type.
    #[must_use]
    pub const fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    /// Return the number of channels.
    #[must_use]
    pub const fn size_c(&self) -> u64 {
        self.size_c
    }

    /// Return the number of timepoints.
    #[must_use]
    pub const fn size_t(&self) -> u64 {
        self.size_t
    }

    /// Return the resolution levels, full resolution first.
    #[must_use]
    pub fn levels(&self) -> &[LevelDescriptor] {
        &self.levels
    }

    /// Return the number of resolution levels.
    #[must_use]
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Return the physical calibration.
    #[must_use]
    pub const fn calibration(&self) -> &PhysicalCalibration {
        &self.calibration
    }

    /// Return the plane bounds of `level`, or [`None`] if the level does not exist.
    #[must_use]
    pub fn plane_bounds(&self, level: usize) -> Option<PlaneBounds> {
        self.levels.get(level).map(|level| PlaneBounds {
            size_x: level.shape[0],
            size_y: level.shape[1],
            size_z: level.shape[2],
            size_c: self.size_c,
            size_t: self.size_t,
        })
    }

    /// Return the voxel to physical transform of `level`, or [`None`] if the level does not exist.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn transform(&self, level: usize) -> Option<AffineTransform3D> {
        let shape = self.levels.get(level)?.shape;
        let base = self.levels[0].shape;
        let PhysicalCalibration {
            size_x,
            size_y,
            size_z,
            ..
        } = self.calibration;
        Some(match self.options.level_voxel_size() {
            LevelVoxelSize::Base => AffineTransform3D::scale(size_x, size_y, size_z),
            LevelVoxelSize::ScaledByLevel => AffineTransform3D::scale(
                size_x * base[0] as f64 / shape[0] as f64,
                size_y * base[1] as f64 / shape[1] as f64,
                size_z,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{ImageId, MemoryImage, MemoryRemoteStore};

    fn metadata() -> PixelsMetadata {
        PixelsMetadata {
            size_x: 4000,
            size_y: 3000,
            size_z: 5,
            size_c: 3,
            size_t: 2,
            pixel_type: PixelType::UInt8,
            physical_size_x: Some(Length::new(0.25, LengthUnit::Micrometer)),
            physical_size_y: Some(Length::new(0.5, LengthUnit::Micrometer)),
            physical_size_z: None,
        }
    }

    fn store() -> MemoryRemoteStore {
        let store = MemoryRemoteStore::new();
        let levels = vec![
            ResolutionDescription {
                size_x: 4000,
                size_y: 3000,
                tile_size_x: 1024,
                tile_size_y: 1024,
            },
            ResolutionDescription {
                size_x: 1000,
                size_y: 750,
                tile_size_x: 1024,
                tile_size_y: 1024,
            },
            ResolutionDescription {
                size_x: 500,
                size_y: 375,
                tile_size_x: 1024,
                tile_size_y: 1024,
            },
        ];
        store.add_image(ImageId(1), MemoryImage::new(metadata(), levels, |_, _, _, _| 0.0));
        store.add_image(ImageId(2), MemoryImage::new(metadata(), vec![], |_, _, _, _| 0.0));
        store
    }

    #[test]
    fn image_descriptor_levels() {
        let store = store();
        let descriptor =
            ImageDescriptor::resolve(&store, &ImageOpenOptions::new(ImageId(1))).unwrap();
        assert_eq!(descriptor.num_levels(), 3);
        assert_eq!(descriptor.size_c(), 3);
        assert_eq!(descriptor.size_t(), 2);
        assert_eq!(descriptor.name(), "Image:1");
        // clamped to the coarsest level
        assert!(descriptor
            .levels()
            .iter()
            .all(|level| level.cell_size == [500, 375]));
        assert_eq!(descriptor.levels()[1].shape, [1000, 750, 5]);
        assert_eq!(
            descriptor.plane_bounds(2),
            Some(PlaneBounds {
                size_x: 500,
                size_y: 375,
                size_z: 5,
                size_c: 3,
                size_t: 2
            })
        );
        assert_eq!(descriptor.plane_bounds(3), None);
    }

    #[test]
    fn image_descriptor_single_level() {
        let store = store();
        let options = ImageOpenOptions::new(ImageId(2)).with_name("slide");
        let descriptor = ImageDescriptor::resolve(&store, &options).unwrap();
        assert_eq!(descriptor.num_levels(), 1);
        assert_eq!(descriptor.name(), "slide");
        assert_eq!(descriptor.levels()[0].cell_size, [512, 512]);

        let options = options.with_fetch_mode(FetchMode::WholePlane);
        let descriptor = ImageDescriptor::resolve(&store, &options).unwrap();
        assert_eq!(descriptor.levels()[0].cell_size, [4000, 3000]);
    }

    #[test]
    fn image_descriptor_calibration() {
        let store = store();
        let options = ImageOpenOptions::new(ImageId(1)).with_unit(LengthUnit::Micrometer);
        let descriptor = ImageDescriptor::resolve(&store, &options).unwrap();
        let calibration = descriptor.calibration();
        assert!((calibration.size_x - 0.25).abs() < 1e-12);
        assert!((calibration.size_y - 0.5).abs() < 1e-12);
        assert!((calibration.size_z - 1.0).abs() < f64::EPSILON);
        assert_eq!(
            descriptor.transform(2),
            Some(AffineTransform3D::scale(0.25, 0.5, 1.0))
        );

        let options = options.with_level_voxel_size(LevelVoxelSize::ScaledByLevel);
        let descriptor = ImageDescriptor::resolve(&store, &options).unwrap();
        assert_eq!(
            descriptor.transform(2),
            Some(AffineTransform3D::scale(2.0, 4.0, 1.0))
        );
        assert_eq!(descriptor.transform(3), None);
    }

    #[test]
    fn image_descriptor_invalid() {
        let store = MemoryRemoteStore::new();
        let mut metadata = metadata();
        metadata.size_t = 0;
        store.add_image(ImageId(1), MemoryImage::new(metadata, vec![], |_, _, _, _| 0.0));
        assert!(matches!(
            ImageDescriptor::resolve(&store, &ImageOpenOptions::new(ImageId(1))),
            Err(ImageOpenError::InvalidMetadata(_))
        ));
        assert!(matches!(
            ImageDescriptor::resolve(&store, &ImageOpenOptions::new(ImageId(2))),
            Err(ImageOpenError::Remote(_))
        ));
    }
}
