use std::sync::Arc;

use moka::sync::Cache;

use crate::{
    element::{Element, PixelType, UnsupportedPixelTypeError},
    remote::RemoteStoreHandle,
};

use super::{
    AffineTransform3D, CachedVolume, CellLoaderTraits, FetchMode, ImageDescriptor,
    ImageOpenError, ImageOpenOptions, IndexError, PlaneCellLoader, TileCellLoader, TileFetcher,
    VolumeKey,
};

/// A multi-resolution, multi-timepoint, multi-channel index of the cached volumes of a remote image.
///
/// A [`CachedVolume`] is created on the first request for its resolution level, timepoint and channel,
/// and lives as long as the index.
/// Concurrent first requests for the same volume create it once.
pub struct ImageIndex<T: Element> {
    descriptor: ImageDescriptor,
    fetchers: Vec<TileFetcher>,
    volumes: Cache<VolumeKey, Arc<CachedVolume<T>>>,
}

impl<T: Element> core::fmt::Debug for ImageIndex<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ImageIndex")
            .field("descriptor", &self.descriptor)
            .field("volumes", &self.volumes.entry_count())
            .finish_non_exhaustive()
    }
}

impl<T: Element> ImageIndex<T> {
    /// Resolve and open an image with samples of type `T`.
    ///
    /// # Errors
    /// Returns [`ImageOpenError`] if the image cannot be resolved, or its pixel type is not that of `T`.
    pub fn open(store: RemoteStoreHandle, options: &ImageOpenOptions) -> Result<Self, ImageOpenError> {
        let descriptor = ImageDescriptor::resolve(store.as_ref(), options)?;
        Self::new(store, descriptor)
    }

    /// Create an image index from a resolved `descriptor`.
    ///
    /// # Errors
    /// Returns [`ImageOpenError::InvalidMetadata`] if the pixel type of the image is not that of `T`.
    pub fn new(store: RemoteStoreHandle, descriptor: ImageDescriptor) -> Result<Self, ImageOpenError> {
        if descriptor.pixel_type() != T::PIXEL_TYPE {
            return Err(ImageOpenError::InvalidMetadata(format!(
                "pixel type {} cannot be read as {}",
                descriptor.pixel_type(),
                T::PIXEL_TYPE
            )));
        }
        let image = descriptor.options().image();
        let fetchers = (0..descriptor.num_levels())
            .filter_map(|level| {
                descriptor
                    .plane_bounds(level)
                    .map(|bounds| TileFetcher::new(store.clone(), image, level, bounds))
            })
            .collect();
        Ok(Self {
            descriptor,
            fetchers,
            volumes: Cache::builder().build(),
        })
    }

    /// Return the image descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &ImageDescriptor {
        &self.descriptor
    }

    /// Return the number of resolution levels.
    #[must_use]
    pub fn num_levels(&self) -> usize {
        self.descriptor.num_levels()
    }

    /// Return the number of channels.
    #[must_use]
    pub const fn size_c(&self) -> u64 {
        self.descriptor.size_c()
    }

    /// Return the number of timepoints.
    #[must_use]
    pub const fn size_t(&self) -> u64 {
        self.descriptor.size_t()
    }

    /// Returns true if timepoint `t` exists, i.e. `0 <= t < size_t`.
    #[must_use]
    pub fn is_present(&self, t: i64) -> bool {
        u64::try_from(t).is_ok_and(|t| t < self.size_t())
    }

    /// Return the number of volumes created so far.
    #[must_use]
    pub fn num_volumes(&self) -> usize {
        self.volumes.run_pending_tasks();
        usize::try_from(self.volumes.entry_count()).unwrap_or(usize::MAX)
    }

    /// Get the volume of resolution `level`, timepoint `t` and channel `c`, creating it on first request.
    ///
    /// Creating a volume issues no remote calls.
    ///
    /// # Errors
    /// Returns [`IndexError::InvalidVolume`] if the level, timepoint or channel does not exist.
    pub fn get_volume(
        &self,
        level: usize,
        t: u64,
        c: u64,
    ) -> Result<Arc<CachedVolume<T>>, IndexError> {
        let key = VolumeKey::new(level, t, c);
        if level >= self.num_levels() || t >= self.size_t() || c >= self.size_c() {
            return Err(IndexError::InvalidVolume(
                key,
                self.num_levels(),
                self.size_t(),
                self.size_c(),
            ));
        }
        Ok(self.volumes.get_with(key, || self.create_volume(key)))
    }

    fn create_volume(&self, key: VolumeKey) -> Arc<CachedVolume<T>> {
        let fetcher = self.fetchers[key.level].clone();
        let options = self.descriptor.options();
        let loader: Arc<dyn CellLoaderTraits<T>> = match options.fetch_mode() {
            FetchMode::Tiled => Arc::new(TileCellLoader::new(
                fetcher,
                key,
                self.descriptor.levels()[key.level].cell_size,
            )),
            FetchMode::WholePlane => Arc::new(PlaneCellLoader::new(fetcher, key)),
        };
        log::debug!(
            "create volume {} {key} with cell grid {}",
            options.image(),
            loader.cell_grid()
        );
        Arc::new(CachedVolume::new(key, loader, options.cell_cache().build()))
    }

    /// Return the voxel to physical transform of resolution `level`.
    ///
    /// # Errors
    /// Returns [`IndexError::InvalidLevel`] if the level does not exist.
    pub fn get_transform(&self, level: usize) -> Result<AffineTransform3D, IndexError> {
        self.descriptor
            .transform(level)
            .ok_or(IndexError::InvalidLevel(level, self.num_levels()))
    }
}

/// An [`ImageIndex`] of any supported sample type.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum AnyImageIndex {
    /// `int8` samples.
    Int8(Arc<ImageIndex<i8>>),
    /// `uint8` samples.
    UInt8(Arc<ImageIndex<u8>>),
    /// `int16` samples.
    Int16(Arc<ImageIndex<i16>>),
    /// `uint16` samples.
    UInt16(Arc<ImageIndex<u16>>),
    /// `int32` samples.
    Int32(Arc<ImageIndex<i32>>),
    /// `uint32` samples.
    UInt32(Arc<ImageIndex<u32>>),
    /// `float` samples.
    Float(Arc<ImageIndex<f32>>),
    /// `double` samples.
    Double(Arc<ImageIndex<f64>>),
}

macro_rules! any_image_index {
    ($self:expr, $index:ident => $expr:expr) => {
        match $self {
            AnyImageIndex::Int8($index) => $expr,
            AnyImageIndex::UInt8($index) => $expr,
            AnyImageIndex::Int16($index) => $expr,
            AnyImageIndex::UInt16($index) => $expr,
            AnyImageIndex::Int32($index) => $expr,
            AnyImageIndex::UInt32($index) => $expr,
            AnyImageIndex::Float($index) => $expr,
            AnyImageIndex::Double($index) => $expr,
        }
    };
}

impl AnyImageIndex {
    /// Return the image descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &ImageDescriptor {
        any_image_index!(self, index => index.descriptor())
    }

    /// Return the pixel type.
    #[must_use]
    pub fn pixel_type(&self) -> PixelType {
        self.descriptor().pixel_type()
    }

    /// Returns true if timepoint `t` exists.
    #[must_use]
    pub fn is_present(&self, t: i64) -> bool {
        any_image_index!(self, index => index.is_present(t))
    }

    /// Return the voxel to physical transform of resolution `level`.
    ///
    /// # Errors
    /// Returns [`IndexError::InvalidLevel`] if the level does not exist.
    pub fn get_transform(&self, level: usize) -> Result<AffineTransform3D, IndexError> {
        any_image_index!(self, index => index.get_transform(level))
    }
}

/// Open a remote image, choosing the sample type from its pixel type.
///
/// The sample type is fixed for the lifetime of the returned index.
///
/// # Errors
/// Returns [`ImageOpenError::UnsupportedPixelType`] if the pixel type has no sample type,
/// or another [`ImageOpenError`] if the image cannot be resolved.
pub fn open_image(
    store: RemoteStoreHandle,
    options: &ImageOpenOptions,
) -> Result<AnyImageIndex, ImageOpenError> {
    let descriptor = ImageDescriptor::resolve(store.as_ref(), options)?;
    log::info!(
        "open {} ({}): {} levels, c={}, t={}, {}",
        descriptor.name(),
        options.image(),
        descriptor.num_levels(),
        descriptor.size_c(),
        descriptor.size_t(),
        descriptor.pixel_type()
    );
    Ok(match descriptor.pixel_type() {
        PixelType::Int8 => AnyImageIndex::Int8(Arc::new(ImageIndex::new(store, descriptor)?)),
        PixelType::UInt8 => AnyImageIndex::UInt8(Arc::new(ImageIndex::new(store, descriptor)?)),
        PixelType::Int16 => AnyImageIndex::Int16(Arc::new(ImageIndex::new(store, descriptor)?)),
        PixelType::UInt16 => AnyImageIndex::UInt16(Arc::new(ImageIndex::new(store, descriptor)?)),
        PixelType::Int32 => AnyImageIndex::Int32(Arc::new(ImageIndex::new(store, descriptor)?)),
        PixelType::UInt32 => AnyImageIndex::UInt32(Arc::new(ImageIndex::new(store, descriptor)?)),
        PixelType::Float => AnyImageIndex::Float(Arc::new(ImageIndex::new(store, descriptor)?)),
        PixelType::Double => AnyImageIndex::Double(Arc::new(ImageIndex::new(store, descriptor)?)),
        pixel_type @ (PixelType::Bit | PixelType::Complex | PixelType::DoubleComplex) => {
            return Err(UnsupportedPixelTypeError(pixel_type).into());
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        image::CellCachePolicy,
        region::Region,
        remote::{ImageId, Length, LengthUnit, MemoryImage, MemoryRemoteStore, PixelsMetadata},
    };

    fn store(pixel_type: PixelType) -> RemoteStoreHandle {
        let store = MemoryRemoteStore::new();
        let metadata = PixelsMetadata {
            size_x: 300,
            size_y: 200,
            size_z: 2,
            size_c: 2,
            size_t: 3,
            pixel_type,
            physical_size_x: Some(Length::new(0.25, LengthUnit::Millimeter)),
            physical_size_y: Some(Length::new(0.25, LengthUnit::Millimeter)),
            physical_size_z: None,
        };
        store.add_image(
            ImageId(1),
            MemoryImage::new(metadata, vec![], |_, plane, x, y| {
                (plane.t * 100 + plane.c * 10 + (x + y) % 10) as f64
            }),
        );
        Arc::new(store)
    }

    #[test]
    fn image_index_volumes() {
        let index =
            ImageIndex::<u16>::open(store(PixelType::UInt16), &ImageOpenOptions::new(ImageId(1)))
                .unwrap();
        assert_eq!(index.num_levels(), 1);
        assert_eq!(index.num_volumes(), 0);
        let volume = index.get_volume(0, 2, 1).unwrap();
        assert!(Arc::ptr_eq(&volume, &index.get_volume(0, 2, 1).unwrap()));
        assert_eq!(index.num_volumes(), 1);
        assert_eq!(volume.shape(), &[300, 200, 2]);
        assert_eq!(volume.value(&[3, 4, 1]).unwrap(), 217);
        assert!(matches!(
            index.get_volume(0, 3, 0),
            Err(IndexError::InvalidVolume(..))
        ));
        assert!(index.get_volume(0, 0, 2).is_err());
        assert!(index.get_volume(1, 0, 0).is_err());
    }

    #[test]
    fn image_index_is_present() {
        let index =
            ImageIndex::<u16>::open(store(PixelType::UInt16), &ImageOpenOptions::new(ImageId(1)))
                .unwrap();
        assert!(!index.is_present(-1));
        assert!(index.is_present(0));
        assert!(index.is_present(2));
        assert!(!index.is_present(3));
        assert!(!index.is_present(i64::MIN));
    }

    #[test]
    fn image_index_transform() {
        let index =
            ImageIndex::<u16>::open(store(PixelType::UInt16), &ImageOpenOptions::new(ImageId(1)))
                .unwrap();
        assert_eq!(
            index.get_transform(0).unwrap(),
            AffineTransform3D::scale(0.25, 0.25, 1.0)
        );
        assert!(matches!(
            index.get_transform(1),
            Err(IndexError::InvalidLevel(1, 1))
        ));
    }

    #[test]
    fn image_index_whole_plane() {
        let options = ImageOpenOptions::new(ImageId(1))
            .with_fetch_mode(FetchMode::WholePlane)
            .with_cell_cache(CellCachePolicy::LruCellLimit { capacity: 4 });
        let index = ImageIndex::<u8>::open(store(PixelType::UInt8), &options).unwrap();
        let volume = index.get_volume(0, 1, 0).unwrap();
        assert_eq!(volume.grid().grid_shape(), [1, 1, 2]);
        let elements = volume
            .read_region(&Region::new_with_ranges(&[10..12, 0..1, 0..2]))
            .unwrap();
        assert_eq!(elements, vec![100, 101, 100, 101]);
    }

    #[test]
    fn image_index_pixel_type_mismatch() {
        assert!(matches!(
            ImageIndex::<u8>::open(store(PixelType::UInt16), &ImageOpenOptions::new(ImageId(1))),
            Err(ImageOpenError::InvalidMetadata(_))
        ));
    }

    #[test]
    fn open_image_dispatch() {
        let options = ImageOpenOptions::new(ImageId(1));
        let index = open_image(store(PixelType::Float), &options).unwrap();
        assert!(matches!(index, AnyImageIndex::Float(_)));
        assert_eq!(index.pixel_type(), PixelType::Float);
        assert!(index.is_present(2));
        assert!(index.get_transform(0).is_ok());

        assert!(matches!(
            open_image(store(PixelType::UInt32), &options),
            Ok(AnyImageIndex::UInt32(_))
        ));
        assert!(matches!(
            open_image(store(PixelType::Complex), &options),
            Err(ImageOpenError::UnsupportedPixelType(UnsupportedPixelTypeError(
                PixelType::Complex
            )))
        ));
    }
}
