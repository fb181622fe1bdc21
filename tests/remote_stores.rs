use std::sync::Arc;

use parking_lot::Mutex;
use remote_cells::{
    element::PixelType,
    image::{ImageIndex, ImageOpenOptions, VolumeError},
    region::Region,
    remote::{
        ImageId, MemoryImage, MemoryRemoteStore, PerformanceMetricsRemoteStore, Plane2D,
        PixelsAccess, PixelsMetadata, PlaneCoord, RemoteError, RemoteStore,
        ResolutionDescription, TileRect, UsageLogRemoteStore,
    },
};

fn memory_store() -> MemoryRemoteStore {
    let store = MemoryRemoteStore::new();
    let metadata = PixelsMetadata {
        size_x: 300,
        size_y: 200,
        size_z: 2,
        size_c: 1,
        size_t: 1,
        pixel_type: PixelType::Int16,
        physical_size_x: None,
        physical_size_y: None,
        physical_size_z: None,
    };
    store.add_image(
        ImageId(3),
        MemoryImage::new(metadata, vec![], |_, plane, x, y| {
            #[allow(clippy::cast_precision_loss)]
            let value = (plane.z * 1000 + x + y) as f64;
            -value
        }),
    );
    store
}

#[test]
fn memory_store_fetch() -> Result<(), Box<dyn std::error::Error>> {
    let store = memory_store();
    let metadata = store.resolve_pixels_metadata(ImageId(3))?;
    assert_eq!(metadata.pixel_type, PixelType::Int16);
    assert!(store.resolve_resolution_levels(ImageId(3))?.is_empty());
    assert!(matches!(
        store.resolve_pixels_metadata(ImageId(4)),
        Err(RemoteError::ImageNotFound(ImageId(4)))
    ));

    let mut access = store.open_pixels_access(ImageId(3), 0)?;
    let tile = access.fetch_tile(PlaneCoord::new(1, 0, 0), TileRect::new(290, 10, 10, 5))?;
    assert_eq!((tile.width(), tile.height()), (10, 5));
    assert!((tile.value(9, 4) + 1313.0).abs() < f64::EPSILON);
    assert!(access
        .fetch_tile(PlaneCoord::new(0, 0, 0), TileRect::new(295, 0, 10, 1))
        .is_err());
    let plane = access.fetch_plane(PlaneCoord::new(0, 0, 0))?;
    assert_eq!(plane.values().len(), 300 * 200);
    Ok(())
}

#[test]
fn performance_metrics_store() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(PerformanceMetricsRemoteStore::new(memory_store()));
    let index = ImageIndex::<i16>::open(store.clone(), &ImageOpenOptions::new(ImageId(3)))?;
    let volume = index.get_volume(0, 0, 0)?;
    let elements = volume.read_region(&Region::new_with_shape([300, 200, 2]))?;
    assert_eq!(elements[300 * 200 + 301], -1002);

    assert_eq!(store.tile_fetches(), 2);
    assert_eq!(store.plane_fetches(), 0);
    assert_eq!(store.samples_read(), 300 * 200 * 2);
    assert_eq!(store.failed_fetches(), 0);
    // every access handle is released after its fetch
    assert_eq!(store.accesses_opened(), 2);
    assert_eq!(store.accesses_released(), 2);

    // materialized cells are served while the store is offline
    store.inner().set_available(false);
    assert_eq!(volume.value(&[0, 0, 0])?, 0);
    assert_eq!(volume.read_region(&Region::new_with_shape([2, 1, 1]))?, vec![0, -1]);
    assert_eq!(store.fetches(), 2);
    Ok(())
}

#[test]
fn performance_metrics_store_unavailable() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(PerformanceMetricsRemoteStore::new(memory_store()));
    let index = ImageIndex::<i16>::open(store.clone(), &ImageOpenOptions::new(ImageId(3)))?;
    store.inner().set_available(false);
    let volume = index.get_volume(0, 0, 0)?;
    assert!(matches!(
        volume.get_cell(0, 0, 1),
        Err(VolumeError::CellLoadFailed(_))
    ));
    assert_eq!(store.accesses_opened(), store.accesses_released());
    assert!(!volume.is_cached(0, 0, 1));

    store.inner().set_available(true);
    assert_eq!(volume.get_cell(0, 0, 1)?.value(1, 2), -1003);
    assert_eq!(store.accesses_opened(), store.accesses_released());
    Ok(())
}

/// A store whose access handles open but never deliver pixels.
struct BrokenSessionStore(MemoryRemoteStore);

struct BrokenSessionAccess;

impl PixelsAccess for BrokenSessionAccess {
    fn fetch_tile(&mut self, _plane: PlaneCoord, _rect: TileRect) -> Result<Plane2D, RemoteError> {
        Err(RemoteError::Unavailable("session expired".to_string()))
    }

    fn fetch_plane(&mut self, _plane: PlaneCoord) -> Result<Plane2D, RemoteError> {
        Err(RemoteError::Unavailable("session expired".to_string()))
    }
}

impl RemoteStore for BrokenSessionStore {
    fn resolve_pixels_metadata(&self, image: ImageId) -> Result<PixelsMetadata, RemoteError> {
        self.0.resolve_pixels_metadata(image)
    }

    fn resolve_resolution_levels(
        &self,
        image: ImageId,
    ) -> Result<Vec<ResolutionDescription>, RemoteError> {
        self.0.resolve_resolution_levels(image)
    }

    fn open_pixels_access(
        &self,
        image: ImageId,
        level: usize,
    ) -> Result<Box<dyn PixelsAccess + '_>, RemoteError> {
        drop(self.0.open_pixels_access(image, level)?);
        Ok(Box::new(BrokenSessionAccess))
    }
}

#[test]
fn performance_metrics_store_fetch_failure() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(PerformanceMetricsRemoteStore::new(BrokenSessionStore(
        memory_store(),
    )));
    let index = ImageIndex::<i16>::open(store.clone(), &ImageOpenOptions::new(ImageId(3)))?;
    let volume = index.get_volume(0, 0, 0)?;
    assert!(matches!(
        volume.get_cell(0, 0, 0),
        Err(VolumeError::CellLoadFailed(_))
    ));
    // the handle was acquired, then released when the fetch failed
    assert_eq!(store.accesses_opened(), 1);
    assert_eq!(store.accesses_released(), 1);
    assert_eq!(store.failed_fetches(), 1);
    assert_eq!(store.samples_read(), 0);
    assert!(!volume.is_cached(0, 0, 0));

    assert!(volume.value(&[1, 1, 0]).is_err());
    assert_eq!(store.accesses_opened(), 2);
    assert_eq!(store.accesses_released(), 2);
    Ok(())
}

static CAPTURED: Mutex<Vec<(log::Level, String)>> = parking_lot::const_mutex(Vec::new());

struct CaptureLogger;

impl log::Log for CaptureLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        CAPTURED
            .lock()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

static CAPTURE_LOGGER: CaptureLogger = CaptureLogger;

fn captured(prefix: &str) -> Vec<(log::Level, String)> {
    CAPTURED
        .lock()
        .iter()
        .filter(|(_, message)| message.starts_with(prefix))
        .cloned()
        .collect()
}

#[test]
fn usage_log_store() -> Result<(), Box<dyn std::error::Error>> {
    let _ = log::set_logger(&CAPTURE_LOGGER);
    log::set_max_level(log::LevelFilter::Trace);

    let store = Arc::new(UsageLogRemoteStore::new_with_level(
        memory_store(),
        log::Level::Info,
    ));
    let index = ImageIndex::<i16>::open(store, &ImageOpenOptions::new(ImageId(3)))?;
    let volume = index.get_volume(0, 0, 0)?;
    assert_eq!(volume.value(&[4, 5, 1])?, -1009);

    let metadata = captured("resolve_pixels_metadata(Image:3) -> Ok(");
    assert!(!metadata.is_empty());
    assert!(metadata.iter().all(|(level, _)| *level == log::Level::Info));

    let opened = captured("open_pixels_access(Image:3, level=0) -> Ok");
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].0, log::Level::Info);

    let fetched = captured("fetch_tile(Image:3, level=0, ");
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].0, log::Level::Info);
    assert!(fetched[0].1.ends_with("-> Ok(300x200)"), "{}", fetched[0].1);

    let released = captured("release_pixels_access(Image:3, level=0)");
    assert_eq!(released.len(), 1);
    assert_eq!(released[0].0, log::Level::Info);
    Ok(())
}
