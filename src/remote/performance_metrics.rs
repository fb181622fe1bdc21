//! A remote store adapter which records performance metrics.

use std::sync::atomic::{AtomicUsize, Ordering};

use super::{
    ImageId, PixelsAccess, PixelsMetadata, Plane2D, PlaneCoord, RemoteError, RemoteStore,
    ResolutionDescription, TileRect,
};

/// The performance metrics remote store. Accumulates metrics, such as the number of tile fetches and samples read.
///
/// It is intended to aid in testing by allowing the application to validate that metrics
/// (e.g. remote fetches, access handles acquired and released) match expected values for specific operations.
#[derive(Debug)]
pub struct PerformanceMetricsRemoteStore<TStore: ?Sized> {
    tile_fetches: AtomicUsize,
    plane_fetches: AtomicUsize,
    failed_fetches: AtomicUsize,
    samples_read: AtomicUsize,
    metadata_requests: AtomicUsize,
    accesses_opened: AtomicUsize,
    accesses_released: AtomicUsize,
    store: TStore,
}

impl<TStore: RemoteStore> PerformanceMetricsRemoteStore<TStore> {
    /// Create a new performance metrics remote store wrapping `store`.
    #[must_use]
    pub fn new(store: TStore) -> Self {
        Self {
            tile_fetches: AtomicUsize::default(),
            plane_fetches: AtomicUsize::default(),
            failed_fetches: AtomicUsize::default(),
            samples_read: AtomicUsize::default(),
            metadata_requests: AtomicUsize::default(),
            accesses_opened: AtomicUsize::default(),
            accesses_released: AtomicUsize::default(),
            store,
        }
    }
}

impl<TStore: ?Sized> PerformanceMetricsRemoteStore<TStore> {
    /// Return the inner store.
    pub fn inner(&self) -> &TStore {
        &self.store
    }

    /// Returns the number of tile fetches, including failed fetches.
    pub fn tile_fetches(&self) -> usize {
        self.tile_fetches.load(Ordering::Relaxed)
    }

    /// Returns the number of whole plane fetches, including failed fetches.
    pub fn plane_fetches(&self) -> usize {
        self.plane_fetches.load(Ordering::Relaxed)
    }

    /// Returns the total number of tile and plane fetches.
    pub fn fetches(&self) -> usize {
        self.tile_fetches() + self.plane_fetches()
    }

    /// Returns the number of tile and plane fetches that failed.
    pub fn failed_fetches(&self) -> usize {
        self.failed_fetches.load(Ordering::Relaxed)
    }

    /// Returns the number of samples read.
    pub fn samples_read(&self) -> usize {
        self.samples_read.load(Ordering::Relaxed)
    }

    /// Returns the number of metadata and resolution level requests.
    pub fn metadata_requests(&self) -> usize {
        self.metadata_requests.load(Ordering::Relaxed)
    }

    /// Returns the number of pixel access handles acquired.
    pub fn accesses_opened(&self) -> usize {
        self.accesses_opened.load(Ordering::Relaxed)
    }

    /// Returns the number of pixel access handles released.
    pub fn accesses_released(&self) -> usize {
        self.accesses_released.load(Ordering::Relaxed)
    }

    fn record(&self, result: &Result<Plane2D, RemoteError>) {
        match result {
            Ok(plane) => {
                self.samples_read
                    .fetch_add(plane.values().len(), Ordering::Relaxed);
            }
            Err(_) => {
                self.failed_fetches.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

struct PerformanceMetricsPixelsAccess<'a, TStore: ?Sized> {
    access: Box<dyn PixelsAccess + 'a>,
    metrics: &'a PerformanceMetricsRemoteStore<TStore>,
}

impl<TStore: ?Sized> PixelsAccess for PerformanceMetricsPixelsAccess<'_, TStore> {
    fn fetch_tile(&mut self, plane: PlaneCoord, rect: TileRect) -> Result<Plane2D, RemoteError> {
        self.metrics.tile_fetches.fetch_add(1, Ordering::Relaxed);
        let result = self.access.fetch_tile(plane, rect);
        self.metrics.record(&result);
        result
    }

    fn fetch_plane(&mut self, plane: PlaneCoord) -> Result<Plane2D, RemoteError> {
        self.metrics.plane_fetches.fetch_add(1, Ordering::Relaxed);
        let result = self.access.fetch_plane(plane);
        self.metrics.record(&result);
        result
    }
}

impl<TStore: ?Sized> Drop for PerformanceMetricsPixelsAccess<'_, TStore> {
    fn drop(&mut self) {
        self.metrics.accesses_released.fetch_add(1, Ordering::Relaxed);
    }
}

impl<TStore: ?Sized + RemoteStore> RemoteStore for PerformanceMetricsRemoteStore<TStore> {
    fn resolve_pixels_metadata(&self, image: ImageId) -> Result<PixelsMetadata, RemoteError> {
        self.metadata_requests.fetch_add(1, Ordering::Relaxed);
        self.store.resolve_pixels_metadata(image)
    }

    fn resolve_resolution_levels(
        &self,
        image: ImageId,
    ) -> Result<Vec<ResolutionDescription>, RemoteError> {
        self.metadata_requests.fetch_add(1, Ordering::Relaxed);
        self.store.resolve_resolution_levels(image)
    }

    fn open_pixels_access(
        &self,
        image: ImageId,
        level: usize,
    ) -> Result<Box<dyn PixelsAccess + '_>, RemoteError> {
        let access = self.store.open_pixels_access(image, level)?;
        self.accesses_opened.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(PerformanceMetricsPixelsAccess {
            access,
            metrics: self,
        }))
    }
}
