//! An in-memory remote store.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use parking_lot::RwLock;

use super::{
    ImageId, PixelsAccess, PixelsMetadata, Plane2D, PlaneCoord, RemoteError, RemoteStore,
    ResolutionDescription, TileRect,
};

type ValueFn = dyn Fn(usize, PlaneCoord, u64, u64) -> f64 + Send + Sync;

/// A procedurally generated image held by a [`MemoryRemoteStore`].
///
/// Pixel values are computed on request by a function of `(level, plane, x, y)`.
#[derive(Clone)]
pub struct MemoryImage {
    metadata: PixelsMetadata,
    levels: Vec<ResolutionDescription>,
    value_fn: Arc<ValueFn>,
}

impl core::fmt::Debug for MemoryImage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemoryImage")
            .field("metadata", &self.metadata)
            .field("levels", &self.levels)
            .finish_non_exhaustive()
    }
}

impl MemoryImage {
    /// Create a new memory image.
    ///
    /// `levels` may be empty for an image without a resolution pyramid.
    pub fn new(
        metadata: PixelsMetadata,
        levels: Vec<ResolutionDescription>,
        value_fn: impl Fn(usize, PlaneCoord, u64, u64) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            metadata,
            levels,
            value_fn: Arc::new(value_fn),
        }
    }

    /// Return the pixels metadata of the image.
    #[must_use]
    pub fn metadata(&self) -> &PixelsMetadata {
        &self.metadata
    }

    fn level_size(&self, level: usize) -> Option<(u64, u64)> {
        if self.levels.is_empty() {
            (level == 0).then_some((self.metadata.size_x, self.metadata.size_y))
        } else {
            self.levels
                .get(level)
                .map(|description| (description.size_x, description.size_y))
        }
    }
}

/// An in-memory remote store.
///
/// The store can be made unavailable with [`set_available`](MemoryRemoteStore::set_available) to emulate a broken session.
#[derive(Debug)]
pub struct MemoryRemoteStore {
    images: RwLock<HashMap<ImageId, Arc<MemoryImage>>>,
    available: AtomicBool,
}

impl MemoryRemoteStore {
    /// Create a new, empty, memory remote store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            images: RwLock::default(),
            available: AtomicBool::new(true),
        }
    }

    /// Add an image to the store, replacing any existing image with the same id.
    pub fn add_image(&self, image: ImageId, memory_image: MemoryImage) {
        self.images.write().insert(image, Arc::new(memory_image));
    }

    /// Set whether the store is available. All calls fail with [`RemoteError::Unavailable`] while it is not.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    fn image(&self, image: ImageId) -> Result<Arc<MemoryImage>, RemoteError> {
        if !self.available.load(Ordering::Acquire) {
            return Err(RemoteError::Unavailable("memory store is offline".to_string()));
        }
        self.images
            .read()
            .get(&image)
            .cloned()
            .ok_or(RemoteError::ImageNotFound(image))
    }
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

struct MemoryPixelsAccess<'a> {
    store: &'a MemoryRemoteStore,
    image: Arc<MemoryImage>,
    level: usize,
    size_x: u64,
    size_y: u64,
}

impl MemoryPixelsAccess<'_> {
    fn validate(&self, plane: PlaneCoord, rect: TileRect) -> Result<(), RemoteError> {
        if !self.store.available.load(Ordering::Acquire) {
            return Err(RemoteError::Unavailable("memory store is offline".to_string()));
        }
        let metadata = &self.image.metadata;
        if plane.z >= metadata.size_z || plane.c >= metadata.size_c || plane.t >= metadata.size_t {
            return Err(RemoteError::InvalidPlane(
                plane,
                rect,
                "plane index out of bounds".to_string(),
            ));
        }
        if !rect.inbounds(self.size_x, self.size_y) {
            return Err(RemoteError::InvalidPlane(
                plane,
                rect,
                format!("outside of level {} extent {}x{}", self.level, self.size_x, self.size_y),
            ));
        }
        Ok(())
    }
}

impl PixelsAccess for MemoryPixelsAccess<'_> {
    fn fetch_tile(&mut self, plane: PlaneCoord, rect: TileRect) -> Result<Plane2D, RemoteError> {
        self.validate(plane, rect)?;
        let value_fn = &self.image.value_fn;
        Ok(Plane2D::from_fn(rect.w, rect.h, |x, y| {
            value_fn(self.level, plane, rect.x + x, rect.y + y)
        }))
    }

    fn fetch_plane(&mut self, plane: PlaneCoord) -> Result<Plane2D, RemoteError> {
        self.fetch_tile(plane, TileRect::new(0, 0, self.size_x, self.size_y))
    }
}

impl RemoteStore for MemoryRemoteStore {
    fn resolve_pixels_metadata(&self, image: ImageId) -> Result<PixelsMetadata, RemoteError> {
        Ok(self.image(image)?.metadata.clone())
    }

    fn resolve_resolution_levels(
        &self,
        image: ImageId,
    ) -> Result<Vec<ResolutionDescription>, RemoteError> {
        Ok(self.image(image)?.levels.clone())
    }

    fn open_pixels_access(
        &self,
        image: ImageId,
        level: usize,
    ) -> Result<Box<dyn PixelsAccess + '_>, RemoteError> {
        let memory_image = self.image(image)?;
        let (size_x, size_y) = memory_image
            .level_size(level)
            .ok_or_else(|| RemoteError::Other(format!("{image} has no resolution level {level}")))?;
        Ok(Box::new(MemoryPixelsAccess {
            store: self,
            image: memory_image,
            level,
            size_x,
            size_y,
        }))
    }
}
