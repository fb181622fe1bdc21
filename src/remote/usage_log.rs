//! A remote store adapter which logs function calls.

use super::{
    ImageId, PixelsAccess, PixelsMetadata, Plane2D, PlaneCoord, RemoteError, RemoteStore,
    ResolutionDescription, TileRect,
};

/// The usage log remote store. Logs remote store calls with the [`log`] facade.
///
/// It is intended to aid in debugging and optimising performance by revealing remote access patterns.
///
/// Applying image methods with a [`UsageLogRemoteStore`] logs outputs like:
/// ```text
/// resolve_pixels_metadata(Image:1) -> Ok(1000x600x3, c=2, t=4, uint16)
/// resolve_resolution_levels(Image:1) -> Ok(3 levels)
/// open_pixels_access(Image:1, level=0) -> Ok
/// fetch_tile(Image:1, level=0, z=0 c=0 t=0, x=512 y=0 w=488 h=512) -> Ok(488x512)
/// release_pixels_access(Image:1, level=0)
/// ```
#[derive(Debug)]
pub struct UsageLogRemoteStore<TStore: ?Sized> {
    level: log::Level,
    store: TStore,
}

impl<TStore: RemoteStore> UsageLogRemoteStore<TStore> {
    /// Create a new usage log remote store wrapping `store`, logging at [`log::Level::Debug`].
    #[must_use]
    pub fn new(store: TStore) -> Self {
        Self::new_with_level(store, log::Level::Debug)
    }

    /// Create a new usage log remote store wrapping `store`, logging at `level`.
    #[must_use]
    pub fn new_with_level(store: TStore, level: log::Level) -> Self {
        Self { level, store }
    }
}

fn plane_result(result: &Result<Plane2D, RemoteError>) -> String {
    match result {
        Ok(plane) => format!("Ok({}x{})", plane.width(), plane.height()),
        Err(err) => format!("Err({err})"),
    }
}

struct UsageLogPixelsAccess<'a> {
    access: Box<dyn PixelsAccess + 'a>,
    level: log::Level,
    image: ImageId,
    resolution_level: usize,
}

impl PixelsAccess for UsageLogPixelsAccess<'_> {
    fn fetch_tile(&mut self, plane: PlaneCoord, rect: TileRect) -> Result<Plane2D, RemoteError> {
        let result = self.access.fetch_tile(plane, rect);
        log::log!(
            self.level,
            "fetch_tile({}, level={}, {plane}, {rect}) -> {}",
            self.image,
            self.resolution_level,
            plane_result(&result)
        );
        result
    }

    fn fetch_plane(&mut self, plane: PlaneCoord) -> Result<Plane2D, RemoteError> {
        let result = self.access.fetch_plane(plane);
        log::log!(
            self.level,
            "fetch_plane({}, level={}, {plane}) -> {}",
            self.image,
            self.resolution_level,
            plane_result(&result)
        );
        result
    }
}

impl Drop for UsageLogPixelsAccess<'_> {
    fn drop(&mut self) {
        log::log!(
            self.level,
            "release_pixels_access({}, level={})",
            self.image,
            self.resolution_level
        );
    }
}

impl<TStore: ?Sized + RemoteStore> RemoteStore for UsageLogRemoteStore<TStore> {
    fn resolve_pixels_metadata(&self, image: ImageId) -> Result<PixelsMetadata, RemoteError> {
        let result = self.store.resolve_pixels_metadata(image);
        match &result {
            Ok(metadata) => log::log!(
                self.level,
                "resolve_pixels_metadata({image}) -> Ok({}x{}x{}, c={}, t={}, {})",
                metadata.size_x,
                metadata.size_y,
                metadata.size_z,
                metadata.size_c,
                metadata.size_t,
                metadata.pixel_type
            ),
            Err(err) => log::log!(self.level, "resolve_pixels_metadata({image}) -> Err({err})"),
        }
        result
    }

    fn resolve_resolution_levels(
        &self,
        image: ImageId,
    ) -> Result<Vec<ResolutionDescription>, RemoteError> {
        let result = self.store.resolve_resolution_levels(image);
        match &result {
            Ok(levels) => log::log!(
                self.level,
                "resolve_resolution_levels({image}) -> Ok({} levels)",
                levels.len()
            ),
            Err(err) => log::log!(self.level, "resolve_resolution_levels({image}) -> Err({err})"),
        }
        result
    }

    fn open_pixels_access(
        &self,
        image: ImageId,
        level: usize,
    ) -> Result<Box<dyn PixelsAccess + '_>, RemoteError> {
        match self.store.open_pixels_access(image, level) {
            Ok(access) => {
                log::log!(self.level, "open_pixels_access({image}, level={level}) -> Ok");
                Ok(Box::new(UsageLogPixelsAccess {
                    access,
                    level: self.level,
                    image,
                    resolution_level: level,
                }))
            }
            Err(err) => {
                log::log!(self.level, "open_pixels_access({image}, level={level}) -> Err({err})");
                Err(err)
            }
        }
    }
}
