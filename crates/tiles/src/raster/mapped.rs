use crate::{RasterOverlayTileProvider, RasterTileLoadState, RasterTileRef, Tile};
use bevy_math::DVec2;
use std::sync::Arc;
use tessera_geometry::Rectangle;

/// Whether a raster tile is attached to its geometry tile in the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttachmentState {
    Unattached,
    /// An ancestor is shown while the proper raster tile loads.
    TemporarilyAttached,
    Attached,
}

/// Whether refining the geometry tile would get finer imagery.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MoreDetailAvailable {
    No,
    Yes,
    /// The raster tile is still loading.
    Unknown,
}

/// A raster tile draped over a geometry tile.
///
/// Holds the raster tile being loaded and the one currently shown, which is
/// the closest loaded ancestor until the proper tile is ready. A tile that
/// fails to load is replaced by its parent.
pub struct RasterMappedTo3DTile {
    loading_tile: Option<RasterTileRef>,
    ready_tile: Option<RasterTileRef>,
    provider: Arc<RasterOverlayTileProvider>,
    texture_coordinate_id: u32,
    texture_coordinate_rectangle: Rectangle,
    /// The geometry tile's rectangle in the provider's projection.
    geometry_rectangle: Rectangle,
    translation: DVec2,
    scale: DVec2,
    state: AttachmentState,
    original_failed: bool,
}

impl RasterMappedTo3DTile {
    pub fn new(
        tile: RasterTileRef,
        provider: Arc<RasterOverlayTileProvider>,
        texture_coordinate_id: u32,
        texture_coordinate_rectangle: Rectangle,
        geometry_rectangle: Rectangle,
    ) -> Self {
        Self {
            loading_tile: Some(tile),
            ready_tile: None,
            provider,
            texture_coordinate_id,
            texture_coordinate_rectangle,
            geometry_rectangle,
            translation: DVec2::ZERO,
            scale: DVec2::ONE,
            state: AttachmentState::Unattached,
            original_failed: false,
        }
    }

    pub fn loading_tile(&self) -> Option<&RasterTileRef> {
        self.loading_tile.as_ref()
    }

    pub fn ready_tile(&self) -> Option<&RasterTileRef> {
        self.ready_tile.as_ref()
    }

    pub fn provider(&self) -> &Arc<RasterOverlayTileProvider> {
        &self.provider
    }

    pub fn texture_coordinate_id(&self) -> u32 {
        self.texture_coordinate_id
    }

    pub fn texture_coordinate_rectangle(&self) -> &Rectangle {
        &self.texture_coordinate_rectangle
    }

    pub fn translation(&self) -> DVec2 {
        self.translation
    }

    pub fn scale(&self) -> DVec2 {
        self.scale
    }

    pub fn state(&self) -> AttachmentState {
        self.state
    }

    /// True while this mapping only stands in for an overlay whose provider
    /// is not ready.
    pub fn is_placeholder(&self) -> bool {
        self.loading_tile
            .as_ref()
            .is_some_and(|tile| tile.state() == RasterTileLoadState::Placeholder)
    }

    /// Advances loading and attachment. Must run on the main thread.
    pub fn update(&mut self, tile: &Tile) -> MoreDetailAvailable {
        if self.state == AttachmentState::Attached {
            return self.more_detail_available();
        }

        // Retry loads postponed by throttling.
        if let Some(loading) = &self.loading_tile
            && loading.state() == RasterTileLoadState::Unloaded
        {
            self.provider.load_tile_throttled(loading.as_arc());
        }

        // A failed tile is replaced by its parent.
        while let Some(loading) = &self.loading_tile {
            let id = loading.id();
            if loading.state() != RasterTileLoadState::Failed || id.level == 0 {
                break;
            }

            self.original_failed = true;
            let parent = self.provider.get_tile(id.parent());
            self.provider.load_tile_throttled(&parent);
            self.loading_tile = Some(RasterTileRef::new(parent));
        }

        if let Some(loading) = self.loading_tile.take_if(|loading| loading.state().is_loaded()) {
            self.detach(tile);
            self.ready_tile = Some(loading);
            self.compute_translation_and_scale();
        }

        // Show the closest loaded ancestor until the loading tile is ready.
        if let Some(loading) = &self.loading_tile {
            let candidate = (0..loading.id().level)
                .rev()
                .filter_map(|level| loading.id().ancestor_at_level(level))
                .filter_map(|id| self.provider.get_tile_without_creating(id))
                .find(|candidate| candidate.state().is_loaded());

            if let Some(candidate) = candidate {
                let already_shown = self
                    .ready_tile
                    .as_ref()
                    .is_some_and(|ready| Arc::ptr_eq(ready.as_arc(), &candidate));
                if !already_shown {
                    self.detach(tile);
                    self.ready_tile = Some(RasterTileRef::new(candidate));
                    self.compute_translation_and_scale();
                }
            }
        }

        if self.state == AttachmentState::Unattached
            && let Some(ready) = &self.ready_tile
        {
            let prepare = self.provider.externals().prepare_renderer_resources.clone();
            ready.load_in_main_thread(prepare.as_deref());
            if let Some(prepare) = prepare {
                prepare.attach_raster_in_main_thread(tile, self.texture_coordinate_id, ready, self.translation, self.scale);
            }

            self.state = if self.loading_tile.is_some() {
                AttachmentState::TemporarilyAttached
            } else {
                AttachmentState::Attached
            };
        }

        if self.loading_tile.is_some() {
            MoreDetailAvailable::Unknown
        } else {
            self.more_detail_available()
        }
    }

    /// Removes the shown raster tile from the renderer. Must run on the
    /// main thread.
    pub fn detach_from_tile(&mut self, tile: &Tile) {
        self.detach(tile);
    }

    fn detach(&mut self, tile: &Tile) {
        if self.state == AttachmentState::Unattached {
            return;
        }

        if let (Some(ready), Some(prepare)) = (&self.ready_tile, &self.provider.externals().prepare_renderer_resources) {
            prepare.detach_raster_in_main_thread(tile, self.texture_coordinate_id, ready);
        }
        self.state = AttachmentState::Unattached;
    }

    fn more_detail_available(&self) -> MoreDetailAvailable {
        match &self.ready_tile {
            Some(ready) if !self.original_failed && self.provider.has_more_details_available(ready.id()) => {
                MoreDetailAvailable::Yes
            }
            _ => MoreDetailAvailable::No,
        }
    }

    fn compute_translation_and_scale(&mut self) {
        let Some(ready) = &self.ready_tile else {
            return;
        };

        let imagery_rectangle = ready.image_rectangle().unwrap_or(*ready.rectangle());
        (self.translation, self.scale) = compute_translation_and_scale(&self.geometry_rectangle, &imagery_rectangle);
    }
}

/// The transform from a geometry tile's texture coordinates into those of
/// an image covering `imagery_rectangle`: `uv * scale + translation`.
pub fn compute_translation_and_scale(geometry_rectangle: &Rectangle, imagery_rectangle: &Rectangle) -> (DVec2, DVec2) {
    let geometry_size = DVec2::new(geometry_rectangle.width(), geometry_rectangle.height());
    let imagery_size = DVec2::new(imagery_rectangle.width(), imagery_rectangle.height());

    let scale = geometry_size / imagery_size;
    let translation = scale * (geometry_rectangle.lower_left() - imagery_rectangle.lower_left()) / geometry_size;
    (translation, scale)
}
