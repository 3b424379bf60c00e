use crate::{
    MoreDetailAvailable, RasterMappedTo3DTile, RasterOverlay, RasterTileLoadState, TileHandle, TileId,
    create_raster_overlay_texture_coordinates,
};
use bevy_log::debug;
use bevy_math::{DMat4, DVec3};
use std::sync::atomic::{AtomicI8, Ordering};
use tessera_geospatial::{BoundingRegion, GlobeRectangle, Projection, project_rectangle_simple};
use tessera_gltf::{Model, Y_UP_TO_Z_UP};

/// Geometric error given to tiles that turned out to have no content, so
/// traversal always refines past them.
const EMPTY_TILE_GEOMETRIC_ERROR: f64 = 999_999_999.0;

#[repr(i8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TileLoadState {
    /// Waiting for in flight work to finish before it can be freed.
    Destroying = -3,
    Failed = -2,
    /// Failed in a way that may succeed on a later attempt.
    FailedTemporarily = -1,
    Unloaded = 0,
    ContentLoading = 1,
    /// Content is available but not yet prepared by [`Tile::update`].
    ContentLoaded = 2,
    Done = 3,
}

impl TileLoadState {
    fn from_i8(value: i8) -> Self {
        match value {
            -3 => Self::Destroying,
            -2 => Self::Failed,
            -1 => Self::FailedTemporarily,
            1 => Self::ContentLoading,
            2 => Self::ContentLoaded,
            3 => Self::Done,
            _ => Self::Unloaded,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BoundingVolume {
    Region(BoundingRegion),
    /// A region whose heights are estimates, used for tiles made up at
    /// runtime.
    LooseRegion(BoundingRegion),
    Sphere { center: DVec3, radius: f64 },
}

impl BoundingVolume {
    pub fn region(&self) -> Option<&BoundingRegion> {
        match self {
            Self::Region(region) | Self::LooseRegion(region) => Some(region),
            Self::Sphere { .. } => None,
        }
    }

    pub fn globe_rectangle(&self) -> Option<&GlobeRectangle> {
        self.region().map(|region| &region.rectangle)
    }
}

/// A node of the tile hierarchy.
///
/// Parent and children are handles into the [`TileArena`] owning the tile.
/// The load state is published atomically so loader threads can observe it,
/// everything else is only touched on the main thread.
///
/// [`TileArena`]: crate::TileArena
pub struct Tile {
    id: TileId,
    pub(crate) parent: Option<TileHandle>,
    pub(crate) children: Vec<TileHandle>,
    bounding_volume: BoundingVolume,
    content_bounding_region: Option<BoundingRegion>,
    geometric_error: f64,
    transform: DMat4,
    state: AtomicI8,
    content: Option<Model>,
    raster_tiles: Vec<RasterMappedTo3DTile>,
}

impl Tile {
    pub fn new(id: impl Into<TileId>, bounding_volume: BoundingVolume, geometric_error: f64) -> Self {
        Self {
            id: id.into(),
            parent: None,
            children: Vec::new(),
            bounding_volume,
            content_bounding_region: None,
            geometric_error,
            transform: DMat4::IDENTITY,
            state: AtomicI8::new(TileLoadState::Unloaded as i8),
            content: None,
            raster_tiles: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: DMat4) -> Self {
        self.transform = transform;
        self
    }

    pub fn id(&self) -> &TileId {
        &self.id
    }

    pub fn parent(&self) -> Option<TileHandle> {
        self.parent
    }

    pub fn children(&self) -> &[TileHandle] {
        &self.children
    }

    pub fn bounding_volume(&self) -> &BoundingVolume {
        &self.bounding_volume
    }

    /// The region actually covered by the loaded content.
    pub fn content_bounding_region(&self) -> Option<&BoundingRegion> {
        self.content_bounding_region.as_ref()
    }

    pub fn geometric_error(&self) -> f64 {
        self.geometric_error
    }

    pub fn set_geometric_error(&mut self, geometric_error: f64) {
        self.geometric_error = geometric_error;
    }

    pub fn transform(&self) -> DMat4 {
        self.transform
    }

    pub fn state(&self) -> TileLoadState {
        TileLoadState::from_i8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: TileLoadState) {
        self.state.store(state as i8, Ordering::Release);
    }

    pub fn content(&self) -> Option<&Model> {
        self.content.as_ref()
    }

    pub fn raster_tiles(&self) -> &[RasterMappedTo3DTile] {
        &self.raster_tiles
    }

    /// Content is prepared and no mapped raster tile is still loading.
    pub fn is_renderable(&self) -> bool {
        self.state() == TileLoadState::Done
            && !self.raster_tiles.iter().any(|mapped| {
                mapped
                    .loading_tile()
                    .is_some_and(|tile| tile.state() == RasterTileLoadState::Loading)
            })
    }

    /// Marks the tile as loading and maps every overlay onto it, so raster
    /// tiles load alongside the content.
    pub fn begin_content_load(&mut self, overlays: &[RasterOverlay]) -> bool {
        if self.state() != TileLoadState::Unloaded {
            return false;
        }

        self.set_state(TileLoadState::ContentLoading);
        self.map_raster_overlays(overlays);
        true
    }

    /// Stores loaded content, adding one set of overlay texture coordinates
    /// per overlay. `None` marks a tile without content.
    pub fn finish_content_load(&mut self, mut content: Option<Model>, overlays: &[RasterOverlay]) {
        if self.state() == TileLoadState::Destroying {
            debug!("Dropping content loaded for destroyed tile {}", self.id);
            return;
        }

        if let Some(model) = &mut content {
            let projections = overlays
                .iter()
                .map(|overlay| *overlay.tile_provider().projection())
                .collect::<Vec<_>>();
            self.content_bounding_region = Self::generate_texture_coordinates(
                model,
                &self.bounding_volume,
                self.transform * Y_UP_TO_Z_UP,
                &projections,
            );
        }

        self.content = content;
        self.set_state(TileLoadState::ContentLoaded);
    }

    /// Adds texture coordinates for each projection over the tile's
    /// rectangle, texture coordinate id `i` for `projections[i]`.
    ///
    /// Returns the union of the regions covered by the content, `None` when
    /// the bounding volume is not a region.
    pub fn generate_texture_coordinates(
        model: &mut Model,
        bounding_volume: &BoundingVolume,
        model_to_ecef: DMat4,
        projections: &[Projection],
    ) -> Option<BoundingRegion> {
        let rectangle = bounding_volume.globe_rectangle()?;

        projections
            .iter()
            .enumerate()
            .map(|(index, projection)| {
                let projected = project_rectangle_simple(projection, rectangle);
                create_raster_overlay_texture_coordinates(model, index as u32, model_to_ecef, projection, &projected)
            })
            .reduce(|union, region| union.union(&region))
    }

    /// Maps the raster tiles of every overlay onto this tile. The overlay's
    /// index is its texture coordinate id.
    pub fn map_raster_overlays(&mut self, overlays: &[RasterOverlay]) {
        let Some(rectangle) = self.bounding_volume.globe_rectangle().copied() else {
            debug!("Tile {} has no region, raster overlays are not mapped", self.id);
            return;
        };

        for (index, overlay) in overlays.iter().enumerate() {
            let provider = overlay.tile_provider();
            let mapped = provider.map_raster_tiles_to_geometry_tile(&rectangle, self.geometric_error, index as u32);
            self.raster_tiles.extend(mapped);
        }
    }

    /// Advances the mapped raster tiles, first replacing the placeholders of
    /// overlays whose provider has become ready.
    ///
    /// Returns true when any overlay has finer imagery than what is shown.
    pub fn update_raster_overlays(&mut self, overlays: &[RasterOverlay]) -> bool {
        if self.state() != TileLoadState::Done {
            return false;
        }

        if let Some(rectangle) = self.bounding_volume.globe_rectangle().copied() {
            for (index, overlay) in overlays.iter().enumerate() {
                let id = index as u32;
                let waiting = self
                    .raster_tiles
                    .iter()
                    .any(|mapped| mapped.texture_coordinate_id() == id && mapped.is_placeholder());
                if !waiting || !overlay.is_ready() {
                    continue;
                }

                self.raster_tiles.retain(|mapped| mapped.texture_coordinate_id() != id);
                let mapped = overlay
                    .tile_provider()
                    .map_raster_tiles_to_geometry_tile(&rectangle, self.geometric_error, id);
                self.raster_tiles.extend(mapped);
            }
        }

        let mut raster_tiles = std::mem::take(&mut self.raster_tiles);
        let more_detail = raster_tiles
            .iter_mut()
            .filter(|mapped| !mapped.is_placeholder())
            .fold(false, |more_detail, mapped| {
                mapped.update(self) == MoreDetailAvailable::Yes || more_detail
            });
        self.raster_tiles = raster_tiles;
        more_detail
    }

    /// Moves finished loads to [`TileLoadState::Done`] and advances raster
    /// overlays. Returns true when finer imagery is available.
    pub fn update(&mut self, overlays: &[RasterOverlay]) -> bool {
        match self.state() {
            TileLoadState::FailedTemporarily => self.set_state(TileLoadState::Failed),
            TileLoadState::ContentLoaded => {
                if self.content.is_none() {
                    self.geometric_error = EMPTY_TILE_GEOMETRIC_ERROR;
                }
                self.set_state(TileLoadState::Done);
            }
            _ => {}
        }

        self.update_raster_overlays(overlays)
    }

    /// Frees the content and raster mappings. A tile whose content is still
    /// loading cannot be unloaded.
    pub fn unload_content(&mut self) -> bool {
        match self.state() {
            TileLoadState::Unloaded => return true,
            TileLoadState::ContentLoading => return false,
            _ => {}
        }

        let mut raster_tiles = std::mem::take(&mut self.raster_tiles);
        for mapped in &mut raster_tiles {
            mapped.detach_from_tile(self);
        }
        drop(raster_tiles);

        self.content = None;
        self.content_bounding_region = None;
        self.set_state(TileLoadState::Unloaded);
        true
    }

    /// Bytes held by the content's buffers.
    pub fn compute_byte_size(&self) -> usize {
        self.content.as_ref().map_or(0, Model::buffer_byte_size)
    }
}
