use crate::{
    Credit, ImageAsset, RasterMappedTo3DTile, RasterOverlayOptions, RasterOverlayTile,
    RasterTileLoadState, RasterTileRef, TilesExternals,
};
use super::tile::RasterTileData;
use bevy_log::{debug, error, trace, warn};
use bevy_platform::collections::HashMap;
use futures::{
    FutureExt,
    channel::oneshot,
    future::{self, BoxFuture},
};
use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicI64, AtomicU32, Ordering},
};
use tessera_geometry::{QuadtreeTileId, Rectangle};
use tessera_geospatial::{GlobeRectangle, Projection, project_rectangle_simple};

/// What a tile source produced for one raster tile.
#[derive(Debug, Default)]
pub struct LoadedRasterOverlayImage {
    pub image: Option<ImageAsset>,
    /// The projected area `image` covers.
    pub rectangle: Rectangle,
    pub credits: Vec<Credit>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub more_detail_available: bool,
}

impl LoadedRasterOverlayImage {
    pub fn failed(rectangle: Rectangle, error: impl Into<String>) -> Self {
        Self {
            rectangle,
            errors: vec![error.into()],
            ..Default::default()
        }
    }
}

/// The part of a tile provider that knows a concrete imagery source.
///
/// Implementations decide which tiles cover a rectangle and how a tile's
/// image is produced. Lifetimes, throttling and renderer preparation are
/// handled by [`RasterOverlayTileProvider`].
pub trait RasterOverlayTileSource: Send + Sync + 'static {
    /// The tiles needed to drape `rectangle` at `target_geometric_error`,
    /// ordered by column, then row.
    fn covering_tiles(&self, rectangle: &Rectangle, target_geometric_error: f64) -> Vec<QuadtreeTileId>;

    fn tile_rectangle(&self, tile_id: QuadtreeTileId) -> Rectangle;

    fn load_tile_image(&self, tile: &RasterOverlayTile) -> BoxFuture<'static, LoadedRasterOverlayImage>;

    fn has_more_details_available(&self, tile_id: QuadtreeTileId) -> bool;
}

struct TileLoadResult {
    state: RasterTileLoadState,
    data: RasterTileData,
}

/// Creates, loads and destroys the [`RasterOverlayTile`]s of one overlay.
///
/// A provider without a source is a placeholder. It maps every geometry
/// tile to one permanently unloaded placeholder tile, and is replaced once
/// the real provider is ready.
pub struct RasterOverlayTileProvider {
    name: String,
    externals: TilesExternals,
    projection: Projection,
    coverage_rectangle: Rectangle,
    options: RasterOverlayOptions,
    credit: Option<Credit>,
    cutouts: Vec<GlobeRectangle>,
    source: Option<Arc<dyn RasterOverlayTileSource>>,
    tiles: Mutex<HashMap<QuadtreeTileId, Arc<RasterOverlayTile>>>,
    placeholder: Arc<RasterOverlayTile>,
    tile_data_bytes: AtomicI64,
    total_tiles_loading: AtomicU32,
    throttled_tiles_loading: AtomicU32,
}

impl RasterOverlayTileProvider {
    pub fn new(
        name: impl Into<String>,
        externals: TilesExternals,
        projection: Projection,
        coverage_rectangle: Rectangle,
        options: RasterOverlayOptions,
        source: Arc<dyn RasterOverlayTileSource>,
    ) -> Self {
        Self {
            source: Some(source),
            coverage_rectangle,
            ..Self::placeholder(name, externals, projection, options)
        }
    }

    pub fn placeholder(
        name: impl Into<String>,
        externals: TilesExternals,
        projection: Projection,
        options: RasterOverlayOptions,
    ) -> Self {
        Self {
            name: name.into(),
            externals,
            coverage_rectangle: projection.maximum_rectangle(),
            projection,
            options,
            credit: None,
            cutouts: Vec::new(),
            source: None,
            tiles: Mutex::new(HashMap::default()),
            placeholder: Arc::new(RasterOverlayTile::placeholder()),
            tile_data_bytes: AtomicI64::new(0),
            total_tiles_loading: AtomicU32::new(0),
            throttled_tiles_loading: AtomicU32::new(0),
        }
    }

    /// Attributed on every tile this provider loads.
    pub fn with_credit(mut self, credit: Credit) -> Self {
        self.credit = Some(credit);
        self
    }

    pub fn with_cutouts(mut self, cutouts: Vec<GlobeRectangle>) -> Self {
        self.cutouts = cutouts;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_placeholder(&self) -> bool {
        self.source.is_none()
    }

    pub fn externals(&self) -> &TilesExternals {
        &self.externals
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn coverage_rectangle(&self) -> &Rectangle {
        &self.coverage_rectangle
    }

    pub fn options(&self) -> &RasterOverlayOptions {
        &self.options
    }

    pub fn credit(&self) -> Option<&Credit> {
        self.credit.as_ref()
    }

    /// The tile with `tile_id`, created unloaded if it does not exist yet.
    pub fn get_tile(&self, tile_id: QuadtreeTileId) -> Arc<RasterOverlayTile> {
        let Some(source) = &self.source else {
            return self.placeholder.clone();
        };

        self.tiles
            .lock()
            .entry(tile_id)
            .or_insert_with(|| Arc::new(RasterOverlayTile::new(tile_id, source.tile_rectangle(tile_id))))
            .clone()
    }

    pub fn get_tile_without_creating(&self, tile_id: QuadtreeTileId) -> Option<Arc<RasterOverlayTile>> {
        self.tiles.lock().get(&tile_id).cloned()
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.lock().len()
    }

    pub fn map_raster_tiles_to_geometry_tile(
        self: &Arc<Self>,
        geometry_rectangle: &GlobeRectangle,
        target_geometric_error: f64,
        texture_coordinate_id: u32,
    ) -> Vec<RasterMappedTo3DTile> {
        let projected = project_rectangle_simple(&self.projection, geometry_rectangle);
        self.map_raster_tiles_to_projected_rectangle(&projected, target_geometric_error, texture_coordinate_id)
    }

    /// Maps the raster tiles covering `geometry_rectangle`, a rectangle in
    /// this provider's projection, and starts loading them.
    ///
    /// Each mapping carries the part of the geometry tile's texture
    /// coordinate space its raster tile covers. Columns and rows on the far
    /// edges are stretched to 1 so rounding never leaves a gap.
    pub fn map_raster_tiles_to_projected_rectangle(
        self: &Arc<Self>,
        geometry_rectangle: &Rectangle,
        target_geometric_error: f64,
        texture_coordinate_id: u32,
    ) -> Vec<RasterMappedTo3DTile> {
        let Some(source) = &self.source else {
            return vec![RasterMappedTo3DTile::new(
                RasterTileRef::new(self.placeholder.clone()),
                self.clone(),
                texture_coordinate_id,
                Rectangle::new(0.0, 0.0, 1.0, 1.0),
                *geometry_rectangle,
            )];
        };

        let tile_ids = source.covering_tiles(geometry_rectangle, target_geometric_error);
        let (Some(first), Some(last)) = (tile_ids.first(), tile_ids.last()) else {
            return Vec::new();
        };
        let (first_x, last_x) = (first.x, last.x);
        let first_y = tile_ids.iter().map(|id| id.y).min().unwrap_or(first.y);
        let last_y = tile_ids.iter().map(|id| id.y).max().unwrap_or(last.y);

        let width = geometry_rectangle.width();
        let height = geometry_rectangle.height();
        let to_u = |x: f64| {
            if width > 0.0 {
                ((x - geometry_rectangle.minimum_x) / width).clamp(0.0, 1.0)
            } else {
                0.0
            }
        };
        let to_v = |y: f64| {
            if height > 0.0 {
                ((y - geometry_rectangle.minimum_y) / height).clamp(0.0, 1.0)
            } else {
                0.0
            }
        };

        tile_ids
            .into_iter()
            .map(|tile_id| {
                let tile_rectangle = source.tile_rectangle(tile_id);
                let texture_coordinate_rectangle = Rectangle::new(
                    if tile_id.x == first_x { 0.0 } else { to_u(tile_rectangle.minimum_x) },
                    if tile_id.y == first_y { 0.0 } else { to_v(tile_rectangle.minimum_y) },
                    if tile_id.x == last_x { 1.0 } else { to_u(tile_rectangle.maximum_x) },
                    if tile_id.y == last_y { 1.0 } else { to_v(tile_rectangle.maximum_y) },
                );

                let tile = self.get_tile(tile_id);
                if tile.state() != RasterTileLoadState::Placeholder {
                    self.load_tile_throttled(&tile);
                }

                RasterMappedTo3DTile::new(
                    RasterTileRef::new(tile),
                    self.clone(),
                    texture_coordinate_id,
                    texture_coordinate_rectangle,
                    *geometry_rectangle,
                )
            })
            .collect()
    }

    /// Loads `tile` regardless of how many loads are running. Resolves to
    /// whether the tile ends up loaded.
    pub fn load_tile(self: &Arc<Self>, tile: &Arc<RasterOverlayTile>) -> BoxFuture<'static, bool> {
        self.do_load(tile, false)
    }

    /// Starts loading `tile` unless too many throttled loads are running.
    ///
    /// Returns `false` if the load was postponed. A tile that is already
    /// loading or loaded counts as started.
    pub fn load_tile_throttled(self: &Arc<Self>, tile: &Arc<RasterOverlayTile>) -> bool {
        if tile.state() != RasterTileLoadState::Unloaded {
            return true;
        }

        if self.throttled_tiles_loading.load(Ordering::Acquire) >= self.options.maximum_simultaneous_tile_loads {
            return false;
        }

        // The load runs detached, nobody needs to wait for it.
        drop(self.do_load(tile, true));
        true
    }

    pub fn number_of_tiles_loading(&self) -> u32 {
        self.total_tiles_loading.load(Ordering::Acquire)
    }

    pub fn number_of_throttled_tiles_loading(&self) -> u32 {
        self.throttled_tiles_loading.load(Ordering::Acquire)
    }

    /// Bytes of image data held by loaded tiles.
    pub fn tile_data_bytes(&self) -> i64 {
        self.tile_data_bytes.load(Ordering::Acquire)
    }

    pub fn has_more_details_available(&self, tile_id: QuadtreeTileId) -> bool {
        self.source
            .as_ref()
            .is_some_and(|source| source.has_more_details_available(tile_id))
    }

    /// Destroys every tile no geometry tile references anymore. Returns how
    /// many were destroyed.
    ///
    /// Must run on the main thread. A destroyed tile that is still loading
    /// drops its result when the load completes.
    pub fn collect_unreferenced_tiles(&self) -> usize {
        let prepare = self.externals.prepare_renderer_resources.as_deref();
        let mut tiles = self.tiles.lock();
        let before = tiles.len();

        tiles.retain(|tile_id, tile| {
            if tile.reference_count() > 0 {
                return true;
            }

            let bytes = tile.byte_size() as i64;
            tile.set_state(RasterTileLoadState::Destroying);
            let (load_thread_resources, renderer_resources) = tile.take_resources();
            if let Some(prepare) = prepare {
                prepare.free_raster(tile, load_thread_resources, renderer_resources);
            }
            self.tile_data_bytes.fetch_sub(bytes, Ordering::AcqRel);
            trace!("Destroyed raster tile {tile_id} of overlay {}", self.name);
            false
        });

        before - tiles.len()
    }

    fn do_load(self: &Arc<Self>, tile: &Arc<RasterOverlayTile>, throttle: bool) -> BoxFuture<'static, bool> {
        let Some(source) = &self.source else {
            return future::ready(false).boxed();
        };

        if !tile.try_begin_loading() {
            return future::ready(tile.state().is_loaded()).boxed();
        }
        self.begin_tile_load(throttle);

        let image = source.load_tile_image(tile);
        let provider = self.clone();
        let tile = tile.clone();
        let (sender, receiver) = oneshot::channel();

        self.externals.async_system.spawn_detached(async move {
            let loaded = image.await;
            let result = provider.create_load_result(&tile, loaded);

            let finisher = provider.clone();
            let finished = provider
                .externals
                .async_system
                .run_in_main_thread(move || finisher.finish_load(&tile, result, throttle))
                .await;

            // The caller may not be waiting.
            let _ = sender.send(finished.unwrap_or(false));
        });

        receiver.map(|finished| finished.unwrap_or(false)).boxed()
    }

    fn begin_tile_load(&self, throttle: bool) {
        self.total_tiles_loading.fetch_add(1, Ordering::AcqRel);
        if throttle {
            self.throttled_tiles_loading.fetch_add(1, Ordering::AcqRel);
        }
    }

    fn finalize_tile_load(&self, throttle: bool) {
        self.total_tiles_loading.fetch_sub(1, Ordering::AcqRel);
        if throttle {
            self.throttled_tiles_loading.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Runs in a worker thread.
    fn create_load_result(&self, tile: &RasterOverlayTile, loaded: LoadedRasterOverlayImage) -> TileLoadResult {
        let LoadedRasterOverlayImage {
            image,
            rectangle,
            mut credits,
            errors,
            warnings,
            more_detail_available,
        } = loaded;

        if !warnings.is_empty() {
            warn!(
                "Warnings while loading raster tile {} of overlay {}:\n- {}",
                tile.id(),
                self.name,
                warnings.join("\n- ")
            );
        }

        if !errors.is_empty() {
            error!(
                "Failed to load raster tile {} of overlay {}:\n- {}",
                tile.id(),
                self.name,
                errors.join("\n- ")
            );
        }

        let image = image.filter(|image| errors.is_empty() && image.is_valid());
        let Some(mut image) = image else {
            return TileLoadResult {
                state: RasterTileLoadState::Failed,
                data: RasterTileData::default(),
            };
        };

        self.apply_cutouts(&mut image, &rectangle);

        let load_thread_resources = self
            .externals
            .prepare_renderer_resources
            .as_ref()
            .and_then(|prepare| prepare.prepare_raster_in_load_thread(&image));

        credits.extend(self.credit.clone());

        TileLoadResult {
            state: RasterTileLoadState::Loaded,
            data: RasterTileData {
                image: Some(Arc::new(image)),
                image_rectangle: Some(rectangle),
                credits,
                load_thread_resources,
                renderer_resources: None,
                more_detail_available,
            },
        }
    }

    /// Runs in the main thread.
    fn finish_load(&self, tile: &RasterOverlayTile, result: TileLoadResult, throttle: bool) -> bool {
        self.finalize_tile_load(throttle);

        if tile.state() == RasterTileLoadState::Destroying {
            debug!("Dropping the result for destroyed raster tile {}", tile.id());
            if let Some(prepare) = &self.externals.prepare_renderer_resources {
                prepare.free_raster(tile, result.data.load_thread_resources, None);
            }
            return false;
        }

        let bytes = result.data.image.as_ref().map_or(0, |image| image.byte_size());
        tile.store(result.data);
        self.tile_data_bytes.fetch_add(bytes as i64, Ordering::AcqRel);
        tile.set_state(result.state);

        result.state == RasterTileLoadState::Loaded
    }

    /// Clears the alpha channel of every pixel inside a cutout.
    fn apply_cutouts(&self, image: &mut ImageAsset, image_rectangle: &Rectangle) {
        if self.cutouts.is_empty() {
            return;
        }
        if image.channels != 4 || image.bytes_per_channel != 1 {
            debug!("Skipping cutouts on a raster image with {} channels", image.channels);
            return;
        }

        let width = image.width as f64;
        let height = image.height as f64;
        let row_size = image.row_size();

        for cutout in &self.cutouts {
            let projected = project_rectangle_simple(&self.projection, cutout);
            let Some(intersection) = projected.intersect(image_rectangle) else {
                continue;
            };

            let start_u = (intersection.minimum_x - image_rectangle.minimum_x) / image_rectangle.width();
            let end_u = (intersection.maximum_x - image_rectangle.minimum_x) / image_rectangle.width();
            // Rows run from north to south.
            let start_v = (image_rectangle.maximum_y - intersection.maximum_y) / image_rectangle.height();
            let end_v = (image_rectangle.maximum_y - intersection.minimum_y) / image_rectangle.height();

            let start_column = (start_u * width).floor().max(0.0) as usize;
            let end_column = ((end_u * width).ceil() as usize).min(image.width as usize);
            let start_row = (start_v * height).floor().max(0.0) as usize;
            let end_row = ((end_v * height).ceil() as usize).min(image.height as usize);

            for row in start_row..end_row {
                for column in start_column..end_column {
                    image.pixel_data[row * row_size + column * 4 + 3] = 0;
                }
            }
        }
    }
}
