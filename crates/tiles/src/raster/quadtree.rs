use super::composite::{LoadedQuadtreeImage, combine_images};
use crate::{
    ImageAsset, LoadedRasterOverlayImage, RasterOverlayConfig, RasterOverlayOptions,
    RasterOverlayTile, RasterOverlayTileSource,
};
use bevy_log::debug;
use bevy_math::DVec2;
use bevy_platform::collections::HashMap;
use futures::{
    FutureExt,
    future::{self, BoxFuture},
};
use itertools::Itertools;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tessera_async::{AsyncSystem, SharedFuture};
use tessera_geometry::{
    QuadtreeTileId, QuadtreeTilingScheme, Rectangle,
    availability::{QuadtreeRectangleAvailability, TileAvailabilityFlags},
};
use tessera_geospatial::{Projection, compute_approximate_conversion_factor_to_meters_near_position};

/// Fetches the image of one tile of a quadtree imagery source.
pub trait QuadtreeTileLoader: Send + Sync + 'static {
    fn load_quadtree_tile_image(&self, tile_id: QuadtreeTileId) -> BoxFuture<'static, LoadedRasterOverlayImage>;
}

struct CacheEntry {
    future: SharedFuture<LoadedQuadtreeImage>,
    last_used: u64,
    generation: u64,
}

#[derive(Default)]
struct SubTileCache {
    entries: HashMap<QuadtreeTileId, CacheEntry>,
    clock: u64,
}

impl SubTileCache {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

/// Imagery published as a quadtree of equally sized images.
///
/// # Explanation
///
/// Raster tiles rarely line up with geometry tiles. To drape a geometry
/// tile, the provider picks the level whose texel spacing matches the
/// tile's geometric error, fetches every quadtree tile overlapping it and
/// composites them into one image.
///
/// Fetches are shared. Concurrent requests for the same quadtree tile wait
/// on the same [`SharedFuture`], and completed tiles stay cached for later
/// composites until the cache grows past
/// [`RasterOverlayOptions::sub_tile_cache_bytes`]. A tile that fails to
/// load is replaced by the matching part of its parent, down to the
/// minimum level.
pub struct QuadtreeRasterOverlayTileProvider {
    this: Weak<Self>,
    loader: Arc<dyn QuadtreeTileLoader>,
    async_system: AsyncSystem,
    projection: Projection,
    tiling_scheme: QuadtreeTilingScheme,
    coverage_rectangle: Rectangle,
    minimum_level: u32,
    maximum_level: u32,
    image_width: u32,
    image_height: u32,
    options: RasterOverlayOptions,
    availability: Option<QuadtreeRectangleAvailability>,
    cache: Mutex<SubTileCache>,
}

impl QuadtreeRasterOverlayTileProvider {
    pub fn new(
        config: &RasterOverlayConfig,
        loader: Arc<dyn QuadtreeTileLoader>,
        async_system: AsyncSystem,
    ) -> Arc<Self> {
        Self::with_availability(config, loader, async_system, None)
    }

    /// Like [`Self::new`], with the tile ranges the source is known to
    /// have. Without availability, every tile above the maximum level is
    /// assumed to have children.
    pub fn with_availability(
        config: &RasterOverlayConfig,
        loader: Arc<dyn QuadtreeTileLoader>,
        async_system: AsyncSystem,
        availability: Option<QuadtreeRectangleAvailability>,
    ) -> Arc<Self> {
        let tiling_scheme = config.tiling_scheme();
        let coverage_rectangle = config.coverage_rectangle.unwrap_or(*tiling_scheme.rectangle());
        let deepest_level = tiling_scheme.maximum_level();
        let minimum_level = config.minimum_level.min(deepest_level);
        let maximum_level = config.maximum_level.clamp(minimum_level, deepest_level);

        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            loader,
            async_system,
            projection: config.projection(),
            tiling_scheme,
            coverage_rectangle,
            minimum_level,
            maximum_level,
            image_width: config.tile_width.max(1),
            image_height: config.tile_height.max(1),
            options: config.options,
            availability,
            cache: Mutex::new(SubTileCache::default()),
        })
    }

    pub fn tiling_scheme(&self) -> &QuadtreeTilingScheme {
        &self.tiling_scheme
    }

    pub fn coverage_rectangle(&self) -> &Rectangle {
        &self.coverage_rectangle
    }

    pub fn minimum_level(&self) -> u32 {
        self.minimum_level
    }

    pub fn maximum_level(&self) -> u32 {
        self.maximum_level
    }

    /// The level whose texels are about `target_geometric_error` meters
    /// apart near `position`, a projected coordinate.
    ///
    /// Exact halves round to the coarser level.
    pub fn compute_level_from_geometric_error(&self, target_geometric_error: f64, position: DVec2) -> u32 {
        let to_meters = compute_approximate_conversion_factor_to_meters_near_position(&self.projection, position);
        let level_zero_texel_spacing = self.tiling_scheme.rectangle().width() * to_meters
            / (self.image_width as f64 * self.tiling_scheme.root_tiles_x() as f64);

        let level = (level_zero_texel_spacing / target_geometric_error).log2();
        if level.is_nan() {
            return self.minimum_level;
        }

        let rounded = (level - 0.5).ceil().max(0.0);
        if rounded >= self.maximum_level as f64 {
            self.maximum_level
        } else {
            (rounded as u32).max(self.minimum_level)
        }
    }

    /// The tiles at `level` overlapping `geometry_rectangle`, ordered by
    /// column, then row.
    ///
    /// Tiles that would only contribute a sliver within 1/512 of the
    /// rectangle's size are left out, and coarser levels are used when the
    /// composite would exceed the maximum texture size.
    ///
    /// Rectangles with a minimum above their maximum, as projected from globe
    /// rectangles crossing the antimeridian, are covered by no tiles.
    pub fn covering_tiles_at_level(&self, geometry_rectangle: &Rectangle, level: u32) -> Vec<QuadtreeTileId> {
        if geometry_rectangle.minimum_x > geometry_rectangle.maximum_x
            || geometry_rectangle.minimum_y > geometry_rectangle.maximum_y
        {
            debug!("Inverted rectangle {geometry_rectangle:?} has no covering tiles");
            return Vec::new();
        }

        let tiling_rectangle = self.tiling_scheme.rectangle();
        let imagery_rectangle = tiling_rectangle
            .intersect(&self.coverage_rectangle)
            .unwrap_or(*tiling_rectangle);

        let bounds = geometry_rectangle
            .intersect(&imagery_rectangle)
            .unwrap_or_else(|| clamp_to_edges(geometry_rectangle, &imagery_rectangle));

        let (Some(mut south_west), Some(mut north_east)) = (
            self.tiling_scheme.position_to_tile(bounds.lower_left(), level),
            self.tiling_scheme.position_to_tile(bounds.upper_right(), level),
        ) else {
            return Vec::new();
        };

        let very_close_x = geometry_rectangle.width() / 512.0;
        let very_close_y = geometry_rectangle.height() / 512.0;

        let south_west_rectangle = self.tiling_scheme.tile_to_rectangle(south_west);
        if (south_west_rectangle.maximum_y - geometry_rectangle.minimum_y).abs() < very_close_y
            && south_west.y < north_east.y
        {
            south_west.y += 1;
        }
        if (south_west_rectangle.maximum_x - geometry_rectangle.minimum_x).abs() < very_close_x
            && south_west.x < north_east.x
        {
            south_west.x += 1;
        }

        let north_east_rectangle = self.tiling_scheme.tile_to_rectangle(north_east);
        if (north_east_rectangle.minimum_y - geometry_rectangle.maximum_y).abs() < very_close_y
            && north_east.y > south_west.y
        {
            north_east.y -= 1;
        }
        if (north_east_rectangle.minimum_x - geometry_rectangle.maximum_x).abs() < very_close_x
            && north_east.x > south_west.x
        {
            north_east.x -= 1;
        }

        let maximum_texture_size = self.options.maximum_texture_size as u64;
        let mut level = level;
        let too_large = |south_west: QuadtreeTileId, north_east: QuadtreeTileId| {
            let tiles_x = north_east.x.abs_diff(south_west.x) as u64 + 1;
            let tiles_y = north_east.y.abs_diff(south_west.y) as u64 + 1;
            tiles_x * self.image_width as u64 > maximum_texture_size
                || tiles_y * self.image_height as u64 > maximum_texture_size
        };
        while level > self.minimum_level && too_large(south_west, north_east) {
            level -= 1;
            south_west = south_west.parent();
            north_east = north_east.parent();
        }

        (south_west.x..=north_east.x)
            .cartesian_product(south_west.y..=north_east.y)
            .map(|(x, y)| QuadtreeTileId::new(level, x, y))
            .filter(|&tile_id| touches(&self.tiling_scheme.tile_to_rectangle(tile_id), &bounds))
            .collect()
    }

    /// Starts fetching every tile needed to drape `geometry_rectangle` at
    /// `target_geometric_error`.
    pub fn map_raster_tiles_to_geometry_tile(
        &self,
        geometry_rectangle: &Rectangle,
        target_geometric_error: f64,
    ) -> Vec<SharedFuture<LoadedQuadtreeImage>> {
        self.covering_tiles(geometry_rectangle, target_geometric_error)
            .into_iter()
            .map(|tile_id| self.get_quadtree_tile(tile_id))
            .collect()
    }

    /// The shared fetch of one quadtree tile, started on first request.
    pub fn get_quadtree_tile(&self, tile_id: QuadtreeTileId) -> SharedFuture<LoadedQuadtreeImage> {
        let mut cache = self.cache.lock();
        let now = cache.tick();

        if let Some(entry) = cache.entries.get_mut(&tile_id) {
            entry.last_used = now;
            return entry.future.clone();
        }

        let future = AsyncSystem::share(self.fetch_quadtree_tile(tile_id, now));
        cache.entries.insert(
            tile_id,
            CacheEntry {
                future: future.clone(),
                last_used: now,
                generation: now,
            },
        );
        future
    }

    /// Composites every tile covering `rectangle` at
    /// `target_geometric_error` into one image.
    pub fn load_composite_image(
        &self,
        rectangle: &Rectangle,
        target_geometric_error: f64,
    ) -> BoxFuture<'static, LoadedRasterOverlayImage> {
        let images = self.map_raster_tiles_to_geometry_tile(rectangle, target_geometric_error);
        self.composite(*rectangle, images)
    }

    /// Number of quadtree tiles cached or being fetched.
    pub fn cached_tile_count(&self) -> usize {
        self.cache.lock().entries.len()
    }

    fn fetch_quadtree_tile(&self, tile_id: QuadtreeTileId, generation: u64) -> BoxFuture<'static, LoadedQuadtreeImage> {
        let load = self.loader.load_quadtree_tile_image(tile_id);
        let this = self.this.clone();
        let minimum_level = self.minimum_level;

        async move {
            let loaded = load.await;
            if loaded.image.as_ref().is_some_and(ImageAsset::is_valid) {
                return LoadedQuadtreeImage::new(loaded);
            }

            let Some(provider) = this.upgrade() else {
                return LoadedQuadtreeImage::new(loaded);
            };
            provider.forget_failed_tile(tile_id, generation);

            if tile_id.level <= minimum_level {
                return LoadedQuadtreeImage::new(loaded);
            }

            debug!("Raster tile {tile_id} failed, using the matching part of its parent");
            let parent = provider.get_quadtree_tile(tile_id.parent()).await;
            LoadedQuadtreeImage {
                loaded: parent.loaded,
                subset: Some(provider.tiling_scheme.tile_to_rectangle(tile_id)),
            }
        }
        .boxed()
    }

    /// Removes a failed fetch so the next request tries again. A newer
    /// entry for the same tile is left alone.
    fn forget_failed_tile(&self, tile_id: QuadtreeTileId, generation: u64) {
        let mut cache = self.cache.lock();
        if cache
            .entries
            .get(&tile_id)
            .is_some_and(|entry| entry.generation == generation)
        {
            cache.entries.remove(&tile_id);
        }
    }

    fn composite(
        &self,
        rectangle: Rectangle,
        images: Vec<SharedFuture<LoadedQuadtreeImage>>,
    ) -> BoxFuture<'static, LoadedRasterOverlayImage> {
        let this = self.this.clone();
        self.async_system.spawn(async move {
            let images = future::join_all(images).await;
            let combined = combine_images(&rectangle, &images);

            if let Some(provider) = this.upgrade() {
                provider.unload_cached_tiles();
            }
            combined
        })
    }

    /// Evicts the least recently used completed tiles until the cache fits
    /// its byte budget. Tiles still being fetched are never evicted.
    pub fn unload_cached_tiles(&self) {
        let budget = self.options.sub_tile_cache_bytes;
        let mut cache = self.cache.lock();

        let completed = cache
            .entries
            .iter()
            .filter_map(|(tile_id, entry)| {
                let image = entry.future.peek()?;
                Some((*tile_id, entry.last_used, image.byte_size() as u64))
            })
            .sorted_by_key(|(_, last_used, _)| *last_used)
            .collect_vec();

        let mut total: u64 = completed.iter().map(|(_, _, bytes)| bytes).sum();
        let mut evicted = 0;
        for (tile_id, _, bytes) in completed {
            if total <= budget {
                break;
            }
            cache.entries.remove(&tile_id);
            total -= bytes;
            evicted += 1;
        }

        if evicted > 0 {
            debug!("Evicted {evicted} cached raster tiles, {total} bytes remain cached");
        }
    }
}

impl RasterOverlayTileSource for QuadtreeRasterOverlayTileProvider {
    fn covering_tiles(&self, rectangle: &Rectangle, target_geometric_error: f64) -> Vec<QuadtreeTileId> {
        let level = self.compute_level_from_geometric_error(target_geometric_error, rectangle.center());
        self.covering_tiles_at_level(rectangle, level)
    }

    fn tile_rectangle(&self, tile_id: QuadtreeTileId) -> Rectangle {
        self.tiling_scheme.tile_to_rectangle(tile_id)
    }

    fn load_tile_image(&self, tile: &RasterOverlayTile) -> BoxFuture<'static, LoadedRasterOverlayImage> {
        let images = self
            .covering_tiles_at_level(tile.rectangle(), tile.id().level)
            .into_iter()
            .map(|tile_id| self.get_quadtree_tile(tile_id))
            .collect();
        self.composite(*tile.rectangle(), images)
    }

    fn has_more_details_available(&self, tile_id: QuadtreeTileId) -> bool {
        if tile_id.level >= self.maximum_level {
            return false;
        }

        match &self.availability {
            Some(availability) => tile_id.children().into_iter().any(|child| {
                availability
                    .is_tile_available(child)
                    .contains(TileAvailabilityFlags::TILE_AVAILABLE)
            }),
            None => true,
        }
    }
}

/// True if the rectangles overlap or share an edge.
fn touches(first: &Rectangle, second: &Rectangle) -> bool {
    first.minimum_x.max(second.minimum_x) <= first.maximum_x.min(second.maximum_x)
        && first.minimum_y.max(second.minimum_y) <= first.maximum_y.min(second.maximum_y)
}

/// A geometry rectangle outside the imagery is moved onto the nearest
/// imagery edge, so the outermost imagery texels get stretched over it.
fn clamp_to_edges(geometry: &Rectangle, imagery: &Rectangle) -> Rectangle {
    let clamp_axis = |geometry_min: f64, geometry_max: f64, imagery_min: f64, imagery_max: f64| {
        if geometry_min >= imagery_max {
            (imagery_max, imagery_max)
        } else if geometry_max <= imagery_min {
            (imagery_min, imagery_min)
        } else {
            (geometry_min.max(imagery_min), geometry_max.min(imagery_max))
        }
    };

    let (minimum_x, maximum_x) = clamp_axis(
        geometry.minimum_x,
        geometry.maximum_x,
        imagery.minimum_x,
        imagery.maximum_x,
    );
    let (minimum_y, maximum_y) = clamp_axis(
        geometry.minimum_y,
        geometry.maximum_y,
        imagery.minimum_y,
        imagery.maximum_y,
    );
    Rectangle::new(minimum_x, minimum_y, maximum_x, maximum_y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tessera_geospatial::ProjectionKind;

    struct NullLoader;

    impl QuadtreeTileLoader for NullLoader {
        fn load_quadtree_tile_image(&self, _tile_id: QuadtreeTileId) -> BoxFuture<'static, LoadedRasterOverlayImage> {
            future::ready(LoadedRasterOverlayImage::default()).boxed()
        }
    }

    /// A 4x2 degree grid at level 0 with 256 pixel tiles, so a level 0
    /// texel is 1/64 of a degree.
    fn degrees_config() -> RasterOverlayConfig {
        RasterOverlayConfig {
            rectangle: Some(Rectangle::new(-180.0, -90.0, 180.0, 90.0)),
            ..Default::default()
        }
    }

    fn provider(config: &RasterOverlayConfig) -> Arc<QuadtreeRasterOverlayTileProvider> {
        QuadtreeRasterOverlayTileProvider::new(config, Arc::new(NullLoader), AsyncSystem::new(1))
    }

    #[test]
    fn levels_follow_geometric_error() {
        let provider = provider(&degrees_config());
        let spacing = 360.0 / 512.0;

        assert_eq!(provider.compute_level_from_geometric_error(spacing, DVec2::ZERO), 0);
        assert_eq!(provider.compute_level_from_geometric_error(spacing / 8.0, DVec2::ZERO), 3);
        assert_eq!(provider.compute_level_from_geometric_error(spacing * 4.0, DVec2::ZERO), 0);
        assert_eq!(
            provider.compute_level_from_geometric_error(spacing / 2.0_f64.powf(2.4), DVec2::ZERO),
            2
        );
        assert_eq!(
            provider.compute_level_from_geometric_error(spacing / 2.0_f64.powf(2.6), DVec2::ZERO),
            3
        );
        assert_eq!(provider.compute_level_from_geometric_error(0.0, DVec2::ZERO), 18);
    }

    #[test]
    fn levels_are_clamped() {
        let config = RasterOverlayConfig {
            minimum_level: 2,
            maximum_level: 5,
            ..degrees_config()
        };
        let provider = provider(&config);
        assert_eq!(provider.compute_level_from_geometric_error(1000.0, DVec2::ZERO), 2);
        assert_eq!(provider.compute_level_from_geometric_error(1e-9, DVec2::ZERO), 5);
    }

    #[test]
    fn covering_tiles_skip_slivers() {
        let provider = provider(&degrees_config());

        // Exactly one level 1 tile.
        let tiles = provider.covering_tiles_at_level(&Rectangle::new(0.0, 0.0, 90.0, 90.0), 1);
        assert_eq!(tiles, vec![QuadtreeTileId::new(1, 2, 1)]);

        // Straddling the prime meridian and the equator.
        let tiles = provider.covering_tiles_at_level(&Rectangle::new(-10.0, -10.0, 10.0, 10.0), 1);
        assert_eq!(
            tiles,
            vec![
                QuadtreeTileId::new(1, 1, 0),
                QuadtreeTileId::new(1, 1, 1),
                QuadtreeTileId::new(1, 2, 0),
                QuadtreeTileId::new(1, 2, 1),
            ]
        );
    }

    #[test]
    fn antimeridian_rectangles_are_not_covered() {
        let provider = provider(&degrees_config());
        assert!(provider
            .covering_tiles_at_level(&Rectangle::new(170.0, 0.0, -170.0, 10.0), 3)
            .is_empty());
        assert!(provider
            .covering_tiles_at_level(&Rectangle::new(0.0, 10.0, 10.0, 0.0), 3)
            .is_empty());
    }

    #[test]
    fn levels_stop_at_the_deepest_addressable_level() {
        let config = RasterOverlayConfig {
            maximum_level: 40,
            ..degrees_config()
        };
        let provider = provider(&config);
        assert_eq!(provider.maximum_level(), 30);

        let level = provider.compute_level_from_geometric_error(0.0, DVec2::ZERO);
        assert_eq!(level, 30);
        let tiles = provider.covering_tiles_at_level(&Rectangle::new(0.0, 0.0, 1e-6, 1e-6), level);
        assert!(!tiles.is_empty());
        assert!(tiles.iter().all(|tile| tile.level == 30));

        assert!(provider
            .covering_tiles_at_level(&Rectangle::new(0.0, 0.0, 1.0, 1.0), 40)
            .is_empty());
    }

    #[test]
    fn large_composites_use_coarser_levels() {
        let config = RasterOverlayConfig {
            options: RasterOverlayOptions {
                maximum_texture_size: 512,
                ..Default::default()
            },
            ..degrees_config()
        };
        let provider = provider(&config);

        // Four level 2 tiles across would need 1024 pixels.
        let tiles = provider.covering_tiles_at_level(&Rectangle::new(-180.0, 0.0, 0.0, 45.0), 2);
        assert!(tiles.iter().all(|tile| tile.level == 1));
        assert_eq!(tiles.len(), 2);
    }

    #[test]
    fn geometry_outside_the_coverage_uses_the_edge() {
        let config = RasterOverlayConfig {
            coverage_rectangle: Some(Rectangle::new(0.0, -90.0, 180.0, 90.0)),
            ..degrees_config()
        };
        let provider = provider(&config);
        let tiles = provider.covering_tiles_at_level(&Rectangle::new(-20.0, 10.0, -10.0, 20.0), 1);
        assert_eq!(tiles, vec![QuadtreeTileId::new(1, 2, 1)]);
    }

    #[test]
    fn more_detail_needs_available_children() {
        let config = RasterOverlayConfig {
            maximum_level: 3,
            ..degrees_config()
        };
        let mut availability = QuadtreeRectangleAvailability::new(config.tiling_scheme(), 3);
        availability.add_available_tile_range(tessera_geometry::availability::QuadtreeTileRectangularRange {
            level: 1,
            minimum_x: 0,
            minimum_y: 0,
            maximum_x: 1,
            maximum_y: 1,
        });
        let provider = QuadtreeRasterOverlayTileProvider::with_availability(
            &config,
            Arc::new(NullLoader),
            AsyncSystem::new(1),
            Some(availability),
        );

        assert!(provider.has_more_details_available(QuadtreeTileId::new(0, 0, 0)));
        assert!(!provider.has_more_details_available(QuadtreeTileId::new(0, 1, 0)));
        assert!(!provider.has_more_details_available(QuadtreeTileId::new(3, 0, 0)));
    }

    struct CountingLoader {
        requests: AtomicUsize,
    }

    impl QuadtreeTileLoader for CountingLoader {
        fn load_quadtree_tile_image(&self, _tile_id: QuadtreeTileId) -> BoxFuture<'static, LoadedRasterOverlayImage> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            future::ready(LoadedRasterOverlayImage::default()).boxed()
        }
    }

    #[test]
    fn failed_root_tiles_are_retried() {
        let loader = Arc::new(CountingLoader {
            requests: AtomicUsize::new(0),
        });
        let config = RasterOverlayConfig {
            projection: ProjectionKind::Geographic,
            ..degrees_config()
        };
        let provider = QuadtreeRasterOverlayTileProvider::new(&config, loader.clone(), AsyncSystem::new(1));

        let tile_id = QuadtreeTileId::new(0, 0, 0);
        let first = futures::executor::block_on(provider.get_quadtree_tile(tile_id));
        assert!(first.subset.is_none());
        assert!(first.loaded.image.is_none());
        assert_eq!(provider.cached_tile_count(), 0);

        futures::executor::block_on(provider.get_quadtree_tile(tile_id));
        assert_eq!(loader.requests.load(Ordering::SeqCst), 2);
    }
}
