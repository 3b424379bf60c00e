mod common;

use bevy_math::DVec2;
use common::{Harness, tile_value};
use std::{sync::Arc, thread};
use tessera_geometry::{QuadtreeTileId, QuadtreeTilingScheme, Rectangle};
use tessera_tiles::{QuadtreeRasterOverlayTileProvider, RasterOverlayConfig, UrlTemplateTileLoader};

/// A world of 2x1 root tiles of 2x2 pixels in plain degrees.
fn config() -> RasterOverlayConfig {
    RasterOverlayConfig {
        name: "imagery".to_string(),
        url_template: "tiles/{z}/{x}/{y}".to_string(),
        rectangle: Some(Rectangle::new(-180.0, -90.0, 180.0, 90.0)),
        maximum_level: 4,
        tile_width: 2,
        tile_height: 2,
        ..Default::default()
    }
}

fn provider(harness: &Harness, config: &RasterOverlayConfig) -> Arc<QuadtreeRasterOverlayTileProvider> {
    let loader = Arc::new(UrlTemplateTileLoader::new(config, harness.externals.clone()));
    QuadtreeRasterOverlayTileProvider::new(config, loader, harness.async_system.clone())
}

#[test]
fn concurrent_requests_share_one_fetch() {
    let harness = Harness::new();
    let provider = provider(&harness, &config());
    let tile_id = QuadtreeTileId::new(2, 3, 1);

    let futures = thread::scope(|scope| {
        let requests = (0..4)
            .map(|_| scope.spawn(|| provider.get_quadtree_tile(tile_id)))
            .collect::<Vec<_>>();
        requests
            .into_iter()
            .map(|request| request.join().unwrap())
            .collect::<Vec<_>>()
    });

    for future in futures {
        let loaded = harness.async_system.wait_in_main_thread(future);
        let image = loaded.loaded.image.as_ref().unwrap();
        assert_eq!(image.pixel_data[0], tile_value(tile_id));
    }
    assert_eq!(harness.server.requests("tiles/2/3/1"), 1);
    assert_eq!(provider.cached_tile_count(), 1);
}

#[test]
fn siblings_composite_side_by_side() {
    let harness = Harness::new();
    let provider = provider(&harness, &config());
    let world = Rectangle::new(-180.0, -90.0, 180.0, 90.0);

    let composite = harness
        .async_system
        .wait_in_main_thread(provider.load_composite_image(&world, f64::MAX));

    assert!(composite.errors.is_empty());
    assert_eq!(composite.rectangle, world);
    let image = composite.image.unwrap();
    assert_eq!((image.width, image.height), (4, 2));

    let west = tile_value(QuadtreeTileId::new(0, 0, 0));
    let east = tile_value(QuadtreeTileId::new(0, 1, 0));
    for row in image.pixel_data.chunks(image.row_size()) {
        let values = row.chunks(4).map(|pixel| pixel[0]).collect::<Vec<_>>();
        assert_eq!(values, [west, west, east, east]);
    }
    assert_eq!(harness.server.total_requests(), 2);
}

#[test]
fn failed_tiles_fall_back_to_their_parent_and_are_retried() {
    let harness = Harness::new();
    let provider = provider(&harness, &config());
    harness.server.remove("tiles/1/0/0");

    let tile_id = QuadtreeTileId::new(1, 0, 0);
    let loaded = harness
        .async_system
        .wait_in_main_thread(provider.get_quadtree_tile(tile_id));

    assert_eq!(loaded.subset, Some(provider.tiling_scheme().tile_to_rectangle(tile_id)));
    let image = loaded.loaded.image.as_ref().unwrap();
    assert_eq!(image.pixel_data[0], tile_value(tile_id.parent()));

    // Only the parent stays cached, the failed tile is fetched again.
    assert_eq!(provider.cached_tile_count(), 1);
    harness
        .async_system
        .wait_in_main_thread(provider.get_quadtree_tile(tile_id));
    assert_eq!(harness.server.requests("tiles/1/0/0"), 2);
    assert_eq!(harness.server.requests("tiles/0/0/0"), 1);
}

#[test]
fn tiling_scheme_covers_the_origin() {
    let tiling_scheme = QuadtreeTilingScheme::new(Rectangle::new(-180.0, -90.0, 180.0, 90.0), 2, 1);
    let tile_id = tiling_scheme.position_to_tile(DVec2::ZERO, 1).unwrap();

    assert_eq!(tile_id.level, 1);
    assert!(tiling_scheme.tile_to_rectangle(tile_id).contains(DVec2::ZERO));
    assert_eq!(tiling_scheme.number_of_x_tiles_at_level(1), Some(4));
    assert_eq!(tiling_scheme.number_of_y_tiles_at_level(1), Some(2));
}
