use crate::cli::MapCli;
use bevy_log::{debug, info};
use std::{path::Path, sync::Arc, thread, time::Duration};
use tessera_async::AsyncSystem;
use tessera_geometry::{QuadtreeTileId, Rectangle};
use tessera_geospatial::GlobeRectangle;
use tessera_tiles::{
    FileAssetAccessor, RasterOverlay, RasterTileLoadState, TilesConfig, TilesError, TilesExternals, TilesResult,
};

/// One raster tile draped over the geometry rectangle.
#[derive(Clone, Debug, PartialEq)]
pub struct MappedRasterTile {
    pub tile_id: QuadtreeTileId,
    /// The part of the geometry tile's texture coordinates it covers.
    pub texture_coordinate_rectangle: Rectangle,
    pub state: RasterTileLoadState,
}

pub fn map(args: &MapCli, async_system: &AsyncSystem) -> TilesResult<Vec<MappedRasterTile>> {
    let config = TilesConfig::load_file(&args.config_path)?;
    let root = args.config_path.parent().unwrap_or(Path::new("."));
    let accessor = FileAssetAccessor::new(root, async_system.clone());
    let externals = TilesExternals::new(async_system.clone(), Arc::new(accessor));

    let overlay_config = match &args.overlay {
        Some(name) => config.overlays.iter().find(|overlay| &overlay.name == name),
        None => config.overlays.first(),
    }
    .cloned()
    .ok_or_else(|| TilesError::InvalidOverlay {
        name: args.overlay.clone().unwrap_or_default(),
        reason: "not found in the configuration".to_string(),
    })?;

    let overlay = RasterOverlay::new(overlay_config, externals);
    let provider = overlay.create_tile_provider()?;

    let &[west, south, east, north] = args.rectangle.as_slice() else {
        return Err(TilesError::InvalidOverlay {
            name: overlay.name().to_string(),
            reason: format!("expected four rectangle edges, got {}", args.rectangle.len()),
        });
    };
    let rectangle = GlobeRectangle::from_degrees(west, south, east, north);
    let mapped = provider.map_raster_tiles_to_geometry_tile(&rectangle, args.geometric_error, 0);
    info!("{} raster tiles of {} cover the rectangle", mapped.len(), overlay.name());

    let tiles = mapped
        .iter()
        .filter_map(|mapping| {
            let tile = mapping.loading_tile().or(mapping.ready_tile())?;
            Some((*mapping.texture_coordinate_rectangle(), tile))
        })
        .collect::<Vec<_>>();
    if args.load {
        // Loads postponed by the throttle are started here.
        for (_, tile) in &tiles {
            drop(provider.load_tile(tile.as_arc()));
        }
        while provider.number_of_tiles_loading() > 0 {
            if async_system.dispatch_main_thread_tasks() == 0 {
                thread::sleep(Duration::from_millis(1));
            }
        }
        debug!("{} bytes of imagery loaded", provider.tile_data_bytes());
    }

    let report = tiles
        .into_iter()
        .map(|(texture_coordinate_rectangle, tile)| {
            info!(
                "{}: texture coordinates {:?}, {:?}",
                tile.id(),
                texture_coordinate_rectangle,
                tile.state()
            );
            MappedRasterTile {
                tile_id: tile.id(),
                texture_coordinate_rectangle,
                state: tile.state(),
            }
        })
        .collect();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};
    use clap::Parser;
    use std::{env, fs, process};
    use tessera_tiles::RasterOverlayConfig;

    fn write_config(name: &str) -> std::path::PathBuf {
        let directory = env::temp_dir().join(format!("tessera_inspect_{name}_{}", process::id()));
        fs::create_dir_all(&directory).unwrap();

        let mut config = TilesConfig::default();
        config.add_overlay(RasterOverlayConfig {
            name: "imagery".to_string(),
            url_template: "tiles/{z}/{x}/{y}.png".to_string(),
            maximum_level: 2,
            ..Default::default()
        });
        let path = directory.join("tiles.ron");
        config.save_file(&path).unwrap();
        path
    }

    fn parse(arguments: &[&str]) -> MapCli {
        let Command::Map(args) = Cli::try_parse_from(arguments).unwrap().command else {
            panic!("expected the map command");
        };
        args
    }

    #[test]
    fn maps_both_root_tiles_over_the_prime_meridian() {
        let path = write_config("map");
        let args = parse(&[
            "tessera_inspect",
            "map",
            path.to_str().unwrap(),
            "-10",
            "-5",
            "10",
            "5",
            "--geometric-error",
            "1e9",
            "--load",
        ]);

        let mapped = map(&args, &AsyncSystem::new(1)).unwrap();
        fs::remove_dir_all(path.parent().unwrap()).unwrap();

        assert_eq!(mapped.len(), 2);
        assert!(mapped.iter().all(|tile| tile.tile_id.level == 0));
        assert_eq!(mapped[0].texture_coordinate_rectangle.minimum_x, 0.0);
        assert_eq!(mapped[1].texture_coordinate_rectangle.maximum_x, 1.0);
        // No imagery exists next to the configuration.
        assert!(mapped.iter().all(|tile| !tile.state.is_loaded()));
    }

    #[test]
    fn unknown_overlays_are_rejected() {
        let path = write_config("unknown");
        let args = parse(&[
            "tessera_inspect",
            "map",
            path.to_str().unwrap(),
            "0",
            "0",
            "1",
            "1",
            "--overlay",
            "terrain",
        ]);

        let result = map(&args, &AsyncSystem::new(1));
        fs::remove_dir_all(path.parent().unwrap()).unwrap();

        assert!(matches!(result, Err(TilesError::InvalidOverlay { name, .. }) if name == "terrain"));
    }
}
