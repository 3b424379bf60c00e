use crate::{FileAssetAccessor, RasterOverlay, TilesConfig, TilesExternals};
use bevy_app::prelude::*;
use bevy_ecs::prelude::*;
use bevy_log::{error, trace};
use std::{ops::Deref, path::PathBuf, sync::Arc};
use tessera_async::AsyncSystem;

/// The async system main thread continuations are dispatched from, once
/// per [`Update`].
#[derive(Resource, Clone)]
pub struct TesseraAsyncSystem(pub AsyncSystem);

impl Deref for TesseraAsyncSystem {
    type Target = AsyncSystem;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// The configured raster overlays, in texture coordinate id order.
#[derive(Resource)]
pub struct RasterOverlays(pub Vec<RasterOverlay>);

/// The plugin running raster overlays inside a bevy app.
///
/// Overlays from `config` read their tiles from files below `asset_root`.
pub struct TesseraPlugin {
    pub config: TilesConfig,
    pub asset_root: PathBuf,
}

impl Plugin for TesseraPlugin {
    fn build(&self, app: &mut App) {
        let async_system = self
            .config
            .worker_threads
            .map_or_else(AsyncSystem::default, AsyncSystem::new);
        let accessor = FileAssetAccessor::new(self.asset_root.clone(), async_system.clone());
        let externals = TilesExternals::new(async_system.clone(), Arc::new(accessor));

        let overlays = self
            .config
            .overlays
            .iter()
            .map(|config| {
                let overlay = RasterOverlay::new(config.clone(), externals.clone());
                if let Err(error) = overlay.create_tile_provider() {
                    error!("{error}");
                }
                overlay
            })
            .collect();

        app.insert_resource(TesseraAsyncSystem(async_system))
            .insert_resource(RasterOverlays(overlays))
            .add_systems(Update, dispatch_main_thread_tasks)
            .add_systems(PostUpdate, collect_unreferenced_raster_tiles);
    }
}

fn dispatch_main_thread_tasks(async_system: Res<TesseraAsyncSystem>) {
    let dispatched = async_system.dispatch_main_thread_tasks();
    if dispatched > 0 {
        trace!("Dispatched {dispatched} main thread tasks");
    }
}

fn collect_unreferenced_raster_tiles(overlays: Res<RasterOverlays>) {
    for overlay in &overlays.0 {
        overlay.tile_provider().collect_unreferenced_tiles();
    }
}
