//! Streams raster overlays onto 3D Tiles geometry.
//!
//! # Explanation
//!
//! Geometry tiles live in a [`TileArena`]. When a tile's content loads, it
//! gets one set of overlay texture coordinates per [`RasterOverlay`] and is
//! mapped to the raster tiles covering it, which load on the worker threads
//! of the [`tessera_async::AsyncSystem`] carried by [`TilesExternals`].
//! Results are published back on the main thread, which runs
//! [`tessera_async::AsyncSystem::dispatch_main_thread_tasks`] once per frame
//! (the [`TesseraPlugin`] does this inside a bevy app).
//!
//! Fetching bytes, decoding images and creating renderer resources are left
//! to the [`AssetAccessor`], [`ImageDecoder`] and
//! [`PrepareRendererResources`] implementations passed in.

mod config;
mod content;
mod credit;
mod error;
mod externals;
mod image_asset;
mod plugin;
mod raster;
mod tile;

pub use self::{
    config::{RasterOverlayConfig, RasterOverlayOptions, TilesConfig},
    content::{
        OVERLAY_ATTRIBUTE_PREFIX, create_raster_overlay_texture_coordinates, overlay_attribute_name,
        upsample_for_raster_overlays,
    },
    credit::Credit,
    error::{TilesError, TilesResult},
    externals::{
        AssetAccessor, AssetResponse, FileAssetAccessor, PrepareRendererResources, RendererResources,
        TilesExternals,
    },
    image_asset::{ImageAsset, ImageCrateDecoder, ImageDecoder, ImageReaderResult, PixelRectangle, blit_image},
    plugin::{RasterOverlays, TesseraAsyncSystem, TesseraPlugin},
    raster::{
        AttachmentState, LoadedQuadtreeImage, LoadedRasterOverlayImage, MoreDetailAvailable,
        QuadtreeRasterOverlayTileProvider, QuadtreeTileLoader, RasterMappedTo3DTile, RasterOverlay,
        RasterOverlayTile, RasterOverlayTileProvider, RasterOverlayTileSource, RasterTileLoadState,
        RasterTileRef, UrlTemplateTileLoader, compute_translation_and_scale, create_tile_provider,
    },
    tile::{BoundingVolume, ImplicitTiling, LoadedTileList, Tile, TileArena, TileHandle, TileId, TileLoadState},
};

#[doc(hidden)]
pub mod prelude {
    pub use crate::{
        AssetAccessor, ImageDecoder, PrepareRendererResources, RasterOverlay, RasterOverlayConfig,
        RasterOverlayTileProvider, TesseraPlugin, Tile, TileArena, TileId, TilesConfig, TilesError,
        TilesExternals,
    };
}
