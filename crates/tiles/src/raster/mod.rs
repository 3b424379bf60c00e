//! Raster overlays: imagery draped over geometry tiles.
//!
//! # Explanation
//! A [`RasterOverlay`] is served by a [`RasterOverlayTileProvider`], which
//! owns the [`RasterOverlayTile`]s of the overlay and knows a concrete
//! imagery source through [`RasterOverlayTileSource`]. The only source
//! shipped here is the [`QuadtreeRasterOverlayTileProvider`], which
//! composites quadtree images fetched by a [`QuadtreeTileLoader`] such as
//! the [`UrlTemplateTileLoader`].
//!
//! Geometry tiles hold one [`RasterMappedTo3DTile`] per raster tile they
//! are draped with. The mapping keeps the raster tile referenced, swaps in
//! the closest loaded ancestor while it loads and attaches the result to
//! the renderer.

mod composite;
mod mapped;
mod overlay;
mod provider;
mod quadtree;
mod tile;
mod url_template;

pub use self::{
    composite::LoadedQuadtreeImage,
    mapped::{AttachmentState, MoreDetailAvailable, RasterMappedTo3DTile, compute_translation_and_scale},
    overlay::{RasterOverlay, create_tile_provider},
    provider::{LoadedRasterOverlayImage, RasterOverlayTileProvider, RasterOverlayTileSource},
    quadtree::{QuadtreeRasterOverlayTileProvider, QuadtreeTileLoader},
    tile::{RasterOverlayTile, RasterTileLoadState, RasterTileRef},
    url_template::UrlTemplateTileLoader,
};
