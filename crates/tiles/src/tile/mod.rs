//! The tile hierarchy and the content each tile carries.
//!
//! # Explanation
//!
//! Tiles live in a [`TileArena`] and refer to each other by [`TileHandle`].
//! A tile's load state moves from [`TileLoadState::Unloaded`] through
//! [`TileLoadState::ContentLoading`] and [`TileLoadState::ContentLoaded`] to
//! [`TileLoadState::Done`], at which point its raster overlays are attached.
//! When an overlay has finer imagery than a tile can show, the arena gives
//! the tile upsampled children whose content is clipped from it.

mod arena;
mod list;
#[allow(clippy::module_inception)]
mod tile;
mod tile_id;

pub use self::{
    arena::{ImplicitTiling, TileArena, TileHandle},
    list::LoadedTileList,
    tile::{BoundingVolume, Tile, TileLoadState},
    tile_id::TileId,
};
