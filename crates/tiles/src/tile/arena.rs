use crate::{BoundingVolume, LoadedTileList, RasterOverlay, Tile, TileId, TileLoadState, upsample_for_raster_overlays};
use bevy_log::{debug, trace};
use slab::Slab;
use tessera_geometry::{QuadtreeTilingScheme, UpsampledQuadtreeNode};
use tessera_geospatial::{BoundingRegion, Projection, unproject_rectangle_simple};

/// Index of a [`Tile`] inside its [`TileArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileHandle(pub(crate) usize);

impl TileHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// The quadtree geometry tiles are laid out on, needed to subdivide tiles
/// for finer raster overlays.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImplicitTiling {
    pub tiling_scheme: QuadtreeTilingScheme,
    pub projection: Projection,
}

/// Owns every tile of a tileset.
///
/// # Explanation
///
/// Tiles refer to each other through [`TileHandle`]s, so the hierarchy has a
/// single owner and no reference cycles. Tiles with loaded content are kept
/// in a [`LoadedTileList`] ordered from least to most recently used, which
/// [`TileArena::unload_cached_tiles`] walks to stay within a memory budget.
pub struct TileArena {
    tiles: Slab<Tile>,
    loaded: LoadedTileList,
    implicit_tiling: Option<ImplicitTiling>,
}

impl Default for TileArena {
    fn default() -> Self {
        Self {
            tiles: Slab::with_capacity(32),
            loaded: LoadedTileList::default(),
            implicit_tiling: None,
        }
    }
}

impl TileArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_implicit_tiling(mut self, implicit_tiling: ImplicitTiling) -> Self {
        self.implicit_tiling = Some(implicit_tiling);
        self
    }

    pub fn implicit_tiling(&self) -> Option<&ImplicitTiling> {
        self.implicit_tiling.as_ref()
    }

    pub fn insert_root(&mut self, tile: Tile) -> TileHandle {
        TileHandle(self.tiles.insert(tile))
    }

    pub fn add_child(&mut self, parent: TileHandle, mut tile: Tile) -> Option<TileHandle> {
        if !self.tiles.contains(parent.0) {
            return None;
        }

        tile.parent = Some(parent);
        let child = TileHandle(self.tiles.insert(tile));
        self.tiles[parent.0].children.push(child);
        Some(child)
    }

    pub fn get(&self, handle: TileHandle) -> Option<&Tile> {
        self.tiles.get(handle.0)
    }

    pub fn get_mut(&mut self, handle: TileHandle) -> Option<&mut Tile> {
        self.tiles.get_mut(handle.0)
    }

    pub fn contains(&self, handle: TileHandle) -> bool {
        self.tiles.contains(handle.0)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TileHandle, &Tile)> {
        self.tiles.iter().map(|(index, tile)| (TileHandle(index), tile))
    }

    pub fn loaded_tiles(&self) -> &LoadedTileList {
        &self.loaded
    }

    /// Removes a tile and all of its descendants, returning how many tiles
    /// were removed.
    pub fn remove_subtree(&mut self, handle: TileHandle) -> usize {
        let Some(parent) = self.tiles.get(handle.0).map(Tile::parent) else {
            return 0;
        };
        if let Some(parent) = parent.and_then(|parent| self.tiles.get_mut(parent.0)) {
            parent.children.retain(|&child| child != handle);
        }

        let mut stack = vec![handle];
        let mut removed = 0;
        while let Some(handle) = stack.pop() {
            let Some(mut tile) = self.tiles.try_remove(handle.0) else {
                continue;
            };
            stack.extend(tile.children.iter().copied());
            if !tile.unload_content() {
                tile.set_state(TileLoadState::Destroying);
            }
            self.loaded.remove(handle);
            removed += 1;
        }

        trace!("Removed {removed} tiles");
        removed
    }

    /// Starts loading a tile and records it as most recently used.
    pub fn begin_content_load(&mut self, handle: TileHandle, overlays: &[RasterOverlay]) -> bool {
        let Some(tile) = self.tiles.get_mut(handle.0) else {
            return false;
        };
        if !tile.begin_content_load(overlays) {
            return false;
        }

        self.loaded.insert_at_tail(handle);
        true
    }

    /// Marks a tile as used this frame.
    pub fn mark_used(&mut self, handle: TileHandle) {
        if self.loaded.contains(handle) {
            self.loaded.insert_at_tail(handle);
        }
    }

    /// Updates a tile, giving it upsampled children when its overlays have
    /// finer imagery than the tile can show.
    pub fn update_tile(&mut self, handle: TileHandle, overlays: &[RasterOverlay]) -> bool {
        let Some(tile) = self.tiles.get_mut(handle.0) else {
            return false;
        };

        let more_detail = tile.update(overlays);
        if more_detail && tile.children().is_empty() {
            self.create_quadtree_subdivided_children(handle);
        }
        more_detail
    }

    /// Gives a childless quadtree tile four upsampled children, in the
    /// order south west, south east, north west, north east.
    ///
    /// The children get half the parent's geometric error and a loose region
    /// spanning their quadrant at the parent's heights.
    pub fn create_quadtree_subdivided_children(&mut self, handle: TileHandle) -> bool {
        let Some(implicit_tiling) = self.implicit_tiling else {
            debug!("Tiles cannot be subdivided without implicit tiling");
            return false;
        };
        let Some(parent) = self.tiles.get(handle.0) else {
            return false;
        };
        if !parent.children().is_empty() {
            return false;
        }
        let (Some(tile_id), Some(region)) = (parent.id().quadtree_tile_id(), parent.bounding_volume().region()) else {
            return false;
        };

        let geometric_error = parent.geometric_error() * 0.5;
        let transform = parent.transform();
        let (minimum_height, maximum_height) = (region.minimum_height, region.maximum_height);

        for child_id in tile_id.children() {
            let projected = implicit_tiling.tiling_scheme.tile_to_rectangle(child_id);
            let rectangle = unproject_rectangle_simple(&implicit_tiling.projection, &projected);
            let volume = BoundingVolume::LooseRegion(BoundingRegion::new(rectangle, minimum_height, maximum_height));
            let child = Tile::new(UpsampledQuadtreeNode { tile_id: child_id }, volume, geometric_error)
                .with_transform(transform);
            self.add_child(handle, child);
        }
        true
    }

    /// Loads an upsampled tile's content by clipping its parent's content to
    /// the tile's quadrant.
    pub fn upsample_parent(&mut self, handle: TileHandle, overlays: &[RasterOverlay]) -> bool {
        let Some(tile) = self.tiles.get(handle.0) else {
            return false;
        };
        let TileId::Upsampled(node) = *tile.id() else {
            return false;
        };
        let Some(parent) = tile.parent().and_then(|parent| self.tiles.get(parent.0)) else {
            return false;
        };
        if parent.state() != TileLoadState::Done {
            return false;
        }

        let content = parent
            .content()
            .map(|model| upsample_for_raster_overlays(model, node, 0));

        if !self.begin_content_load(handle, overlays) {
            return false;
        }
        if let Some(tile) = self.tiles.get_mut(handle.0) {
            tile.finish_content_load(content, overlays);
        }
        true
    }

    /// Unloads a tile's content. Tiles whose upsampled children are still
    /// being made from their content are kept.
    pub fn unload_content(&mut self, handle: TileHandle) -> bool {
        let Some(tile) = self.tiles.get(handle.0) else {
            return false;
        };

        let upsampling = tile.children().iter().any(|&child| {
            self.tiles.get(child.0).is_some_and(|child| {
                child.id().is_upsampled() && child.state() == TileLoadState::ContentLoading
            })
        });
        if upsampling {
            return false;
        }

        let unloaded = self.tiles.get_mut(handle.0).is_some_and(Tile::unload_content);
        if unloaded {
            self.loaded.remove(handle);
        }
        unloaded
    }

    /// Bytes held by the content of every loaded tile.
    pub fn total_data_bytes(&self) -> usize {
        self.loaded
            .iter()
            .filter_map(|handle| self.tiles.get(handle.0))
            .map(Tile::compute_byte_size)
            .sum()
    }

    /// Unloads least recently used tiles until the loaded content fits in
    /// `maximum_bytes`. Tiles in `keep` stay loaded. Returns the number of
    /// tiles unloaded.
    pub fn unload_cached_tiles(&mut self, maximum_bytes: usize, keep: &[TileHandle]) -> usize {
        let mut bytes = self.total_data_bytes();
        let mut unloaded = 0;
        let mut cursor = self.loaded.head();

        while bytes > maximum_bytes {
            let Some(handle) = cursor else {
                break;
            };
            cursor = self.loaded.next(handle);
            if keep.contains(&handle) {
                continue;
            }

            let size = self.tiles.get(handle.0).map_or(0, Tile::compute_byte_size);
            if self.unload_content(handle) {
                bytes = bytes.saturating_sub(size);
                unloaded += 1;
            }
        }

        if unloaded > 0 {
            debug!("Unloaded {unloaded} cached tiles, {bytes} bytes remain");
        }
        unloaded
    }
}
