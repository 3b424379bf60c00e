use serde::{Deserialize, Serialize};
use std::fmt;
use tessera_geometry::{OctreeTileId, QuadtreeTileId, UpsampledQuadtreeNode};

/// Identifies a tile within its tileset.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TileId {
    /// Explicit tiles are named by their content URL.
    Url(String),
    Quadtree(QuadtreeTileId),
    Octree(OctreeTileId),
    /// A child made up to carry finer raster overlays, its content is
    /// clipped from the parent.
    Upsampled(UpsampledQuadtreeNode),
}

impl TileId {
    /// The quadtree position of quadtree and upsampled tiles.
    pub fn quadtree_tile_id(&self) -> Option<QuadtreeTileId> {
        match self {
            Self::Quadtree(tile_id) => Some(*tile_id),
            Self::Upsampled(node) => Some(node.tile_id),
            Self::Url(_) | Self::Octree(_) => None,
        }
    }

    pub fn is_upsampled(&self) -> bool {
        matches!(self, Self::Upsampled(_))
    }
}

impl Default for TileId {
    fn default() -> Self {
        Self::Url(String::new())
    }
}

impl From<QuadtreeTileId> for TileId {
    fn from(tile_id: QuadtreeTileId) -> Self {
        Self::Quadtree(tile_id)
    }
}

impl From<OctreeTileId> for TileId {
    fn from(tile_id: OctreeTileId) -> Self {
        Self::Octree(tile_id)
    }
}

impl From<UpsampledQuadtreeNode> for TileId {
    fn from(node: UpsampledQuadtreeNode) -> Self {
        Self::Upsampled(node)
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::Quadtree(tile_id) => write!(f, "{tile_id}"),
            Self::Octree(tile_id) => write!(f, "{tile_id}"),
            Self::Upsampled(node) => write!(f, "upsampled {}", node.tile_id),
        }
    }
}
