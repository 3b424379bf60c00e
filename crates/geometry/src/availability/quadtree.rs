use super::{
    ImplicitSubdivision,
    tree::{AvailabilityTree, ImplicitTileId, SharedAvailability, relative_coordinate},
};
use crate::{QuadtreeTileId, morton::morton_index_2d};

pub type QuadtreeAvailability = AvailabilityTree<QuadtreeTileId>;

/// A [`QuadtreeAvailability`] behind a read-write lock.
pub type SharedQuadtreeAvailability = SharedAvailability<QuadtreeTileId>;

impl ImplicitTileId for QuadtreeTileId {
    const SUBDIVISION: ImplicitSubdivision = ImplicitSubdivision::Quadtree;

    fn level(&self) -> u32 {
        self.level
    }

    fn relative_morton_index(&self, mask: u32, shift: u32) -> u64 {
        morton_index_2d(
            relative_coordinate(self.x, mask, shift),
            relative_coordinate(self.y, mask, shift),
        )
    }
}
