//! Spatial primitives shared by every part of tessera: tile identifiers,
//! projected rectangles, quadtree tiling schemes and the implicit tiling
//! availability engine.

pub mod availability;
pub mod clip;
pub mod morton;
pub mod rectangle;
pub mod tile_id;
pub mod tiling_scheme;

pub use self::{
    rectangle::Rectangle,
    tile_id::{OctreeTileId, ParseTileIdError, QuadtreeTileId, UpsampledQuadtreeNode},
    tiling_scheme::QuadtreeTilingScheme,
};

#[doc(hidden)]
pub mod prelude {
    pub use crate::{
        availability::{
            AvailabilitySubtree, AvailabilityView, ConstantAvailability, OctreeAvailability,
            QuadtreeAvailability, QuadtreeRectangleAvailability, SharedQuadtreeAvailability,
            SubtreeBufferView, TileAvailabilityFlags,
        },
        clip::{InterpolatedVertex, TriangleClipVertex, clip_triangle_at_axis_aligned_threshold},
        rectangle::Rectangle,
        tile_id::{OctreeTileId, QuadtreeTileId, UpsampledQuadtreeNode},
        tiling_scheme::QuadtreeTilingScheme,
    };
}
