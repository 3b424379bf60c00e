//! Availability of implicitly tiled quadtrees and octrees.
//!
//! # Explanation
//! An implicit tileset is too large to describe tile by tile. Instead it is
//! cut into subtrees of a fixed number of levels, and every subtree carries
//! three bitstreams: which of its tiles exist, which of them have content and
//! which of the subtrees directly below its bottom level exist.
//!
//! Each bitstream is either a [`ConstantAvailability`] or a
//! [`SubtreeBufferView`] into one of the subtree's buffers. Bits are read
//! least significant first, tiles are ordered level by level and in Morton
//! order within a level.
//!
//! Subtrees are grafted into an [`AvailabilityTree`] as they are downloaded.
//! Queries below a subtree that is known to exist but is not loaded yet
//! return no information rather than a negative answer.

mod accessor;
mod octree;
mod quadtree;
mod rectangle_availability;
mod subtree;
mod tree;
mod utilities;
mod view;

pub use self::{
    accessor::AvailabilityAccessor,
    octree::{OctreeAvailability, SharedOctreeAvailability},
    quadtree::{QuadtreeAvailability, SharedQuadtreeAvailability},
    rectangle_availability::{QuadtreeRectangleAvailability, QuadtreeTileRectangularRange},
    subtree::{AvailabilitySubtree, SubtreeError, SubtreeLayout},
    tree::{AvailabilityLayout, AvailabilityNode, AvailabilityTree, ImplicitTileId, SharedAvailability},
    utilities::{
        ImplicitSubdivision, count_ones_in_buffer, count_ones_in_byte,
    },
    view::{AvailabilityView, ConstantAvailability, SubtreeBufferView, TileAvailabilityFlags},
};
