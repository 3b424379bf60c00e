use serde::{Deserialize, Serialize};

pub fn count_ones_in_byte(byte: u8) -> u32 {
    byte.count_ones()
}

pub fn count_ones_in_buffer(buffer: &[u8]) -> u32 {
    buffer.iter().map(|&byte| count_ones_in_byte(byte)).sum()
}

/// How many children a tile of an implicit tileset has.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImplicitSubdivision {
    Quadtree,
    Octree,
}

impl ImplicitSubdivision {
    /// Log2 of the number of children per tile.
    pub const fn branching_shift(self) -> u32 {
        match self {
            Self::Quadtree => 2,
            Self::Octree => 3,
        }
    }

    /// Number of tiles in the first `levels` levels of a subtree, which is
    /// also the bit length of its tile and content bitstreams.
    ///
    /// `(4^levels - 1) / 3` for quadtrees and `(8^levels - 1) / 7` for octrees.
    /// Returns `None` if the count does not fit into a `u64`.
    pub const fn tile_availability_bit_count(self, levels: u32) -> Option<u64> {
        let children = 1u64 << self.branching_shift();
        match self.subtree_availability_bit_count(levels) {
            Some(tiles_below) => Some((tiles_below - 1) / (children - 1)),
            None => None,
        }
    }

    /// Bit length of the child subtree bitstream of a subtree with `levels`
    /// levels.
    pub const fn subtree_availability_bit_count(self, levels: u32) -> Option<u64> {
        match self.branching_shift().checked_mul(levels) {
            Some(shift) if shift < 64 => Some(1u64 << shift),
            _ => None,
        }
    }
}

/// Bytes needed to hold `bits` bits.
pub(crate) const fn byte_count(bits: u64) -> u64 {
    bits.div_ceil(8)
}
