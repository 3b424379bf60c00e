use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// The answer of an availability query.
    ///
    /// An empty set means nothing is known yet. [`Self::REACHABLE`] marks
    /// answers that were derived from loaded data, so a reachable tile
    /// without [`Self::TILE_AVAILABLE`] is known not to exist.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct TileAvailabilityFlags: u8 {
        const TILE_AVAILABLE = 1;
        const CONTENT_AVAILABLE = 1 << 1;
        const SUBTREE_AVAILABLE = 1 << 2;
        const SUBTREE_LOADED = 1 << 3;
        const REACHABLE = 1 << 4;
    }
}

/// A bitstream in which every bit has the same value.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConstantAvailability {
    pub constant: bool,
}

/// A bitstream stored in a range of one of the subtree's buffers.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubtreeBufferView {
    pub byte_offset: u32,
    pub byte_length: u32,
    pub buffer: u32,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AvailabilityView {
    Constant(ConstantAvailability),
    SubtreeBuffer(SubtreeBufferView),
}

impl AvailabilityView {
    pub const fn constant(constant: bool) -> Self {
        Self::Constant(ConstantAvailability { constant })
    }

    pub const fn buffer(byte_offset: u32, byte_length: u32, buffer: u32) -> Self {
        Self::SubtreeBuffer(SubtreeBufferView {
            byte_offset,
            byte_length,
            buffer,
        })
    }
}

impl From<ConstantAvailability> for AvailabilityView {
    fn from(constant: ConstantAvailability) -> Self {
        Self::Constant(constant)
    }
}

impl From<SubtreeBufferView> for AvailabilityView {
    fn from(view: SubtreeBufferView) -> Self {
        Self::SubtreeBuffer(view)
    }
}
