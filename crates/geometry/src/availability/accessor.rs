use super::{AvailabilitySubtree, AvailabilityView, count_ones_in_buffer, count_ones_in_byte};

/// Reads the bits of one [`AvailabilityView`] of a subtree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AvailabilityAccessor<'a> {
    Constant(bool),
    Buffer(&'a [u8]),
}

impl<'a> AvailabilityAccessor<'a> {
    /// Returns `None` when the view points outside of the subtree's buffers.
    pub fn new(view: &AvailabilityView, subtree: &'a AvailabilitySubtree) -> Option<Self> {
        match view {
            AvailabilityView::Constant(constant) => Some(Self::Constant(constant.constant)),
            AvailabilityView::SubtreeBuffer(view) => {
                let buffer = subtree.buffers.get(view.buffer as usize)?;
                let start = view.byte_offset as usize;
                let end = start.checked_add(view.byte_length as usize)?;
                buffer.get(start..end).map(Self::Buffer)
            }
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Self::Constant(_))
    }

    pub fn is_buffer_view(&self) -> bool {
        matches!(self, Self::Buffer(_))
    }

    pub fn constant(&self) -> Option<bool> {
        match self {
            Self::Constant(constant) => Some(*constant),
            Self::Buffer(_) => None,
        }
    }

    /// Byte length of the viewed bitstream, zero for constants.
    pub fn len(&self) -> usize {
        match self {
            Self::Constant(_) => 0,
            Self::Buffer(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn byte(&self, index: usize) -> Option<u8> {
        match self {
            Self::Constant(_) => None,
            Self::Buffer(bytes) => bytes.get(index).copied(),
        }
    }

    /// The bit at `index`, `None` if it lies past the end of the bitstream.
    pub fn is_bit_set(&self, index: u64) -> Option<bool> {
        match self {
            Self::Constant(constant) => Some(*constant),
            Self::Buffer(bytes) => {
                let byte = *bytes.get(usize::try_from(index >> 3).ok()?)?;
                Some(byte & (1 << (index & 7)) != 0)
            }
        }
    }

    /// The number of set bits strictly before `index`.
    ///
    /// This is the slot of an available child subtree in its parent node.
    pub fn count_ones_before(&self, index: u64) -> u64 {
        match self {
            Self::Constant(true) => index,
            Self::Constant(false) => 0,
            Self::Buffer(bytes) => {
                let byte_index = usize::try_from(index >> 3).unwrap_or(usize::MAX);
                if byte_index >= bytes.len() {
                    return count_ones_in_buffer(bytes) as u64;
                }

                let bit_index = (index & 7) as u32;
                let partial = bytes[byte_index] & ((1u16 << bit_index) - 1) as u8;
                count_ones_in_buffer(&bytes[..byte_index]) as u64
                    + count_ones_in_byte(partial) as u64
            }
        }
    }
}
