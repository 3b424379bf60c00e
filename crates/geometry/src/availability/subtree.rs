use super::{AvailabilityAccessor, AvailabilityView, ImplicitSubdivision, utilities::byte_count};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SubtreeError {
    #[error("a subtree needs at least one level")]
    NoLevels,
    #[error("{0} levels per subtree do not fit into the availability index range")]
    TooManyLevels(u32),
    #[error("subtree data is {found} bytes long, expected {expected}")]
    LengthMismatch { expected: u64, found: usize },
}

/// The availability of the tiles, contents and child subtrees of one subtree.
///
/// Never changes once it was parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AvailabilitySubtree {
    pub tile_availability: AvailabilityView,
    pub content_availability: AvailabilityView,
    pub subtree_availability: AvailabilityView,
    pub buffers: Vec<Vec<u8>>,
}

/// Which sections of a persisted subtree are replaced by constants.
///
/// A persisted subtree has no header. It consists of the tile bits, the
/// content bits and the child subtree bits, in that order, every section
/// padded to whole bytes. Sections with a constant value are left out.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubtreeLayout {
    pub tile_constant: Option<bool>,
    pub content_constant: Option<bool>,
    pub subtree_constant: Option<bool>,
}

impl AvailabilitySubtree {
    /// A subtree without any bitstream data.
    pub fn constant(tile: bool, content: bool, subtree: bool) -> Self {
        Self {
            tile_availability: AvailabilityView::constant(tile),
            content_availability: AvailabilityView::constant(content),
            subtree_availability: AvailabilityView::constant(subtree),
            buffers: Vec::new(),
        }
    }

    /// Parses the persisted form of a subtree spanning `subtree_levels` levels.
    pub fn from_bytes(
        bytes: Vec<u8>,
        subdivision: ImplicitSubdivision,
        subtree_levels: u32,
        layout: SubtreeLayout,
    ) -> Result<Self, SubtreeError> {
        if subtree_levels == 0 {
            return Err(SubtreeError::NoLevels);
        }

        let too_many_levels = || SubtreeError::TooManyLevels(subtree_levels);
        let tile_bytes = subdivision
            .tile_availability_bit_count(subtree_levels)
            .map(byte_count)
            .ok_or_else(too_many_levels)?;
        let subtree_bytes = subdivision
            .subtree_availability_bit_count(subtree_levels)
            .map(byte_count)
            .ok_or_else(too_many_levels)?;

        let mut offset = 0u64;
        let mut section = |constant: Option<bool>, length: u64| match constant {
            Some(constant) => AvailabilityView::constant(constant),
            None => {
                let view = AvailabilityView::buffer(offset as u32, length as u32, 0);
                offset += length;
                view
            }
        };

        let tile_availability = section(layout.tile_constant, tile_bytes);
        let content_availability = section(layout.content_constant, tile_bytes);
        let subtree_availability = section(layout.subtree_constant, subtree_bytes);

        if offset > u32::MAX as u64 {
            return Err(too_many_levels());
        }

        if offset != bytes.len() as u64 {
            return Err(SubtreeError::LengthMismatch {
                expected: offset,
                found: bytes.len(),
            });
        }

        let buffers = if bytes.is_empty() { Vec::new() } else { vec![bytes] };

        Ok(Self {
            tile_availability,
            content_availability,
            subtree_availability,
            buffers,
        })
    }

    pub fn tile_accessor(&self) -> Option<AvailabilityAccessor<'_>> {
        AvailabilityAccessor::new(&self.tile_availability, self)
    }

    pub fn content_accessor(&self) -> Option<AvailabilityAccessor<'_>> {
        AvailabilityAccessor::new(&self.content_availability, self)
    }

    pub fn subtree_accessor(&self) -> Option<AvailabilityAccessor<'_>> {
        AvailabilityAccessor::new(&self.subtree_availability, self)
    }

    /// The number of child subtrees this subtree marks as available.
    ///
    /// A constant bitstream counts all `subtree_bits` or none of them.
    /// Returns zero for a malformed buffer view.
    pub(crate) fn available_child_subtree_count(&self, subtree_bits: u64) -> u64 {
        match self.subtree_accessor() {
            Some(accessor) => accessor.count_ones_before(subtree_bits),
            None => 0,
        }
    }
}
