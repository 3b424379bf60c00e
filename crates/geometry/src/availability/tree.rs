use super::{AvailabilityAccessor, AvailabilitySubtree, ImplicitSubdivision, TileAvailabilityFlags};
use bevy_log::debug;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::{fmt, marker::PhantomData, sync::Arc};

/// A tile identifier that can be addressed inside availability bitstreams.
pub trait ImplicitTileId: Copy + fmt::Debug + fmt::Display {
    const SUBDIVISION: ImplicitSubdivision;

    fn level(&self) -> u32;

    /// The Morton index of the coordinates after masking them with `mask`
    /// and shifting them right by `shift`.
    fn relative_morton_index(&self, mask: u32, shift: u32) -> u64;
}

/// Keeps the bits of a coordinate below `levels`.
fn relative_mask(levels: u32) -> u32 {
    u32::MAX.checked_shl(levels).map_or(u32::MAX, |mask| !mask)
}

pub(crate) fn relative_coordinate(coordinate: u32, mask: u32, shift: u32) -> u32 {
    (coordinate & mask).checked_shr(shift).unwrap_or(0)
}

/// A subtree that has been grafted into an [`AvailabilityTree`], or a
/// placeholder for one that is known to exist but is not loaded yet.
#[derive(Debug, Default)]
pub struct AvailabilityNode {
    subtree: Option<AvailabilitySubtree>,
    child_nodes: Vec<Option<Box<AvailabilityNode>>>,
}

impl AvailabilityNode {
    fn loaded(subtree: AvailabilitySubtree, subtree_bits: u64) -> Self {
        let mut node = Self::default();
        node.set_loaded_subtree(subtree, subtree_bits);
        node
    }

    /// One child slot is allocated per available child subtree.
    fn set_loaded_subtree(&mut self, subtree: AvailabilitySubtree, subtree_bits: u64) {
        let slots = subtree.available_child_subtree_count(subtree_bits) as usize;
        self.child_nodes.resize_with(slots, || None);
        self.subtree = Some(subtree);
    }

    pub fn subtree(&self) -> Option<&AvailabilitySubtree> {
        self.subtree.as_ref()
    }

    pub fn child_nodes(&self) -> &[Option<Box<AvailabilityNode>>] {
        &self.child_nodes
    }
}

fn bit_is_set(accessor: Option<AvailabilityAccessor<'_>>, index: u64) -> bool {
    accessor.and_then(|accessor| accessor.is_bit_set(index)) == Some(true)
}

enum ChildSubtree {
    Available(usize),
    Unavailable,
    Malformed,
}

fn child_subtree(subtree: &AvailabilitySubtree, morton_index: u64) -> ChildSubtree {
    let Some(accessor) = subtree.subtree_accessor() else {
        return ChildSubtree::Malformed;
    };

    match accessor.is_bit_set(morton_index) {
        None => ChildSubtree::Malformed,
        Some(false) => ChildSubtree::Unavailable,
        Some(true) => usize::try_from(accessor.count_ones_before(morton_index))
            .map_or(ChildSubtree::Malformed, ChildSubtree::Available),
    }
}

/// The shape shared by all subtrees of one implicit tileset.
///
/// Also offers the operations that work relative to a known node, which
/// allows callers to hold on to a node while they graft below it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AvailabilityLayout<T> {
    subtree_levels: u32,
    maximum_level: u32,
    subtree_bits: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ImplicitTileId> AvailabilityLayout<T> {
    pub fn new(subtree_levels: u32, maximum_level: u32) -> Self {
        let subtree_bits = T::SUBDIVISION
            .subtree_availability_bit_count(subtree_levels)
            .filter(|_| subtree_levels > 0)
            .unwrap_or(0);

        Self {
            subtree_levels,
            maximum_level,
            subtree_bits,
            _marker: PhantomData,
        }
    }

    pub fn subtree_levels(&self) -> u32 {
        self.subtree_levels
    }

    pub fn maximum_level(&self) -> u32 {
        self.maximum_level
    }

    /// Bit length of the child subtree bitstream of every subtree.
    pub fn subtree_bits(&self) -> u64 {
        self.subtree_bits
    }

    fn is_valid(&self) -> bool {
        self.subtree_bits != 0
    }

    /// Flags for a tile at `relative_level` below the root of `subtree`.
    fn availability_within_subtree(
        &self,
        subtree: &AvailabilitySubtree,
        tile_id: T,
        relative_level: u32,
    ) -> TileAvailabilityFlags {
        let mut availability = TileAvailabilityFlags::REACHABLE;

        let morton_index = tile_id.relative_morton_index(relative_mask(relative_level), 0);
        let offset = T::SUBDIVISION
            .tile_availability_bit_count(relative_level)
            .unwrap_or(0);
        let index = morton_index + offset;

        if bit_is_set(subtree.tile_accessor(), index) {
            availability |= TileAvailabilityFlags::TILE_AVAILABLE;
        }

        if bit_is_set(subtree.content_accessor(), index) {
            availability |= TileAvailabilityFlags::CONTENT_AVAILABLE;
        }

        if relative_level == 0 {
            availability |=
                TileAvailabilityFlags::SUBTREE_AVAILABLE | TileAvailabilityFlags::SUBTREE_LOADED;
        }

        availability
    }

    /// The slot of the child subtree rooted at `tile_id`, which must lie
    /// directly below the subtree of its parent node.
    fn child_slot(&self, tile_id: T, parent: &AvailabilitySubtree) -> Option<usize> {
        if !self.is_valid() || tile_id.level() == 0 || tile_id.level() % self.subtree_levels != 0 {
            return None;
        }

        let morton_index = tile_id.relative_morton_index(relative_mask(self.subtree_levels), 0);
        match child_subtree(parent, morton_index) {
            ChildSubtree::Available(slot) => Some(slot),
            ChildSubtree::Unavailable | ChildSubtree::Malformed => None,
        }
    }

    /// Computes the availability of `tile_id` from the subtree of `node`
    /// alone, assuming the tile lies within that subtree.
    pub fn compute_availability_in_node(
        &self,
        tile_id: T,
        node: Option<&AvailabilityNode>,
    ) -> TileAvailabilityFlags {
        if !self.is_valid() {
            return TileAvailabilityFlags::empty();
        }

        let relative_level = tile_id.level() % self.subtree_levels;

        match node.and_then(AvailabilityNode::subtree) {
            Some(subtree) => self.availability_within_subtree(subtree, tile_id, relative_level),
            None if relative_level == 0 => {
                TileAvailabilityFlags::TILE_AVAILABLE | TileAvailabilityFlags::SUBTREE_AVAILABLE
            }
            None => TileAvailabilityFlags::empty(),
        }
    }

    /// Creates the empty node for the child subtree rooted at `tile_id`.
    ///
    /// Fails if the parent has no loaded subtree, if `tile_id` is not the
    /// root of one of its child subtrees, if that child is unavailable or
    /// if its node already exists.
    pub fn add_node<'a>(
        &self,
        tile_id: T,
        parent: &'a mut AvailabilityNode,
    ) -> Option<&'a mut AvailabilityNode> {
        let slot = self.child_slot(tile_id, parent.subtree.as_ref()?)?;
        let child = parent.child_nodes.get_mut(slot)?;
        if child.is_some() {
            debug!("availability node for {tile_id} already exists");
            return None;
        }

        let node: &mut AvailabilityNode = child.insert(Box::default());
        Some(node)
    }

    /// Attaches `subtree` to a node created by [`Self::add_node`].
    pub fn add_loaded_subtree(&self, node: &mut AvailabilityNode, subtree: AvailabilitySubtree) -> bool {
        if node.subtree.is_some() || !self.is_valid() {
            return false;
        }

        node.set_loaded_subtree(subtree, self.subtree_bits);
        true
    }

    pub fn find_child_node_index(&self, tile_id: T, parent: &AvailabilityNode) -> Option<usize> {
        self.child_slot(tile_id, parent.subtree.as_ref()?)
    }

    pub fn find_child_node<'a>(
        &self,
        tile_id: T,
        parent: &'a AvailabilityNode,
    ) -> Option<&'a AvailabilityNode> {
        let slot = self.find_child_node_index(tile_id, parent)?;
        parent.child_nodes.get(slot)?.as_deref()
    }

    pub fn find_child_node_mut<'a>(
        &self,
        tile_id: T,
        parent: &'a mut AvailabilityNode,
    ) -> Option<&'a mut AvailabilityNode> {
        let slot = self.find_child_node_index(tile_id, parent)?;
        parent.child_nodes.get_mut(slot)?.as_deref_mut()
    }
}

/// Availability of an implicit tileset, assembled from subtrees as they
/// are loaded.
///
/// Subtrees are only ever added. A slot that already holds a subtree is
/// never replaced.
#[derive(Debug)]
pub struct AvailabilityTree<T> {
    layout: AvailabilityLayout<T>,
    root: Option<Box<AvailabilityNode>>,
}

impl<T: ImplicitTileId> AvailabilityTree<T> {
    pub fn new(subtree_levels: u32, maximum_level: u32) -> Self {
        Self {
            layout: AvailabilityLayout::new(subtree_levels, maximum_level),
            root: None,
        }
    }

    pub fn layout(&self) -> AvailabilityLayout<T> {
        self.layout
    }

    pub fn subtree_levels(&self) -> u32 {
        self.layout.subtree_levels
    }

    pub fn maximum_level(&self) -> u32 {
        self.layout.maximum_level
    }

    pub fn root_node(&self) -> Option<&AvailabilityNode> {
        self.root.as_deref()
    }

    pub fn root_node_mut(&mut self) -> Option<&mut AvailabilityNode> {
        self.root.as_deref_mut()
    }

    /// Creates an empty root node, `None` if the root already exists.
    pub fn add_root_node(&mut self) -> Option<&mut AvailabilityNode> {
        if self.root.is_some() {
            return None;
        }

        let root: &mut AvailabilityNode = self.root.insert(Box::default());
        Some(root)
    }

    pub fn compute_availability(&self, tile_id: T) -> TileAvailabilityFlags {
        let layout = &self.layout;

        let Some(root) = self.root.as_deref() else {
            // The root tile and its subtree are implicitly available.
            if tile_id.level() == 0 {
                return TileAvailabilityFlags::TILE_AVAILABLE
                    | TileAvailabilityFlags::SUBTREE_AVAILABLE;
            }
            return TileAvailabilityFlags::empty();
        };

        if !layout.is_valid() || tile_id.level() > layout.maximum_level {
            return TileAvailabilityFlags::empty();
        }

        let mut level = 0;
        let mut node = Some(root);

        while let Some(subtree) = node.and_then(AvailabilityNode::subtree) {
            let levels_left = tile_id.level() - level;

            if levels_left < layout.subtree_levels {
                return layout.availability_within_subtree(subtree, tile_id, levels_left);
            }

            let morton_index = tile_id.relative_morton_index(
                relative_mask(levels_left),
                levels_left - layout.subtree_levels,
            );

            match child_subtree(subtree, morton_index) {
                ChildSubtree::Available(slot) => {
                    let Some(child) = node.and_then(|node| node.child_nodes.get(slot)) else {
                        return TileAvailabilityFlags::empty();
                    };
                    node = child.as_deref();
                    level += layout.subtree_levels;
                }
                // Known not to exist, as opposed to not known yet.
                ChildSubtree::Unavailable => return TileAvailabilityFlags::REACHABLE,
                ChildSubtree::Malformed => return TileAvailabilityFlags::empty(),
            }
        }

        // The subtree containing the tile exists but is not loaded. Only its
        // root tile is known to be available.
        if tile_id.level() == level {
            TileAvailabilityFlags::TILE_AVAILABLE | TileAvailabilityFlags::SUBTREE_AVAILABLE
        } else {
            TileAvailabilityFlags::empty()
        }
    }

    /// Grafts a loaded subtree rooted at `tile_id`.
    ///
    /// Returns `false` without changing anything if the root already exists,
    /// if `tile_id` does not start a subtree, if its parent subtree marks it
    /// unavailable, if the parent subtree is not loaded or if a subtree was
    /// added there before.
    pub fn add_subtree(&mut self, tile_id: T, subtree: AvailabilitySubtree) -> bool {
        let layout = self.layout;
        if !layout.is_valid() {
            return false;
        }

        if tile_id.level() == 0 {
            if self.root.is_some() {
                debug!("root availability subtree was already added");
                return false;
            }

            self.root = Some(Box::new(AvailabilityNode::loaded(subtree, layout.subtree_bits)));
            return true;
        }

        let Some(mut node) = self.root.as_deref_mut() else {
            return false;
        };
        let mut level = 0;

        loop {
            let Some(parent_subtree) = node.subtree.as_ref() else {
                return false;
            };

            let levels_left = tile_id.level() - level;
            if levels_left < layout.subtree_levels {
                debug!("availability subtree {tile_id} does not start at a subtree boundary");
                return false;
            }

            let levels_below_child = levels_left - layout.subtree_levels;
            let morton_index =
                tile_id.relative_morton_index(relative_mask(levels_left), levels_below_child);

            let ChildSubtree::Available(slot) = child_subtree(parent_subtree, morton_index) else {
                debug!("availability subtree {tile_id} is not marked as available");
                return false;
            };

            let Some(child) = node.child_nodes.get_mut(slot) else {
                return false;
            };

            if levels_below_child == 0 {
                if child.is_some() {
                    debug!("availability subtree {tile_id} was already added");
                    return false;
                }

                *child = Some(Box::new(AvailabilityNode::loaded(subtree, layout.subtree_bits)));
                return true;
            }

            match child.as_deref_mut() {
                Some(next) => {
                    node = next;
                    level += layout.subtree_levels;
                }
                None => return false,
            }
        }
    }
}

/// An [`AvailabilityTree`] that can be queried from many threads while
/// subtrees are grafted in.
pub struct SharedAvailability<T>(Arc<RwLock<AvailabilityTree<T>>>);

impl<T> Clone for SharedAvailability<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: ImplicitTileId> SharedAvailability<T> {
    pub fn new(tree: AvailabilityTree<T>) -> Self {
        Self(Arc::new(RwLock::new(tree)))
    }

    pub fn compute_availability(&self, tile_id: T) -> TileAvailabilityFlags {
        self.0.read().compute_availability(tile_id)
    }

    pub fn add_subtree(&self, tile_id: T, subtree: AvailabilitySubtree) -> bool {
        self.0.write().add_subtree(tile_id, subtree)
    }

    pub fn read(&self) -> RwLockReadGuard<'_, AvailabilityTree<T>> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, AvailabilityTree<T>> {
        self.0.write()
    }
}
