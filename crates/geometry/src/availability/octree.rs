use super::{
    ImplicitSubdivision,
    tree::{AvailabilityTree, ImplicitTileId, SharedAvailability, relative_coordinate},
};
use crate::{OctreeTileId, morton::morton_index_3d};

pub type OctreeAvailability = AvailabilityTree<OctreeTileId>;

pub type SharedOctreeAvailability = SharedAvailability<OctreeTileId>;

impl ImplicitTileId for OctreeTileId {
    const SUBDIVISION: ImplicitSubdivision = ImplicitSubdivision::Octree;

    fn level(&self) -> u32 {
        self.level
    }

    fn relative_morton_index(&self, mask: u32, shift: u32) -> u64 {
        morton_index_3d(
            relative_coordinate(self.x, mask, shift),
            relative_coordinate(self.y, mask, shift),
            relative_coordinate(self.z, mask, shift),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::{AvailabilitySubtree, AvailabilityView, TileAvailabilityFlags};

    const UNAVAILABLE_CONTENT: [OctreeTileId; 4] = [
        OctreeTileId::new(2, 1, 1, 0),
        OctreeTileId::new(2, 0, 0, 1),
        OctreeTileId::new(2, 1, 0, 1),
        OctreeTileId::new(2, 0, 1, 1),
    ];

    const UNAVAILABLE_SUBTREES: [OctreeTileId; 4] = [
        OctreeTileId::new(3, 2, 0, 3),
        OctreeTileId::new(3, 3, 0, 3),
        OctreeTileId::new(3, 2, 1, 3),
        OctreeTileId::new(3, 3, 1, 3),
    ];

    const LOADED_CHILDREN: [OctreeTileId; 4] = [
        OctreeTileId::new(3, 0, 0, 0),
        OctreeTileId::new(3, 0, 1, 0),
        OctreeTileId::new(3, 0, 2, 0),
        OctreeTileId::new(3, 1, 2, 1),
    ];

    /// Three levels. The 73 content bits need 10 bytes, bits 12 to 15 are
    /// cleared. The 512 child subtree bits have bits 44 to 47 cleared.
    fn availability() -> OctreeAvailability {
        let mut content = vec![0u8; 16];
        content[..9].fill(0xFF);
        content[9] = 0x01;
        content[1] = 0x0F;

        let mut subtrees = vec![0xFFu8; 64];
        subtrees[5] = 0x0F;

        let subtree = AvailabilitySubtree {
            tile_availability: AvailabilityView::constant(true),
            content_availability: AvailabilityView::buffer(0, 16, 0),
            subtree_availability: AvailabilityView::buffer(0, 64, 1),
            buffers: vec![content, subtrees],
        };

        let mut availability = OctreeAvailability::new(3, 5);
        assert!(availability.add_subtree(OctreeTileId::new(0, 0, 0, 0), subtree));
        availability
    }

    fn level_three_tiles() -> impl Iterator<Item = OctreeTileId> {
        (0..8).flat_map(|z| {
            (0..8).flat_map(move |y| (0..8).map(move |x| OctreeTileId::new(3, x, y, z)))
        })
    }

    #[test]
    fn tile_and_content_availability() {
        let availability = availability();
        let layout = availability.layout();
        let root = availability.root_node();

        for level in 0..3u32 {
            let size = 1 << level;
            for z in 0..size {
                for y in 0..size {
                    for x in 0..size {
                        let id = OctreeTileId::new(level, x, y, z);
                        let flags = availability.compute_availability(id);
                        assert_eq!(flags, layout.compute_availability_in_node(id, root));
                        assert!(flags.contains(TileAvailabilityFlags::TILE_AVAILABLE));
                        assert_eq!(
                            flags.contains(TileAvailabilityFlags::CONTENT_AVAILABLE),
                            !UNAVAILABLE_CONTENT.contains(&id),
                            "{id}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn child_subtree_availability() {
        let availability = availability();
        let layout = availability.layout();
        let root = availability.root_node().unwrap();

        for id in level_three_tiles() {
            let should_be_available = !UNAVAILABLE_SUBTREES.contains(&id);
            let flags = availability.compute_availability(id);
            assert_eq!(
                flags.contains(TileAvailabilityFlags::SUBTREE_AVAILABLE),
                should_be_available,
                "{id}"
            );
            assert_eq!(layout.find_child_node_index(id, root).is_some(), should_be_available);
        }
    }

    fn assert_children_loaded(availability: &OctreeAvailability) {
        let layout = availability.layout();
        let root = availability.root_node().unwrap();

        for id in level_three_tiles() {
            let should_be_loaded = LOADED_CHILDREN.contains(&id);
            assert_eq!(
                availability
                    .compute_availability(id)
                    .contains(TileAvailabilityFlags::SUBTREE_LOADED),
                should_be_loaded,
                "{id}"
            );
            assert_eq!(layout.find_child_node(id, root).is_some(), should_be_loaded);
        }
    }

    #[test]
    fn add_child_subtrees() {
        let mut availability = availability();
        for id in LOADED_CHILDREN {
            assert!(availability.add_subtree(id, AvailabilitySubtree::constant(true, true, false)));
        }
        assert_children_loaded(&availability);
    }

    #[test]
    fn add_child_nodes_then_subtrees() {
        let mut availability = availability();
        let layout = availability.layout();
        let root = availability.root_node_mut().unwrap();

        for id in LOADED_CHILDREN {
            let node = layout.add_node(id, root).unwrap();
            assert!(layout.add_loaded_subtree(node, AvailabilitySubtree::constant(true, true, false)));
        }

        // A node exists only once.
        let root = availability.root_node_mut().unwrap();
        assert!(layout.add_node(LOADED_CHILDREN[0], root).is_none());

        assert_children_loaded(&availability);
    }
}
