use super::TileAvailabilityFlags;
use crate::{QuadtreeTileId, QuadtreeTilingScheme, Rectangle};
use bevy_math::DVec2;
use serde::{Deserialize, Serialize};

/// A rectangular block of tiles at one level, bounds inclusive.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuadtreeTileRectangularRange {
    pub level: u32,
    pub minimum_x: u32,
    pub minimum_y: u32,
    pub maximum_x: u32,
    pub maximum_y: u32,
}

#[derive(Clone, Copy, Debug)]
struct RectangleWithLevel {
    level: u32,
    rectangle: Rectangle,
}

#[derive(Debug)]
struct RectangleNode {
    id: QuadtreeTileId,
    extent: Rectangle,
    parent: Option<usize>,
    /// South-west, south-east, north-west and north-east, created together.
    children: Option<[usize; 4]>,
    /// Sorted by level, coarsest first.
    rectangles: Vec<RectangleWithLevel>,
}

/// Availability described as a list of tile ranges, as published by
/// terrain and imagery services that do not use implicit tiling.
///
/// A tile at level `n` is assumed to imply all of its ancestors.
#[derive(Debug)]
pub struct QuadtreeRectangleAvailability {
    tiling_scheme: QuadtreeTilingScheme,
    maximum_level: u32,
    nodes: Vec<RectangleNode>,
    root_count: usize,
}

impl QuadtreeRectangleAvailability {
    pub fn new(tiling_scheme: QuadtreeTilingScheme, maximum_level: u32) -> Self {
        let mut nodes = Vec::new();
        for y in 0..tiling_scheme.root_tiles_y() {
            for x in 0..tiling_scheme.root_tiles_x() {
                let id = QuadtreeTileId::new(0, x, y);
                nodes.push(RectangleNode {
                    id,
                    extent: tiling_scheme.tile_to_rectangle(id),
                    parent: None,
                    children: None,
                    rectangles: Vec::new(),
                });
            }
        }

        Self {
            tiling_scheme,
            maximum_level,
            root_count: nodes.len(),
            nodes,
        }
    }

    pub fn maximum_level(&self) -> u32 {
        self.maximum_level
    }

    pub fn add_available_tile_range(&mut self, range: QuadtreeTileRectangularRange) {
        let lower_left = self.tiling_scheme.tile_to_rectangle(QuadtreeTileId::new(
            range.level,
            range.minimum_x,
            range.minimum_y,
        ));
        let upper_right = self.tiling_scheme.tile_to_rectangle(QuadtreeTileId::new(
            range.level,
            range.maximum_x,
            range.maximum_y,
        ));

        let rectangle = RectangleWithLevel {
            level: range.level,
            rectangle: Rectangle::from_corners(lower_left.lower_left(), upper_right.upper_right()),
        };

        for root in 0..self.root_count {
            if self.nodes[root].extent.overlaps(&rectangle.rectangle) {
                self.put_rectangle_in_quadtree(root, rectangle);
            }
        }
    }

    /// The deepest available level at `position`, zero if nothing covers it.
    pub fn compute_maximum_level_at_position(&self, position: DVec2) -> u32 {
        (0..self.root_count)
            .find(|&root| self.nodes[root].extent.contains(position))
            .map_or(0, |root| self.find_maximum_level_from_node(None, root, position))
    }

    pub fn is_tile_available(&self, id: QuadtreeTileId) -> TileAvailabilityFlags {
        // Availability is per tile, so the center decides for the whole tile.
        let center = self.tiling_scheme.tile_to_rectangle(id).center();
        if self.compute_maximum_level_at_position(center) >= id.level {
            TileAvailabilityFlags::TILE_AVAILABLE | TileAvailabilityFlags::REACHABLE
        } else {
            TileAvailabilityFlags::empty()
        }
    }

    fn children(&mut self, node: usize) -> [usize; 4] {
        if let Some(children) = self.nodes[node].children {
            return children;
        }

        let children = self.nodes[node].id.children().map(|id| {
            self.nodes.push(RectangleNode {
                id,
                extent: self.tiling_scheme.tile_to_rectangle(id),
                parent: Some(node),
                children: None,
                rectangles: Vec::new(),
            });
            self.nodes.len() - 1
        });

        self.nodes[node].children = Some(children);
        children
    }

    fn put_rectangle_in_quadtree(&mut self, root: usize, rectangle: RectangleWithLevel) {
        let mut node = root;

        while self.nodes[node].id.level < self.maximum_level {
            let children = self.children(node);
            match children
                .into_iter()
                .find(|&child| self.nodes[child].extent.fully_contains(&rectangle.rectangle))
            {
                Some(child) => node = child,
                None => break,
            }
        }

        let rectangles = &mut self.nodes[node].rectangles;
        let index = rectangles.partition_point(|existing| existing.level <= rectangle.level);
        rectangles.insert(index, rectangle);
    }

    fn find_maximum_level_from_node(
        &self,
        stop: Option<usize>,
        start: usize,
        position: DVec2,
    ) -> u32 {
        let mut maximum_level = 0;
        let mut node = start;

        // Find the deepest node containing the position. A position on a
        // boundary between children is searched in all of them.
        while let Some(children) = self.nodes[node].children {
            let containing: Vec<usize> = children
                .into_iter()
                .filter(|&child| self.nodes[child].extent.contains(position))
                .collect();

            match containing.as_slice() {
                [] => break,
                [child] => node = *child,
                _ => {
                    for &child in &containing {
                        maximum_level = maximum_level
                            .max(self.find_maximum_level_from_node(Some(node), child, position));
                    }
                    break;
                }
            }
        }

        // Walk back up, looking for finer rectangles containing the position.
        let mut current = Some(node);
        while current != stop {
            let Some(index) = current else { break };
            let rectangles = &self.nodes[index].rectangles;
            for rectangle in rectangles.iter().rev() {
                if rectangle.level <= maximum_level {
                    break;
                }
                if rectangle.rectangle.contains(position) {
                    maximum_level = rectangle.level;
                }
            }
            current = self.nodes[index].parent;
        }

        maximum_level
    }
}
