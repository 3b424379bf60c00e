use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Identifies a node of a quadtree in the grid of a tiling scheme.
///
/// Level zero may contain more than one tile, depending on the root tile
/// counts of the tiling scheme. `x` grows to the east and `y` to the north.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuadtreeTileId {
    pub level: u32,
    pub x: u32,
    pub y: u32,
}

impl QuadtreeTileId {
    pub const fn new(level: u32, x: u32, y: u32) -> Self {
        Self { level, x, y }
    }

    /// The tile one level up that contains this tile.
    ///
    /// Tiles at level zero are their own parent.
    pub const fn parent(self) -> Self {
        if self.level == 0 {
            return self;
        }

        Self::new(self.level - 1, self.x >> 1, self.y >> 1)
    }

    /// The four children, ordered south-west, south-east, north-west, north-east.
    pub const fn children(self) -> [Self; 4] {
        let level = self.level + 1;
        let x = self.x << 1;
        let y = self.y << 1;

        [
            Self::new(level, x, y),
            Self::new(level, x + 1, y),
            Self::new(level, x, y + 1),
            Self::new(level, x + 1, y + 1),
        ]
    }

    /// Walks up the tree until `level` is reached.
    ///
    /// Returns `None` when `level` is deeper than this tile.
    pub const fn ancestor_at_level(self, level: u32) -> Option<Self> {
        if level > self.level {
            return None;
        }

        let shift = self.level - level;
        Some(Self::new(level, self.x >> shift, self.y >> shift))
    }
}

impl fmt::Display for QuadtreeTileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.level, self.x, self.y)
    }
}

/// Identifies a node of an octree used for 3D implicit tiling.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OctreeTileId {
    pub level: u32,
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl OctreeTileId {
    pub const fn new(level: u32, x: u32, y: u32, z: u32) -> Self {
        Self { level, x, y, z }
    }

    pub const fn parent(self) -> Self {
        if self.level == 0 {
            return self;
        }

        Self::new(self.level - 1, self.x >> 1, self.y >> 1, self.z >> 1)
    }

    /// The eight children in Morton order (x varies fastest, then y, then z).
    pub fn children(self) -> [Self; 8] {
        let level = self.level + 1;
        std::array::from_fn(|i| {
            let i = i as u32;
            Self::new(
                level,
                (self.x << 1) | (i & 1),
                (self.y << 1) | ((i >> 1) & 1),
                (self.z << 1) | ((i >> 2) & 1),
            )
        })
    }
}

impl fmt::Display for OctreeTileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.level, self.x, self.y, self.z)
    }
}

/// A quadtree node created by subdividing a tile whose content is produced
/// by clipping the parent's geometry rather than fetched.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UpsampledQuadtreeNode {
    pub tile_id: QuadtreeTileId,
}

impl UpsampledQuadtreeNode {
    pub fn is_west_child(self) -> bool {
        self.tile_id.x % 2 == 0
    }

    pub fn is_south_child(self) -> bool {
        self.tile_id.y % 2 == 0
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseTileIdError {
    #[error("expected {expected} components separated by '/', found {found}")]
    ComponentCount { expected: usize, found: usize },
    #[error("invalid tile id component {0:?}")]
    InvalidComponent(String),
}

fn parse_components<const N: usize>(s: &str) -> Result<[u32; N], ParseTileIdError> {
    let parts: Vec<&str> = s.trim().split('/').collect();
    if parts.len() != N {
        return Err(ParseTileIdError::ComponentCount {
            expected: N,
            found: parts.len(),
        });
    }

    let mut components = [0; N];
    for (component, part) in components.iter_mut().zip(parts) {
        *component = part
            .trim()
            .parse()
            .map_err(|_| ParseTileIdError::InvalidComponent(part.to_string()))?;
    }

    Ok(components)
}

impl FromStr for QuadtreeTileId {
    type Err = ParseTileIdError;

    /// Parses `level/x/y`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [level, x, y] = parse_components(s)?;
        Ok(Self::new(level, x, y))
    }
}

impl FromStr for OctreeTileId {
    type Err = ParseTileIdError;

    /// Parses `level/x/y/z`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [level, x, y, z] = parse_components(s)?;
        Ok(Self::new(level, x, y, z))
    }
}
