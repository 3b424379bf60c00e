use crate::{QuadtreeTileId, Rectangle};
use bevy_math::DVec2;
use serde::{Deserialize, Serialize};

/// Divides a projected rectangle into a quadtree of equally sized tiles.
///
/// Level zero consists of `root_tiles_x * root_tiles_y` tiles, every further
/// level doubles the tile count along both axes.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct QuadtreeTilingScheme {
    rectangle: Rectangle,
    root_tiles_x: u32,
    root_tiles_y: u32,
}

impl QuadtreeTilingScheme {
    pub const fn new(rectangle: Rectangle, root_tiles_x: u32, root_tiles_y: u32) -> Self {
        Self {
            rectangle,
            root_tiles_x,
            root_tiles_y,
        }
    }

    pub const fn rectangle(&self) -> &Rectangle {
        &self.rectangle
    }

    pub const fn root_tiles_x(&self) -> u32 {
        self.root_tiles_x
    }

    pub const fn root_tiles_y(&self) -> u32 {
        self.root_tiles_y
    }

    /// `None` once the column count no longer fits a `u32`.
    pub fn number_of_x_tiles_at_level(&self, level: u32) -> Option<u32> {
        tiles_at_level(self.root_tiles_x, level)
    }

    pub fn number_of_y_tiles_at_level(&self, level: u32) -> Option<u32> {
        tiles_at_level(self.root_tiles_y, level)
    }

    /// The deepest level whose tile coordinates still fit a `u32`.
    pub fn maximum_level(&self) -> u32 {
        self.root_tiles_x.max(self.root_tiles_y).max(1).leading_zeros()
    }

    /// The tile at `level` containing `position`.
    ///
    /// Positions on the outer east or north edge map to the last tile.
    /// Returns `None` for positions outside of the tiled rectangle and for
    /// levels deeper than [`Self::maximum_level`].
    pub fn position_to_tile(&self, position: DVec2, level: u32) -> Option<QuadtreeTileId> {
        if !self.rectangle.contains(position) {
            return None;
        }

        let x_tiles = self.number_of_x_tiles_at_level(level)?;
        let y_tiles = self.number_of_y_tiles_at_level(level)?;

        let x_tile_width = self.rectangle.width() / x_tiles as f64;
        let y_tile_height = self.rectangle.height() / y_tiles as f64;

        let distance_from_west = position.x - self.rectangle.minimum_x;
        let distance_from_south = position.y - self.rectangle.minimum_y;

        let x = ((distance_from_west / x_tile_width) as u32).min(x_tiles - 1);
        let y = ((distance_from_south / y_tile_height) as u32).min(y_tiles - 1);

        Some(QuadtreeTileId::new(level, x, y))
    }

    /// The projected area covered by `tile_id`.
    ///
    /// Computed in floating point, so ids past [`Self::maximum_level`] or
    /// outside the grid give rectangles outside of the tiled area instead of
    /// failing.
    pub fn tile_to_rectangle(&self, tile_id: QuadtreeTileId) -> Rectangle {
        let scale = 2.0_f64.powi(tile_id.level.min(i32::MAX as u32) as i32);
        let x_tile_width = self.rectangle.width() / (self.root_tiles_x as f64 * scale);
        let y_tile_height = self.rectangle.height() / (self.root_tiles_y as f64 * scale);

        let (x, y) = (tile_id.x as f64, tile_id.y as f64);
        Rectangle::new(
            self.rectangle.minimum_x + x * x_tile_width,
            self.rectangle.minimum_y + y * y_tile_height,
            self.rectangle.minimum_x + (x + 1.0) * x_tile_width,
            self.rectangle.minimum_y + (y + 1.0) * y_tile_height,
        )
    }
}

fn tiles_at_level(root_tiles: u32, level: u32) -> Option<u32> {
    1u32.checked_shl(level)
        .and_then(|tiles| tiles.checked_mul(root_tiles))
        .filter(|&tiles| tiles > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geographic_degrees() -> QuadtreeTilingScheme {
        QuadtreeTilingScheme::new(Rectangle::new(-180.0, -90.0, 180.0, 90.0), 2, 1)
    }

    #[test]
    fn tile_counts_double_per_level() {
        let scheme = geographic_degrees();
        assert_eq!(scheme.number_of_x_tiles_at_level(0), Some(2));
        assert_eq!(scheme.number_of_y_tiles_at_level(0), Some(1));
        assert_eq!(scheme.number_of_x_tiles_at_level(3), Some(16));
        assert_eq!(scheme.number_of_y_tiles_at_level(3), Some(8));
    }

    #[test]
    fn levels_past_the_coordinate_range_have_no_tiles() {
        let scheme = geographic_degrees();
        assert_eq!(scheme.maximum_level(), 30);
        assert_eq!(scheme.number_of_x_tiles_at_level(30), Some(1 << 31));
        assert_eq!(scheme.number_of_x_tiles_at_level(31), None);
        assert_eq!(scheme.number_of_y_tiles_at_level(31), Some(1 << 31));
        assert_eq!(scheme.number_of_x_tiles_at_level(32), None);

        assert_eq!(scheme.position_to_tile(DVec2::ZERO, 31), None);
        assert_eq!(scheme.position_to_tile(DVec2::ZERO, 40), None);
        assert_eq!(scheme.position_to_tile(DVec2::ZERO, 30).map(|tile| tile.level), Some(30));

        let single = QuadtreeTilingScheme::new(Rectangle::new(0.0, 0.0, 1.0, 1.0), 1, 1);
        assert_eq!(single.maximum_level(), 31);
        assert!(single.position_to_tile(DVec2::new(1.0, 1.0), 31).is_some());
    }

    #[test]
    fn deep_tiles_still_have_rectangles() {
        let scheme = geographic_degrees();
        let rectangle = scheme.tile_to_rectangle(QuadtreeTileId::new(32, 0, 0));
        assert_eq!(rectangle.minimum_x, -180.0);
        assert!(rectangle.width() > 0.0 && rectangle.width() < 1e-6);

        let last = scheme.tile_to_rectangle(QuadtreeTileId::new(0, u32::MAX, 0));
        assert!(last.maximum_x > last.minimum_x);
    }

    #[test]
    fn origin_maps_to_north_east_quadrant_tile() {
        let scheme = geographic_degrees();
        let tile = scheme.position_to_tile(DVec2::ZERO, 1).unwrap();
        assert_eq!(tile, QuadtreeTileId::new(1, 2, 1));

        let rectangle = scheme.tile_to_rectangle(tile);
        assert!(rectangle.contains(DVec2::ZERO));
        assert_eq!(rectangle, Rectangle::new(0.0, 0.0, 90.0, 90.0));
    }

    #[test]
    fn edges_clamp_to_last_tile() {
        let scheme = geographic_degrees();
        assert_eq!(
            scheme.position_to_tile(DVec2::new(180.0, 90.0), 2),
            Some(QuadtreeTileId::new(2, 7, 3))
        );
        assert_eq!(
            scheme.position_to_tile(DVec2::new(-180.0, -90.0), 2),
            Some(QuadtreeTileId::new(2, 0, 0))
        );
        assert_eq!(scheme.position_to_tile(DVec2::new(181.0, 0.0), 0), None);
    }

    #[test]
    fn every_tile_contains_its_center() {
        let scheme = geographic_degrees();
        for x in 0..8 {
            for y in 0..4 {
                let tile = QuadtreeTileId::new(2, x, y);
                let center = scheme.tile_to_rectangle(tile).center();
                assert_eq!(scheme.position_to_tile(center, 2), Some(tile));
            }
        }
    }
}
