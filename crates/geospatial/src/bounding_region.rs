use crate::{Cartographic, GlobeRectangle, angle::zero_to_two_pi};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};

/// A globe rectangle extruded between two heights above the ellipsoid.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct BoundingRegion {
    pub rectangle: GlobeRectangle,
    pub minimum_height: f64,
    pub maximum_height: f64,
}

impl BoundingRegion {
    pub const fn new(rectangle: GlobeRectangle, minimum_height: f64, maximum_height: f64) -> Self {
        Self {
            rectangle,
            minimum_height,
            maximum_height,
        }
    }

    pub fn contains(&self, cartographic: &Cartographic) -> bool {
        self.rectangle.contains(cartographic)
            && cartographic.height >= self.minimum_height
            && cartographic.height <= self.maximum_height
    }

    pub fn union(&self, other: &BoundingRegion) -> BoundingRegion {
        BoundingRegion::new(
            self.rectangle.union(&other.rectangle),
            self.minimum_height.min(other.minimum_height),
            self.maximum_height.max(other.maximum_height),
        )
    }
}

/// Grows a [`BoundingRegion`] one position at a time.
///
/// Longitudes close to a pole are meaningless and would stretch the region
/// around the whole globe, so positions within the pole tolerance only extend
/// the latitude and height range.
#[derive(Clone, Debug)]
pub struct BoundingRegionBuilder {
    west: f64,
    south: f64,
    east: f64,
    north: f64,
    minimum_height: f64,
    maximum_height: f64,
    longitude_range_is_empty: bool,
    pole_tolerance: f64,
}

impl Default for BoundingRegionBuilder {
    fn default() -> Self {
        Self {
            west: PI,
            south: FRAC_PI_2,
            east: -PI,
            north: -FRAC_PI_2,
            minimum_height: f64::MAX,
            maximum_height: f64::MIN,
            longitude_range_is_empty: true,
            pole_tolerance: 1e-10,
        }
    }
}

impl BoundingRegionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pole_tolerance(&self) -> f64 {
        self.pole_tolerance
    }

    /// Latitude distance in radians from a pole within which longitudes are ignored.
    pub fn set_pole_tolerance(&mut self, tolerance: f64) {
        self.pole_tolerance = tolerance;
    }

    pub fn is_empty(&self) -> bool {
        self.south > self.north
    }

    /// Returns `true` if the region grew.
    pub fn expand_to_include_position(&mut self, position: &Cartographic) -> bool {
        let mut modified = false;

        if position.height < self.minimum_height {
            self.minimum_height = position.height;
            modified = true;
        }
        if position.height > self.maximum_height {
            self.maximum_height = position.height;
            modified = true;
        }
        if position.latitude < self.south {
            self.south = position.latitude;
            modified = true;
        }
        if position.latitude > self.north {
            self.north = position.latitude;
            modified = true;
        }

        if FRAC_PI_2 - position.latitude.abs() <= self.pole_tolerance {
            return modified;
        }

        let longitude = position.longitude;
        if self.longitude_range_is_empty {
            self.west = longitude;
            self.east = longitude;
            self.longitude_range_is_empty = false;
            return true;
        }

        let current = GlobeRectangle::new(self.west, self.south, self.east, self.north);
        if current.contains(&Cartographic::new(longitude, current.south, 0.0)) {
            return modified;
        }

        // Grow towards whichever edge is closer going around the globe.
        let distance_to_east = zero_to_two_pi(longitude - self.east);
        let distance_to_west = zero_to_two_pi(self.west - longitude);
        if distance_to_east <= distance_to_west {
            self.east = longitude;
        } else {
            self.west = longitude;
        }
        true
    }

    pub fn to_globe_rectangle(&self) -> GlobeRectangle {
        if self.is_empty() {
            return GlobeRectangle::EMPTY;
        }
        if self.longitude_range_is_empty {
            return GlobeRectangle::new(-PI, self.south, PI, self.north);
        }
        GlobeRectangle::new(self.west, self.south, self.east, self.north)
    }

    pub fn to_region(&self) -> BoundingRegion {
        if self.is_empty() {
            return BoundingRegion::new(GlobeRectangle::EMPTY, 0.0, 0.0);
        }
        BoundingRegion::new(
            self.to_globe_rectangle(),
            self.minimum_height,
            self.maximum_height,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(left: f64, right: f64) {
        assert!((left - right).abs() < 1e-12, "{left} != {right}");
    }

    #[test]
    fn empty_builder() {
        let builder = BoundingRegionBuilder::new();
        assert!(builder.is_empty());
        assert!(builder.to_region().rectangle.is_empty());
    }

    #[test]
    fn grows_around_positions() {
        let mut builder = BoundingRegionBuilder::new();
        assert!(builder.expand_to_include_position(&Cartographic::from_degrees(10.0, 20.0, 5.0)));
        assert!(builder.expand_to_include_position(&Cartographic::from_degrees(-10.0, -20.0, -5.0)));
        assert!(!builder.expand_to_include_position(&Cartographic::from_degrees(0.0, 0.0, 0.0)));

        let region = builder.to_region();
        assert_close(region.rectangle.west, (-10f64).to_radians());
        assert_close(region.rectangle.east, 10f64.to_radians());
        assert_close(region.rectangle.south, (-20f64).to_radians());
        assert_close(region.rectangle.north, 20f64.to_radians());
        assert_close(region.minimum_height, -5.0);
        assert_close(region.maximum_height, 5.0);
    }

    #[test]
    fn grows_across_the_antimeridian() {
        let mut builder = BoundingRegionBuilder::new();
        builder.expand_to_include_position(&Cartographic::from_degrees(175.0, 0.0, 0.0));
        builder.expand_to_include_position(&Cartographic::from_degrees(-175.0, 1.0, 0.0));

        let rectangle = builder.to_globe_rectangle();
        assert_close(rectangle.west, 175f64.to_radians());
        assert_close(rectangle.east, (-175f64).to_radians());
        assert_close(rectangle.width(), 10f64.to_radians());
    }

    #[test]
    fn positions_near_poles_ignore_longitude() {
        let mut builder = BoundingRegionBuilder::new();
        builder.set_pole_tolerance(0.01);
        builder.expand_to_include_position(&Cartographic::from_degrees(10.0, 80.0, 0.0));
        builder.expand_to_include_position(&Cartographic::new(-2.0, FRAC_PI_2 - 0.001, 0.0));

        let rectangle = builder.to_globe_rectangle();
        assert_close(rectangle.west, 10f64.to_radians());
        assert_close(rectangle.east, 10f64.to_radians());
        assert_close(rectangle.north, FRAC_PI_2 - 0.001);

        let mut polar = BoundingRegionBuilder::new();
        polar.expand_to_include_position(&Cartographic::new(1.0, FRAC_PI_2, 0.0));
        assert_eq!(polar.to_globe_rectangle().width(), 2.0 * PI);
    }

    #[test]
    fn region_union() {
        let a = BoundingRegion::new(GlobeRectangle::from_degrees(0.0, 0.0, 10.0, 10.0), 0.0, 10.0);
        let b = BoundingRegion::new(GlobeRectangle::from_degrees(5.0, 5.0, 20.0, 20.0), -10.0, 5.0);
        let union = a.union(&b);
        assert_close(union.rectangle.east, 20f64.to_radians());
        assert_close(union.minimum_height, -10.0);
        assert_close(union.maximum_height, 10.0);
        assert!(union.contains(&Cartographic::from_degrees(15.0, 15.0, 0.0)));
    }
}
