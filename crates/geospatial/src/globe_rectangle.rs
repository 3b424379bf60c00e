use crate::{
    Cartographic,
    angle::{EPSILON14, equals_epsilon, negative_pi_to_pi},
};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI, TAU};
use tessera_geometry::Rectangle;

/// A rectangle of longitude and latitude in radians.
///
/// `west > east` describes a rectangle crossing the antimeridian.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct GlobeRectangle {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl GlobeRectangle {
    /// The whole globe.
    pub const MAXIMUM: Self = Self::new(-PI, -FRAC_PI_2, PI, FRAC_PI_2);

    /// Bounds nothing, not even a single point.
    pub const EMPTY: Self = Self::new(PI, FRAC_PI_2, -PI, -FRAC_PI_2);

    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    pub fn from_degrees(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self::new(
            west.to_radians(),
            south.to_radians(),
            east.to_radians(),
            north.to_radians(),
        )
    }

    pub fn south_west(&self) -> Cartographic {
        Cartographic::new(self.west, self.south, 0.0)
    }

    pub fn north_east(&self) -> Cartographic {
        Cartographic::new(self.east, self.north, 0.0)
    }

    /// The same numbers as a projected rectangle, without any wrapping.
    pub fn to_simple_rectangle(&self) -> Rectangle {
        Rectangle::new(self.west, self.south, self.east, self.north)
    }

    /// Width in radians, accounting for the antimeridian.
    pub fn width(&self) -> f64 {
        let east = if self.east < self.west {
            self.east + TAU
        } else {
            self.east
        };
        east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    pub fn center(&self) -> Cartographic {
        let east = if self.east < self.west {
            self.east + TAU
        } else {
            self.east
        };

        Cartographic::new(
            negative_pi_to_pi((self.west + east) * 0.5),
            (self.south + self.north) * 0.5,
            0.0,
        )
    }

    pub fn contains(&self, cartographic: &Cartographic) -> bool {
        let latitude = cartographic.latitude;
        if latitude < self.south || latitude > self.north {
            return false;
        }

        let mut longitude = cartographic.longitude;
        let mut east = self.east;
        if east < self.west {
            east += TAU;
            if longitude < 0.0 {
                longitude += TAU;
            }
        }

        (longitude > self.west || equals_epsilon(longitude, self.west, EPSILON14))
            && (longitude < east || equals_epsilon(longitude, east, EPSILON14))
    }

    pub fn is_empty(&self) -> bool {
        self.south > self.north
    }

    /// Longitudes as one continuous interval, east may exceed `PI`.
    fn longitude_interval(&self) -> (f64, f64) {
        (self.west, self.west + self.width())
    }

    /// The other rectangle's longitude interval shifted by a full turn in
    /// each direction, so wrapped overlaps show up as plain ones.
    fn shifted_intervals(&self, other: &GlobeRectangle) -> [((f64, f64), (f64, f64)); 3] {
        let interval = self.longitude_interval();
        let (other_west, other_east) = other.longitude_interval();
        [-TAU, 0.0, TAU].map(|shift| (interval, (other_west + shift, other_east + shift)))
    }

    /// `None` when the rectangles do not overlap.
    pub fn intersection(&self, other: &GlobeRectangle) -> Option<GlobeRectangle> {
        let south = self.south.max(other.south);
        let north = self.north.min(other.north);
        if south >= north {
            return None;
        }

        let (west, east) = self
            .shifted_intervals(other)
            .into_iter()
            .map(|((west, east), (other_west, other_east))| {
                (west.max(other_west), east.min(other_east))
            })
            .filter(|(west, east)| east > west)
            .max_by(|a, b| (a.1 - a.0).total_cmp(&(b.1 - b.0)))?;

        Some(GlobeRectangle::new(
            negative_pi_to_pi(west),
            south,
            negative_pi_to_pi(east),
            north,
        ))
    }

    pub fn union(&self, other: &GlobeRectangle) -> GlobeRectangle {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }

        let south = self.south.min(other.south);
        let north = self.north.max(other.north);

        let narrowest = self
            .shifted_intervals(other)
            .into_iter()
            .map(|((west, east), (other_west, other_east))| {
                (west.min(other_west), east.max(other_east))
            })
            .min_by(|a, b| (a.1 - a.0).total_cmp(&(b.1 - b.0)));

        match narrowest {
            Some((west, east)) if east - west < TAU => GlobeRectangle::new(
                negative_pi_to_pi(west),
                south,
                negative_pi_to_pi(east),
                north,
            ),
            _ => GlobeRectangle::new(-PI, south, PI, north),
        }
    }

    /// Splits a rectangle crossing the antimeridian in two, the wider part
    /// first. Rectangles that do not cross it are returned unchanged.
    pub fn split_at_anti_meridian(&self) -> (GlobeRectangle, Option<GlobeRectangle>) {
        if self.west <= self.east {
            return (*self, None);
        }

        let western = GlobeRectangle::new(self.west, self.south, PI, self.north);
        let eastern = GlobeRectangle::new(-PI, self.south, self.east, self.north);

        if western.width() >= eastern.width() {
            (western, Some(eastern))
        } else {
            (eastern, Some(western))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(left: f64, right: f64) {
        assert!((left - right).abs() < 1e-12, "{left} != {right}");
    }

    #[test]
    fn width_across_the_antimeridian() {
        let rectangle = GlobeRectangle::from_degrees(170.0, -10.0, -170.0, 10.0);
        assert_close(rectangle.width(), 20f64.to_radians());
        assert_close(rectangle.height(), 20f64.to_radians());

        let center = rectangle.center();
        assert_close(center.longitude.abs(), PI);
        assert_close(center.latitude, 0.0);
    }

    #[test]
    fn contains_wraps_longitude() {
        let rectangle = GlobeRectangle::from_degrees(170.0, -10.0, -170.0, 10.0);
        assert!(rectangle.contains(&Cartographic::from_degrees(175.0, 0.0, 0.0)));
        assert!(rectangle.contains(&Cartographic::from_degrees(-175.0, 0.0, 0.0)));
        assert!(!rectangle.contains(&Cartographic::from_degrees(0.0, 0.0, 0.0)));
        assert!(!rectangle.contains(&Cartographic::from_degrees(175.0, 20.0, 0.0)));

        let simple = GlobeRectangle::from_degrees(-10.0, -10.0, 10.0, 10.0);
        assert!(simple.contains(&simple.south_west()));
        assert!(simple.contains(&simple.north_east()));
    }

    #[test]
    fn intersections() {
        let a = GlobeRectangle::from_degrees(-10.0, -10.0, 10.0, 10.0);
        let b = GlobeRectangle::from_degrees(0.0, 0.0, 20.0, 20.0);
        let intersection = a.intersection(&b).unwrap();
        assert_close(intersection.west, 0.0);
        assert_close(intersection.south, 0.0);
        assert_close(intersection.east, 10f64.to_radians());
        assert_close(intersection.north, 10f64.to_radians());

        let far = GlobeRectangle::from_degrees(50.0, 0.0, 60.0, 10.0);
        assert!(a.intersection(&far).is_none());

        let crossing = GlobeRectangle::from_degrees(170.0, -10.0, -170.0, 10.0);
        let east_of_antimeridian = GlobeRectangle::from_degrees(-180.0, -5.0, -175.0, 5.0);
        let intersection = crossing.intersection(&east_of_antimeridian).unwrap();
        assert_close(intersection.west.abs(), PI);
        assert_close(intersection.east, (-175f64).to_radians());
        assert_close(intersection.width(), 5f64.to_radians());
    }

    #[test]
    fn unions() {
        let a = GlobeRectangle::from_degrees(-10.0, -10.0, 10.0, 10.0);
        let b = GlobeRectangle::from_degrees(0.0, 0.0, 20.0, 20.0);
        let union = a.union(&b);
        assert_close(union.west, (-10f64).to_radians());
        assert_close(union.north, 20f64.to_radians());

        let west_of_antimeridian = GlobeRectangle::from_degrees(170.0, 0.0, 175.0, 10.0);
        let east_of_antimeridian = GlobeRectangle::from_degrees(-175.0, 0.0, -170.0, 10.0);
        let union = west_of_antimeridian.union(&east_of_antimeridian);
        assert_close(union.west, 170f64.to_radians());
        assert_close(union.east, (-170f64).to_radians());

        assert_eq!(GlobeRectangle::EMPTY.union(&a), a);
        assert!(GlobeRectangle::EMPTY.is_empty());
        assert!(!GlobeRectangle::MAXIMUM.is_empty());
    }

    #[test]
    fn split() {
        let simple = GlobeRectangle::from_degrees(-10.0, -10.0, 10.0, 10.0);
        assert_eq!(simple.split_at_anti_meridian(), (simple, None));

        let crossing = GlobeRectangle::from_degrees(160.0, -10.0, -170.0, 10.0);
        let (wider, narrower) = crossing.split_at_anti_meridian();
        assert_close(wider.west, 160f64.to_radians());
        assert_close(wider.east, PI);
        let narrower = narrower.unwrap();
        assert_close(narrower.west, -PI);
        assert_close(narrower.east, (-170f64).to_radians());
    }
}
