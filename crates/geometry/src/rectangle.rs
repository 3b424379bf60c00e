use bevy_math::DVec2;
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in a projected 2D coordinate system.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct Rectangle {
    pub minimum_x: f64,
    pub minimum_y: f64,
    pub maximum_x: f64,
    pub maximum_y: f64,
}

impl Rectangle {
    pub const fn new(minimum_x: f64, minimum_y: f64, maximum_x: f64, maximum_y: f64) -> Self {
        Self {
            minimum_x,
            minimum_y,
            maximum_x,
            maximum_y,
        }
    }

    pub const fn from_corners(lower_left: DVec2, upper_right: DVec2) -> Self {
        Self::new(lower_left.x, lower_left.y, upper_right.x, upper_right.y)
    }

    /// Inclusive on all four edges.
    pub fn contains(&self, position: DVec2) -> bool {
        position.x >= self.minimum_x
            && position.y >= self.minimum_y
            && position.x <= self.maximum_x
            && position.y <= self.maximum_y
    }

    /// True if the two rectangles share an area larger than zero.
    pub fn overlaps(&self, other: &Rectangle) -> bool {
        let left = self.minimum_x.max(other.minimum_x);
        let bottom = self.minimum_y.max(other.minimum_y);
        let right = self.maximum_x.min(other.maximum_x);
        let top = self.maximum_y.min(other.maximum_y);
        bottom < top && left < right
    }

    pub fn fully_contains(&self, other: &Rectangle) -> bool {
        other.minimum_x >= self.minimum_x
            && other.maximum_x <= self.maximum_x
            && other.minimum_y >= self.minimum_y
            && other.maximum_y <= self.maximum_y
    }

    /// Distance from `position` to the closest edge, negative inside the rectangle.
    pub fn compute_signed_distance(&self, position: DVec2) -> f64 {
        let bottom_left_distance = self.lower_left() - position;
        let top_right_distance = position - self.upper_right();
        let max_distance = bottom_left_distance.max(top_right_distance);

        if max_distance.x > 0.0 && max_distance.y > 0.0 {
            max_distance.length()
        } else {
            max_distance.x.max(max_distance.y)
        }
    }

    pub const fn lower_left(&self) -> DVec2 {
        DVec2::new(self.minimum_x, self.minimum_y)
    }

    pub const fn lower_right(&self) -> DVec2 {
        DVec2::new(self.maximum_x, self.minimum_y)
    }

    pub const fn upper_left(&self) -> DVec2 {
        DVec2::new(self.minimum_x, self.maximum_y)
    }

    pub const fn upper_right(&self) -> DVec2 {
        DVec2::new(self.maximum_x, self.maximum_y)
    }

    pub fn center(&self) -> DVec2 {
        DVec2::new(
            (self.minimum_x + self.maximum_x) * 0.5,
            (self.minimum_y + self.maximum_y) * 0.5,
        )
    }

    pub fn width(&self) -> f64 {
        self.maximum_x - self.minimum_x
    }

    pub fn height(&self) -> f64 {
        self.maximum_y - self.minimum_y
    }

    /// The shared area of both rectangles, `None` if it is empty or degenerate.
    pub fn intersect(&self, other: &Rectangle) -> Option<Rectangle> {
        let left = self.minimum_x.max(other.minimum_x);
        let bottom = self.minimum_y.max(other.minimum_y);
        let right = self.maximum_x.min(other.maximum_x);
        let top = self.maximum_y.min(other.maximum_y);

        if bottom >= top || left >= right {
            return None;
        }

        Some(Rectangle::new(left, bottom, right, top))
    }

    /// The smallest rectangle containing both.
    pub fn union(&self, other: &Rectangle) -> Rectangle {
        Rectangle::new(
            self.minimum_x.min(other.minimum_x),
            self.minimum_y.min(other.minimum_y),
            self.maximum_x.max(other.maximum_x),
            self.maximum_y.max(other.maximum_y),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_requires_area() {
        let a = Rectangle::new(0.0, 0.0, 10.0, 10.0);
        let b = Rectangle::new(5.0, 5.0, 15.0, 15.0);
        assert_eq!(a.intersect(&b), Some(Rectangle::new(5.0, 5.0, 10.0, 10.0)));

        let touching = Rectangle::new(10.0, 0.0, 20.0, 10.0);
        assert_eq!(a.intersect(&touching), None);
        assert!(!a.overlaps(&touching));
        assert!(a.overlaps(&b));
    }

    #[test]
    fn union_and_containment() {
        let a = Rectangle::new(0.0, 0.0, 1.0, 1.0);
        let b = Rectangle::new(2.0, -1.0, 3.0, 0.5);
        let union = a.union(&b);
        assert_eq!(union, Rectangle::new(0.0, -1.0, 3.0, 1.0));
        assert!(union.fully_contains(&a));
        assert!(union.fully_contains(&b));
        assert!(!a.fully_contains(&union));
        assert!(a.contains(DVec2::new(1.0, 1.0)));
        assert!(!a.contains(DVec2::new(1.0, 1.1)));
    }

    #[test]
    fn signed_distance() {
        let rectangle = Rectangle::new(0.0, 0.0, 4.0, 2.0);
        assert_eq!(rectangle.compute_signed_distance(DVec2::new(2.0, 1.0)), -1.0);
        assert_eq!(rectangle.compute_signed_distance(DVec2::new(6.0, 1.0)), 2.0);
        assert_eq!(rectangle.compute_signed_distance(DVec2::new(7.0, 6.0)), 5.0);
    }

    #[test]
    fn measurements() {
        let rectangle = Rectangle::new(-2.0, 1.0, 4.0, 5.0);
        assert_eq!(rectangle.width(), 6.0);
        assert_eq!(rectangle.height(), 4.0);
        assert_eq!(rectangle.center(), DVec2::new(1.0, 3.0));
        assert_eq!(rectangle.lower_right(), DVec2::new(4.0, 1.0));
        assert_eq!(rectangle.upper_left(), DVec2::new(-2.0, 5.0));
    }
}
