//! Positions on and above the WGS84 ellipsoid, rectangles of longitude and
//! latitude, bounding regions and the two map projections raster overlays
//! are published in.
//!
//! # Explanation
//!
//! All angles are radians. Longitudes live in `[-PI, PI]`, and a
//! [`GlobeRectangle`] whose west edge is greater than its east edge crosses
//! the antimeridian. Projected coordinates are plain [`Rectangle`]s from
//! `tessera_geometry`, in meters.
//!
//! [`Rectangle`]: tessera_geometry::Rectangle

mod bounding_region;
mod cartographic;
mod ellipsoid;
mod globe_rectangle;
mod projection;

pub use self::{
    bounding_region::{BoundingRegion, BoundingRegionBuilder},
    cartographic::Cartographic,
    ellipsoid::Ellipsoid,
    globe_rectangle::GlobeRectangle,
    projection::{
        GeographicProjection, Projection, ProjectionKind, WebMercatorProjection,
        compute_approximate_conversion_factor_to_meters_near_position, project_position,
        project_rectangle_simple, unproject_position, unproject_rectangle_simple,
    },
};

pub(crate) mod angle {
    use std::f64::consts::{PI, TAU};

    pub const EPSILON14: f64 = 1e-14;

    pub fn zero_to_two_pi(angle: f64) -> f64 {
        let modulo = angle.rem_euclid(TAU);
        if modulo.abs() < EPSILON14 && angle.abs() > EPSILON14 {
            TAU
        } else {
            modulo
        }
    }

    pub fn negative_pi_to_pi(angle: f64) -> f64 {
        if (-PI..=PI).contains(&angle) {
            angle
        } else {
            zero_to_two_pi(angle + PI) - PI
        }
    }

    pub fn equals_epsilon(left: f64, right: f64, epsilon: f64) -> bool {
        (left - right).abs() <= epsilon
    }
}

#[doc(hidden)]
pub mod prelude {
    pub use crate::{
        BoundingRegion, BoundingRegionBuilder, Cartographic, Ellipsoid, GlobeRectangle,
        GeographicProjection, Projection, ProjectionKind, WebMercatorProjection,
    };
}
