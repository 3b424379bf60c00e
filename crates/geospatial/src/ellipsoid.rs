use crate::Cartographic;
use bevy_math::DVec3;
use serde::{Deserialize, Serialize};

const EPSILON12: f64 = 1e-12;
const MAXIMUM_ITERATIONS: u32 = 64;

/// A triaxial ellipsoid centered at the origin, Z up.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    radii: DVec3,
}

impl Default for Ellipsoid {
    fn default() -> Self {
        Self::WGS84
    }
}

impl Ellipsoid {
    pub const WGS84: Self = Self::new(DVec3::new(6378137.0, 6378137.0, 6356752.3142451793));

    /// Positions closer than this to the center, in squared scaled units,
    /// are not projected onto the surface.
    const CENTER_TOLERANCE_SQUARED: f64 = 0.1;

    pub const fn new(radii: DVec3) -> Self {
        Self { radii }
    }

    pub fn radii(&self) -> DVec3 {
        self.radii
    }

    pub fn maximum_radius(&self) -> f64 {
        self.radii.max_element()
    }

    pub fn minimum_radius(&self) -> f64 {
        self.radii.min_element()
    }

    fn one_over_radii(&self) -> DVec3 {
        self.radii.recip()
    }

    fn one_over_radii_squared(&self) -> DVec3 {
        (self.radii * self.radii).recip()
    }

    pub fn geodetic_surface_normal(&self, position: DVec3) -> DVec3 {
        (position * self.one_over_radii_squared()).normalize()
    }

    pub fn geodetic_surface_normal_cartographic(&self, cartographic: &Cartographic) -> DVec3 {
        let (sin_longitude, cos_longitude) = cartographic.longitude.sin_cos();
        let (sin_latitude, cos_latitude) = cartographic.latitude.sin_cos();
        DVec3::new(
            cos_latitude * cos_longitude,
            cos_latitude * sin_longitude,
            sin_latitude,
        )
        .normalize()
    }

    /// Earth-centered, earth-fixed position of `cartographic`.
    pub fn cartographic_to_cartesian(&self, cartographic: &Cartographic) -> DVec3 {
        let normal = self.geodetic_surface_normal_cartographic(cartographic);
        let k = self.radii * self.radii * normal;
        let gamma = normal.dot(k).sqrt();
        k / gamma + normal * cartographic.height
    }

    /// `None` for positions too close to the center to have a meaningful
    /// surface point.
    pub fn cartesian_to_cartographic(&self, position: DVec3) -> Option<Cartographic> {
        let surface = self.scale_to_geodetic_surface(position)?;
        let normal = self.geodetic_surface_normal(surface);
        let height = position - surface;

        let longitude = normal.y.atan2(normal.x);
        let latitude = normal.z.clamp(-1.0, 1.0).asin();
        let height = height.dot(position).signum() * height.length();

        Some(Cartographic::new(longitude, latitude, height))
    }

    /// Moves `position` along the geodetic surface normal onto the surface.
    ///
    /// Solves for the scale along the normal with Newton's method.
    pub fn scale_to_geodetic_surface(&self, position: DVec3) -> Option<DVec3> {
        let one_over_radii = self.one_over_radii();
        let one_over_radii_squared = self.one_over_radii_squared();

        let scaled = position * one_over_radii;
        let squared = scaled * scaled;
        let squared_norm = squared.x + squared.y + squared.z;
        let ratio = (1.0 / squared_norm).sqrt();

        // Intersection of the ray from the center with the surface.
        let intersection = position * ratio;
        if squared_norm < Self::CENTER_TOLERANCE_SQUARED {
            return ratio.is_finite().then_some(intersection);
        }

        let gradient = intersection * one_over_radii_squared * 2.0;
        let mut lambda = (1.0 - ratio) * position.length() / (0.5 * gradient.length());
        let mut correction = 0.0;
        let mut multiplier = DVec3::ONE;

        for _ in 0..MAXIMUM_ITERATIONS {
            lambda -= correction;

            multiplier = (DVec3::ONE + lambda * one_over_radii_squared).recip();
            let multiplier_squared = multiplier * multiplier;
            let multiplier_cubed = multiplier_squared * multiplier;

            let function = (squared * multiplier_squared).element_sum() - 1.0;
            if function.abs() <= EPSILON12 {
                break;
            }

            let denominator = (squared * multiplier_cubed * one_over_radii_squared).element_sum();
            let derivative = -2.0 * denominator;
            correction = function / derivative;
        }

        let surface = position * multiplier;
        surface.is_finite().then_some(surface)
    }
}
