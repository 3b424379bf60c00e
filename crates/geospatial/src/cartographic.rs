use serde::{Deserialize, Serialize};

/// A position as longitude and latitude in radians plus a height in meters
/// above the ellipsoid.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct Cartographic {
    pub longitude: f64,
    pub latitude: f64,
    pub height: f64,
}

impl Cartographic {
    pub const fn new(longitude: f64, latitude: f64, height: f64) -> Self {
        Self {
            longitude,
            latitude,
            height,
        }
    }

    pub fn from_degrees(longitude: f64, latitude: f64, height: f64) -> Self {
        Self::new(longitude.to_radians(), latitude.to_radians(), height)
    }

    pub fn longitude_degrees(&self) -> f64 {
        self.longitude.to_degrees()
    }

    pub fn latitude_degrees(&self) -> f64 {
        self.latitude.to_degrees()
    }
}
