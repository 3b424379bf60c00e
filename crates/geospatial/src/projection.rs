use crate::{Cartographic, Ellipsoid, GlobeRectangle};
use bevy_math::{DVec2, DVec3};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};
use tessera_geometry::Rectangle;

/// Longitude and latitude scaled by the ellipsoid's semi-major axis, the
/// projection also known as plate carrée or EPSG:4326.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
pub struct GeographicProjection {
    ellipsoid: Ellipsoid,
}

impl GeographicProjection {
    pub const MAXIMUM_GLOBE_RECTANGLE: GlobeRectangle = GlobeRectangle::MAXIMUM;

    pub const fn new(ellipsoid: Ellipsoid) -> Self {
        Self { ellipsoid }
    }

    pub fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }

    fn semimajor_axis(&self) -> f64 {
        self.ellipsoid.maximum_radius()
    }

    /// The projected rectangle covering the whole globe.
    pub fn maximum_rectangle(&self) -> Rectangle {
        self.project_rectangle(&Self::MAXIMUM_GLOBE_RECTANGLE)
    }

    pub fn project(&self, cartographic: &Cartographic) -> DVec3 {
        let semimajor_axis = self.semimajor_axis();
        DVec3::new(
            cartographic.longitude * semimajor_axis,
            cartographic.latitude * semimajor_axis,
            cartographic.height,
        )
    }

    pub fn project_rectangle(&self, rectangle: &GlobeRectangle) -> Rectangle {
        let south_west = self.project(&rectangle.south_west());
        let north_east = self.project(&rectangle.north_east());
        Rectangle::new(south_west.x, south_west.y, north_east.x, north_east.y)
    }

    pub fn unproject(&self, position: DVec2) -> Cartographic {
        let one_over_semimajor_axis = self.semimajor_axis().recip();
        Cartographic::new(
            position.x * one_over_semimajor_axis,
            position.y * one_over_semimajor_axis,
            0.0,
        )
    }

    pub fn unproject_rectangle(&self, rectangle: &Rectangle) -> GlobeRectangle {
        let south_west = self.unproject(rectangle.lower_left());
        let north_east = self.unproject(rectangle.upper_right());
        GlobeRectangle::new(
            south_west.longitude,
            south_west.latitude,
            north_east.longitude,
            north_east.latitude,
        )
    }
}

/// The spherical Mercator projection used by most web map services,
/// EPSG:3857.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
pub struct WebMercatorProjection {
    ellipsoid: Ellipsoid,
}

impl WebMercatorProjection {
    /// The latitude at which the projected square of the world ends, about
    /// 85.05 degrees.
    pub const MAXIMUM_LATITUDE: f64 = 1.4844222297453324;

    pub const MAXIMUM_GLOBE_RECTANGLE: GlobeRectangle = GlobeRectangle::new(
        -PI,
        -Self::MAXIMUM_LATITUDE,
        PI,
        Self::MAXIMUM_LATITUDE,
    );

    pub const fn new(ellipsoid: Ellipsoid) -> Self {
        Self { ellipsoid }
    }

    pub fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }

    fn semimajor_axis(&self) -> f64 {
        self.ellipsoid.maximum_radius()
    }

    pub fn maximum_rectangle(&self) -> Rectangle {
        self.project_rectangle(&Self::MAXIMUM_GLOBE_RECTANGLE)
    }

    pub fn mercator_angle_to_geodetic_latitude(mercator_angle: f64) -> f64 {
        FRAC_PI_2 - 2.0 * (-mercator_angle).exp().atan()
    }

    /// Latitudes beyond [`Self::MAXIMUM_LATITUDE`] are clamped.
    pub fn geodetic_latitude_to_mercator_angle(latitude: f64) -> f64 {
        let latitude = latitude.clamp(-Self::MAXIMUM_LATITUDE, Self::MAXIMUM_LATITUDE);
        let sin_latitude = latitude.sin();
        0.5 * ((1.0 + sin_latitude) / (1.0 - sin_latitude)).ln()
    }

    pub fn project(&self, cartographic: &Cartographic) -> DVec3 {
        let semimajor_axis = self.semimajor_axis();
        DVec3::new(
            cartographic.longitude * semimajor_axis,
            Self::geodetic_latitude_to_mercator_angle(cartographic.latitude) * semimajor_axis,
            cartographic.height,
        )
    }

    pub fn project_rectangle(&self, rectangle: &GlobeRectangle) -> Rectangle {
        let south_west = self.project(&rectangle.south_west());
        let north_east = self.project(&rectangle.north_east());
        Rectangle::new(south_west.x, south_west.y, north_east.x, north_east.y)
    }

    pub fn unproject(&self, position: DVec2) -> Cartographic {
        let one_over_semimajor_axis = self.semimajor_axis().recip();
        Cartographic::new(
            position.x * one_over_semimajor_axis,
            Self::mercator_angle_to_geodetic_latitude(position.y * one_over_semimajor_axis),
            0.0,
        )
    }

    pub fn unproject_rectangle(&self, rectangle: &Rectangle) -> GlobeRectangle {
        let south_west = self.unproject(rectangle.lower_left());
        let north_east = self.unproject(rectangle.upper_right());
        GlobeRectangle::new(
            south_west.longitude,
            south_west.latitude,
            north_east.longitude,
            north_east.latitude,
        )
    }
}

/// Which projection a raster overlay is published in, as written in
/// configuration files.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default, Hash)]
pub enum ProjectionKind {
    #[default]
    Geographic,
    WebMercator,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub enum Projection {
    Geographic(GeographicProjection),
    WebMercator(WebMercatorProjection),
}

impl Default for Projection {
    fn default() -> Self {
        Self::Geographic(GeographicProjection::default())
    }
}

impl From<ProjectionKind> for Projection {
    fn from(kind: ProjectionKind) -> Self {
        match kind {
            ProjectionKind::Geographic => Self::Geographic(GeographicProjection::default()),
            ProjectionKind::WebMercator => Self::WebMercator(WebMercatorProjection::default()),
        }
    }
}

impl Projection {
    pub fn kind(&self) -> ProjectionKind {
        match self {
            Self::Geographic(_) => ProjectionKind::Geographic,
            Self::WebMercator(_) => ProjectionKind::WebMercator,
        }
    }

    pub fn ellipsoid(&self) -> &Ellipsoid {
        match self {
            Self::Geographic(projection) => projection.ellipsoid(),
            Self::WebMercator(projection) => projection.ellipsoid(),
        }
    }

    /// The projected rectangle covering everything the projection can represent.
    pub fn maximum_rectangle(&self) -> Rectangle {
        match self {
            Self::Geographic(projection) => projection.maximum_rectangle(),
            Self::WebMercator(projection) => projection.maximum_rectangle(),
        }
    }
}

pub fn project_position(projection: &Projection, position: &Cartographic) -> DVec3 {
    match projection {
        Projection::Geographic(projection) => projection.project(position),
        Projection::WebMercator(projection) => projection.project(position),
    }
}

pub fn unproject_position(projection: &Projection, position: DVec3) -> Cartographic {
    let mut cartographic = match projection {
        Projection::Geographic(projection) => projection.unproject(position.truncate()),
        Projection::WebMercator(projection) => projection.unproject(position.truncate()),
    };
    cartographic.height = position.z;
    cartographic
}

/// Projects the south-west and north-east corners. Rectangles crossing the
/// antimeridian produce a projected rectangle with `minimum_x > maximum_x`.
pub fn project_rectangle_simple(projection: &Projection, rectangle: &GlobeRectangle) -> Rectangle {
    match projection {
        Projection::Geographic(projection) => projection.project_rectangle(rectangle),
        Projection::WebMercator(projection) => projection.project_rectangle(rectangle),
    }
}

pub fn unproject_rectangle_simple(projection: &Projection, rectangle: &Rectangle) -> GlobeRectangle {
    match projection {
        Projection::Geographic(projection) => projection.unproject_rectangle(rectangle),
        Projection::WebMercator(projection) => projection.unproject_rectangle(rectangle),
    }
}

/// Projected distances multiplied by this factor approximate meters on the
/// ellipsoid surface near `position`, a projected coordinate.
pub fn compute_approximate_conversion_factor_to_meters_near_position(
    projection: &Projection,
    position: DVec2,
) -> f64 {
    match projection {
        Projection::Geographic(_) => 1.0,
        // Mercator stretches both axes by 1 / cos(latitude).
        Projection::WebMercator(projection) => projection.unproject(position).latitude.cos(),
    }
}
