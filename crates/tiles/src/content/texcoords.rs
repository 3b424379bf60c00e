use bevy_log::debug;
use bevy_math::{DMat4, DVec2, DVec3};
use bevy_platform::collections::HashMap;
use std::f64::consts::{PI, TAU};
use tessera_geometry::Rectangle;
use tessera_geospatial::{
    BoundingRegion, BoundingRegionBuilder, Cartographic, Ellipsoid, Projection, project_position,
};
use tessera_gltf::{AccessorType, AccessorView, BufferTarget, ComponentType, Model, primitives_in_scene};

/// Prefix of the vertex attributes holding raster overlay texture
/// coordinates, followed by the texture coordinate id.
pub const OVERLAY_ATTRIBUTE_PREFIX: &str = "_TESSERA_OVERLAY_";

const ANTIMERIDIAN_EPSILON: f64 = 1e-5;
const POLE_EPSILON: f64 = 1e-6;

pub fn overlay_attribute_name(texture_coordinate_id: u32) -> String {
    format!("{OVERLAY_ATTRIBUTE_PREFIX}{texture_coordinate_id}")
}

/// Adds texture coordinates locating every vertex of `model` inside
/// `rectangle`, a projected rectangle in `projection`.
///
/// `model_to_ecef` takes the model's root frame to earth centered
/// coordinates. Each distinct position accessor gets one new `VEC2` float
/// accessor with its own buffer, shared by every primitive reading those
/// positions, and referenced as [`overlay_attribute_name`]. Coordinates
/// run from `(0, 0)` at the rectangle's south west corner to `(1, 1)` at
/// its north east corner and are clamped to that range.
///
/// Returns the region actually covered by the vertices, which may be much
/// tighter than the tile's bounding volume.
pub fn create_raster_overlay_texture_coordinates(
    model: &mut Model,
    texture_coordinate_id: u32,
    model_to_ecef: DMat4,
    projection: &Projection,
    rectangle: &Rectangle,
) -> BoundingRegion {
    let attribute_name = overlay_attribute_name(texture_coordinate_id);
    let mut generated: HashMap<usize, usize> = HashMap::default();
    let mut bounds = BoundingRegionBuilder::new();
    bounds.set_pole_tolerance(POLE_EPSILON);

    for instance in primitives_in_scene(model, None) {
        let Some(primitive) = model
            .meshes
            .get(instance.mesh)
            .and_then(|mesh| mesh.primitives.get(instance.primitive))
        else {
            continue;
        };
        let Some(&positions) = primitive.attributes.get("POSITION") else {
            continue;
        };

        let texture_coordinates = match generated.get(&positions) {
            Some(&accessor) => accessor,
            None if primitive.attributes.contains_key(&attribute_name) => continue,
            None => {
                let transform = model_to_ecef * instance.transform;
                let Some(accessor) =
                    generate_texture_coordinates(model, positions, transform, projection, rectangle, &mut bounds)
                else {
                    continue;
                };
                generated.insert(positions, accessor);
                accessor
            }
        };

        if let Some(primitive) = model
            .meshes
            .get_mut(instance.mesh)
            .and_then(|mesh| mesh.primitives.get_mut(instance.primitive))
        {
            primitive.attributes.insert(attribute_name.clone(), texture_coordinates);
        }
    }

    bounds.to_region()
}

fn generate_texture_coordinates(
    model: &mut Model,
    positions: usize,
    transform: DMat4,
    projection: &Projection,
    rectangle: &Rectangle,
    bounds: &mut BoundingRegionBuilder,
) -> Option<usize> {
    let view = match AccessorView::<[f32; 3]>::new(model, positions) {
        Ok(view) => view,
        Err(error) => {
            debug!("Skipping overlay texture coordinates: {error}");
            return None;
        }
    };

    let size = DVec2::new(rectangle.width(), rectangle.height());
    let mut minimum = DVec2::ONE;
    let mut maximum = DVec2::ZERO;

    let uvs = view
        .iter()
        .map(|position| {
            let ecef = transform.transform_point3(DVec3::from(position.map(f64::from)));
            let Some(cartographic) = Ellipsoid::WGS84.cartesian_to_cartographic(ecef) else {
                return [0.0, 0.0];
            };
            bounds.expand_to_include_position(&cartographic);

            let projected = project_near_rectangle(projection, rectangle, &cartographic);
            let offset = projected - rectangle.lower_left();
            let uv = DVec2::new(unit_fraction(offset.x, size.x), unit_fraction(offset.y, size.y));
            minimum = minimum.min(uv);
            maximum = maximum.max(uv);
            uv.as_vec2().to_array()
        })
        .collect::<Vec<_>>();

    let count = uvs.len();
    let accessor = model.add_accessor_with_buffer(
        bytemuck::cast_slice(&uvs).to_vec(),
        ComponentType::Float,
        AccessorType::Vec2,
        count,
        Some(BufferTarget::ArrayBuffer),
    );
    if count > 0 {
        model.accessors[accessor].min = minimum.to_array().to_vec();
        model.accessors[accessor].max = maximum.to_array().to_vec();
    }
    Some(accessor)
}

/// `offset / size` clamped to `[0, 1]`, zero along a collapsed axis.
fn unit_fraction(offset: f64, size: f64) -> f64 {
    if size > 0.0 { (offset / size).clamp(0.0, 1.0) } else { 0.0 }
}

/// Projects a position, trying the equivalent longitude on the other side of
/// the antimeridian when the position sits on it and lands outside
/// `rectangle`.
fn project_near_rectangle(projection: &Projection, rectangle: &Rectangle, cartographic: &Cartographic) -> DVec2 {
    let projected = project_position(projection, cartographic).truncate();

    let on_antimeridian = (cartographic.longitude.abs() - PI).abs() < ANTIMERIDIAN_EPSILON;
    let outside = projected.x < rectangle.minimum_x
        || projected.x > rectangle.maximum_x
        || projected.y < rectangle.minimum_y
        || projected.y > rectangle.maximum_y;
    if !on_antimeridian || !outside {
        return projected;
    }

    let shift = if cartographic.longitude < 0.0 { TAU } else { -TAU };
    let wrapped = Cartographic::new(cartographic.longitude + shift, cartographic.latitude, cartographic.height);
    let wrapped_projected = project_position(projection, &wrapped).truncate();

    if rectangle.compute_signed_distance(wrapped_projected) < rectangle.compute_signed_distance(projected) {
        wrapped_projected
    } else {
        projected
    }
}
