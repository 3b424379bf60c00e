//! Geometry tile content prepared for raster overlays.

mod texcoords;
mod upsample;

pub use self::{
    texcoords::{OVERLAY_ATTRIBUTE_PREFIX, create_raster_overlay_texture_coordinates, overlay_attribute_name},
    upsample::upsample_for_raster_overlays,
};
