use bevy_math::{DMat4, DVec4};
use serde::{Deserialize, Serialize};

/// Rotates glTF's Y-up coordinates into the Z-up frame of 3D Tiles, a
/// quarter turn around X.
pub const Y_UP_TO_Z_UP: DMat4 = DMat4::from_cols(
    DVec4::new(1.0, 0.0, 0.0, 0.0),
    DVec4::new(0.0, 0.0, 1.0, 0.0),
    DVec4::new(0.0, -1.0, 0.0, 0.0),
    DVec4::new(0.0, 0.0, 0.0, 1.0),
);

pub const Z_UP_TO_Y_UP: DMat4 = DMat4::from_cols(
    DVec4::new(1.0, 0.0, 0.0, 0.0),
    DVec4::new(0.0, 0.0, -1.0, 0.0),
    DVec4::new(0.0, 1.0, 0.0, 0.0),
    DVec4::new(0.0, 0.0, 0.0, 1.0),
);

/// The up axis a tileset declares for its glTF content.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum UpAxis {
    X,
    #[default]
    Y,
    Z,
}

impl UpAxis {
    /// Transform from model coordinates into the Z-up tile frame.
    pub const fn to_z_up(self) -> DMat4 {
        match self {
            // A quarter turn around Y maps +X onto +Z.
            Self::X => DMat4::from_cols(
                DVec4::new(0.0, 0.0, 1.0, 0.0),
                DVec4::new(0.0, 1.0, 0.0, 0.0),
                DVec4::new(-1.0, 0.0, 0.0, 0.0),
                DVec4::new(0.0, 0.0, 0.0, 1.0),
            ),
            Self::Y => Y_UP_TO_Z_UP,
            Self::Z => DMat4::IDENTITY,
        }
    }
}
