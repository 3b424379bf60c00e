//! The subset of a glTF model the raster overlay code reads and writes.
//!
//! # Explanation
//!
//! Parsing glTF files is left to the caller. A [`Model`] here is already
//! decoded: every buffer holds its bytes, and accessors are read through
//! [`AccessorView`], which checks every index against the model before
//! touching a byte.

mod accessor;
mod axes;
mod model;
mod traversal;

pub use self::{
    accessor::{AccessorError, AccessorView, IndexView},
    axes::{UpAxis, Y_UP_TO_Z_UP, Z_UP_TO_Y_UP},
    model::{
        Accessor, AccessorType, Buffer, BufferTarget, BufferView, ComponentType, Mesh,
        MeshPrimitive, Model, Node, PrimitiveMode, Scene,
    },
    traversal::{PrimitiveInstance, for_each_primitive_in_scene, primitives_in_scene},
};

#[doc(hidden)]
pub mod prelude {
    pub use crate::{
        Accessor, AccessorType, AccessorView, ComponentType, IndexView, Mesh, MeshPrimitive,
        Model, Y_UP_TO_Z_UP, for_each_primitive_in_scene,
    };
}
