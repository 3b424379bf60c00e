use bevy_math::{DMat4, DQuat, DVec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentType {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    UnsignedInt,
    Float,
}

impl ComponentType {
    pub const fn byte_size(self) -> usize {
        match self {
            Self::Byte | Self::UnsignedByte => 1,
            Self::Short | Self::UnsignedShort => 2,
            Self::UnsignedInt | Self::Float => 4,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccessorType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl AccessorType {
    pub const fn component_count(self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 | Self::Mat2 => 4,
            Self::Mat3 => 9,
            Self::Mat4 => 16,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferTarget {
    ArrayBuffer,
    ElementArrayBuffer,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PrimitiveMode {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Buffer {
    pub data: Vec<u8>,
}

impl Buffer {
    pub fn byte_length(&self) -> usize {
        self.data.len()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BufferView {
    pub buffer: usize,
    pub byte_offset: usize,
    pub byte_length: usize,
    pub byte_stride: Option<usize>,
    pub target: Option<BufferTarget>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Accessor {
    pub buffer_view: Option<usize>,
    pub byte_offset: usize,
    pub component_type: ComponentType,
    pub normalized: bool,
    pub count: usize,
    pub accessor_type: AccessorType,
    pub min: Vec<f64>,
    pub max: Vec<f64>,
}

impl Accessor {
    /// Size of one element, without padding.
    pub fn element_size(&self) -> usize {
        self.component_type.byte_size() * self.accessor_type.component_count()
    }

    /// The distance between consecutive elements, taking the buffer view's
    /// stride into account. `None` if the buffer view does not exist.
    pub fn byte_stride(&self, model: &Model) -> Option<usize> {
        let view = model.buffer_views.get(self.buffer_view?)?;
        Some(view.byte_stride.unwrap_or_else(|| self.element_size()))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct MeshPrimitive {
    /// Attribute semantic to accessor index.
    pub attributes: BTreeMap<String, usize>,
    pub indices: Option<usize>,
    pub mode: PrimitiveMode,
    pub material: Option<usize>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub primitives: Vec<MeshPrimitive>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Node {
    pub mesh: Option<usize>,
    pub children: Vec<usize>,
    /// Column-major, takes precedence over translation, rotation and scale.
    pub matrix: Option<[f64; 16]>,
    pub translation: Option<[f64; 3]>,
    /// Quaternion as `[x, y, z, w]`.
    pub rotation: Option<[f64; 4]>,
    pub scale: Option<[f64; 3]>,
}

impl Node {
    pub fn local_transform(&self) -> DMat4 {
        if let Some(matrix) = self.matrix {
            return DMat4::from_cols_array(&matrix);
        }

        let translation = self.translation.map_or(DVec3::ZERO, DVec3::from_array);
        let rotation = self.rotation.map_or(DQuat::IDENTITY, DQuat::from_array);
        let scale = self.scale.map_or(DVec3::ONE, DVec3::from_array);
        DMat4::from_scale_rotation_translation(scale, rotation, translation)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Scene {
    pub nodes: Vec<usize>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Model {
    pub buffers: Vec<Buffer>,
    pub buffer_views: Vec<BufferView>,
    pub accessors: Vec<Accessor>,
    pub meshes: Vec<Mesh>,
    pub nodes: Vec<Node>,
    pub scenes: Vec<Scene>,
    pub scene: Option<usize>,
    /// Free-form string properties, such as the URL the model came from.
    pub extras: BTreeMap<String, String>,
}

impl Model {
    /// Appends `data` as a new buffer with one buffer view covering all of
    /// it and one tightly packed accessor reading it. Returns the accessor
    /// index.
    pub fn add_accessor_with_buffer(
        &mut self,
        data: Vec<u8>,
        component_type: ComponentType,
        accessor_type: AccessorType,
        count: usize,
        target: Option<BufferTarget>,
    ) -> usize {
        let buffer = self.buffers.len();
        let byte_length = data.len();
        self.buffers.push(Buffer { data });

        let buffer_view = self.buffer_views.len();
        self.buffer_views.push(BufferView {
            buffer,
            byte_offset: 0,
            byte_length,
            byte_stride: None,
            target,
        });

        self.accessors.push(Accessor {
            buffer_view: Some(buffer_view),
            byte_offset: 0,
            component_type,
            normalized: false,
            count,
            accessor_type,
            min: Vec::new(),
            max: Vec::new(),
        });
        self.accessors.len() - 1
    }

    /// Bytes held by all buffers.
    pub fn buffer_byte_size(&self) -> usize {
        self.buffers.iter().map(Buffer::byte_length).sum()
    }
}
