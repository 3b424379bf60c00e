use crate::{AccessorType, ComponentType, Model};
use bytemuck::Pod;
use std::marker::PhantomData;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessorError {
    #[error("accessor {0} does not exist")]
    InvalidAccessorIndex(usize),
    #[error("accessor {0} has no valid buffer view")]
    InvalidBufferViewIndex(usize),
    #[error("buffer view of accessor {0} points at a missing buffer")]
    InvalidBufferIndex(usize),
    #[error("accessor {accessor} holds {found} byte elements, expected {expected}")]
    WrongElementSize {
        accessor: usize,
        expected: usize,
        found: usize,
    },
    #[error("accessor {0} reads past the end of its buffer")]
    BufferTooSmall(usize),
    #[error("accessor {0} does not hold vertex indices")]
    InvalidIndexType(usize),
}

/// Typed, bounds-checked access to the elements of an accessor.
///
/// `T` must have the same size as one element, for example `[f32; 3]` for
/// a `Vec3` of floats.
#[derive(Debug, Clone, Copy)]
pub struct AccessorView<'a, T> {
    data: &'a [u8],
    stride: usize,
    count: usize,
    marker: PhantomData<T>,
}

impl<'a, T: Pod> AccessorView<'a, T> {
    pub fn new(model: &'a Model, accessor_index: usize) -> Result<Self, AccessorError> {
        let accessor = model
            .accessors
            .get(accessor_index)
            .ok_or(AccessorError::InvalidAccessorIndex(accessor_index))?;

        let element_size = accessor.element_size();
        if element_size != size_of::<T>() {
            return Err(AccessorError::WrongElementSize {
                accessor: accessor_index,
                expected: size_of::<T>(),
                found: element_size,
            });
        }

        let view = accessor
            .buffer_view
            .and_then(|view| model.buffer_views.get(view))
            .ok_or(AccessorError::InvalidBufferViewIndex(accessor_index))?;
        let buffer = model
            .buffers
            .get(view.buffer)
            .ok_or(AccessorError::InvalidBufferIndex(accessor_index))?;

        let stride = view.byte_stride.unwrap_or(element_size);
        let start = view.byte_offset + accessor.byte_offset;

        let required = match accessor.count {
            0 => 0,
            count => stride * (count - 1) + element_size,
        };
        let view_end = view.byte_offset + view.byte_length;
        if accessor.byte_offset + required > view.byte_length || view_end > buffer.data.len() {
            return Err(AccessorError::BufferTooSmall(accessor_index));
        }

        Ok(Self {
            data: &buffer.data[start..start + required],
            stride,
            count: accessor.count,
            marker: PhantomData,
        })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn get(&self, index: usize) -> Option<T> {
        if index >= self.count {
            return None;
        }
        let start = index * self.stride;
        Some(bytemuck::pod_read_unaligned(
            &self.data[start..start + size_of::<T>()],
        ))
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.count).filter_map(|index| self.get(index))
    }
}

/// Vertex indices of any of the three integer widths glTF allows.
#[derive(Debug, Clone, Copy)]
pub enum IndexView<'a> {
    U8(AccessorView<'a, u8>),
    U16(AccessorView<'a, u16>),
    U32(AccessorView<'a, u32>),
}

impl<'a> IndexView<'a> {
    pub fn new(model: &'a Model, accessor_index: usize) -> Result<Self, AccessorError> {
        let accessor = model
            .accessors
            .get(accessor_index)
            .ok_or(AccessorError::InvalidAccessorIndex(accessor_index))?;

        if accessor.accessor_type != AccessorType::Scalar {
            return Err(AccessorError::InvalidIndexType(accessor_index));
        }

        match accessor.component_type {
            ComponentType::UnsignedByte => AccessorView::new(model, accessor_index).map(Self::U8),
            ComponentType::UnsignedShort => AccessorView::new(model, accessor_index).map(Self::U16),
            ComponentType::UnsignedInt => AccessorView::new(model, accessor_index).map(Self::U32),
            _ => Err(AccessorError::InvalidIndexType(accessor_index)),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::U8(view) => view.len(),
            Self::U16(view) => view.len(),
            Self::U32(view) => view.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<u32> {
        match self {
            Self::U8(view) => view.get(index).map(u32::from),
            Self::U16(view) => view.get(index).map(u32::from),
            Self::U32(view) => view.get(index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BufferView, Buffer};

    fn model() -> Model {
        let positions: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let mut model = Model::default();
        model.add_accessor_with_buffer(
            bytemuck::cast_slice(&positions).to_vec(),
            ComponentType::Float,
            AccessorType::Vec3,
            3,
            None,
        );
        model.add_accessor_with_buffer(
            vec![0, 1, 2],
            ComponentType::UnsignedByte,
            AccessorType::Scalar,
            3,
            None,
        );
        model
    }

    #[test]
    fn reads_positions() {
        let model = model();
        let view = AccessorView::<[f32; 3]>::new(&model, 0).unwrap();
        assert_eq!(view.len(), 3);
        assert_eq!(view.get(1), Some([1.0, 0.0, 0.0]));
        assert_eq!(view.get(3), None);
        assert_eq!(view.iter().count(), 3);
    }

    #[test]
    fn rejects_mismatched_types() {
        let model = model();
        assert_eq!(
            AccessorView::<[f32; 2]>::new(&model, 0).unwrap_err(),
            AccessorError::WrongElementSize {
                accessor: 0,
                expected: 8,
                found: 12
            }
        );
        assert_eq!(
            AccessorView::<[f32; 3]>::new(&model, 7).unwrap_err(),
            AccessorError::InvalidAccessorIndex(7)
        );
        assert!(IndexView::new(&model, 0).is_err());
    }

    #[test]
    fn reads_indices_of_any_width() {
        let model = model();
        let indices = IndexView::new(&model, 1).unwrap();
        assert!(matches!(indices, IndexView::U8(_)));
        assert_eq!(indices.get(2), Some(2));
        assert_eq!(indices.len(), 3);
    }

    #[test]
    fn strided_and_short_buffers() {
        let mut model = Model::default();
        // Two floats per element with a stride of 12 bytes.
        let floats: [f32; 6] = [1.0, 2.0, -1.0, 3.0, 4.0, -1.0];
        model.buffers.push(Buffer {
            data: bytemuck::cast_slice(&floats).to_vec(),
        });
        model.buffer_views.push(BufferView {
            buffer: 0,
            byte_offset: 0,
            byte_length: 24,
            byte_stride: Some(12),
            target: None,
        });
        model.accessors.push(crate::Accessor {
            buffer_view: Some(0),
            byte_offset: 0,
            component_type: ComponentType::Float,
            normalized: false,
            count: 2,
            accessor_type: AccessorType::Vec2,
            min: Vec::new(),
            max: Vec::new(),
        });

        let view = AccessorView::<[f32; 2]>::new(&model, 0).unwrap();
        assert_eq!(view.get(1), Some([3.0, 4.0]));

        model.accessors[0].count = 3;
        assert_eq!(
            AccessorView::<[f32; 2]>::new(&model, 0).unwrap_err(),
            AccessorError::BufferTooSmall(0)
        );
    }
}
