use super::texcoords::{OVERLAY_ATTRIBUTE_PREFIX, overlay_attribute_name};
use bevy_log::debug;
use bytemuck::Pod;
use tessera_geometry::{
    UpsampledQuadtreeNode,
    clip::{TriangleClipVertex, clip_triangle_at_axis_aligned_threshold},
};
use tessera_gltf::{
    AccessorType, AccessorView, BufferTarget, ComponentType, IndexView, MeshPrimitive, Model, PrimitiveMode,
};

const THRESHOLD: f64 = 0.5;

/// Builds the model of one quadrant of a tile that has no content of its
/// own, by clipping the parent's triangles.
///
/// Quadrants are taken in the parent's raster overlay texture coordinates
/// `texture_coordinate_id`, so `(0.5, 0.5)` is the split point. Float
/// vertex attributes are interpolated along clipped edges, other
/// attributes are dropped. Overlay texture coordinates are dropped too,
/// they are generated again for the child's rectangle.
///
/// Primitives that are not indexed triangles, lack overlay texture
/// coordinates, or have no triangle in the quadrant are left out.
pub fn upsample_for_raster_overlays(parent: &Model, child: UpsampledQuadtreeNode, texture_coordinate_id: u32) -> Model {
    let mut result = Model {
        meshes: parent.meshes.clone(),
        nodes: parent.nodes.clone(),
        scenes: parent.scenes.clone(),
        scene: parent.scene,
        extras: parent.extras.clone(),
        ..Default::default()
    };

    let uv_attribute = overlay_attribute_name(texture_coordinate_id);
    let mut meshes = std::mem::take(&mut result.meshes);
    for mesh in &mut meshes {
        mesh.primitives = mesh
            .primitives
            .iter()
            .filter_map(|primitive| upsample_primitive(parent, &mut result, primitive, child, &uv_attribute))
            .collect();
    }
    result.meshes = meshes;
    result
}

/// A float vertex attribute of the parent, flattened.
struct FloatAttribute {
    name: String,
    accessor_type: AccessorType,
    components: usize,
    input: Vec<f32>,
    output: Vec<f32>,
    minimum: Vec<f64>,
    maximum: Vec<f64>,
}

impl FloatAttribute {
    fn read(model: &Model, name: &str, accessor_index: usize) -> Option<Self> {
        let accessor = model.accessors.get(accessor_index)?;
        if accessor.component_type != ComponentType::Float {
            return None;
        }

        let components = accessor.accessor_type.component_count();
        let input = match components {
            1 => read_floats::<1>(model, accessor_index),
            2 => read_floats::<2>(model, accessor_index),
            3 => read_floats::<3>(model, accessor_index),
            4 => read_floats::<4>(model, accessor_index),
            9 => read_floats::<9>(model, accessor_index),
            16 => read_floats::<16>(model, accessor_index),
            _ => None,
        }?;

        Some(Self {
            name: name.to_string(),
            accessor_type: accessor.accessor_type,
            components,
            input,
            output: Vec::new(),
            minimum: vec![f64::MAX; components],
            maximum: vec![f64::MIN; components],
        })
    }

    fn vertex_count(&self) -> usize {
        self.input.len() / self.components
    }

    fn value(&self, vertex: usize, component: usize) -> f32 {
        self.input[vertex * self.components + component]
    }

    fn push(&mut self, component: usize, value: f32) {
        self.output.push(value);
        self.minimum[component] = self.minimum[component].min(f64::from(value));
        self.maximum[component] = self.maximum[component].max(f64::from(value));
    }
}

fn read_floats<const N: usize>(model: &Model, accessor_index: usize) -> Option<Vec<f32>>
where
    [f32; N]: Pod,
{
    let view = AccessorView::<[f32; N]>::new(model, accessor_index).ok()?;
    Some(view.iter().flatten().collect())
}

/// Resolves a clip vertex to a parent vertex and interpolation weight
/// pairs. Negative indices refer into `complements`, the result of the
/// previous clip.
fn resolve(vertex: &TriangleClipVertex, complements: &[TriangleClipVertex], weight: f64, output: &mut Vec<(usize, f64)>) {
    match *vertex {
        TriangleClipVertex::Index(index) if index < 0 => {
            if let Some(complement) = complements.get(!index as usize) {
                resolve(complement, &[], weight, output);
            }
        }
        TriangleClipVertex::Index(index) => output.push((index as usize, weight)),
        TriangleClipVertex::Interpolated(interpolated) => {
            let first = TriangleClipVertex::Index(interpolated.first);
            let second = TriangleClipVertex::Index(interpolated.second);
            resolve(&first, complements, weight * (1.0 - interpolated.t), output);
            resolve(&second, complements, weight * interpolated.t, output);
        }
    }
}

struct PrimitiveUpsampler<'a> {
    uvs: AccessorView<'a, [f32; 2]>,
    attributes: Vec<FloatAttribute>,
    /// Parent vertex index to child vertex index.
    vertex_map: Vec<Option<u32>>,
    vertex_count: u32,
    indices: Vec<u32>,
    weights: Vec<(usize, f64)>,
}

impl PrimitiveUpsampler<'_> {
    fn uv(&mut self, vertex: &TriangleClipVertex, complements: &[TriangleClipVertex]) -> [f64; 2] {
        self.weights.clear();
        resolve(vertex, complements, 1.0, &mut self.weights);

        let mut uv = [0.0; 2];
        for &(index, weight) in &self.weights {
            if let Some(value) = self.uvs.get(index) {
                uv[0] += f64::from(value[0]) * weight;
                uv[1] += f64::from(value[1]) * weight;
            }
        }
        uv
    }

    fn get_or_create_vertex(&mut self, vertex: &TriangleClipVertex, complements: &[TriangleClipVertex]) -> u32 {
        let vertex = match *vertex {
            TriangleClipVertex::Index(index) if index < 0 => match complements.get(!index as usize) {
                Some(complement) => *complement,
                None => *vertex,
            },
            _ => *vertex,
        };

        if let TriangleClipVertex::Index(index) = vertex
            && let Some(Some(existing)) = self.vertex_map.get(index as usize)
        {
            return *existing;
        }

        self.weights.clear();
        resolve(&vertex, complements, 1.0, &mut self.weights);
        for attribute in &mut self.attributes {
            for component in 0..attribute.components {
                let value = self
                    .weights
                    .iter()
                    .map(|&(index, weight)| f64::from(attribute.value(index, component)) * weight)
                    .sum::<f64>();
                attribute.push(component, value as f32);
            }
        }

        let created = self.vertex_count;
        self.vertex_count += 1;
        if let TriangleClipVertex::Index(index) = vertex
            && let Some(slot) = self.vertex_map.get_mut(index as usize)
        {
            *slot = Some(created);
        }
        created
    }

    fn add_clipped_polygon(&mut self, complements: &[TriangleClipVertex], polygon: &[TriangleClipVertex]) {
        if polygon.len() < 3 {
            return;
        }

        let first = self.get_or_create_vertex(&polygon[0], complements);
        let second = self.get_or_create_vertex(&polygon[1], complements);
        let third = self.get_or_create_vertex(&polygon[2], complements);
        self.indices.extend([first, second, third]);

        if let Some(fourth) = polygon.get(3) {
            let fourth = self.get_or_create_vertex(fourth, complements);
            self.indices.extend([first, third, fourth]);
        }
    }
}

fn upsample_primitive(
    parent: &Model,
    result: &mut Model,
    primitive: &MeshPrimitive,
    child: UpsampledQuadtreeNode,
    uv_attribute: &str,
) -> Option<MeshPrimitive> {
    if primitive.mode != PrimitiveMode::Triangles {
        debug!("Cannot upsample a primitive of {:?}", primitive.mode);
        return None;
    }

    let indices = IndexView::new(parent, primitive.indices?).ok()?;
    let uvs = AccessorView::<[f32; 2]>::new(parent, *primitive.attributes.get(uv_attribute)?).ok()?;

    let attributes = primitive
        .attributes
        .iter()
        .filter(|(name, _)| !name.starts_with(OVERLAY_ATTRIBUTE_PREFIX))
        .filter_map(|(name, &accessor)| FloatAttribute::read(parent, name, accessor))
        .collect::<Vec<_>>();
    if attributes.is_empty() {
        return None;
    }

    let parent_vertices = attributes
        .iter()
        .map(FloatAttribute::vertex_count)
        .fold(uvs.len(), usize::min);

    let mut upsampler = PrimitiveUpsampler {
        uvs,
        attributes,
        vertex_map: vec![None; parent_vertices],
        vertex_count: 0,
        indices: Vec::new(),
        weights: Vec::new(),
    };

    let keep_above_u = !child.is_west_child();
    let keep_above_v = !child.is_south_child();
    let mut clipped_u = Vec::new();
    let mut clipped_v = Vec::new();

    for triangle in 0..indices.len() / 3 {
        let corners = [0, 1, 2].map(|corner| indices.get(triangle * 3 + corner));
        let [Some(i0), Some(i1), Some(i2)] = corners else {
            continue;
        };
        if [i0, i1, i2].iter().any(|&index| index as usize >= parent_vertices) {
            continue;
        }
        let [i0, i1, i2] = [i0, i1, i2].map(|index| index as i32);

        let [uv0, uv1, uv2] = [i0, i1, i2].map(|index| upsampler.uvs.get(index as usize).unwrap_or_default());

        // East-west split first.
        clipped_u.clear();
        clip_triangle_at_axis_aligned_threshold(
            THRESHOLD,
            keep_above_u,
            i0,
            i1,
            i2,
            f64::from(uv0[0]),
            f64::from(uv1[0]),
            f64::from(uv2[0]),
            &mut clipped_u,
        );
        if clipped_u.len() < 3 {
            continue;
        }

        // Then north-south, once for a triangle and twice for a quad.
        let fans: &[[usize; 3]] = if clipped_u.len() > 3 {
            &[[0, 1, 2], [0, 2, 3]]
        } else {
            &[[0, 1, 2]]
        };
        for fan in fans {
            let [a, b, c] = fan.map(|corner| upsampler.uv(&clipped_u[corner], &[])[1]);
            clipped_v.clear();
            clip_triangle_at_axis_aligned_threshold(
                THRESHOLD,
                keep_above_v,
                !(fan[0] as i32),
                !(fan[1] as i32),
                !(fan[2] as i32),
                a,
                b,
                c,
                &mut clipped_v,
            );
            upsampler.add_clipped_polygon(&clipped_u, &clipped_v);
        }
    }

    if upsampler.indices.is_empty() {
        return None;
    }

    let dropped = primitive
        .attributes
        .keys()
        .filter(|name| !name.starts_with(OVERLAY_ATTRIBUTE_PREFIX))
        .filter(|name| upsampler.attributes.iter().all(|attribute| &attribute.name != *name))
        .collect::<Vec<_>>();
    if !dropped.is_empty() {
        debug!("Dropped attributes {dropped:?} that cannot be interpolated");
    }

    let mut upsampled = MeshPrimitive {
        mode: PrimitiveMode::Triangles,
        material: primitive.material,
        ..Default::default()
    };

    let vertex_count = upsampler.vertex_count as usize;
    for attribute in upsampler.attributes {
        let accessor = result.add_accessor_with_buffer(
            bytemuck::cast_slice(&attribute.output).to_vec(),
            ComponentType::Float,
            attribute.accessor_type,
            vertex_count,
            Some(BufferTarget::ArrayBuffer),
        );
        result.accessors[accessor].min = attribute.minimum;
        result.accessors[accessor].max = attribute.maximum;
        upsampled.attributes.insert(attribute.name, accessor);
    }

    let index_count = upsampler.indices.len();
    upsampled.indices = Some(result.add_accessor_with_buffer(
        bytemuck::cast_slice(&upsampler.indices).to_vec(),
        ComponentType::UnsignedInt,
        AccessorType::Scalar,
        index_count,
        Some(BufferTarget::ElementArrayBuffer),
    ));

    Some(upsampled)
}
