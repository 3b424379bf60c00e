use crate::{Mesh, MeshPrimitive, Model};
use bevy_log::debug;
use bevy_math::DMat4;

/// One primitive reached while walking a scene, with the transform from its
/// mesh into the model's root frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimitiveInstance {
    pub mesh: usize,
    pub primitive: usize,
    pub transform: DMat4,
}

/// Every primitive instanced by `scene`, or by the model's default scene
/// when `scene` is `None`.
///
/// A model without scenes is walked from its first node, and a model without
/// nodes yields each primitive once with the identity transform.
pub fn primitives_in_scene(model: &Model, scene: Option<usize>) -> Vec<PrimitiveInstance> {
    let mut instances = Vec::new();

    let scene = scene
        .or(model.scene)
        .or_else(|| (!model.scenes.is_empty()).then_some(0));

    match scene.and_then(|scene| model.scenes.get(scene)) {
        Some(scene) => {
            for &node in &scene.nodes {
                visit_node(model, node, DMat4::IDENTITY, 0, &mut instances);
            }
        }
        None if !model.nodes.is_empty() => {
            visit_node(model, 0, DMat4::IDENTITY, 0, &mut instances);
        }
        None => {
            for (mesh, primitives) in model.meshes.iter().enumerate() {
                for primitive in 0..primitives.primitives.len() {
                    instances.push(PrimitiveInstance {
                        mesh,
                        primitive,
                        transform: DMat4::IDENTITY,
                    });
                }
            }
        }
    }

    instances
}

pub fn for_each_primitive_in_scene(
    model: &Model,
    scene: Option<usize>,
    mut callback: impl FnMut(&Model, &Mesh, &MeshPrimitive, DMat4),
) {
    for instance in primitives_in_scene(model, scene) {
        let mesh = &model.meshes[instance.mesh];
        callback(model, mesh, &mesh.primitives[instance.primitive], instance.transform);
    }
}

fn visit_node(
    model: &Model,
    index: usize,
    parent_transform: DMat4,
    depth: usize,
    instances: &mut Vec<PrimitiveInstance>,
) {
    let Some(node) = model.nodes.get(index) else {
        debug!("Skipping missing glTF node {index}");
        return;
    };
    // Node graphs must be trees, a cycle would recurse forever.
    if depth > model.nodes.len() {
        debug!("Skipping glTF node {index}, the node graph has a cycle");
        return;
    }

    let transform = parent_transform * node.local_transform();

    if let Some(mesh_index) = node.mesh {
        match model.meshes.get(mesh_index) {
            Some(mesh) => {
                for primitive in 0..mesh.primitives.len() {
                    instances.push(PrimitiveInstance {
                        mesh: mesh_index,
                        primitive,
                        transform,
                    });
                }
            }
            None => debug!("glTF node {index} references missing mesh {mesh_index}"),
        }
    }

    for &child in &node.children {
        visit_node(model, child, transform, depth + 1, instances);
    }
}
