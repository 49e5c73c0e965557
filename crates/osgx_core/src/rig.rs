//! Skeleton and rig assembly.
//!
//! Bones are rebuilt from the armature's rest matrices as a tree of
//! parent-relative transforms. Skinned geometries get one influence group
//! per vertex group, remapped onto the welded vertices.

use std::collections::{BTreeMap, HashSet};

use osgx_math::{Mat4, Mat4Ext};

use crate::animation::bone_stack;
use crate::graph::{
    Bone, DataVariance, MatrixTransform, ObjectData, ObjectId, RigGeometry, SceneGraph, Skeleton,
    UpdateCallback, VertexInfluence,
};
use crate::joblog::ExportLog;
use crate::source::{SourceArmature, SourceBone, SourceVertexGroup};

/// Weights below this are not written.
pub const WEIGHT_EPSILON: f32 = 0.001;

/// Build a skeleton node and its bone tree from an armature.
///
/// `matrix` places the skeleton under its parent. Bone matrices are in
/// skeleton space: root bones carry their armature-space rest matrix,
/// children the delta from their parent's rest matrix.
pub fn build_skeleton(
    graph: &mut SceneGraph,
    name: &str,
    armature: &SourceArmature,
    matrix: Mat4,
    log: &mut ExportLog,
) -> ObjectId {
    let mut skeleton = Skeleton {
        transform: MatrixTransform::new(matrix),
        ..Default::default()
    };
    skeleton
        .transform
        .group
        .node
        .update_callbacks
        .push(UpdateCallback::Skeleton);
    let skeleton_id = graph.add(name, DataVariance::Dynamic, ObjectData::Skeleton(skeleton));

    let known: HashSet<&str> = armature.bones.iter().map(|b| b.name.as_str()).collect();
    let mut built = HashSet::new();

    for bone in &armature.bones {
        let is_root = match bone.parent.as_deref() {
            None => true,
            Some(parent) if !known.contains(parent) => {
                log.warn(format!(
                    "Bone '{}' names missing parent '{}'; attached to the skeleton root",
                    bone.name, parent
                ));
                true
            }
            Some(_) => false,
        };
        if is_root {
            add_bone(graph, armature, bone, skeleton_id, None, &mut built);
        }
    }

    for bone in &armature.bones {
        if !built.contains(bone.name.as_str()) {
            log.warn(format!(
                "Bone '{}' is not reachable from a root bone of '{}'; skipped",
                bone.name, name
            ));
        }
    }

    collect_bones(graph, skeleton_id);
    skeleton_id
}

fn add_bone<'a>(
    graph: &mut SceneGraph,
    armature: &'a SourceArmature,
    bone: &'a SourceBone,
    parent_node: ObjectId,
    parent: Option<(ObjectId, Mat4)>,
    built: &mut HashSet<&'a str>,
) {
    if !built.insert(bone.name.as_str()) {
        return;
    }

    let bind = bone.bind_matrix().sanitized();
    let local = match parent {
        Some((_, parent_bind)) => parent_bind.delta_to(&bind),
        None => bind,
    };

    let mut data = Bone {
        transform: MatrixTransform::new(local),
        inverse_bind: bind.inverse().sanitized(),
        parent_bone: parent.map(|(id, _)| id),
    };
    data.transform
        .group
        .node
        .update_callbacks
        .push(UpdateCallback::Bone {
            name: bone.name.clone(),
            stack: bone_stack(local, bone.rotation_mode),
        });

    let id = graph.add(&bone.name, DataVariance::Dynamic, ObjectData::Bone(data));
    graph.add_child(parent_node, id);

    for child in armature
        .bones
        .iter()
        .filter(|b| b.parent.as_deref() == Some(bone.name.as_str()))
    {
        add_bone(graph, armature, child, id, Some((id, bind)), built);
    }
}

/// Fill the skeleton's name lookup with every bone below it.
pub fn collect_bones(graph: &mut SceneGraph, skeleton: ObjectId) {
    let mut table = BTreeMap::new();
    let mut pending: Vec<ObjectId> = graph.children(skeleton).to_vec();
    while let Some(id) = pending.pop() {
        if graph.bone(id).is_some() {
            table.insert(graph.name(id).to_string(), id);
            pending.extend_from_slice(graph.children(id));
        }
    }
    if let Some(skeleton) = graph.skeleton_mut(skeleton) {
        skeleton.bones = table;
    }
}

/// Bone-space matrix of an object parented to a bone.
pub fn bone_relative_matrix(armature_world: Mat4, bone_bind: Mat4, object_world: Mat4) -> Mat4 {
    (armature_world * bone_bind).delta_to(&object_world)
}

/// Influence groups for the welded vertices of one geometry.
///
/// `vertex_map` sends each source vertex to the welded vertices made from
/// it; every one of them receives the weight.
pub fn build_influences(
    groups: &[SourceVertexGroup],
    vertex_map: &BTreeMap<u32, Vec<u32>>,
    log: &mut ExportLog,
) -> Vec<VertexInfluence> {
    let mut influences = Vec::new();
    for group in groups {
        let mut weights: Vec<(u32, f32)> = group
            .weights
            .iter()
            .filter(|(_, w)| *w >= WEIGHT_EPSILON)
            .flat_map(|&(vertex, weight)| {
                vertex_map
                    .get(&vertex)
                    .into_iter()
                    .flatten()
                    .map(move |&out| (out, weight))
            })
            .collect();
        weights.sort_by_key(|(vertex, _)| *vertex);
        weights.dedup_by_key(|(vertex, _)| *vertex);

        if weights.is_empty() {
            log.warn(format!("Vertex group '{}' has no usable weights; dropped", group.name));
            continue;
        }
        influences.push(VertexInfluence {
            name: group.name.clone(),
            weights,
        });
    }
    influences
}

/// Wrap a geometry for skinning. The rig takes over the state set.
pub fn rig_geometry(
    graph: &mut SceneGraph,
    name: &str,
    source: ObjectId,
    influences: Vec<VertexInfluence>,
) -> ObjectId {
    let state_set = graph.geometry_mut(source).and_then(|g| g.state_set.take());
    graph.add(
        name,
        DataVariance::Dynamic,
        ObjectData::RigGeometry(RigGeometry {
            source,
            influences,
            state_set,
        }),
    )
}

/// Move `node` under `skeleton`, placing it with `matrix`.
pub fn reparent_to_skeleton(
    graph: &mut SceneGraph,
    node: ObjectId,
    skeleton: ObjectId,
    matrix: Mat4,
) -> bool {
    if graph.skeleton(skeleton).is_none() {
        return false;
    }
    if let Some(parent) = graph.parent_of(node) {
        graph.remove_child(parent, node);
    }
    if let Some(transform) = graph.transform_mut(node) {
        transform.matrix = matrix;
    }
    graph.add_child(skeleton, node)
}
