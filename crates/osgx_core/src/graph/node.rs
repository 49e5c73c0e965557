//! Scene nodes: groups, transforms, skeletal nodes, geodes, light sources.

use std::collections::BTreeMap;

use osgx_math::Mat4;

use super::{ObjectId, UpdateCallback};

/// Attributes every scene node carries.
#[derive(Clone, Debug)]
pub struct NodeCore {
    pub culling_active: bool,
    pub state_set: Option<ObjectId>,
    pub update_callbacks: Vec<UpdateCallback>,
}

impl Default for NodeCore {
    fn default() -> Self {
        Self {
            culling_active: true,
            state_set: None,
            update_callbacks: Vec::new(),
        }
    }
}

/// Ordered list of child nodes.
#[derive(Clone, Debug, Default)]
pub struct Group {
    pub node: NodeCore,
    pub children: Vec<ObjectId>,
}

/// A group whose children are placed by one matrix.
#[derive(Clone, Debug)]
pub struct MatrixTransform {
    pub group: Group,
    pub matrix: Mat4,
}

impl Default for MatrixTransform {
    fn default() -> Self {
        Self {
            group: Group::default(),
            matrix: Mat4::IDENTITY,
        }
    }
}

impl MatrixTransform {
    pub fn new(matrix: Mat4) -> Self {
        Self {
            matrix,
            ..Default::default()
        }
    }
}

/// Root of a bone tree.
#[derive(Clone, Debug, Default)]
pub struct Skeleton {
    pub transform: MatrixTransform,

    /// Bones reachable below this skeleton, by name. Filled by the
    /// collection pass once the tree is built.
    pub bones: BTreeMap<String, ObjectId>,
}

impl Skeleton {
    pub fn bone(&self, name: &str) -> Option<ObjectId> {
        self.bones.get(name).copied()
    }
}

/// One bone: a transform relative to its parent bone (or the skeleton)
/// plus the skeleton-space inverse bind matrix used for skinning.
#[derive(Clone, Debug)]
pub struct Bone {
    pub transform: MatrixTransform,
    pub inverse_bind: Mat4,
    pub parent_bone: Option<ObjectId>,
}

impl Default for Bone {
    fn default() -> Self {
        Self {
            transform: MatrixTransform::default(),
            inverse_bind: Mat4::IDENTITY,
            parent_bone: None,
        }
    }
}

/// Leaf node holding drawables.
#[derive(Clone, Debug, Default)]
pub struct Geode {
    pub node: NodeCore,
    pub drawables: Vec<ObjectId>,
}

/// Node positioning one light.
#[derive(Clone, Debug)]
pub struct LightSource {
    pub node: NodeCore,
    pub light: ObjectId,
}

impl LightSource {
    pub fn new(light: ObjectId) -> Self {
        Self {
            node: NodeCore {
                culling_active: false,
                ..Default::default()
            },
            light,
        }
    }
}
