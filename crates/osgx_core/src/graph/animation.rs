//! Animation data: clips, typed channels, update callbacks and the stacked
//! transform elements the channels drive.

use osgx_math::{Mat4, Quat, Vec3};

use super::ObjectId;

/// Keyframes of one channel, typed by value.
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelKeys {
    Float(Vec<(f32, f32)>),
    Vec3(Vec<(f32, Vec3)>),
    Quat(Vec<(f32, Quat)>),
}

impl ChannelKeys {
    /// Channel type tag in the text format.
    pub fn tag(&self) -> &'static str {
        match self {
            ChannelKeys::Float(_) => "FloatLinearChannel",
            ChannelKeys::Vec3(_) => "Vec3LinearChannel",
            ChannelKeys::Quat(_) => "QuatSphericalLinearChannel",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ChannelKeys::Float(k) => k.len(),
            ChannelKeys::Vec3(k) => k.len(),
            ChannelKeys::Quat(k) => k.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn times(&self) -> Vec<f32> {
        match self {
            ChannelKeys::Float(k) => k.iter().map(|(t, _)| *t).collect(),
            ChannelKeys::Vec3(k) => k.iter().map(|(t, _)| *t).collect(),
            ChannelKeys::Quat(k) => k.iter().map(|(t, _)| *t).collect(),
        }
    }

    /// Key values as written: one component list per key. Quaternions are
    /// (x, y, z, w).
    pub fn components(&self) -> Vec<(f32, Vec<f32>)> {
        match self {
            ChannelKeys::Float(k) => k.iter().map(|(t, v)| (*t, vec![*v])).collect(),
            ChannelKeys::Vec3(k) => k.iter().map(|(t, v)| (*t, v.to_array().to_vec())).collect(),
            ChannelKeys::Quat(k) => k.iter().map(|(t, q)| (*t, q.to_array().to_vec())).collect(),
        }
    }

    /// Sort by time and keep the first key of every timestamp.
    pub fn sort_dedup(&mut self) {
        fn apply<T>(keys: &mut Vec<(f32, T)>) {
            keys.sort_by(|a, b| a.0.total_cmp(&b.0));
            keys.dedup_by(|later, earlier| later.0 == earlier.0);
        }
        match self {
            ChannelKeys::Float(k) => apply(k),
            ChannelKeys::Vec3(k) => apply(k),
            ChannelKeys::Quat(k) => apply(k),
        }
    }
}

/// Keyframe track driving one stacked element of one target.
#[derive(Clone, Debug, PartialEq)]
pub struct Channel {
    /// Name of the driven stacked element (`translate`, `euler_x`, ...)
    pub name: String,
    /// Name of the update callback owning that element
    pub target: String,
    pub keys: ChannelKeys,
}

impl Channel {
    pub fn new(name: impl Into<String>, target: impl Into<String>, mut keys: ChannelKeys) -> Self {
        keys.sort_dedup();
        Self {
            name: name.into(),
            target: target.into(),
            keys,
        }
    }
}

/// One animation clip.
#[derive(Clone, Debug, Default)]
pub struct Animation {
    pub channels: Vec<Channel>,
}

/// Elementary transform replayed in order by an update callback.
#[derive(Clone, Debug, PartialEq)]
pub enum StackedElement {
    Translate { name: String, value: Vec3 },
    Quaternion { name: String, value: Quat },
    RotateAxis { name: String, axis: Vec3, angle: f32 },
    Scale { name: String, value: Vec3 },
    Matrix { name: String, value: Mat4 },
}

impl StackedElement {
    pub fn name(&self) -> &str {
        match self {
            StackedElement::Translate { name, .. }
            | StackedElement::Quaternion { name, .. }
            | StackedElement::RotateAxis { name, .. }
            | StackedElement::Scale { name, .. }
            | StackedElement::Matrix { name, .. } => name,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            StackedElement::Translate { .. } => "osgAnimation::StackedTranslateElement",
            StackedElement::Quaternion { .. } => "osgAnimation::StackedQuaternionElement",
            StackedElement::RotateAxis { .. } => "osgAnimation::StackedRotateAxisElement",
            StackedElement::Scale { .. } => "osgAnimation::StackedScaleElement",
            StackedElement::Matrix { .. } => "osgAnimation::StackedMatrixElement",
        }
    }

    /// Matrix contributed by this element.
    pub fn matrix(&self) -> Mat4 {
        match self {
            StackedElement::Translate { value, .. } => Mat4::from_translation(*value),
            StackedElement::Quaternion { value, .. } => Mat4::from_quat(*value),
            StackedElement::RotateAxis { axis, angle, .. } => Mat4::from_axis_angle(*axis, *angle),
            StackedElement::Scale { value, .. } => Mat4::from_scale(*value),
            StackedElement::Matrix { value, .. } => *value,
        }
    }
}

/// Compose a stack into the local matrix it reproduces.
pub fn compose_stack(stack: &[StackedElement]) -> Mat4 {
    stack
        .iter()
        .fold(Mat4::IDENTITY, |acc, element| acc * element.matrix())
}

/// Per-node update callbacks. These are nested in their owner and have no
/// identity of their own.
#[derive(Clone, Debug, PartialEq)]
pub enum UpdateCallback {
    MatrixTransform {
        name: String,
        stack: Vec<StackedElement>,
    },
    Bone {
        name: String,
        stack: Vec<StackedElement>,
    },
    Skeleton,
    AnimationManager {
        animations: Vec<ObjectId>,
    },
}

impl UpdateCallback {
    pub fn tag(&self) -> &'static str {
        match self {
            UpdateCallback::MatrixTransform { .. } => "osgAnimation::UpdateMatrixTransform",
            UpdateCallback::Bone { .. } => "osgAnimation::UpdateBone",
            UpdateCallback::Skeleton => "osgAnimation::UpdateSkeleton",
            UpdateCallback::AnimationManager { .. } => "osgAnimation::BasicAnimationManager",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sorts_and_dedups() {
        let channel = Channel::new(
            "euler_x",
            "Cube",
            ChannelKeys::Float(vec![(1.0, 3.0), (0.0, 1.0), (1.0, 9.0), (0.5, 2.0)]),
        );
        assert_eq!(channel.keys.times(), vec![0.0, 0.5, 1.0]);
        if let ChannelKeys::Float(keys) = &channel.keys {
            assert_eq!(keys[2].1, 3.0, "first key at a timestamp wins");
        }
    }

    #[test]
    fn test_quat_components_are_xyzw() {
        let q = Quat::from_xyzw(0.1, 0.2, 0.3, 0.9);
        let keys = ChannelKeys::Quat(vec![(0.0, q)]);
        let (_, values) = &keys.components()[0];
        assert_eq!(values.len(), 4);
        assert_eq!(values[3], 0.9);
        assert_eq!(values[0], 0.1);
    }

    #[test]
    fn test_compose_stack_order() {
        let stack = vec![
            StackedElement::Translate {
                name: "translate".into(),
                value: Vec3::new(1.0, 0.0, 0.0),
            },
            StackedElement::Scale {
                name: "scale".into(),
                value: Vec3::splat(2.0),
            },
        ];
        let m = compose_stack(&stack);
        let p = m.transform_point3(Vec3::new(1.0, 0.0, 0.0));
        assert!((p - Vec3::new(3.0, 0.0, 0.0)).length() < 1e-6);
    }
}
