//! Animation channel extraction.
//!
//! Host curves animate single scalars addressed by data path. They are
//! regrouped into typed channels (translation, rotation, scale), each
//! driving one element of the target's stacked transform. Curves that do
//! not interpolate linearly, and objects moved by constraints, are first
//! resampled into per-frame linear keys.

use osgx_math::{axis_vector, Mat4, Mat4Ext, Quat, RotationOrder, Vec3};

use crate::config::ExportConfig;
use crate::graph::{Channel, ChannelKeys, StackedElement};
use crate::joblog::ExportLog;
use crate::source::{
    BakedSample, Interpolation, RotationMode, SourceAction, SourceCurve, SourceKeyframe,
    SourceObject,
};
use crate::weld::sanitize;

/// Stacked element and channel names for each Euler axis.
pub const EULER_CHANNELS: [&str; 3] = ["euler_x", "euler_y", "euler_z"];

/// Transform property animated by a curve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Property {
    Location,
    RotationEuler,
    RotationQuaternion,
    RotationAxisAngle,
    Scale,
}

/// Parsed curve data path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurvePath {
    /// Bone named by a `pose.bones["..."]` prefix
    pub bone: Option<String>,
    pub property: Property,
}

/// Split a host data path such as `pose.bones["Arm"].location`.
pub fn parse_data_path(path: &str) -> Option<CurvePath> {
    let (bone, property) = match path.strip_prefix("pose.bones[\"") {
        Some(rest) => {
            let end = rest.find("\"]")?;
            let property = rest[end + 2..].strip_prefix('.')?;
            (Some(rest[..end].to_string()), property)
        }
        None => (None, path),
    };
    let property = match property {
        "location" => Property::Location,
        "rotation_euler" => Property::RotationEuler,
        "rotation_quaternion" => Property::RotationQuaternion,
        "rotation_axis_angle" => Property::RotationAxisAngle,
        "scale" => Property::Scale,
        _ => return None,
    };
    Some(CurvePath { bone, property })
}

/// Converts frame numbers to seconds.
#[derive(Clone, Copy, Debug)]
pub struct TimeBase {
    pub fps: f32,
    pub frame_start: f32,
}

impl TimeBase {
    pub fn seconds(&self, frame: f32) -> f32 {
        (frame - self.frame_start) / self.fps
    }
}

/// Evaluate a curve at `frame`, holding the end values outside its range.
pub fn evaluate_curve(keys: &[SourceKeyframe], frame: f32) -> f32 {
    let (Some(first), Some(last)) = (keys.first(), keys.last()) else {
        return 0.0;
    };
    if frame <= first.frame {
        return first.value;
    }
    if frame >= last.frame {
        return last.value;
    }
    let next = keys.partition_point(|k| k.frame <= frame);
    let k0 = &keys[next - 1];
    let k1 = &keys[next];
    let span = k1.frame - k0.frame;
    if span <= 0.0 {
        return k1.value;
    }
    match k0.interpolation {
        Interpolation::Constant => k0.value,
        Interpolation::Linear => k0.value + (k1.value - k0.value) * (frame - k0.frame) / span,
        Interpolation::Bezier => bezier_value(k0, k1, frame),
    }
}

/// Value of the cubic segment between two keys at `frame`. Handle frames
/// are clamped into the segment so the curve stays a function of time.
fn bezier_value(k0: &SourceKeyframe, k1: &SourceKeyframe, frame: f32) -> f32 {
    let span = k1.frame - k0.frame;
    let rise = k1.value - k0.value;
    let h0 = k0
        .handle_right
        .unwrap_or([k0.frame + span / 3.0, k0.value + rise / 3.0]);
    let h1 = k1
        .handle_left
        .unwrap_or([k1.frame - span / 3.0, k1.value - rise / 3.0]);

    let xs = [
        k0.frame,
        h0[0].clamp(k0.frame, k1.frame),
        h1[0].clamp(k0.frame, k1.frame),
        k1.frame,
    ];
    let ys = [k0.value, h0[1], h1[1], k1.value];

    let cubic = |p: &[f32; 4], t: f32| {
        let u = 1.0 - t;
        u * u * u * p[0] + 3.0 * u * u * t * p[1] + 3.0 * u * t * t * p[2] + t * t * t * p[3]
    };

    let (mut lo, mut hi) = (0.0f32, 1.0f32);
    for _ in 0..40 {
        let mid = 0.5 * (lo + hi);
        if cubic(&xs, mid) < frame {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    cubic(&ys, 0.5 * (lo + hi))
}

/// True when some segment of the curves is not linear.
pub fn needs_resampling(curves: &[&SourceCurve]) -> bool {
    curves.iter().any(|curve| {
        let segments = curve.keyframes.len().saturating_sub(1);
        curve.keyframes[..segments]
            .iter()
            .any(|k| k.interpolation != Interpolation::Linear)
    })
}

/// Upper bound on the frames produced by one resampling.
pub const MAX_BAKE_SAMPLES: usize = 100_000;

/// Frames from the first to the last key every `step` frames, always
/// including the last key frame. Empty when the range would need more
/// than [`MAX_BAKE_SAMPLES`] frames.
pub fn bake_frames(curves: &[&SourceCurve], step: u32) -> Vec<f32> {
    let mut frames = curves
        .iter()
        .flat_map(|c| c.keyframes.iter().map(|k| k.frame))
        .filter(|f| f.is_finite());
    let Some(first) = frames.next() else {
        return Vec::new();
    };
    let (start, end) = frames.fold((first, first), |(lo, hi), f| (lo.min(f), hi.max(f)));

    let step = f64::from(step.max(1));
    let span = (f64::from(end) - f64::from(start)) / step;
    if span > MAX_BAKE_SAMPLES as f64 {
        return Vec::new();
    }

    let count = span.ceil() as usize;
    let mut result: Vec<f32> = Vec::with_capacity(count + 1);
    for i in 0..count {
        let frame = (f64::from(start) + i as f64 * step) as f32;
        // Large frames lose precision; adjacent samples may collapse.
        if frame >= end || result.last().is_some_and(|&last| frame <= last) {
            continue;
        }
        result.push(frame);
    }
    result.push(end);
    result
}

/// Values used for components that have no curve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RestPose {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl RestPose {
    /// Pose-relative rest: no offset from the bind matrix.
    pub const IDENTITY: RestPose = RestPose {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_matrix(matrix: Mat4) -> Self {
        let (translation, rotation, scale) = matrix.to_trs();
        Self {
            translation,
            rotation,
            scale,
        }
    }
}

/// Rotation elements for a rotation mode, replayed outermost first.
pub fn rotation_elements(mode: RotationMode, rotation: Quat) -> Vec<StackedElement> {
    match mode {
        RotationMode::Quaternion | RotationMode::AxisAngle => vec![StackedElement::Quaternion {
            name: "quaternion".to_string(),
            value: rotation,
        }],
        RotationMode::Euler(order) => {
            let angles = order.from_quat(rotation);
            order
                .axes()
                .iter()
                .rev()
                .map(|&axis| StackedElement::RotateAxis {
                    name: EULER_CHANNELS[axis].to_string(),
                    axis: axis_vector(axis),
                    angle: angles[axis],
                })
                .collect()
        }
    }
}

/// Stack reproducing `matrix` as translate, rotation and scale elements.
pub fn transform_stack(matrix: Mat4, mode: RotationMode) -> Vec<StackedElement> {
    let rest = RestPose::from_matrix(matrix);
    let mut stack = vec![StackedElement::Translate {
        name: "translate".to_string(),
        value: rest.translation,
    }];
    stack.extend(rotation_elements(mode, rest.rotation));
    stack.push(StackedElement::Scale {
        name: "scale".to_string(),
        value: rest.scale,
    });
    stack
}

/// Stack of a bone: its rest matrix followed by pose-relative elements.
pub fn bone_stack(rest_local: Mat4, mode: RotationMode) -> Vec<StackedElement> {
    let mut stack = vec![
        StackedElement::Matrix {
            name: "matrix".to_string(),
            value: rest_local,
        },
        StackedElement::Translate {
            name: "translate".to_string(),
            value: Vec3::ZERO,
        },
    ];
    stack.extend(rotation_elements(mode, Quat::IDENTITY));
    stack.push(StackedElement::Scale {
        name: "scale".to_string(),
        value: Vec3::ONE,
    });
    stack
}

/// Keep consecutive quaternions in the same hemisphere.
fn make_continuous(keys: &mut [(f32, Quat)]) {
    for i in 1..keys.len() {
        if keys[i - 1].1.dot(keys[i].1) < 0.0 {
            keys[i].1 = -keys[i].1;
        }
    }
}

fn axis_angle_quat(angle: f32, axis: Vec3) -> Quat {
    let axis = axis.normalize_or_zero();
    if axis == Vec3::ZERO {
        Quat::IDENTITY
    } else {
        Quat::from_axis_angle(axis, angle)
    }
}

/// Where key times come from.
enum Sampling {
    /// The curves' own keyframes
    Keys,
    /// Fixed resampling frames
    Frames(Vec<f32>),
}

/// Curves of one target grouped by component.
struct CurveSet<'a> {
    curves: Vec<(Property, &'a SourceCurve)>,
}

impl<'a> CurveSet<'a> {
    fn component(&self, property: Property, index: usize) -> Option<&'a SourceCurve> {
        self.curves
            .iter()
            .find(|(p, c)| *p == property && c.array_index == index)
            .map(|(_, c)| *c)
    }

    fn has(&self, property: Property) -> bool {
        self.curves.iter().any(|(p, _)| *p == property)
    }

    fn all(&self) -> Vec<&'a SourceCurve> {
        self.curves.iter().map(|(_, c)| *c).collect()
    }

    /// Frames at which the given components are sampled.
    fn frames(&self, property: Property, indices: &[usize], sampling: &Sampling) -> Vec<f32> {
        let mut frames: Vec<f32> = match sampling {
            Sampling::Frames(frames) => return frames.clone(),
            Sampling::Keys => indices
                .iter()
                .filter_map(|&i| self.component(property, i))
                .flat_map(|c| c.keyframes.iter().map(|k| k.frame))
                .filter(|f| f.is_finite())
                .collect(),
        };
        frames.sort_by(|a, b| a.total_cmp(b));
        frames.dedup();
        frames
    }

    fn value(&self, property: Property, index: usize, frame: f32, default: f32) -> f32 {
        match self.component(property, index) {
            Some(curve) => sanitize(evaluate_curve(&curve.keyframes, frame)),
            None => default,
        }
    }
}

/// Converts host curves and baked samples into channels.
#[derive(Clone, Debug)]
pub struct ChannelExtractor {
    time: TimeBase,
    bake_step: u32,
    bake_constraints: bool,
}

impl ChannelExtractor {
    pub fn new(config: &ExportConfig, frame_start: i32) -> Self {
        Self {
            time: TimeBase {
                fps: config.anim_fps,
                frame_start: frame_start as f32,
            },
            bake_step: config.bake_frame_step,
            bake_constraints: config.bake_constraints,
        }
    }

    /// Channels animating an object's own transform. An empty result
    /// means the object exports statically.
    pub fn object_channels(
        &self,
        object: &SourceObject,
        action: Option<&SourceAction>,
        local: Mat4,
        log: &mut ExportLog,
    ) -> Vec<Channel> {
        if object.has_constraints && self.bake_constraints {
            if object.baked.is_empty() {
                log.warn(format!(
                    "Object '{}' is constrained but no baked samples were supplied; animation skipped",
                    object.name
                ));
                return Vec::new();
            }
            return self.baked_channels(&object.baked, &object.name, object.rotation_mode);
        }

        let Some(action) = action else {
            return Vec::new();
        };
        let curves = Self::target_curves(action, None);
        self.curve_channels(
            &curves,
            &object.name,
            object.rotation_mode,
            &RestPose::from_matrix(local),
            log,
        )
    }

    /// Channels animating one pose bone, relative to its rest matrix.
    pub fn bone_channels(
        &self,
        action: &SourceAction,
        bone: &str,
        mode: RotationMode,
        log: &mut ExportLog,
    ) -> Vec<Channel> {
        let curves = Self::target_curves(action, Some(bone));
        self.curve_channels(&curves, bone, mode, &RestPose::IDENTITY, log)
    }

    /// Bone names addressed by the action's curves, in first-seen order.
    pub fn animated_bones(action: &SourceAction) -> Vec<String> {
        let mut bones: Vec<String> = Vec::new();
        for curve in &action.curves {
            if let Some(CurvePath { bone: Some(bone), .. }) = parse_data_path(&curve.data_path) {
                if !bones.contains(&bone) {
                    bones.push(bone);
                }
            }
        }
        bones
    }

    fn target_curves<'a>(action: &'a SourceAction, bone: Option<&str>) -> CurveSet<'a> {
        let curves = action
            .curves
            .iter()
            .filter_map(|curve| {
                let path = parse_data_path(&curve.data_path)?;
                (path.bone.as_deref() == bone).then_some((path.property, curve))
            })
            .collect();
        CurveSet { curves }
    }

    fn curve_channels(
        &self,
        set: &CurveSet<'_>,
        target: &str,
        mode: RotationMode,
        rest: &RestPose,
        log: &mut ExportLog,
    ) -> Vec<Channel> {
        if set.curves.is_empty() {
            return Vec::new();
        }

        let sampling = if needs_resampling(&set.all()) {
            let frames = bake_frames(&set.all(), self.bake_step);
            if frames.is_empty() {
                log.warn(format!(
                    "Resampling the curves of '{}' produced no samples; animation skipped",
                    target
                ));
                return Vec::new();
            }
            log::debug!("Resampling '{}' at {} frames", target, frames.len());
            Sampling::Frames(frames)
        } else {
            Sampling::Keys
        };

        let mut channels = Vec::new();

        if set.has(Property::Location) {
            let keys = self.vec3_keys(set, Property::Location, rest.translation, &sampling);
            channels.push(Channel::new("translate", target, ChannelKeys::Vec3(keys)));
        }

        match mode {
            RotationMode::Euler(order) => {
                if set.has(Property::RotationEuler) {
                    channels.extend(self.euler_channels(set, target, order, rest, &sampling));
                }
            }
            RotationMode::Quaternion => {
                if set.has(Property::RotationQuaternion) {
                    let frames = set.frames(Property::RotationQuaternion, &[0, 1, 2, 3], &sampling);
                    let r = rest.rotation;
                    let mut keys: Vec<(f32, Quat)> = frames
                        .iter()
                        .map(|&frame| {
                            let w = set.value(Property::RotationQuaternion, 0, frame, r.w);
                            let x = set.value(Property::RotationQuaternion, 1, frame, r.x);
                            let y = set.value(Property::RotationQuaternion, 2, frame, r.y);
                            let z = set.value(Property::RotationQuaternion, 3, frame, r.z);
                            (self.time.seconds(frame), Quat::from_xyzw(x, y, z, w).normalize())
                        })
                        .collect();
                    make_continuous(&mut keys);
                    channels.push(Channel::new("quaternion", target, ChannelKeys::Quat(keys)));
                }
            }
            RotationMode::AxisAngle => {
                if set.has(Property::RotationAxisAngle) {
                    let (rest_axis, rest_angle) = rest.rotation.to_axis_angle();
                    let frames = set.frames(Property::RotationAxisAngle, &[0, 1, 2, 3], &sampling);
                    let mut keys: Vec<(f32, Quat)> = frames
                        .iter()
                        .map(|&frame| {
                            let angle = set.value(Property::RotationAxisAngle, 0, frame, rest_angle);
                            let axis = Vec3::new(
                                set.value(Property::RotationAxisAngle, 1, frame, rest_axis.x),
                                set.value(Property::RotationAxisAngle, 2, frame, rest_axis.y),
                                set.value(Property::RotationAxisAngle, 3, frame, rest_axis.z),
                            );
                            (self.time.seconds(frame), axis_angle_quat(angle, axis))
                        })
                        .collect();
                    make_continuous(&mut keys);
                    channels.push(Channel::new("quaternion", target, ChannelKeys::Quat(keys)));
                }
            }
        }

        if set.has(Property::Scale) {
            let keys = self.vec3_keys(set, Property::Scale, rest.scale, &sampling);
            channels.push(Channel::new("scale", target, ChannelKeys::Vec3(keys)));
        }

        if channels.is_empty() {
            log::debug!("No curves of '{}' match its rotation mode or properties", target);
        }
        channels
    }

    fn vec3_keys(
        &self,
        set: &CurveSet<'_>,
        property: Property,
        rest: Vec3,
        sampling: &Sampling,
    ) -> Vec<(f32, Vec3)> {
        set.frames(property, &[0, 1, 2], sampling)
            .into_iter()
            .map(|frame| {
                let v = Vec3::new(
                    set.value(property, 0, frame, rest.x),
                    set.value(property, 1, frame, rest.y),
                    set.value(property, 2, frame, rest.z),
                );
                (self.time.seconds(frame), v)
            })
            .collect()
    }

    /// One scalar channel per animated axis, each timed by its own curve.
    fn euler_channels(
        &self,
        set: &CurveSet<'_>,
        target: &str,
        order: RotationOrder,
        rest: &RestPose,
        sampling: &Sampling,
    ) -> Vec<Channel> {
        let rest_angles = order.from_quat(rest.rotation);
        order
            .axes()
            .iter()
            .filter(|&&axis| set.component(Property::RotationEuler, axis).is_some())
            .map(|&axis| {
                let keys = set
                    .frames(Property::RotationEuler, &[axis], sampling)
                    .into_iter()
                    .map(|frame| {
                        let angle = set.value(Property::RotationEuler, axis, frame, rest_angles[axis]);
                        (self.time.seconds(frame), angle)
                    })
                    .collect();
                Channel::new(EULER_CHANNELS[axis], target, ChannelKeys::Float(keys))
            })
            .collect()
    }

    /// Channels from host-evaluated local matrices.
    fn baked_channels(&self, samples: &[BakedSample], target: &str, mode: RotationMode) -> Vec<Channel> {
        let mut samples: Vec<(f32, Mat4)> = samples
            .iter()
            .filter(|s| s.frame.is_finite())
            .map(|s| (s.frame, osgx_math::mat4_from_rows(&s.matrix).sanitized()))
            .collect();
        samples.sort_by(|a, b| a.0.total_cmp(&b.0));

        let poses: Vec<(f32, RestPose)> = samples
            .iter()
            .map(|(frame, m)| (self.time.seconds(*frame), RestPose::from_matrix(*m)))
            .collect();

        let mut channels = vec![Channel::new(
            "translate",
            target,
            ChannelKeys::Vec3(poses.iter().map(|(t, p)| (*t, p.translation)).collect()),
        )];

        match mode {
            RotationMode::Quaternion | RotationMode::AxisAngle => {
                let mut keys: Vec<(f32, Quat)> = poses.iter().map(|(t, p)| (*t, p.rotation)).collect();
                make_continuous(&mut keys);
                channels.push(Channel::new("quaternion", target, ChannelKeys::Quat(keys)));
            }
            RotationMode::Euler(order) => {
                let angles: Vec<(f32, Vec3)> = poses
                    .iter()
                    .map(|(t, p)| (*t, order.from_quat(p.rotation)))
                    .collect();
                for axis in order.axes() {
                    let keys = angles.iter().map(|(t, a)| (*t, a[axis])).collect();
                    channels.push(Channel::new(EULER_CHANNELS[axis], target, ChannelKeys::Float(keys)));
                }
            }
        }

        channels.push(Channel::new(
            "scale",
            target,
            ChannelKeys::Vec3(poses.iter().map(|(t, p)| (*t, p.scale)).collect()),
        ));
        channels
    }
}
