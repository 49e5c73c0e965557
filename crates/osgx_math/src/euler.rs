//! Rotation-order aware Euler angles.
//!
//! Host orders are extrinsic: `XYZ` rotates about X first, then Y, then Z,
//! so the composed rotation is `Rz · Ry · Rx`.

use glam::{EulerRot, Quat, Vec3};
use serde::Deserialize;

/// Euler rotation order as named by the authoring host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
pub enum RotationOrder {
    #[default]
    XYZ,
    XZY,
    YXZ,
    YZX,
    ZXY,
    ZYX,
}

impl RotationOrder {
    /// Axis indices (0 = X, 1 = Y, 2 = Z) in the order they are applied.
    pub fn axes(self) -> [usize; 3] {
        match self {
            RotationOrder::XYZ => [0, 1, 2],
            RotationOrder::XZY => [0, 2, 1],
            RotationOrder::YXZ => [1, 0, 2],
            RotationOrder::YZX => [1, 2, 0],
            RotationOrder::ZXY => [2, 0, 1],
            RotationOrder::ZYX => [2, 1, 0],
        }
    }

    /// Equivalent intrinsic order, outermost rotation first.
    fn intrinsic(self) -> EulerRot {
        match self {
            RotationOrder::XYZ => EulerRot::ZYX,
            RotationOrder::XZY => EulerRot::YZX,
            RotationOrder::YXZ => EulerRot::ZXY,
            RotationOrder::YZX => EulerRot::XZY,
            RotationOrder::ZXY => EulerRot::YXZ,
            RotationOrder::ZYX => EulerRot::XYZ,
        }
    }

    /// Compose per-axis angles (radians) into a rotation.
    pub fn to_quat(self, angles: Vec3) -> Quat {
        let mut q = Quat::IDENTITY;
        for axis in self.axes() {
            q = axis_rotation(axis, angles[axis]) * q;
        }
        q
    }

    /// Split a rotation into per-axis angles (radians) for this order.
    pub fn from_quat(self, rotation: Quat) -> Vec3 {
        let (outer, middle, inner) = rotation.normalize().to_euler(self.intrinsic());
        let [first, second, third] = self.axes();
        let mut angles = Vec3::ZERO;
        angles[third] = outer;
        angles[second] = middle;
        angles[first] = inner;
        angles
    }
}

/// Unit vector for an axis index.
pub fn axis_vector(axis: usize) -> Vec3 {
    match axis {
        0 => Vec3::X,
        1 => Vec3::Y,
        _ => Vec3::Z,
    }
}

fn axis_rotation(axis: usize, angle: f32) -> Quat {
    Quat::from_axis_angle(axis_vector(axis), angle)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDERS: [RotationOrder; 6] = [
        RotationOrder::XYZ,
        RotationOrder::XZY,
        RotationOrder::YXZ,
        RotationOrder::YZX,
        RotationOrder::ZXY,
        RotationOrder::ZYX,
    ];

    #[test]
    fn test_xyz_applies_x_first() {
        let angles = Vec3::new(0.3, -0.2, 0.9);
        let q = RotationOrder::XYZ.to_quat(angles);
        let expected = Quat::from_rotation_z(0.9)
            * Quat::from_rotation_y(-0.2)
            * Quat::from_rotation_x(0.3);
        assert!(q.abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn test_roundtrip_all_orders() {
        let angles = Vec3::new(0.4, -0.7, 1.1);
        for order in ORDERS {
            let q = order.to_quat(angles);
            let back = order.from_quat(q);
            let again = order.to_quat(back);
            assert!(
                q.dot(again).abs() > 1.0 - 1e-5,
                "order {:?} did not roundtrip",
                order
            );
            assert!((back - angles).length() < 1e-4, "order {:?}: {:?}", order, back);
        }
    }

    #[test]
    fn test_single_axis() {
        let q = RotationOrder::ZXY.to_quat(Vec3::new(0.0, 0.5, 0.0));
        assert!(q.abs_diff_eq(Quat::from_rotation_y(0.5), 1e-6));
    }
}
