// Transform utilities for Mat4
//
// Extends glam::Mat4 with the matrix operations the exporter needs when
// re-expressing host transforms relative to a new parent.

use glam::{Mat4, Quat, Vec3};

/// Build a matrix from host row-major rows (translation in the last column).
pub fn mat4_from_rows(rows: &[[f32; 4]; 4]) -> Mat4 {
    Mat4::from_cols_array_2d(rows).transpose()
}

/// Extension trait for Mat4 to provide additional transform utilities
pub trait Mat4Ext {
    /// Matrix taking coordinates of `other`'s space into this matrix's space:
    /// `self⁻¹ · other`.
    fn delta_to(&self, other: &Mat4) -> Mat4;

    /// Same matrix with the translation component cleared.
    fn without_translation(&self) -> Mat4;

    /// Replace any non-finite cell with zero.
    fn sanitized(&self) -> Mat4;

    /// Decompose into (translation, rotation, scale).
    fn to_trs(&self) -> (Vec3, Quat, Vec3);
}

impl Mat4Ext for Mat4 {
    fn delta_to(&self, other: &Mat4) -> Mat4 {
        self.inverse() * *other
    }

    fn without_translation(&self) -> Mat4 {
        let mut m = *self;
        m.w_axis.x = 0.0;
        m.w_axis.y = 0.0;
        m.w_axis.z = 0.0;
        m
    }

    fn sanitized(&self) -> Mat4 {
        let mut cells = self.to_cols_array();
        for cell in &mut cells {
            if !cell.is_finite() {
                *cell = 0.0;
            }
        }
        Mat4::from_cols_array(&cells)
    }

    fn to_trs(&self) -> (Vec3, Quat, Vec3) {
        let (scale, rotation, translation) = self.to_scale_rotation_translation();
        (translation, rotation, scale)
    }
}
