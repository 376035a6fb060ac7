//! Math type aliases and helper functions.
//!
//! All deformation math runs in f32 on top of `nalgebra`, which also
//! provides the singular value decomposition used for rigid transform
//! extraction.

pub use nalgebra;

/// 3D vector (f32).
pub type Vec3 = nalgebra::Vector3<f32>;

/// 4D vector (f32).
pub type Vec4 = nalgebra::Vector4<f32>;

/// 3x3 matrix (f32).
pub type Mat3 = nalgebra::Matrix3<f32>;

/// 4x4 matrix (f32).
pub type Mat4 = nalgebra::Matrix4<f32>;

/// Transform a point by an affine 4x4 matrix (w = 1).
pub fn transform_point(m: &Mat4, p: Vec3) -> Vec3 {
    let h = m * Vec4::new(p.x, p.y, p.z, 1.0);
    Vec3::new(h.x, h.y, h.z)
}

/// Transform a direction by an affine 4x4 matrix (w = 0, translation ignored).
pub fn transform_vector(m: &Mat4, v: Vec3) -> Vec3 {
    let h = m * Vec4::new(v.x, v.y, v.z, 0.0);
    Vec3::new(h.x, h.y, h.z)
}

/// Build a 4x4 matrix from a column-major `[f32; 16]` array.
pub fn mat4_from_array(a: &[f32; 16]) -> Mat4 {
    Mat4::from_column_slice(a)
}

/// Convert a 4x4 matrix to a column-major `[f32; 16]` array.
pub fn mat4_to_array(m: &Mat4) -> [f32; 16] {
    let mut out = [0.0; 16];
    out.copy_from_slice(m.as_slice());
    out
}

/// Build a translation-only 4x4 matrix.
pub fn mat4_from_translation(t: Vec3) -> Mat4 {
    Mat4::new_translation(&t)
}

/// Build a rotation-only 4x4 matrix from an axis-angle rotation.
pub fn mat4_from_axis_angle(axis: Vec3, angle: f32) -> Mat4 {
    let unit = nalgebra::Unit::new_normalize(axis);
    nalgebra::Rotation3::from_axis_angle(&unit, angle).to_homogeneous()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn transform_point_applies_translation() {
        let m = mat4_from_translation(Vec3::new(1.0, 2.0, 3.0));
        let p = transform_point(&m, Vec3::new(1.0, 0.0, 0.0));
        assert!((p - Vec3::new(2.0, 2.0, 3.0)).norm() < 1e-6);
    }

    #[test]
    fn transform_vector_ignores_translation() {
        let m = mat4_from_translation(Vec3::new(1.0, 2.0, 3.0));
        let v = transform_vector(&m, Vec3::new(0.0, 1.0, 0.0));
        assert!((v - Vec3::new(0.0, 1.0, 0.0)).norm() < 1e-6);
    }

    #[test]
    fn axis_angle_rotation_y_90() {
        let m = mat4_from_axis_angle(Vec3::new(0.0, 1.0, 0.0), FRAC_PI_2);
        let v = transform_vector(&m, Vec3::new(1.0, 0.0, 0.0));
        assert!((v.x - 0.0).abs() < 1e-5);
        assert!((v.z - (-1.0)).abs() < 1e-5);
    }

    #[test]
    fn array_roundtrip() {
        let m = mat4_from_axis_angle(Vec3::new(1.0, 1.0, 0.0), 0.3)
            * mat4_from_translation(Vec3::new(4.0, 5.0, 6.0));
        let a = mat4_to_array(&m);
        assert_eq!(mat4_from_array(&a), m);
    }
}
