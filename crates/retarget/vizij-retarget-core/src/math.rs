//! Affine matrix helpers: TRS compose/decompose and guarded inversion.
//!
//! All matrices are column-major `Matrix4<f64>` with translation in the last
//! column. Rotation extraction normalises the basis columns first, so matrices
//! carrying (non-uniform) scale still yield the rotation they were built from.

use nalgebra::{Matrix3, Matrix4, Quaternion, Rotation3, UnitQuaternion, Vector3};

use crate::error::{RetargetError, TransformRole};
use crate::Result;

/// Determinant magnitude below which a matrix is treated as singular.
pub const INVERTIBLE_EPSILON: f64 = 1e-12;

/// Column lengths under this are left unnormalised during rotation extraction.
const AXIS_EPSILON: f64 = 1e-12;

/// Translation, rotation and scale of an affine matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Decomposed {
    pub translation: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
    pub scale: Vector3<f64>,
}

/// Build `T · R · S`.
pub fn compose(
    translation: &Vector3<f64>,
    rotation: &UnitQuaternion<f64>,
    scale: &Vector3<f64>,
) -> Matrix4<f64> {
    Matrix4::new_translation(translation)
        * rotation.to_homogeneous()
        * Matrix4::new_nonuniform_scaling(scale)
}

pub fn decompose(m: &Matrix4<f64>) -> Decomposed {
    Decomposed {
        translation: translation(m),
        rotation: rotation(m),
        scale: scale(m),
    }
}

#[inline]
pub fn translation(m: &Matrix4<f64>) -> Vector3<f64> {
    Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)])
}

/// Per-axis scale: the length of each basis column.
pub fn scale(m: &Matrix4<f64>) -> Vector3<f64> {
    let basis = basis(m);
    Vector3::new(
        basis.column(0).norm(),
        basis.column(1).norm(),
        basis.column(2).norm(),
    )
}

/// Rotation of the upper 3×3 block, canonicalised to `w >= 0`.
pub fn rotation(m: &Matrix4<f64>) -> UnitQuaternion<f64> {
    let mut basis = basis(m);
    for mut col in basis.column_iter_mut() {
        let len = col.norm();
        if len > AXIS_EPSILON {
            col /= len;
        }
    }
    let mut q = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(basis));
    q.renormalize();
    canonical(q)
}

/// Flip `q` into the hemisphere with a non-negative scalar part.
#[inline]
pub fn canonical(q: UnitQuaternion<f64>) -> UnitQuaternion<f64> {
    if q.w < 0.0 {
        UnitQuaternion::new_unchecked(-q.into_inner())
    } else {
        q
    }
}

/// Quaternion components in `[w, x, y, z]` order.
#[inline]
pub fn quat_wxyz(q: &Quaternion<f64>) -> [f64; 4] {
    [q.w, q.i, q.j, q.k]
}

/// Invert `m`, reporting a singular matrix as [`RetargetError::NonInvertibleTransform`].
pub fn invert(m: &Matrix4<f64>, bone: &str, role: TransformRole) -> Result<Matrix4<f64>> {
    let singular = || RetargetError::NonInvertibleTransform {
        bone: bone.to_string(),
        role,
    };
    if !(m.determinant().abs() > INVERTIBLE_EPSILON) {
        return Err(singular());
    }
    m.try_inverse().ok_or_else(singular)
}

#[inline]
fn basis(m: &Matrix4<f64>) -> Matrix3<f64> {
    m.fixed_view::<3, 3>(0, 0).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn decompose_recovers_trs() {
        let t = Vector3::new(1.0, -2.0, 0.5);
        let r = UnitQuaternion::from_euler_angles(0.3, -0.7, 1.1);
        let s = Vector3::new(2.0, 0.5, 1.5);
        let d = decompose(&compose(&t, &r, &s));
        assert_relative_eq!(d.translation, t, epsilon = 1e-12);
        assert_relative_eq!(d.scale, s, epsilon = 1e-12);
        assert!(d.rotation.angle_to(&r) < 1e-9);
        assert!(d.rotation.w >= 0.0);
    }

    #[test]
    fn rotation_is_canonical() {
        // Angle close to 2π gives a quaternion with negative w before canonicalisation.
        let q = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 6.0);
        let out = rotation(&q.to_homogeneous());
        assert!(out.w >= 0.0);
        assert!(out.angle_to(&q) < 1e-9);
    }

    #[test]
    fn invert_rejects_zero_scale_axis() {
        let m = Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, 0.0, 1.0));
        let err = invert(&m, "arm", TransformRole::Rest).unwrap_err();
        assert_eq!(
            err,
            RetargetError::NonInvertibleTransform {
                bone: "arm".into(),
                role: TransformRole::Rest,
            }
        );
    }

    #[test]
    fn invert_round_trips() {
        let m = compose(
            &Vector3::new(0.0, 3.0, 0.0),
            &UnitQuaternion::from_euler_angles(0.1, 0.2, 0.3),
            &Vector3::new(1.0, 2.0, 3.0),
        );
        let inv = invert(&m, "b", TransformRole::ParentWorld).unwrap();
        assert_relative_eq!(m * inv, Matrix4::identity(), epsilon = 1e-12);
    }
}
