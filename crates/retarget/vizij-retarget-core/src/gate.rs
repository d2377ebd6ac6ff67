//! Rotation keyframe gating.
//!
//! The distance is the Euclidean norm of the component-wise difference of
//! the two quaternions, not an angular distance; `q` and `-q` count as far
//! apart. Inputs taken from [`crate::math::rotation`] are canonicalised
//! (`w >= 0`), which keeps that case rare.

use nalgebra::UnitQuaternion;

/// Default gate tolerance.
pub const DEFAULT_ROTATION_TOLERANCE: f64 = 0.005;

/// `‖target − source‖`, treating both as 4-vectors.
#[inline]
pub fn rotation_delta(source: &UnitQuaternion<f64>, target: &UnitQuaternion<f64>) -> f64 {
    (target.coords - source.coords).norm()
}

/// True only when the delta strictly exceeds `tolerance`.
#[inline]
pub fn should_key_rotation(
    source: &UnitQuaternion<f64>,
    target: &UnitQuaternion<f64>,
    tolerance: f64,
) -> bool {
    rotation_delta(source, target) > tolerance
}
