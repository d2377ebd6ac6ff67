//! Space conversion between skeleton space and a bone's local pose space.
//!
//! For bone `b` with skeleton-space rest `rest`, parent skeleton-space rest
//! `parentRest` and parent resolved world matrix `parentWorld` (all identity
//! for a root):
//!
//! ```text
//! local = rest⁻¹ · parentRest · parentWorld⁻¹ · world
//! ```
//!
//! which inverts the forward composition done by [`Pose::resolve`].
//! Parents with a zero-scale axis cannot be inverted and are reported as
//! [`RetargetError::NonInvertibleTransform`](crate::RetargetError); skewed
//! parent scale is not compensated.

use nalgebra::Matrix4;

use crate::error::TransformRole;
use crate::ids::BoneId;
use crate::math;
use crate::pose::Pose;
use crate::skeleton::Skeleton;
use crate::Result;

/// Local matrix that, applied as `bone`'s pose, reproduces `world` in
/// skeleton space given the current pose of `bone`'s ancestors.
pub fn to_other_space(
    world: &Matrix4<f64>,
    skeleton: &Skeleton,
    pose: &Pose,
    bone: BoneId,
) -> Result<Matrix4<f64>> {
    let rest_inv = skeleton.rest_matrix_inverse(bone);
    match skeleton.parent(bone) {
        Some(parent) => {
            let parent_inv = math::invert(
                pose.world_matrix(parent),
                &skeleton.bone(bone).name,
                TransformRole::ParentWorld,
            )?;
            let parent_rest = skeleton.rest_matrix(parent);
            Ok(rest_inv * (parent_rest * (parent_inv * world)))
        }
        None => Ok(rest_inv * world),
    }
}

/// Skeleton-space matrix produced by applying `local` as `bone`'s pose.
pub fn to_world_space(
    local: &Matrix4<f64>,
    skeleton: &Skeleton,
    pose: &Pose,
    bone: BoneId,
) -> Matrix4<f64> {
    let rest_local = skeleton.bone(bone).rest;
    match skeleton.parent(bone) {
        Some(parent) => pose.world_matrix(parent) * rest_local * local,
        None => rest_local * local,
    }
}

/// `bone`'s current world matrix expressed back in its own local space.
pub fn local_pose_matrix(skeleton: &Skeleton, pose: &Pose, bone: BoneId) -> Result<Matrix4<f64>> {
    to_other_space(pose.world_matrix(bone), skeleton, pose, bone)
}
