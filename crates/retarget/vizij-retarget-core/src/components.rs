//! Apply the components of a local-space matrix to a bone's pose channels.
//!
//! The `set_*` writers only mutate channels. The `match_*` helpers convert a
//! skeleton-space matrix into the bone's local space first and commit the rig
//! afterwards, so a following match in the same frame reads the updated pose.

use nalgebra::Matrix4;
use tracing::trace;

use crate::action::{Channel, ChannelValue};
use crate::ids::BoneId;
use crate::math;
use crate::pose::{Pose, Rig};
use crate::rotation::Rotation;
use crate::skeleton::Skeleton;
use crate::space::to_other_space;
use crate::Result;

/// Store the translation of `local`. Bones without local location get the
/// translation rotated into their parent-relative rest orientation.
pub fn set_translation(skeleton: &Skeleton, pose: &mut Pose, bone: BoneId, local: &Matrix4<f64>) {
    let raw = math::translation(local);
    let location = if skeleton.bone(bone).local_location {
        raw
    } else {
        skeleton.rest_rotation(bone).transform_vector(&raw)
    };
    pose.channels_mut(bone).location = location;
}

/// Store the rotation of `local` in the bone's rotation encoding.
pub fn set_rotation(skeleton: &Skeleton, pose: &mut Pose, bone: BoneId, local: &Matrix4<f64>) {
    let q = math::rotation(local);
    pose.channels_mut(bone).rotation =
        Rotation::from_quaternion(&q, skeleton.bone(bone).rotation_mode);
}

/// Store the per-axis scale of `local`.
pub fn set_scale(pose: &mut Pose, bone: BoneId, local: &Matrix4<f64>) {
    pose.channels_mut(bone).scale = math::scale(local);
}

/// Match `bone`'s translation to the skeleton-space matrix `world`.
pub fn match_translation(rig: &mut Rig, bone: BoneId, world: &Matrix4<f64>) -> Result<ChannelValue> {
    let (skeleton, pose) = rig.parts_mut();
    let local = to_other_space(world, skeleton, pose, bone)?;
    set_translation(skeleton, pose, bone, &local);
    rig.commit();
    let value = rig.pose().channels(bone).translation_value();
    trace!(bone = %rig.skeleton().bone(bone).name, ?value, "matched translation");
    Ok(value)
}

/// Match `bone`'s rotation to `world`; returns the channel written and its value.
pub fn match_rotation(
    rig: &mut Rig,
    bone: BoneId,
    world: &Matrix4<f64>,
) -> Result<(Channel, ChannelValue)> {
    let (skeleton, pose) = rig.parts_mut();
    let local = to_other_space(world, skeleton, pose, bone)?;
    set_rotation(skeleton, pose, bone, &local);
    rig.commit();
    let rotation = rig.pose().channels(bone).rotation;
    let channel = rotation.mode().channel();
    let value = rotation.to_channel_value();
    trace!(bone = %rig.skeleton().bone(bone).name, ?channel, ?value, "matched rotation");
    Ok((channel, value))
}

/// Match `bone`'s scale to `world`. Interactive use only; the frame sampler
/// never bakes scale.
pub fn match_scale(rig: &mut Rig, bone: BoneId, world: &Matrix4<f64>) -> Result<ChannelValue> {
    let (skeleton, pose) = rig.parts_mut();
    let local = to_other_space(world, skeleton, pose, bone)?;
    set_scale(pose, bone, &local);
    rig.commit();
    Ok(rig.pose().channels(bone).scale_value())
}
