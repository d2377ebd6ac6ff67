//! Runtime pose state: per-bone channels and their resolved world matrices.
//!
//! World matrices are only refreshed by [`Pose::resolve`] (or
//! [`Rig::commit`]); a channel write is invisible to world-space queries until
//! then.

use nalgebra::{Matrix4, UnitQuaternion, Vector3};

use crate::action::{Channel, ChannelValue};
use crate::ids::BoneId;
use crate::math;
use crate::rotation::{Rotation, RotationMode};
use crate::skeleton::Skeleton;

/// Local pose channels of one bone, relative to its rest frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoseChannels {
    pub location: Vector3<f64>,
    pub rotation: Rotation,
    pub scale: Vector3<f64>,
}

impl PoseChannels {
    pub fn rest(mode: RotationMode) -> Self {
        Self {
            location: Vector3::zeros(),
            rotation: Rotation::identity(mode),
            scale: Vector3::repeat(1.0),
        }
    }

    /// Local (basis) matrix these channels produce for bone `id`.
    pub fn basis_matrix(&self, skeleton: &Skeleton, id: BoneId) -> Matrix4<f64> {
        let location = if skeleton.bone(id).local_location {
            self.location
        } else {
            skeleton.rest_rotation(id).inverse_transform_vector(&self.location)
        };
        math::compose(&location, &self.rotation.to_quaternion(), &self.scale)
    }

    pub fn translation_value(&self) -> ChannelValue {
        ChannelValue::Vec3(self.location.into())
    }

    pub fn scale_value(&self) -> ChannelValue {
        ChannelValue::Vec3(self.scale.into())
    }

    /// Current value of `channel`, `None` for a rotation channel the bone's
    /// mode does not use.
    pub fn channel_value(&self, channel: Channel) -> Option<ChannelValue> {
        match channel {
            Channel::Translation => Some(self.translation_value()),
            Channel::Scale => Some(self.scale_value()),
            _ if self.rotation.mode().channel() == channel => {
                Some(self.rotation.to_channel_value())
            }
            _ => None,
        }
    }

    /// Write a sampled curve value. Returns false when the value does not
    /// apply (rotation channel of another mode, or wrong arity).
    pub fn set_channel(&mut self, channel: Channel, value: &ChannelValue) -> bool {
        match (channel, value) {
            (Channel::Translation, ChannelValue::Vec3(v)) => {
                self.location = Vector3::from(*v);
                true
            }
            (Channel::Scale, ChannelValue::Vec3(v)) => {
                self.scale = Vector3::from(*v);
                true
            }
            _ => match Rotation::from_channel_value(self.rotation.mode(), channel, value) {
                Some(rotation) => {
                    self.rotation = rotation;
                    true
                }
                None => false,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Pose {
    channels: Vec<PoseChannels>,
    world: Vec<Matrix4<f64>>,
}

impl Pose {
    /// Rest pose for `skeleton`, already resolved.
    pub fn rest(skeleton: &Skeleton) -> Self {
        let channels = skeleton
            .bones()
            .iter()
            .map(|b| PoseChannels::rest(b.rotation_mode))
            .collect();
        let mut pose = Self {
            channels,
            world: vec![Matrix4::identity(); skeleton.len()],
        };
        pose.resolve(skeleton);
        pose
    }

    #[inline]
    pub fn channels(&self, id: BoneId) -> &PoseChannels {
        &self.channels[id.index()]
    }

    #[inline]
    pub fn channels_mut(&mut self, id: BoneId) -> &mut PoseChannels {
        &mut self.channels[id.index()]
    }

    /// Resolved skeleton-space matrix as of the last [`Pose::resolve`].
    #[inline]
    pub fn world_matrix(&self, id: BoneId) -> &Matrix4<f64> {
        &self.world[id.index()]
    }

    pub fn world_rotation(&self, id: BoneId) -> UnitQuaternion<f64> {
        math::rotation(&self.world[id.index()])
    }

    /// Recompose every world matrix from the channels, parents first:
    /// `world = parentWorld · rest · basis`.
    pub fn resolve(&mut self, skeleton: &Skeleton) {
        for &id in skeleton.topological_order() {
            let bone = skeleton.bone(id);
            let basis = self.channels[id.index()].basis_matrix(skeleton, id);
            let parent_world = match bone.parent {
                Some(p) => self.world[p.index()],
                None => Matrix4::identity(),
            };
            self.world[id.index()] = parent_world * bone.rest * basis;
        }
    }
}

/// A skeleton together with its live pose.
#[derive(Clone, Debug)]
pub struct Rig {
    skeleton: Skeleton,
    pose: Pose,
}

impl Rig {
    pub fn new(skeleton: Skeleton) -> Self {
        let pose = Pose::rest(&skeleton);
        Self { skeleton, pose }
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    /// Mutable channels of one bone. Call [`Rig::commit`] before reading
    /// world matrices again.
    pub fn channels_mut(&mut self, id: BoneId) -> &mut PoseChannels {
        self.pose.channels_mut(id)
    }

    /// Re-resolve world matrices so the last channel writes become visible.
    pub fn commit(&mut self) {
        self.pose.resolve(&self.skeleton);
    }

    /// Reset all channels to rest and commit.
    pub fn reset_pose(&mut self) {
        self.pose = Pose::rest(&self.skeleton);
    }

    /// Split borrow for writers that read the skeleton while mutating the pose.
    pub(crate) fn parts_mut(&mut self) -> (&Skeleton, &mut Pose) {
        (&self.skeleton, &mut self.pose)
    }
}
