//! Evaluation of the driver ("source") skeleton.
//!
//! Scene time is explicit: callers pass an [`EvalContext`] to
//! [`SourceRig::set_frame`], after which world-matrix queries reflect that
//! frame until the next call.

use nalgebra::Matrix4;
use tracing::warn;

use crate::action::{Action, FrameRange};
use crate::pose::Rig;
use crate::skeleton::Skeleton;
use crate::Result;

/// Evaluation frame threaded through source queries.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EvalContext {
    pub frame: i32,
}

impl EvalContext {
    pub fn at(frame: i32) -> Self {
        Self { frame }
    }
}

/// Skeleton whose world matrices are driven by animation data.
pub trait SourceRig {
    /// Frame range of the bound animation, `None` if there is none.
    fn frame_range(&self) -> Option<FrameRange>;

    /// Re-resolve all world matrices for `ctx.frame`.
    fn set_frame(&mut self, ctx: &EvalContext) -> Result<()>;

    /// Resolved skeleton-space matrix of the named bone, `None` if the bone
    /// does not exist (any more).
    fn world_matrix(&self, bone: &str) -> Option<Matrix4<f64>>;
}

/// A rig evaluated from an in-memory [`Action`].
#[derive(Clone, Debug)]
pub struct AnimatedRig {
    rig: Rig,
    action: Option<Action>,
    frame: Option<i32>,
}

impl AnimatedRig {
    pub fn new(skeleton: Skeleton, action: Option<Action>) -> Self {
        if let Some(action) = &action {
            for track in &action.tracks {
                if skeleton.find(&track.bone).is_none() {
                    warn!(action = %action.name, bone = %track.bone, "track targets unknown bone; ignored");
                }
            }
        }
        Self {
            rig: Rig::new(skeleton),
            action,
            frame: None,
        }
    }

    pub fn rig(&self) -> &Rig {
        &self.rig
    }

    pub fn action(&self) -> Option<&Action> {
        self.action.as_ref()
    }

    pub fn set_action(&mut self, action: Option<Action>) {
        self.action = action;
        self.frame = None;
    }

    /// Frame of the last evaluation.
    pub fn current_frame(&self) -> Option<i32> {
        self.frame
    }
}

impl SourceRig for AnimatedRig {
    fn frame_range(&self) -> Option<FrameRange> {
        self.action.as_ref()?.frame_range()
    }

    fn set_frame(&mut self, ctx: &EvalContext) -> Result<()> {
        self.rig.reset_pose();
        if let Some(action) = &self.action {
            for track in &action.tracks {
                let Some(id) = self.rig.skeleton().find(&track.bone) else {
                    continue;
                };
                for curve in &track.curves {
                    let Some(value) = curve.value_at(ctx.frame) else {
                        continue;
                    };
                    if !self.rig.channels_mut(id).set_channel(curve.channel, &value) {
                        warn!(
                            bone = %track.bone,
                            channel = ?curve.channel,
                            "curve does not match the bone's channel layout; ignored"
                        );
                    }
                }
            }
        }
        self.rig.commit();
        self.frame = Some(ctx.frame);
        Ok(())
    }

    fn world_matrix(&self, bone: &str) -> Option<Matrix4<f64>> {
        let id = self.rig.skeleton().find(bone)?;
        Some(*self.rig.pose().world_matrix(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Channel, ChannelValue, KeyframeSink};
    use crate::math;
    use crate::skeleton::BoneSpec;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn source() -> AnimatedRig {
        let skeleton = Skeleton::builder()
            .bone(BoneSpec::new("hips", Matrix4::identity()))
            .bone(
                BoneSpec::new("spine", Matrix4::new_translation(&Vector3::new(0.0, 1.0, 0.0)))
                    .parent("hips"),
            )
            .build()
            .unwrap();
        let mut action = Action::new("walk");
        action
            .insert_keyframe("hips", Channel::Translation, 0, ChannelValue::Vec3([0.0, 0.0, 0.0]))
            .unwrap();
        action
            .insert_keyframe("hips", Channel::Translation, 10, ChannelValue::Vec3([10.0, 0.0, 0.0]))
            .unwrap();
        AnimatedRig::new(skeleton, Some(action))
    }

    #[test]
    fn set_frame_evaluates_action() {
        let mut rig = source();
        assert_eq!(rig.frame_range(), Some(FrameRange::new(0.0, 10.0)));

        rig.set_frame(&EvalContext::at(4)).unwrap();
        assert_eq!(rig.current_frame(), Some(4));
        let spine = rig.world_matrix("spine").unwrap();
        assert_relative_eq!(math::translation(&spine), Vector3::new(4.0, 1.0, 0.0), epsilon = 1e-12);
        assert!(rig.world_matrix("tail").is_none());
    }

    #[test]
    fn no_action_means_no_range() {
        let mut rig = source();
        rig.set_action(None);
        assert_eq!(rig.frame_range(), None);
        rig.set_frame(&EvalContext::at(3)).unwrap();
        assert_relative_eq!(rig.world_matrix("hips").unwrap(), Matrix4::identity());
    }
}
