//! Vizij Retarget Core (engine-agnostic)
//!
//! Transfers motion between skeletons with different rest poses. A driver
//! rig's skeleton-space bone matrices are converted into the target bone's
//! local channel space, written as translation/rotation/scale channels, and
//! optionally baked frame by frame into keyframes.
//!
//! The crate owns no scene: source rigs, keyframe sinks and undo history are
//! reached through [`SourceRig`], [`KeyframeSink`] and [`UndoHistory`].

pub mod action;
pub mod components;
pub mod config;
pub mod driver;
pub mod error;
pub mod gate;
pub mod history;
pub mod ids;
pub mod mapping;
pub mod math;
pub mod pose;
pub mod rotation;
pub mod sampler;
pub mod skeleton;
pub mod snap;
pub mod space;

// Re-exports for hosts
pub use action::{
    export_action_json, Action, BoneTrack, Channel, ChannelValue, FCurve, FrameRange, Keyframe,
    KeyframeSink,
};
pub use components::{match_rotation, match_scale, match_translation};
pub use config::RetargetConfig;
pub use driver::{AnimatedRig, EvalContext, SourceRig};
pub use error::{RetargetError, TransformRole};
pub use gate::{rotation_delta, should_key_rotation, DEFAULT_ROTATION_TOLERANCE};
pub use history::{NoUndo, UndoFlag, UndoHistory, UndoSuspension};
pub use ids::BoneId;
pub use mapping::BoneMapping;
pub use pose::{Pose, PoseChannels, Rig};
pub use rotation::{EulerOrder, Rotation, RotationMode};
pub use sampler::{BakeReport, FrameSampler, SamplerState};
pub use skeleton::{Bone, BoneSpec, Skeleton, SkeletonBuilder};
pub use snap::{snap_bones, snap_bones_to_matrix};
pub use space::{local_pose_matrix, to_other_space, to_world_space};

pub type Result<T> = core::result::Result<T, RetargetError>;
