//! Error types for retargeting operations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which matrix failed to invert during a space conversion.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformRole {
    /// The bone's own rest matrix.
    Rest,
    /// The parent's currently resolved world matrix.
    ParentWorld,
}

impl fmt::Display for TransformRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformRole::Rest => f.write_str("rest"),
            TransformRole::ParentWorld => f.write_str("parent world"),
        }
    }
}

/// Error type for every fallible retarget operation.
///
/// None of these are transient: a failure always means malformed input, so
/// callers should abort the current operation rather than retry it.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum RetargetError {
    /// A rest or parent-world matrix has no inverse (zero-scale axis).
    #[error("Non-invertible {role} transform on bone '{bone}'")]
    NonInvertibleTransform { bone: String, role: TransformRole },

    /// No action, or the action has no frame range.
    #[error("Missing animation data: {reason}")]
    MissingAnimationData { reason: String },

    /// A mapped bone does not exist on the live skeleton.
    #[error("Unresolved bone mapping: bone '{bone}' not found")]
    UnresolvedBoneMapping { bone: String },

    /// Skeleton construction rejected (bad parent, cycle, duplicate name).
    #[error("Invalid skeleton: {reason}")]
    InvalidSkeleton { reason: String },

    /// Keyframe payload does not fit its channel.
    #[error("Invalid keyframe on '{bone}': {reason}")]
    InvalidKeyframe { bone: String, reason: String },

    /// Mapping is not a partial injective function.
    #[error("Invalid bone mapping: {reason}")]
    InvalidMapping { reason: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Serialization error: {reason}")]
    Serialization { reason: String },
}

impl RetargetError {
    /// Error category for logging.
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::NonInvertibleTransform { .. } => "math",
            Self::MissingAnimationData { .. } | Self::InvalidKeyframe { .. } => "data",
            Self::UnresolvedBoneMapping { .. } | Self::InvalidMapping { .. } => "mapping",
            Self::InvalidSkeleton { .. } => "skeleton",
            Self::InvalidConfig { .. } => "config",
            Self::Serialization { .. } => "serialization",
        }
    }
}

impl From<serde_json::Error> for RetargetError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            reason: err.to_string(),
        }
    }
}
