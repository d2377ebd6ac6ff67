//! Retarget configuration.

use serde::{Deserialize, Serialize};

use crate::action::FrameRange;
use crate::error::RetargetError;
use crate::gate::DEFAULT_ROTATION_TOLERANCE;
use crate::Result;

/// Settings for a bake. Unknown JSON fields are rejected; missing ones take
/// their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetargetConfig {
    /// Rotation keys are written only when the quaternion delta exceeds this.
    pub rotation_tolerance: f64,
    /// Key root-bone translation on every sampled frame.
    pub key_root_translation: bool,
    /// Overrides the driver's frame range when set.
    pub frame_range: Option<FrameRange>,
}

impl Default for RetargetConfig {
    fn default() -> Self {
        Self {
            rotation_tolerance: DEFAULT_ROTATION_TOLERANCE,
            key_root_translation: true,
            frame_range: None,
        }
    }
}

impl RetargetConfig {
    /// Parse and validate.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: RetargetConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.rotation_tolerance.is_finite() || self.rotation_tolerance <= 0.0 {
            return Err(RetargetError::InvalidConfig {
                reason: "Rotation tolerance must be positive and finite".to_string(),
            });
        }
        if let Some(range) = &self.frame_range {
            if !range.is_valid() {
                return Err(RetargetError::InvalidConfig {
                    reason: format!(
                        "Frame range must be finite, within i32 frames and start <= end, got [{}, {}]",
                        range.start, range.end
                    ),
                });
            }
        }
        Ok(())
    }

    #[inline]
    pub fn with_rotation_tolerance(mut self, tolerance: f64) -> Self {
        self.rotation_tolerance = tolerance;
        self
    }

    #[inline]
    pub fn with_frame_range(mut self, range: FrameRange) -> Self {
        self.frame_range = Some(range);
        self
    }
}
