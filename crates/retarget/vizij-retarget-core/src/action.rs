//! Keyframe storage: sparse per-bone, per-channel curves on integer frames.
//!
//! Curves are kept sorted by frame. Evaluation holds the first/last key
//! outside the keyed range and interpolates linearly per component between
//! keys; quaternion components are interpolated raw and normalised by the
//! consumer.

use serde::{Deserialize, Serialize};

use crate::error::RetargetError;
use crate::Result;

/// Animatable pose channel of a bone.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Channel {
    Translation,
    RotationQuaternion,
    RotationAxisAngle,
    RotationEuler,
    Scale,
}

impl Channel {
    /// Number of components a value on this channel carries.
    #[inline]
    pub fn arity(self) -> usize {
        match self {
            Channel::Translation | Channel::RotationEuler | Channel::Scale => 3,
            Channel::RotationQuaternion | Channel::RotationAxisAngle => 4,
        }
    }

    #[inline]
    pub fn is_rotation(self) -> bool {
        matches!(
            self,
            Channel::RotationQuaternion | Channel::RotationAxisAngle | Channel::RotationEuler
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ChannelValue {
    Vec3([f64; 3]),
    Vec4([f64; 4]),
}

impl ChannelValue {
    #[inline]
    pub fn arity(&self) -> usize {
        match self {
            ChannelValue::Vec3(_) => 3,
            ChannelValue::Vec4(_) => 4,
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        match self {
            ChannelValue::Vec3(v) => v,
            ChannelValue::Vec4(v) => v,
        }
    }

    /// Component-wise `a + (b - a) * t`; `None` on arity mismatch.
    pub fn lerp(&self, other: &ChannelValue, t: f64) -> Option<ChannelValue> {
        fn mix<const N: usize>(a: &[f64; N], b: &[f64; N], t: f64) -> [f64; N] {
            let mut out = *a;
            for (o, bb) in out.iter_mut().zip(b.iter()) {
                *o += (bb - *o) * t;
            }
            out
        }
        match (self, other) {
            (ChannelValue::Vec3(a), ChannelValue::Vec3(b)) => Some(ChannelValue::Vec3(mix(a, b, t))),
            (ChannelValue::Vec4(a), ChannelValue::Vec4(b)) => Some(ChannelValue::Vec4(mix(a, b, t))),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub frame: i32,
    pub value: ChannelValue,
}

/// Inclusive frame interval of an action. Bounds may be fractional.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameRange {
    pub start: f64,
    pub end: f64,
}

impl FrameRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Finite, ordered, and with sample bounds representable as `i32` frames.
    pub fn is_valid(&self) -> bool {
        let frames = f64::from(i32::MIN)..=f64::from(i32::MAX);
        self.start.is_finite()
            && self.end.is_finite()
            && self.start <= self.end
            && frames.contains(&self.start.floor())
            && frames.contains(&self.end.ceil())
    }

    /// Integer frames to sample: `floor(start) ..= ceil(end)`. Only
    /// meaningful for a range that [`is_valid`](Self::is_valid).
    #[inline]
    pub fn sample_bounds(&self) -> (i32, i32) {
        (self.start.floor() as i32, self.end.ceil() as i32)
    }
}

/// One channel of one bone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FCurve {
    pub channel: Channel,
    keys: Vec<Keyframe>,
}

impl FCurve {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            keys: Vec::new(),
        }
    }

    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Insert a key, replacing any existing key on the same frame.
    /// The caller checks arity.
    fn insert(&mut self, frame: i32, value: ChannelValue) {
        match self.keys.binary_search_by_key(&frame, |k| k.frame) {
            Ok(idx) => self.keys[idx].value = value,
            Err(idx) => self.keys.insert(idx, Keyframe { frame, value }),
        }
    }

    pub fn value_at(&self, frame: i32) -> Option<ChannelValue> {
        let first = self.keys.first()?;
        let last = self.keys.last()?;
        if frame <= first.frame {
            return Some(first.value);
        }
        if frame >= last.frame {
            return Some(last.value);
        }
        match self.keys.binary_search_by_key(&frame, |k| k.frame) {
            Ok(idx) => Some(self.keys[idx].value),
            Err(idx) => {
                let left = &self.keys[idx - 1];
                let right = &self.keys[idx];
                let span = f64::from(right.frame) - f64::from(left.frame);
                let t = (f64::from(frame) - f64::from(left.frame)) / span;
                left.value.lerp(&right.value, t)
            }
        }
    }

    pub fn frame_range(&self) -> Option<FrameRange> {
        let first = self.keys.first()?;
        let last = self.keys.last()?;
        Some(FrameRange::new(f64::from(first.frame), f64::from(last.frame)))
    }
}

/// All curves of one bone, at most one per channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoneTrack {
    pub bone: String,
    pub curves: Vec<FCurve>,
}

impl BoneTrack {
    pub fn new(bone: impl Into<String>) -> Self {
        Self {
            bone: bone.into(),
            curves: Vec::new(),
        }
    }

    pub fn curve(&self, channel: Channel) -> Option<&FCurve> {
        self.curves.iter().find(|c| c.channel == channel)
    }

    fn curve_mut(&mut self, channel: Channel) -> &mut FCurve {
        let idx = match self.curves.iter().position(|c| c.channel == channel) {
            Some(idx) => idx,
            None => {
                self.curves.push(FCurve::new(channel));
                self.curves.len() - 1
            }
        };
        &mut self.curves[idx]
    }
}

/// Destination for sampled keyframes.
///
/// [`Action`] is the in-memory implementation; hosts forward into their own
/// curve storage by implementing this trait.
pub trait KeyframeSink {
    fn insert_keyframe(
        &mut self,
        bone: &str,
        channel: Channel,
        frame: i32,
        value: ChannelValue,
    ) -> Result<()>;
}

/// Named collection of bone tracks.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    #[serde(default)]
    pub tracks: Vec<BoneTrack>,
    /// Explicit range; when unset the range spans all keys.
    #[serde(default)]
    pub manual_frame_range: Option<FrameRange>,
}

impl Action {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn track(&self, bone: &str) -> Option<&BoneTrack> {
        self.tracks.iter().find(|t| t.bone == bone)
    }

    pub fn curve(&self, bone: &str, channel: Channel) -> Option<&FCurve> {
        self.track(bone)?.curve(channel)
    }

    /// Evaluate one channel of one bone at `frame`.
    pub fn value_at(&self, bone: &str, channel: Channel, frame: i32) -> Option<ChannelValue> {
        self.curve(bone, channel)?.value_at(frame)
    }

    /// Manual range if set, otherwise the span of all keys; `None` for an
    /// action without keys.
    pub fn frame_range(&self) -> Option<FrameRange> {
        if let Some(range) = self.manual_frame_range {
            return Some(range);
        }
        self.tracks
            .iter()
            .flat_map(|t| t.curves.iter())
            .filter_map(FCurve::frame_range)
            .reduce(|a, b| FrameRange::new(a.start.min(b.start), a.end.max(b.end)))
    }

    pub fn keyframe_count(&self) -> usize {
        self.tracks
            .iter()
            .flat_map(|t| t.curves.iter())
            .map(FCurve::len)
            .sum()
    }

    fn track_mut(&mut self, bone: &str) -> &mut BoneTrack {
        let idx = match self.tracks.iter().position(|t| t.bone == bone) {
            Some(idx) => idx,
            None => {
                self.tracks.push(BoneTrack::new(bone));
                self.tracks.len() - 1
            }
        };
        &mut self.tracks[idx]
    }
}

impl KeyframeSink for Action {
    fn insert_keyframe(
        &mut self,
        bone: &str,
        channel: Channel,
        frame: i32,
        value: ChannelValue,
    ) -> Result<()> {
        if value.arity() != channel.arity() {
            return Err(RetargetError::InvalidKeyframe {
                bone: bone.to_string(),
                reason: format!(
                    "{channel:?} expects {} components, got {}",
                    channel.arity(),
                    value.arity()
                ),
            });
        }
        if value.as_slice().iter().any(|c| !c.is_finite()) {
            return Err(RetargetError::InvalidKeyframe {
                bone: bone.to_string(),
                reason: format!("non-finite {channel:?} value at frame {frame}"),
            });
        }
        self.track_mut(bone).curve_mut(channel).insert(frame, value);
        Ok(())
    }
}

/// Export an action as serde_json::Value (stable schema for FFI/serialization).
pub fn export_action_json(action: &Action) -> serde_json::Value {
    serde_json::to_value(action).unwrap_or(serde_json::Value::Null)
}
