//! Rotation encodings a bone may use for its pose channel.
//!
//! Every encoding converts to and from a canonical unit quaternion; pose
//! writers dispatch on [`RotationMode`] instead of branching on mode strings.

use std::fmt;
use std::str::FromStr;

use nalgebra::{Quaternion, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::action::{Channel, ChannelValue};
use crate::error::RetargetError;

/// `|cos(middle angle)|` below which an Euler decomposition is treated as gimbal locked.
const GIMBAL_EPSILON: f64 = 1e-9;

/// Quaternion norm under which a stored rotation is treated as identity.
const DEGENERATE_EPSILON: f64 = 1e-12;

/// Tait-Bryan axis order. `Xyz` applies X first, then Y, then Z: `R = Rz · Ry · Rx`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum EulerOrder {
    #[default]
    Xyz,
    Xzy,
    Yxz,
    Yzx,
    Zxy,
    Zyx,
}

impl EulerOrder {
    pub const ALL: [EulerOrder; 6] = [
        EulerOrder::Xyz,
        EulerOrder::Xzy,
        EulerOrder::Yxz,
        EulerOrder::Yzx,
        EulerOrder::Zxy,
        EulerOrder::Zyx,
    ];

    /// Axis indices in application order.
    #[inline]
    pub fn axes(self) -> [usize; 3] {
        match self {
            EulerOrder::Xyz => [0, 1, 2],
            EulerOrder::Xzy => [0, 2, 1],
            EulerOrder::Yxz => [1, 0, 2],
            EulerOrder::Yzx => [1, 2, 0],
            EulerOrder::Zxy => [2, 0, 1],
            EulerOrder::Zyx => [2, 1, 0],
        }
    }

    /// +1 for cyclic (even) orders, -1 otherwise.
    #[inline]
    fn parity(self) -> f64 {
        match self {
            EulerOrder::Xyz | EulerOrder::Yzx | EulerOrder::Zxy => 1.0,
            _ => -1.0,
        }
    }

    /// Compose per-axis angles (indexed x, y, z) into a quaternion.
    pub fn to_quaternion(self, angles: &Vector3<f64>) -> UnitQuaternion<f64> {
        let [i, j, k] = self.axes();
        let first = UnitQuaternion::from_axis_angle(&unit_axis(i), angles[i]);
        let second = UnitQuaternion::from_axis_angle(&unit_axis(j), angles[j]);
        let third = UnitQuaternion::from_axis_angle(&unit_axis(k), angles[k]);
        third * second * first
    }

    /// Decompose a rotation into per-axis angles (indexed x, y, z).
    ///
    /// The middle axis angle lies in `[-π/2, π/2]`. At gimbal lock the last
    /// axis angle is pinned to zero.
    pub fn to_angles(self, q: &UnitQuaternion<f64>) -> Vector3<f64> {
        let [i, j, k] = self.axes();
        let s = self.parity();
        let rot = q.to_rotation_matrix();
        let m = rot.matrix();

        let beta = (-s * m[(k, i)]).clamp(-1.0, 1.0).asin();
        let cos_beta = m[(k, k)].hypot(m[(k, j)]);
        let (alpha, gamma) = if cos_beta > GIMBAL_EPSILON {
            (
                f64::atan2(s * m[(k, j)], m[(k, k)]),
                f64::atan2(s * m[(j, i)], m[(i, i)]),
            )
        } else {
            (f64::atan2(-s * m[(j, k)], m[(j, j)]), 0.0)
        };

        let mut out = Vector3::zeros();
        out[i] = alpha;
        out[j] = beta;
        out[k] = gamma;
        out
    }
}

impl fmt::Display for EulerOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EulerOrder::Xyz => "XYZ",
            EulerOrder::Xzy => "XZY",
            EulerOrder::Yxz => "YXZ",
            EulerOrder::Yzx => "YZX",
            EulerOrder::Zxy => "ZXY",
            EulerOrder::Zyx => "ZYX",
        };
        f.write_str(name)
    }
}

impl FromStr for EulerOrder {
    type Err = RetargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EulerOrder::ALL
            .into_iter()
            .find(|order| order.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| RetargetError::InvalidConfig {
                reason: format!("unknown Euler order '{s}'"),
            })
    }
}

/// How a bone stores its pose rotation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "mode", content = "order")]
pub enum RotationMode {
    #[default]
    Quaternion,
    AxisAngle,
    Euler(EulerOrder),
}

impl RotationMode {
    /// The keyframe channel rotations in this mode are recorded on.
    pub fn channel(self) -> Channel {
        match self {
            RotationMode::Quaternion => Channel::RotationQuaternion,
            RotationMode::AxisAngle => Channel::RotationAxisAngle,
            RotationMode::Euler(_) => Channel::RotationEuler,
        }
    }
}

/// A pose rotation in one concrete encoding.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Rotation {
    /// Raw quaternion; may be unnormalised after curve interpolation.
    Quaternion(Quaternion<f64>),
    AxisAngle { angle: f64, axis: Vector3<f64> },
    Euler { order: EulerOrder, angles: Vector3<f64> },
}

impl Rotation {
    pub fn identity(mode: RotationMode) -> Self {
        match mode {
            RotationMode::Quaternion => Rotation::Quaternion(Quaternion::identity()),
            RotationMode::AxisAngle => Rotation::AxisAngle {
                angle: 0.0,
                axis: Vector3::y(),
            },
            RotationMode::Euler(order) => Rotation::Euler {
                order,
                angles: Vector3::zeros(),
            },
        }
    }

    pub fn mode(&self) -> RotationMode {
        match self {
            Rotation::Quaternion(_) => RotationMode::Quaternion,
            Rotation::AxisAngle { .. } => RotationMode::AxisAngle,
            Rotation::Euler { order, .. } => RotationMode::Euler(*order),
        }
    }

    /// Normalised quaternion for this rotation. Degenerate encodings (zero
    /// quaternion, zero axis) evaluate to identity.
    pub fn to_quaternion(&self) -> UnitQuaternion<f64> {
        match self {
            Rotation::Quaternion(q) => UnitQuaternion::try_new(*q, DEGENERATE_EPSILON)
                .unwrap_or_else(UnitQuaternion::identity),
            Rotation::AxisAngle { angle, axis } => Unit::try_new(*axis, DEGENERATE_EPSILON)
                .map(|axis| UnitQuaternion::from_axis_angle(&axis, *angle))
                .unwrap_or_else(UnitQuaternion::identity),
            Rotation::Euler { order, angles } => order.to_quaternion(angles),
        }
    }

    /// Encode `q` in `mode`.
    pub fn from_quaternion(q: &UnitQuaternion<f64>, mode: RotationMode) -> Self {
        match mode {
            RotationMode::Quaternion => Rotation::Quaternion(q.into_inner()),
            RotationMode::AxisAngle => {
                let (angle, axis) = axis_angle(q);
                Rotation::AxisAngle { angle, axis }
            }
            RotationMode::Euler(order) => Rotation::Euler {
                order,
                angles: order.to_angles(q),
            },
        }
    }

    /// Keyframe payload: quaternion as `[w, x, y, z]`, axis-angle as
    /// `[angle, x, y, z]`, Euler as `[x, y, z]`.
    pub fn to_channel_value(&self) -> ChannelValue {
        match self {
            Rotation::Quaternion(q) => ChannelValue::Vec4([q.w, q.i, q.j, q.k]),
            Rotation::AxisAngle { angle, axis } => {
                ChannelValue::Vec4([*angle, axis.x, axis.y, axis.z])
            }
            Rotation::Euler { angles, .. } => ChannelValue::Vec3([angles.x, angles.y, angles.z]),
        }
    }

    /// Inverse of [`Rotation::to_channel_value`]; `None` if the channel does
    /// not belong to `mode` or the payload arity is wrong.
    pub fn from_channel_value(
        mode: RotationMode,
        channel: Channel,
        value: &ChannelValue,
    ) -> Option<Self> {
        if mode.channel() != channel {
            return None;
        }
        match (mode, value) {
            (RotationMode::Quaternion, ChannelValue::Vec4([w, x, y, z])) => {
                Some(Rotation::Quaternion(Quaternion::new(*w, *x, *y, *z)))
            }
            (RotationMode::AxisAngle, ChannelValue::Vec4([angle, x, y, z])) => {
                Some(Rotation::AxisAngle {
                    angle: *angle,
                    axis: Vector3::new(*x, *y, *z),
                })
            }
            (RotationMode::Euler(order), ChannelValue::Vec3([x, y, z])) => Some(Rotation::Euler {
                order,
                angles: Vector3::new(*x, *y, *z),
            }),
            _ => None,
        }
    }
}

/// Angle in `[0, 2π]` and unit axis; identity yields `(0, +Y)`.
fn axis_angle(q: &UnitQuaternion<f64>) -> (f64, Vector3<f64>) {
    let half = q.w.clamp(-1.0, 1.0).acos();
    let angle = 2.0 * half;
    let imag = q.imag();
    match Unit::try_new(imag, DEGENERATE_EPSILON) {
        Some(axis) => (angle, axis.into_inner()),
        None => (angle, Vector3::y()),
    }
}

#[inline]
fn unit_axis(idx: usize) -> Unit<Vector3<f64>> {
    match idx {
        0 => Vector3::x_axis(),
        1 => Vector3::y_axis(),
        _ => Vector3::z_axis(),
    }
}
