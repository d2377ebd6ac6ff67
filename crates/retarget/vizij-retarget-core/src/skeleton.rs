//! Skeleton topology and rest pose.
//!
//! Each [`Bone`] stores its rest transform relative to its parent. At
//! construction the skeleton validates the hierarchy, fixes a topological
//! evaluation order (declaration order, parents first) and caches the
//! skeleton-space rest matrices plus their inverses. Skeletons are immutable
//! for the lifetime of a retarget session.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use hashbrown::HashMap;
use nalgebra::{Matrix4, UnitQuaternion};
use serde::{Deserialize, Serialize};

use crate::error::{RetargetError, TransformRole};
use crate::ids::BoneId;
use crate::math;
use crate::pose::Pose;
use crate::rotation::RotationMode;
use crate::Result;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bone {
    pub name: String,
    pub parent: Option<BoneId>,
    /// Rest transform relative to the parent's rest frame.
    pub rest: Matrix4<f64>,
    pub rotation_mode: RotationMode,
    /// When false, the translation channel is stored rotated by the bone's
    /// rest orientation relative to its parent.
    pub local_location: bool,
}

/// Declarative bone description with the parent given by name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoneSpec {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default = "identity_rest")]
    pub rest: Matrix4<f64>,
    #[serde(default)]
    pub rotation_mode: RotationMode,
    #[serde(default = "default_local_location")]
    pub local_location: bool,
}

fn identity_rest() -> Matrix4<f64> {
    Matrix4::identity()
}

fn default_local_location() -> bool {
    true
}

impl BoneSpec {
    pub fn new(name: impl Into<String>, rest: Matrix4<f64>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            rest,
            rotation_mode: RotationMode::default(),
            local_location: true,
        }
    }

    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn rotation_mode(mut self, mode: RotationMode) -> Self {
        self.rotation_mode = mode;
        self
    }

    pub fn local_location(mut self, local: bool) -> Self {
        self.local_location = local;
        self
    }
}

/// Collects [`BoneSpec`]s and resolves parent names on [`SkeletonBuilder::build`].
#[derive(Clone, Debug, Default)]
pub struct SkeletonBuilder {
    specs: Vec<BoneSpec>,
}

impl SkeletonBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bone(mut self, spec: BoneSpec) -> Self {
        self.specs.push(spec);
        self
    }

    pub fn build(self) -> Result<Skeleton> {
        let index: HashMap<&str, BoneId> = self
            .specs
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.as_str(), BoneId::from_index(i)))
            .collect();

        let mut bones = Vec::with_capacity(self.specs.len());
        for spec in &self.specs {
            let parent = match &spec.parent {
                None => None,
                Some(name) => Some(*index.get(name.as_str()).ok_or_else(|| {
                    RetargetError::InvalidSkeleton {
                        reason: format!("bone '{}' has unknown parent '{name}'", spec.name),
                    }
                })?),
            };
            bones.push(Bone {
                name: spec.name.clone(),
                parent,
                rest: spec.rest,
                rotation_mode: spec.rotation_mode,
                local_location: spec.local_location,
            });
        }
        Skeleton::new(bones)
    }
}

#[derive(Clone, Debug)]
pub struct Skeleton {
    bones: Vec<Bone>,
    rest_armature: Vec<Matrix4<f64>>,
    rest_armature_inv: Vec<Matrix4<f64>>,
    rest_rotation: Vec<UnitQuaternion<f64>>,
    order: Vec<BoneId>,
    depth: Vec<usize>,
    by_name: HashMap<String, BoneId>,
}

impl Skeleton {
    pub fn builder() -> SkeletonBuilder {
        SkeletonBuilder::new()
    }

    /// Parse a JSON array of [`BoneSpec`].
    pub fn from_json_str(json: &str) -> Result<Self> {
        let specs: Vec<BoneSpec> = serde_json::from_str(json)?;
        specs
            .into_iter()
            .fold(SkeletonBuilder::new(), SkeletonBuilder::bone)
            .build()
    }

    /// Validate `bones` and precompute evaluation order and rest caches.
    pub fn new(bones: Vec<Bone>) -> Result<Self> {
        let n = bones.len();
        let mut by_name = HashMap::with_capacity(n);
        for (i, bone) in bones.iter().enumerate() {
            if bone.name.is_empty() {
                return Err(RetargetError::InvalidSkeleton {
                    reason: format!("bone {i} has an empty name"),
                });
            }
            if by_name.insert(bone.name.clone(), BoneId::from_index(i)).is_some() {
                return Err(RetargetError::InvalidSkeleton {
                    reason: format!("duplicate bone name '{}'", bone.name),
                });
            }
            if let Some(parent) = bone.parent {
                if parent.index() >= n || parent.index() == i {
                    return Err(RetargetError::InvalidSkeleton {
                        reason: format!("bone '{}' has invalid parent {parent}", bone.name),
                    });
                }
            }
        }

        let order = topo_order(&bones)?;

        let mut rest_armature = vec![Matrix4::identity(); n];
        let mut rest_armature_inv = vec![Matrix4::identity(); n];
        let mut rest_rotation = vec![UnitQuaternion::identity(); n];
        let mut depth = vec![0usize; n];
        for &id in &order {
            let i = id.index();
            let bone = &bones[i];
            math::invert(&bone.rest, &bone.name, TransformRole::Rest)?;
            let (parent_rest, parent_depth) = match bone.parent {
                Some(p) => (rest_armature[p.index()], depth[p.index()] + 1),
                None => (Matrix4::identity(), 0),
            };
            rest_armature[i] = parent_rest * bone.rest;
            rest_armature_inv[i] =
                math::invert(&rest_armature[i], &bone.name, TransformRole::Rest)?;
            rest_rotation[i] = math::rotation(&bone.rest);
            depth[i] = parent_depth;
        }

        Ok(Self {
            bones,
            rest_armature,
            rest_armature_inv,
            rest_rotation,
            order,
            depth,
            by_name,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    #[inline]
    pub fn bone(&self, id: BoneId) -> &Bone {
        &self.bones[id.index()]
    }

    pub fn find(&self, name: &str) -> Option<BoneId> {
        self.by_name.get(name).copied()
    }

    #[inline]
    pub fn parent(&self, id: BoneId) -> Option<BoneId> {
        self.bones[id.index()].parent
    }

    #[inline]
    pub fn is_root(&self, id: BoneId) -> bool {
        self.parent(id).is_none()
    }

    /// Rest matrix in skeleton space (rest chain composed from the root).
    #[inline]
    pub fn rest_matrix(&self, id: BoneId) -> &Matrix4<f64> {
        &self.rest_armature[id.index()]
    }

    #[inline]
    pub fn rest_matrix_inverse(&self, id: BoneId) -> &Matrix4<f64> {
        &self.rest_armature_inv[id.index()]
    }

    /// Skeleton-space rest matrix of the parent, identity for roots.
    #[inline]
    pub fn parent_rest_matrix(&self, id: BoneId) -> Matrix4<f64> {
        self.parent(id)
            .map(|p| self.rest_armature[p.index()])
            .unwrap_or_else(Matrix4::identity)
    }

    /// Rotation of the bone's rest frame relative to its parent's rest frame.
    #[inline]
    pub fn rest_rotation(&self, id: BoneId) -> &UnitQuaternion<f64> {
        &self.rest_rotation[id.index()]
    }

    /// Number of ancestors.
    #[inline]
    pub fn depth(&self, id: BoneId) -> usize {
        self.depth[id.index()]
    }

    /// Bones in evaluation order: declaration order, with every parent
    /// ahead of its children.
    pub fn topological_order(&self) -> &[BoneId] {
        &self.order
    }

    /// A copy of this skeleton whose rest pose is `pose`'s current posed
    /// state. Names, hierarchy and channel settings are kept.
    pub fn apply_pose_as_rest(&self, pose: &Pose) -> Result<Skeleton> {
        let mut bones = self.bones.clone();
        for &id in &self.order {
            let world = pose.world_matrix(id);
            let rest = match self.parent(id) {
                Some(p) => {
                    let parent_inv = math::invert(
                        pose.world_matrix(p),
                        &self.bone(id).name,
                        TransformRole::ParentWorld,
                    )?;
                    parent_inv * world
                }
                None => *world,
            };
            bones[id.index()].rest = rest;
        }
        Skeleton::new(bones)
    }
}

/// Kahn's algorithm, always releasing the lowest declaration index first.
fn topo_order(bones: &[Bone]) -> Result<Vec<BoneId>> {
    let n = bones.len();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut indeg = vec![0usize; n];
    for (i, bone) in bones.iter().enumerate() {
        if let Some(p) = bone.parent {
            children[p.index()].push(i);
            indeg[i] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = indeg
        .iter()
        .enumerate()
        .filter(|(_, &d)| d == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(n);
    while let Some(Reverse(u)) = ready.pop() {
        order.push(BoneId::from_index(u));
        for &v in &children[u] {
            indeg[v] -= 1;
            if indeg[v] == 0 {
                ready.push(Reverse(v));
            }
        }
    }

    if order.len() != n {
        let stuck = indeg
            .iter()
            .position(|&d| d > 0)
            .map(|i| bones[i].name.as_str())
            .unwrap_or_default();
        return Err(RetargetError::InvalidSkeleton {
            reason: format!("cycle detected in bone hierarchy at '{stuck}'"),
        });
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn translation(x: f64, y: f64, z: f64) -> Matrix4<f64> {
        Matrix4::new_translation(&Vector3::new(x, y, z))
    }

    #[test]
    fn rest_chain_composes_to_skeleton_space() {
        let sk = Skeleton::builder()
            .bone(BoneSpec::new("root", translation(0.0, 1.0, 0.0)))
            .bone(BoneSpec::new("spine", translation(0.0, 2.0, 0.0)).parent("root"))
            .build()
            .unwrap();
        let spine = sk.find("spine").unwrap();
        assert_relative_eq!(*sk.rest_matrix(spine), translation(0.0, 3.0, 0.0));
        assert_relative_eq!(sk.parent_rest_matrix(spine), translation(0.0, 1.0, 0.0));
        assert_eq!(sk.depth(spine), 1);
        assert!(!sk.is_root(spine));
    }

    #[test]
    fn order_is_declaration_order_with_parents_first() {
        // "hand" is declared before its parent "arm".
        let sk = Skeleton::builder()
            .bone(BoneSpec::new("root", Matrix4::identity()))
            .bone(BoneSpec::new("hand", Matrix4::identity()).parent("arm"))
            .bone(BoneSpec::new("arm", Matrix4::identity()).parent("root"))
            .bone(BoneSpec::new("prop", Matrix4::identity()))
            .build()
            .unwrap();
        let names: Vec<&str> = sk
            .topological_order()
            .iter()
            .map(|&id| sk.bone(id).name.as_str())
            .collect();
        assert_eq!(names, vec!["root", "arm", "hand", "prop"]);
    }

    #[test]
    fn cycles_are_rejected() {
        let bones = vec![
            Bone {
                name: "a".into(),
                parent: Some(BoneId(1)),
                rest: Matrix4::identity(),
                rotation_mode: RotationMode::Quaternion,
                local_location: true,
            },
            Bone {
                name: "b".into(),
                parent: Some(BoneId(0)),
                rest: Matrix4::identity(),
                rotation_mode: RotationMode::Quaternion,
                local_location: true,
            },
        ];
        let err = Skeleton::new(bones).unwrap_err();
        assert!(matches!(err, RetargetError::InvalidSkeleton { .. }));
    }

    #[test]
    fn duplicate_and_unknown_parents_are_rejected() {
        let dup = Skeleton::builder()
            .bone(BoneSpec::new("a", Matrix4::identity()))
            .bone(BoneSpec::new("a", Matrix4::identity()))
            .build();
        assert!(matches!(dup, Err(RetargetError::InvalidSkeleton { .. })));

        let orphan = Skeleton::builder()
            .bone(BoneSpec::new("a", Matrix4::identity()).parent("ghost"))
            .build();
        assert!(matches!(orphan, Err(RetargetError::InvalidSkeleton { .. })));
    }

    #[test]
    fn singular_rest_is_rejected() {
        let err = Skeleton::builder()
            .bone(BoneSpec::new(
                "flat",
                Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, 1.0, 0.0)),
            ))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            RetargetError::NonInvertibleTransform {
                bone: "flat".into(),
                role: TransformRole::Rest
            }
        );
    }

    #[test]
    fn loads_from_json() {
        let json = r#"[
            {"name": "hips"},
            {"name": "spine", "parent": "hips", "rotation_mode": {"mode": "Euler", "order": "ZXY"}, "local_location": false}
        ]"#;
        let sk = Skeleton::from_json_str(json).unwrap();
        let spine = sk.bone(sk.find("spine").unwrap());
        assert_eq!(spine.parent, sk.find("hips"));
        assert_eq!(
            spine.rotation_mode,
            RotationMode::Euler(crate::rotation::EulerOrder::Zxy)
        );
        assert!(!spine.local_location);
        assert!(sk.bone(sk.find("hips").unwrap()).local_location);
    }
}
