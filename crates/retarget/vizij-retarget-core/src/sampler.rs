//! Frame sampler: bakes driver motion onto a target rig as keyframes.
//!
//! ```text
//! Idle ──bake()──▶ Sampling { frame } ──last frame──▶ Done(report)
//!   ▲                     │
//!   └──────error──────────┘
//! ```
//!
//! Frames are processed strictly in increasing order and bone pairs in the
//! target skeleton's topological order, each write committed before the
//! next pair is read. The target starts every bake from its rest pose, so
//! repeating a bake over unchanged input writes the same keys.
//!
//! Every mapped source bone must resolve on the first frame before anything
//! is written. A bone that disappears later aborts the bake; keys written
//! for earlier pairs and frames stay in the sink.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::action::{Channel, KeyframeSink};
use crate::components::{match_rotation, match_translation};
use crate::config::RetargetConfig;
use crate::driver::{EvalContext, SourceRig};
use crate::error::RetargetError;
use crate::gate::should_key_rotation;
use crate::history::{UndoHistory, UndoSuspension};
use crate::ids::BoneId;
use crate::mapping::BoneMapping;
use crate::math;
use crate::pose::Rig;
use crate::skeleton::Skeleton;
use crate::Result;

/// Summary of a finished bake.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BakeReport {
    pub frame_start: i32,
    pub frame_end: i32,
    pub frames_sampled: usize,
    pub pairs: usize,
    pub translation_keys: usize,
    pub rotation_keys: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SamplerState {
    Idle,
    Sampling { frame: i32, frame_end: i32 },
    Done(BakeReport),
}

/// One mapped (source, target) pair, resolved at bake start.
#[derive(Clone, Debug)]
struct BonePair {
    target: BoneId,
    target_name: String,
    source_name: String,
    root: bool,
}

#[derive(Debug)]
pub struct FrameSampler {
    cfg: RetargetConfig,
    state: SamplerState,
}

impl FrameSampler {
    pub fn new(cfg: RetargetConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            state: SamplerState::Idle,
        })
    }

    pub fn config(&self) -> &RetargetConfig {
        &self.cfg
    }

    pub fn state(&self) -> &SamplerState {
        &self.state
    }

    /// Bake `source`'s motion onto `target` through `mapping`, writing keys
    /// into `sink`. Undo recording on `history` is suspended for the
    /// duration.
    ///
    /// `target`'s pose is reset to rest first.
    ///
    /// Fails without writing with `MissingAnimationData` when there is no
    /// frame range, and with `UnresolvedBoneMapping` when a mapped target
    /// bone is unknown or a mapped source bone is missing on the first
    /// frame. A source bone vanishing on a later frame aborts the bake with
    /// `UnresolvedBoneMapping`.
    pub fn bake<S, K, H>(
        &mut self,
        source: &mut S,
        target: &mut Rig,
        mapping: &BoneMapping,
        sink: &mut K,
        history: &mut H,
    ) -> Result<BakeReport>
    where
        S: SourceRig + ?Sized,
        K: KeyframeSink + ?Sized,
        H: UndoHistory + ?Sized,
    {
        self.state = SamplerState::Idle;

        let range = self
            .cfg
            .frame_range
            .or_else(|| source.frame_range())
            .ok_or_else(|| RetargetError::MissingAnimationData {
                reason: "driver has no action or frame range".to_string(),
            })?;
        if !range.is_valid() {
            return Err(RetargetError::MissingAnimationData {
                reason: format!("unusable frame range [{}, {}]", range.start, range.end),
            });
        }
        let (frame_start, frame_end) = range.sample_bounds();
        let pairs = resolve_pairs(target.skeleton(), mapping)?;

        info!(
            frame_start,
            frame_end,
            pairs = pairs.len(),
            tolerance = self.cfg.rotation_tolerance,
            "bake started"
        );

        let _undo = UndoSuspension::new(history);
        target.reset_pose();
        let mut report = BakeReport {
            frame_start,
            frame_end,
            pairs: pairs.len(),
            ..Default::default()
        };
        match self.sample(source, target, &pairs, sink, &mut report) {
            Ok(()) => {
                info!(
                    frames = report.frames_sampled,
                    translation_keys = report.translation_keys,
                    rotation_keys = report.rotation_keys,
                    "bake finished"
                );
                self.state = SamplerState::Done(report.clone());
                Ok(report)
            }
            Err(err) => {
                warn!(error = %err, frames = report.frames_sampled, "bake aborted");
                self.state = SamplerState::Idle;
                Err(err)
            }
        }
    }

    fn sample<S, K>(
        &mut self,
        source: &mut S,
        target: &mut Rig,
        pairs: &[BonePair],
        sink: &mut K,
        report: &mut BakeReport,
    ) -> Result<()>
    where
        S: SourceRig + ?Sized,
        K: KeyframeSink + ?Sized,
    {
        let tolerance = self.cfg.rotation_tolerance;
        for frame in report.frame_start..=report.frame_end {
            self.state = SamplerState::Sampling {
                frame,
                frame_end: report.frame_end,
            };
            source.set_frame(&EvalContext::at(frame))?;
            if frame == report.frame_start {
                check_sources(source, pairs)?;
            }
            debug!(frame, "sampling frame");

            for pair in pairs {
                let source_world = source.world_matrix(&pair.source_name).ok_or_else(|| {
                    RetargetError::UnresolvedBoneMapping {
                        bone: pair.source_name.clone(),
                    }
                })?;
                let source_rot = math::rotation(&source_world);
                let target_rot = target.pose().world_rotation(pair.target);
                let key_rotation = should_key_rotation(&source_rot, &target_rot, tolerance);

                if pair.root && self.cfg.key_root_translation {
                    let value = match_translation(target, pair.target, &source_world)?;
                    sink.insert_keyframe(&pair.target_name, Channel::Translation, frame, value)?;
                    report.translation_keys += 1;
                }

                if key_rotation {
                    let (channel, value) = match_rotation(target, pair.target, &source_world)?;
                    sink.insert_keyframe(&pair.target_name, channel, frame, value)?;
                    report.rotation_keys += 1;
                    debug!(frame, bone = %pair.target_name, ?channel, "rotation keyed");
                }
            }
            report.frames_sampled += 1;
        }
        Ok(())
    }
}

/// Every pair's source bone must exist before the first write.
fn check_sources<S: SourceRig + ?Sized>(source: &S, pairs: &[BonePair]) -> Result<()> {
    match pairs
        .iter()
        .find(|pair| source.world_matrix(&pair.source_name).is_none())
    {
        Some(pair) => Err(RetargetError::UnresolvedBoneMapping {
            bone: pair.source_name.clone(),
        }),
        None => Ok(()),
    }
}

fn resolve_pairs(skeleton: &Skeleton, mapping: &BoneMapping) -> Result<Vec<BonePair>> {
    mapping.validate_targets(skeleton)?;
    let pairs = skeleton
        .topological_order()
        .iter()
        .filter_map(|&id| {
            let bone = skeleton.bone(id);
            mapping.source_for(&bone.name).map(|source| BonePair {
                target: id,
                target_name: bone.name.clone(),
                source_name: source.to_string(),
                root: bone.parent.is_none(),
            })
        })
        .collect();
    Ok(pairs)
}
