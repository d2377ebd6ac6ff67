//! Interactive snapping: copy one bone's full transform onto others.

use nalgebra::Matrix4;
use tracing::debug;

use crate::components::{match_rotation, match_scale, match_translation};
use crate::history::{UndoHistory, UndoSuspension};
use crate::ids::BoneId;
use crate::pose::Rig;
use crate::Result;

/// Snap every bone in `selected` onto the current world transform of
/// `active`. Bones are processed parents first; `active` itself is skipped.
///
/// The active bone's matrix is re-read for each bone, so snapping a parent
/// of `active` moves the reference for the bones after it.
pub fn snap_bones<H: UndoHistory + ?Sized>(
    rig: &mut Rig,
    active: BoneId,
    selected: &[BoneId],
    history: &mut H,
) -> Result<usize> {
    let _undo = UndoSuspension::new(history);
    let mut snapped = 0;
    for bone in by_depth(rig, selected) {
        if bone == active {
            continue;
        }
        let world = *rig.pose().world_matrix(active);
        snap_one(rig, bone, &world)?;
        snapped += 1;
    }
    Ok(snapped)
}

/// Snap every bone in `selected` onto a fixed skeleton-space matrix.
pub fn snap_bones_to_matrix<H: UndoHistory + ?Sized>(
    rig: &mut Rig,
    world: &Matrix4<f64>,
    selected: &[BoneId],
    history: &mut H,
) -> Result<usize> {
    let _undo = UndoSuspension::new(history);
    let bones = by_depth(rig, selected);
    for &bone in &bones {
        snap_one(rig, bone, world)?;
    }
    Ok(bones.len())
}

fn snap_one(rig: &mut Rig, bone: BoneId, world: &Matrix4<f64>) -> Result<()> {
    match_translation(rig, bone, world)?;
    match_rotation(rig, bone, world)?;
    match_scale(rig, bone, world)?;
    debug!(bone = %rig.skeleton().bone(bone).name, "snapped");
    Ok(())
}

fn by_depth(rig: &Rig, selected: &[BoneId]) -> Vec<BoneId> {
    let mut bones = selected.to_vec();
    bones.sort_by_key(|&b| (rig.skeleton().depth(b), b.index()));
    bones.dedup();
    bones
}
