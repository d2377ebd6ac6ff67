use nalgebra::{Matrix4, UnitQuaternion, Vector3};
use vizij_retarget_core::{
    components::{match_rotation, match_scale, match_translation},
    error::{RetargetError, TransformRole},
    history::UndoFlag,
    math,
    pose::Rig,
    rotation::{EulerOrder, Rotation, RotationMode},
    skeleton::{BoneSpec, Skeleton},
    snap::snap_bones,
    space::{local_pose_matrix, to_other_space, to_world_space},
};

fn approx_mat(a: &Matrix4<f64>, b: &Matrix4<f64>, eps: f64) {
    for (x, y) in a.iter().zip(b.iter()) {
        assert!((x - y).abs() <= eps, "left={a} right={b} eps={eps}");
    }
}

/// Three-bone chain with rotated rests; `mid` stores its location in the
/// parent-relative rest frame.
fn chain() -> Skeleton {
    let rest = |t: Vector3<f64>, roll: f64| {
        math::compose(
            &t,
            &UnitQuaternion::from_euler_angles(0.0, 0.0, roll),
            &Vector3::repeat(1.0),
        )
    };
    Skeleton::builder()
        .bone(BoneSpec::new("root", rest(Vector3::new(0.0, 0.5, 0.0), 0.2)))
        .bone(
            BoneSpec::new("mid", rest(Vector3::new(0.0, 1.0, 0.0), 0.6))
                .parent("root")
                .local_location(false)
                .rotation_mode(RotationMode::Euler(EulerOrder::Zxy)),
        )
        .bone(
            BoneSpec::new("tip", rest(Vector3::new(0.0, 0.7, 0.1), -0.4))
                .parent("mid")
                .rotation_mode(RotationMode::AxisAngle),
        )
        .build()
        .unwrap()
}

fn posed_chain() -> Rig {
    let mut rig = Rig::new(chain());
    let poses = [
        ("root", Vector3::new(0.3, -0.2, 1.0), (0.1, 0.7, -0.3), 1.5),
        ("mid", Vector3::new(0.0, 0.4, 0.0), (-0.8, 0.2, 0.5), 1.5),
        ("tip", Vector3::new(0.1, 0.0, -0.2), (0.3, -1.1, 0.9), 1.5),
    ];
    for (name, location, (r, p, y), scale) in poses {
        let id = rig.skeleton().find(name).unwrap();
        let mode = rig.skeleton().bone(id).rotation_mode;
        let channels = rig.channels_mut(id);
        channels.location = location;
        channels.rotation =
            Rotation::from_quaternion(&UnitQuaternion::from_euler_angles(r, p, y), mode);
        channels.scale = Vector3::repeat(scale);
    }
    rig.commit();
    rig
}

#[test]
fn matching_a_posed_rig_reproduces_every_world_matrix() {
    let source = posed_chain();
    let mut target = Rig::new(chain());

    for &id in source.skeleton().topological_order() {
        let world = *source.pose().world_matrix(id);
        match_translation(&mut target, id, &world).unwrap();
        match_rotation(&mut target, id, &world).unwrap();
        match_scale(&mut target, id, &world).unwrap();
    }

    for &id in source.skeleton().topological_order() {
        approx_mat(
            target.pose().world_matrix(id),
            source.pose().world_matrix(id),
            1e-9,
        );
    }
}

#[test]
fn local_and_world_conversions_invert_each_other() {
    let rig = posed_chain();
    for &id in rig.skeleton().topological_order() {
        let world = rig.pose().world_matrix(id);
        let local = to_other_space(world, rig.skeleton(), rig.pose(), id).unwrap();
        approx_mat(
            &to_world_space(&local, rig.skeleton(), rig.pose(), id),
            world,
            1e-9,
        );
        approx_mat(
            &local_pose_matrix(rig.skeleton(), rig.pose(), id).unwrap(),
            &rig.pose().channels(id).basis_matrix(rig.skeleton(), id),
            1e-9,
        );
    }
}

#[test]
fn collapsed_parent_is_reported_with_child_name() {
    let mut rig = posed_chain();
    let mid = rig.skeleton().find("mid").unwrap();
    let tip = rig.skeleton().find("tip").unwrap();
    rig.channels_mut(mid).scale = Vector3::new(1.0, 0.0, 1.0);
    rig.commit();

    let err = match_rotation(&mut rig, tip, &Matrix4::identity()).unwrap_err();
    assert_eq!(
        err,
        RetargetError::NonInvertibleTransform {
            bone: "tip".into(),
            role: TransformRole::ParentWorld,
        }
    );
}

#[test]
fn snapping_parent_then_child_lands_both_on_active() {
    let mut rig = posed_chain();
    let root = rig.skeleton().find("root").unwrap();
    let mid = rig.skeleton().find("mid").unwrap();
    let tip = rig.skeleton().find("tip").unwrap();
    let mut undo = UndoFlag::default();

    // tip is a descendant, so its world moves once mid is snapped; the
    // reference is re-read for every bone.
    let snapped = snap_bones(&mut rig, root, &[tip, mid, root], &mut undo).unwrap();
    assert_eq!(snapped, 2);
    assert!(undo.recording);

    let active = *rig.pose().world_matrix(root);
    approx_mat(rig.pose().world_matrix(mid), &active, 1e-9);
    approx_mat(rig.pose().world_matrix(tip), &active, 1e-9);
}
