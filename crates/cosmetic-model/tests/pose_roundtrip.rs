//! Applying a retrieved pose reproduces it

use cosmetic_model::transform::euler_to_quat;
use cosmetic_model::{
    AvatarPart, Bone, BoneId, BoneTransforms, BoneTree, Part, Pose, PoseState, apply_pose,
    retrieve_pose,
};
use glam::{Mat4, Vec3};
use proptest::prelude::*;

/// Nested avatar: limbs, wings and cape hang off the body
fn avatar_tree() -> BoneTree {
    let mut tree = BoneTree::new();
    let body = tree.add(
        BoneId::ROOT,
        Bone::new("body").with_part(Some(AvatarPart::Body)),
    ).unwrap();
    for part in AvatarPart::ALL {
        if part == AvatarPart::Body {
            continue;
        }
        let bone = tree.add(
            body,
            Bone::new(part.to_string())
                .with_pivot(part.default_pivot())
                .with_part(Some(part)),
        ).unwrap();
        // Unmapped decoration below a mapped bone
        tree.add(bone, Bone::new(format!("{part}_trim")).with_pivot(Vec3::ONE)).unwrap();
    }
    tree.update_pose_flags();
    tree
}

fn assert_part_close(actual: &Part, expected: &Part) {
    assert!(
        actual.pivot.abs_diff_eq(expected.pivot, 1e-3),
        "pivot {actual:?} != {expected:?}"
    );
    let angle = euler_to_quat(actual.rotation).angle_between(euler_to_quat(expected.rotation));
    assert!(angle < 1e-3, "rotation {actual:?} != {expected:?}");
    match (actual.extra, expected.extra) {
        (None, None) => {}
        (Some(a), Some(b)) => assert!(a.abs_diff_eq(b, 1e-3), "extra {a:?} != {b:?}"),
        _ => panic!("extra {actual:?} != {expected:?}"),
    }
}

fn round_trip(pose: &Pose) -> Pose {
    let tree = avatar_tree();
    let mut state = PoseState::new(&tree);
    apply_pose(&tree, &mut state, pose);
    retrieve_pose(&tree, &state, &Pose::neutral())
}

fn rotation() -> impl Strategy<Value = Vec3> {
    // Middle angle kept away from gimbal lock
    (-3.0f32..3.0, -1.4f32..1.4, -3.0f32..3.0).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

fn pivot() -> impl Strategy<Value = Vec3> {
    (-20.0f32..20.0, -20.0f32..20.0, -20.0f32..20.0).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

fn scale() -> impl Strategy<Value = Vec3> {
    (1.2f32..2.0, 1.2f32..2.0, 1.2f32..2.0).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

fn rigid_pose() -> impl Strategy<Value = Pose> {
    prop::collection::vec((pivot(), rotation()), AvatarPart::COUNT).prop_map(|parts| {
        let mut pose = Pose::neutral();
        for (part, (pivot, rotation)) in AvatarPart::ALL.into_iter().zip(parts) {
            pose[part] = Part {
                pivot,
                rotation,
                extra: None,
            };
        }
        pose
    })
}

proptest! {
    #[test]
    fn test_rigid_pose_round_trips(pose in rigid_pose()) {
        let retrieved = round_trip(&pose);
        for part in AvatarPart::ALL {
            assert_part_close(&retrieved[part], &pose[part]);
        }
    }

    #[test]
    fn test_scaled_pose_round_trips(
        pose in rigid_pose(),
        scale in scale(),
        index in 0..AvatarPart::COUNT,
    ) {
        // Scale about the part's rest pivot, the form retrieval produces
        let part = AvatarPart::ALL[index];
        let offset = part.default_pivot();
        let mut pose = pose;
        pose[part].extra = Some(
            Mat4::from_translation(offset)
                * Mat4::from_scale(scale)
                * Mat4::from_translation(-offset),
        );

        let retrieved = round_trip(&pose);
        for part in AvatarPart::ALL {
            assert_part_close(&retrieved[part], &pose[part]);
        }
    }
}

#[test]
fn test_replayed_pose_matches_animated_globals() {
    let tree = avatar_tree();
    let arm = tree.bone_for_part(AvatarPart::LeftArm).unwrap();
    let trim = tree.find("left_arm_trim").unwrap();

    // Animate the arm, then let a second instance replay the retrieved pose
    let mut animated = PoseState::new(&tree);
    animated[arm].rotation = Vec3::new(0.6, 0.0, -0.3);
    animated[arm].scale = Vec3::new(1.0, 1.4, 1.0);
    apply_pose(&tree, &mut animated, &Pose::neutral());
    let pose = retrieve_pose(&tree, &animated, &Pose::neutral());
    assert!(!pose[AvatarPart::LeftArm].is_rigid());

    let mut replay = PoseState::new(&tree);
    apply_pose(&tree, &mut replay, &pose);

    let expected = BoneTransforms::compute(&tree, &animated);
    let actual = BoneTransforms::compute(&tree, &replay);
    for id in [arm, trim] {
        assert!(
            expected.global(id).abs_diff_eq(actual.global(id), 1e-4),
            "{:?} differs",
            tree[id].name
        );
    }
}
