use criterion::{Criterion, criterion_group, criterion_main};
use cosmetic_model::{
    AvatarPart, Bone, BoneId, BoneTransforms, BoneTree, Pose, PoseState, apply_pose,
    retrieve_pose,
};
use glam::Vec3;
use std::hint::black_box;

fn avatar_tree() -> BoneTree {
    let mut tree = BoneTree::new();
    let body = tree.add(BoneId::ROOT, Bone::new("body").with_part(Some(AvatarPart::Body))).unwrap();
    for part in AvatarPart::ALL.into_iter().filter(|p| *p != AvatarPart::Body) {
        let mut parent = tree.add(
            body,
            Bone::new(part.to_string())
                .with_pivot(part.default_pivot())
                .with_part(Some(part)),
        ).unwrap();
        for depth in 0..4 {
            parent = tree.add(
                parent,
                Bone::new(format!("{part}_{depth}")).with_pivot(Vec3::splat(depth as f32)),
            ).unwrap();
        }
    }
    tree.update_pose_flags();
    tree
}

fn bench_pose(c: &mut Criterion) {
    let tree = avatar_tree();
    let mut state = PoseState::new(&tree);
    for (id, _) in tree.iter() {
        state[id].rotation = Vec3::new(0.1, 0.2, 0.3);
    }
    let mut pose = Pose::neutral();
    pose[AvatarPart::LeftArm].rotation = Vec3::new(-0.8, 0.0, 0.2);

    c.bench_function("apply_pose", |b| {
        b.iter(|| apply_pose(&tree, &mut state, black_box(&pose)))
    });
    c.bench_function("retrieve_pose", |b| {
        b.iter(|| black_box(retrieve_pose(&tree, &state, &pose)))
    });
    c.bench_function("bone_transforms", |b| {
        b.iter(|| black_box(BoneTransforms::compute(&tree, &state)))
    });
}

criterion_group!(benches, bench_pose);
criterion_main!(benches);
