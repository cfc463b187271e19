//! Bone hierarchy transform computation
//!
//! Every bone contributes `T(pivot + translation) * R * S * T(-pivot)` in
//! model space, pre-multiplied by its parent's global transform. Bones
//! placed by an avatar pose replace the parent chain with the placement.

use crate::bone::{Bone, BoneId, BoneTree};
use crate::pose::{BoneState, PoseState};
use glam::{EulerRot, Mat4, Quat, Vec3};

/// Tolerance below which a scale factor counts as one
const SCALE_EPSILON: f32 = 1e-5;

/// Rotation for Euler angles in radians, applied Z then Y then X
pub fn euler_to_quat(angles: Vec3) -> Quat {
    Quat::from_euler(EulerRot::ZYX, angles.z, angles.y, angles.x)
}

/// Inverse of [`euler_to_quat`]
pub fn quat_to_euler(rotation: Quat) -> Vec3 {
    let (z, y, x) = rotation.to_euler(EulerRot::ZYX);
    Vec3::new(x, y, z)
}

/// Rotation part of an affine transform
pub fn rotation_of(transform: &Mat4) -> Quat {
    let (_, rotation, _) = transform.to_scale_rotation_translation();
    rotation
}

/// The bone's own transform, before its parent is applied
pub fn local_transform(bone: &Bone, state: &BoneState) -> Mat4 {
    // A pose placement replaces the base rotation
    let base = if state.placement.is_some() {
        Vec3::ZERO
    } else {
        bone.rotation
    };
    let rotation = state.gimbal_correction * euler_to_quat(base + state.rotation);

    Mat4::from_translation(bone.pivot + state.translation)
        * Mat4::from_quat(rotation)
        * Mat4::from_scale(state.scale)
        * Mat4::from_translation(-bone.pivot)
}

/// The bone's global transform given its parent's
pub fn child_transform(parent: &Mat4, bone: &Bone, state: &BoneState) -> Mat4 {
    let frame = state.placement.unwrap_or(*parent);
    match state.extra {
        Some(extra) => frame * extra * local_transform(bone, state),
        None => frame * local_transform(bone, state),
    }
}

/// Whether the bone introduces scale or shear of its own
pub(crate) fn applies_scale(state: &BoneState) -> bool {
    state.extra.is_some() || !state.scale.abs_diff_eq(Vec3::ONE, SCALE_EPSILON)
}

/// Global transforms for every bone of a tree
#[derive(Debug, Clone, PartialEq)]
pub struct BoneTransforms {
    globals: Vec<Mat4>,
    /// Whether scale was applied anywhere on the chain up to the bone
    scaled: Vec<bool>,
}

impl BoneTransforms {
    pub fn compute(tree: &BoneTree, state: &PoseState) -> Self {
        let count = tree.len();
        let mut globals = Vec::with_capacity(count);
        let mut scaled = Vec::with_capacity(count);

        for (id, bone) in tree.iter() {
            let bone_state = &state[id];
            let (parent, parent_scaled) = match bone.parent {
                Some(parent) => (globals[parent.index()], scaled[parent.index()]),
                None => (Mat4::IDENTITY, false),
            };
            let inherited = parent_scaled && bone_state.placement.is_none();
            globals.push(child_transform(&parent, bone, bone_state));
            scaled.push(inherited || applies_scale(bone_state));
        }

        Self { globals, scaled }
    }

    pub fn global(&self, id: BoneId) -> Mat4 {
        self.globals
            .get(id.index())
            .copied()
            .unwrap_or(Mat4::IDENTITY)
    }

    pub fn is_scaled(&self, id: BoneId) -> bool {
        self.scaled.get(id.index()).copied().unwrap_or(false)
    }

    /// Where the bone's pivot ends up in model space
    pub fn pivot(&self, tree: &BoneTree, id: BoneId) -> Vec3 {
        let pivot = tree.get(id).map_or(Vec3::ZERO, |bone| bone.pivot);
        self.global(id).transform_point3(pivot)
    }

    pub fn len(&self) -> usize {
        self.globals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.globals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_euler_round_trip() {
        let angles = Vec3::new(0.3, -0.7, 1.2);
        let back = quat_to_euler(euler_to_quat(angles));
        assert!((back - angles).length() < 1e-5);
    }

    #[test]
    fn test_rotation_order_is_zyx() {
        let rotation = euler_to_quat(Vec3::new(FRAC_PI_2, 0.0, FRAC_PI_2));
        let expected = Quat::from_rotation_z(FRAC_PI_2) * Quat::from_rotation_x(FRAC_PI_2);
        assert!(rotation.angle_between(expected) < 1e-5);
    }

    #[test]
    fn test_rest_pose_is_identity() {
        let mut tree = BoneTree::new();
        let a = tree.add(BoneId::ROOT, Bone::new("a").with_pivot(Vec3::new(1.0, 2.0, 3.0))).unwrap();
        tree.add(a, Bone::new("b").with_pivot(Vec3::new(0.0, 5.0, 0.0))).unwrap();
        let state = PoseState::new(&tree);

        let transforms = BoneTransforms::compute(&tree, &state);
        for (id, _) in tree.iter() {
            assert!(transforms.global(id).abs_diff_eq(Mat4::IDENTITY, 1e-6));
            assert!(!transforms.is_scaled(id));
        }
    }

    #[test]
    fn test_rotation_about_pivot() {
        let mut tree = BoneTree::new();
        let arm = tree.add(
            BoneId::ROOT,
            Bone::new("arm")
                .with_pivot(Vec3::new(0.0, 2.0, 0.0))
                .with_rotation(Vec3::new(0.0, 0.0, FRAC_PI_2)),
        ).unwrap();
        let state = PoseState::new(&tree);
        let transforms = BoneTransforms::compute(&tree, &state);

        // The pivot stays put, a point below it swings around
        let m = transforms.global(arm);
        assert!(m.transform_point3(Vec3::new(0.0, 2.0, 0.0)).abs_diff_eq(Vec3::new(0.0, 2.0, 0.0), 1e-5));
        assert!(m.transform_point3(Vec3::new(0.0, 3.0, 0.0)).abs_diff_eq(Vec3::new(-1.0, 2.0, 0.0), 1e-5));
    }

    #[test]
    fn test_scale_marks_descendants() {
        let mut tree = BoneTree::new();
        let a = tree.add(BoneId::ROOT, Bone::new("a")).unwrap();
        let b = tree.add(a, Bone::new("b")).unwrap();
        let mut state = PoseState::new(&tree);
        state[a].scale = Vec3::new(1.0, 2.0, 1.0);

        let transforms = BoneTransforms::compute(&tree, &state);
        assert!(transforms.is_scaled(a));
        assert!(transforms.is_scaled(b));
        assert!(!transforms.is_scaled(BoneId::ROOT));
    }
}
