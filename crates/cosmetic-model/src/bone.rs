//! Immutable bone hierarchy
//!
//! Bones live in a flat arena indexed by [`BoneId`]. A parent is always
//! stored before its children, so a forward scan visits bones top-down and
//! a reverse scan visits them bottom-up. Per-frame state is kept apart in
//! [`crate::pose::PoseState`] so one tree can back any number of instances.

use crate::geometry::Cube;
use crate::part::{AvatarPart, Side};
use glam::Vec3;
use std::collections::HashMap;
use std::ops::Index;

/// Index of a bone within its [`BoneTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoneId(usize);

impl BoneId {
    /// The synthetic root every tree starts with
    pub const ROOT: BoneId = BoneId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    /// Name as declared, unique within the tree for declared bones
    pub name: String,
    /// `None` only for the root
    pub parent: Option<BoneId>,
    /// Direct children in insertion order
    pub children: Vec<BoneId>,
    /// Absolute pivot in model space
    pub pivot: Vec3,
    /// Base rotation in radians, applied Z then Y then X
    pub rotation: Vec3,
    /// Mirror flag inherited by cubes that do not set their own
    pub mirror: bool,
    /// Restricts drawing to one side of the avatar
    pub side: Option<Side>,
    /// Geometry attached to this bone
    pub cubes: Vec<Cube>,
    /// Avatar part this bone stands for, from the bone name table
    pub part: Option<AvatarPart>,
    /// Whether this bone or a descendant maps to an avatar part
    pub affects_pose: bool,
    /// Keep world orientation when a parent rotates
    pub gimbal: bool,
    /// Created by the loader rather than declared in content
    pub synthetic: bool,
}

impl Bone {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            children: Vec::new(),
            pivot: Vec3::ZERO,
            rotation: Vec3::ZERO,
            mirror: false,
            side: None,
            cubes: Vec::new(),
            part: None,
            affects_pose: false,
            gimbal: false,
            synthetic: false,
        }
    }

    pub fn with_pivot(mut self, pivot: Vec3) -> Self {
        self.pivot = pivot;
        self
    }

    pub fn with_rotation(mut self, rotation: Vec3) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_part(mut self, part: Option<AvatarPart>) -> Self {
        self.part = part;
        self
    }

    pub fn with_gimbal(mut self, gimbal: bool) -> Self {
        self.gimbal = gimbal;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoneTree {
    bones: Vec<Bone>,
    by_name: HashMap<String, BoneId>,
}

impl Default for BoneTree {
    fn default() -> Self {
        Self::new()
    }
}

impl BoneTree {
    /// A tree holding only the synthetic root
    pub fn new() -> Self {
        let mut root = Bone::new("");
        root.synthetic = true;
        Self {
            bones: vec![root],
            by_name: HashMap::new(),
        }
    }

    /// Append a bone under `parent`. Named lookups only see the first bone
    /// registered under a name. Returns `None` if `parent` is not a bone of
    /// this tree.
    pub fn add(&mut self, parent: BoneId, mut bone: Bone) -> Option<BoneId> {
        let id = BoneId(self.bones.len());
        self.bones.get_mut(parent.0)?.children.push(id);
        bone.parent = Some(parent);
        bone.children.clear();
        if !bone.synthetic {
            self.by_name.entry(bone.name.clone()).or_insert(id);
        }
        self.bones.push(bone);
        Some(id)
    }

    pub fn root(&self) -> BoneId {
        BoneId::ROOT
    }

    pub fn get(&self, id: BoneId) -> Option<&Bone> {
        self.bones.get(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: BoneId) -> Option<&mut Bone> {
        self.bones.get_mut(id.0)
    }

    pub fn find(&self, name: &str) -> Option<BoneId> {
        self.by_name.get(name).copied()
    }

    /// First bone mapped to `part`, in top-down order
    pub fn bone_for_part(&self, part: AvatarPart) -> Option<BoneId> {
        self.iter()
            .find(|(_, bone)| bone.part == Some(part))
            .map(|(id, _)| id)
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.len() <= 1
    }

    /// Bones in top-down order, root first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (BoneId, &Bone)> {
        self.bones.iter().enumerate().map(|(i, b)| (BoneId(i), b))
    }

    /// Recompute `affects_pose` bottom-up
    pub fn update_pose_flags(&mut self) {
        for i in (0..self.bones.len()).rev() {
            let affects = self.bones[i].part.is_some()
                || self.bones[i]
                    .children
                    .iter()
                    .any(|child| self.bones[child.0].affects_pose);
            self.bones[i].affects_pose = affects;
        }
    }
}

impl Index<BoneId> for BoneTree {
    type Output = Bone;

    fn index(&self, id: BoneId) -> &Bone {
        &self.bones[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arm_tree() -> BoneTree {
        let mut tree = BoneTree::new();
        let body = tree.add(BoneId::ROOT, Bone::new("body").with_part(Some(AvatarPart::Body))).unwrap();
        let sleeve = tree.add(body, Bone::new("sleeve")).unwrap();
        tree.add(sleeve, Bone::new("rightArm").with_part(Some(AvatarPart::RightArm))).unwrap();
        tree.add(BoneId::ROOT, Bone::new("halo")).unwrap();
        tree.update_pose_flags();
        tree
    }

    #[test]
    fn test_parents_precede_children() {
        let tree = arm_tree();
        for (id, bone) in tree.iter().skip(1) {
            let parent = bone.parent.unwrap();
            assert!(parent < id);
            assert!(tree[parent].children.contains(&id));
        }
    }

    #[test]
    fn test_affects_pose_propagates_up() {
        let tree = arm_tree();
        assert!(tree[tree.find("sleeve").unwrap()].affects_pose);
        assert!(tree[BoneId::ROOT].affects_pose);
        assert!(!tree[tree.find("halo").unwrap()].affects_pose);
    }

    #[test]
    fn test_bone_for_part() {
        let tree = arm_tree();
        assert_eq!(tree.bone_for_part(AvatarPart::RightArm), tree.find("rightArm"));
        assert_eq!(tree.bone_for_part(AvatarPart::Cape), None);
    }

    #[test]
    fn test_add_rejects_foreign_parent() {
        let big = arm_tree();
        let (last, _) = big.iter().next_back().unwrap();
        let mut small = BoneTree::new();

        assert_eq!(small.add(last, Bone::new("stray")), None);
        assert_eq!(small.len(), 1);
        assert_eq!(small.find("stray"), None);
        assert!(small[BoneId::ROOT].children.is_empty());
    }
}
