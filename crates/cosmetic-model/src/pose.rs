//! Avatar pose sharing
//!
//! A [`Pose`] places every [`AvatarPart`] in model space. Applying a pose to
//! a bone tree moves each mapped bone to where the avatar's part is; reading
//! it back after animation yields a pose other cosmetics can replay so they
//! follow the same placement without sharing bones.
//!
//! A part's placement is `T(pivot) * R(rotation) * T(-offset) * extra`, where
//! `offset` is the part's pivot on the unposed avatar. Extras produced by
//! [`retrieve_pose`] always fix `offset`, which keeps the round trip exact.

use crate::bone::{BoneId, BoneTree};
use crate::part::{AvatarPart, AvatarParts};
use crate::transform::{child_transform, euler_to_quat, quat_to_euler, rotation_of};
use glam::{Mat4, Quat, Vec3};
use log::trace;
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Tolerance below which a residual extra counts as identity
const EXTRA_EPSILON: f32 = 1e-5;

/// Per-frame animation state of one bone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneState {
    /// Added to the base rotation, radians
    pub rotation: Vec3,
    /// Moves the pivot, model space pixels
    pub translation: Vec3,
    /// Multiplies the bone and its subtree about the pivot
    pub scale: Vec3,
    /// Residual transform applied before the bone's own transform
    pub extra: Option<Mat4>,
    /// Animated visibility
    pub visible: bool,
    /// Hidden by the host
    pub hidden: bool,
    /// Cancel inherited rotation when the bone itself is not rotated
    pub gimbal: bool,
    pub(crate) placement: Option<Mat4>,
    pub(crate) gimbal_correction: Quat,
}

impl Default for BoneState {
    fn default() -> Self {
        Self {
            rotation: Vec3::ZERO,
            translation: Vec3::ZERO,
            scale: Vec3::ONE,
            extra: None,
            visible: true,
            hidden: false,
            gimbal: false,
            placement: None,
            gimbal_correction: Quat::IDENTITY,
        }
    }
}

impl BoneState {
    /// Placement set by the last [`apply_pose`], if the bone is mapped
    pub fn placement(&self) -> Option<Mat4> {
        self.placement
    }
}

/// Per-frame state for every bone of one tree instance
#[derive(Debug, Clone, PartialEq)]
pub struct PoseState {
    bones: Vec<BoneState>,
}

impl PoseState {
    pub fn new(tree: &BoneTree) -> Self {
        let bones = tree
            .iter()
            .map(|(_, bone)| BoneState {
                gimbal: bone.gimbal,
                ..BoneState::default()
            })
            .collect();
        Self { bones }
    }

    /// Clear animation results for the next frame, keeping host visibility
    pub fn reset(&mut self, tree: &BoneTree) {
        for ((_, bone), state) in tree.iter().zip(self.bones.iter_mut()) {
            *state = BoneState {
                gimbal: bone.gimbal,
                hidden: state.hidden,
                ..BoneState::default()
            };
        }
    }

    pub fn get(&self, id: BoneId) -> Option<&BoneState> {
        self.bones.get(id.index())
    }

    pub fn get_mut(&mut self, id: BoneId) -> Option<&mut BoneState> {
        self.bones.get_mut(id.index())
    }

    /// Hide a bone by name; returns whether the bone exists
    pub fn set_hidden(&mut self, tree: &BoneTree, name: &str, hidden: bool) -> bool {
        match tree.find(name).and_then(|id| self.get_mut(id)) {
            Some(state) => {
                state.hidden = hidden;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }
}

impl Index<BoneId> for PoseState {
    type Output = BoneState;

    fn index(&self, id: BoneId) -> &BoneState {
        &self.bones[id.index()]
    }
}

impl IndexMut<BoneId> for PoseState {
    fn index_mut(&mut self, id: BoneId) -> &mut BoneState {
        &mut self.bones[id.index()]
    }
}

/// Placement of one avatar part
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Part {
    /// Model space pixels
    pub pivot: Vec3,
    /// Euler angles in radians, applied Z then Y then X
    pub rotation: Vec3,
    /// Residual scale or shear; `None` for a rigid placement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Mat4>,
}

impl Part {
    /// The part where the unposed avatar has it
    pub fn neutral(part: AvatarPart) -> Self {
        Self {
            pivot: part.default_pivot(),
            rotation: Vec3::ZERO,
            extra: None,
        }
    }

    pub fn is_rigid(&self) -> bool {
        self.extra.is_none()
    }

    /// The transform that moves `part`'s rest geometry to this placement
    pub fn placement(&self, part: AvatarPart) -> Mat4 {
        let rigid = self.rigid_placement(part);
        match self.extra {
            Some(extra) => rigid * extra,
            None => rigid,
        }
    }

    fn rigid_placement(&self, part: AvatarPart) -> Mat4 {
        Mat4::from_translation(self.pivot)
            * Mat4::from_quat(euler_to_quat(self.rotation))
            * Mat4::from_translation(-part.default_pivot())
    }

    /// Read a part placement back off a bone's global transform
    fn decompose(part: AvatarPart, global: &Mat4, scaled: bool) -> Self {
        let pivot = global.transform_point3(part.default_pivot());
        let rotation = quat_to_euler(rotation_of(global));
        let mut decomposed = Self {
            pivot,
            rotation,
            extra: None,
        };
        if scaled {
            let extra = decomposed.rigid_placement(part).inverse() * *global;
            if !extra.abs_diff_eq(Mat4::IDENTITY, EXTRA_EPSILON) {
                decomposed.extra = Some(extra);
            }
        }
        decomposed
    }
}

/// One [`Part`] per [`AvatarPart`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    parts: [Part; AvatarPart::COUNT],
}

impl Default for Pose {
    fn default() -> Self {
        Self::neutral()
    }
}

impl Pose {
    pub fn neutral() -> Self {
        Self {
            parts: AvatarPart::ALL.map(Part::neutral),
        }
    }

    pub fn get(&self, part: AvatarPart) -> &Part {
        &self.parts[part.index()]
    }

    pub fn set(&mut self, part: AvatarPart, value: Part) {
        self.parts[part.index()] = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (AvatarPart, &Part)> {
        AvatarPart::ALL.into_iter().zip(self.parts.iter())
    }
}

impl Index<AvatarPart> for Pose {
    type Output = Part;

    fn index(&self, part: AvatarPart) -> &Part {
        &self.parts[part.index()]
    }
}

impl IndexMut<AvatarPart> for Pose {
    fn index_mut(&mut self, part: AvatarPart) -> &mut Part {
        &mut self.parts[part.index()]
    }
}

/// Place every mapped bone where `pose` puts its avatar part.
///
/// Call after animations have been written to `state`: gimbal corrections
/// depend on the final rotation of each gimbal bone's ancestors.
pub fn apply_pose(tree: &BoneTree, state: &mut PoseState, pose: &Pose) {
    for (id, bone) in tree.iter() {
        let Some(part) = bone.part else {
            continue;
        };
        let placed = pose.get(part);
        let bone_state = &mut state[id];
        bone_state.placement = Some(placed.rigid_placement(part));
        bone_state.extra = placed.extra;
    }

    update_gimbal_corrections(tree, state);
}

/// Counter each gimbal bone's parent rotation, top-down so that corrections
/// of gimbal ancestors are already in place.
fn update_gimbal_corrections(tree: &BoneTree, state: &mut PoseState) {
    if !state.bones.iter().any(|s| s.gimbal) {
        return;
    }

    let mut globals = vec![Mat4::IDENTITY; tree.len()];
    for (id, bone) in tree.iter() {
        let parent = bone
            .parent
            .map_or(Mat4::IDENTITY, |parent| globals[parent.index()]);
        let bone_state = &mut state[id];
        bone_state.gimbal_correction = if bone_state.gimbal && bone_state.placement.is_none() {
            rotation_of(&parent).inverse()
        } else {
            Quat::IDENTITY
        };
        globals[id.index()] = child_transform(&parent, bone, bone_state);
    }
}

/// Read the placement of every mapped part off the animated tree.
///
/// Parts the tree does not map keep their value from `base`. Subtrees with
/// no mapped bone are not visited.
pub fn retrieve_pose(tree: &BoneTree, state: &PoseState, base: &Pose) -> Pose {
    let mut pose = base.clone();
    let mut seen = AvatarParts::empty();
    let mut stack = vec![(BoneId::ROOT, Mat4::IDENTITY, false)];

    while let Some((id, parent, parent_scaled)) = stack.pop() {
        let bone = &tree[id];
        if !bone.affects_pose {
            continue;
        }
        let bone_state = &state[id];
        let global = child_transform(&parent, bone, bone_state);
        let inherited = parent_scaled && bone_state.placement.is_none();
        let scaled = inherited || crate::transform::applies_scale(bone_state);

        if let Some(part) = bone.part
            && !seen.contains_part(part)
        {
            seen |= part.as_set();
            pose[part] = Part::decompose(part, &global, scaled);
            trace!("Retrieved {part} from bone '{}'", bone.name);
        }

        for child in bone.children.iter().rev() {
            stack.push((*child, global, scaled));
        }
    }

    pose
}
