//! Emitting posed geometry to a host renderer

use crate::bone::BoneTree;
use crate::part::{AvatarParts, Side};
use crate::pose::PoseState;
use crate::transform::BoneTransforms;
use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
use std::collections::HashSet;

/// Receives quads as four consecutive vertices
pub trait VertexSink {
    fn vertex(&mut self, position: Vec3, uv: Vec2, normal: Vec3, light: u32, color: Vec4);
}

impl<F> VertexSink for F
where
    F: FnMut(Vec3, Vec2, Vec3, u32, Vec4),
{
    fn vertex(&mut self, position: Vec3, uv: Vec2, normal: Vec3, light: u32, color: Vec4) {
        self(position, uv, normal, light, color);
    }
}

/// Per-frame values the host supplies with every render call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderParams {
    /// Model space to world space
    pub transform: Mat4,
    /// Packed light value passed through to the sink
    pub light: u32,
    /// Uniform scale applied in model space before `transform`
    pub scale: f32,
    /// Vertex color passed through to the sink
    pub color: Vec4,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            transform: Mat4::IDENTITY,
            light: 0,
            scale: 1.0,
            color: Vec4::ONE,
        }
    }
}

/// Which bones are drawn this frame
#[derive(Debug, Clone, PartialEq)]
pub struct Visibility {
    /// When set, bones tagged with the other side are skipped
    pub side: Option<Side>,
    /// Bones hidden together with their subtrees
    pub hidden_bones: HashSet<String>,
    /// Bones mapped to an avatar part outside this set are skipped
    pub parts: AvatarParts,
}

impl Default for Visibility {
    fn default() -> Self {
        Self {
            side: None,
            hidden_bones: HashSet::new(),
            parts: AvatarParts::all(),
        }
    }
}

impl Visibility {
    pub fn with_side(mut self, side: Side) -> Self {
        self.side = Some(side);
        self
    }

    pub fn hide(mut self, bone: impl Into<String>) -> Self {
        self.hidden_bones.insert(bone.into());
        self
    }
}

/// Emit every visible face of the posed tree. A skipped bone skips its whole
/// subtree. Returns the number of quads emitted.
pub fn render(
    tree: &BoneTree,
    state: &PoseState,
    sink: &mut dyn VertexSink,
    params: &RenderParams,
    visibility: &Visibility,
) -> usize {
    let transforms = BoneTransforms::compute(tree, state);
    let base = params.transform * Mat4::from_scale(Vec3::splat(params.scale));
    let mut skipped = vec![false; tree.len()];
    let mut quads = 0;

    for (id, bone) in tree.iter() {
        let bone_state = &state[id];
        let parent_skipped = bone.parent.is_some_and(|p| skipped[p.index()]);
        let other_side = matches!((visibility.side, bone.side), (Some(a), Some(b)) if a != b);
        let filtered_part = bone
            .part
            .is_some_and(|part| !visibility.parts.contains_part(part));

        let skip = parent_skipped
            || other_side
            || filtered_part
            || bone_state.hidden
            || !bone_state.visible
            || visibility.hidden_bones.contains(&bone.name);
        skipped[id.index()] = skip;
        if skip || bone.cubes.is_empty() {
            continue;
        }

        let matrix = base * transforms.global(id);
        let normal_matrix = Mat3::from_mat4(matrix).inverse().transpose();
        for face in bone.cubes.iter().flat_map(|cube| cube.faces()) {
            if face.is_degenerate() {
                continue;
            }
            let normal = (normal_matrix * face.normal).normalize_or_zero();
            for vertex in &face.vertices {
                sink.vertex(
                    matrix.transform_point3(vertex.position),
                    vertex.uv,
                    normal,
                    params.light,
                    params.color,
                );
            }
            quads += 1;
        }
    }

    quads
}
