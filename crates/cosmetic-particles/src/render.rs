//! Handing particle quads to the host renderer

use crate::billboard::BillboardQuad;
use crate::effect::{BlendMode, ParticleEffect};
use glam::{Mat3, Quat, Vec3};
use std::rc::Rc;

/// Viewer used to orient and sort billboards. Looks along its local -Z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// World position
    pub position: Vec3,
    /// World orientation
    pub rotation: Quat,
}

impl Camera {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Camera at `position` with Y up, looking at `target`
    pub fn looking_at(position: Vec3, target: Vec3) -> Self {
        let forward = (target - position).normalize_or(Vec3::NEG_Z);
        let right = forward.cross(Vec3::Y).normalize_or(Vec3::X);
        let up = right.cross(forward);
        Self {
            position,
            rotation: Quat::from_mat3(&Mat3::from_cols(right, up, -forward)),
        }
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    /// Distance in front of the camera along the quad's normal
    pub fn depth(&self, quad: &BillboardQuad) -> f32 {
        (self.position - quad.position).dot(quad.normal())
    }
}

/// Receives particle quads in draw order
pub trait ParticleSink {
    fn quad(&mut self, texture: &str, blend: BlendMode, quad: &BillboardQuad);
}

impl<F> ParticleSink for F
where
    F: FnMut(&str, BlendMode, &BillboardQuad),
{
    fn quad(&mut self, texture: &str, blend: BlendMode, quad: &BillboardQuad) {
        self(texture, blend, quad);
    }
}

/// One quad waiting to be drawn
#[derive(Debug, Clone)]
pub(crate) struct DrawItem {
    pub effect: Rc<ParticleEffect>,
    pub quad: BillboardQuad,
}

/// Order-independent quads first in submission order, then blended quads
/// back to front. Returns the number of quads drawn.
pub(crate) fn draw(items: Vec<DrawItem>, camera: &Camera, sink: &mut dyn ParticleSink) -> usize {
    let count = items.len();
    let (mut sorted, unsorted): (Vec<_>, Vec<_>) = items
        .into_iter()
        .partition(|item| item.effect.blend.is_sorted());

    for item in &unsorted {
        sink.quad(&item.effect.texture, item.effect.blend, &item.quad);
    }

    sorted.sort_by(|a, b| camera.depth(&b.quad).total_cmp(&camera.depth(&a.quad)));
    for item in &sorted {
        sink.quad(&item.effect.texture, item.effect.blend, &item.quad);
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec4};

    fn quad(z: f32) -> BillboardQuad {
        BillboardQuad {
            position: Vec3::new(0.0, 0.0, z),
            rotation: Quat::IDENTITY,
            size: Vec2::splat(0.5),
            uv: [Vec2::ZERO, Vec2::ONE],
            color: Vec4::ONE,
            lit: false,
        }
    }

    #[test]
    fn test_looking_at() {
        let camera = Camera::looking_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        assert!(camera.rotation.abs_diff_eq(Quat::IDENTITY, 1e-6));
        let camera = Camera::looking_at(Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0));
        assert!(camera.forward().abs_diff_eq(Vec3::X, 1e-6));
    }

    #[test]
    fn test_blended_quads_drawn_back_to_front() {
        let effect = |texture: &str, material: &str| {
            let json = format!(
                r#"{{ "particle_effect": {{ "description": {{
                    "identifier": "test:{texture}",
                    "basic_render_parameters": {{ "material": "{material}", "texture": "{texture}" }}
                }} }} }}"#
            );
            Rc::new(ParticleEffect::from_json(&json).unwrap())
        };
        let camera = Camera::looking_at(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO);
        let items = vec![
            DrawItem { effect: effect("a", "particles_blend"), quad: quad(5.0) },
            DrawItem { effect: effect("b", "particles_alpha"), quad: quad(-5.0) },
            DrawItem { effect: effect("c", "particles_blend"), quad: quad(-2.0) },
            DrawItem { effect: effect("d", "particles_blend"), quad: quad(8.0) },
        ];

        let mut order = Vec::new();
        let mut sink = |texture: &str, _: BlendMode, _: &BillboardQuad| order.push(texture.to_string());
        assert_eq!(draw(items, &camera, &mut sink), 4);
        assert_eq!(order, ["b", "c", "a", "d"]);
    }
}
