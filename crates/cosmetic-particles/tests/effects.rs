use cosmetic_model::Severity;
use cosmetic_particles::{
    BillboardQuad, BlendMode, Camera, EffectLibrary, LifetimeModel, Motion, ParticleEffect, ParticleError,
    ParticleSystem, RateModel, SeedPolicy, SimulationConfig, SpawnRequest,
};
use glam::{Vec2, Vec3, Vec4};
use pretty_assertions::assert_eq;
use test_case::test_case;

const FLAME: &str = r##"{
    "format_version": "1.10.0",
    "particle_effect": {
        "description": {
            "identifier": "cosmetic:flame",
            "basic_render_parameters": { "material": "particles_blend", "texture": "textures/particle/flame" }
        },
        "components": {
            "minecraft:emitter_rate_instant": { "num_particles": 1 },
            "minecraft:emitter_lifetime_once": { "active_time": 5 },
            "minecraft:emitter_shape_point": { "offset": [0, 0.5, 0] },
            "minecraft:particle_lifetime_expression": { "max_lifetime": 1 },
            "minecraft:particle_appearance_billboard": {
                "size": [0.2, 0.2],
                "facing_camera_mode": "lookat_xyz",
                "uv": {
                    "texture_width": 32,
                    "texture_height": 8,
                    "flipbook": {
                        "base_UV": [0, 0],
                        "size_UV": [8, 8],
                        "step_UV": [8, 0],
                        "max_frame": 4,
                        "stretch_to_lifetime": true
                    }
                }
            },
            "minecraft:particle_appearance_tinting": { "color": "#FF0000" }
        }
    }
}"##;

fn minimal(identifier: &str, material: &str) -> String {
    format!(
        r#"{{
            "particle_effect": {{
                "description": {{
                    "identifier": "{identifier}",
                    "basic_render_parameters": {{ "material": "{material}", "texture": "t" }}
                }},
                "components": {{}}
            }}
        }}"#
    )
}

#[test_case("particles_alpha", BlendMode::AlphaKey ; "alpha test")]
#[test_case("particles_blend", BlendMode::AlphaBlend ; "alpha blend")]
#[test_case("particles_add", BlendMode::Additive ; "additive")]
#[test_case("particles_opaque", BlendMode::Opaque ; "opaque")]
#[test_case("entity_alphatest", BlendMode::AlphaKey ; "unknown material")]
fn test_material_blend_mode(material: &str, expected: BlendMode) {
    let effect = ParticleEffect::from_json(&minimal("test:m", material)).unwrap();
    assert_eq!(effect.blend, expected);
}

#[test]
fn test_component_defaults() {
    let effect = ParticleEffect::from_json(&minimal("test:empty", "particles_alpha")).unwrap();
    assert!(matches!(effect.emitter.rate, RateModel::Manual { .. }));
    assert!(matches!(effect.emitter.lifetime, LifetimeModel::Looping { .. }));
    assert_eq!(effect.particle.motion, Motion::Static);
    assert!(effect.particle.billboard.is_none());
    assert!(effect.particle.collision.is_none());
}

#[test]
fn test_library_reports_duplicates_and_undefined_events() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut library = EffectLibrary::new();
    library.load_json(FLAME).unwrap();
    library.load_json(&minimal("cosmetic:flame", "particles_add")).unwrap();
    library
        .load_json(
            r#"{
                "particle_effect": {
                    "description": {
                        "identifier": "cosmetic:orphan",
                        "basic_render_parameters": { "material": "particles_alpha", "texture": "t" }
                    },
                    "components": {
                        "minecraft:emitter_lifetime_events": { "creation_event": "missing" }
                    }
                }
            }"#,
        )
        .unwrap();

    assert_eq!(library.len(), 2);
    assert_eq!(library.get("cosmetic:flame").unwrap().blend, BlendMode::AlphaBlend);

    let diagnostics = library.diagnostics();
    assert!(diagnostics.has_errors());
    let flame: Vec<_> = diagnostics.for_subject("cosmetic:flame").collect();
    assert_eq!(flame.len(), 1);
    assert_eq!(flame[0].severity, Severity::Error);
    let orphan: Vec<_> = diagnostics.for_subject("cosmetic:orphan").collect();
    assert_eq!(orphan.len(), 1);
    assert_eq!(orphan[0].severity, Severity::Warning);
    assert!(orphan[0].message.contains("missing"));
}

#[test]
fn test_malformed_effect_is_rejected() {
    let mut library = EffectLibrary::new();
    let result = library.load_json(r#"{ "particle_effect": { "components": {} } }"#);
    assert!(matches!(result, Err(ParticleError::Json(_))));

    let result = library.load_json(&minimal("test:x", "particles_alpha").replace(
        r#""components": {}"#,
        r#""components": { "minecraft:emitter_rate_instant": { "num_particles": "1 +" } }"#,
    ));
    assert!(result.is_err());
    assert!(library.is_empty());
}

#[test]
fn test_flipbook_and_tint_reach_the_sink() {
    let mut library = EffectLibrary::new();
    library.load_json(FLAME).unwrap();
    let config = SimulationConfig {
        seed: SeedPolicy::Fixed(3),
        ..SimulationConfig::default()
    };
    let mut system = ParticleSystem::new(library, config);
    system.spawn(SpawnRequest::new("cosmetic:flame")).unwrap();
    let camera = Camera::looking_at(Vec3::new(0.0, 0.5, 4.0), Vec3::new(0.0, 0.5, 0.0));

    let mut frames = Vec::new();
    for _ in 0..2 {
        system.update(0.3);
        let mut quads: Vec<(String, BlendMode, BillboardQuad)> = Vec::new();
        let drawn = system.render(&camera, &mut |texture: &str, blend: BlendMode, quad: &BillboardQuad| {
            quads.push((texture.to_string(), blend, *quad));
        });
        assert_eq!(drawn, 1);
        let (texture, blend, quad) = quads.remove(0);
        assert_eq!(texture, "textures/particle/flame");
        assert_eq!(blend, BlendMode::AlphaBlend);
        assert_eq!(quad.color, Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert!(quad.size.abs_diff_eq(Vec2::splat(0.2), 1e-6));
        assert!(quad.position.abs_diff_eq(Vec3::new(0.0, 0.5, 0.0), 1e-6));
        // Facing the camera
        assert!(quad.normal().abs_diff_eq(Vec3::Z, 1e-5));
        frames.push(quad.uv);
    }

    assert_eq!(
        frames,
        [
            [Vec2::new(0.25, 0.0), Vec2::new(0.5, 1.0)],
            [Vec2::new(0.5, 0.0), Vec2::new(0.75, 1.0)],
        ]
    );
}
