//! Animating a loaded model and sharing the result

use cosmetic_model::{
    AnimationEvent, AnimationSet, Animator, AvatarPart, BoneLocators, BoneTransforms, LoadOptions,
    Locator, Model, Pose, PoseState, SoundDefinitions, apply_pose, retrieve_pose,
};
use cosmetic_molang::SimpleRuntime;
use glam::{Mat4, Vec3};
use std::rc::Rc;

const GEOMETRY: &str = r#"{
    "minecraft:geometry": [{
        "description": { "identifier": "geometry.cosmetic.cape" },
        "bones": [
            { "name": "cape", "pivot": [0, 24, 2], "locators": { "hem": [0, 8, 2] },
              "cubes": [{ "origin": [-5, 8, 2], "size": [10, 16, 1], "uv": [0, 0] }] }
        ]
    }]
}"#;

const ANIMATIONS: &str = r#"{
    "format_version": "1.8.0",
    "animations": {
        "animation.cape.sway": {
            "loop": true,
            "animation_length": 2.0,
            "bones": {
                "cape": {
                    "rotation": {
                        "0.0": { "post": [0, 0, 0], "lerp_mode": "catmullrom" },
                        "1.0": { "post": ["20 * v.wind", 0, 0], "lerp_mode": "catmullrom" },
                        "2.0": { "post": [0, 0, 0], "lerp_mode": "catmullrom" }
                    }
                }
            },
            "particle_effects": { "1.0": { "effect": "dust", "locator": "hem", "pre_effect_script": "v.size = 2;" } },
            "sound_effects": { "1.0": { "effect": "cape.rustle" } }
        },
        "animation.cape.zero": { "animation_length": -1 }
    }
}"#;

const SOUNDS: &str = r#"{ "sound_definitions": { "cape.rustle": { "sounds": ["cape/rustle1"] } } }"#;

fn setup() -> (Model, AnimationSet) {
    let _ = env_logger::builder().is_test(true).try_init();
    let model = Model::from_json(GEOMETRY, &LoadOptions::default()).unwrap();
    let sounds = SoundDefinitions::from_json(SOUNDS).unwrap();
    let set = AnimationSet::from_json(ANIMATIONS, Some(&sounds)).unwrap();
    (model, set)
}

#[test]
fn test_invalid_length_is_dropped() {
    let (_, set) = setup();
    assert_eq!(set.len(), 1);
    assert_eq!(set.diagnostics().len(), 1);
    assert!(set.diagnostics().has_errors());
}

#[test]
fn test_animated_cape_is_shared_through_pose() {
    let (model, set) = setup();
    let tree = model.tree();
    let mut state = PoseState::new(tree);
    let mut runtime = SimpleRuntime::new(5);
    runtime.variables.set("wind", 1.5);

    let mut animator = Animator::new();
    animator.play("animation.cape.sway");
    for _ in 0..4 {
        let events = animator.update(&set, tree, &mut state, 0.25, &mut runtime);
        assert!(events.is_empty());
    }
    apply_pose(tree, &mut state, &Pose::neutral());

    // Content x rotation of 30 degrees is -30 in model space
    let pose = retrieve_pose(tree, &state, &Pose::neutral());
    let cape = pose[AvatarPart::Cape];
    assert!(cape.is_rigid());
    assert!((cape.rotation.x + 30f32.to_radians()).abs() < 1e-4, "{cape:?}");
    assert!(cape.pivot.abs_diff_eq(AvatarPart::Cape.default_pivot(), 1e-5));

    // Entries at 1.0 fire on the frame that starts there
    let events = animator.update(&set, tree, &mut state, 0.25, &mut runtime);
    assert_eq!(events.len(), 2);
    match &events[0] {
        AnimationEvent::Particle {
            effect,
            locator,
            pre_effect_script,
        } => {
            assert_eq!(effect, "dust");
            assert_eq!(locator.as_deref(), Some("hem"));
            assert_eq!(pre_effect_script.as_ref().map(|e| e.source()), Some("v.size = 2;"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(&events[1], AnimationEvent::Sound { effect, .. } if effect == "cape.rustle"));
}

#[test]
fn test_locator_tracks_animation() {
    let (model, set) = setup();
    let tree = model.tree();
    let locators = BoneLocators::new(&model);
    let hem: Rc<dyn Locator> = locators.get("hem").unwrap();
    assert!(locators.get("cape").is_some());

    let mut state = PoseState::new(tree);
    let mut runtime = SimpleRuntime::new(5);
    runtime.variables.set("wind", 1.0);
    let mut animator = Animator::new();
    animator.play("animation.cape.sway");

    let mut positions = Vec::new();
    for _ in 0..3 {
        animator.update(&set, tree, &mut state, 0.25, &mut runtime);
        apply_pose(tree, &mut state, &Pose::neutral());
        locators.update(&BoneTransforms::compute(tree, &state), &Mat4::IDENTITY, 0.25);
        positions.push(hem.position());
    }

    // The hem stays 16 pixels from the cape pivot and swings further out each frame
    assert!(positions.windows(2).all(|w| w[1].z < w[0].z));
    let last = positions[2];
    let previous = positions[1];
    assert!(hem.velocity().abs_diff_eq((last - previous) / 0.25, 1e-4));
    assert!((last.distance(Vec3::new(0.0, 0.0, 2.0)) - 16.0).abs() < 1e-3);
}
