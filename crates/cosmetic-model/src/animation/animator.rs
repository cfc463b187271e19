//! Animation playback state

use super::{Animation, AnimationSet, LoopMode};
use crate::bone::BoneTree;
use crate::geometry::{to_model_offset, to_model_rotation};
use crate::pose::PoseState;
use cosmetic_molang::{Expression, Runtime};
use glam::Vec3;
use log::trace;

/// Something an animation timeline asked the host to do
#[derive(Debug, Clone, PartialEq)]
pub enum AnimationEvent {
    Particle {
        effect: String,
        locator: Option<String>,
        pre_effect_script: Option<Expression>,
    },
    Sound {
        effect: String,
        locator: Option<String>,
    },
}

/// Runtime seen by animation expressions: answers the animation queries and
/// forwards everything else to the host runtime.
pub struct AnimationContext<'a, R: Runtime + ?Sized> {
    inner: &'a mut R,
    /// Answers `query.anim_time`
    pub anim_time: f32,
    /// Answers `query.delta_time`
    pub delta_time: f32,
    /// Answers `query.life_time`
    pub life_time: f32,
}

impl<'a, R: Runtime + ?Sized> AnimationContext<'a, R> {
    pub fn new(inner: &'a mut R) -> Self {
        Self {
            inner,
            anim_time: 0.0,
            delta_time: 0.0,
            life_time: 0.0,
        }
    }
}

impl<R: Runtime + ?Sized> Runtime for AnimationContext<'_, R> {
    fn variable(&mut self, name: &str) -> Option<f32> {
        self.inner.variable(name)
    }

    fn set_variable(&mut self, name: &str, value: f32) {
        self.inner.set_variable(name, value);
    }

    fn query(&mut self, name: &str, args: &[f32]) -> Option<f32> {
        match name {
            "anim_time" => Some(self.anim_time),
            "delta_time" => Some(self.delta_time),
            "life_time" => Some(self.life_time),
            _ => self.inner.query(name, args),
        }
    }

    fn context(&mut self, name: &str) -> Option<f32> {
        self.inner.context(name)
    }

    fn random(&mut self) -> f32 {
        self.inner.random()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Playing {
    name: String,
    time: f32,
    life_time: f32,
    started: bool,
}

impl Playing {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            time: 0.0,
            life_time: 0.0,
            started: false,
        }
    }

    /// Move the playhead by `dt` and collect the timeline entries crossed.
    /// Windows are `[from, to)` so consecutive frames never fire an entry twice.
    /// Returns false once the animation has finished.
    fn advance(&mut self, animation: &Animation, dt: f32, events: &mut Vec<AnimationEvent>) -> bool {
        let first = !self.started;
        self.started = true;
        self.life_time += dt;

        if animation.is_static() {
            if first {
                fire(animation, 0.0, 0.0, true, events);
            }
            return true;
        }

        let length = animation.length;
        let from = self.time;
        let to = from + dt;
        match animation.loop_mode {
            LoopMode::Loop => {
                if to >= length {
                    // At most one wrap of timeline entries per frame
                    fire(animation, from, length, false, events);
                    self.time = to.rem_euclid(length);
                    fire(animation, 0.0, self.time, false, events);
                } else {
                    fire(animation, from, to, false, events);
                    self.time = to;
                }
                true
            }
            LoopMode::Once => {
                if to >= length {
                    fire(animation, from, length, true, events);
                    self.time = length;
                    false
                } else {
                    fire(animation, from, to, false, events);
                    self.time = to;
                    true
                }
            }
            LoopMode::HoldOnLastFrame => {
                if from >= length {
                    return true;
                }
                if to >= length {
                    fire(animation, from, length, true, events);
                    self.time = length;
                } else {
                    fire(animation, from, to, false, events);
                    self.time = to;
                }
                true
            }
        }
    }
}

fn fire(animation: &Animation, from: f32, to: f32, inclusive: bool, events: &mut Vec<AnimationEvent>) {
    let crossed = |time: f32| time >= from && (time < to || (inclusive && time <= to));

    for entry in animation.particle_effects.iter().filter(|e| crossed(e.time)) {
        events.push(AnimationEvent::Particle {
            effect: entry.effect.clone(),
            locator: entry.locator.clone(),
            pre_effect_script: entry.pre_effect_script.clone(),
        });
    }
    for entry in animation.sound_effects.iter().filter(|e| crossed(e.time)) {
        events.push(AnimationEvent::Sound {
            effect: entry.effect.clone(),
            locator: entry.locator.clone(),
        });
    }
}

/// The animations playing on one cosmetic instance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Animator {
    playing: Vec<Playing>,
}

impl Animator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `name` from the beginning, restarting it if already playing
    pub fn play(&mut self, name: &str) {
        match self.playing.iter_mut().find(|p| p.name == name) {
            Some(playing) => *playing = Playing::new(name),
            None => self.playing.push(Playing::new(name)),
        }
    }

    pub fn stop(&mut self, name: &str) {
        self.playing.retain(|p| p.name != name);
    }

    pub fn stop_all(&mut self) {
        self.playing.clear();
    }

    pub fn is_playing(&self, name: &str) -> bool {
        self.playing.iter().any(|p| p.name == name)
    }

    /// Playhead of `name` in seconds
    pub fn time(&self, name: &str) -> Option<f32> {
        self.playing.iter().find(|p| p.name == name).map(|p| p.time)
    }

    pub fn playing(&self) -> impl Iterator<Item = &str> {
        self.playing.iter().map(|p| p.name.as_str())
    }

    /// Advance every animation by `dt` seconds and write the blended result
    /// into `state`, which is reset first. Timeline entries crossed during
    /// the frame are returned in animation order.
    pub fn update<R: Runtime + ?Sized>(
        &mut self,
        set: &AnimationSet,
        tree: &BoneTree,
        state: &mut PoseState,
        dt: f32,
        runtime: &mut R,
    ) -> Vec<AnimationEvent> {
        state.reset(tree);
        let mut events = Vec::new();
        let mut context = AnimationContext::new(runtime);
        context.delta_time = dt;

        self.playing.retain_mut(|playing| {
            let Some(animation) = set.get(&playing.name) else {
                trace!("Dropping unknown animation '{}'", playing.name);
                return false;
            };
            if !playing.advance(animation, dt, &mut events) {
                return false;
            }
            context.anim_time = playing.time;
            context.life_time = playing.life_time;
            apply(animation, playing.time, tree, state, &mut context);
            true
        });

        events
    }
}

fn apply<R: Runtime + ?Sized>(
    animation: &Animation,
    time: f32,
    tree: &BoneTree,
    state: &mut PoseState,
    runtime: &mut R,
) {
    let weight = animation.blend_weight.eval(runtime);
    if weight == 0.0 {
        return;
    }

    for channels in &animation.bones {
        let Some(id) = tree.find(&channels.bone) else {
            continue;
        };
        let rotation = channels
            .rotation
            .as_ref()
            .map(|c| to_model_rotation(c.sample(time, runtime)));
        let position = channels
            .position
            .as_ref()
            .map(|c| to_model_offset(c.sample(time, runtime)));
        let scale = channels.scale.as_ref().map(|c| c.sample(time, runtime));

        let bone = &mut state[id];
        if let Some(rotation) = rotation {
            bone.rotation += rotation * weight;
        }
        if let Some(position) = position {
            bone.translation += position * weight;
        }
        if let Some(scale) = scale {
            bone.scale *= Vec3::ONE + (scale - Vec3::ONE) * weight;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bone::{Bone, BoneId};
    use cosmetic_molang::SimpleRuntime;

    const ANIMATIONS: &str = r#"{
        "animations": {
            "animation.flap": {
                "loop": true,
                "animation_length": 1.0,
                "bones": { "wing": { "rotation": { "0.0": [0, 0, 0], "1.0": [0, 0, 90] } } },
                "particle_effects": { "0.0": { "effect": "puff" }, "0.5": { "effect": "sparkle", "locator": "tip" } }
            },
            "animation.nod": {
                "animation_length": 0.5,
                "bones": { "head": { "position": [0, "q.anim_time * 2", 0] } },
                "sound_effects": { "0.5": { "effect": "nod" } }
            },
            "animation.pose": {
                "blend_weight": "v.weight",
                "bones": { "wing": { "scale": 3 } }
            }
        }
    }"#;

    fn setup() -> (AnimationSet, BoneTree, PoseState) {
        let set = AnimationSet::from_json(ANIMATIONS, None).unwrap();
        let mut tree = BoneTree::new();
        tree.add(BoneId::ROOT, Bone::new("wing")).unwrap();
        tree.add(BoneId::ROOT, Bone::new("head")).unwrap();
        let state = PoseState::new(&tree);
        (set, tree, state)
    }

    fn effects(events: &[AnimationEvent]) -> Vec<&str> {
        events
            .iter()
            .map(|e| match e {
                AnimationEvent::Particle { effect, .. } | AnimationEvent::Sound { effect, .. } => {
                    effect.as_str()
                }
            })
            .collect()
    }

    #[test]
    fn test_loop_fires_each_entry_once_per_cycle() {
        let (set, tree, mut state) = setup();
        let mut runtime = SimpleRuntime::default();
        let mut animator = Animator::new();
        animator.play("animation.flap");

        let mut fired = Vec::new();
        for _ in 0..8 {
            let events = animator.update(&set, &tree, &mut state, 0.25, &mut runtime);
            fired.extend(effects(&events).into_iter().map(str::to_string));
        }
        assert_eq!(fired, ["puff", "sparkle", "puff", "sparkle"]);
        assert!(animator.is_playing("animation.flap"));
    }

    #[test]
    fn test_rotation_is_converted() {
        let (set, tree, mut state) = setup();
        let mut runtime = SimpleRuntime::default();
        let mut animator = Animator::new();
        animator.play("animation.flap");
        animator.update(&set, &tree, &mut state, 0.5, &mut runtime);

        let wing = tree.find("wing").unwrap();
        assert!((animator.time("animation.flap").unwrap() - 0.5).abs() < 1e-6);
        assert!((state[wing].rotation.z + 45f32.to_radians()).abs() < 1e-5);
    }

    #[test]
    fn test_once_finishes_and_fires_final_entry() {
        let (set, tree, mut state) = setup();
        let mut runtime = SimpleRuntime::default();
        let mut animator = Animator::new();
        animator.play("animation.nod");

        let head = tree.find("head").unwrap();
        let events = animator.update(&set, &tree, &mut state, 0.25, &mut runtime);
        assert!(events.is_empty());
        // Content y up is model y down
        assert!((state[head].translation.y + 0.5).abs() < 1e-5);

        let events = animator.update(&set, &tree, &mut state, 0.5, &mut runtime);
        assert_eq!(effects(&events), ["nod"]);
        assert!(!animator.is_playing("animation.nod"));
        assert_eq!(state[head].translation, Vec3::ZERO);
    }

    #[test]
    fn test_blend_weight_scales_contribution() {
        let (set, tree, mut state) = setup();
        let mut runtime = SimpleRuntime::default();
        runtime.variables.set("weight", 0.5);
        let mut animator = Animator::new();
        animator.play("animation.pose");
        animator.update(&set, &tree, &mut state, 0.1, &mut runtime);

        let wing = tree.find("wing").unwrap();
        assert_eq!(state[wing].scale, Vec3::splat(2.0));
        assert!(animator.is_playing("animation.pose"));
    }

    #[test]
    fn test_unknown_animation_is_dropped() {
        let (set, tree, mut state) = setup();
        let mut runtime = SimpleRuntime::default();
        let mut animator = Animator::new();
        animator.play("animation.missing");
        animator.update(&set, &tree, &mut state, 0.1, &mut runtime);
        assert_eq!(animator.playing().count(), 0);
    }
}
