//! Bedrock keyframe animations
//!
//! This module provides animation playback for cosmetic bone trees:
//! - Animation set loading with per-animation diagnostics
//! - Keyframe interpolation (linear, step, Catmull-Rom)
//! - Particle and sound timelines reported as events
//!
//! # Example
//!
//! ```rust,ignore
//! use cosmetic_model::animation::{AnimationSet, Animator};
//!
//! let set = AnimationSet::from_json(json, Some(&sounds))?;
//! let mut animator = Animator::new();
//! animator.play("animation.wings.flap");
//!
//! // Once per frame, before applying the avatar pose
//! let events = animator.update(&set, model.tree(), &mut state, dt, &mut runtime);
//! ```

mod animator;
mod keyframe;

pub use animator::{AnimationContext, AnimationEvent, Animator};
pub use keyframe::{Channel, Keyframe, LerpMode, catmull_rom, find_keyframe_index};

use crate::diagnostic::Diagnostics;
use crate::error::Result;
use crate::sounds::SoundDefinitions;
use cosmetic_molang::{Expression, Vec3Expression};
use log::debug;
use serde::Deserialize;
use serde::de::{self, Deserializer};
use std::collections::BTreeMap;

/// What happens when playback reaches the end
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoopMode {
    #[default]
    Once,
    Loop,
    HoldOnLastFrame,
}

impl<'de> Deserialize<'de> for LoopMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Flag(true) => Ok(LoopMode::Loop),
            Raw::Flag(false) => Ok(LoopMode::Once),
            Raw::Name(name) => match name.as_str() {
                "true" => Ok(LoopMode::Loop),
                "false" => Ok(LoopMode::Once),
                "hold_on_last_frame" => Ok(LoopMode::HoldOnLastFrame),
                other => Err(de::Error::unknown_variant(
                    other,
                    &["true", "false", "hold_on_last_frame"],
                )),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoneAnimation {
    /// Target bone name
    pub bone: String,
    /// Degrees, content axes
    pub rotation: Option<Channel>,
    /// Pixels, content axes
    pub position: Option<Channel>,
    /// Multiplier per axis
    pub scale: Option<Channel>,
}

/// A particle effect started at a point of the timeline
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleTimelineEntry {
    /// Seconds into the animation
    pub time: f32,
    /// Particle effect identifier
    pub effect: String,
    /// Locator the emitter is bound to, the model pivot when unset
    pub locator: Option<String>,
    /// Run against the new emitter before its first update
    pub pre_effect_script: Option<Expression>,
}

/// A sound played at a point of the timeline
#[derive(Debug, Clone, PartialEq)]
pub struct SoundTimelineEntry {
    /// Seconds into the animation
    pub time: f32,
    /// Sound definition name
    pub effect: String,
    /// Where the sound plays from
    pub locator: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    /// Identifier, e.g. `animation.cosmetic.wave`
    pub name: String,
    /// What happens at the end of the animation
    pub loop_mode: LoopMode,
    /// Seconds; zero for animations that hold a single frame
    pub length: f32,
    /// Weight of this animation when several play at once
    pub blend_weight: Expression,
    /// Per-bone channels
    pub bones: Vec<BoneAnimation>,
    /// Sorted by time
    pub particle_effects: Vec<ParticleTimelineEntry>,
    /// Sorted by time
    pub sound_effects: Vec<SoundTimelineEntry>,
}

impl Animation {
    pub fn is_static(&self) -> bool {
        self.length <= 0.0
    }
}

/// All animations of one cosmetic
#[derive(Debug, Clone, Default)]
pub struct AnimationSet {
    animations: BTreeMap<String, Animation>,
    diagnostics: Diagnostics,
}

impl AnimationSet {
    /// Parse an animation file. Sound effects are checked against `sounds`
    /// when a table is supplied.
    pub fn from_json(json: &str, sounds: Option<&SoundDefinitions>) -> Result<Self> {
        let file: AnimationFile = serde_json::from_str(json)?;
        let mut diagnostics = Diagnostics::new();
        let mut animations = BTreeMap::new();

        for (name, def) in file.animations {
            if let Some(animation) = resolve(&name, def, sounds, &mut diagnostics) {
                animations.insert(name, animation);
            }
        }

        debug!(
            "Loaded {} animations ({} diagnostics)",
            animations.len(),
            diagnostics.len()
        );
        Ok(Self {
            animations,
            diagnostics,
        })
    }

    pub fn get(&self, name: &str) -> Option<&Animation> {
        self.animations.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.animations.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Animation> {
        self.animations.values()
    }

    pub fn len(&self) -> usize {
        self.animations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }

    pub fn insert(&mut self, animation: Animation) {
        self.animations.insert(animation.name.clone(), animation);
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }
}

fn resolve(
    name: &str,
    def: AnimationDef,
    sounds: Option<&SoundDefinitions>,
    diagnostics: &mut Diagnostics,
) -> Option<Animation> {
    if let Some(length) = def.animation_length
        && length <= 0.0
    {
        diagnostics.error(name, format!("animation_length must be positive, got {length}"));
        return None;
    }

    let mut bones = Vec::with_capacity(def.bones.len());
    for (bone, channels) in def.bones {
        bones.push(BoneAnimation {
            rotation: resolve_channel(name, &bone, channels.rotation, diagnostics),
            position: resolve_channel(name, &bone, channels.position, diagnostics),
            scale: resolve_channel(name, &bone, channels.scale, diagnostics),
            bone,
        });
    }

    let mut particle_effects = Vec::new();
    for (key, entries) in def.particle_effects {
        let Some(time) = parse_time(name, &key, diagnostics) else {
            continue;
        };
        for entry in entries.into_vec() {
            particle_effects.push(ParticleTimelineEntry {
                time,
                effect: entry.effect,
                locator: entry.locator,
                pre_effect_script: entry.pre_effect_script,
            });
        }
    }
    particle_effects.sort_by(|a, b| a.time.total_cmp(&b.time));

    let mut sound_effects = Vec::new();
    for (key, entries) in def.sound_effects {
        let Some(time) = parse_time(name, &key, diagnostics) else {
            continue;
        };
        for entry in entries.into_vec() {
            if let Some(sounds) = sounds
                && !sounds.contains(&entry.effect)
            {
                diagnostics.warning(name, format!("sound '{}' is not defined", entry.effect));
                continue;
            }
            sound_effects.push(SoundTimelineEntry {
                time,
                effect: entry.effect,
                locator: entry.locator,
            });
        }
    }
    sound_effects.sort_by(|a, b| a.time.total_cmp(&b.time));

    let length = def.animation_length.unwrap_or_else(|| {
        let keyframes = bones.iter().flat_map(|b| {
            [&b.rotation, &b.position, &b.scale]
                .into_iter()
                .flatten()
                .map(Channel::end_time)
        });
        let timelines = particle_effects
            .iter()
            .map(|e| e.time)
            .chain(sound_effects.iter().map(|e| e.time));
        keyframes.chain(timelines).fold(0.0, f32::max)
    });

    Some(Animation {
        name: name.to_string(),
        loop_mode: def.loop_mode,
        length,
        blend_weight: def.blend_weight,
        bones,
        particle_effects,
        sound_effects,
    })
}

fn parse_time(animation: &str, key: &str, diagnostics: &mut Diagnostics) -> Option<f32> {
    match key.trim().parse::<f32>() {
        Ok(time) if time.is_finite() && time >= 0.0 => Some(time),
        _ => {
            diagnostics.warning(animation, format!("invalid keyframe time '{key}'"));
            None
        }
    }
}

fn resolve_channel(
    animation: &str,
    bone: &str,
    def: Option<ChannelDef>,
    diagnostics: &mut Diagnostics,
) -> Option<Channel> {
    let keyframes = match def? {
        ChannelDef::Value(value) => return Some(Channel::Constant(value)),
        ChannelDef::Keyframes(keyframes) => keyframes,
    };

    let mut resolved = Vec::with_capacity(keyframes.len());
    for (key, value) in keyframes {
        let Some(time) = parse_time(animation, &key, diagnostics) else {
            continue;
        };
        resolved.push(match value {
            KeyframeDef::Value(value) => Keyframe {
                time,
                pre: value.clone(),
                post: value,
                lerp_mode: LerpMode::Linear,
            },
            KeyframeDef::Full {
                pre,
                post,
                lerp_mode,
            } => {
                let (pre, post) = match (pre, post) {
                    (Some(pre), Some(post)) => (pre, post),
                    (Some(value), None) | (None, Some(value)) => (value.clone(), value),
                    (None, None) => {
                        diagnostics.warning(
                            animation,
                            format!("keyframe {key} of bone '{bone}' has no value"),
                        );
                        continue;
                    }
                };
                Keyframe {
                    time,
                    pre,
                    post,
                    lerp_mode,
                }
            }
        });
    }

    if resolved.is_empty() {
        return None;
    }
    resolved.sort_by(|a, b| a.time.total_cmp(&b.time));
    Some(Channel::Keyframes(resolved))
}

#[derive(Debug, Deserialize)]
struct AnimationFile {
    #[serde(default)]
    #[allow(dead_code)]
    format_version: Option<String>,
    #[serde(default)]
    animations: BTreeMap<String, AnimationDef>,
}

#[derive(Debug, Deserialize)]
struct AnimationDef {
    #[serde(rename = "loop", default)]
    loop_mode: LoopMode,
    #[serde(default)]
    animation_length: Option<f32>,
    #[serde(default = "Expression::one")]
    blend_weight: Expression,
    #[serde(default)]
    bones: BTreeMap<String, BoneChannelsDef>,
    #[serde(default)]
    particle_effects: BTreeMap<String, OneOrMany<ParticleEffectDef>>,
    #[serde(default)]
    sound_effects: BTreeMap<String, OneOrMany<SoundEffectDef>>,
}

#[derive(Debug, Default, Deserialize)]
struct BoneChannelsDef {
    rotation: Option<ChannelDef>,
    position: Option<ChannelDef>,
    scale: Option<ChannelDef>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChannelDef {
    Keyframes(BTreeMap<String, KeyframeDef>),
    Value(Vec3Expression),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum KeyframeDef {
    Value(Vec3Expression),
    Full {
        #[serde(default)]
        pre: Option<Vec3Expression>,
        #[serde(default)]
        post: Option<Vec3Expression>,
        #[serde(default)]
        lerp_mode: LerpMode,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ParticleEffectDef {
    effect: String,
    #[serde(default)]
    locator: Option<String>,
    #[serde(default)]
    pre_effect_script: Option<Expression>,
}

#[derive(Debug, Deserialize)]
struct SoundEffectDef {
    effect: String,
    #[serde(default)]
    locator: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Severity;
    use pretty_assertions::assert_eq;

    const FLAP: &str = r#"{
        "format_version": "1.8.0",
        "animations": {
            "animation.wings.flap": {
                "loop": true,
                "bones": {
                    "wing": {
                        "rotation": { "0.0": [0, 0, 0], "0.5": [0, 0, "30 * v.strength"], "1.0": [0, 0, 0] },
                        "scale": 1.5
                    }
                },
                "particle_effects": { "0.25": { "effect": "sparkle", "locator": "tip" } },
                "sound_effects": { "0.5": [{ "effect": "wings.flap" }, { "effect": "wings.missing" }] }
            },
            "animation.broken": { "animation_length": 0 },
            "animation.idle": { "loop": "hold_on_last_frame", "bones": { "head": { "position": [0, 1, 0] } } }
        }
    }"#;

    fn sounds() -> SoundDefinitions {
        SoundDefinitions::from_json(r#"{ "sound_definitions": { "wings.flap": { "sounds": [] } } }"#)
            .unwrap()
    }

    #[test]
    fn test_load_animation_set() {
        let set = AnimationSet::from_json(FLAP, Some(&sounds())).unwrap();
        assert_eq!(set.len(), 2);

        let flap = set.get("animation.wings.flap").unwrap();
        assert_eq!(flap.loop_mode, LoopMode::Loop);
        assert_eq!(flap.length, 1.0);
        assert_eq!(flap.particle_effects[0].locator.as_deref(), Some("tip"));
        assert_eq!(flap.sound_effects.len(), 1);
        assert!(matches!(&flap.bones[0].rotation, Some(Channel::Keyframes(k)) if k.len() == 3));
        assert!(matches!(flap.bones[0].scale, Some(Channel::Constant(_))));

        let idle = set.get("animation.idle").unwrap();
        assert_eq!(idle.loop_mode, LoopMode::HoldOnLastFrame);
        assert!(idle.is_static());
    }

    #[test]
    fn test_bad_content_produces_diagnostics() {
        let set = AnimationSet::from_json(FLAP, Some(&sounds())).unwrap();
        assert!(!set.contains("animation.broken"));

        let diagnostics: Vec<_> = set.diagnostics().iter().collect();
        assert_eq!(diagnostics.len(), 2);
        assert!(
            set.diagnostics()
                .for_subject("animation.broken")
                .all(|d| d.severity == Severity::Error)
        );
        assert_eq!(set.diagnostics().for_subject("animation.wings.flap").count(), 1);
    }

    #[test]
    fn test_sounds_unchecked_without_table() {
        let set = AnimationSet::from_json(FLAP, None).unwrap();
        let flap = set.get("animation.wings.flap").unwrap();
        assert_eq!(flap.sound_effects.len(), 2);
    }

    #[test]
    fn test_loop_mode_values() {
        let parse = |json: &str| serde_json::from_str::<LoopMode>(json).unwrap();
        assert_eq!(parse("true"), LoopMode::Loop);
        assert_eq!(parse("false"), LoopMode::Once);
        assert_eq!(parse("\"hold_on_last_frame\""), LoopMode::HoldOnLastFrame);
        assert!(serde_json::from_str::<LoopMode>("\"sometimes\"").is_err());
    }
}
