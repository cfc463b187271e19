//! Particle effect definitions
//!
//! A [`ParticleEffect`] is the immutable description of an effect, shared by
//! every emitter running it. Effects are loaded from Bedrock-style JSON into
//! an [`EffectLibrary`], which rejects duplicate identifiers with a
//! diagnostic.
//!
//! ```
//! use cosmetic_particles::{EffectLibrary, RateModel};
//!
//! let json = r#"{
//!     "format_version": "1.10.0",
//!     "particle_effect": {
//!         "description": { "identifier": "demo:puff" },
//!         "components": {
//!             "minecraft:emitter_rate_instant": { "num_particles": 8 },
//!             "minecraft:particle_lifetime_expression": { "max_lifetime": 1.5 }
//!         }
//!     }
//! }"#;
//! let mut library = EffectLibrary::new();
//! library.load_json(json).unwrap();
//! let effect = library.get("demo:puff").unwrap();
//! assert!(matches!(effect.emitter.rate, RateModel::Instant { .. }));
//! ```

pub mod event;
mod schema;

pub use event::{EventNode, SoundEffect, SpawnEffect, SpawnKind, WeightedEvent};

use crate::billboard::Billboard;
use crate::curve::Curve;
use crate::emission::Shape;
use crate::error::Result;
use bitflags::bitflags;
use cosmetic_model::Diagnostics;
use cosmetic_molang::{Expression, Runtime, Vec3Expression};
use glam::Vec4;
use log::debug;
use schema::{
    ColorDef, ComponentsDef, EffectFile, GradientDef, OneOrMany, StopColorDef,
};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

/// How particle quads are blended, derived from the effect's material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    Opaque,
    /// Hard alpha cutoff (`particles_alpha`)
    #[default]
    AlphaKey,
    /// Alpha blending (`particles_blend`)
    AlphaBlend,
    /// Additive blending (`particles_add`)
    Additive,
}

impl BlendMode {
    pub fn from_material(material: &str) -> Self {
        match material {
            "particles_alpha" => BlendMode::AlphaKey,
            "particles_blend" => BlendMode::AlphaBlend,
            "particles_add" => BlendMode::Additive,
            "particles_opaque" => BlendMode::Opaque,
            other => {
                debug!("Unknown particle material '{other}', using alpha test");
                BlendMode::AlphaKey
            }
        }
    }

    /// Whether quads must be drawn back to front
    pub fn is_sorted(self) -> bool {
        self == BlendMode::AlphaBlend
    }
}

bitflags! {
    /// Which parts of the emitter transform particles follow after spawning
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LocalSpace: u8 {
        const POSITION = 0b001;
        const ROTATION = 0b010;
        /// Particles inherit the emitter's velocity when spawned
        const VELOCITY = 0b100;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RateModel {
    /// Everything at once when a loop starts
    Instant { num_particles: Expression },
    Steady {
        /// Particles per second
        spawn_rate: Expression,
        max_particles: Expression,
    },
    /// Only on request
    Manual { max_particles: Expression },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LifetimeModel {
    Looping {
        active_time: Expression,
        sleep_time: Expression,
    },
    Once { active_time: Expression },
    /// Emits while `activation` is non-zero, expires once `expiration` is
    Expression {
        activation: Expression,
        expiration: Expression,
    },
}

/// Events keyed by a time or distance threshold, sorted ascending
pub type Timeline = Vec<(f32, Vec<String>)>;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EmitterEvents {
    /// Fired once when the emitter starts
    pub creation: Vec<String>,
    /// Fired once when the emitter expires
    pub expiration: Vec<String>,
    /// Keyed by seconds into each loop
    pub timeline: Timeline,
    /// Keyed by total distance moved, each fired once
    pub travel_distance: Timeline,
    /// Fired every time the emitter covers the distance again
    pub looping_travel_distance: Timeline,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParticleEvents {
    /// Fired when the particle spawns
    pub creation: Vec<String>,
    /// Fired when the particle dies of age, expression or kill plane
    pub expiration: Vec<String>,
    /// Keyed by particle age
    pub timeline: Timeline,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EmitterComponents {
    /// Which emitter motions particles follow
    pub local_space: LocalSpace,
    /// Runs once when the emitter starts
    pub creation_expression: Option<Expression>,
    /// Runs every frame before spawning
    pub per_update_expression: Option<Expression>,
    /// How many particles spawn and when
    pub rate: RateModel,
    /// Active and sleep phases
    pub lifetime: LifetimeModel,
    /// Named events by trigger
    pub events: EmitterEvents,
    /// Where particles spawn and which way they head
    pub shape: Shape,
}

impl Default for RateModel {
    fn default() -> Self {
        RateModel::Manual {
            max_particles: Expression::constant(50.0),
        }
    }
}

impl Default for LifetimeModel {
    fn default() -> Self {
        LifetimeModel::Looping {
            active_time: Expression::constant(10.0),
            sleep_time: Expression::zero(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InitialSpeed {
    /// Along the emission direction
    Scalar(Expression),
    /// An emitter-space velocity, ignoring the emission direction
    Vector(Vec3Expression),
}

impl Default for InitialSpeed {
    fn default() -> Self {
        InitialSpeed::Scalar(Expression::zero())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DynamicMotion {
    /// Units per second squared
    pub linear_acceleration: Vec3Expression,
    /// Deceleration proportional to velocity
    pub linear_drag: Expression,
    /// Degrees per second squared
    pub rotation_acceleration: Expression,
    /// Deceleration proportional to spin
    pub rotation_drag: Expression,
}

/// Motion driven directly by expressions each frame
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParametricMotion {
    /// Offset from the emitter
    pub relative_position: Option<Vec3Expression>,
    /// Heading used by direction-facing billboards
    pub direction: Option<Vec3Expression>,
    /// Degrees
    pub rotation: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Motion {
    /// Particles stay where they spawn
    #[default]
    Static,
    Dynamic(DynamicMotion),
    Parametric(ParametricMotion),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollisionEvent {
    /// Event fired on impact
    pub event: String,
    /// Impacts slower than this into the surface do not fire the event
    pub min_speed: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Collision {
    /// Evaluated each frame, non-zero enables collision
    pub enabled: Expression,
    /// Speed lost per second while in contact
    pub drag: f32,
    /// Share of the normal speed kept after a bounce
    pub restitution: f32,
    /// Falls back to the simulation's default radius
    pub radius: Option<f32>,
    /// Particles die at their first contact
    pub expire_on_contact: bool,
    /// Fired on impacts, filtered by speed
    pub events: Vec<CollisionEvent>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tint {
    /// RGBA channels in `[0, 1]`
    Color([Expression; 4]),
    /// Colors at increasing interpolant values
    Gradient {
        interpolant: Expression,
        stops: Vec<(f32, Vec4)>,
    },
}

impl Tint {
    pub fn evaluate<R: Runtime + ?Sized>(&self, runtime: &mut R) -> Vec4 {
        match self {
            Tint::Color(channels) => Vec4::new(
                channels[0].eval(runtime),
                channels[1].eval(runtime),
                channels[2].eval(runtime),
                channels[3].eval(runtime),
            ),
            Tint::Gradient { interpolant, stops } => {
                let t = interpolant.eval(runtime);
                let Some(first) = stops.first() else {
                    return Vec4::ONE;
                };
                if t <= first.0 {
                    return first.1;
                }
                for pair in stops.windows(2) {
                    let ((t0, c0), (t1, c1)) = (pair[0], pair[1]);
                    if t <= t1 {
                        let span = t1 - t0;
                        let local = if span > 0.0 { (t - t0) / span } else { 1.0 };
                        return c0.lerp(c1, local);
                    }
                }
                stops.last().map_or(Vec4::ONE, |stop| stop.1)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParticleComponents {
    /// Speed along the emission direction, or a velocity
    pub initial_speed: InitialSpeed,
    /// Degrees
    pub initial_rotation: Expression,
    /// Degrees per second
    pub initial_rotation_rate: Expression,
    /// Runs every simulation step
    pub per_update_expression: Option<Expression>,
    /// Runs before the quad is built
    pub per_render_expression: Option<Expression>,
    /// Seconds, evaluated once at spawn
    pub max_lifetime: Expression,
    /// Non-zero kills the particle
    pub expiration_expression: Option<Expression>,
    /// Named events by trigger
    pub events: ParticleEvents,
    /// Plane `ax + by + cz + d = 0` relative to the emitter. Particles that
    /// cross it expire.
    pub kill_plane: Option<Vec4>,
    /// How the particle moves
    pub motion: Motion,
    /// Bouncing off host colliders
    pub collision: Option<Collision>,
    /// Drawn only when set
    pub billboard: Option<Billboard>,
    /// White when unset
    pub tint: Option<Tint>,
    /// Whether world lighting applies
    pub lit: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParticleEffect {
    /// Namespaced name, e.g. `cosmetic:flame`
    pub identifier: String,
    /// From the material
    pub blend: BlendMode,
    /// Texture path as written in the effect
    pub texture: String,
    /// Keyed by variable name without the `variable.` prefix
    pub curves: HashMap<String, Curve>,
    /// Event definitions by name
    pub events: HashMap<String, EventNode>,
    /// Emitter behaviour
    pub emitter: EmitterComponents,
    /// Particle behaviour
    pub particle: ParticleComponents,
}

impl ParticleEffect {
    /// Parse a single effect file
    pub fn from_json(json: &str) -> Result<Self> {
        let file: EffectFile = serde_json::from_str(json)?;
        let def = file.particle_effect;

        let curves = def
            .curves
            .into_iter()
            .map(|(name, curve)| (variable_name(&name), curve))
            .collect();
        let render = def.description.basic_render_parameters;

        let effect = ParticleEffect {
            identifier: def.description.identifier,
            blend: BlendMode::from_material(&render.material),
            texture: render.texture,
            curves,
            events: def.events.into_iter().collect(),
            emitter: emitter_components(&def.components),
            particle: particle_components(def.components),
        };
        debug!(
            "Loaded particle effect {} with {} curves and {} events",
            effect.identifier,
            effect.curves.len(),
            effect.events.len()
        );
        Ok(effect)
    }

    /// Event names referenced by components that the effect does not define
    pub fn undefined_events(&self) -> Vec<&str> {
        let emitter = &self.emitter.events;
        let particle = &self.particle.events;
        let timelines = [
            &emitter.timeline,
            &emitter.travel_distance,
            &emitter.looping_travel_distance,
            &particle.timeline,
        ];
        let collision = self
            .particle
            .collision
            .iter()
            .flat_map(|c| c.events.iter().map(|e| &e.event));

        let mut missing: Vec<&str> = emitter
            .creation
            .iter()
            .chain(&emitter.expiration)
            .chain(&particle.creation)
            .chain(&particle.expiration)
            .chain(timelines.into_iter().flatten().flat_map(|(_, names)| names))
            .chain(collision)
            .filter(|name| !self.events.contains_key(*name))
            .map(String::as_str)
            .collect();
        missing.sort_unstable();
        missing.dedup();
        missing
    }
}

/// `variable.size` and `v.size` both name the variable `size`
fn variable_name(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    key.strip_prefix("variable.")
        .or_else(|| key.strip_prefix("v."))
        .unwrap_or(&key)
        .to_string()
}

fn timeline(entries: BTreeMap<String, OneOrMany<String>>, subject: &str) -> Timeline {
    let mut timeline: Timeline = entries
        .into_iter()
        .filter_map(|(key, names)| match key.trim().parse::<f32>() {
            Ok(time) => Some((time, names.into_vec())),
            Err(_) => {
                debug!("{subject}: ignoring timeline key '{key}'");
                None
            }
        })
        .collect();
    timeline.sort_by(|a, b| a.0.total_cmp(&b.0));
    timeline
}

fn emitter_components(components: &ComponentsDef) -> EmitterComponents {
    let mut local_space = LocalSpace::empty();
    if let Some(def) = &components.local_space {
        local_space.set(LocalSpace::POSITION, def.position);
        local_space.set(LocalSpace::ROTATION, def.rotation);
        local_space.set(LocalSpace::VELOCITY, def.velocity);
    }

    let rate = if let Some(def) = &components.rate_instant {
        RateModel::Instant {
            num_particles: def.num_particles.clone(),
        }
    } else if let Some(def) = &components.rate_steady {
        RateModel::Steady {
            spawn_rate: def.spawn_rate.clone(),
            max_particles: def.max_particles.clone(),
        }
    } else if let Some(def) = &components.rate_manual {
        RateModel::Manual {
            max_particles: def.max_particles.clone(),
        }
    } else {
        RateModel::default()
    };

    let lifetime = if let Some(def) = &components.lifetime_looping {
        LifetimeModel::Looping {
            active_time: def.active_time.clone(),
            sleep_time: def.sleep_time.clone(),
        }
    } else if let Some(def) = &components.lifetime_once {
        LifetimeModel::Once {
            active_time: def.active_time.clone(),
        }
    } else if let Some(def) = &components.lifetime_expression {
        LifetimeModel::Expression {
            activation: def.activation_expression.clone(),
            expiration: def.expiration_expression.clone(),
        }
    } else {
        LifetimeModel::default()
    };

    let shape = if let Some(def) = &components.shape_point {
        Shape::Point {
            offset: def.offset.clone(),
            direction: def.direction.clone(),
        }
    } else if let Some(def) = &components.shape_sphere {
        Shape::Sphere {
            offset: def.offset.clone(),
            radius: def.radius.clone(),
            surface_only: def.surface_only,
            direction: def.direction.clone(),
        }
    } else if let Some(def) = &components.shape_box {
        Shape::Box {
            offset: def.offset.clone(),
            half_dimensions: def.half_dimensions.clone(),
            surface_only: def.surface_only,
            direction: def.direction.clone(),
        }
    } else if let Some(def) = &components.shape_disc {
        Shape::Disc {
            offset: def.offset.clone(),
            radius: def.radius.clone(),
            plane_normal: def.plane_normal.clone(),
            surface_only: def.surface_only,
            direction: def.direction.clone(),
        }
    } else {
        Shape::default()
    };

    let events = components
        .emitter_events
        .as_ref()
        .map(|def| EmitterEvents {
            creation: def.creation_event.clone().into_vec(),
            expiration: def.expiration_event.clone().into_vec(),
            timeline: timeline(def.timeline.clone(), "emitter timeline"),
            travel_distance: timeline(def.travel_distance_events.clone(), "travel distance"),
            looping_travel_distance: def
                .looping_travel_distance_events
                .iter()
                .filter(|e| e.distance > 0.0)
                .map(|e| (e.distance, e.effects.clone().into_vec()))
                .collect(),
        })
        .unwrap_or_default();

    let init = components.emitter_initialization.as_ref();
    EmitterComponents {
        local_space,
        creation_expression: init.and_then(|i| i.creation_expression.clone()),
        per_update_expression: init.and_then(|i| i.per_update_expression.clone()),
        rate,
        lifetime,
        events,
        shape,
    }
}

fn particle_components(components: ComponentsDef) -> ParticleComponents {
    let initial_speed = match components.initial_speed {
        Some(schema::InitialSpeedDef::Scalar(speed)) => InitialSpeed::Scalar(speed),
        Some(schema::InitialSpeedDef::Vector(velocity)) => InitialSpeed::Vector(velocity),
        None => InitialSpeed::default(),
    };
    let spin = components.initial_spin.unwrap_or_default();
    let init = components.particle_initialization.unwrap_or_default();
    let (max_lifetime, expiration_expression) = match components.particle_lifetime {
        Some(def) => (def.max_lifetime, def.expiration_expression),
        None => (Expression::one(), None),
    };

    let events = components
        .particle_events
        .map(|def| ParticleEvents {
            creation: def.creation_event.into_vec(),
            expiration: def.expiration_event.into_vec(),
            timeline: timeline(def.timeline, "particle timeline"),
        })
        .unwrap_or_default();

    let motion = if let Some(def) = components.motion_parametric {
        Motion::Parametric(ParametricMotion {
            relative_position: def.relative_position,
            direction: def.direction,
            rotation: def.rotation,
        })
    } else if let Some(def) = components.motion_dynamic {
        Motion::Dynamic(DynamicMotion {
            linear_acceleration: def.linear_acceleration,
            linear_drag: def.linear_drag_coefficient,
            rotation_acceleration: def.rotation_acceleration,
            rotation_drag: def.rotation_drag_coefficient,
        })
    } else {
        Motion::Static
    };

    let collision = components.motion_collision.map(|def| Collision {
        enabled: def.enabled,
        drag: def.collision_drag,
        restitution: def.coefficient_of_restitution,
        radius: def.collision_radius,
        expire_on_contact: def.expire_on_contact,
        events: def
            .events
            .into_vec()
            .into_iter()
            .map(|e| CollisionEvent {
                event: e.event,
                min_speed: e.min_speed,
            })
            .collect(),
    });

    ParticleComponents {
        initial_speed,
        initial_rotation: spin.rotation,
        initial_rotation_rate: spin.rotation_rate,
        per_update_expression: init.per_update_expression,
        per_render_expression: init.per_render_expression,
        max_lifetime,
        expiration_expression,
        events,
        kill_plane: components.kill_plane.map(Vec4::from_array),
        motion,
        collision,
        billboard: components.billboard,
        tint: components.tinting.and_then(|def| tint(def.color)),
        lit: components.lighting.is_some(),
    }
}

fn tint(color: ColorDef) -> Option<Tint> {
    match color {
        ColorDef::Hex(hex) => parse_hex_color(&hex).map(|c| Tint::Color(c.to_array().map(Expression::constant))),
        ColorDef::Channels(mut channels) => {
            if channels.len() < 3 {
                debug!("Ignoring tint with {} channels", channels.len());
                return None;
            }
            channels.truncate(4);
            if channels.len() == 3 {
                channels.push(Expression::one());
            }
            let [r, g, b, a]: [Expression; 4] = channels.try_into().ok()?;
            Some(Tint::Color([r, g, b, a]))
        }
        ColorDef::Gradient {
            interpolant,
            gradient,
        } => {
            let colors: Vec<(Option<f32>, StopColorDef)> = match gradient {
                GradientDef::Timed(map) => map
                    .into_iter()
                    .map(|(key, color)| (key.trim().parse().ok(), color))
                    .collect(),
                GradientDef::Even(list) => {
                    let last = list.len().saturating_sub(1).max(1) as f32;
                    list.into_iter()
                        .enumerate()
                        .map(|(i, color)| (Some(i as f32 / last), color))
                        .collect()
                }
            };
            let mut stops: Vec<(f32, Vec4)> = colors
                .into_iter()
                .filter_map(|(time, color)| Some((time?, stop_color(&color)?)))
                .collect();
            stops.sort_by(|a, b| a.0.total_cmp(&b.0));
            Some(Tint::Gradient { interpolant, stops })
        }
    }
}

fn stop_color(color: &StopColorDef) -> Option<Vec4> {
    match color {
        StopColorDef::Hex(hex) => parse_hex_color(hex),
        StopColorDef::Channels(channels) => match channels.as_slice() {
            [r, g, b] => Some(Vec4::new(*r, *g, *b, 1.0)),
            [r, g, b, a, ..] => Some(Vec4::new(*r, *g, *b, *a)),
            _ => None,
        },
    }
}

/// `#RRGGBB` or `#AARRGGBB` as linear RGBA in `[0, 1]`
pub fn parse_hex_color(hex: &str) -> Option<Vec4> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    let value = u32::from_str_radix(digits, 16).ok()?;
    let channel = |shift: u32| ((value >> shift) & 0xFF) as f32 / 255.0;
    match digits.len() {
        6 => Some(Vec4::new(channel(16), channel(8), channel(0), 1.0)),
        8 => Some(Vec4::new(channel(16), channel(8), channel(0), channel(24))),
        _ => None,
    }
}

/// Loaded effects by identifier
#[derive(Debug, Clone, Default)]
pub struct EffectLibrary {
    effects: HashMap<String, Rc<ParticleEffect>>,
    diagnostics: Diagnostics,
}

impl EffectLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and add one effect file. A malformed file is an error; an
    /// identifier that is already loaded is reported and the new effect
    /// dropped.
    pub fn load_json(&mut self, json: &str) -> Result<()> {
        let effect = ParticleEffect::from_json(json)?;
        self.insert(effect);
        Ok(())
    }

    /// Add an effect. Returns false if its identifier was already taken.
    pub fn insert(&mut self, effect: ParticleEffect) -> bool {
        if self.effects.contains_key(&effect.identifier) {
            self.diagnostics.error(
                effect.identifier.as_str(),
                "duplicate particle effect identifier, keeping the first definition",
            );
            return false;
        }
        for name in effect.undefined_events() {
            self.diagnostics.warning(
                effect.identifier.as_str(),
                format!("event '{name}' is referenced but not defined"),
            );
        }
        self.effects
            .insert(effect.identifier.clone(), Rc::new(effect));
        true
    }

    pub fn get(&self, identifier: &str) -> Option<&Rc<ParticleEffect>> {
        self.effects.get(identifier)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.effects.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<ParticleEffect>> {
        self.effects.values()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }
}
