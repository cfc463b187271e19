//! Serde mirror of the particle effect JSON format
//!
//! These types follow the file layout one to one. [`super::ParticleEffect`]
//! folds them into the sum types the simulation works with.

use crate::billboard::Billboard;
use crate::curve::Curve;
use crate::effect::event::EventNode;
use crate::emission::{Direction, PlaneNormal};
use cosmetic_molang::{Expression, Vec3Expression};
use serde::Deserialize;
use serde::de::IgnoredAny;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
pub(crate) struct EffectFile {
    pub particle_effect: EffectDef,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EffectDef {
    pub description: DescriptionDef,
    #[serde(default)]
    pub curves: BTreeMap<String, Curve>,
    #[serde(default)]
    pub events: BTreeMap<String, EventNode>,
    #[serde(default)]
    pub components: ComponentsDef,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DescriptionDef {
    pub identifier: String,
    #[serde(default)]
    pub basic_render_parameters: RenderParametersDef,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RenderParametersDef {
    #[serde(default)]
    pub material: String,
    #[serde(default)]
    pub texture: String,
}

/// A single value or a list of them
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

fn one() -> Expression {
    Expression::one()
}

fn ten() -> Expression {
    Expression::constant(10.0)
}

fn fifty() -> Expression {
    Expression::constant(50.0)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ComponentsDef {
    #[serde(rename = "minecraft:emitter_local_space")]
    pub local_space: Option<LocalSpaceDef>,
    #[serde(rename = "minecraft:emitter_initialization")]
    pub emitter_initialization: Option<EmitterInitDef>,
    #[serde(rename = "minecraft:emitter_rate_instant")]
    pub rate_instant: Option<RateInstantDef>,
    #[serde(rename = "minecraft:emitter_rate_steady")]
    pub rate_steady: Option<RateSteadyDef>,
    #[serde(rename = "minecraft:emitter_rate_manual")]
    pub rate_manual: Option<RateManualDef>,
    #[serde(rename = "minecraft:emitter_lifetime_looping")]
    pub lifetime_looping: Option<LifetimeLoopingDef>,
    #[serde(rename = "minecraft:emitter_lifetime_once")]
    pub lifetime_once: Option<LifetimeOnceDef>,
    #[serde(rename = "minecraft:emitter_lifetime_expression")]
    pub lifetime_expression: Option<LifetimeExpressionDef>,
    #[serde(rename = "minecraft:emitter_lifetime_events")]
    pub emitter_events: Option<EmitterEventsDef>,
    #[serde(rename = "minecraft:emitter_shape_point")]
    pub shape_point: Option<ShapePointDef>,
    #[serde(rename = "minecraft:emitter_shape_sphere")]
    pub shape_sphere: Option<ShapeSphereDef>,
    #[serde(rename = "minecraft:emitter_shape_box")]
    pub shape_box: Option<ShapeBoxDef>,
    #[serde(rename = "minecraft:emitter_shape_disc")]
    pub shape_disc: Option<ShapeDiscDef>,

    #[serde(rename = "minecraft:particle_initial_speed")]
    pub initial_speed: Option<InitialSpeedDef>,
    #[serde(rename = "minecraft:particle_initial_spin")]
    pub initial_spin: Option<InitialSpinDef>,
    #[serde(rename = "minecraft:particle_initialization")]
    pub particle_initialization: Option<ParticleInitDef>,
    #[serde(rename = "minecraft:particle_lifetime_expression")]
    pub particle_lifetime: Option<ParticleLifetimeDef>,
    #[serde(rename = "minecraft:particle_lifetime_events")]
    pub particle_events: Option<ParticleEventsDef>,
    #[serde(rename = "minecraft:particle_kill_plane")]
    pub kill_plane: Option<[f32; 4]>,
    #[serde(rename = "minecraft:particle_motion_dynamic")]
    pub motion_dynamic: Option<MotionDynamicDef>,
    #[serde(rename = "minecraft:particle_motion_parametric")]
    pub motion_parametric: Option<MotionParametricDef>,
    #[serde(rename = "minecraft:particle_motion_collision")]
    pub motion_collision: Option<MotionCollisionDef>,
    #[serde(rename = "minecraft:particle_appearance_billboard")]
    pub billboard: Option<Billboard>,
    #[serde(rename = "minecraft:particle_appearance_tinting")]
    pub tinting: Option<TintingDef>,
    /// Has no parameters; its presence switches lighting on
    #[serde(rename = "minecraft:particle_appearance_lighting")]
    pub lighting: Option<IgnoredAny>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct LocalSpaceDef {
    pub position: bool,
    pub rotation: bool,
    pub velocity: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct EmitterInitDef {
    pub creation_expression: Option<Expression>,
    pub per_update_expression: Option<Expression>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RateInstantDef {
    #[serde(default = "ten")]
    pub num_particles: Expression,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RateSteadyDef {
    #[serde(default = "one")]
    pub spawn_rate: Expression,
    #[serde(default = "fifty")]
    pub max_particles: Expression,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RateManualDef {
    #[serde(default = "fifty")]
    pub max_particles: Expression,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LifetimeLoopingDef {
    #[serde(default = "ten")]
    pub active_time: Expression,
    #[serde(default)]
    pub sleep_time: Expression,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LifetimeOnceDef {
    #[serde(default = "ten")]
    pub active_time: Expression,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LifetimeExpressionDef {
    #[serde(default = "one")]
    pub activation_expression: Expression,
    #[serde(default)]
    pub expiration_expression: Expression,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct EmitterEventsDef {
    pub creation_event: OneOrMany<String>,
    pub expiration_event: OneOrMany<String>,
    pub timeline: BTreeMap<String, OneOrMany<String>>,
    pub travel_distance_events: BTreeMap<String, OneOrMany<String>>,
    pub looping_travel_distance_events: Vec<LoopingTravelDef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoopingTravelDef {
    pub distance: f32,
    #[serde(default)]
    pub effects: OneOrMany<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ShapePointDef {
    pub offset: Vec3Expression,
    pub direction: Vec3Expression,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ShapeSphereDef {
    #[serde(default)]
    pub offset: Vec3Expression,
    #[serde(default = "one")]
    pub radius: Expression,
    #[serde(default)]
    pub surface_only: bool,
    #[serde(default)]
    pub direction: Direction,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ShapeBoxDef {
    pub offset: Vec3Expression,
    pub half_dimensions: Vec3Expression,
    pub surface_only: bool,
    pub direction: Direction,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ShapeDiscDef {
    #[serde(default)]
    pub offset: Vec3Expression,
    #[serde(default = "one")]
    pub radius: Expression,
    #[serde(default)]
    pub plane_normal: PlaneNormal,
    #[serde(default)]
    pub surface_only: bool,
    #[serde(default)]
    pub direction: Direction,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum InitialSpeedDef {
    Scalar(Expression),
    Vector(Vec3Expression),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct InitialSpinDef {
    pub rotation: Expression,
    pub rotation_rate: Expression,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ParticleInitDef {
    pub per_update_expression: Option<Expression>,
    pub per_render_expression: Option<Expression>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ParticleLifetimeDef {
    #[serde(default = "one")]
    pub max_lifetime: Expression,
    #[serde(default)]
    pub expiration_expression: Option<Expression>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ParticleEventsDef {
    pub creation_event: OneOrMany<String>,
    pub expiration_event: OneOrMany<String>,
    pub timeline: BTreeMap<String, OneOrMany<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct MotionDynamicDef {
    pub linear_acceleration: Vec3Expression,
    pub linear_drag_coefficient: Expression,
    pub rotation_acceleration: Expression,
    pub rotation_drag_coefficient: Expression,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct MotionParametricDef {
    pub relative_position: Option<Vec3Expression>,
    pub direction: Option<Vec3Expression>,
    pub rotation: Option<Expression>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MotionCollisionDef {
    #[serde(default = "one")]
    pub enabled: Expression,
    #[serde(default)]
    pub collision_drag: f32,
    #[serde(default)]
    pub coefficient_of_restitution: f32,
    #[serde(default)]
    pub collision_radius: Option<f32>,
    #[serde(default)]
    pub expire_on_contact: bool,
    #[serde(default)]
    pub events: OneOrMany<CollisionEventDef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CollisionEventDef {
    pub event: String,
    #[serde(default = "default_min_speed")]
    pub min_speed: f32,
}

fn default_min_speed() -> f32 {
    2.0
}

#[derive(Debug, Deserialize)]
pub(crate) struct TintingDef {
    pub color: ColorDef,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ColorDef {
    Hex(String),
    Channels(Vec<Expression>),
    Gradient {
        #[serde(default)]
        interpolant: Expression,
        gradient: GradientDef,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum GradientDef {
    Timed(BTreeMap<String, StopColorDef>),
    Even(Vec<StopColorDef>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum StopColorDef {
    Hex(String),
    Channels(Vec<f32>),
}
