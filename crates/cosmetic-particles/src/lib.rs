//! Bedrock-style particle effects
//!
//! Effects are loaded from JSON into an [`EffectLibrary`] and run by a
//! [`ParticleSystem`]. Emitters and particles are simulated on the CPU, one
//! [`Universe`] per time source, and handed to the host as camera-facing
//! quads through a [`ParticleSink`].
//!
//! ```
//! use cosmetic_particles::{
//!     BillboardQuad, BlendMode, Camera, EffectLibrary, ParticleSystem, SeedPolicy,
//!     SimulationConfig, SpawnRequest,
//! };
//! use glam::Vec3;
//!
//! let mut library = EffectLibrary::new();
//! library
//!     .load_json(
//!         r#"{
//!             "particle_effect": {
//!                 "description": {
//!                     "identifier": "demo:sparkle",
//!                     "basic_render_parameters": { "material": "particles_blend", "texture": "sparkle" }
//!                 },
//!                 "components": {
//!                     "minecraft:emitter_rate_instant": { "num_particles": 4 },
//!                     "minecraft:particle_lifetime_expression": { "max_lifetime": 2 },
//!                     "minecraft:particle_appearance_billboard": { "size": [0.1, 0.1] }
//!                 }
//!             }
//!         }"#,
//!     )
//!     .unwrap();
//!
//! let config = SimulationConfig { seed: SeedPolicy::Fixed(1), ..SimulationConfig::default() };
//! let mut system = ParticleSystem::new(library, config);
//! system.spawn(SpawnRequest::new("demo:sparkle").at(Vec3::Y)).unwrap();
//! system.update(0.05);
//!
//! let camera = Camera::looking_at(Vec3::new(0.0, 1.0, 5.0), Vec3::Y);
//! let mut quads = 0;
//! system.render(&camera, &mut |_: &str, _: BlendMode, _: &BillboardQuad| quads += 1);
//! assert_eq!(quads, 4);
//! ```

pub mod arena;
pub mod billboard;
pub mod clock;
pub mod collision;
pub mod config;
pub mod curve;
pub mod effect;
pub mod emission;
pub mod emitter;
pub mod error;
pub mod particle;
pub mod render;
mod scope;
pub mod system;
pub mod universe;

pub use arena::{Arena, Handle};
pub use billboard::{Billboard, BillboardQuad, DirectionSource, FacingMode, Flipbook, Uv};
pub use clock::{CatchUp, Clock, RealTime, Scaled};
pub use collision::{Collider, Contact, Plane};
pub use config::{SeedPolicy, SimulationConfig};
pub use curve::{ChainNode, Curve, CurveKind, CurveNodes};
pub use effect::{
    BlendMode, Collision, EffectLibrary, EmitterComponents, InitialSpeed, LifetimeModel, LocalSpace, Motion,
    ParticleComponents, ParticleEffect, RateModel, Tint,
};
pub use emission::{Direction, Emission, PlaneNormal, Shape};
pub use emitter::{Anchor, Emitter, EmitterFrame, EmitterHandle, EmitterState};
pub use error::{ParticleError, Result};
pub use particle::{Particle, ParticleHandle};
pub use render::{Camera, ParticleSink};
pub use scope::EntityVars;
pub use system::{ClockId, EmitterRef, EntityId, ParticleSystem, SoundEvent, SpawnRequest};
pub use universe::Universe;
