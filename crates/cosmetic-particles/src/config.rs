//! Simulation tuning knobs

use serde::Deserialize;

/// How a universe seeds its random number generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedPolicy {
    /// Fresh entropy for every universe
    #[default]
    Entropy,
    /// A fixed seed, for replays and tests
    Fixed(u64),
}

/// Simulation settings shared by every universe of a
/// [`ParticleSystem`](crate::ParticleSystem).
///
/// ```
/// use cosmetic_particles::{SeedPolicy, SimulationConfig};
///
/// let config: SimulationConfig =
///     serde_json::from_str(r#"{ "max_bounces": 5, "seed": { "fixed": 7 } }"#).unwrap();
/// assert_eq!(config.max_bounces, 5);
/// assert_eq!(config.seed, SeedPolicy::Fixed(7));
/// assert_eq!(config.trim_threshold, SimulationConfig::default().trim_threshold);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Collision iterations per particle per step
    pub max_bounces: u32,
    /// Speed lost per second while sliding along a surface
    pub sliding_friction: f32,
    /// Vacant slots tolerated at the tail of an arena before it shrinks
    pub trim_threshold: usize,
    /// Collision radius used when an effect does not specify one
    pub collision_radius: f32,
    /// Most particles one emitter keeps alive, whatever its effect asks for
    pub max_particles_per_emitter: u32,
    /// Random seed of each universe
    pub seed: SeedPolicy,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_bounces: 3,
            sliding_friction: 0.4,
            trim_threshold: 64,
            collision_radius: 0.1,
            max_particles_per_emitter: 16_384,
            seed: SeedPolicy::Entropy,
        }
    }
}
