//! One independently clocked set of emitters and particles
//!
//! A pass never removes anything while it iterates. Dead particles and
//! finished emitters are vacated after all entities were updated, and
//! emitters spawned by events are inserted last, so they start running on
//! the next pass.

use crate::arena::Arena;
use crate::collision::Collider;
use crate::config::SimulationConfig;
use crate::effect::event::{EventAction, SpawnKind};
use crate::effect::{EffectLibrary, ParticleEffect};
use crate::emitter::{Anchor, Emitter, EmitterHandle, EmitterOutput, SpawnMode};
use crate::particle::{Context, Particle, ParticleHandle};
use crate::render::{Camera, DrawItem};
use crate::system::{EntityId, SoundEvent};
use cosmetic_molang::Expression;
use glam::{Quat, Vec3};
use log::{trace, warn};
use rand::rngs::SmallRng;
use std::rc::Rc;

/// Where a fired event came from
#[derive(Debug, Clone)]
struct Origin {
    position: Vec3,
    rotation: Quat,
    velocity: Vec3,
    anchor: Anchor,
    owner: Option<EntityId>,
}

impl Origin {
    fn emitter(emitter: &Emitter) -> Self {
        let frame = emitter.frame();
        Self {
            position: frame.position,
            rotation: frame.rotation,
            velocity: frame.velocity,
            anchor: emitter.anchor().clone(),
            owner: emitter.owner(),
        }
    }

    fn particle(emitter: &Emitter, particle: &Particle) -> Self {
        let frame = emitter.frame();
        Self {
            position: particle.world_position(&frame),
            rotation: frame.rotation,
            velocity: particle.world_velocity(&frame),
            anchor: emitter.anchor().clone(),
            owner: emitter.owner(),
        }
    }
}

#[derive(Debug)]
struct Queued {
    origin: Origin,
    action: EventAction,
}

fn enqueue(queue: &mut Vec<Queued>, origin: &Origin, actions: &mut Vec<EventAction>) {
    queue.extend(actions.drain(..).map(|action| Queued {
        origin: origin.clone(),
        action,
    }));
}

#[derive(Debug)]
pub struct Universe {
    emitters: Arena<Emitter>,
    particles: Arena<Particle>,
    rng: SmallRng,
    frame: u64,
}

impl Universe {
    pub fn new(rng: SmallRng) -> Self {
        Self {
            emitters: Arena::new(),
            particles: Arena::new(),
            rng,
            frame: 0,
        }
    }

    /// Number of completed update passes
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn emitter_count(&self) -> usize {
        self.emitters.len()
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    pub fn emitter(&self, handle: EmitterHandle) -> Option<&Emitter> {
        self.emitters.get(handle)
    }

    pub fn emitters(&self) -> impl Iterator<Item = (EmitterHandle, &Emitter)> {
        self.emitters.iter()
    }

    pub fn particles(&self) -> impl Iterator<Item = (ParticleHandle, &Particle)> {
        self.particles.iter()
    }

    /// World position of a particle of this universe
    pub fn particle_position(&self, particle: &Particle) -> Vec3 {
        self.emitters
            .get(particle.emitter())
            .map_or(particle.position(), |emitter| particle.world_position(&emitter.frame()))
    }

    pub(crate) fn spawn(
        &mut self,
        effect: Rc<ParticleEffect>,
        anchor: Anchor,
        mode: SpawnMode,
        owner: Option<EntityId>,
        pre_effect: Option<&Expression>,
    ) -> EmitterHandle {
        let mut emitter = Emitter::new(effect, anchor, mode, owner);
        if let Some(expression) = pre_effect {
            emitter.run(expression, self.frame, &mut self.rng);
        }
        trace!("Spawning emitter of {}", emitter.effect().identifier);
        self.emitters.insert(emitter)
    }

    /// Queue `count` particles on a manual-rate emitter
    pub(crate) fn emit(&mut self, handle: EmitterHandle, count: u32) -> bool {
        match self.emitters.get_mut(handle) {
            Some(emitter) => {
                emitter.request(count);
                true
            }
            None => false,
        }
    }

    /// Stop every emitter of `owner`. Their particles die on the next pass.
    pub(crate) fn remove_owner(&mut self, owner: EntityId) -> usize {
        let mut removed = 0;
        for (_, emitter) in self.emitters.iter_mut() {
            if emitter.owner() == Some(owner) && !emitter.is_killed() {
                emitter.kill();
                removed += 1;
            }
        }
        removed
    }

    /// Run one pass and return the sounds it triggered
    pub(crate) fn update(
        &mut self,
        dt: f32,
        library: &EffectLibrary,
        config: &SimulationConfig,
        colliders: &[&dyn Collider],
    ) -> Vec<SoundEvent> {
        self.frame += 1;
        let frame = self.frame;
        let mut queue = Vec::new();
        let mut actions = Vec::new();
        let mut born = Vec::new();
        let mut out = EmitterOutput::default();

        for handle in self.emitters.handles() {
            let Some(emitter) = self.emitters.get_mut(handle) else {
                continue;
            };
            out.clear();
            emitter.update(dt, frame, config.max_particles_per_emitter, &mut self.rng, &mut out);
            enqueue(&mut queue, &Origin::emitter(emitter), &mut out.actions);

            for &pre_age in &out.spawns {
                let mut particle = Particle::spawn(handle, emitter, frame, &mut self.rng, &mut actions);
                let ctx = Context {
                    frame,
                    emitter: emitter.frame(),
                    emitter_vars: emitter.variables(),
                    colliders,
                    config,
                };
                particle.advance(pre_age, &ctx, &mut self.rng, &mut actions);
                enqueue(&mut queue, &Origin::particle(emitter, &particle), &mut actions);
                if particle.is_expired() {
                    emitter.release_particle();
                } else {
                    born.push(particle);
                }
            }
        }

        for (_, particle) in self.particles.iter_mut() {
            match self.emitters.get(particle.emitter()) {
                Some(emitter) if !emitter.is_killed() => {
                    let ctx = Context {
                        frame,
                        emitter: emitter.frame(),
                        emitter_vars: emitter.variables(),
                        colliders,
                        config,
                    };
                    particle.advance(dt, &ctx, &mut self.rng, &mut actions);
                    if !actions.is_empty() {
                        enqueue(&mut queue, &Origin::particle(emitter, particle), &mut actions);
                    }
                }
                _ => particle.kill(),
            }
        }

        let emitters = &mut self.emitters;
        self.particles.retain(|_, particle| {
            if !particle.is_expired() {
                return true;
            }
            if let Some(emitter) = emitters.get_mut(particle.emitter()) {
                emitter.release_particle();
            }
            false
        });
        for particle in born {
            self.particles.insert(particle);
        }
        self.emitters.retain(|_, emitter| !emitter.is_finished());

        let mut sounds = Vec::new();
        for Queued { origin, action } in queue {
            match action {
                EventAction::Sound(name) => sounds.push(SoundEvent {
                    name,
                    position: origin.position,
                    owner: origin.owner,
                }),
                EventAction::Spawn(spawn) => {
                    let Some(effect) = library.get(&spawn.effect) else {
                        warn!("Event spawns unknown particle effect '{}'", spawn.effect);
                        continue;
                    };
                    let fixed = Anchor::Fixed {
                        position: origin.position,
                        rotation: origin.rotation,
                    };
                    let (anchor, mode) = match spawn.kind {
                        SpawnKind::Emitter => (fixed, SpawnMode::Continuous),
                        SpawnKind::EmitterBound => (origin.anchor, SpawnMode::Continuous),
                        SpawnKind::Particle => (fixed, SpawnMode::Single { velocity: None }),
                        SpawnKind::ParticleWithVelocity => (
                            fixed,
                            SpawnMode::Single {
                                velocity: Some(origin.velocity),
                            },
                        ),
                    };
                    self.spawn(
                        Rc::clone(effect),
                        anchor,
                        mode,
                        origin.owner,
                        spawn.pre_effect_expression.as_ref(),
                    );
                }
            }
        }

        self.emitters.trim(config.trim_threshold);
        self.particles.trim(config.trim_threshold);
        sounds
    }

    /// Resolve the quads of every particle with a billboard
    pub(crate) fn draw_items(&mut self, camera: &Camera, items: &mut Vec<DrawItem>) {
        for (_, particle) in self.particles.iter_mut() {
            if particle.is_expired() || !particle.has_billboard() {
                continue;
            }
            let Some(emitter) = self.emitters.get(particle.emitter()) else {
                continue;
            };
            let quad = particle.prepare_billboard(
                &emitter.frame(),
                emitter.variables(),
                self.frame,
                &mut self.rng,
                camera,
            );
            items.push(DrawItem {
                effect: Rc::clone(particle.effect()),
                quad,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;

    fn library(effects: &[&str]) -> EffectLibrary {
        let mut library = EffectLibrary::new();
        for json in effects {
            library.load_json(json).unwrap();
        }
        library
    }

    const BURST: &str = r#"{
        "particle_effect": {
            "description": { "identifier": "test:burst" },
            "events": {
                "pop": {
                    "sound_effect": { "event_name": "pop" },
                    "particle_effect": { "effect": "test:spark", "type": "emitter" }
                }
            },
            "components": {
                "minecraft:emitter_rate_instant": { "num_particles": 2 },
                "minecraft:emitter_lifetime_once": { "active_time": 0.1 },
                "minecraft:particle_lifetime_expression": { "max_lifetime": 1 },
                "minecraft:particle_lifetime_events": { "expiration_event": "pop" }
            }
        }
    }"#;

    const SPARK: &str = r#"{
        "particle_effect": {
            "description": { "identifier": "test:spark" },
            "components": {
                "minecraft:emitter_rate_instant": { "num_particles": 1 },
                "minecraft:emitter_lifetime_once": { "active_time": 1 }
            }
        }
    }"#;

    fn universe() -> Universe {
        Universe::new(SmallRng::seed_from_u64(99))
    }

    #[test]
    fn test_events_spawn_on_next_pass() {
        let library = library(&[BURST, SPARK]);
        let config = SimulationConfig::default();
        let mut universe = universe();
        let effect = Rc::clone(library.get("test:burst").unwrap());
        universe.spawn(effect, Anchor::at(Vec3::new(0.0, 3.0, 0.0)), SpawnMode::Continuous, Some(EntityId(4)), None);

        universe.update(0.5, &library, &config, &[]);
        assert_eq!(universe.particle_count(), 2);

        let sounds = universe.update(0.5, &library, &config, &[]);
        assert_eq!(universe.particle_count(), 0);
        assert_eq!(sounds.len(), 2);
        assert_eq!(sounds[0].name, "pop");
        assert_eq!(sounds[0].position, Vec3::new(0.0, 3.0, 0.0));
        assert_eq!(sounds[0].owner, Some(EntityId(4)));
        // The burst emitter is done; the two sparks only start next pass
        assert_eq!(universe.emitter_count(), 2);

        universe.update(0.1, &library, &config, &[]);
        assert_eq!(universe.particle_count(), 2);
    }

    #[test]
    fn test_particle_dying_at_birth_releases_slot() {
        let library = library(&[r#"{
            "particle_effect": {
                "description": { "identifier": "test:flash" },
                "components": {
                    "minecraft:emitter_rate_instant": { "num_particles": 3 },
                    "minecraft:emitter_lifetime_once": { "active_time": 1 },
                    "minecraft:particle_lifetime_expression": { "max_lifetime": 0.1 }
                }
            }
        }"#]);
        let config = SimulationConfig::default();
        let mut universe = universe();
        let effect = Rc::clone(library.get("test:flash").unwrap());
        let handle = universe.spawn(effect, Anchor::at(Vec3::ZERO), SpawnMode::Continuous, None, None);

        universe.update(0.5, &library, &config, &[]);
        assert_eq!(universe.particle_count(), 0);
        assert_eq!(universe.emitter(handle).unwrap().particle_count(), 0);
    }

    #[test]
    fn test_unknown_spawned_effect_is_skipped() {
        let _ = env_logger::builder().is_test(true).try_init();
        let library = library(&[BURST]);
        let config = SimulationConfig::default();
        let mut universe = universe();
        let effect = Rc::clone(library.get("test:burst").unwrap());
        universe.spawn(effect, Anchor::at(Vec3::ZERO), SpawnMode::Continuous, None, None);

        universe.update(0.5, &library, &config, &[]);
        universe.update(0.5, &library, &config, &[]);
        assert_eq!(universe.emitter_count(), 0);
    }

    #[test]
    fn test_remove_owner_kills_particles() {
        let library = library(&[BURST, SPARK]);
        let config = SimulationConfig::default();
        let mut universe = universe();
        let effect = Rc::clone(library.get("test:burst").unwrap());
        universe.spawn(effect, Anchor::at(Vec3::ZERO), SpawnMode::Continuous, Some(EntityId(1)), None);
        universe.update(0.05, &library, &config, &[]);
        assert_eq!(universe.particle_count(), 2);

        assert_eq!(universe.remove_owner(EntityId(1)), 1);
        assert_eq!(universe.remove_owner(EntityId(2)), 0);
        let sounds = universe.update(0.05, &library, &config, &[]);
        assert!(sounds.is_empty());
        assert_eq!(universe.particle_count(), 0);
        assert_eq!(universe.emitter_count(), 0);
    }

    #[test]
    fn test_pre_effect_runs_before_start() {
        let library = library(&[SPARK]);
        let mut universe = universe();
        let effect = Rc::clone(library.get("test:spark").unwrap());
        let script = Expression::parse("v.power = 3;").unwrap();
        let handle = universe.spawn(effect, Anchor::at(Vec3::ZERO), SpawnMode::Continuous, None, Some(&script));
        assert_eq!(universe.emitter(handle).unwrap().variables().get("power"), Some(3.0));
    }
}
