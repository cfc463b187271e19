//! The host-facing particle system
//!
//! A [`ParticleSystem`] owns the loaded effects and one [`Universe`] per
//! registered clock. The host spawns effects into it, calls
//! [`ParticleSystem::update`] once per frame and [`ParticleSystem::render`]
//! whenever it draws.

use crate::clock::{Clock, RealTime};
use crate::collision::Collider;
use crate::config::{SeedPolicy, SimulationConfig};
use crate::effect::EffectLibrary;
use crate::emitter::{Anchor, Emitter, EmitterHandle, SpawnMode};
use crate::error::{ParticleError, Result};
use crate::render::{Camera, ParticleSink, draw};
use crate::universe::Universe;
use cosmetic_model::Locator;
use cosmetic_molang::Expression;
use glam::{Quat, Vec3};
use log::{debug, info, trace};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::fmt;
use std::rc::Rc;

/// The game entity an effect belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

/// A registered time source and its universe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClockId(usize);

impl ClockId {
    /// The wall-clock universe every system starts with
    pub const REAL_TIME: ClockId = ClockId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// A running emitter: its universe and its handle there
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EmitterRef {
    /// Universe the emitter runs in
    pub clock: ClockId,
    /// Stops resolving once the emitter is gone
    pub handle: EmitterHandle,
}

/// A sound an effect asked the host to play
#[derive(Debug, Clone, PartialEq)]
pub struct SoundEvent {
    /// Sound event name from the effect
    pub name: String,
    /// World position of the emitter or particle that fired the event
    pub position: Vec3,
    /// Entity the effect was spawned for
    pub owner: Option<EntityId>,
}

/// Everything needed to start an effect.
///
/// ```
/// use cosmetic_particles::{ClockId, EntityId, SpawnRequest};
/// use glam::Vec3;
///
/// let request = SpawnRequest::new("cosmetic:sparkle")
///     .at(Vec3::new(0.0, 1.5, 0.0))
///     .with_owner(EntityId(7))
///     .with_clock(ClockId::REAL_TIME)
///     .with_script("v.intensity = 2;")
///     .unwrap();
/// assert_eq!(request.effect(), "cosmetic:sparkle");
/// ```
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    effect: String,
    anchor: Anchor,
    owner: Option<EntityId>,
    clock: ClockId,
    pre_effect: Option<Expression>,
}

impl SpawnRequest {
    pub fn new(effect: impl Into<String>) -> Self {
        Self {
            effect: effect.into(),
            anchor: Anchor::at(Vec3::ZERO),
            owner: None,
            clock: ClockId::REAL_TIME,
            pre_effect: None,
        }
    }

    pub fn effect(&self) -> &str {
        &self.effect
    }

    /// Start at a fixed world position
    pub fn at(mut self, position: Vec3) -> Self {
        let rotation = match self.anchor {
            Anchor::Fixed { rotation, .. } => rotation,
            Anchor::Locator(_) => Quat::IDENTITY,
        };
        self.anchor = Anchor::Fixed { position, rotation };
        self
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        if let Anchor::Fixed { position, .. } = self.anchor {
            self.anchor = Anchor::Fixed { position, rotation };
        }
        self
    }

    /// Follow a locator. The effect stops when the locator goes away.
    pub fn bound_to(mut self, locator: &Rc<dyn Locator>) -> Self {
        self.anchor = Anchor::locator(locator);
        self
    }

    pub fn with_owner(mut self, owner: EntityId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_clock(mut self, clock: ClockId) -> Self {
        self.clock = clock;
        self
    }

    /// Expression run on the new emitter before its first update
    pub fn with_pre_effect(mut self, expression: Expression) -> Self {
        self.pre_effect = Some(expression);
        self
    }

    pub fn with_script(self, source: &str) -> Result<Self> {
        Ok(self.with_pre_effect(Expression::parse(source)?))
    }
}

struct Slot {
    clock: Box<dyn Clock>,
    universe: Universe,
}

type SoundHandler = Box<dyn FnMut(&SoundEvent)>;

pub struct ParticleSystem {
    library: EffectLibrary,
    config: SimulationConfig,
    slots: Vec<Slot>,
    colliders: Vec<Rc<dyn Collider>>,
    sound_handler: Option<SoundHandler>,
}

impl fmt::Debug for ParticleSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParticleSystem")
            .field("effects", &self.library.len())
            .field("config", &self.config)
            .field("universes", &self.slots.len())
            .field("colliders", &self.colliders.len())
            .finish_non_exhaustive()
    }
}

impl ParticleSystem {
    /// A system with a single real-time universe
    pub fn new(library: EffectLibrary, config: SimulationConfig) -> Self {
        info!(
            "Particle system with {} effects, seed {:?}",
            library.len(),
            config.seed
        );
        let mut system = Self {
            library,
            config,
            slots: Vec::new(),
            colliders: Vec::new(),
            sound_handler: None,
        };
        system.add_clock(RealTime);
        system
    }

    pub fn library(&self) -> &EffectLibrary {
        &self.library
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Register a time source with its own universe
    pub fn add_clock(&mut self, clock: impl Clock + 'static) -> ClockId {
        let id = ClockId(self.slots.len());
        let rng = match self.config.seed {
            SeedPolicy::Fixed(seed) => SmallRng::seed_from_u64(seed.wrapping_add(id.0 as u64)),
            SeedPolicy::Entropy => SmallRng::from_os_rng(),
        };
        debug!("Adding universe {} driven by {clock:?}", id.0);
        self.slots.push(Slot {
            clock: Box::new(clock),
            universe: Universe::new(rng),
        });
        id
    }

    pub fn add_collider(&mut self, collider: Rc<dyn Collider>) {
        self.colliders.push(collider);
    }

    pub fn clear_colliders(&mut self) {
        self.colliders.clear();
    }

    /// Receive every sound event after each update
    pub fn set_sound_handler(&mut self, handler: impl FnMut(&SoundEvent) + 'static) {
        self.sound_handler = Some(Box::new(handler));
    }

    /// Start an effect. It runs from the next update on.
    pub fn spawn(&mut self, request: SpawnRequest) -> Result<EmitterRef> {
        let effect = self
            .library
            .get(&request.effect)
            .ok_or_else(|| ParticleError::UnknownEffect(request.effect.clone()))?;
        let slot = self
            .slots
            .get_mut(request.clock.0)
            .ok_or(ParticleError::UnknownClock(request.clock.0))?;
        let handle = slot.universe.spawn(
            Rc::clone(effect),
            request.anchor,
            SpawnMode::Continuous,
            request.owner,
            request.pre_effect.as_ref(),
        );
        Ok(EmitterRef {
            clock: request.clock,
            handle,
        })
    }

    /// Queue `count` particles on an emitter with a manual rate. Returns
    /// false if the emitter is gone.
    pub fn emit(&mut self, emitter: EmitterRef, count: u32) -> bool {
        self.slots
            .get_mut(emitter.clock.0)
            .is_some_and(|slot| slot.universe.emit(emitter.handle, count))
    }

    pub fn emitter(&self, emitter: EmitterRef) -> Option<&Emitter> {
        self.universe(emitter.clock)?.emitter(emitter.handle)
    }

    /// Stop every effect of an entity. Returns the number of emitters
    /// stopped.
    pub fn remove_owner(&mut self, owner: EntityId) -> usize {
        self.slots
            .iter_mut()
            .map(|slot| slot.universe.remove_owner(owner))
            .sum()
    }

    pub fn universe(&self, clock: ClockId) -> Option<&Universe> {
        self.slots.get(clock.0).map(|slot| &slot.universe)
    }

    pub fn particle_count(&self) -> usize {
        self.slots.iter().map(|slot| slot.universe.particle_count()).sum()
    }

    pub fn emitter_count(&self) -> usize {
        self.slots.iter().map(|slot| slot.universe.emitter_count()).sum()
    }

    /// Advance every universe by what its clock makes of `dt`, then hand
    /// out the sounds that fired
    pub fn update(&mut self, dt: f32) {
        let colliders: Vec<&dyn Collider> = self.colliders.iter().map(|collider| &**collider).collect();
        let mut sounds = Vec::new();
        for slot in &mut self.slots {
            let step = slot.clock.advance(dt);
            sounds.extend(
                slot.universe
                    .update(step, &self.library, &self.config, &colliders),
            );
        }

        if let Some(handler) = &mut self.sound_handler {
            for sound in &sounds {
                handler(sound);
            }
        } else if !sounds.is_empty() {
            trace!("Dropping {} sounds without a handler", sounds.len());
        }
    }

    /// Draw every billboarded particle. Returns the number of quads.
    pub fn render(&mut self, camera: &Camera, sink: &mut dyn ParticleSink) -> usize {
        let mut items = Vec::new();
        for slot in &mut self.slots {
            slot.universe.draw_items(camera, &mut items);
        }
        draw(items, camera, sink)
    }
}
