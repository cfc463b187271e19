//! Emitter lifecycle
//!
//! An emitter runs `spawned -> active -> sleeping -> active ... -> expired`.
//! Each loop reseeds the emitter's random variables, re-evaluates its
//! durations, fires the instant burst and restarts its timeline. Creation
//! events fire once per emitter and expiration events at most once.
//!
//! An emitter never creates particles itself. [`Emitter::update`] reports
//! how many to spawn and how far into the frame each one was born, and the
//! universe builds them.

use crate::arena::Handle;
use crate::effect::event::{self, EventAction};
use crate::effect::{LifetimeModel, ParticleEffect, RateModel};
use crate::scope::{EntityVars, Scope};
use crate::system::EntityId;
use cosmetic_model::Locator;
use cosmetic_molang::Expression;
use glam::{Quat, Vec3};
use log::{debug, trace};
use rand::Rng;
use rand::rngs::SmallRng;
use std::rc::{Rc, Weak};

/// Loop restarts allowed within a single update
const MAX_LOOPS_PER_UPDATE: u32 = 1024;

pub type EmitterHandle = Handle<Emitter>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitterState {
    Active,
    Sleeping,
    Expired,
}

/// What an emitter is attached to
#[derive(Debug, Clone)]
pub enum Anchor {
    Fixed { position: Vec3, rotation: Quat },
    /// Follows a locator owned by the host. The emitter expires when the
    /// locator is dropped or reports itself invalid.
    Locator(Weak<dyn Locator>),
}

impl Anchor {
    pub fn at(position: Vec3) -> Self {
        Anchor::Fixed {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn locator(locator: &Rc<dyn Locator>) -> Self {
        Anchor::Locator(Rc::downgrade(locator))
    }

    /// Current transform, or `None` once the anchor is gone
    pub fn sample(&self) -> Option<EmitterFrame> {
        match self {
            Anchor::Fixed { position, rotation } => Some(EmitterFrame {
                position: *position,
                rotation: *rotation,
                velocity: Vec3::ZERO,
            }),
            Anchor::Locator(locator) => {
                let locator = locator.upgrade()?;
                locator.is_valid().then(|| EmitterFrame {
                    position: locator.position(),
                    rotation: locator.rotation(),
                    velocity: locator.velocity(),
                })
            }
        }
    }
}

/// World transform of an emitter for the current frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmitterFrame {
    /// World position
    pub position: Vec3,
    /// World orientation
    pub rotation: Quat,
    /// World velocity reported by the locator, zero for a fixed anchor
    pub velocity: Vec3,
}

impl Default for EmitterFrame {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum SpawnMode {
    /// Follow the effect's rate and lifetime components
    Continuous,
    /// Emit exactly one particle, optionally with an extra velocity, then
    /// expire
    Single { velocity: Option<Vec3> },
}

/// What one emitter update asks of the universe
#[derive(Debug, Default)]
pub(crate) struct EmitterOutput {
    /// Pre-age of every particle to create
    pub spawns: Vec<f32>,
    /// Event actions fired during the update
    pub actions: Vec<EventAction>,
}

impl EmitterOutput {
    pub fn clear(&mut self) {
        self.spawns.clear();
        self.actions.clear();
    }
}

struct Tick<'a> {
    dt: f32,
    frame: u64,
    particle_cap: u32,
    rng: &'a mut SmallRng,
    out: &'a mut EmitterOutput,
}

#[derive(Debug)]
pub struct Emitter {
    effect: Rc<ParticleEffect>,
    owner: Option<EntityId>,
    anchor: Anchor,
    pub(crate) mode: SpawnMode,
    pub(crate) vars: EntityVars,
    frame: EmitterFrame,
    state: EmitterState,
    /// Time since the current loop started
    loop_age: f32,
    active_time: f32,
    sleep_time: f32,
    spawn_interval: f32,
    spawn_timer: f32,
    max_particles: u32,
    particle_count: u32,
    next_timeline: usize,
    travelled: f32,
    next_travel: usize,
    looping_travel: Vec<f32>,
    manual_requests: u32,
    started: bool,
    created: bool,
    expiration_fired: bool,
    killed: bool,
}

impl Emitter {
    pub(crate) fn new(effect: Rc<ParticleEffect>, anchor: Anchor, mode: SpawnMode, owner: Option<EntityId>) -> Self {
        let frame = anchor.sample().unwrap_or_default();
        let looping_travel = vec![0.0; effect.emitter.events.looping_travel_distance.len()];
        Self {
            effect,
            owner,
            anchor,
            mode,
            vars: EntityVars::new(),
            frame,
            state: EmitterState::Active,
            loop_age: 0.0,
            active_time: 0.0,
            sleep_time: 0.0,
            spawn_interval: f32::INFINITY,
            spawn_timer: 0.0,
            max_particles: 0,
            particle_count: 0,
            next_timeline: 0,
            travelled: 0.0,
            next_travel: 0,
            looping_travel,
            manual_requests: 0,
            started: false,
            created: false,
            expiration_fired: false,
            killed: false,
        }
    }

    pub fn effect(&self) -> &Rc<ParticleEffect> {
        &self.effect
    }

    pub fn owner(&self) -> Option<EntityId> {
        self.owner
    }

    pub fn anchor(&self) -> &Anchor {
        &self.anchor
    }

    pub fn frame(&self) -> EmitterFrame {
        self.frame
    }

    pub fn state(&self) -> EmitterState {
        self.state
    }

    pub fn variables(&self) -> &EntityVars {
        &self.vars
    }

    /// Live particles spawned by this emitter
    pub fn particle_count(&self) -> u32 {
        self.particle_count
    }

    pub fn max_particles(&self) -> u32 {
        self.max_particles
    }

    /// Total distance the anchor has moved
    pub fn travelled(&self) -> f32 {
        self.travelled
    }

    pub fn is_expired(&self) -> bool {
        self.state == EmitterState::Expired
    }

    /// Expired and every particle gone
    pub fn is_finished(&self) -> bool {
        self.is_expired() && self.particle_count == 0
    }

    /// Whether the emitter was stopped abruptly. Its particles die with it.
    pub fn is_killed(&self) -> bool {
        self.killed
    }

    pub(crate) fn kill(&mut self) {
        self.state = EmitterState::Expired;
        self.killed = true;
    }

    /// Queue particles for an emitter with a manual rate
    pub(crate) fn request(&mut self, count: u32) {
        self.manual_requests = self.manual_requests.saturating_add(count);
    }

    pub(crate) fn release_particle(&mut self) {
        self.particle_count = self.particle_count.saturating_sub(1);
    }

    /// Run an expression in the emitter's scope, e.g. a pre-effect script
    pub(crate) fn run(&mut self, expression: &Expression, frame: u64, rng: &mut SmallRng) -> f32 {
        let effect = Rc::clone(&self.effect);
        let mut scope = Scope {
            curves: &effect.curves,
            entity: &mut self.vars,
            parent: None,
            frame,
            rng,
        };
        expression.eval(&mut scope)
    }

    /// Advance by `dt`, collecting spawns and fired events into `out`.
    /// Particle counts from the effect are clamped to `particle_cap`.
    pub(crate) fn update(
        &mut self,
        dt: f32,
        frame: u64,
        particle_cap: u32,
        rng: &mut SmallRng,
        out: &mut EmitterOutput,
    ) {
        if self.is_expired() {
            return;
        }
        let Some(next) = self.anchor.sample() else {
            debug!("Emitter of {} lost its locator", self.effect.identifier);
            self.kill();
            return;
        };

        let effect = Rc::clone(&self.effect);
        let mut tick = Tick {
            dt,
            frame,
            particle_cap,
            rng,
            out,
        };
        if self.started {
            let distance = next.position.distance(self.frame.position);
            self.travel(&effect, distance, &mut tick);
        }
        self.frame = next;

        if let SpawnMode::Single { .. } = self.mode {
            self.started = true;
            self.spawn(1, dt, &mut tick);
            self.state = EmitterState::Expired;
            return;
        }

        if !self.started {
            self.started = true;
            if let Some(expression) = &effect.emitter.creation_expression {
                self.eval(&effect, expression, &mut tick);
            }
            self.begin_loop(&effect, 0.0, &mut tick);
        }

        self.vars.set("emitter_age", self.loop_age);
        if self.active_time.is_finite() {
            self.vars.set("emitter_lifetime", self.active_time);
        }
        if let Some(expression) = &effect.emitter.per_update_expression {
            self.eval(&effect, expression, &mut tick);
        }

        if let LifetimeModel::Expression {
            activation,
            expiration,
        } = &effect.emitter.lifetime
        {
            if self.eval(&effect, expiration, &mut tick) != 0.0 {
                self.expire(&effect, &mut tick);
                return;
            }
            self.state = if self.eval(&effect, activation, &mut tick) == 0.0 {
                EmitterState::Sleeping
            } else {
                EmitterState::Active
            };
            if self.state == EmitterState::Active {
                self.emit_manual(&effect, 0.0, &mut tick);
                self.emit_steady(&effect, 0.0, dt, &mut tick);
            }
            self.fire_timeline(&effect, self.loop_age + dt, &mut tick);
            self.loop_age += dt;
            return;
        }

        if self.state == EmitterState::Active {
            self.emit_manual(&effect, 0.0, &mut tick);
        }

        let mut elapsed = 0.0;
        let mut loops = 0;
        while elapsed < dt {
            let remaining = dt - elapsed;
            let phase_end = match self.state {
                EmitterState::Active => self.active_time,
                EmitterState::Sleeping => self.active_time + self.sleep_time,
                EmitterState::Expired => break,
            };
            let step = remaining.min((phase_end - self.loop_age).max(0.0));
            if self.state == EmitterState::Active {
                self.emit_steady(&effect, elapsed, step, &mut tick);
            }
            self.fire_timeline(&effect, self.loop_age + step, &mut tick);
            self.loop_age += step;
            elapsed += step;
            if self.loop_age < phase_end {
                continue;
            }

            let restart = match (&effect.emitter.lifetime, self.state) {
                (LifetimeModel::Once { .. }, _) => {
                    self.expire(&effect, &mut tick);
                    false
                }
                (_, EmitterState::Active) if self.sleep_time > 0.0 => {
                    self.state = EmitterState::Sleeping;
                    false
                }
                _ => true,
            };
            if restart {
                loops += 1;
                if loops > MAX_LOOPS_PER_UPDATE {
                    trace!("{}: loop restart limit reached", effect.identifier);
                    break;
                }
                self.begin_loop(&effect, elapsed, &mut tick);
                if self.active_time + self.sleep_time <= 0.0 {
                    break;
                }
            }
        }
    }

    fn eval(&mut self, effect: &ParticleEffect, expression: &Expression, tick: &mut Tick<'_>) -> f32 {
        let mut scope = Scope {
            curves: &effect.curves,
            entity: &mut self.vars,
            parent: None,
            frame: tick.frame,
            rng: &mut *tick.rng,
        };
        expression.eval(&mut scope)
    }

    fn fire(&mut self, effect: &ParticleEffect, names: &[String], tick: &mut Tick<'_>) {
        let mut scope = Scope {
            curves: &effect.curves,
            entity: &mut self.vars,
            parent: None,
            frame: tick.frame,
            rng: &mut *tick.rng,
        };
        event::fire(&effect.events, names, &mut scope, &mut tick.out.actions);
    }

    fn spawn(&mut self, count: u32, pre_age: f32, tick: &mut Tick<'_>) {
        let pre_age = pre_age.max(0.0);
        tick.out
            .spawns
            .extend(std::iter::repeat_n(pre_age, count as usize));
        self.particle_count = self.particle_count.saturating_add(count);
    }

    fn begin_loop(&mut self, effect: &ParticleEffect, elapsed: f32, tick: &mut Tick<'_>) {
        for i in 1..=4 {
            let value: f32 = tick.rng.random();
            self.vars.set(&format!("emitter_random_{i}"), value);
        }
        self.loop_age = 0.0;
        self.vars.set("emitter_age", 0.0);
        self.state = EmitterState::Active;

        let (active, sleep) = match &effect.emitter.lifetime {
            LifetimeModel::Looping {
                active_time,
                sleep_time,
            } => (
                self.eval(effect, active_time, tick),
                self.eval(effect, sleep_time, tick),
            ),
            LifetimeModel::Once { active_time } => (self.eval(effect, active_time, tick), 0.0),
            LifetimeModel::Expression { .. } => (f32::INFINITY, 0.0),
        };
        self.active_time = active.max(0.0);
        self.sleep_time = sleep.max(0.0);

        match &effect.emitter.rate {
            RateModel::Instant { num_particles } => {
                let count = particle_limit(self.eval(effect, num_particles, tick), tick.particle_cap);
                self.max_particles = count;
                self.spawn(count, tick.dt - elapsed, tick);
            }
            RateModel::Steady {
                spawn_rate,
                max_particles,
            } => {
                let rate = self.eval(effect, spawn_rate, tick);
                self.spawn_interval = if rate > 0.0 { rate.recip() } else { f32::INFINITY };
                self.spawn_timer = 0.0;
                self.max_particles = particle_limit(self.eval(effect, max_particles, tick), tick.particle_cap);
            }
            RateModel::Manual { max_particles } => {
                self.max_particles = particle_limit(self.eval(effect, max_particles, tick), tick.particle_cap);
            }
        }

        if !self.created {
            self.created = true;
            self.fire(effect, &effect.emitter.events.creation, tick);
        }

        self.next_timeline = 0;
        self.fire_timeline(effect, 0.0, tick);
    }

    /// Steady spawns within `[elapsed, elapsed + step)` of the frame
    fn emit_steady(&mut self, effect: &ParticleEffect, elapsed: f32, step: f32, tick: &mut Tick<'_>) {
        if !matches!(effect.emitter.rate, RateModel::Steady { .. }) || !self.spawn_interval.is_finite() {
            return;
        }
        let interval = self.spawn_interval;
        let mut t = 0.0;
        // A slot landing exactly on the end of the step belongs to the next one
        while self.spawn_timer < step - t {
            t += self.spawn_timer;
            if self.particle_count >= self.max_particles {
                // Nothing is released during the step, skip the remaining slots
                let left = (step - t) % interval;
                self.spawn_timer = if left > 0.0 { interval - left } else { 0.0 };
                return;
            }
            self.spawn(1, tick.dt - (elapsed + t), tick);
            self.spawn_timer = interval;
        }
        self.spawn_timer -= step - t;
    }

    fn emit_manual(&mut self, effect: &ParticleEffect, elapsed: f32, tick: &mut Tick<'_>) {
        if !matches!(effect.emitter.rate, RateModel::Manual { .. }) || self.manual_requests == 0 {
            return;
        }
        let free = self.max_particles.saturating_sub(self.particle_count);
        let count = self.manual_requests.min(free);
        self.manual_requests = 0;
        self.spawn(count, tick.dt - elapsed, tick);
    }

    /// Fire timeline entries up to loop age `until`
    fn fire_timeline(&mut self, effect: &ParticleEffect, until: f32, tick: &mut Tick<'_>) {
        let timeline = &effect.emitter.events.timeline;
        while let Some((time, names)) = timeline.get(self.next_timeline)
            && *time <= until
        {
            self.next_timeline += 1;
            self.fire(effect, names, tick);
        }
    }

    fn travel(&mut self, effect: &ParticleEffect, distance: f32, tick: &mut Tick<'_>) {
        if distance <= 0.0 {
            return;
        }
        self.travelled += distance;

        let events = &effect.emitter.events;
        while let Some((threshold, names)) = events.travel_distance.get(self.next_travel)
            && *threshold <= self.travelled
        {
            self.next_travel += 1;
            self.fire(effect, names, tick);
        }

        for (i, (every, names)) in events.looping_travel_distance.iter().enumerate() {
            let Some(progress) = self.looping_travel.get_mut(i) else {
                continue;
            };
            *progress += distance;
            if *progress >= *every {
                *progress %= *every;
                self.fire(effect, names, tick);
            }
        }
    }

    fn expire(&mut self, effect: &ParticleEffect, tick: &mut Tick<'_>) {
        self.state = EmitterState::Expired;
        if !self.expiration_fired {
            self.expiration_fired = true;
            self.fire(effect, &effect.emitter.events.expiration, tick);
        }
    }
}

/// Negative and non-finite counts spawn nothing
fn particle_limit(value: f32, cap: u32) -> u32 {
    if value.is_finite() && value > 0.0 {
        (value as u32).min(cap)
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmetic_model::StaticLocator;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;

    const CAP: u32 = 1000;

    fn emitter(components: &str, events: &str) -> Emitter {
        let json = format!(
            r#"{{
                "particle_effect": {{
                    "description": {{ "identifier": "test:emitter" }},
                    "events": {{ {events} }},
                    "components": {{ {components} }}
                }}
            }}"#
        );
        let effect = ParticleEffect::from_json(&json).unwrap();
        Emitter::new(Rc::new(effect), Anchor::at(Vec3::ZERO), SpawnMode::Continuous, None)
    }

    fn run(emitter: &mut Emitter, rng: &mut SmallRng, frames: &[f32]) -> EmitterOutput {
        let mut total = EmitterOutput::default();
        let mut out = EmitterOutput::default();
        for (frame, dt) in frames.iter().enumerate() {
            out.clear();
            emitter.update(*dt, frame as u64 + 1, CAP, rng, &mut out);
            total.spawns.append(&mut out.spawns);
            total.actions.append(&mut out.actions);
        }
        total
    }

    fn sounds(out: &EmitterOutput) -> Vec<&str> {
        out.actions
            .iter()
            .filter_map(|action| match action {
                EventAction::Sound(name) => Some(name.as_str()),
                EventAction::Spawn(_) => None,
            })
            .collect()
    }

    const SOUND_EVENTS: &str = r#"
        "born": { "sound_effect": { "event_name": "born" } },
        "gone": { "sound_effect": { "event_name": "gone" } },
        "half": { "sound_effect": { "event_name": "half" } }
    "#;

    #[test]
    fn test_instant_burst_per_loop() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut emitter = emitter(
            r#"
            "minecraft:emitter_rate_instant": { "num_particles": 3 },
            "minecraft:emitter_lifetime_looping": { "active_time": 1, "sleep_time": 1 }
            "#,
            "",
        );

        let out = run(&mut emitter, &mut rng, &[0.5]);
        assert_eq!(out.spawns, [0.5, 0.5, 0.5]);
        assert_eq!(emitter.particle_count(), 3);

        let out = run(&mut emitter, &mut rng, &[1.0]);
        assert!(out.spawns.is_empty());
        assert_eq!(emitter.state(), EmitterState::Sleeping);

        // The second loop starts 0.5 s into this frame
        let out = run(&mut emitter, &mut rng, &[1.0]);
        assert_eq!(out.spawns, [0.5, 0.5, 0.5]);
        assert_eq!(emitter.state(), EmitterState::Active);
    }

    #[test]
    fn test_steady_rate_respects_max() {
        let mut rng = SmallRng::seed_from_u64(2);
        let mut emitter = emitter(
            r#"
            "minecraft:emitter_rate_steady": { "spawn_rate": 4, "max_particles": 6 }
            "#,
            "",
        );

        let out = run(&mut emitter, &mut rng, &[1.0]);
        // Born at 0, 0.25, 0.5 and 0.75 s
        assert_eq!(out.spawns, [1.0, 0.75, 0.5, 0.25]);

        let out = run(&mut emitter, &mut rng, &[1.0, 1.0]);
        assert_eq!(out.spawns.len(), 2);
        assert_eq!(emitter.particle_count(), 6);

        // Released slots are refilled without a burst of banked spawns
        emitter.release_particle();
        emitter.release_particle();
        emitter.release_particle();
        let out = run(&mut emitter, &mut rng, &[0.5]);
        assert_eq!(out.spawns.len(), 2);
    }

    #[test]
    fn test_once_lifetime_fires_events_once() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut emitter = emitter(
            r#"
            "minecraft:emitter_rate_manual": {},
            "minecraft:emitter_lifetime_once": { "active_time": 2 },
            "minecraft:emitter_lifetime_events": {
                "creation_event": "born",
                "expiration_event": "gone",
                "timeline": { "0.5": "half", "5.0": "half" }
            }
            "#,
            SOUND_EVENTS,
        );

        let out = run(&mut emitter, &mut rng, &[0.25, 0.25, 1.0, 1.0, 1.0]);
        assert_eq!(sounds(&out), ["born", "half", "gone"]);
        assert!(emitter.is_expired());
        assert!(emitter.is_finished());
    }

    #[test]
    fn test_looping_restarts_timeline() {
        let mut rng = SmallRng::seed_from_u64(4);
        let mut emitter = emitter(
            r#"
            "minecraft:emitter_lifetime_looping": { "active_time": 1 },
            "minecraft:emitter_lifetime_events": {
                "creation_event": "born",
                "timeline": { "0.0": "half" }
            }
            "#,
            SOUND_EVENTS,
        );

        let out = run(&mut emitter, &mut rng, &[0.6, 0.6, 0.6, 0.6]);
        assert_eq!(sounds(&out), ["born", "half", "half", "half"]);
    }

    #[test]
    fn test_loops_reseed_random_variables() {
        let mut rng = SmallRng::seed_from_u64(5);
        let mut emitter = emitter(r#""minecraft:emitter_lifetime_looping": { "active_time": 1 }"#, "");
        run(&mut emitter, &mut rng, &[0.5]);
        let first = emitter.variables().get("emitter_random_1");
        run(&mut emitter, &mut rng, &[1.0]);
        let second = emitter.variables().get("emitter_random_1");
        assert!(first.is_some());
        assert_ne!(first, second);
    }

    #[test]
    fn test_expression_lifetime() {
        let mut rng = SmallRng::seed_from_u64(6);
        let mut emitter = emitter(
            r#"
            "minecraft:emitter_initialization": { "per_update_expression": "v.t = (v.t ?? 0) + 1;" },
            "minecraft:emitter_rate_steady": { "spawn_rate": 2, "max_particles": 100 },
            "minecraft:emitter_lifetime_expression": {
                "activation_expression": "v.t >= 2",
                "expiration_expression": "v.t >= 4"
            }
            "#,
            "",
        );

        assert!(run(&mut emitter, &mut rng, &[1.0]).spawns.is_empty());
        assert_eq!(emitter.state(), EmitterState::Sleeping);
        assert_eq!(run(&mut emitter, &mut rng, &[1.0, 1.0]).spawns.len(), 4);
        run(&mut emitter, &mut rng, &[1.0]);
        assert!(emitter.is_expired());
    }

    #[test]
    fn test_manual_requests_capped() {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut emitter = emitter(r#""minecraft:emitter_rate_manual": { "max_particles": 3 }"#, "");
        run(&mut emitter, &mut rng, &[0.1]);
        emitter.request(5);
        let out = run(&mut emitter, &mut rng, &[0.1]);
        assert_eq!(out.spawns.len(), 3);
        emitter.request(1);
        assert!(run(&mut emitter, &mut rng, &[0.1]).spawns.is_empty());
    }

    #[test]
    fn test_huge_counts_are_clamped() {
        let mut rng = SmallRng::seed_from_u64(9);
        let mut burst = emitter(r#""minecraft:emitter_rate_instant": { "num_particles": 1e12 }"#, "");
        assert_eq!(run(&mut burst, &mut rng, &[0.1]).spawns.len(), CAP as usize);

        let mut manual = emitter(r#""minecraft:emitter_rate_manual": { "max_particles": 1e12 }"#, "");
        run(&mut manual, &mut rng, &[0.1]);
        manual.request(u32::MAX);
        assert_eq!(run(&mut manual, &mut rng, &[0.1]).spawns.len(), CAP as usize);
    }

    #[test]
    fn test_travel_distance_events() {
        let mut rng = SmallRng::seed_from_u64(8);
        let locator: Rc<dyn Locator> = Rc::new(StaticLocator::at(Vec3::ZERO));
        let effect = ParticleEffect::from_json(&format!(
            r#"{{
                "particle_effect": {{
                    "description": {{ "identifier": "test:trail" }},
                    "events": {{ {SOUND_EVENTS} }},
                    "components": {{
                        "minecraft:emitter_lifetime_events": {{
                            "travel_distance_events": {{ "1.5": "half" }},
                            "looping_travel_distance_events": [{{ "distance": 1, "effects": "born" }}]
                        }}
                    }}
                }}
            }}"#
        ))
        .unwrap();
        let mut emitter = Emitter::new(Rc::new(effect), Anchor::locator(&locator), SpawnMode::Continuous, None);
        run(&mut emitter, &mut rng, &[0.1]);

        let mut out = EmitterOutput::default();
        for x in [0.6, 1.2, 1.8] {
            emitter.anchor = Anchor::at(Vec3::new(x, 0.0, 0.0));
            emitter.update(0.1, 2, CAP, &mut rng, &mut out);
        }
        assert_eq!(sounds(&out), ["born", "half"]);
        assert!((emitter.travelled() - 1.8).abs() < 1e-5);
    }

    #[test]
    fn test_invalid_locator_kills_emitter() {
        let mut rng = SmallRng::seed_from_u64(9);
        let locator = Rc::new(StaticLocator::at(Vec3::ONE));
        let shared: Rc<dyn Locator> = locator.clone();
        let effect = ParticleEffect::from_json(
            r#"{ "particle_effect": { "description": { "identifier": "test:bound" } } }"#,
        )
        .unwrap();
        let mut emitter = Emitter::new(Rc::new(effect), Anchor::locator(&shared), SpawnMode::Continuous, None);

        run(&mut emitter, &mut rng, &[0.1]);
        assert_eq!(emitter.frame().position, Vec3::ONE);
        locator.invalidate();
        run(&mut emitter, &mut rng, &[0.1]);
        assert!(emitter.is_killed());
        assert!(emitter.is_expired());
    }
}
