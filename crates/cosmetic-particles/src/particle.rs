//! Individual particles
//!
//! Particles live in emitter space when the effect asks for a local
//! position, and in world space otherwise. Only world-space particles
//! collide.

use crate::arena::Handle;
use crate::billboard::{BillboardQuad, DirectionSource, facing_rotation};
use crate::collision::{self, Collider, Response};
use crate::config::SimulationConfig;
use crate::effect::event::{self, EventAction};
use crate::effect::{InitialSpeed, LocalSpace, Motion, ParticleEffect};
use crate::emitter::{Emitter, EmitterFrame, EmitterHandle, SpawnMode};
use crate::render::Camera;
use crate::scope::{EntityVars, Scope};
use cosmetic_molang::Runtime;
use glam::{Quat, Vec3, Vec4};
use rand::Rng;
use rand::rngs::SmallRng;
use std::rc::Rc;

pub type ParticleHandle = Handle<Particle>;

/// What a particle reads from the rest of the universe during an update
pub(crate) struct Context<'a> {
    pub frame: u64,
    pub emitter: EmitterFrame,
    pub emitter_vars: &'a EntityVars,
    pub colliders: &'a [&'a dyn Collider],
    pub config: &'a SimulationConfig,
}

/// Forces and overrides evaluated for one step
enum Drive {
    Still,
    Dynamic {
        acceleration: Vec3,
        drag: f32,
        spin_acceleration: f32,
        spin_drag: f32,
        collide: bool,
    },
    Parametric {
        position: Option<Vec3>,
        direction: Option<Vec3>,
        rotation: Option<f32>,
    },
}

#[derive(Debug)]
pub struct Particle {
    effect: Rc<ParticleEffect>,
    emitter: EmitterHandle,
    vars: EntityVars,
    local_space: LocalSpace,
    /// Emitter space for local particles, world space otherwise
    position: Vec3,
    velocity: Vec3,
    /// Degrees around the billboard normal
    rotation: f32,
    rotation_rate: f32,
    age: f32,
    lifetime: f32,
    next_timeline: usize,
    /// Last direction for direction-facing billboards
    direction: Vec3,
    /// Side of the kill plane the particle started on
    kill_side: bool,
    expired: bool,
    expiration_fired: bool,
}

impl Particle {
    /// Create a particle of `emitter`'s effect at its current transform.
    /// Creation events are collected into `actions`.
    pub(crate) fn spawn(
        handle: EmitterHandle,
        emitter: &Emitter,
        frame: u64,
        rng: &mut SmallRng,
        actions: &mut Vec<EventAction>,
    ) -> Self {
        let effect = Rc::clone(emitter.effect());
        let origin = emitter.frame();
        let local_space = effect.emitter.local_space;

        let mut vars = EntityVars::new();
        for i in 1..=4 {
            let value: f32 = rng.random();
            vars.set(&format!("particle_random_{i}"), value);
        }
        vars.set("particle_age", 0.0);

        let mut scope = Scope {
            curves: &effect.curves,
            entity: &mut vars,
            parent: Some(emitter.variables()),
            frame,
            rng,
        };
        let lifetime = effect.particle.max_lifetime.eval(&mut scope);
        scope.set_variable("particle_lifetime", lifetime);

        let emission = effect.emitter.shape.sample(&mut scope);
        let mut velocity = match &effect.particle.initial_speed {
            InitialSpeed::Scalar(speed) => emission.direction * speed.eval(&mut scope),
            InitialSpeed::Vector(velocity) => Vec3::from_array(velocity.eval(&mut scope)),
        };
        let rotation = effect.particle.initial_rotation.eval(&mut scope);
        let rotation_rate = effect.particle.initial_rotation_rate.eval(&mut scope);
        event::fire(&effect.events, &effect.particle.events.creation, &mut scope, actions);

        let mut offset = emission.offset;
        if !local_space.contains(LocalSpace::POSITION | LocalSpace::ROTATION) {
            offset = origin.rotation * offset;
            velocity = origin.rotation * velocity;
        }
        let position = if local_space.contains(LocalSpace::POSITION) {
            offset
        } else {
            if local_space.contains(LocalSpace::VELOCITY) {
                velocity += origin.velocity;
            }
            origin.position + offset
        };
        if let SpawnMode::Single { velocity: Some(extra) } = emitter.mode {
            velocity += extra;
        }

        let mut particle = Self {
            effect,
            emitter: handle,
            vars,
            local_space,
            position,
            velocity,
            rotation,
            rotation_rate,
            age: 0.0,
            lifetime,
            next_timeline: 0,
            direction: Vec3::Y,
            kill_side: false,
            expired: false,
            expiration_fired: false,
        };
        particle.direction = particle
            .world_velocity(&origin)
            .try_normalize()
            .or_else(|| emission.direction.try_normalize())
            .unwrap_or(Vec3::Y);
        if let Some(plane) = particle.effect.particle.kill_plane {
            particle.kill_side = kill_plane_distance(plane, particle.world_position(&origin), &origin) >= 0.0;
        }
        particle
    }

    pub fn emitter(&self) -> EmitterHandle {
        self.emitter
    }

    pub fn effect(&self) -> &Rc<ParticleEffect> {
        &self.effect
    }

    pub fn age(&self) -> f32 {
        self.age
    }

    pub fn lifetime(&self) -> f32 {
        self.lifetime
    }

    /// Raw position, in emitter space for local particles
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    /// Degrees
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn variables(&self) -> &EntityVars {
        &self.vars
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    pub fn has_billboard(&self) -> bool {
        self.effect.particle.billboard.is_some()
    }

    pub fn world_position(&self, emitter: &EmitterFrame) -> Vec3 {
        if !self.local_space.contains(LocalSpace::POSITION) {
            return self.position;
        }
        if self.local_space.contains(LocalSpace::ROTATION) {
            emitter.position + emitter.rotation * self.position
        } else {
            emitter.position + self.position
        }
    }

    pub fn world_velocity(&self, emitter: &EmitterFrame) -> Vec3 {
        if self.local_space.contains(LocalSpace::POSITION | LocalSpace::ROTATION) {
            emitter.rotation * self.velocity
        } else {
            self.velocity
        }
    }

    /// Stop without firing expiration events
    pub(crate) fn kill(&mut self) {
        self.expired = true;
    }

    pub(crate) fn advance(&mut self, dt: f32, ctx: &Context<'_>, rng: &mut SmallRng, actions: &mut Vec<EventAction>) {
        if self.expired {
            return;
        }
        let effect = Rc::clone(&self.effect);
        self.age += dt;
        self.vars.set("particle_age", self.age);

        let expire = {
            let mut scope = Scope {
                curves: &effect.curves,
                entity: &mut self.vars,
                parent: Some(ctx.emitter_vars),
                frame: ctx.frame,
                rng: &mut *rng,
            };
            if let Some(expression) = &effect.particle.per_update_expression {
                expression.eval(&mut scope);
            }

            let timeline = &effect.particle.events.timeline;
            while let Some((time, names)) = timeline.get(self.next_timeline)
                && *time <= self.age
            {
                self.next_timeline += 1;
                event::fire(&effect.events, names, &mut scope, actions);
            }

            effect
                .particle
                .expiration_expression
                .as_ref()
                .is_some_and(|expression| expression.eval(&mut scope) != 0.0)
        };
        if expire || self.age >= self.lifetime {
            self.expire(&effect, ctx, rng, actions);
            return;
        }

        let mut scope = Scope {
            curves: &effect.curves,
            entity: &mut self.vars,
            parent: Some(ctx.emitter_vars),
            frame: ctx.frame,
            rng: &mut *rng,
        };
        let drive = match &effect.particle.motion {
            Motion::Static => Drive::Still,
            Motion::Dynamic(motion) => Drive::Dynamic {
                acceleration: Vec3::from_array(motion.linear_acceleration.eval(&mut scope)),
                drag: motion.linear_drag.eval(&mut scope),
                spin_acceleration: motion.rotation_acceleration.eval(&mut scope),
                spin_drag: motion.rotation_drag.eval(&mut scope),
                collide: effect
                    .particle
                    .collision
                    .as_ref()
                    .is_some_and(|collision| collision.enabled.eval(&mut scope) != 0.0),
            },
            Motion::Parametric(motion) => Drive::Parametric {
                position: motion
                    .relative_position
                    .as_ref()
                    .map(|p| Vec3::from_array(p.eval(&mut scope))),
                direction: motion.direction.as_ref().map(|d| Vec3::from_array(d.eval(&mut scope))),
                rotation: motion.rotation.as_ref().map(|r| r.eval(&mut scope)),
            },
        };

        match drive {
            Drive::Still => {}
            Drive::Parametric {
                position,
                direction,
                rotation,
            } => {
                if let Some(offset) = position {
                    self.position = if self.local_space.contains(LocalSpace::POSITION) {
                        offset
                    } else {
                        ctx.emitter.position + offset
                    };
                }
                if let Some(direction) = direction {
                    self.velocity = direction;
                }
                if let Some(rotation) = rotation {
                    self.rotation = rotation;
                }
            }
            Drive::Dynamic {
                acceleration,
                drag,
                spin_acceleration,
                spin_drag,
                collide,
            } => {
                let world_space = !self.local_space.contains(LocalSpace::POSITION);
                if collide && world_space && !ctx.colliders.is_empty() {
                    if self.collide(&effect, acceleration, drag, dt, ctx, rng, actions) {
                        return;
                    }
                } else {
                    let velocity = self.velocity + (acceleration - self.velocity * drag) * dt;
                    self.position += (self.velocity + velocity) * 0.5 * dt;
                    self.velocity = velocity;
                }

                let rate = self.rotation_rate + (spin_acceleration - self.rotation_rate * spin_drag) * dt;
                self.rotation += (self.rotation_rate + rate) * 0.5 * dt;
                self.rotation_rate = rate;
            }
        }

        if let Some(plane) = effect.particle.kill_plane {
            let distance = kill_plane_distance(plane, self.world_position(&ctx.emitter), &ctx.emitter);
            if distance != 0.0 && (distance > 0.0) != self.kill_side {
                self.expire(&effect, ctx, rng, actions);
            }
        }
    }

    /// Move through the colliders. Returns true if the particle expired.
    #[allow(clippy::too_many_arguments)]
    fn collide(
        &mut self,
        effect: &ParticleEffect,
        acceleration: Vec3,
        drag: f32,
        dt: f32,
        ctx: &Context<'_>,
        rng: &mut SmallRng,
        actions: &mut Vec<EventAction>,
    ) -> bool {
        let Some(params) = &effect.particle.collision else {
            return false;
        };
        let response = Response {
            radius: params.radius.unwrap_or(ctx.config.collision_radius),
            restitution: params.restitution,
            drag: params.drag,
            sliding_friction: ctx.config.sliding_friction,
            max_bounces: ctx.config.max_bounces,
            expire_on_contact: params.expire_on_contact,
        };
        let step = collision::integrate(
            self.position,
            self.velocity,
            acceleration,
            drag,
            dt,
            ctx.colliders,
            &response,
        );
        self.position = step.position;
        self.velocity = step.velocity;

        for impact in &step.impacts {
            let names: Vec<String> = params
                .events
                .iter()
                .filter(|event| event.min_speed <= *impact)
                .map(|event| event.event.clone())
                .collect();
            self.fire(effect, &names, ctx, rng, actions);
        }
        if step.expired {
            self.expire(effect, ctx, rng, actions);
        }
        step.expired
    }

    fn fire(
        &mut self,
        effect: &ParticleEffect,
        names: &[String],
        ctx: &Context<'_>,
        rng: &mut SmallRng,
        actions: &mut Vec<EventAction>,
    ) {
        if names.is_empty() {
            return;
        }
        let mut scope = Scope {
            curves: &effect.curves,
            entity: &mut self.vars,
            parent: Some(ctx.emitter_vars),
            frame: ctx.frame,
            rng,
        };
        event::fire(&effect.events, names, &mut scope, actions);
    }

    fn expire(&mut self, effect: &ParticleEffect, ctx: &Context<'_>, rng: &mut SmallRng, actions: &mut Vec<EventAction>) {
        self.expired = true;
        if !self.expiration_fired {
            self.expiration_fired = true;
            self.fire(effect, &effect.particle.events.expiration, ctx, rng, actions);
        }
    }

    /// Resolve the particle's quad for this frame.
    ///
    /// # Panics
    ///
    /// Panics if the effect has no billboard component. Check
    /// [`Particle::has_billboard`] first.
    #[allow(clippy::panic)]
    pub(crate) fn prepare_billboard(
        &mut self,
        emitter: &EmitterFrame,
        emitter_vars: &EntityVars,
        frame: u64,
        rng: &mut SmallRng,
        camera: &Camera,
    ) -> BillboardQuad {
        let effect = Rc::clone(&self.effect);
        let Some(billboard) = effect.particle.billboard.as_ref() else {
            panic!("particle effect {} has no billboard component", effect.identifier);
        };
        let position = self.world_position(emitter);
        let velocity = self.world_velocity(emitter);

        let mut scope = Scope {
            curves: &effect.curves,
            entity: &mut self.vars,
            parent: Some(emitter_vars),
            frame,
            rng,
        };
        if let Some(expression) = &effect.particle.per_render_expression {
            expression.eval(&mut scope);
        }
        let size = billboard.size(&mut scope);
        let uv = billboard.uv(&mut scope, self.age, self.lifetime);
        let color = effect
            .particle
            .tint
            .as_ref()
            .map_or(Vec4::ONE, |tint| tint.evaluate(&mut scope));

        if billboard.facing.uses_direction() {
            match &billboard.direction {
                DirectionSource::Velocity { min_speed } => {
                    // Hold the last direction while nearly at rest
                    if velocity.length() > *min_speed {
                        self.direction = velocity.normalize();
                    }
                }
                DirectionSource::Custom(direction) => {
                    let custom = Vec3::from_array(direction.eval(&mut scope));
                    self.direction = custom.normalize_or(self.direction);
                }
            }
        }

        let facing = facing_rotation(billboard.facing, position, self.direction, emitter.rotation, camera);
        BillboardQuad {
            position,
            rotation: facing * Quat::from_rotation_z(self.rotation.to_radians()),
            size,
            uv,
            color,
            lit: effect.particle.lit,
        }
    }
}

/// Signed distance of `point` to a kill plane given relative to the emitter
fn kill_plane_distance(plane: Vec4, point: Vec3, emitter: &EmitterFrame) -> f32 {
    plane.truncate().dot(point - emitter.position) + plane.w
}
