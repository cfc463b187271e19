//! Named event trees declared by an effect
//!
//! An event can spawn another effect, play a sound, run an expression, run
//! child events in order or pick one child by weight. All of them may appear
//! on the same node; they run in that order.

use cosmetic_molang::{Expression, Runtime};
use log::debug;
use serde::Deserialize;
use std::collections::HashMap;

/// How a spawned effect relates to whatever fired the event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnKind {
    /// A free emitter left where the event fired
    #[default]
    Emitter,
    /// An emitter that follows the firing emitter's anchor
    EmitterBound,
    /// A single particle of the effect
    Particle,
    /// A single particle that inherits the firing entity's velocity
    ParticleWithVelocity,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpawnEffect {
    /// Identifier of the effect to start
    pub effect: String,
    #[serde(rename = "type", default)]
    pub kind: SpawnKind,
    /// Runs on the new emitter before it starts
    #[serde(default)]
    pub pre_effect_expression: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SoundEffect {
    pub event_name: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct EventNode {
    pub particle_effect: Option<SpawnEffect>,
    pub sound_effect: Option<SoundEffect>,
    pub expression: Option<Expression>,
    /// Every child in order
    pub sequence: Vec<EventNode>,
    /// One child picked by weight
    pub randomize: Vec<WeightedEvent>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WeightedEvent {
    #[serde(default = "default_weight")]
    pub weight: f32,
    #[serde(flatten)]
    pub node: EventNode,
}

fn default_weight() -> f32 {
    1.0
}

/// What an event asks the simulation to do once the current pass is over
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum EventAction {
    Spawn(SpawnEffect),
    Sound(String),
}

impl EventNode {
    /// Run the node. Expressions run immediately in `runtime`; spawns and
    /// sounds are returned through `actions`.
    pub(crate) fn run<R: Runtime + ?Sized>(&self, runtime: &mut R, actions: &mut Vec<EventAction>) {
        if let Some(expression) = &self.expression {
            expression.eval(runtime);
        }
        if let Some(spawn) = &self.particle_effect {
            actions.push(EventAction::Spawn(spawn.clone()));
        }
        if let Some(sound) = &self.sound_effect {
            actions.push(EventAction::Sound(sound.event_name.clone()));
        }
        for child in &self.sequence {
            child.run(runtime, actions);
        }
        if let Some(child) = pick_weighted(&self.randomize, runtime.random()) {
            child.run(runtime, actions);
        }
    }

    /// Names of effects this node may spawn
    pub fn spawned_effects(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_effects(&mut names);
        names
    }

    fn collect_effects<'a>(&'a self, names: &mut Vec<&'a str>) {
        if let Some(spawn) = &self.particle_effect {
            names.push(&spawn.effect);
        }
        for child in &self.sequence {
            child.collect_effects(names);
        }
        for weighted in &self.randomize {
            weighted.node.collect_effects(names);
        }
    }
}

/// `roll` is uniform in `[0, 1)`
fn pick_weighted(choices: &[WeightedEvent], roll: f32) -> Option<&EventNode> {
    let total: f32 = choices.iter().map(|c| c.weight.max(0.0)).sum();
    if total <= 0.0 {
        return None;
    }
    let mut remaining = roll * total;
    for choice in choices {
        let weight = choice.weight.max(0.0);
        if remaining < weight {
            return Some(&choice.node);
        }
        remaining -= weight;
    }
    choices.iter().rev().find(|c| c.weight > 0.0).map(|c| &c.node)
}

/// Run every named event in order, skipping names the effect does not define
pub(crate) fn fire<R: Runtime + ?Sized>(
    events: &HashMap<String, EventNode>,
    names: &[String],
    runtime: &mut R,
    actions: &mut Vec<EventAction>,
) {
    for name in names {
        match events.get(name) {
            Some(event) => event.run(runtime, actions),
            None => debug!("Ignoring undefined event '{name}'"),
        }
    }
}
