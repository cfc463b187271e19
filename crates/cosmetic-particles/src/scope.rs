//! Variable scopes for emitter and particle expressions
//!
//! A particle reads its own variables first, then its emitter's, then the
//! effect's curves. Curve values are cached per entity and per frame so that
//! a curve with a random input reads the same within one frame.

use crate::curve::Curve;
use cosmetic_molang::{Runtime, Variables};
use rand::Rng;
use rand::rngs::SmallRng;
use std::collections::HashMap;

/// Variables owned by one emitter or particle
#[derive(Debug, Clone, Default)]
pub struct EntityVars {
    /// `variable.*` values of this emitter or particle
    pub variables: Variables,
    /// Curve name to the frame it was evaluated on and its value
    curves: HashMap<String, (u64, f32)>,
}

impl EntityVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        self.variables.get(name)
    }

    pub fn set(&mut self, name: &str, value: f32) {
        self.variables.set(name, value);
    }
}

pub(crate) struct Scope<'a> {
    pub curves: &'a HashMap<String, Curve>,
    pub entity: &'a mut EntityVars,
    pub parent: Option<&'a EntityVars>,
    pub frame: u64,
    pub rng: &'a mut SmallRng,
}

impl Runtime for Scope<'_> {
    fn variable(&mut self, name: &str) -> Option<f32> {
        if let Some(value) = self.entity.variables.get(name) {
            return Some(value);
        }
        if let Some(value) = self.parent.and_then(|parent| parent.variables.get(name)) {
            return Some(value);
        }

        let curves = self.curves;
        let curve = curves.get(name)?;
        if let Some(&(frame, value)) = self.entity.curves.get(name)
            && frame == self.frame
        {
            return Some(value);
        }
        // A curve whose input reads itself sees zero
        self.entity.curves.insert(name.to_string(), (self.frame, 0.0));
        let value = curve.evaluate(self);
        self.entity.curves.insert(name.to_string(), (self.frame, value));
        Some(value)
    }

    fn set_variable(&mut self, name: &str, value: f32) {
        self.entity.variables.set(name, value);
    }

    fn random(&mut self) -> f32 {
        self.rng.random::<f32>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmetic_molang::Expression;
    use rand::SeedableRng;

    fn curves(json: &str) -> HashMap<String, Curve> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_lookup_order() {
        let curves = curves(r#"{ "shade": { "input": 0.5, "nodes": [0, 2] } }"#);
        let mut rng = SmallRng::seed_from_u64(3);
        let mut parent = EntityVars::new();
        parent.set("size", 4.0);
        parent.set("speed", 1.0);
        let mut entity = EntityVars::new();
        entity.set("speed", 7.0);

        let mut scope = Scope {
            curves: &curves,
            entity: &mut entity,
            parent: Some(&parent),
            frame: 1,
            rng: &mut rng,
        };
        let expr = Expression::parse("v.speed * 100 + v.size * 10 + v.shade").unwrap();
        assert_eq!(expr.eval(&mut scope), 741.0);

        // Writes never reach the parent
        Expression::parse("v.size = 1;").unwrap().eval(&mut scope);
        assert_eq!(entity.get("size"), Some(1.0));
        assert_eq!(parent.get("size"), Some(4.0));
    }

    #[test]
    fn test_curve_cached_per_frame() {
        let curves = curves(r#"{ "noise": { "input": "math.random(0, 1)", "nodes": [0, 1] } }"#);
        let mut rng = SmallRng::seed_from_u64(11);
        let mut entity = EntityVars::new();
        let read = Expression::parse("v.noise").unwrap();

        let mut scope = Scope {
            curves: &curves,
            entity: &mut entity,
            parent: None,
            frame: 1,
            rng: &mut rng,
        };
        let first = read.eval(&mut scope);
        assert_eq!(read.eval(&mut scope), first);

        scope.frame = 2;
        let second = read.eval(&mut scope);
        assert_ne!(second, first);
    }

    #[test]
    fn test_self_referencing_curve_terminates() {
        let curves = curves(r#"{ "loop": { "input": "v.loop + 0.5", "nodes": [0, 1] } }"#);
        let mut rng = SmallRng::seed_from_u64(0);
        let mut entity = EntityVars::new();
        let mut scope = Scope {
            curves: &curves,
            entity: &mut entity,
            parent: None,
            frame: 1,
            rng: &mut rng,
        };
        assert_eq!(Expression::parse("v.loop").unwrap().eval(&mut scope), 0.5);
    }
}
