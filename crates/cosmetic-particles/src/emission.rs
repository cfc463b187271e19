//! Where new particles appear and which way they head
//!
//! Every shape is evaluated in the new particle's expression scope, so its
//! offsets and sizes may use `v.particle_random_*`. Offsets are emitter-local.

use cosmetic_molang::{Expression, Runtime, Vec3Expression};
use glam::Vec3;
use serde::Deserialize;
use serde::de::{self, Deserializer};
use std::f32::consts::TAU;

/// Initial direction of an emitted particle
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Direction {
    /// Away from the shape's centre
    #[default]
    Outwards,
    /// Toward the shape's centre
    Inwards,
    Custom(Vec3Expression),
}

impl<'de> Deserialize<'de> for Direction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Def {
            Named(String),
            Custom(Vec3Expression),
        }

        match Def::deserialize(deserializer)? {
            Def::Named(name) => match name.as_str() {
                "outwards" => Ok(Direction::Outwards),
                "inwards" => Ok(Direction::Inwards),
                // A single Molang string applied to all three axes
                other => Expression::parse(other)
                    .map(|e| Direction::Custom(Vec3Expression::splat(e)))
                    .map_err(|e| de::Error::custom(format!("invalid direction '{other}': {e}"))),
            },
            Def::Custom(expr) => Ok(Direction::Custom(expr)),
        }
    }
}

/// Normal of a disc, either a named axis or an expression triple
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneNormal(pub Vec3Expression);

impl Default for PlaneNormal {
    fn default() -> Self {
        PlaneNormal(Vec3Expression::constant([0.0, 1.0, 0.0]))
    }
}

impl<'de> Deserialize<'de> for PlaneNormal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Def {
            Axis(String),
            Vector(Vec3Expression),
        }

        let normal = match Def::deserialize(deserializer)? {
            Def::Axis(axis) => match axis.as_str() {
                "x" => [1.0, 0.0, 0.0],
                "y" => [0.0, 1.0, 0.0],
                "z" => [0.0, 0.0, 1.0],
                other => return Err(de::Error::custom(format!("unknown plane axis '{other}'"))),
            },
            Def::Vector(expr) => return Ok(PlaneNormal(expr)),
        };
        Ok(PlaneNormal(Vec3Expression::constant(normal)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Point {
        offset: Vec3Expression,
        direction: Vec3Expression,
    },
    Sphere {
        offset: Vec3Expression,
        radius: Expression,
        surface_only: bool,
        direction: Direction,
    },
    Box {
        offset: Vec3Expression,
        half_dimensions: Vec3Expression,
        surface_only: bool,
        direction: Direction,
    },
    Disc {
        offset: Vec3Expression,
        radius: Expression,
        plane_normal: PlaneNormal,
        surface_only: bool,
        direction: Direction,
    },
}

impl Default for Shape {
    fn default() -> Self {
        Shape::Point {
            offset: Vec3Expression::default(),
            direction: Vec3Expression::default(),
        }
    }
}

/// Sampled spawn point in emitter space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Emission {
    /// Spawn point relative to the emitter
    pub offset: Vec3,
    /// Unit length, or zero when the shape has no direction
    pub direction: Vec3,
}

fn vec3<R: Runtime + ?Sized>(expr: &Vec3Expression, runtime: &mut R) -> Vec3 {
    Vec3::from_array(expr.eval(runtime))
}

/// Uniformly distributed unit vector
fn random_unit<R: Runtime + ?Sized>(runtime: &mut R) -> Vec3 {
    let z = runtime.random() * 2.0 - 1.0;
    let phi = runtime.random() * TAU;
    let r = (1.0 - z * z).max(0.0).sqrt();
    Vec3::new(r * phi.cos(), z, r * phi.sin())
}

impl Shape {
    pub fn sample<R: Runtime + ?Sized>(&self, runtime: &mut R) -> Emission {
        match self {
            Shape::Point { offset, direction } => Emission {
                offset: vec3(offset, runtime),
                direction: vec3(direction, runtime).normalize_or_zero(),
            },
            Shape::Sphere {
                offset,
                radius,
                surface_only,
                direction,
            } => {
                let center = vec3(offset, runtime);
                let radius = radius.eval(runtime);
                let unit = random_unit(runtime);
                let distance = if *surface_only {
                    radius
                } else {
                    radius * runtime.random().cbrt()
                };
                let local = unit * distance;
                Emission {
                    offset: center + local,
                    direction: resolve_direction(direction, unit, runtime),
                }
            }
            Shape::Box {
                offset,
                half_dimensions,
                surface_only,
                direction,
            } => {
                let center = vec3(offset, runtime);
                let half = vec3(half_dimensions, runtime);
                let mut local = Vec3::new(
                    (runtime.random() * 2.0 - 1.0) * half.x,
                    (runtime.random() * 2.0 - 1.0) * half.y,
                    (runtime.random() * 2.0 - 1.0) * half.z,
                );
                if *surface_only {
                    // Push one axis out to a face
                    let axis = ((runtime.random() * 3.0) as usize).min(2);
                    let sign = if runtime.random() < 0.5 { -1.0 } else { 1.0 };
                    local[axis] = half[axis] * sign;
                }
                Emission {
                    offset: center + local,
                    direction: resolve_direction(direction, local.normalize_or_zero(), runtime),
                }
            }
            Shape::Disc {
                offset,
                radius,
                plane_normal,
                surface_only,
                direction,
            } => {
                let center = vec3(offset, runtime);
                let radius = radius.eval(runtime);
                let normal = vec3(&plane_normal.0, runtime).normalize_or(Vec3::Y);
                let (u, w) = normal.any_orthonormal_pair();
                let angle = runtime.random() * TAU;
                let distance = if *surface_only {
                    radius
                } else {
                    radius * runtime.random().sqrt()
                };
                let unit = u * angle.cos() + w * angle.sin();
                Emission {
                    offset: center + unit * distance,
                    direction: resolve_direction(direction, unit, runtime),
                }
            }
        }
    }
}

fn resolve_direction<R: Runtime + ?Sized>(direction: &Direction, outwards: Vec3, runtime: &mut R) -> Vec3 {
    match direction {
        Direction::Outwards => outwards,
        Direction::Inwards => -outwards,
        Direction::Custom(expr) => vec3(expr, runtime).normalize_or_zero(),
    }
}
