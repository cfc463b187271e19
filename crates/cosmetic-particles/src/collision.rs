//! Particle collision against host-supplied surfaces

use glam::Vec3;

/// How far behind a surface a particle may sit and still collide with it,
/// absorbing rounding after a previous contact
const CONTACT_TOLERANCE: f32 = 1e-4;

/// Impacts slower than this are a particle resting on the surface
const RESTING_SPEED: f32 = 1e-3;

/// Where a moving sphere first touches a surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Fraction of the swept segment travelled before touching, in `[0, 1]`
    pub time: f32,
    /// Surface normal facing the particle
    pub normal: Vec3,
}

/// A surface particles can collide with
pub trait Collider {
    /// First contact of a sphere of `radius` swept from `from` to `to`
    fn sweep(&self, from: Vec3, to: Vec3, radius: f32) -> Option<Contact>;
}

/// One-sided infinite plane: the points `p` with `normal · p = distance`.
/// Particles collide only when coming from the side the normal faces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Unit normal of the colliding side
    pub normal: Vec3,
    /// Offset from the origin along `normal`
    pub distance: f32,
}

impl Plane {
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self {
            normal: normal.normalize_or(Vec3::Y),
            distance,
        }
    }

    /// Horizontal ground at height `y`
    pub fn ground(y: f32) -> Self {
        Self::new(Vec3::Y, y)
    }

    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) - self.distance
    }
}

impl Collider for Plane {
    fn sweep(&self, from: Vec3, to: Vec3, radius: f32) -> Option<Contact> {
        let start = self.signed_distance(from) - radius;
        let end = self.signed_distance(to) - radius;
        if start < -CONTACT_TOLERANCE || end >= 0.0 || end >= start {
            return None;
        }
        Some(Contact {
            time: (start / (start - end)).clamp(0.0, 1.0),
            normal: self.normal,
        })
    }
}

/// Collision behaviour of one particle
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Response {
    /// Particle radius kept between its center and the surface
    pub radius: f32,
    /// Share of the normal speed kept after a bounce
    pub restitution: f32,
    /// Extra drag while sliding
    pub drag: f32,
    /// Speed lost per second while sliding, from the config
    pub sliding_friction: f32,
    /// Contacts resolved per step before the rest of the step is dropped
    pub max_bounces: u32,
    /// Stop at the first contact and expire
    pub expire_on_contact: bool,
}

/// Result of moving a particle through colliders for one step
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Step {
    /// Position at the end of the step
    pub position: Vec3,
    /// Velocity at the end of the step
    pub velocity: Vec3,
    /// Speed into the surface of every impact this step, resting contacts left out
    pub impacts: Vec<f32>,
    /// Set when `expire_on_contact` stopped the particle
    pub expired: bool,
}

/// Advance a particle by `dt` under constant `acceleration` and linear
/// `drag`, bouncing off `colliders`.
///
/// Each iteration moves to the earliest contact, reflects the normal part of
/// the velocity scaled by the restitution and spends the rest of the step on
/// the next iteration. When the bounce would carry the particle back through
/// the same surface within the step it slides along the surface instead.
pub(crate) fn integrate(
    mut position: Vec3,
    mut velocity: Vec3,
    acceleration: Vec3,
    drag: f32,
    dt: f32,
    colliders: &[&dyn Collider],
    response: &Response,
) -> Step {
    let mut impacts = Vec::new();
    let mut remaining = dt;
    let mut sliding: Option<Vec3> = None;

    for _ in 0..=response.max_bounces {
        if remaining <= 0.0 {
            break;
        }

        let (accel, damping) = match sliding {
            Some(normal) => (
                acceleration - normal * acceleration.dot(normal),
                drag + response.drag + response.sliding_friction,
            ),
            None => (acceleration, drag),
        };
        let next_velocity = velocity + (accel - velocity * damping) * remaining;
        let displacement = (velocity + next_velocity) * 0.5 * remaining;
        let target = position + displacement;

        let contact = colliders
            .iter()
            .filter_map(|collider| collider.sweep(position, target, response.radius))
            .min_by(|a, b| a.time.total_cmp(&b.time));

        let Some(contact) = contact else {
            position = target;
            velocity = next_velocity;
            remaining = 0.0;
            break;
        };

        position += displacement * contact.time;
        let impact_velocity = velocity + (next_velocity - velocity) * contact.time;
        remaining -= remaining * contact.time;

        // A particle resting on a surface touches it again every step
        let into_surface = -impact_velocity.dot(contact.normal);
        if into_surface > RESTING_SPEED {
            impacts.push(into_surface);
        }
        if response.expire_on_contact {
            return Step {
                position,
                velocity: impact_velocity,
                impacts,
                expired: true,
            };
        }

        let normal_part = contact.normal * impact_velocity.dot(contact.normal);
        let tangent = impact_velocity - normal_part;
        velocity = tangent - normal_part * response.restitution;

        // Would the bounce fall back through the surface before the step ends?
        let away = velocity.dot(contact.normal) * remaining
            + 0.5 * acceleration.dot(contact.normal) * remaining * remaining;
        if away <= 0.0 {
            velocity = tangent;
            sliding = Some(contact.normal);
        }
    }

    if remaining > 0.0 {
        log::trace!("Dropping {remaining}s of motion after {} bounces", impacts.len());
    }

    Step {
        position,
        velocity,
        impacts,
        expired: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(restitution: f32) -> Response {
        Response {
            radius: 0.0,
            restitution,
            drag: 0.0,
            sliding_friction: 0.0,
            max_bounces: 3,
            expire_on_contact: false,
        }
    }

    #[test]
    fn test_plane_sweep() {
        let plane = Plane::ground(1.0);
        let contact = plane.sweep(Vec3::new(0.0, 3.0, 0.0), Vec3::new(0.0, -1.0, 0.0), 0.0).unwrap();
        assert_eq!(contact.time, 0.5);
        assert_eq!(contact.normal, Vec3::Y);

        // Radius lifts the contact point
        let contact = plane.sweep(Vec3::new(0.0, 3.0, 0.0), Vec3::new(0.0, -1.0, 0.0), 1.0).unwrap();
        assert_eq!(contact.time, 0.25);

        // Back side and parallel motion pass through
        assert!(plane.sweep(Vec3::new(0.0, -1.0, 0.0), Vec3::new(0.0, 3.0, 0.0), 0.0).is_none());
        assert!(plane.sweep(Vec3::new(0.0, 2.0, 0.0), Vec3::new(5.0, 2.0, 0.0), 0.0).is_none());
    }

    #[test]
    fn test_elastic_bounce() {
        let ground = Plane::ground(0.0);
        let step = integrate(
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(1.0, -4.0, 0.0),
            Vec3::ZERO,
            0.0,
            0.5,
            &[&ground],
            &response(1.0),
        );
        assert_eq!(step.impacts, [4.0]);
        assert!(step.position.abs_diff_eq(Vec3::new(0.5, 1.0, 0.0), 1e-5));
        assert!(step.velocity.abs_diff_eq(Vec3::new(1.0, 4.0, 0.0), 1e-5));
    }

    #[test]
    fn test_resting_particle_slides() {
        let ground = Plane::ground(0.0);
        let mut response = response(0.5);
        response.sliding_friction = 1.0;
        let step = integrate(
            Vec3::ZERO,
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(0.0, -10.0, 0.0),
            0.0,
            0.1,
            &[&ground],
            &response,
        );
        assert!(!step.expired);
        assert!(step.position.y.abs() < 1e-6);
        assert!(step.velocity.y.abs() < 1e-6);
        assert!(step.velocity.x < 2.0 && step.velocity.x > 0.0);
    }

    #[test]
    fn test_resting_contact_is_not_an_impact() {
        let ground = Plane::ground(0.0);
        let mut position = Vec3::new(0.0, 0.5, 0.0);
        let mut velocity = Vec3::new(0.0, -1.0, 0.0);
        let mut impacts = Vec::new();
        for _ in 0..10 {
            let step = integrate(
                position,
                velocity,
                Vec3::new(0.0, -10.0, 0.0),
                0.0,
                0.1,
                &[&ground],
                &response(0.0),
            );
            position = step.position;
            velocity = step.velocity;
            impacts.extend(step.impacts);
        }

        // Only the landing counts
        assert_eq!(impacts.len(), 1);
        assert!(impacts[0] > 0.0);
        assert!(position.y.abs() < 1e-5);
    }

    #[test]
    fn test_expire_on_contact() {
        let ground = Plane::ground(0.0);
        let mut response = response(1.0);
        response.expire_on_contact = true;
        let step = integrate(
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, -4.0, 0.0),
            Vec3::ZERO,
            0.0,
            1.0,
            &[&ground],
            &response,
        );
        assert!(step.expired);
        assert!(step.position.abs_diff_eq(Vec3::ZERO, 1e-6));
    }
}
