//! Time sources driving a universe
//!
//! Every registered clock gets its own universe. Each frame the host's delta
//! is handed to the clock, which decides how far its universe advances.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

pub trait Clock: fmt::Debug {
    /// Seconds of simulation to run for a frame that took `dt` seconds
    fn advance(&mut self, dt: f32) -> f32;
}

/// Wall-clock time, one to one
#[derive(Debug, Clone, Copy, Default)]
pub struct RealTime;

impl Clock for RealTime {
    fn advance(&mut self, dt: f32) -> f32 {
        dt.max(0.0)
    }
}

/// Wall-clock time multiplied by a factor, e.g. for slow motion
#[derive(Debug, Clone, Copy)]
pub struct Scaled {
    /// Factor applied to every step, `0.5` runs at half speed
    pub scale: f32,
}

impl Scaled {
    pub fn new(scale: f32) -> Self {
        Self { scale }
    }
}

impl Clock for Scaled {
    fn advance(&mut self, dt: f32) -> f32 {
        (dt * self.scale).max(0.0)
    }
}

/// Follows an externally driven timestamp, e.g. a game tick counter.
///
/// The host writes the current time into the shared cell; the clock steps
/// toward it by at most `max_step` per frame so a stall does not produce one
/// enormous step. Time never runs backwards.
#[derive(Debug, Clone)]
pub struct CatchUp {
    source: Rc<Cell<f32>>,
    now: f32,
    max_step: f32,
}

impl CatchUp {
    pub fn new(source: Rc<Cell<f32>>, max_step: f32) -> Self {
        let now = source.get();
        Self {
            source,
            now,
            max_step,
        }
    }

    /// Time this clock has reached
    pub fn now(&self) -> f32 {
        self.now
    }
}

impl Clock for CatchUp {
    fn advance(&mut self, _dt: f32) -> f32 {
        let step = (self.source.get() - self.now).clamp(0.0, self.max_step);
        self.now += step;
        step
    }
}
