//! Keyframe channels and their interpolation

use cosmetic_molang::{Runtime, Vec3Expression};
use glam::Vec3;
use serde::Deserialize;

/// How values between a keyframe and the next are computed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LerpMode {
    #[default]
    Linear,
    #[serde(rename = "catmullrom")]
    CatmullRom,
    Step,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Keyframe {
    /// Seconds from the start of the animation
    pub time: f32,
    /// Value approaching the keyframe
    pub pre: Vec3Expression,
    /// Value leaving the keyframe
    pub post: Vec3Expression,
    /// Interpolation towards the next keyframe
    pub lerp_mode: LerpMode,
}

/// An animated bone property
#[derive(Debug, Clone, PartialEq)]
pub enum Channel {
    Constant(Vec3Expression),
    /// Sorted by time, never empty
    Keyframes(Vec<Keyframe>),
}

/// Index of the last keyframe at or before `time`.
///
/// Returns `None` when `time` is before the first keyframe or there are no
/// keyframes at all.
pub fn find_keyframe_index(keyframes: &[Keyframe], time: f32) -> Option<usize> {
    let first = keyframes.first()?;
    if time < first.time {
        return None;
    }

    let last_index = keyframes.len() - 1;
    if time >= keyframes[last_index].time {
        return Some(last_index);
    }

    let mut low = 0;
    let mut high = last_index;
    while low < high {
        let mid = (low + high).div_ceil(2);
        if keyframes[mid].time <= time {
            low = mid;
        } else {
            high = mid - 1;
        }
    }

    Some(low)
}

/// Uniform Catmull-Rom segment between `p1` and `p2`
pub fn catmull_rom(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, t: f32) -> Vec3 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * p1)
        + (p2 - p0) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (3.0 * p1 - p0 - 3.0 * p2 + p3) * t3)
}

fn eval<R: Runtime + ?Sized>(value: &Vec3Expression, runtime: &mut R) -> Vec3 {
    Vec3::from(value.eval(runtime))
}

impl Channel {
    /// Value of the channel at `time`, in content units
    pub fn sample<R: Runtime + ?Sized>(&self, time: f32, runtime: &mut R) -> Vec3 {
        let keyframes = match self {
            Channel::Constant(value) => return eval(value, runtime),
            Channel::Keyframes(keyframes) => keyframes,
        };

        let Some(index) = find_keyframe_index(keyframes, time) else {
            return keyframes
                .first()
                .map_or(Vec3::ZERO, |first| eval(&first.pre, runtime));
        };

        let current = &keyframes[index];
        let Some(next) = keyframes.get(index + 1) else {
            return eval(&current.post, runtime);
        };

        let span = next.time - current.time;
        let alpha = if span > 0.0 {
            ((time - current.time) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let catmull = current.lerp_mode == LerpMode::CatmullRom
            || next.lerp_mode == LerpMode::CatmullRom;
        match current.lerp_mode {
            LerpMode::Step => eval(&current.post, runtime),
            _ if catmull => {
                let before = index.checked_sub(1).map_or(&current.post, |i| &keyframes[i].post);
                let after = keyframes.get(index + 2).map_or(&next.pre, |k| &k.pre);
                let p0 = eval(before, runtime);
                let p1 = eval(&current.post, runtime);
                let p2 = eval(&next.pre, runtime);
                let p3 = eval(after, runtime);
                catmull_rom(p0, p1, p2, p3, alpha)
            }
            _ => {
                let from = eval(&current.post, runtime);
                let to = eval(&next.pre, runtime);
                from.lerp(to, alpha)
            }
        }
    }

    /// Time of the last keyframe, zero for constant channels
    pub fn end_time(&self) -> f32 {
        match self {
            Channel::Constant(_) => 0.0,
            Channel::Keyframes(keyframes) => keyframes.last().map_or(0.0, |k| k.time),
        }
    }
}
