//! The `math.*` function table
//!
//! Trigonometric functions take and return degrees, matching the content
//! format's conventions.

use crate::error::{MolangError, Result};

/// Built-in `math.*` functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MathFunction {
    Abs,
    Acos,
    Asin,
    Atan,
    Atan2,
    Ceil,
    Clamp,
    Cos,
    DieRoll,
    DieRollInteger,
    Exp,
    Floor,
    HermiteBlend,
    Lerp,
    LerpRotate,
    Ln,
    Max,
    Min,
    MinAngle,
    Mod,
    Pi,
    Pow,
    Random,
    RandomInteger,
    Round,
    Sin,
    Sqrt,
    Trunc,
}

impl MathFunction {
    /// Look up a function by its name after the `math.` prefix
    pub fn from_name(name: &str) -> Result<Self> {
        let function = match name {
            "abs" => Self::Abs,
            "acos" => Self::Acos,
            "asin" => Self::Asin,
            "atan" => Self::Atan,
            "atan2" => Self::Atan2,
            "ceil" => Self::Ceil,
            "clamp" => Self::Clamp,
            "cos" => Self::Cos,
            "die_roll" => Self::DieRoll,
            "die_roll_integer" => Self::DieRollInteger,
            "exp" => Self::Exp,
            "floor" => Self::Floor,
            "hermite_blend" => Self::HermiteBlend,
            "lerp" => Self::Lerp,
            "lerprotate" => Self::LerpRotate,
            "ln" => Self::Ln,
            "max" => Self::Max,
            "min" => Self::Min,
            "min_angle" => Self::MinAngle,
            "mod" => Self::Mod,
            "pi" => Self::Pi,
            "pow" => Self::Pow,
            "random" => Self::Random,
            "random_integer" => Self::RandomInteger,
            "round" => Self::Round,
            "sin" => Self::Sin,
            "sqrt" => Self::Sqrt,
            "trunc" => Self::Trunc,
            _ => return Err(MolangError::UnknownFunction(name.to_string())),
        };
        Ok(function)
    }

    /// Number of arguments the function takes
    pub fn arity(self) -> usize {
        match self {
            Self::Pi => 0,
            Self::Abs
            | Self::Acos
            | Self::Asin
            | Self::Atan
            | Self::Ceil
            | Self::Cos
            | Self::Exp
            | Self::Floor
            | Self::HermiteBlend
            | Self::Ln
            | Self::MinAngle
            | Self::Round
            | Self::Sin
            | Self::Sqrt
            | Self::Trunc => 1,
            Self::Atan2
            | Self::Max
            | Self::Min
            | Self::Mod
            | Self::Pow
            | Self::Random
            | Self::RandomInteger => 2,
            Self::Clamp
            | Self::DieRoll
            | Self::DieRollInteger
            | Self::Lerp
            | Self::LerpRotate => 3,
        }
    }

    /// Whether the result depends on the random source
    pub fn is_random(self) -> bool {
        matches!(
            self,
            Self::Random | Self::RandomInteger | Self::DieRoll | Self::DieRollInteger
        )
    }

    /// Apply the function. `random` yields uniform values in `[0, 1)`.
    pub fn call(self, args: &[f32], random: &mut dyn FnMut() -> f32) -> f32 {
        let arg = |i: usize| args.get(i).copied().unwrap_or(0.0);
        match self {
            Self::Abs => arg(0).abs(),
            Self::Acos => arg(0).acos().to_degrees(),
            Self::Asin => arg(0).asin().to_degrees(),
            Self::Atan => arg(0).atan().to_degrees(),
            Self::Atan2 => arg(0).atan2(arg(1)).to_degrees(),
            Self::Ceil => arg(0).ceil(),
            Self::Clamp => arg(0).max(arg(1)).min(arg(2)),
            Self::Cos => arg(0).to_radians().cos(),
            Self::DieRoll => {
                let (low, high) = (arg(1), arg(2));
                (0..arg(0).max(0.0) as u32)
                    .map(|_| low + random() * (high - low))
                    .sum()
            }
            Self::DieRollInteger => {
                let (low, high) = (arg(1).round(), arg(2).round());
                (0..arg(0).max(0.0) as u32)
                    .map(|_| random_integer(low, high, &mut *random))
                    .sum()
            }
            Self::Exp => arg(0).exp(),
            Self::Floor => arg(0).floor(),
            Self::HermiteBlend => {
                let t = arg(0);
                3.0 * t * t - 2.0 * t * t * t
            }
            Self::Lerp => arg(0) + (arg(1) - arg(0)) * arg(2),
            Self::LerpRotate => {
                let start = wrap_degrees(arg(0));
                let delta = wrap_degrees(wrap_degrees(arg(1)) - start);
                start + delta * arg(2)
            }
            Self::Ln => arg(0).ln(),
            Self::Max => arg(0).max(arg(1)),
            Self::Min => arg(0).min(arg(1)),
            Self::MinAngle => wrap_degrees(arg(0)),
            Self::Mod => arg(0) % arg(1),
            Self::Pi => std::f32::consts::PI,
            Self::Pow => arg(0).powf(arg(1)),
            Self::Random => arg(0) + random() * (arg(1) - arg(0)),
            Self::RandomInteger => random_integer(arg(0).round(), arg(1).round(), &mut *random),
            Self::Round => arg(0).round(),
            Self::Sin => arg(0).to_radians().sin(),
            Self::Sqrt => arg(0).sqrt(),
            Self::Trunc => arg(0).trunc(),
        }
    }
}

/// Inclusive integer in `[low, high]`
fn random_integer(low: f32, high: f32, random: &mut dyn FnMut() -> f32) -> f32 {
    if high <= low {
        return low;
    }
    (low + (random() * (high - low + 1.0)).floor()).min(high)
}

/// Wrap an angle in degrees into `[-180, 180)`
pub fn wrap_degrees(angle: f32) -> f32 {
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped >= 180.0 { wrapped - 360.0 } else { wrapped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn no_random() -> f32 {
        0.5
    }

    #[test_case("sin", &[90.0], 1.0; "sin takes degrees")]
    #[test_case("cos", &[180.0], -1.0; "cos takes degrees")]
    #[test_case("atan2", &[1.0, 0.0], 90.0; "atan2 returns degrees")]
    #[test_case("clamp", &[5.0, 0.0, 2.0], 2.0; "clamp upper")]
    #[test_case("clamp", &[-5.0, 0.0, 2.0], 0.0; "clamp lower")]
    #[test_case("lerp", &[0.0, 10.0, 0.25], 2.5; "lerp")]
    #[test_case("hermite_blend", &[0.5], 0.5; "hermite midpoint")]
    #[test_case("min_angle", &[270.0], -90.0; "min angle wraps")]
    #[test_case("lerprotate", &[170.0, -170.0, 0.5], 180.0; "lerprotate shortest path")]
    #[test_case("mod", &[7.0, 3.0], 1.0; "mod")]
    #[test_case("pow", &[2.0, 3.0], 8.0; "pow")]
    #[test_case("trunc", &[-1.7], -1.0; "trunc")]
    fn test_math_function(name: &str, args: &[f32], expected: f32) {
        let function = MathFunction::from_name(name).unwrap();
        assert_eq!(function.arity(), args.len());
        let value = function.call(args, &mut no_random);
        assert!(
            (value - expected).abs() < 1e-4,
            "math.{name}{args:?} = {value}, expected {expected}"
        );
    }

    #[test]
    fn test_unknown_function() {
        assert_eq!(
            MathFunction::from_name("nope"),
            Err(MolangError::UnknownFunction("nope".into()))
        );
    }

    #[test]
    fn test_random_integer_inclusive() {
        let mut high = || 0.999_999_f32;
        assert_eq!(MathFunction::RandomInteger.call(&[1.0, 3.0], &mut high), 3.0);
        let mut low = || 0.0_f32;
        assert_eq!(MathFunction::RandomInteger.call(&[1.0, 3.0], &mut low), 1.0);
    }

    #[test]
    fn test_die_roll_sums_rolls() {
        let mut half = || 0.5_f32;
        assert_eq!(MathFunction::DieRoll.call(&[4.0, 0.0, 2.0], &mut half), 4.0);
    }

    #[test]
    fn test_wrap_degrees() {
        assert_eq!(wrap_degrees(180.0), -180.0);
        assert_eq!(wrap_degrees(-190.0), 170.0);
        assert_eq!(wrap_degrees(45.0), 45.0);
    }
}
