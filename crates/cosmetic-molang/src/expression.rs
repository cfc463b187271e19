//! Parsed expressions as they appear in content files

use crate::ast::Program;
use crate::error::{MolangError, Result};
use crate::parser::parse;
use crate::runtime::{NullRuntime, Runtime, evaluate};
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// A parsed expression together with its source text.
///
/// Content fields that accept Molang also accept plain numbers and booleans,
/// so deserialization is lenient about the JSON type.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    program: Program,
    /// Cached value when the program does not depend on its runtime
    constant: Option<f32>,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self> {
        let program = parse(source)?;
        let constant = match &program {
            Program::Simple(node) if node.is_constant() => {
                Some(evaluate(&program, &mut NullRuntime))
            }
            _ => None,
        };
        Ok(Self {
            source: source.to_string(),
            program,
            constant,
        })
    }

    pub fn constant(value: f32) -> Self {
        Self {
            source: value.to_string(),
            program: Program::Simple(crate::ast::Node::Constant(value)),
            constant: Some(value),
        }
    }

    pub fn zero() -> Self {
        Self::constant(0.0)
    }

    pub fn one() -> Self {
        Self::constant(1.0)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// The value, if known without a runtime
    pub fn as_constant(&self) -> Option<f32> {
        self.constant
    }

    pub fn eval<R: Runtime + ?Sized>(&self, runtime: &mut R) -> f32 {
        match self.constant {
            Some(value) => value,
            None => evaluate(&self.program, runtime),
        }
    }
}

impl Default for Expression {
    fn default() -> Self {
        Self::zero()
    }
}

impl FromStr for Expression {
    type Err = MolangError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl From<f32> for Expression {
    fn from(value: f32) -> Self {
        Self::constant(value)
    }
}

struct ExpressionVisitor;

impl<'de> Visitor<'de> for ExpressionVisitor {
    type Value = Expression;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a number, boolean or Molang string")
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Expression, E> {
        Ok(Expression::constant(v as f32))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Expression, E> {
        Ok(Expression::constant(v as f32))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Expression, E> {
        Ok(Expression::constant(v as f32))
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Expression, E> {
        Ok(Expression::constant(if v { 1.0 } else { 0.0 }))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Expression, E> {
        Expression::parse(v).map_err(|e| E::custom(format!("invalid expression '{v}': {e}")))
    }
}

impl<'de> Deserialize<'de> for Expression {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(ExpressionVisitor)
    }
}

/// Three expressions evaluated together, e.g. a direction or an offset.
///
/// Deserializes from a three element array, or from a single value that is
/// used for every component.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vec3Expression(pub [Expression; 3]);

impl Vec3Expression {
    pub fn constant(value: [f32; 3]) -> Self {
        Self(value.map(Expression::constant))
    }

    pub fn splat(expression: Expression) -> Self {
        Self([expression.clone(), expression.clone(), expression])
    }

    pub fn eval<R: Runtime + ?Sized>(&self, runtime: &mut R) -> [f32; 3] {
        [
            self.0[0].eval(runtime),
            self.0[1].eval(runtime),
            self.0[2].eval(runtime),
        ]
    }

    pub fn as_constant(&self) -> Option<[f32; 3]> {
        Some([
            self.0[0].as_constant()?,
            self.0[1].as_constant()?,
            self.0[2].as_constant()?,
        ])
    }
}

struct Vec3Visitor;

impl<'de> Visitor<'de> for Vec3Visitor {
    type Value = Vec3Expression;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an array of three expressions or a single expression")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error> {
        let mut next = |index: usize| -> std::result::Result<Expression, A::Error> {
            seq.next_element::<Expression>()?
                .ok_or_else(|| de::Error::invalid_length(index, &"three components"))
        };
        let x = next(0)?;
        let y = next(1)?;
        let z = next(2)?;
        Ok(Vec3Expression([x, y, z]))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Self::Value, E> {
        ExpressionVisitor.visit_f64(v).map(Vec3Expression::splat)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Self::Value, E> {
        ExpressionVisitor.visit_i64(v).map(Vec3Expression::splat)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Self::Value, E> {
        ExpressionVisitor.visit_u64(v).map(Vec3Expression::splat)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Self::Value, E> {
        ExpressionVisitor.visit_bool(v).map(Vec3Expression::splat)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Self::Value, E> {
        ExpressionVisitor.visit_str(v).map(Vec3Expression::splat)
    }
}

impl<'de> Deserialize<'de> for Vec3Expression {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(Vec3Visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::SimpleRuntime;

    #[test]
    fn test_constant_folding() {
        let expr = Expression::parse("math.sin(90) * 2").unwrap();
        assert!((expr.as_constant().unwrap() - 2.0).abs() < 1e-5);
        assert_eq!(Expression::parse("v.a").unwrap().as_constant(), None);
        assert_eq!(Expression::parse("math.random(0, 1)").unwrap().as_constant(), None);
    }

    #[test]
    fn test_deserialize_lenient() {
        let exprs: Vec<Expression> = serde_json::from_str(r#"[1, 2.5, true, "v.x + 1"]"#).unwrap();
        assert_eq!(exprs[0].as_constant(), Some(1.0));
        assert_eq!(exprs[1].as_constant(), Some(2.5));
        assert_eq!(exprs[2].as_constant(), Some(1.0));
        assert_eq!(exprs[3].source(), "v.x + 1");

        let mut runtime = SimpleRuntime::default();
        runtime.variables.set("x", 4.0);
        assert_eq!(exprs[3].eval(&mut runtime), 5.0);
    }

    #[test]
    fn test_deserialize_rejects_bad_source() {
        let result: std::result::Result<Expression, _> = serde_json::from_str(r#""1 +""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_vec3_from_array_or_scalar() {
        let v: Vec3Expression = serde_json::from_str("[1, 2, 3]").unwrap();
        assert_eq!(v.as_constant(), Some([1.0, 2.0, 3.0]));
        let s: Vec3Expression = serde_json::from_str("2").unwrap();
        assert_eq!(s.as_constant(), Some([2.0, 2.0, 2.0]));
        assert!(serde_json::from_str::<Vec3Expression>("[1, 2]").is_err());
    }
}
