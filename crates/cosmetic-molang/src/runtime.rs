//! Evaluation of parsed programs against a caller-supplied [`Runtime`]

use crate::ast::{BinaryOp, Namespace, Node, Program, UnaryOp};
use log::warn;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

/// Upper bound on `loop(n, ..)` iterations
pub const MAX_LOOP_ITERATIONS: u32 = 1024;

/// The environment an expression is evaluated in.
///
/// Reads of undefined names evaluate to `0.0`, except on the left of `??`
/// where `None` selects the fallback.
pub trait Runtime {
    /// Read `variable.<name>`
    fn variable(&mut self, name: &str) -> Option<f32>;

    /// Write `variable.<name>`
    fn set_variable(&mut self, name: &str, value: f32);

    /// Call `query.<name>(args..)`
    fn query(&mut self, name: &str, args: &[f32]) -> Option<f32> {
        let _ = (name, args);
        None
    }

    /// Read `context.<name>`
    fn context(&mut self, name: &str) -> Option<f32> {
        let _ = name;
        None
    }

    /// Uniform random value in `[0, 1)`
    fn random(&mut self) -> f32;
}

/// A named set of `variable.*` values owned by one entity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Variables {
    values: HashMap<String, f32>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        self.values.get(name).copied()
    }

    pub fn set(&mut self, name: &str, value: f32) {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = value;
        } else {
            self.values.insert(name.to_string(), value);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<f32> {
        self.values.remove(name)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Standalone runtime backed by a variable map, a query table and a seeded RNG
#[derive(Debug, Clone)]
pub struct SimpleRuntime {
    /// `variable.*` values, readable and writable by expressions
    pub variables: Variables,
    /// `query.*` answers by name, without the namespace
    pub queries: HashMap<String, f32>,
    rng: SmallRng,
}

impl SimpleRuntime {
    pub fn new(seed: u64) -> Self {
        Self {
            variables: Variables::new(),
            queries: HashMap::new(),
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Builder-style helper to preset a query result
    pub fn with_query(mut self, name: &str, value: f32) -> Self {
        self.queries.insert(name.to_string(), value);
        self
    }
}

impl Default for SimpleRuntime {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Runtime for SimpleRuntime {
    fn variable(&mut self, name: &str) -> Option<f32> {
        self.variables.get(name)
    }

    fn set_variable(&mut self, name: &str, value: f32) {
        self.variables.set(name, value);
    }

    fn query(&mut self, name: &str, _args: &[f32]) -> Option<f32> {
        self.queries.get(name).copied()
    }

    fn random(&mut self) -> f32 {
        self.rng.random::<f32>()
    }
}

/// Runtime with no state; used to fold constant expressions
pub(crate) struct NullRuntime;

impl Runtime for NullRuntime {
    fn variable(&mut self, _name: &str) -> Option<f32> {
        None
    }

    fn set_variable(&mut self, _name: &str, _value: f32) {}

    fn random(&mut self) -> f32 {
        0.0
    }
}

/// Non-local control flow unwinding through `?`
enum Signal {
    Return(f32),
    Break,
    Continue,
}

type Flow = std::result::Result<f32, Signal>;

struct Evaluator<'r, R: Runtime + ?Sized> {
    runtime: &'r mut R,
    temps: HashMap<String, f32>,
}

/// Evaluate a program. Temps live for the duration of this call only.
pub fn evaluate<R: Runtime + ?Sized>(program: &Program, runtime: &mut R) -> f32 {
    let mut evaluator = Evaluator {
        runtime,
        temps: HashMap::new(),
    };

    match program {
        Program::Simple(node) => match evaluator.eval(node) {
            Ok(value) | Err(Signal::Return(value)) => value,
            Err(Signal::Break | Signal::Continue) => 0.0,
        },
        Program::Complex(statements) => {
            for statement in statements {
                match evaluator.eval(statement) {
                    Ok(_) => {}
                    Err(Signal::Return(value)) => return value,
                    Err(Signal::Break | Signal::Continue) => break,
                }
            }
            0.0
        }
    }
}

fn truthy(value: f32) -> bool {
    value != 0.0
}

fn flag(value: bool) -> f32 {
    if value { 1.0 } else { 0.0 }
}

impl<R: Runtime + ?Sized> Evaluator<'_, R> {
    fn eval(&mut self, node: &Node) -> Flow {
        match node {
            Node::Constant(value) => Ok(*value),
            Node::Name(..) | Node::Query(..) => Ok(self.lookup(node)?.unwrap_or(0.0)),
            Node::Math(function, args) => {
                let values = self.eval_args(args)?;
                let runtime = &mut *self.runtime;
                Ok(function.call(&values, &mut || runtime.random()))
            }
            Node::Unary(op, inner) => {
                let value = self.eval(inner)?;
                Ok(match op {
                    UnaryOp::Negate => -value,
                    UnaryOp::Not => flag(!truthy(value)),
                })
            }
            Node::Binary(op, lhs, rhs) => self.binary(*op, lhs, rhs),
            Node::Conditional {
                condition,
                then,
                otherwise,
            } => {
                if truthy(self.eval(condition)?) {
                    self.eval(then)
                } else if let Some(otherwise) = otherwise {
                    self.eval(otherwise)
                } else {
                    Ok(0.0)
                }
            }
            Node::Coalesce(lhs, rhs) => match self.lookup(lhs)? {
                Some(value) => Ok(value),
                None => self.eval(rhs),
            },
            Node::Assign(namespace, name, value) => {
                let value = self.eval(value)?;
                match namespace {
                    Namespace::Temp => {
                        self.temps.insert(name.clone(), value);
                    }
                    _ => self.runtime.set_variable(name, value),
                }
                Ok(value)
            }
            Node::Block(statements) => {
                for statement in statements {
                    self.eval(statement)?;
                }
                Ok(0.0)
            }
            Node::Loop(count, body) => {
                let mut count = self.eval(count)?.max(0.0) as u32;
                if count > MAX_LOOP_ITERATIONS {
                    warn!("Clamping loop count {count} to {MAX_LOOP_ITERATIONS}");
                    count = MAX_LOOP_ITERATIONS;
                }
                for _ in 0..count {
                    match self.eval(body) {
                        Ok(_) | Err(Signal::Continue) => {}
                        Err(Signal::Break) => break,
                        Err(signal) => return Err(signal),
                    }
                }
                Ok(0.0)
            }
            Node::Return(value) => Err(Signal::Return(self.eval(value)?)),
            Node::Break => Err(Signal::Break),
            Node::Continue => Err(Signal::Continue),
        }
    }

    /// Resolve a node that may be undefined; other nodes always produce a value
    fn lookup(&mut self, node: &Node) -> std::result::Result<Option<f32>, Signal> {
        match node {
            Node::Name(Namespace::Variable, name) => Ok(self.runtime.variable(name)),
            Node::Name(Namespace::Temp, name) => Ok(self.temps.get(name).copied()),
            Node::Name(Namespace::Context, name) => Ok(self.runtime.context(name)),
            Node::Query(name, args) => {
                let values = self.eval_args(args)?;
                Ok(self.runtime.query(name, &values))
            }
            other => self.eval(other).map(Some),
        }
    }

    fn eval_args(&mut self, args: &[Node]) -> std::result::Result<Vec<f32>, Signal> {
        args.iter().map(|arg| self.eval(arg)).collect()
    }

    fn binary(&mut self, op: BinaryOp, lhs: &Node, rhs: &Node) -> Flow {
        match op {
            BinaryOp::And => {
                if !truthy(self.eval(lhs)?) {
                    return Ok(0.0);
                }
                return Ok(flag(truthy(self.eval(rhs)?)));
            }
            BinaryOp::Or => {
                if truthy(self.eval(lhs)?) {
                    return Ok(1.0);
                }
                return Ok(flag(truthy(self.eval(rhs)?)));
            }
            _ => {}
        }

        let a = self.eval(lhs)?;
        let b = self.eval(rhs)?;
        Ok(match op {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            // Division by zero yields zero instead of propagating inf/NaN
            BinaryOp::Div => {
                if b == 0.0 {
                    0.0
                } else {
                    a / b
                }
            }
            BinaryOp::Lt => flag(a < b),
            BinaryOp::LtEq => flag(a <= b),
            BinaryOp::Gt => flag(a > b),
            BinaryOp::GtEq => flag(a >= b),
            BinaryOp::Eq => flag((a - b).abs() < f32::EPSILON),
            BinaryOp::NotEq => flag((a - b).abs() >= f32::EPSILON),
            BinaryOp::And | BinaryOp::Or => 0.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn run(source: &str, runtime: &mut SimpleRuntime) -> f32 {
        evaluate(&parse(source).unwrap(), runtime)
    }

    #[test]
    fn test_variables_persist_temps_do_not() {
        let mut runtime = SimpleRuntime::default();
        run("v.a = 3; t.b = 4;", &mut runtime);
        assert_eq!(runtime.variables.get("a"), Some(3.0));
        assert_eq!(run("return t.b ?? 7;", &mut runtime), 7.0);
    }

    #[test]
    fn test_short_circuit() {
        let mut runtime = SimpleRuntime::default();
        run("0 && (v.touched = 1)", &mut runtime);
        assert_eq!(runtime.variables.get("touched"), None);
        run("1 || (v.touched = 1)", &mut runtime);
        assert_eq!(runtime.variables.get("touched"), None);
    }

    #[test]
    fn test_loop_break_continue() {
        let mut runtime = SimpleRuntime::default();
        let value = run(
            "t.i = 0; t.sum = 0; loop(10, { t.i = t.i + 1; t.i == 3 ? continue; t.i > 5 ? break; t.sum = t.sum + t.i; }); return t.sum;",
            &mut runtime,
        );
        // 1 + 2 + 4 + 5
        assert_eq!(value, 12.0);
    }

    #[test]
    fn test_division_by_zero_is_zero() {
        let mut runtime = SimpleRuntime::default();
        assert_eq!(run("1 / 0", &mut runtime), 0.0);
    }

    #[test]
    fn test_null_runtime_reads_zero() {
        let program = parse("v.missing + 2").unwrap();
        assert_eq!(evaluate(&program, &mut NullRuntime), 2.0);
    }
}
