//! Molang expression language
//!
//! Expressions are parsed once into a [`Program`] and evaluated any number of
//! times against a [`Runtime`] that supplies variables, queries and randomness.
//!
//! ```
//! use cosmetic_molang::{Expression, SimpleRuntime};
//!
//! let expr = Expression::parse("v.base + math.clamp(q.speed, 0, 2)").unwrap();
//! let mut runtime = SimpleRuntime::new(7).with_query("speed", 5.0);
//! runtime.variables.set("base", 1.0);
//! assert_eq!(expr.eval(&mut runtime), 3.0);
//! ```

pub mod ast;
pub mod error;
pub mod expression;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod runtime;

pub use ast::{Namespace, Node, Program};
pub use error::{MolangError, Result};
pub use expression::{Expression, Vec3Expression};
pub use functions::{MathFunction, wrap_degrees};
pub use parser::parse;
pub use runtime::{Runtime, SimpleRuntime, Variables, evaluate};
