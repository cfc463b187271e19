use thiserror::Error;

/// Error types for Molang lexing and parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MolangError {
    /// A character that cannot start any token
    #[error("Unexpected character '{found}' at offset {offset}")]
    UnexpectedCharacter { offset: usize, found: char },

    /// A numeric literal that does not parse as a float
    #[error("Invalid number literal '{literal}' at offset {offset}")]
    InvalidNumber { offset: usize, literal: String },

    /// A token that does not fit the grammar at this point
    #[error("Unexpected token at offset {offset}: expected {expected}, found {found}")]
    UnexpectedToken {
        offset: usize,
        expected: String,
        found: String,
    },

    /// The input ended in the middle of an expression
    #[error("Unexpected end of expression: expected {expected}")]
    UnexpectedEnd { expected: String },

    /// A `math.*` function that does not exist
    #[error("Unknown math function 'math.{0}'")]
    UnknownFunction(String),

    /// A `math.*` function called with the wrong number of arguments
    #[error("math.{name} expects {expected} argument(s), got {actual}")]
    WrongArgumentCount {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// The left-hand side of `=` is not a writable variable
    #[error("Invalid assignment target at offset {offset}")]
    InvalidAssignment { offset: usize },

    /// A namespace prefix that is not one of variable/temp/query/context/math
    #[error("Unknown namespace '{0}'")]
    UnknownNamespace(String),
}

/// Result type using MolangError
pub type Result<T> = std::result::Result<T, MolangError>;
