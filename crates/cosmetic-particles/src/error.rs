use thiserror::Error;

/// Error types for particle effect loading and spawning
#[derive(Error, Debug)]
pub enum ParticleError {
    /// The effect file is not valid JSON, does not match the schema or
    /// contains an expression that fails to parse
    #[error("Malformed particle effect: {0}")]
    Json(#[from] serde_json::Error),

    /// A Molang script handed to the simulator failed to parse
    #[error("Invalid Molang: {0}")]
    Molang(#[from] cosmetic_molang::MolangError),

    /// A spawn request named an effect that was never loaded
    #[error("Unknown particle effect '{0}'")]
    UnknownEffect(String),

    /// A spawn request named a clock that was never registered
    #[error("Unknown clock {0}")]
    UnknownClock(usize),
}

/// Result type for particle operations
pub type Result<T> = std::result::Result<T, ParticleError>;
