//! # Simulation Errors
//!
//! Errors from the engine's lifecycle calls and configuration loading.
//! `Engine::step` has no error path: bad input degrades, it never fails.

use thiserror::Error;

/// Errors that can occur outside the tick.
#[derive(Debug, Error)]
pub enum SimError {
    /// A player cannot join with a zero stake.
    #[error("spawn mass must be positive")]
    ZeroSpawnMass,

    /// No player is registered under this session.
    #[error("unknown session: {0}")]
    UnknownSession(String),

    /// The target session of a rekey is already taken.
    #[error("session already in use: {0}")]
    SessionInUse(String),

    /// A configuration value is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The configuration file could not be parsed.
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The configuration file could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for simulation lifecycle operations.
pub type SimResult<T> = Result<T, SimError>;
