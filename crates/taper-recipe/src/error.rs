//! Error types for simulation adapters and the recipe itself

use thiserror::Error;

/// Failure reported by a simulation adapter.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// The solver could not handle this candidate (bad geometry, mesh failure, ...)
    #[error("{name} failed to simulate: {reason}")]
    Candidate { name: String, reason: String },

    /// The solver returned no samples for the requested length range
    #[error("{name} returned an empty length sweep")]
    EmptySweep { name: String },

    /// The solver backend cannot be reached at all
    #[error("simulator unavailable: {0}")]
    SimulatorUnavailable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SimulationError {
    /// Whether the sweep may skip the offending candidate and carry on.
    ///
    /// Only an unavailable backend aborts the sweep.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SimulationError::SimulatorUnavailable(_))
    }
}

#[derive(Debug, Error)]
pub enum RecipeError {
    #[error("invalid design intent: {0}")]
    InvalidIntent(String),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error("invalid job configuration: {0}")]
    InvalidConfig(String),

    #[error("no viable candidate: every taper in the sweep failed to simulate")]
    NoViableCandidate,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Template(#[from] minijinja::Error),
}

pub type Result<T, E = RecipeError> = std::result::Result<T, E>;
