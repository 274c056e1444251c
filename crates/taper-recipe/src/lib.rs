//! taper-recipe: Sweep routing taper geometries through an EME solver and pick the best one
//!
//! This crate provides:
//! - Design intent, simulation and convergence settings as immutable value objects
//! - A geometry sweep over the taper width profiles
//! - Length-threshold search over EME length sweeps (s11/s21 vs. length)
//! - The shortest-vs-least-reflective selection rule
//! - A stable fingerprint of the recipe configuration for staleness checks
//!
//! The field solver itself is not part of this crate. It is reached through the
//! [`SimulatorFactory`] / [`LengthSweepSimulation`] traits; [`RecordedSimulator`]
//! replays length sweeps that were exported from a previous solver run.

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod geometry;
pub mod intent;
pub mod recipe;
pub mod report;
pub mod select;
pub mod settings;
pub mod simulator;
pub mod stack;
pub mod store;
pub mod sweep;

pub use error::{RecipeError, SimulationError};
pub use fingerprint::{Fingerprint, RecipeBase};
pub use geometry::{Candidate, CrossSection, WidthType};
pub use intent::DesignIntent;
pub use recipe::{CandidateOutcome, SweepOutcome, TaperDesign, TaperDesignRecipe};
pub use select::{CandidateScore, Selection, SelectionReason};
pub use settings::{ConvergenceSettings, SimulationSettings};
pub use simulator::{LengthSweepSimulation, RecordedSimulator, SimulationRequest, SimulatorFactory};
pub use stack::{LayerLevel, LayerStack, LayerType, MaterialMap};
pub use store::{ArtifactStore, RecipeArtifact};
pub use sweep::{LengthSearch, LengthSweepResult, OptimalPoint, SweepSample};

/// Length units used across the recipe.
///
/// Solver tables are in meters, geometry and intent lengths in µm, and the
/// routing loss target is quoted per cm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LengthUnit {
    Centimeter,
    Micrometer,
}

impl LengthUnit {
    /// Convert from this unit to meters
    pub fn to_meters(&self, value: f64) -> f64 {
        match self {
            LengthUnit::Centimeter => value * 1e-2,
            LengthUnit::Micrometer => value * 1e-6,
        }
    }

    /// Convert from meters to this unit
    pub fn from_meters(&self, value: f64) -> f64 {
        match self {
            LengthUnit::Centimeter => value * 1e2,
            LengthUnit::Micrometer => value * 1e6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_conversion() {
        assert!((LengthUnit::Centimeter.to_meters(3.0) - 0.03).abs() < 1e-15);
        assert!((LengthUnit::Micrometer.to_meters(200.0) - 2e-4).abs() < 1e-15);
        assert!((LengthUnit::Micrometer.from_meters(2e-4) - 200.0).abs() < 1e-9);
    }
}
