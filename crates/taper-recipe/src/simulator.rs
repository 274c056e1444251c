//! Seam between the recipe and the EME solver
//!
//! A [`SimulatorFactory`] builds one [`LengthSweepSimulation`] per candidate.
//! Building may fail for a single candidate (unsimulable geometry), which the
//! recipe skips, or for the backend as a whole, which aborts the recipe.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::SimulationError;
use crate::geometry::Candidate;
use crate::settings::{ConvergenceSettings, SimulationSettings};
use crate::stack::{LayerStack, MaterialMap};
use crate::sweep::LengthSweepResult;
use crate::LengthUnit;

/// Everything a solver needs to set up one candidate.
#[derive(Debug, Clone, Copy)]
pub struct SimulationRequest<'a> {
    pub candidate: &'a Candidate,
    pub material_map: &'a MaterialMap,
    pub layer_stack: &'a LayerStack,
    pub simulation: &'a SimulationSettings,
    pub convergence: &'a ConvergenceSettings,
    pub dirpath: &'a Path,
}

/// A solver session prepared for one candidate.
pub trait LengthSweepSimulation {
    /// Propagate over `num_pts` taper lengths from `start` to `stop` (µm).
    ///
    /// Samples come back ordered by increasing length, in meters.
    fn length_sweep(
        &mut self,
        start: f64,
        stop: f64,
        num_pts: usize,
    ) -> Result<LengthSweepResult, SimulationError>;
}

pub trait SimulatorFactory {
    fn name(&self) -> &str;

    fn build(
        &self,
        request: &SimulationRequest<'_>,
    ) -> Result<Box<dyn LengthSweepSimulation>, SimulationError>;
}

/// Replays length sweeps exported from earlier solver runs.
///
/// Each candidate is looked up as `<dir>/<candidate name>.json`, holding a
/// serialized [`LengthSweepResult`].
#[derive(Debug, Clone)]
pub struct RecordedSimulator {
    dir: PathBuf,
}

impl RecordedSimulator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, candidate: &Candidate) -> PathBuf {
        self.dir.join(format!("{}.json", candidate.name()))
    }

    /// Write `sweep` where [`RecordedSimulator::build`] will find it.
    pub fn record(
        &self,
        candidate: &Candidate,
        sweep: &LengthSweepResult,
    ) -> Result<PathBuf, SimulationError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(candidate);
        fs::write(&path, serde_json::to_string_pretty(sweep)?)?;
        Ok(path)
    }
}

impl SimulatorFactory for RecordedSimulator {
    fn name(&self) -> &str {
        "recorded"
    }

    fn build(
        &self,
        request: &SimulationRequest<'_>,
    ) -> Result<Box<dyn LengthSweepSimulation>, SimulationError> {
        if !self.dir.is_dir() {
            return Err(SimulationError::SimulatorUnavailable(format!(
                "recording directory {:?} does not exist",
                self.dir
            )));
        }

        let name = request.candidate.name();
        let path = self.path_for(request.candidate);
        let json = fs::read_to_string(&path).map_err(|e| SimulationError::Candidate {
            name: name.clone(),
            reason: format!("no recorded sweep at {:?}: {}", path, e),
        })?;
        let table: LengthSweepResult =
            serde_json::from_str(&json).map_err(|e| SimulationError::Candidate {
                name: name.clone(),
                reason: format!("unreadable sweep {:?}: {}", path, e),
            })?;
        if !table.is_sorted_by_length() {
            return Err(SimulationError::Candidate {
                name,
                reason: "recorded sweep is not ordered by length".into(),
            });
        }

        tracing::debug!(candidate = %name, samples = table.len(), "loaded recorded sweep");
        Ok(Box::new(RecordedSweep { name, table }))
    }
}

struct RecordedSweep {
    name: String,
    table: LengthSweepResult,
}

impl LengthSweepSimulation for RecordedSweep {
    fn length_sweep(
        &mut self,
        start: f64,
        stop: f64,
        _num_pts: usize,
    ) -> Result<LengthSweepResult, SimulationError> {
        let um = LengthUnit::Micrometer;
        let sweep = self.table.restricted(um.to_meters(start), um.to_meters(stop));
        if sweep.is_empty() {
            return Err(SimulationError::EmptySweep {
                name: self.name.clone(),
            });
        }
        Ok(sweep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{CrossSection, WidthType};
    use crate::sweep::SweepSample;
    use num_complex::Complex64;

    fn candidate() -> Candidate {
        Candidate::new(&CrossSection::strip(0.5), &CrossSection::strip(3.0), 5.0, WidthType::Sine)
    }

    fn request<'a>(
        candidate: &'a Candidate,
        map: &'a MaterialMap,
        stack: &'a LayerStack,
        sim: &'a SimulationSettings,
        conv: &'a ConvergenceSettings,
        dir: &'a Path,
    ) -> SimulationRequest<'a> {
        SimulationRequest {
            candidate,
            material_map: map,
            layer_stack: stack,
            simulation: sim,
            convergence: conv,
            dirpath: dir,
        }
    }

    #[test]
    fn test_missing_directory_is_fatal() {
        let sim = RecordedSimulator::new("/nonexistent/taper/recordings");
        let (c, map, stack) = (candidate(), MaterialMap::new(), LayerStack::default());
        let (s, cv) = (SimulationSettings::default(), ConvergenceSettings::default());
        let dir = PathBuf::from(".");
        let err = sim
            .build(&request(&c, &map, &stack, &s, &cv, &dir))
            .err()
            .unwrap();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_replay_restricts_range() {
        let tmp = tempfile::tempdir().unwrap();
        let sim = RecordedSimulator::new(tmp.path());
        let c = candidate();
        let samples = (1..=4)
            .map(|i| SweepSample {
                length: i as f64 * 1e-5,
                s11: Complex64::new(1e-3, 0.0),
                s21: Complex64::new(0.99, 0.0),
            })
            .collect();
        sim.record(&c, &LengthSweepResult::new(samples)).unwrap();

        let (map, stack) = (MaterialMap::new(), LayerStack::default());
        let (s, cv) = (SimulationSettings::default(), ConvergenceSettings::default());
        let mut session = sim
            .build(&request(&c, &map, &stack, &s, &cv, tmp.path()))
            .unwrap();
        let sweep = session.length_sweep(15.0, 40.0, 10).unwrap();
        assert_eq!(sweep.len(), 3);

        let empty = session.length_sweep(100.0, 200.0, 10).err().unwrap();
        assert!(matches!(empty, SimulationError::EmptySweep { .. }));
    }

    #[test]
    fn test_missing_recording_is_recoverable() {
        let tmp = tempfile::tempdir().unwrap();
        let sim = RecordedSimulator::new(tmp.path());
        let (c, map, stack) = (candidate(), MaterialMap::new(), LayerStack::default());
        let (s, cv) = (SimulationSettings::default(), ConvergenceSettings::default());
        let err = sim
            .build(&request(&c, &map, &stack, &s, &cv, tmp.path()))
            .err()
            .unwrap();
        assert!(matches!(err, SimulationError::Candidate { .. }));
    }
}
