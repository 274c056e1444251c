//! Routing taper design recipe
//!
//! Sweeps the taper width profile through the EME solver, finds for each
//! profile the shortest length whose insertion loss beats the routing loss of
//! the narrow waveguide, and keeps the best profile:
//!
//! 1. the shortest taper, if it is also the least reflective or reflects less
//!    than `max_reflection`;
//! 2. otherwise the least reflective taper.
//!
//! Candidates are simulated one after another. A candidate the solver cannot
//! handle is logged and dropped; the sweep carries on with the rest.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{error, info, info_span};

use crate::error::{RecipeError, Result, SimulationError};
use crate::fingerprint::{fingerprint, Fingerprint, RecipeBase};
use crate::geometry::{sweep_candidates, Candidate, CrossSection, PROBE_LENGTH};
use crate::intent::DesignIntent;
use crate::select::{select, CandidateScore, SelectionReason};
use crate::settings::{ConvergenceSettings, SimulationSettings};
use crate::simulator::{SimulationRequest, SimulatorFactory};
use crate::stack::{default_material_map, LayerStack, MaterialMap};
use crate::store::{ArtifactStore, RecipeArtifact};
use crate::sweep::{find_optimal_length, LengthSweepResult};
use crate::LengthUnit;

pub const CELL_NAME: &str = "taper_cross_section";

#[derive(Debug, Clone, PartialEq)]
pub struct TaperDesignRecipe {
    pub cell: String,
    pub cross_section1: CrossSection,
    pub cross_section2: CrossSection,
    pub design_intent: DesignIntent,
    pub material_map: MaterialMap,
    pub layer_stack: LayerStack,
    pub simulation_setup: SimulationSettings,
    pub convergence_setup: ConvergenceSettings,
    /// Where solver files and results are written
    pub dirpath: PathBuf,
}

impl Default for TaperDesignRecipe {
    fn default() -> Self {
        Self {
            cell: CELL_NAME.to_string(),
            cross_section1: CrossSection::strip(0.5),
            cross_section2: CrossSection::strip(3.0),
            design_intent: DesignIntent::default(),
            material_map: default_material_map(),
            layer_stack: LayerStack::silicon_photonics(),
            simulation_setup: SimulationSettings::default(),
            convergence_setup: ConvergenceSettings::default(),
            dirpath: PathBuf::from("."),
        }
    }
}

/// What happened to one candidate of the sweep.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateOutcome {
    Evaluated {
        score: CandidateScore,
        sweep: LengthSweepResult,
    },
    Failed {
        name: String,
        reason: String,
    },
}

/// A candidate the solver could not handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateFailure {
    pub name: String,
    pub reason: String,
}

/// The winning taper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaperDesign {
    /// Winning profile rebuilt at its optimal length
    pub component: Candidate,
    pub score: CandidateScore,
    pub reason: SelectionReason,
    /// Full length sweep of the winning profile
    pub length_sweep: LengthSweepResult,
    /// Scores of every candidate that simulated
    pub scores: Vec<CandidateScore>,
    pub failures: Vec<CandidateFailure>,
    pub fingerprint: Fingerprint,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SweepOutcome {
    Selected(Box<TaperDesign>),
    /// Every candidate failed to simulate
    NoViableCandidate { failures: Vec<CandidateFailure> },
}

impl SweepOutcome {
    pub fn design(&self) -> Option<&TaperDesign> {
        match self {
            SweepOutcome::Selected(design) => Some(design),
            SweepOutcome::NoViableCandidate { .. } => None,
        }
    }

    pub fn into_result(self) -> Result<TaperDesign> {
        match self {
            SweepOutcome::Selected(design) => Ok(*design),
            SweepOutcome::NoViableCandidate { .. } => Err(RecipeError::NoViableCandidate),
        }
    }
}

impl TaperDesignRecipe {
    pub fn base(&self) -> RecipeBase {
        RecipeBase {
            cell: self.cell.clone(),
            cross_section1: self.cross_section1.clone(),
            cross_section2: self.cross_section2.clone(),
            material_map: self.material_map.clone(),
            layer_stack: self.layer_stack.clone(),
        }
    }

    /// Hash of everything that influences the result.
    pub fn fingerprint(&self) -> Result<Fingerprint> {
        fingerprint(
            &self.base(),
            &self.simulation_setup,
            &self.convergence_setup,
            &self.design_intent,
        )
    }

    /// Sweep candidates, one per width profile.
    pub fn candidates(&self) -> Vec<Candidate> {
        sweep_candidates(&self.cross_section1, &self.cross_section2, PROBE_LENGTH)
    }

    /// Run the recipe over the width profile sweep.
    pub fn eval(&self, simulator: &dyn SimulatorFactory) -> Result<SweepOutcome> {
        self.eval_candidates(&self.candidates(), simulator)
    }

    /// Run the recipe over an explicit candidate list.
    pub fn eval_candidates(
        &self,
        candidates: &[Candidate],
        simulator: &dyn SimulatorFactory,
    ) -> Result<SweepOutcome> {
        self.design_intent.validate()?;
        let fingerprint = self.fingerprint()?;
        let _span = info_span!("taper_recipe", %fingerprint, simulator = simulator.name()).entered();

        let missing = self.layer_stack.unmapped_materials(&self.material_map);
        if !missing.is_empty() {
            tracing::warn!(?missing, "layer stack materials without a solver mapping");
        }

        let outcomes: Vec<CandidateOutcome> = candidates
            .iter()
            .map(|candidate| self.evaluate(candidate, simulator))
            .collect::<Result<_>>()?;

        // Aggregate
        let mut evaluated = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                CandidateOutcome::Evaluated { score, sweep } => evaluated.push((score, sweep)),
                CandidateOutcome::Failed { name, reason } => {
                    failures.push(CandidateFailure { name, reason })
                }
            }
        }
        for (score, _) in &evaluated {
            info!(
                candidate = %score.candidate.name(),
                width_type = %score.candidate.width_type,
                "L: {} | T: {} | R: {}",
                score.point.length,
                score.point.transmission,
                score.point.reflection
            );
        }

        // Select
        let scores: Vec<CandidateScore> = evaluated.iter().map(|(s, _)| s.clone()).collect();
        let Some(selection) = select(&scores, self.design_intent.max_reflection) else {
            error!(failed = failures.len(), "no candidate could be simulated");
            return Ok(SweepOutcome::NoViableCandidate { failures });
        };

        let (score, length_sweep) = evaluated.swap_remove(selection.index);
        let component = score.candidate.with_length(score.point.length);
        info!(
            candidate = %component.name(),
            reason = ?selection.reason,
            length = score.point.length,
            "selected taper"
        );

        Ok(SweepOutcome::Selected(Box::new(TaperDesign {
            component,
            score,
            reason: selection.reason,
            length_sweep,
            scores,
            failures,
            fingerprint,
        })))
    }

    /// Simulate one candidate and score it. Only an unavailable solver is an error.
    fn evaluate(
        &self,
        candidate: &Candidate,
        simulator: &dyn SimulatorFactory,
    ) -> Result<CandidateOutcome> {
        let name = candidate.name();
        let di = &self.design_intent;

        let request = SimulationRequest {
            candidate,
            material_map: &self.material_map,
            layer_stack: &self.layer_stack,
            simulation: &self.simulation_setup,
            convergence: &self.convergence_setup,
            dirpath: &self.dirpath,
        };

        let sweep = simulator
            .build(&request)
            .and_then(|mut sim| sim.length_sweep(di.start_length, di.stop_length, di.num_pts));
        let sweep = match sweep {
            Ok(sweep) => sweep,
            Err(err) if err.is_recoverable() => return Ok(skip(name, err)),
            Err(err) => return Err(err.into()),
        };

        // The linear scan needs increasing lengths, and the pick must stay in the declared range.
        if !sweep.is_sorted_by_length() {
            let reason = "length sweep is not ordered by length".to_string();
            return Ok(skip(name.clone(), SimulationError::Candidate { name, reason }));
        }
        let um = LengthUnit::Micrometer;
        let sweep = sweep.restricted(um.to_meters(di.start_length), um.to_meters(di.stop_length));

        let cm = LengthUnit::Centimeter.to_meters(1.0);
        let span = info_span!("candidate", candidate = %name);
        let search = span.in_scope(|| {
            find_optimal_length(
                &sweep,
                di.narrow_waveguide_routing_loss_per_cm,
                cm,
                di.stop_length,
            )
        });
        let Some(search) = search else {
            return Ok(skip(name.clone(), SimulationError::EmptySweep { name }));
        };

        Ok(CandidateOutcome::Evaluated {
            score: CandidateScore {
                candidate: candidate.clone(),
                point: search.point(),
                reached_target: search.is_reached(),
            },
            sweep,
        })
    }

    /// Run unless `store` already holds results for this exact configuration.
    ///
    /// Returns the artifact and whether the solver was run.
    pub fn eval_cached(
        &self,
        simulator: &dyn SimulatorFactory,
        store: &ArtifactStore,
        force: bool,
    ) -> Result<(RecipeArtifact, bool)> {
        let fp = self.fingerprint()?;
        if !force {
            if let Some(artifact) = store.load()? {
                if artifact.fingerprint == fp {
                    info!(fingerprint = %fp, "stored results are up to date");
                    return Ok((artifact, false));
                }
                info!(stored = %artifact.fingerprint, current = %fp, "stored results are stale");
            }
        }

        let design = self.eval(simulator)?.into_result()?;
        let artifact = RecipeArtifact::new(self, design);
        store.save(&artifact)?;
        Ok((artifact, true))
    }
}

fn skip(name: String, err: SimulationError) -> CandidateOutcome {
    error!(candidate = %name, "{}. Moving onto next component", err);
    CandidateOutcome::Failed {
        name,
        reason: err.to_string(),
    }
}
