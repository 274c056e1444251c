//! TOML job files describing a recipe run

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{RecipeError, Result};
use crate::geometry::CrossSection;
use crate::intent::DesignIntent;
use crate::recipe::{TaperDesignRecipe, CELL_NAME};
use crate::settings::{ConvergenceSettings, SimulationSettings};
use crate::stack::{default_material_map, LayerLevel, LayerStack, MaterialMap};

/// Top-level job configuration.
///
/// Every section is optional and falls back to the recipe defaults.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct JobConfig {
    pub recipe: RecipeSection,
    pub intent: DesignIntent,
    pub cross_section1: Option<CrossSection>,
    pub cross_section2: Option<CrossSection>,
    pub simulation: SimulationSettings,
    pub convergence: ConvergenceSection,
    /// Replaces the default material map when present
    pub materials: Option<MaterialMap>,
    /// Replaces the default layer stack when present
    pub layers: Option<BTreeMap<String, LayerLevel>>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RecipeSection {
    pub cell: String,
    /// Working directory, relative to the job file
    pub dirpath: PathBuf,
    /// Directory of recorded length sweeps, relative to the job file
    pub recordings: PathBuf,
}

impl Default for RecipeSection {
    fn default() -> Self {
        Self {
            cell: CELL_NAME.to_string(),
            dirpath: PathBuf::from("."),
            recordings: PathBuf::from("sweeps"),
        }
    }
}

/// Convergence criteria, given either as a raw |Δs| or as a dB stability.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ConvergenceSection {
    pub sparam_diff: Option<f64>,
    /// Insertion loss change (dB) still considered converged
    pub sparam_diff_db: Option<f64>,
    pub passes: Option<u32>,
}

impl ConvergenceSection {
    pub fn settings(&self) -> Result<ConvergenceSettings> {
        let mut settings = match (self.sparam_diff, self.sparam_diff_db) {
            (Some(_), Some(_)) => {
                return Err(RecipeError::InvalidConfig(
                    "set either convergence.sparam_diff or convergence.sparam_diff_db, not both"
                        .into(),
                ))
            }
            (None, Some(db)) if !(db.is_finite() && db > 0.0) => {
                return Err(RecipeError::InvalidConfig(format!(
                    "convergence.sparam_diff_db must be positive, got {}",
                    db
                )))
            }
            (None, Some(db)) => ConvergenceSettings::from_insertion_loss_db(db),
            (Some(diff), None) => ConvergenceSettings {
                sparam_diff: diff,
                ..Default::default()
            },
            (None, None) => ConvergenceSettings::default(),
        };
        if let Some(passes) = self.passes {
            settings.passes = passes;
        }
        Ok(settings)
    }
}

impl JobConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: JobConfig = toml::from_str(content)?;
        config.convergence.settings()?;
        Ok(config)
    }

    /// Build the recipe; relative paths are resolved against `base_dir`.
    pub fn into_recipe(self, base_dir: &Path) -> Result<TaperDesignRecipe> {
        let defaults = TaperDesignRecipe::default();
        let convergence_setup = self.convergence.settings()?;
        Ok(TaperDesignRecipe {
            cell: self.recipe.cell,
            cross_section1: self.cross_section1.unwrap_or(defaults.cross_section1),
            cross_section2: self.cross_section2.unwrap_or(defaults.cross_section2),
            design_intent: self.intent,
            material_map: self.materials.unwrap_or_else(default_material_map),
            layer_stack: self
                .layers
                .map(|layers| LayerStack { layers })
                .unwrap_or_else(LayerStack::silicon_photonics),
            simulation_setup: self.simulation,
            convergence_setup,
            dirpath: base_dir.join(self.recipe.dirpath),
        })
    }
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &Path) -> Result<JobConfig> {
    let content = std::fs::read_to_string(path)?;
    JobConfig::from_toml(&content)
}
