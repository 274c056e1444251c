//! Recipe results on disk, keyed by the recipe fingerprint

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::intent::DesignIntent;
use crate::recipe::{TaperDesign, TaperDesignRecipe};

pub const ARTIFACT_FILE: &str = "taper_recipe.json";

/// Stored outcome of a recipe run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeArtifact {
    pub fingerprint: Fingerprint,
    pub created_at: DateTime<Utc>,
    pub design_intent: DesignIntent,
    pub design: TaperDesign,
}

impl RecipeArtifact {
    pub fn new(recipe: &TaperDesignRecipe, design: TaperDesign) -> Self {
        Self {
            fingerprint: design.fingerprint,
            created_at: Utc::now(),
            design_intent: recipe.design_intent.clone(),
            design,
        }
    }
}

/// JSON file holding the latest [`RecipeArtifact`] of a working directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    path: PathBuf,
}

impl ArtifactStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default file name inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(ARTIFACT_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<RecipeArtifact>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    pub fn save(&self, artifact: &RecipeArtifact) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(artifact)?)?;
        tracing::info!(path = ?self.path, fingerprint = %artifact.fingerprint, "saved recipe results");
        Ok(())
    }

    /// True if the stored results were produced by `fingerprint`.
    pub fn is_fresh(&self, fingerprint: &Fingerprint) -> Result<bool> {
        Ok(self
            .load()?
            .map(|a| a.fingerprint == *fingerprint)
            .unwrap_or(false))
    }
}
