//! Design intent for the routing taper recipe
//!
//! ```text
//!                  |       |
//!                  |      /|---------
//!                  |    /  |
//!                  |  /    |
//! -----------------|/      |
//! cross section 1  | taper | cross section 2
//! -----------------|\      |
//!                  |  \    |
//!                  |    \  |
//!                  |      \|---------
//!                  |       |
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{RecipeError, Result};

/// Targets the selected taper must meet and the length range to search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignIntent {
    /// Narrow waveguide routing loss (dB/cm)
    pub narrow_waveguide_routing_loss_per_cm: f64,
    /// Maximum acceptable reflection (dB)
    pub max_reflection: f64,
    /// Starting length in length sweep (µm)
    pub start_length: f64,
    /// Ending length in length sweep (µm)
    pub stop_length: f64,
    /// Number of points in length sweep
    pub num_pts: usize,
}

impl Default for DesignIntent {
    fn default() -> Self {
        Self {
            narrow_waveguide_routing_loss_per_cm: 3.0,
            max_reflection: -70.0,
            start_length: 1.0,
            stop_length: 200.0,
            num_pts: 200,
        }
    }
}

impl DesignIntent {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("narrow_waveguide_routing_loss_per_cm", self.narrow_waveguide_routing_loss_per_cm),
            ("max_reflection", self.max_reflection),
            ("start_length", self.start_length),
            ("stop_length", self.stop_length),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(RecipeError::InvalidIntent(format!("{} must be finite", name)));
        }
        if self.narrow_waveguide_routing_loss_per_cm < 0.0 {
            return Err(RecipeError::InvalidIntent(
                "routing loss must be non-negative".into(),
            ));
        }
        if self.start_length <= 0.0 {
            return Err(RecipeError::InvalidIntent(format!(
                "start_length must be positive, got {}",
                self.start_length
            )));
        }
        if self.stop_length < self.start_length {
            return Err(RecipeError::InvalidIntent(format!(
                "stop_length ({}) is shorter than start_length ({})",
                self.stop_length, self.start_length
            )));
        }
        if self.num_pts == 0 {
            return Err(RecipeError::InvalidIntent("num_pts must be at least 1".into()));
        }
        Ok(())
    }

    /// Evenly spaced lengths (µm) of the sweep, endpoints included.
    pub fn lengths(&self) -> Vec<f64> {
        let n = self.num_pts;
        (0..n)
            .map(|i| {
                self.start_length
                    + (self.stop_length - self.start_length) * i as f64 / (n - 1).max(1) as f64
            })
            .collect()
    }

    /// True if `length` (µm) lies within the declared sweep range.
    pub fn contains_length(&self, length: f64) -> bool {
        let tol = 1e-9 * self.stop_length.abs().max(1.0);
        length >= self.start_length - tol && length <= self.stop_length + tol
    }
}
