//! EME simulation and convergence settings
//!
//! Both are plain values. Every recipe owns its own copy, so tweaking the
//! settings of one run can never leak into another.

use serde::{Deserialize, Serialize};

/// Solver setup handed to the EME adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Center wavelength (µm)
    pub wavelength: f64,
    /// Material fit range start (µm)
    pub wavelength_start: f64,
    /// Material fit range stop (µm)
    pub wavelength_stop: f64,
    pub material_fit_tolerance: f64,
    /// Cells per EME group (input port, taper, output port)
    pub group_cells: Vec<u32>,
    /// Subcell method per group; `None` disables subcells
    pub group_subcell_methods: Vec<Option<String>>,
    pub num_modes: u32,
    pub energy_conservation: String,
    pub mesh_cells_per_wavelength: u32,
    /// Straight waveguide added at each port (µm)
    pub port_extension: f64,
    pub pml_layers: u32,
    /// Lateral simulation margin (µm)
    pub ymargin: f64,
    /// Vertical simulation margin (µm)
    pub zmargin: f64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            wavelength: 1.55,
            wavelength_start: 1.5,
            wavelength_stop: 1.6,
            material_fit_tolerance: 0.001,
            group_cells: vec![1, 30, 1],
            group_subcell_methods: vec![None, Some("CVCS".into()), None],
            num_modes: 30,
            energy_conservation: "make passive".into(),
            mesh_cells_per_wavelength: 60,
            port_extension: 1.0,
            pml_layers: 12,
            ymargin: 2.0,
            zmargin: 1.0,
        }
    }
}

/// Stopping criteria for the adapter's convergence loops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceSettings {
    /// Largest |Δs| between passes still considered converged
    pub sparam_diff: f64,
    /// Consecutive passes that must stay within `sparam_diff`
    pub passes: u32,
}

impl Default for ConvergenceSettings {
    fn default() -> Self {
        Self {
            sparam_diff: 0.01,
            passes: 5,
        }
    }
}

impl ConvergenceSettings {
    /// Convergence threshold expressed as an insertion loss change in dB.
    ///
    /// `sparam_diff = 1 - 10^(-dB/10)` is the usual way of asking for a
    /// given dB stability.
    pub fn from_insertion_loss_db(db: f64) -> Self {
        Self {
            sparam_diff: 1.0 - 10f64.powf(-db / 10.0),
            ..Default::default()
        }
    }
}
