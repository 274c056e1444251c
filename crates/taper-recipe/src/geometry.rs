//! Taper candidates and the geometry sweep

use std::fmt;

use serde::{Deserialize, Serialize};

/// Length (µm) at which sweep candidates are built before their optimal
/// length is known.
pub const PROBE_LENGTH: f64 = 5.0;

/// Waveguide cross-section at one end of the taper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossSection {
    /// Core width (µm)
    pub width: f64,
    /// GDS layer/datatype of the core
    #[serde(default = "default_layer")]
    pub layer: (u32, u32),
}

fn default_layer() -> (u32, u32) {
    (1, 0)
}

impl CrossSection {
    pub fn strip(width: f64) -> Self {
        Self {
            width,
            layer: default_layer(),
        }
    }
}

/// Width profile along the taper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidthType {
    Sine,
    Linear,
    Parabolic,
}

impl WidthType {
    /// Every profile, in sweep order.
    pub const ALL: [WidthType; 3] = [WidthType::Sine, WidthType::Linear, WidthType::Parabolic];

    pub fn as_str(&self) -> &'static str {
        match self {
            WidthType::Sine => "sine",
            WidthType::Linear => "linear",
            WidthType::Parabolic => "parabolic",
        }
    }
}

impl fmt::Display for WidthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A taper between two cross-sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub cross_section1: CrossSection,
    pub cross_section2: CrossSection,
    /// Taper length (µm)
    pub length: f64,
    pub width_type: WidthType,
}

impl Candidate {
    pub fn new(
        cross_section1: &CrossSection,
        cross_section2: &CrossSection,
        length: f64,
        width_type: WidthType,
    ) -> Self {
        Self {
            cross_section1: cross_section1.clone(),
            cross_section2: cross_section2.clone(),
            length,
            width_type,
        }
    }

    /// Deterministic cell name, also used as the key of recorded solver output.
    pub fn name(&self) -> String {
        format!(
            "taper_{}_{}_L{}_{}",
            fmt_dim(self.cross_section1.width),
            fmt_dim(self.cross_section2.width),
            fmt_dim(self.length),
            self.width_type
        )
    }

    /// Same profile at another length.
    pub fn with_length(&self, length: f64) -> Self {
        Self {
            length,
            ..self.clone()
        }
    }
}

/// `0.5` -> `0p5`, `3.0` -> `3`; keeps names filesystem safe.
fn fmt_dim(value: f64) -> String {
    let s = format!("{}", (value * 1e3).round() / 1e3);
    s.replace('.', "p").replace('-', "m")
}

/// One candidate per width profile, all at `length`.
pub fn sweep_candidates(
    cross_section1: &CrossSection,
    cross_section2: &CrossSection,
    length: f64,
) -> Vec<Candidate> {
    WidthType::ALL
        .iter()
        .map(|&wt| Candidate::new(cross_section1, cross_section2, length, wt))
        .collect()
}
