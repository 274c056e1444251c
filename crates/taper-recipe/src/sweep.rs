//! Length sweeps returned by the solver and the routing loss threshold search

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::LengthUnit;

/// One row of a length sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepSample {
    /// Taper length (m)
    pub length: f64,
    /// Reflection at the input port
    pub s11: Complex64,
    /// Transmission through the taper
    pub s21: Complex64,
}

/// Samples ordered by increasing length.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LengthSweepResult {
    pub samples: Vec<SweepSample>,
}

/// `10·log10(|s|²)`
pub fn to_db(s: Complex64) -> f64 {
    10.0 * s.norm_sqr().log10()
}

impl LengthSweepResult {
    pub fn new(samples: Vec<SweepSample>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_sorted_by_length(&self) -> bool {
        self.samples.windows(2).all(|w| w[0].length <= w[1].length)
    }

    /// Samples whose length (m) lies in `[start, stop]`.
    pub fn restricted(&self, start: f64, stop: f64) -> Self {
        let tol = 1e-12;
        Self::new(
            self.samples
                .iter()
                .filter(|s| s.length >= start - tol && s.length <= stop + tol)
                .copied()
                .collect(),
        )
    }
}

/// Length (µm) picked for a candidate and the s-parameters (dB) at that length.
///
/// A lossless or perfectly matched sample gives an infinite dB value; those
/// are stored as strings (`"-inf"`) since JSON has no infinities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimalPoint {
    pub length: f64,
    #[serde(with = "db_value")]
    pub transmission: f64,
    #[serde(with = "db_value")]
    pub reflection: f64,
}

mod db_value {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_str(&value.to_string())
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(v) => Ok(v),
            Repr::Text(text) => text.parse().map_err(de::Error::custom),
        }
    }
}

/// Outcome of the threshold search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LengthSearch {
    /// First length whose insertion loss beats the routing loss target
    Reached { index: usize, point: OptimalPoint },
    /// No length qualifies; the longest sweep length is used instead
    Unattainable { point: OptimalPoint },
}

impl LengthSearch {
    pub fn point(&self) -> OptimalPoint {
        match self {
            LengthSearch::Reached { point, .. } | LengthSearch::Unattainable { point } => *point,
        }
    }

    pub fn is_reached(&self) -> bool {
        matches!(self, LengthSearch::Reached { .. })
    }
}

/// Find the shortest length at which the taper loses less than the routing
/// waveguide would over the same distance.
///
/// `target_rate` is the routing loss in dB per `length_scale` meters (for a
/// dB/cm target, `length_scale` is 1e-2). `max_length` (µm) is reported when
/// no sample qualifies. The scan is linear: transmission is not monotonic in
/// length. Returns `None` for an empty sweep.
pub fn find_optimal_length(
    sweep: &LengthSweepResult,
    target_rate: f64,
    length_scale: f64,
    max_length: f64,
) -> Option<LengthSearch> {
    let last = sweep.samples.last()?;

    let hit = sweep.samples.iter().position(|s| {
        let budget = -target_rate * s.length / length_scale;
        to_db(s.s21) > budget
    });

    let search = match hit {
        Some(index) => {
            let s = &sweep.samples[index];
            LengthSearch::Reached {
                index,
                point: OptimalPoint {
                    length: LengthUnit::Micrometer.from_meters(s.length),
                    transmission: to_db(s.s21),
                    reflection: to_db(s.s11),
                },
            }
        }
        None => {
            tracing::warn!(
                target_rate,
                max_length,
                "cannot achieve specified routing loss of -{}dB per {}m; using maximal length of {}um",
                target_rate,
                length_scale,
                max_length
            );
            LengthSearch::Unattainable {
                point: OptimalPoint {
                    length: max_length,
                    transmission: to_db(last.s21),
                    reflection: to_db(last.s11),
                },
            }
        }
    };
    Some(search)
}
