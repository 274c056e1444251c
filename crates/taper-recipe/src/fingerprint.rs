//! Recipe fingerprint used to decide whether stored results are stale

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::geometry::CrossSection;
use crate::intent::DesignIntent;
use crate::settings::{ConvergenceSettings, SimulationSettings};
use crate::stack::{LayerStack, MaterialMap};

/// Configuration every recipe shares: which cell is swept, between which
/// cross-sections, in which process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeBase {
    pub cell: String,
    pub cross_section1: CrossSection,
    pub cross_section2: CrossSection,
    pub material_map: MaterialMap,
    pub layer_stack: LayerStack,
}

/// SHA-256 digest of a recipe configuration.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl FromStr for Fingerprint {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Feeds `value` as canonical JSON, prefixed by its byte length.
fn update_json<T: Serialize>(hasher: &mut Sha256, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(&bytes);
    Ok(())
}

/// Digest of the shared recipe configuration alone.
pub fn base_digest(base: &RecipeBase) -> Result<[u8; 32]> {
    let mut hasher = Sha256::new();
    update_json(&mut hasher, base)?;
    Ok(hasher.finalize().into())
}

/// Fingerprint over base configuration, simulation setup, convergence setup
/// and design intent, in that order.
pub fn fingerprint(
    base: &RecipeBase,
    simulation: &SimulationSettings,
    convergence: &ConvergenceSettings,
    intent: &DesignIntent,
) -> Result<Fingerprint> {
    let mut hasher = Sha256::new();
    hasher.update(base_digest(base)?);
    update_json(&mut hasher, simulation)?;
    update_json(&mut hasher, convergence)?;
    update_json(&mut hasher, intent)?;
    Ok(Fingerprint(hasher.finalize().into()))
}
