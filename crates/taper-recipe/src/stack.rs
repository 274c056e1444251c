//! Layer stack and material mapping shared by every recipe run

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// PDK material name -> solver material name.
///
/// Ordered so that serialization (and therefore the fingerprint) does not
/// depend on insertion order.
pub type MaterialMap = BTreeMap<String, String>;

/// How a layer is built in the process description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerType {
    Grow,
    Background,
    Doping,
}

/// One layer of the process stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerLevel {
    /// GDS layer/datatype
    pub layer: (u32, u32),
    /// Thickness (µm)
    pub thickness: f64,
    /// Bottom of the layer (µm)
    pub zmin: f64,
    pub material: String,
    /// Sidewall angle from vertical (degrees)
    #[serde(default)]
    pub sidewall_angle: f64,
    #[serde(default)]
    pub width_to_z: f64,
    #[serde(default)]
    pub mesh_order: u32,
    pub layer_type: LayerType,
    #[serde(default)]
    pub info: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LayerStack {
    pub layers: BTreeMap<String, LayerLevel>,
}

impl LayerStack {
    /// Silicon-on-insulator stack: 220 nm Si core between 3 µm oxide layers.
    pub fn silicon_photonics() -> Self {
        let mut layers = BTreeMap::new();
        layers.insert(
            "clad".to_string(),
            LayerLevel {
                layer: (99999, 0),
                thickness: 3.0,
                zmin: 0.0,
                material: "sio2".into(),
                sidewall_angle: 0.0,
                width_to_z: 0.0,
                mesh_order: 9,
                layer_type: LayerType::Background,
                info: BTreeMap::new(),
            },
        );
        layers.insert(
            "box".to_string(),
            LayerLevel {
                layer: (99999, 0),
                thickness: 3.0,
                zmin: -3.0,
                material: "sio2".into(),
                sidewall_angle: 0.0,
                width_to_z: 0.0,
                mesh_order: 9,
                layer_type: LayerType::Background,
                info: BTreeMap::new(),
            },
        );
        let mut core_info = BTreeMap::new();
        core_info.insert("active".to_string(), serde_json::Value::Bool(true));
        layers.insert(
            "core".to_string(),
            LayerLevel {
                layer: (1, 0),
                thickness: 0.22,
                zmin: 0.0,
                material: "si".into(),
                sidewall_angle: 2.0,
                width_to_z: 0.5,
                mesh_order: 2,
                layer_type: LayerType::Grow,
                info: core_info,
            },
        );
        Self { layers }
    }

    /// Materials referenced by the stack that have no solver mapping.
    pub fn unmapped_materials<'a>(&'a self, map: &MaterialMap) -> Vec<&'a str> {
        let mut missing: Vec<&str> = self
            .layers
            .values()
            .map(|l| l.material.as_str())
            .filter(|m| !map.contains_key(*m))
            .collect();
        missing.sort_unstable();
        missing.dedup();
        missing
    }
}

/// Default mapping from PDK materials to the solver's material database.
pub fn default_material_map() -> MaterialMap {
    [
        ("si", "Si (Silicon) - Palik"),
        ("sio2", "SiO2 (Glass) - Palik"),
        ("sin", "Si3N4 (Silicon Nitride) - Phillip"),
        ("TiN", "TiN - Palik"),
        ("Aluminum", "Al (Aluminium) Palik"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}
