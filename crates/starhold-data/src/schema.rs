//! On-disk format of building definitions.
//!
//! Each entry replaces the built-in spec of the building type it names.
//! Types not mentioned keep their defaults.

use serde::Deserialize;
use starhold_core::catalog::{BuildingSpec, BuildingType};
use starhold_core::fixed::f64_to_fixed64;
use starhold_core::resources::Resources;

/// A building definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildingData {
    /// Snake-case type name, e.g. `"metal_mine"`.
    pub name: String,
    pub max_level: u32,
    pub cost: CostData,
    #[serde(default = "default_factor")]
    pub cost_factor: f64,
    pub build_secs: u64,
    #[serde(default = "default_factor")]
    pub time_factor: f64,
    #[serde(default)]
    pub production: ProductionData,
    #[serde(default)]
    pub energy_upkeep: f64,
    #[serde(default)]
    pub housing: f64,
    #[serde(default)]
    pub workers: f64,
    /// `(type name, level)` pairs.
    #[serde(default)]
    pub prerequisites: Vec<(String, u32)>,
}

fn default_factor() -> f64 {
    1.5
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CostData {
    #[serde(default)]
    pub minerals: f64,
    #[serde(default)]
    pub energy: f64,
    #[serde(default)]
    pub credits: f64,
}

/// Output per hour at level 1.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductionData {
    #[serde(default)]
    pub minerals: f64,
    #[serde(default)]
    pub energy: f64,
    #[serde(default)]
    pub credits: f64,
    #[serde(default)]
    pub research: f64,
}

/// TOML wrapper: `[[buildings]]` tables.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlBuildings {
    pub buildings: Vec<BuildingData>,
}

impl BuildingData {
    /// Convert to a core spec. Prerequisites must already be resolved.
    pub fn to_spec(&self, kind: BuildingType, prerequisites: Vec<(BuildingType, u32)>) -> BuildingSpec {
        BuildingSpec {
            kind,
            max_level: self.max_level,
            base_cost: Resources::cost(self.cost.minerals, self.cost.energy, self.cost.credits),
            cost_factor: f64_to_fixed64(self.cost_factor),
            base_build_secs: self.build_secs,
            time_factor: f64_to_fixed64(self.time_factor),
            production_per_hour: Resources::from_f64(
                self.production.minerals,
                self.production.energy,
                self.production.credits,
                0.0,
                self.production.research,
            ),
            energy_upkeep_per_level: f64_to_fixed64(self.energy_upkeep),
            housing_per_level: f64_to_fixed64(self.housing),
            workers_per_level: f64_to_fixed64(self.workers),
            prerequisites,
        }
    }
}
