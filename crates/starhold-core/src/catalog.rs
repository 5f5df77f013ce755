//! The building catalog: the deterministic cost, time and production table.
//!
//! The catalog is assembled with a [`CatalogBuilder`] and frozen into an
//! immutable [`Catalog`] before the universe starts. Every building type must
//! have exactly one spec.

use crate::fixed::{Fixed64, ceil_to_u64, f64_to_fixed64, pow_saturating};
use crate::resources::Resources;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kinds of building a planet can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingType {
    CommandCenter,
    MetalMine,
    EnergyPlant,
    TradeHub,
    Habitat,
    ResearchLab,
    Factory,
    Shipyard,
    DefenseGrid,
}

impl BuildingType {
    pub const ALL: [BuildingType; 9] = [
        BuildingType::CommandCenter,
        BuildingType::MetalMine,
        BuildingType::EnergyPlant,
        BuildingType::TradeHub,
        BuildingType::Habitat,
        BuildingType::ResearchLab,
        BuildingType::Factory,
        BuildingType::Shipyard,
        BuildingType::DefenseGrid,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuildingType::CommandCenter => "command_center",
            BuildingType::MetalMine => "metal_mine",
            BuildingType::EnergyPlant => "energy_plant",
            BuildingType::TradeHub => "trade_hub",
            BuildingType::Habitat => "habitat",
            BuildingType::ResearchLab => "research_lab",
            BuildingType::Factory => "factory",
            BuildingType::Shipyard => "shipyard",
            BuildingType::DefenseGrid => "defense_grid",
        }
    }

    pub fn from_name(name: &str) -> Option<BuildingType> {
        BuildingType::ALL.into_iter().find(|t| t.name() == name)
    }
}

impl std::fmt::Display for BuildingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Static description of one building type.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildingSpec {
    pub kind: BuildingType,
    pub max_level: u32,
    /// Cost of level 1.
    pub base_cost: Resources,
    /// Cost multiplier per level above 1.
    pub cost_factor: Fixed64,
    /// Build time of level 1 in seconds.
    pub base_build_secs: u64,
    /// Build time multiplier per level above 1.
    pub time_factor: Fixed64,
    /// Output per hour at level 1.
    pub production_per_hour: Resources,
    /// Energy consumed per hour, per level.
    pub energy_upkeep_per_level: Fixed64,
    /// Population capacity added per level.
    pub housing_per_level: Fixed64,
    /// Population required to run each level.
    pub workers_per_level: Fixed64,
    /// Buildings (and minimum levels) required before construction.
    pub prerequisites: Vec<(BuildingType, u32)>,
}

impl BuildingSpec {
    /// Cost of reaching `level`: `base_cost × cost_factor^(level-1)`.
    pub fn cost_at(&self, level: u32) -> Resources {
        let factor = pow_saturating(self.cost_factor, level.saturating_sub(1));
        self.base_cost.scaled(factor)
    }

    /// Build time in seconds for `level`, shortened by `speed_bonus_level`
    /// (10% faster per bonus level). Never less than one second.
    pub fn build_secs(&self, level: u32, speed_bonus_level: u32) -> u64 {
        let growth = pow_saturating(self.time_factor, level.saturating_sub(1));
        let raw = Fixed64::saturating_from_num(self.base_build_secs).saturating_mul(growth);
        let divisor = Fixed64::ONE
            .saturating_add(f64_to_fixed64(0.1).saturating_mul(Fixed64::saturating_from_num(speed_bonus_level)));
        let secs = raw.checked_div(divisor).unwrap_or(raw);
        ceil_to_u64(secs).max(1)
    }

    /// Output per hour at `level`: `base × level × 1.1^(level-1)`.
    pub fn production_at(&self, level: u32) -> Resources {
        if level == 0 {
            return Resources::ZERO;
        }
        let growth = pow_saturating(f64_to_fixed64(1.1), level - 1);
        let factor = Fixed64::saturating_from_num(level).saturating_mul(growth);
        self.production_per_hour.scaled(factor)
    }

    /// Energy consumed per hour at `level`.
    pub fn upkeep_at(&self, level: u32) -> Fixed64 {
        self.energy_upkeep_per_level
            .saturating_mul(Fixed64::saturating_from_num(level))
    }

    /// Population capacity provided at `level`.
    pub fn housing_at(&self, level: u32) -> Fixed64 {
        self.housing_per_level
            .saturating_mul(Fixed64::saturating_from_num(level))
    }

    /// Population needed to operate `level`.
    pub fn workers_at(&self, level: u32) -> Fixed64 {
        self.workers_per_level
            .saturating_mul(Fixed64::saturating_from_num(level))
    }
}

/// Errors raised while freezing a catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("no spec registered for building type {0}")]
    MissingSpec(BuildingType),

    #[error("building type {0} registered twice")]
    Duplicate(BuildingType),

    #[error("building type {0} has max level 0")]
    ZeroMaxLevel(BuildingType),

    #[error("{kind} requires {prereq} level {level}, above its max level {max}")]
    UnreachablePrerequisite {
        kind: BuildingType,
        prereq: BuildingType,
        level: u32,
        max: u32,
    },

    #[error("{0} lists itself as a prerequisite")]
    SelfPrerequisite(BuildingType),
}

/// Collects specs before freezing them into a [`Catalog`].
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    specs: Vec<BuildingSpec>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a spec. Duplicates are reported by [`CatalogBuilder::build`].
    pub fn register(&mut self, spec: BuildingSpec) -> &mut Self {
        self.specs.push(spec);
        self
    }

    /// Replace the spec for `kind` in place, if registered.
    pub fn mutate<F>(&mut self, kind: BuildingType, f: F) -> Result<(), CatalogError>
    where
        F: FnOnce(&mut BuildingSpec),
    {
        let spec = self
            .specs
            .iter_mut()
            .find(|s| s.kind == kind)
            .ok_or(CatalogError::MissingSpec(kind))?;
        f(spec);
        Ok(())
    }

    /// Validate and freeze.
    pub fn build(self) -> Result<Catalog, CatalogError> {
        let mut specs: HashMap<BuildingType, BuildingSpec> = HashMap::new();
        for spec in self.specs {
            if spec.max_level == 0 {
                return Err(CatalogError::ZeroMaxLevel(spec.kind));
            }
            if specs.contains_key(&spec.kind) {
                return Err(CatalogError::Duplicate(spec.kind));
            }
            specs.insert(spec.kind, spec);
        }
        for kind in BuildingType::ALL {
            let spec = specs.get(&kind).ok_or(CatalogError::MissingSpec(kind))?;
            for &(prereq, level) in &spec.prerequisites {
                if prereq == kind {
                    return Err(CatalogError::SelfPrerequisite(kind));
                }
                let max = specs
                    .get(&prereq)
                    .map(|s| s.max_level)
                    .ok_or(CatalogError::MissingSpec(prereq))?;
                if level > max {
                    return Err(CatalogError::UnreachablePrerequisite {
                        kind,
                        prereq,
                        level,
                        max,
                    });
                }
            }
        }
        Ok(Catalog { specs })
    }
}

/// Immutable table of building specs. One entry per [`BuildingType`].
#[derive(Debug, Clone)]
pub struct Catalog {
    specs: HashMap<BuildingType, BuildingSpec>,
}

impl Catalog {
    /// Spec for `kind`. Always present once the catalog is built.
    pub fn spec(&self, kind: BuildingType) -> &BuildingSpec {
        &self.specs[&kind]
    }

    /// A builder pre-filled with the default table, for tweaking.
    pub fn default_builder() -> CatalogBuilder {
        let mut builder = CatalogBuilder::new();
        for spec in default_specs() {
            builder.register(spec);
        }
        builder
    }
}

impl Default for Catalog {
    fn default() -> Self {
        let mut specs = HashMap::new();
        for spec in default_specs() {
            specs.insert(spec.kind, spec);
        }
        Catalog { specs }
    }
}

#[allow(clippy::too_many_arguments)]
fn spec(
    kind: BuildingType,
    max_level: u32,
    cost: (f64, f64, f64),
    cost_factor: f64,
    base_build_secs: u64,
    time_factor: f64,
    production_per_hour: Resources,
    upkeep: f64,
    housing: f64,
    workers: f64,
    prerequisites: Vec<(BuildingType, u32)>,
) -> BuildingSpec {
    BuildingSpec {
        kind,
        max_level,
        base_cost: Resources::cost(cost.0, cost.1, cost.2),
        cost_factor: f64_to_fixed64(cost_factor),
        base_build_secs,
        time_factor: f64_to_fixed64(time_factor),
        production_per_hour,
        energy_upkeep_per_level: f64_to_fixed64(upkeep),
        housing_per_level: f64_to_fixed64(housing),
        workers_per_level: f64_to_fixed64(workers),
        prerequisites,
    }
}

/// The built-in table.
pub fn default_specs() -> Vec<BuildingSpec> {
    use BuildingType::*;
    vec![
        spec(
            CommandCenter,
            10,
            (400.0, 200.0, 200.0),
            1.8,
            120,
            1.6,
            Resources::from_f64(5.0, 5.0, 10.0, 0.0, 0.0),
            0.0,
            100.0,
            0.0,
            vec![],
        ),
        spec(
            MetalMine,
            20,
            (60.0, 15.0, 0.0),
            1.5,
            60,
            1.5,
            Resources::from_f64(30.0, 0.0, 0.0, 0.0, 0.0),
            10.0,
            0.0,
            5.0,
            vec![],
        ),
        spec(
            EnergyPlant,
            20,
            (75.0, 0.0, 30.0),
            1.5,
            60,
            1.5,
            Resources::from_f64(0.0, 40.0, 0.0, 0.0, 0.0),
            0.0,
            0.0,
            5.0,
            vec![],
        ),
        spec(
            TradeHub,
            15,
            (150.0, 50.0, 0.0),
            1.6,
            120,
            1.5,
            Resources::from_f64(0.0, 0.0, 25.0, 0.0, 0.0),
            15.0,
            0.0,
            10.0,
            vec![(CommandCenter, 2)],
        ),
        spec(
            Habitat,
            15,
            (100.0, 40.0, 20.0),
            1.6,
            90,
            1.5,
            Resources::ZERO,
            5.0,
            250.0,
            0.0,
            vec![],
        ),
        spec(
            ResearchLab,
            12,
            (200.0, 100.0, 100.0),
            1.7,
            180,
            1.6,
            Resources::from_f64(0.0, 0.0, 0.0, 0.0, 10.0),
            20.0,
            0.0,
            15.0,
            vec![(CommandCenter, 2), (EnergyPlant, 2)],
        ),
        spec(
            Factory,
            10,
            (300.0, 150.0, 50.0),
            1.8,
            240,
            1.6,
            Resources::ZERO,
            25.0,
            0.0,
            20.0,
            vec![(CommandCenter, 3)],
        ),
        spec(
            Shipyard,
            10,
            (400.0, 200.0, 100.0),
            1.7,
            300,
            1.6,
            Resources::ZERO,
            30.0,
            0.0,
            20.0,
            vec![(CommandCenter, 3), (Factory, 1)],
        ),
        spec(
            DefenseGrid,
            10,
            (250.0, 200.0, 0.0),
            1.6,
            200,
            1.6,
            Resources::ZERO,
            15.0,
            0.0,
            10.0,
            vec![(Shipyard, 1)],
        ),
    ]
}
