//! Tunable game parameters.
//!
//! Every field has a default so data files only need to list what they
//! change. Plain `f64`/integer fields keep the on-disk format readable;
//! conversion to fixed-point happens where the values are used.

use crate::resources::Resources;
use serde::{Deserialize, Serialize};

/// Errors reported by [`GameConfig::validate`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("{field} must be finite and non-negative, got {value}")]
    Invalid { field: &'static str, value: f64 },
}

/// Global simulation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Tick driver cadence.
    pub tick_interval_ms: u64,
    /// Queue capacity with no command center.
    pub queue_base_size: usize,
    /// Extra queue capacity per command-center level.
    pub queue_bonus_per_level: usize,
    pub max_fleet_size: usize,
    /// Fuel consumed per map unit travelled.
    pub fuel_per_unit: f64,
    /// Logistic growth rate per second.
    pub population_growth_rate: f64,
    /// Population capacity of a planet before any building bonus.
    pub base_population_capacity: f64,
    pub base_slots: u32,
    pub slots_per_size: u32,
    /// Minerals gathered per completed mining run.
    pub mining_yield: u32,
    pub mining_secs: u64,
    pub attack_cooldown_secs: u64,
    pub repair_secs_per_hp: u64,
    /// Settlers a colony ship must carry to found a colony.
    pub settler_requirement: u32,
    /// Capacity of the recent-event ring buffer.
    pub event_history: usize,
    pub world: WorldConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            queue_base_size: 2,
            queue_bonus_per_level: 1,
            max_fleet_size: 20,
            fuel_per_unit: 0.1,
            population_growth_rate: 0.0005,
            base_population_capacity: 100.0,
            base_slots: 4,
            slots_per_size: 2,
            mining_yield: 100,
            mining_secs: 600,
            attack_cooldown_secs: 30,
            repair_secs_per_hp: 2,
            settler_requirement: 50,
            event_history: 1_024,
            world: WorldConfig::default(),
        }
    }
}

impl GameConfig {
    /// Check that every parameter is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::NotPositive {
                field: "tick_interval_ms",
            });
        }
        if self.max_fleet_size == 0 {
            return Err(ConfigError::NotPositive {
                field: "max_fleet_size",
            });
        }
        if self.event_history == 0 {
            return Err(ConfigError::NotPositive {
                field: "event_history",
            });
        }
        if self.queue_base_size == 0 && self.queue_bonus_per_level == 0 {
            return Err(ConfigError::NotPositive {
                field: "queue_base_size",
            });
        }
        for (field, value) in [
            ("fuel_per_unit", self.fuel_per_unit),
            ("population_growth_rate", self.population_growth_rate),
            ("base_population_capacity", self.base_population_capacity),
            ("world.map_width", self.world.map_width),
            ("world.map_height", self.world.map_height),
            ("world.min_planet_distance", self.world.min_planet_distance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid { field, value });
            }
        }
        Ok(())
    }

    /// Construction queue capacity for a given command-center level.
    pub fn queue_capacity(&self, command_center_level: u32) -> usize {
        self.queue_base_size
            .saturating_add(self.queue_bonus_per_level.saturating_mul(command_center_level as usize))
    }

    /// Building slots available on a planet of the given size.
    pub fn max_slots(&self, size: u8) -> u32 {
        self.base_slots
            .saturating_add(self.slots_per_size.saturating_mul(size as u32))
    }
}

/// Parameters for [`crate::worldgen::generate_world`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub planet_count: usize,
    pub map_width: f64,
    pub map_height: f64,
    pub min_planet_distance: f64,
    pub seed: u64,
    pub starting_resources: StartingResources,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            planet_count: 40,
            map_width: 2_000.0,
            map_height: 2_000.0,
            min_planet_distance: 60.0,
            seed: 0x5EED,
            starting_resources: StartingResources::default(),
        }
    }
}

/// Stock a home planet starts with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartingResources {
    pub minerals: f64,
    pub energy: f64,
    pub credits: f64,
    pub population: f64,
}

impl Default for StartingResources {
    fn default() -> Self {
        Self {
            minerals: 1_000.0,
            energy: 500.0,
            credits: 500.0,
            population: 50.0,
        }
    }
}

impl StartingResources {
    pub fn to_resources(&self) -> Resources {
        Resources::from_f64(self.minerals, self.energy, self.credits, self.population, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(GameConfig::default().validate(), Ok(()));
    }

    #[test]
    fn zero_tick_interval_rejected() {
        let config = GameConfig {
            tick_interval_ms: 0,
            ..GameConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::NotPositive {
                field: "tick_interval_ms"
            })
        );
    }

    #[test]
    fn negative_rate_rejected() {
        let config = GameConfig {
            fuel_per_unit: -1.0,
            ..GameConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "fuel_per_unit",
                ..
            })
        ));
    }

    #[test]
    fn queue_capacity_is_monotonic_in_level() {
        let config = GameConfig::default();
        let mut last = config.queue_capacity(0);
        for level in 1..10 {
            let cap = config.queue_capacity(level);
            assert!(cap > last);
            last = cap;
        }
    }

    #[test]
    fn slots_scale_with_size() {
        let config = GameConfig::default();
        assert_eq!(config.max_slots(1), 6);
        assert_eq!(config.max_slots(10), 24);
    }
}
