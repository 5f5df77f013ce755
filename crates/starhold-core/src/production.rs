//! Per-planet resource production integrator.
//!
//! Each tick converts building levels into per-hour rates and integrates
//! them over the elapsed time since the planet was last integrated.
//!
//! Energy is special. When upkeep exceeds generation, every non-energy
//! output is scaled by `generation / upkeep` and the stored energy is left
//! as is (the applied energy delta is clamped at zero). The
//! [`ProductionReport`] still shows the true, possibly negative, net rate.

use crate::catalog::Catalog;
use crate::config::GameConfig;
use crate::fixed::{Fixed64, f64_to_fixed64};
use crate::id::{BuildingId, PlanetId};
use crate::planet::Planet;
use crate::resources::{ResourceKind, Resources};
use crate::time::{MILLIS_PER_SECOND, Timestamp};
use serde::{Deserialize, Serialize};

const SECS_PER_HOUR: i32 = 3_600;

/// Production rates of one planet at a moment in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionReport {
    pub planet: PlanetId,
    /// Output per hour of all working buildings, before upkeep.
    pub gross_per_hour: Resources,
    pub energy_upkeep_per_hour: Fixed64,
    /// Net per hour after upkeep and deficit scaling. Energy may be negative.
    pub net_per_hour: Resources,
    /// 1 when energy covers upkeep, `generation / upkeep` otherwise.
    pub efficiency: Fixed64,
    pub population_capacity: Fixed64,
    pub required_workers: Fixed64,
}

impl ProductionReport {
    pub fn has_energy_deficit(&self) -> bool {
        self.efficiency < Fixed64::ONE
    }
}

/// What one integration step changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrationOutcome {
    /// Buildings whose upgrade finished, with their new level.
    pub upgraded: Vec<(BuildingId, u32)>,
    /// Amount added to the stock (after flooring).
    pub delta: Resources,
}

/// Current rates for `planet`. Unowned planets produce nothing.
pub fn production_report(planet: &Planet, catalog: &Catalog, config: &GameConfig) -> ProductionReport {
    let mut gross = Resources::ZERO;
    let mut upkeep = Fixed64::ZERO;

    if planet.owner.is_some() {
        for building in planet.buildings.iter().filter(|b| !b.is_upgrading()) {
            let spec = catalog.spec(building.kind);
            gross = gross.plus(&spec.production_at(building.level));
            upkeep = upkeep.saturating_add(spec.upkeep_at(building.level));
        }
    }

    let generation = gross.energy;
    let efficiency = if upkeep > generation && upkeep > Fixed64::ZERO {
        generation.checked_div(upkeep).unwrap_or(Fixed64::ZERO)
    } else {
        Fixed64::ONE
    };

    let mut net = gross.scaled(efficiency);
    net.energy = generation.saturating_sub(upkeep);

    ProductionReport {
        planet: planet.id,
        gross_per_hour: gross,
        energy_upkeep_per_hour: upkeep,
        net_per_hour: net,
        efficiency,
        population_capacity: planet.population_capacity(catalog, config),
        required_workers: planet.required_workers(catalog),
    }
}

/// Advance one planet to `now`.
///
/// 1. Finish building upgrades that are due.
/// 2. Add `rate × dt / 3600` of every resource, energy deficit clamped.
/// 3. Grow population logistically toward capacity.
///
/// A `now` earlier than the last integration is treated as zero elapsed
/// time, so calling twice with the same `now` changes nothing the second
/// time.
pub fn integrate(
    planet: &mut Planet,
    catalog: &Catalog,
    config: &GameConfig,
    now: Timestamp,
) -> IntegrationOutcome {
    let mut outcome = IntegrationOutcome::default();

    for building in &mut planet.buildings {
        if let Some(level) = building.complete_upgrade_if_due(now) {
            outcome.upgraded.push((building.id, level));
        }
    }

    let elapsed_ms = now.saturating_sub(planet.last_produced);
    planet.last_produced = planet.last_produced.max(now);
    if elapsed_ms == 0 || planet.owner.is_none() {
        return outcome;
    }
    let dt_secs = elapsed_secs(elapsed_ms);
    let dt_hours = dt_secs
        .checked_div(Fixed64::from_num(SECS_PER_HOUR))
        .unwrap_or(Fixed64::ZERO);

    let report = production_report(planet, catalog, config);
    let hours = |rate: Fixed64| rate.saturating_mul(dt_hours);

    let before = planet.stock;
    for kind in ResourceKind::ALL {
        let rate = report.net_per_hour.get(kind);
        let rate = if kind == ResourceKind::Energy {
            rate.max(Fixed64::ZERO)
        } else {
            rate
        };
        let slot = planet.stock.get_mut(kind);
        *slot = slot.saturating_add(hours(rate));
    }
    planet.stock.floor_zero();

    grow_population(
        &mut planet.stock.population,
        report.population_capacity,
        f64_to_fixed64(config.population_growth_rate),
        dt_secs,
    );

    for kind in ResourceKind::ALL {
        *outcome.delta.get_mut(kind) = planet.stock.get(kind).saturating_sub(before.get(kind));
    }
    outcome
}

/// Milliseconds to fractional seconds without overflowing the integer part
/// for long gaps.
fn elapsed_secs(elapsed_ms: u64) -> Fixed64 {
    let whole = Fixed64::saturating_from_num(elapsed_ms / MILLIS_PER_SECOND);
    let frac = Fixed64::from_num(elapsed_ms % MILLIS_PER_SECOND)
        .checked_div(Fixed64::from_num(MILLIS_PER_SECOND))
        .unwrap_or(Fixed64::ZERO);
    whole.saturating_add(frac)
}

/// Logistic step: `growth = rate × pop × (1 − pop/capacity) × dt`, capped at
/// capacity. Population over capacity is clamped down.
pub fn grow_population(population: &mut Fixed64, capacity: Fixed64, rate: Fixed64, dt_secs: Fixed64) {
    if capacity <= Fixed64::ZERO {
        *population = Fixed64::ZERO;
        return;
    }
    if *population >= capacity {
        *population = capacity;
        return;
    }
    let fill = population.checked_div(capacity).unwrap_or(Fixed64::ONE);
    let growth = rate
        .saturating_mul(*population)
        .saturating_mul(Fixed64::ONE - fill)
        .saturating_mul(dt_secs);
    *population = population.saturating_add(growth).min(capacity).max(Fixed64::ZERO);
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::building::UpgradeState;
    use crate::catalog::BuildingType;
    use crate::fixed::fixed64_to_f64;
    use crate::id::PlayerId;
    use crate::movement::Position;
    use slotmap::SlotMap;

    fn owned_planet() -> Planet {
        let mut keys = SlotMap::<PlanetId, ()>::with_key();
        let mut p = Planet::new(keys.insert(()), "Ceres", Position::default(), 5);
        p.owner = Some(PlayerId(1));
        p
    }

    fn approx(a: Fixed64, b: f64) -> bool {
        (fixed64_to_f64(a) - b).abs() < 1e-3
    }

    #[test]
    fn mine_produces_per_hour() {
        let catalog = Catalog::default();
        let config = GameConfig::default();
        let mut p = owned_planet();
        p.add_building(BuildingType::MetalMine, 1, 0);
        p.add_building(BuildingType::EnergyPlant, 1, 1);

        integrate(&mut p, &catalog, &config, 3_600_000);
        assert!(approx(p.stock.minerals, 30.0));
        // 40 generated, 10 upkeep
        assert!(approx(p.stock.energy, 30.0));
    }

    #[test]
    fn deficit_scales_output_and_keeps_energy() {
        let catalog = Catalog::default();
        let config = GameConfig::default();
        let mut p = owned_planet();
        p.stock.energy = f64_to_fixed64(50.0);
        // Upkeep 10, no generation.
        p.add_building(BuildingType::MetalMine, 1, 0);

        let report = production_report(&p, &catalog, &config);
        assert!(report.has_energy_deficit());
        assert!(approx(report.net_per_hour.energy, -10.0));

        integrate(&mut p, &catalog, &config, 3_600_000);
        assert!(approx(p.stock.minerals, 0.0));
        assert!(approx(p.stock.energy, 50.0));
    }

    #[test]
    fn partial_deficit_scales_proportionally() {
        let catalog = Catalog::default();
        let config = GameConfig::default();
        let mut p = owned_planet();
        // 5 mines: upkeep 50, plant gives 40 => efficiency 0.8
        for slot in 0..5 {
            p.add_building(BuildingType::MetalMine, 1, slot);
        }
        p.add_building(BuildingType::EnergyPlant, 1, 5);
        let report = production_report(&p, &catalog, &config);
        assert!(approx(report.efficiency, 0.8));
        assert!(approx(report.net_per_hour.minerals, 120.0));
    }

    #[test]
    fn upgrading_building_produces_nothing() {
        let catalog = Catalog::default();
        let config = GameConfig::default();
        let mut p = owned_planet();
        let id = p.add_building(BuildingType::EnergyPlant, 1, 0);
        p.building_mut(id).unwrap().upgrade = UpgradeState::Upgrading {
            target_level: 2,
            until: 10_000_000,
        };
        let report = production_report(&p, &catalog, &config);
        assert!(report.gross_per_hour.is_zero());
    }

    #[test]
    fn upgrade_completes_during_integration() {
        let catalog = Catalog::default();
        let config = GameConfig::default();
        let mut p = owned_planet();
        let id = p.add_building(BuildingType::EnergyPlant, 1, 0);
        p.building_mut(id).unwrap().upgrade = UpgradeState::Upgrading {
            target_level: 2,
            until: 1_000,
        };
        let outcome = integrate(&mut p, &catalog, &config, 1_000);
        assert_eq!(outcome.upgraded, vec![(id, 2)]);
        assert_eq!(p.building(id).unwrap().level, 2);
    }

    #[test]
    fn unowned_planet_is_static() {
        let catalog = Catalog::default();
        let config = GameConfig::default();
        let mut p = owned_planet();
        p.owner = None;
        p.add_building(BuildingType::MetalMine, 3, 0);
        p.stock.population = f64_to_fixed64(10.0);
        let before = p.stock;
        integrate(&mut p, &catalog, &config, 3_600_000);
        assert_eq!(p.stock, before);
    }

    #[test]
    fn same_now_twice_is_a_no_op() {
        let catalog = Catalog::default();
        let config = GameConfig::default();
        let mut p = owned_planet();
        p.add_building(BuildingType::CommandCenter, 1, 0);
        integrate(&mut p, &catalog, &config, 60_000);
        let after_first = p.stock;
        let outcome = integrate(&mut p, &catalog, &config, 60_000);
        assert_eq!(p.stock, after_first);
        assert!(outcome.delta.is_zero());
    }

    #[test]
    fn population_grows_toward_capacity() {
        let mut pop = f64_to_fixed64(50.0);
        let cap = f64_to_fixed64(100.0);
        let rate = f64_to_fixed64(0.01);
        grow_population(&mut pop, cap, rate, f64_to_fixed64(1.0));
        // 0.01 × 50 × 0.5 × 1 = 0.25
        assert!(approx(pop, 50.25));
        for _ in 0..100_000 {
            grow_population(&mut pop, cap, rate, f64_to_fixed64(10.0));
        }
        assert!(pop <= cap);
    }

    #[test]
    fn population_over_capacity_clamped() {
        let mut pop = f64_to_fixed64(500.0);
        grow_population(
            &mut pop,
            f64_to_fixed64(100.0),
            f64_to_fixed64(0.01),
            f64_to_fixed64(1.0),
        );
        assert_eq!(pop, f64_to_fixed64(100.0));
    }

    #[test]
    fn stock_never_negative() {
        let catalog = Catalog::default();
        let config = GameConfig::default();
        let mut p = owned_planet();
        for slot in 0..4 {
            p.add_building(BuildingType::ResearchLab, 2, slot);
        }
        for step in 1..20 {
            integrate(&mut p, &catalog, &config, step * 600_000);
            assert!(p.stock.is_non_negative());
        }
    }
}
