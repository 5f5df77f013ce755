//! Build requests: validation in front of the construction queue.

use crate::catalog::BuildingType;
use crate::event::Event;
use crate::fixed::Fixed64;
use crate::id::{BuildingId, OrderId, PlanetId, PlayerId};
use crate::planet::Planet;
use crate::queue::{OrderRequest, OrderTarget, QueueError, QueuedOrder};
use crate::resources::Resources;
use crate::time::Timestamp;
use crate::universe::Universe;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A request to construct a new building (`building: None`) or upgrade an
/// existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    pub kind: BuildingType,
    pub target_level: u32,
    pub building: Option<BuildingId>,
}

impl BuildRequest {
    pub fn new_building(kind: BuildingType) -> Self {
        Self {
            kind,
            target_level: 1,
            building: None,
        }
    }

    pub fn upgrade(kind: BuildingType, building: BuildingId, target_level: u32) -> Self {
        Self {
            kind,
            target_level,
            building: Some(building),
        }
    }
}

/// Why a build request was refused. Checked in declaration order.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuildError {
    #[error("planet not found")]
    PlanetNotFound,

    #[error("planet is owned by {owner:?}")]
    NotOwner { owner: Option<PlayerId> },

    #[error("{kind}: requested level {requested}, next level is {expected}")]
    InvalidLevel {
        kind: BuildingType,
        requested: u32,
        expected: u32,
    },

    #[error("{kind} is already at or queued to its max level {max}")]
    MaxLevel { kind: BuildingType, max: u32 },

    #[error("building not found on this planet")]
    BuildingNotFound,

    #[error("building is a {actual}, not a {requested}")]
    WrongBuildingType {
        requested: BuildingType,
        actual: BuildingType,
    },

    #[error("a {0} already exists or is queued on this planet")]
    AlreadyBuilt(BuildingType),

    #[error("no free building slot ({max_slots} slots)")]
    NoFreeSlot { max_slots: u32 },

    #[error("requires {required} level {level} (current {current})")]
    MissingPrerequisite {
        required: BuildingType,
        level: u32,
        current: u32,
    },

    #[error("needs {required} workers, population is {available}")]
    InsufficientWorkers { required: Fixed64, available: Fixed64 },

    #[error("missing resources: {missing}")]
    InsufficientResources { missing: Resources },

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Building types limited to one per planet.
fn is_unique(kind: BuildingType) -> bool {
    kind == BuildingType::CommandCenter
}

impl Universe {
    /// Validate and accept a build request.
    ///
    /// On success the cost is deducted and the order is queued. An order
    /// that becomes active immediately raises `OrderStarted` and marks an
    /// upgraded building as upgrading.
    pub fn enqueue_build(
        &mut self,
        player: PlayerId,
        planet_id: PlanetId,
        request: BuildRequest,
        now: Timestamp,
    ) -> Result<QueuedOrder, BuildError> {
        let planet = self
            .planets
            .get(planet_id)
            .ok_or(BuildError::PlanetNotFound)?;
        if !planet.is_owned_by(player) {
            return Err(BuildError::NotOwner {
                owner: planet.owner,
            });
        }
        let target = self.validate_target(planet, &request)?;
        self.check_prerequisites(planet, request.kind)?;
        self.check_workers(planet, request.kind, request.target_level)?;

        let cost = self.catalog.spec(request.kind).cost_at(request.target_level);
        let speed_bonus_level = planet.level_of(BuildingType::Factory);

        let planet = self
            .planets
            .get_mut(planet_id)
            .ok_or(BuildError::PlanetNotFound)?;
        planet
            .stock
            .try_spend(&cost)
            .map_err(|missing| BuildError::InsufficientResources { missing })?;
        let order = match planet.queue.enqueue(
            &self.catalog,
            OrderRequest {
                kind: request.kind,
                target_level: request.target_level,
                cost,
                speed_bonus_level,
                target,
            },
            now,
        ) {
            Ok(order) => order,
            Err(e) => {
                planet.stock = planet.stock.plus(&cost);
                return Err(e.into());
            }
        };

        debug!(
            target: "starhold::queue",
            planet = ?planet_id,
            order = ?order.id,
            kind = %order.kind,
            level = order.target_level,
            completion = order.completion,
            "order accepted"
        );
        if planet.queue.active().is_some_and(|a| a.id == order.id) {
            planet.sync_upgrade_marker();
            self.pending_events.push(Event::OrderStarted {
                planet: planet_id,
                order: order.id,
                kind: order.kind,
                target_level: order.target_level,
                completion: order.completion,
                at: now,
            });
        }
        Ok(order)
    }

    /// Cancel a waiting order and refund its cost snapshot. Returns the
    /// refunded amount.
    pub fn cancel_build(
        &mut self,
        player: PlayerId,
        planet_id: PlanetId,
        order: OrderId,
    ) -> Result<Resources, BuildError> {
        let planet = self
            .planets
            .get_mut(planet_id)
            .ok_or(BuildError::PlanetNotFound)?;
        if !planet.is_owned_by(player) {
            return Err(BuildError::NotOwner {
                owner: planet.owner,
            });
        }
        let removed = planet.queue.cancel(order)?;
        planet.stock = planet.stock.plus(&removed.cost);
        debug!(target: "starhold::queue", planet = ?planet_id, ?order, refund = %removed.cost, "order cancelled");
        Ok(removed.cost)
    }

    /// Level and slot rules. Returns what the order will produce.
    fn validate_target(&self, planet: &Planet, request: &BuildRequest) -> Result<OrderTarget, BuildError> {
        let spec = self.catalog.spec(request.kind);
        match request.building {
            None => {
                if request.target_level != 1 {
                    return Err(BuildError::InvalidLevel {
                        kind: request.kind,
                        requested: request.target_level,
                        expected: 1,
                    });
                }
                if is_unique(request.kind)
                    && (planet.has_building(request.kind) || planet.queue.pending_new_of(request.kind))
                {
                    return Err(BuildError::AlreadyBuilt(request.kind));
                }
                let max_slots = self.config.max_slots(planet.size);
                let slot = planet
                    .free_slot(max_slots)
                    .ok_or(BuildError::NoFreeSlot { max_slots })?;
                Ok(OrderTarget::NewBuilding { slot })
            }
            Some(id) => {
                let building = planet.building(id).ok_or(BuildError::BuildingNotFound)?;
                if building.kind != request.kind {
                    return Err(BuildError::WrongBuildingType {
                        requested: request.kind,
                        actual: building.kind,
                    });
                }
                let current = planet.queue.pending_level(id).unwrap_or(building.level);
                if current >= spec.max_level {
                    return Err(BuildError::MaxLevel {
                        kind: request.kind,
                        max: spec.max_level,
                    });
                }
                let expected = current + 1;
                if request.target_level != expected {
                    return Err(BuildError::InvalidLevel {
                        kind: request.kind,
                        requested: request.target_level,
                        expected,
                    });
                }
                Ok(OrderTarget::Upgrade { building: id })
            }
        }
    }

    fn check_prerequisites(&self, planet: &Planet, kind: BuildingType) -> Result<(), BuildError> {
        for &(required, level) in &self.catalog.spec(kind).prerequisites {
            let current = planet.level_of(required);
            if current < level {
                return Err(BuildError::MissingPrerequisite {
                    required,
                    level,
                    current,
                });
            }
        }
        Ok(())
    }

    /// Population must staff every standing building, every pending order
    /// and the new level.
    fn check_workers(&self, planet: &Planet, kind: BuildingType, level: u32) -> Result<(), BuildError> {
        let step = |kind: BuildingType, level: u32| {
            let spec = self.catalog.spec(kind);
            spec.workers_at(level)
                .saturating_sub(spec.workers_at(level.saturating_sub(1)))
        };
        let required = planet
            .queue
            .orders()
            .fold(planet.required_workers(&self.catalog), |acc, o| {
                acc.saturating_add(step(o.kind, o.target_level))
            })
            .saturating_add(step(kind, level));
        let available = planet.stock.population;
        if required > available {
            return Err(BuildError::InsufficientWorkers { required, available });
        }
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::building::UpgradeState;
    use crate::catalog::Catalog;
    use crate::config::GameConfig;
    use crate::fixed::f64_to_fixed64;
    use crate::movement::Position;

    const ME: PlayerId = PlayerId(1);

    fn home() -> (Universe, PlanetId) {
        let mut u = Universe::new(GameConfig::default(), Catalog::default()).unwrap();
        let p = u.add_planet("Home", Position::default(), 5, 0);
        u.set_owner(p, Some(ME));
        u.place_building(p, BuildingType::CommandCenter, 1).unwrap();
        u.planet_mut(p).unwrap().stock = Resources::from_f64(1_000.0, 500.0, 500.0, 50.0, 0.0);
        (u, p)
    }

    fn mine() -> BuildRequest {
        BuildRequest::new_building(BuildingType::MetalMine)
    }

    #[test]
    fn accepted_order_deducts_cost_and_starts() {
        let (mut u, p) = home();
        let order = u.enqueue_build(ME, p, mine(), 0).unwrap();
        assert_eq!(order.completion, 60_000);
        let stock = &u.planet(p).unwrap().stock;
        assert_eq!(stock.minerals, f64_to_fixed64(940.0));
        assert_eq!(stock.energy, f64_to_fixed64(485.0));

        let report = u.step(1);
        assert!(matches!(report.events[0], Event::OrderStarted { completion: 60_000, .. }));
        let report = u.step(60_000);
        assert!(report.events.iter().any(|e| matches!(
            e,
            Event::OrderCompleted {
                kind: BuildingType::MetalMine,
                level: 1,
                ..
            }
        )));
        assert_eq!(u.planet(p).unwrap().level_of(BuildingType::MetalMine), 1);
    }

    #[test]
    fn second_order_chains_behind_first() {
        let (mut u, p) = home();
        let a = u.enqueue_build(ME, p, mine(), 0).unwrap();
        let b = u
            .enqueue_build(ME, p, BuildRequest::new_building(BuildingType::EnergyPlant), 0)
            .unwrap();
        assert_eq!(b.start, a.completion);
        assert_eq!(b.position, 0);
        // base 2 + 1 per command-center level
        u.enqueue_build(ME, p, BuildRequest::new_building(BuildingType::Habitat), 0)
            .unwrap();
        assert_eq!(
            u.enqueue_build(ME, p, mine(), 0),
            Err(BuildError::Queue(QueueError::QueueFull { capacity: 3 }))
        );
    }

    #[test]
    fn queue_full_spends_nothing() {
        let (mut u, p) = home();
        u.enqueue_build(ME, p, mine(), 0).unwrap();
        u.enqueue_build(ME, p, mine(), 0).unwrap();
        u.enqueue_build(ME, p, mine(), 0).unwrap();
        let before = u.planet(p).unwrap().stock;
        assert!(u.enqueue_build(ME, p, mine(), 0).is_err());
        assert_eq!(u.planet(p).unwrap().stock, before);
    }

    #[test]
    fn validation_order() {
        let (mut u, p) = home();
        assert!(matches!(
            u.enqueue_build(PlayerId(9), p, mine(), 0),
            Err(BuildError::NotOwner { owner: Some(ME) })
        ));
        assert!(matches!(
            u.enqueue_build(
                ME,
                p,
                BuildRequest {
                    target_level: 2,
                    ..mine()
                },
                0
            ),
            Err(BuildError::InvalidLevel { expected: 1, .. })
        ));
        assert_eq!(
            u.enqueue_build(ME, p, BuildRequest::new_building(BuildingType::CommandCenter), 0),
            Err(BuildError::AlreadyBuilt(BuildingType::CommandCenter))
        );
        assert_eq!(
            u.enqueue_build(ME, p, BuildRequest::new_building(BuildingType::Factory), 0),
            Err(BuildError::MissingPrerequisite {
                required: BuildingType::CommandCenter,
                level: 3,
                current: 1
            })
        );

        u.planet_mut(p).unwrap().stock.minerals = f64_to_fixed64(10.0);
        assert!(matches!(
            u.enqueue_build(ME, p, mine(), 0),
            Err(BuildError::InsufficientResources { missing }) if missing.minerals == f64_to_fixed64(50.0)
        ));
    }

    #[test]
    fn workers_limit_construction() {
        let (mut u, p) = home();
        u.planet_mut(p).unwrap().stock.population = f64_to_fixed64(7.0);
        u.enqueue_build(ME, p, mine(), 0).unwrap();
        // second mine would need 10 workers
        assert!(matches!(
            u.enqueue_build(ME, p, mine(), 0),
            Err(BuildError::InsufficientWorkers { .. })
        ));
    }

    #[test]
    fn no_free_slot() {
        let (mut u, p) = home();
        let max = u.config().max_slots(5);
        for _ in 1..max {
            u.place_building(p, BuildingType::Habitat, 1).unwrap();
        }
        assert_eq!(
            u.enqueue_build(ME, p, mine(), 0),
            Err(BuildError::NoFreeSlot { max_slots: max })
        );
    }

    #[test]
    fn upgrade_levels_follow_pending_orders() {
        let (mut u, p) = home();
        let b = u.place_building(p, BuildingType::MetalMine, 1).unwrap();
        let up = |level| BuildRequest::upgrade(BuildingType::MetalMine, b, level);

        assert!(matches!(
            u.enqueue_build(ME, p, up(3), 0),
            Err(BuildError::InvalidLevel { expected: 2, .. })
        ));
        let first = u.enqueue_build(ME, p, up(2), 0).unwrap();
        assert_eq!(first.duration_secs, 90);
        assert!(matches!(
            u.planet(p).unwrap().building(b).unwrap().upgrade,
            UpgradeState::Upgrading { target_level: 2, until: 90_000 }
        ));
        u.enqueue_build(ME, p, up(3), 0).unwrap();

        assert_eq!(
            u.enqueue_build(ME, p, BuildRequest::upgrade(BuildingType::Habitat, b, 4), 0),
            Err(BuildError::WrongBuildingType {
                requested: BuildingType::Habitat,
                actual: BuildingType::MetalMine
            })
        );
    }

    #[test]
    fn max_level_refused() {
        let (mut u, p) = home();
        let b = u.place_building(p, BuildingType::MetalMine, 20).unwrap();
        assert_eq!(
            u.enqueue_build(ME, p, BuildRequest::upgrade(BuildingType::MetalMine, b, 21), 0),
            Err(BuildError::MaxLevel {
                kind: BuildingType::MetalMine,
                max: 20
            })
        );
    }

    #[test]
    fn factory_speeds_up_builds() {
        let (mut u, p) = home();
        u.place_building(p, BuildingType::Factory, 5).unwrap();
        u.planet_mut(p).unwrap().stock.population = f64_to_fixed64(200.0);
        let order = u.enqueue_build(ME, p, mine(), 0).unwrap();
        assert_eq!(order.duration_secs, 40);
    }

    #[test]
    fn cancel_refunds_cost() {
        let (mut u, p) = home();
        let active = u.enqueue_build(ME, p, mine(), 0).unwrap();
        let waiting = u.enqueue_build(ME, p, mine(), 0).unwrap();
        let before = u.planet(p).unwrap().stock;

        let refund = u.cancel_build(ME, p, waiting.id).unwrap();
        assert_eq!(refund, Resources::cost(60.0, 15.0, 0.0));
        assert_eq!(u.planet(p).unwrap().stock, before.plus(&refund));
        assert_eq!(
            u.cancel_build(ME, p, active.id),
            Err(BuildError::Queue(QueueError::OrderActive(active.id)))
        );
        assert_eq!(
            u.cancel_build(ME, p, waiting.id),
            Err(BuildError::Queue(QueueError::OrderNotFound(waiting.id)))
        );
    }

    fn level_history(u: &mut Universe, p: PlanetId, b: BuildingId) -> Vec<u32> {
        let mut levels = vec![u.planet(p).unwrap().building(b).unwrap().level];
        for t in 1..=200 {
            let report = u.step(t * 10_000);
            assert!(report.faults.is_empty(), "{:?}", report.faults);
            let level = u.planet(p).unwrap().building(b).unwrap().level;
            if levels.last() != Some(&level) {
                levels.push(level);
            }
        }
        levels
    }

    #[test]
    fn cancelling_a_middle_upgrade_never_skips_a_level() {
        let (mut u, p) = home();
        u.planet_mut(p).unwrap().stock =
            Resources::from_f64(100_000.0, 100_000.0, 100_000.0, 1_000.0, 0.0);
        let b = u.place_building(p, BuildingType::MetalMine, 1).unwrap();
        let up = |level| BuildRequest::upgrade(BuildingType::MetalMine, b, level);
        u.enqueue_build(ME, p, up(2), 0).unwrap();
        let third = u.enqueue_build(ME, p, up(3), 0).unwrap();
        let fourth = u.enqueue_build(ME, p, up(4), 0).unwrap();

        assert_eq!(
            u.cancel_build(ME, p, third.id),
            Err(BuildError::Queue(QueueError::LaterUpgradeQueued {
                order: third.id,
                blocking: fourth.id
            }))
        );
        // Unwinding from the back is allowed.
        u.cancel_build(ME, p, fourth.id).unwrap();
        u.cancel_build(ME, p, third.id).unwrap();

        assert_eq!(level_history(&mut u, p, b), vec![1, 2]);
    }

    #[test]
    fn chained_upgrades_raise_one_level_at_a_time() {
        let (mut u, p) = home();
        u.planet_mut(p).unwrap().stock =
            Resources::from_f64(100_000.0, 100_000.0, 100_000.0, 1_000.0, 0.0);
        let b = u.place_building(p, BuildingType::MetalMine, 1).unwrap();
        for level in 2..=4 {
            u.enqueue_build(ME, p, BuildRequest::upgrade(BuildingType::MetalMine, b, level), 0)
                .unwrap();
        }
        assert_eq!(level_history(&mut u, p, b), vec![1, 2, 3, 4]);
    }
}
