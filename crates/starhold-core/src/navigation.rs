//! Ship and fleet movement: move requests, recalls and arrival detection.
//!
//! Every ship with a movement in progress is registered in the universe's
//! in-flight set; every moving fleet in the fleet in-flight set. The
//! movement tick only looks at those sets and removes an entity on
//! arrival, so a repeated `now` never produces a second arrival.
//!
//! A recall (cancelled movement) returns the mover to its origin planet at
//! once. Together with the rule that a move needs a current planet, this
//! keeps every ship that is neither moving nor destroyed docked somewhere.

use crate::event::Event;
use crate::fleet::FleetLocation;
use crate::id::{FleetId, PlanetId, PlayerId, ShipId};
use crate::movement::{Movement, MovementError, MovementView, Mover, calculate_travel};
use crate::ship::ShipActivity;
use crate::sim::{SimFault, TickReport};
use crate::time::Timestamp;
use crate::universe::Universe;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

/// Successful move request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveOutcome {
    pub movement: Movement,
    /// The destination is hostile and the mover accepted combat.
    pub combat: bool,
}

impl Universe {
    /// Send a docked, idle ship to `destination`.
    ///
    /// Checks, in order: the ship exists and belongs to `player`, is not
    /// destroyed, is not in a fleet, is not already moving, is not busy, has
    /// a current planet; the destination exists and differs from the origin;
    /// a hostile destination needs `allow_combat`.
    pub fn move_ship(
        &mut self,
        player: PlayerId,
        ship_id: ShipId,
        destination: PlanetId,
        allow_combat: bool,
        now: Timestamp,
    ) -> Result<MoveOutcome, MovementError> {
        let ship = self.ships.get(ship_id).ok_or(MovementError::ShipNotFound)?;
        if ship.owner != player {
            return Err(MovementError::NotOwner);
        }
        let origin = match &ship.activity {
            ShipActivity::Destroyed => return Err(MovementError::ShipDestroyed),
            _ if ship.fleet.is_some() => return Err(MovementError::ShipInFleet),
            ShipActivity::Moving(_) => return Err(MovementError::AlreadyMoving),
            ShipActivity::Mining { .. }
            | ShipActivity::Attacking { .. }
            | ShipActivity::Repairing { .. } => {
                return Err(MovementError::ShipBusy {
                    activity: ship.status().name(),
                });
            }
            ShipActivity::Docked { planet } => *planet,
        };
        let speed = ship.stats().speed;
        let owner = ship.owner;

        let movement = self.plan_movement(owner, origin, destination, speed, allow_combat, now)?;
        let outcome = MoveOutcome {
            combat: movement.combat,
            movement: movement.clone(),
        };

        if let Some(ship) = self.ships.get_mut(ship_id) {
            ship.activity = ShipActivity::Moving(movement);
        }
        self.in_flight_ships.insert(ship_id);
        debug!(
            target: "starhold::movement",
            ship = ?ship_id,
            ?origin,
            ?destination,
            arrives_at = outcome.movement.arrives_at,
            combat = outcome.combat,
            "ship departed"
        );
        Ok(outcome)
    }

    /// Recall a moving ship to its origin planet.
    pub fn cancel_movement(
        &mut self,
        player: PlayerId,
        ship_id: ShipId,
    ) -> Result<PlanetId, MovementError> {
        let ship = self
            .ships
            .get_mut(ship_id)
            .ok_or(MovementError::ShipNotFound)?;
        if ship.owner != player {
            return Err(MovementError::NotOwner);
        }
        if ship.fleet.is_some() {
            return Err(MovementError::ShipInFleet);
        }
        let ShipActivity::Moving(movement) = &ship.activity else {
            return Err(MovementError::NotMoving);
        };
        let origin = movement.origin;
        ship.activity = ShipActivity::Docked { planet: origin };
        self.in_flight_ships.remove(&ship_id);
        debug!(target: "starhold::movement", ship = ?ship_id, ?origin, "ship recalled");
        Ok(origin)
    }

    /// Move every member of a docked fleet at the speed of its slowest ship.
    ///
    /// Travel is computed once and the same movement is stored on every
    /// member and mirrored on the fleet.
    pub fn move_fleet(
        &mut self,
        player: PlayerId,
        fleet_id: FleetId,
        destination: PlanetId,
        allow_combat: bool,
        now: Timestamp,
    ) -> Result<MoveOutcome, MovementError> {
        let fleet = self
            .fleets
            .get(fleet_id)
            .ok_or(MovementError::FleetNotFound)?;
        if fleet.owner != player {
            return Err(MovementError::NotOwner);
        }
        let origin = match fleet.location {
            FleetLocation::Docked { planet } => planet,
            FleetLocation::Moving(_) => return Err(MovementError::AlreadyMoving),
        };

        let mut speed = f64::INFINITY;
        for &member in &fleet.members {
            let ship = self.ships.get(member).ok_or(MovementError::ShipNotFound)?;
            match ship.activity {
                ShipActivity::Docked { planet } if planet == origin => {}
                ShipActivity::Docked { .. } => return Err(MovementError::NoOrigin),
                ShipActivity::Destroyed => return Err(MovementError::ShipDestroyed),
                ShipActivity::Moving(_) => return Err(MovementError::AlreadyMoving),
                _ => {
                    return Err(MovementError::ShipBusy {
                        activity: ship.status().name(),
                    });
                }
            }
            speed = speed.min(ship.stats().speed);
        }
        let owner = fleet.owner;
        let members = fleet.members.clone();

        let movement = self.plan_movement(owner, origin, destination, speed, allow_combat, now)?;

        for member in &members {
            if let Some(ship) = self.ships.get_mut(*member) {
                ship.activity = ShipActivity::Moving(movement.clone());
                self.in_flight_ships.insert(*member);
            }
        }
        if let Some(fleet) = self.fleets.get_mut(fleet_id) {
            fleet.location = FleetLocation::Moving(movement.clone());
        }
        self.in_flight_fleets.insert(fleet_id);

        debug!(
            target: "starhold::movement",
            fleet = ?fleet_id,
            members = members.len(),
            speed,
            arrives_at = movement.arrives_at,
            "fleet departed"
        );
        Ok(MoveOutcome {
            combat: movement.combat,
            movement,
        })
    }

    /// Recall a moving fleet. Every member returns to the shared origin.
    pub fn cancel_fleet_movement(
        &mut self,
        player: PlayerId,
        fleet_id: FleetId,
    ) -> Result<PlanetId, MovementError> {
        let fleet = self
            .fleets
            .get_mut(fleet_id)
            .ok_or(MovementError::FleetNotFound)?;
        if fleet.owner != player {
            return Err(MovementError::NotOwner);
        }
        let FleetLocation::Moving(movement) = &fleet.location else {
            return Err(MovementError::NotMoving);
        };
        let origin = movement.origin;
        fleet.location = FleetLocation::Docked { planet: origin };
        let members = fleet.members.clone();
        self.in_flight_fleets.remove(&fleet_id);

        for member in members {
            if let Some(ship) = self.ships.get_mut(member)
                && ship.is_moving()
            {
                ship.activity = ShipActivity::Docked { planet: origin };
            }
            self.in_flight_ships.remove(&member);
        }
        debug!(target: "starhold::movement", fleet = ?fleet_id, ?origin, "fleet recalled");
        Ok(origin)
    }

    /// Validate a destination and compute the movement. Shared by ships and
    /// fleets so both follow the same rules.
    fn plan_movement(
        &self,
        owner: PlayerId,
        origin: PlanetId,
        destination: PlanetId,
        speed: f64,
        allow_combat: bool,
        now: Timestamp,
    ) -> Result<Movement, MovementError> {
        let from = self.planets.get(origin).ok_or(MovementError::NoOrigin)?;
        let to = self
            .planets
            .get(destination)
            .ok_or(MovementError::DestinationNotFound)?;
        if origin == destination {
            return Err(MovementError::SameAsOrigin);
        }
        let hostile = to.owner.filter(|&o| o != owner);
        if let Some(enemy) = hostile
            && !allow_combat
        {
            return Err(MovementError::CombatRequired {
                enemy_planet_id: destination,
                owner: enemy,
            });
        }
        let plan = calculate_travel(from.position, to.position, speed, self.config.fuel_per_unit)?;
        Ok(Movement::new(
            origin,
            from.position,
            destination,
            to.position,
            &plan,
            now,
            hostile.is_some(),
        ))
    }

    /// Dock every in-flight ship, then fleet, whose arrival time has passed.
    pub(crate) fn tick_movements(&mut self, now: Timestamp, report: &mut TickReport) {
        let ships: Vec<ShipId> = self.in_flight_ships.iter().copied().collect();
        for ship_id in ships {
            let Some(ship) = self.ships.get_mut(ship_id) else {
                self.in_flight_ships.remove(&ship_id);
                continue;
            };
            let ShipActivity::Moving(movement) = &ship.activity else {
                warn!(target: "starhold::movement", ship = ?ship_id, "in-flight ship is not moving");
                report.faults.push(SimFault::StaleInFlight { ship: ship_id });
                self.in_flight_ships.remove(&ship_id);
                continue;
            };
            if !movement.has_arrived(now) {
                continue;
            }
            let destination = movement.destination;
            let combat = movement.combat;
            if !self.planets.contains_key(destination) {
                let origin = movement.origin;
                report.faults.push(SimFault::MissingDestination {
                    mover: Mover::Ship(ship_id),
                    planet: destination,
                });
                self.in_flight_ships.remove(&ship_id);
                if self.planets.contains_key(origin) {
                    warn!(target: "starhold::movement", ship = ?ship_id, ?destination, ?origin, "destination vanished, ship returned to origin");
                    ship.activity = ShipActivity::Docked { planet: origin };
                } else {
                    error!(target: "starhold::movement", ship = ?ship_id, ?destination, ?origin, "destination and origin vanished, ship stranded");
                }
                continue;
            }
            ship.activity = ShipActivity::Docked {
                planet: destination,
            };
            self.in_flight_ships.remove(&ship_id);
            debug!(target: "starhold::movement", ship = ?ship_id, ?destination, "ship arrived");
            report.events.push(Event::ShipArrived {
                ship: ship_id,
                planet: destination,
                combat,
                at: now,
            });
        }

        let fleets: Vec<FleetId> = self.in_flight_fleets.iter().copied().collect();
        for fleet_id in fleets {
            let Some(fleet) = self.fleets.get_mut(fleet_id) else {
                self.in_flight_fleets.remove(&fleet_id);
                continue;
            };
            let FleetLocation::Moving(movement) = &fleet.location else {
                self.in_flight_fleets.remove(&fleet_id);
                continue;
            };
            if !movement.has_arrived(now) {
                continue;
            }
            let destination = movement.destination;
            let combat = movement.combat;
            if !self.planets.contains_key(destination) {
                let origin = movement.origin;
                report.faults.push(SimFault::MissingDestination {
                    mover: Mover::Fleet(fleet_id),
                    planet: destination,
                });
                self.in_flight_fleets.remove(&fleet_id);
                if self.planets.contains_key(origin) {
                    warn!(target: "starhold::movement", fleet = ?fleet_id, ?destination, ?origin, "destination vanished, fleet returned to origin");
                    fleet.location = FleetLocation::Docked { planet: origin };
                } else {
                    error!(target: "starhold::movement", fleet = ?fleet_id, ?destination, ?origin, "destination and origin vanished, fleet stranded");
                }
                continue;
            }
            fleet.location = FleetLocation::Docked {
                planet: destination,
            };
            self.in_flight_fleets.remove(&fleet_id);
            debug!(target: "starhold::movement", fleet = ?fleet_id, ?destination, "fleet arrived");
            report.events.push(Event::FleetArrived {
                fleet: fleet_id,
                planet: destination,
                combat,
                at: now,
            });
        }
    }

    /// Every movement in progress, with the interpolated position at `now`.
    pub fn active_movements(&self, now: Timestamp) -> Vec<MovementView> {
        let ships = self.in_flight_ships.iter().filter_map(|&id| {
            let movement = self.ships.get(id)?.movement()?;
            Some(MovementView {
                mover: Mover::Ship(id),
                position: movement.position_at(now),
                remaining_secs: movement.remaining_secs(now),
                movement: movement.clone(),
            })
        });
        let fleets = self.in_flight_fleets.iter().filter_map(|&id| {
            let FleetLocation::Moving(movement) = &self.fleets.get(id)?.location else {
                return None;
            };
            Some(MovementView {
                mover: Mover::Fleet(id),
                position: movement.position_at(now),
                remaining_secs: movement.remaining_secs(now),
                movement: movement.clone(),
            })
        });
        ships.chain(fleets).collect()
    }

    /// Whether `ship` is registered as in flight.
    pub fn is_in_flight(&self, ship: ShipId) -> bool {
        self.in_flight_ships.contains(&ship)
    }

    /// Test hook: move an in-flight ship's arrival time.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn force_arrival_time(&mut self, ship: ShipId, arrives_at: Timestamp) -> bool {
        match self.ships.get_mut(ship).map(|s| &mut s.activity) {
            Some(ShipActivity::Moving(movement)) => {
                movement.arrives_at = arrives_at;
                true
            }
            _ => false,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::config::GameConfig;
    use crate::movement::Position;
    use crate::ship::{ShipClass, ShipStatus};

    const ME: PlayerId = PlayerId(1);
    const ENEMY: PlayerId = PlayerId(2);

    struct World {
        u: Universe,
        a: PlanetId,
        b: PlanetId,
        ship: ShipId,
    }

    fn world() -> World {
        let mut u = Universe::new(GameConfig::default(), Catalog::default()).unwrap();
        let a = u.add_planet("A", Position::new(0.0, 0.0), 3, 0);
        let b = u.add_planet("B", Position::new(100.0, 0.0), 3, 0);
        u.set_owner(a, Some(ME));
        let ship = u.spawn_ship(ME, ShipClass::Fighter, a).unwrap();
        World { u, a, b, ship }
    }

    #[test]
    fn move_to_neutral_planet() {
        let World { mut u, b, ship, .. } = world();
        let out = u.move_ship(ME, ship, b, false, 5_000).unwrap();
        assert!(!out.combat);
        assert_eq!(out.movement.travel_secs, 1_800);
        assert_eq!(out.movement.arrives_at, 5_000 + 1_800_000);

        let s = u.ship(ship).unwrap();
        assert_eq!(s.current_planet(), None);
        assert_eq!(s.status(), ShipStatus::Moving);
        assert!(u.is_in_flight(ship));
    }

    #[test]
    fn hostile_destination_requires_combat() {
        let World { mut u, b, ship, .. } = world();
        u.set_owner(b, Some(ENEMY));
        assert_eq!(
            u.move_ship(ME, ship, b, false, 0),
            Err(MovementError::CombatRequired {
                enemy_planet_id: b,
                owner: ENEMY
            })
        );
        let out = u.move_ship(ME, ship, b, true, 0).unwrap();
        assert!(out.combat);
    }

    #[test]
    fn own_destination_needs_no_combat() {
        let World { mut u, b, ship, .. } = world();
        u.set_owner(b, Some(ME));
        assert!(!u.move_ship(ME, ship, b, false, 0).unwrap().combat);
    }

    #[test]
    fn validation_order() {
        let World { mut u, a, b, ship } = world();
        assert_eq!(u.move_ship(ENEMY, ship, b, false, 0), Err(MovementError::NotOwner));
        assert_eq!(u.move_ship(ME, ship, a, false, 0), Err(MovementError::SameAsOrigin));
        u.move_ship(ME, ship, b, false, 0).unwrap();
        assert_eq!(u.move_ship(ME, ship, a, false, 0), Err(MovementError::AlreadyMoving));

        u.ship_mut(ship).unwrap().activity = ShipActivity::Destroyed;
        assert_eq!(u.move_ship(ME, ship, a, false, 0), Err(MovementError::ShipDestroyed));
    }

    #[test]
    fn busy_ship_cannot_move() {
        let World { mut u, a, b, ship } = world();
        u.ship_mut(ship).unwrap().activity = ShipActivity::Repairing {
            planet: a,
            until: 100,
        };
        assert_eq!(
            u.move_ship(ME, ship, b, false, 0),
            Err(MovementError::ShipBusy {
                activity: "repairing"
            })
        );
    }

    #[test]
    fn arrival_happens_once() {
        let World { mut u, b, ship, .. } = world();
        u.move_ship(ME, ship, b, false, 0).unwrap();

        let early = u.step(1_799_999);
        assert!(early.events.iter().all(|e| !matches!(e, Event::ShipArrived { .. })));

        let report = u.step(1_800_000);
        let arrivals = report
            .events
            .iter()
            .filter(|e| matches!(e, Event::ShipArrived { .. }))
            .count();
        assert_eq!(arrivals, 1);
        assert_eq!(u.ship(ship).unwrap().current_planet(), Some(b));
        assert!(!u.is_in_flight(ship));

        let again = u.step(1_800_000);
        assert!(again.events.iter().all(|e| !matches!(e, Event::ShipArrived { .. })));
    }

    #[test]
    fn forced_past_arrival() {
        let World { mut u, b, ship, .. } = world();
        u.move_ship(ME, ship, b, false, 10_000).unwrap();
        assert!(u.force_arrival_time(ship, 1));
        let report = u.step(20_000);
        assert_eq!(
            report
                .events
                .iter()
                .filter(|e| matches!(e, Event::ShipArrived { .. }))
                .count(),
            1
        );
        assert!(u.active_movements(20_000).is_empty());
    }

    #[test]
    fn recall_returns_to_origin() {
        let World { mut u, a, b, ship } = world();
        assert_eq!(u.cancel_movement(ME, ship), Err(MovementError::NotMoving));
        u.move_ship(ME, ship, b, false, 0).unwrap();
        assert_eq!(u.cancel_movement(ME, ship), Ok(a));
        let s = u.ship(ship).unwrap();
        assert_eq!(s.status(), ShipStatus::Idle);
        assert!(s.movement().is_none());
        assert_eq!(s.current_planet(), Some(a));
        assert!(!u.is_in_flight(ship));
        // A recalled ship can move again from its origin.
        assert!(u.move_ship(ME, ship, b, false, 0).is_ok());
    }

    #[test]
    fn active_movements_interpolate() {
        let World { mut u, b, ship, .. } = world();
        u.move_ship(ME, ship, b, false, 0).unwrap();
        let views = u.active_movements(900_000);
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].mover, Mover::Ship(ship));
        assert_eq!(views[0].position, Position::new(50.0, 0.0));
        assert_eq!(views[0].remaining_secs, 900);
    }

    #[test]
    fn vanished_destination_sends_ship_home_once() {
        let World { mut u, a, b, ship } = world();
        let out = u.move_ship(ME, ship, b, false, 0).unwrap();
        u.planets.remove(b);

        let report = u.step(out.movement.arrives_at);
        assert_eq!(
            report.faults,
            vec![SimFault::MissingDestination {
                mover: Mover::Ship(ship),
                planet: b
            }]
        );
        assert_eq!(u.ship(ship).unwrap().current_planet(), Some(a));
        assert!(!u.is_in_flight(ship));

        let later = u.step(out.movement.arrives_at + 1_000);
        assert!(later.faults.is_empty());
    }
}
