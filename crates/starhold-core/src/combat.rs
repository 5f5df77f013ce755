//! Ship actions: mining, combat, repair, cargo transfer and colonization.
//!
//! Each action is a short state machine gated by ship class and status.
//! Timed actions (mining, weapon cooldown, repair) register the ship as busy;
//! the activity phase of the tick finishes them.

use crate::catalog::BuildingType;
use crate::event::Event;
use crate::fixed::Fixed64;
use crate::id::{BuildingId, PlanetId, PlayerId, ShipId};
use crate::queue::OrderTarget;
use crate::ship::{Cargo, CargoKind, Ship, ShipActionError, ShipActivity, ShipClass, attack_damage};
use crate::time::{Timestamp, after_secs};
use crate::universe::{Universe, refresh_queue_capacity};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Result of [`Universe::attack_ship`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackOutcome {
    pub damage: u32,
    pub target_health: u32,
    pub destroyed: bool,
}

/// Result of [`Universe::bombard_planet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BombardOutcome {
    pub building: BuildingId,
    pub kind: BuildingType,
    pub damage: u8,
    pub destroyed: bool,
}

impl Universe {
    fn owned_ship(&self, player: PlayerId, ship: ShipId) -> Result<&Ship, ShipActionError> {
        let s = self.ships.get(ship).ok_or(ShipActionError::ShipNotFound)?;
        if s.owner != player {
            return Err(ShipActionError::NotOwner);
        }
        Ok(s)
    }

    fn set_busy(&mut self, ship: ShipId, activity: ShipActivity) {
        if let Some(s) = self.ships.get_mut(ship) {
            s.activity = activity;
            self.busy_ships.insert(ship);
        }
    }

    /// Start a mining run at the docked planet. Miners only; the planet must
    /// be unowned or the miner's own.
    pub fn start_mining(
        &mut self,
        player: PlayerId,
        ship_id: ShipId,
        now: Timestamp,
    ) -> Result<Timestamp, ShipActionError> {
        let ship = self.owned_ship(player, ship_id)?;
        if ship.class != ShipClass::Miner {
            return Err(ShipActionError::WrongClass {
                required: ShipClass::Miner,
                actual: ship.class,
            });
        }
        let planet = ship.idle_planet()?;
        if ship.free_cargo() == 0 {
            return Err(ShipActionError::CargoFull);
        }
        let p = self
            .planets
            .get(planet)
            .ok_or(ShipActionError::PlanetNotFound)?;
        if let Some(owner) = p.owner.filter(|&o| o != player) {
            return Err(ShipActionError::ForeignPlanet { owner });
        }

        let until = after_secs(now, self.config.mining_secs);
        self.set_busy(ship_id, ShipActivity::Mining { planet, until });
        debug!(target: "starhold::ship", ship = ?ship_id, ?planet, until, "mining started");
        Ok(until)
    }

    /// Fire on an enemy ship at the same planet.
    ///
    /// Damage is `max(attack - defense / 2, 1)`. A target reduced to zero
    /// health is destroyed and leaves its fleet. The attacker then cools
    /// down for `attack_cooldown_secs`.
    pub fn attack_ship(
        &mut self,
        player: PlayerId,
        attacker_id: ShipId,
        target_id: ShipId,
        now: Timestamp,
    ) -> Result<AttackOutcome, ShipActionError> {
        let attacker = self.owned_ship(player, attacker_id)?;
        let planet = attacker.idle_planet()?;
        let attack = attacker.stats().attack;
        if attack == 0 {
            return Err(ShipActionError::Unarmed);
        }

        let target = self
            .ships
            .get(target_id)
            .ok_or(ShipActionError::TargetNotFound)?;
        if target.is_destroyed() {
            return Err(ShipActionError::TargetNotFound);
        }
        if target.owner == player {
            return Err(ShipActionError::FriendlyTarget);
        }
        if target.current_planet() != Some(planet) {
            return Err(ShipActionError::OutOfRange);
        }
        let damage = attack_damage(attack, target.stats().defense);
        let target_owner = target.owner;
        let target_fleet = target.fleet;

        let mut outcome = AttackOutcome {
            damage,
            target_health: 0,
            destroyed: false,
        };
        if let Some(target) = self.ships.get_mut(target_id) {
            outcome.destroyed = target.take_damage(damage);
            outcome.target_health = target.health;
        }
        if outcome.destroyed {
            self.busy_ships.remove(&target_id);
            self.in_flight_ships.remove(&target_id);
            if let Some(fleet) = target_fleet {
                self.detach_from_fleet(target_id, fleet, now);
            }
            info!(target: "starhold::combat", target_ship = ?target_id, by = ?attacker_id, "ship destroyed");
            self.pending_events.push(Event::ShipDestroyed {
                ship: target_id,
                owner: target_owner,
                by: Some(attacker_id),
                at: now,
            });
        }

        let until = after_secs(now, self.config.attack_cooldown_secs);
        self.set_busy(attacker_id, ShipActivity::Attacking { planet, until });
        debug!(target: "starhold::combat", attacker = ?attacker_id, target_ship = ?target_id, damage, "attack");
        Ok(outcome)
    }

    /// Damage the first building on a hostile planet by `attack / 2`
    /// (at least 1). A building reaching 100 damage is destroyed.
    pub fn bombard_planet(
        &mut self,
        player: PlayerId,
        ship_id: ShipId,
        now: Timestamp,
    ) -> Result<BombardOutcome, ShipActionError> {
        let ship = self.owned_ship(player, ship_id)?;
        let planet_id = ship.idle_planet()?;
        let attack = ship.stats().attack;
        if attack == 0 {
            return Err(ShipActionError::Unarmed);
        }
        let planet = self
            .planets
            .get_mut(planet_id)
            .ok_or(ShipActionError::PlanetNotFound)?;
        if !planet.is_hostile_to(player) {
            return Err(ShipActionError::NotHostile);
        }
        let building = planet
            .buildings
            .first_mut()
            .ok_or(ShipActionError::NoBuildings)?;
        let damage = u8::try_from((attack / 2).max(1)).unwrap_or(u8::MAX);
        let destroyed = building.apply_damage(damage);
        let outcome = BombardOutcome {
            building: building.id,
            kind: building.kind,
            damage,
            destroyed,
        };

        if destroyed {
            planet.remove_building(outcome.building);
            // Waiting orders for the building are dropped; the active one is
            // reported as a fault when it completes.
            let stale: Vec<_> = planet
                .queue
                .queued()
                .filter(|o| o.target == OrderTarget::Upgrade { building: outcome.building })
                .map(|o| o.id)
                .collect();
            for order in stale {
                let _ = planet.queue.cancel(order);
            }
            if outcome.kind == BuildingType::CommandCenter {
                refresh_queue_capacity(planet, &self.config);
            }
            info!(target: "starhold::combat", planet = ?planet_id, building = ?outcome.building, kind = %outcome.kind, "building destroyed");
            self.pending_events.push(Event::BuildingDestroyed {
                planet: planet_id,
                building: outcome.building,
                kind: outcome.kind,
                at: now,
            });
        }

        let until = after_secs(now, self.config.attack_cooldown_secs);
        self.set_busy(
            ship_id,
            ShipActivity::Attacking {
                planet: planet_id,
                until,
            },
        );
        Ok(outcome)
    }

    /// Repair a damaged ship docked at an own planet with a shipyard. Takes
    /// `repair_secs_per_hp` per missing hit point.
    pub fn start_repair(
        &mut self,
        player: PlayerId,
        ship_id: ShipId,
        now: Timestamp,
    ) -> Result<Timestamp, ShipActionError> {
        let ship = self.owned_ship(player, ship_id)?;
        let planet = ship.idle_planet()?;
        let missing = ship.max_health().saturating_sub(ship.health);
        let p = self
            .planets
            .get(planet)
            .ok_or(ShipActionError::PlanetNotFound)?;
        if !p.is_owned_by(player) || !p.has_building(BuildingType::Shipyard) {
            return Err(ShipActionError::NoShipyard);
        }
        if missing == 0 {
            return Err(ShipActionError::NotDamaged);
        }
        let secs = u64::from(missing).saturating_mul(self.config.repair_secs_per_hp);
        let until = after_secs(now, secs);
        self.set_busy(ship_id, ShipActivity::Repairing { planet, until });
        debug!(target: "starhold::ship", ship = ?ship_id, missing, until, "repair started");
        Ok(until)
    }

    /// Move `amount` of a resource from the docked (own) planet into the hold.
    pub fn load_cargo(
        &mut self,
        player: PlayerId,
        ship_id: ShipId,
        kind: CargoKind,
        amount: u32,
    ) -> Result<Cargo, ShipActionError> {
        if amount == 0 {
            return Err(ShipActionError::ZeroAmount);
        }
        let ship = self.owned_ship(player, ship_id)?;
        let planet_id = ship.idle_planet()?;
        if ship.free_cargo() < amount {
            return Err(ShipActionError::CargoFull);
        }
        let planet = self
            .planets
            .get_mut(planet_id)
            .ok_or(ShipActionError::PlanetNotFound)?;
        if !planet.is_owned_by(player) {
            return Err(ShipActionError::PlanetNotOwned);
        }
        let stock = planet.stock.get_mut(kind.resource());
        let wanted = Fixed64::from_num(amount);
        if *stock < wanted {
            return Err(ShipActionError::InsufficientStock {
                kind,
                available: stock.to_num::<u32>(),
                requested: amount,
            });
        }
        *stock -= wanted;

        let ship = self
            .ships
            .get_mut(ship_id)
            .ok_or(ShipActionError::ShipNotFound)?;
        let slot = ship.cargo.get_mut(kind);
        *slot = slot.saturating_add(amount);
        Ok(ship.cargo)
    }

    /// Move `amount` from the hold into the docked (own) planet's stock.
    pub fn unload_cargo(
        &mut self,
        player: PlayerId,
        ship_id: ShipId,
        kind: CargoKind,
        amount: u32,
    ) -> Result<Cargo, ShipActionError> {
        if amount == 0 {
            return Err(ShipActionError::ZeroAmount);
        }
        let ship = self.owned_ship(player, ship_id)?;
        let planet_id = ship.idle_planet()?;
        let available = ship.cargo.get(kind);
        if available < amount {
            return Err(ShipActionError::NotEnoughCargo {
                kind,
                available,
                requested: amount,
            });
        }
        let planet = self
            .planets
            .get_mut(planet_id)
            .ok_or(ShipActionError::PlanetNotFound)?;
        if !planet.is_owned_by(player) {
            return Err(ShipActionError::PlanetNotOwned);
        }
        let stock = planet.stock.get_mut(kind.resource());
        *stock = stock.saturating_add(Fixed64::from_num(amount));

        let ship = self
            .ships
            .get_mut(ship_id)
            .ok_or(ShipActionError::ShipNotFound)?;
        *ship.cargo.get_mut(kind) -= amount;
        Ok(ship.cargo)
    }

    /// Found a colony on the docked, unowned planet. The colony ship is
    /// consumed: its settlers become the population and the rest of its
    /// cargo is unloaded.
    pub fn colonize(
        &mut self,
        player: PlayerId,
        ship_id: ShipId,
        now: Timestamp,
    ) -> Result<PlanetId, ShipActionError> {
        let ship = self.owned_ship(player, ship_id)?;
        if ship.class != ShipClass::Colony {
            return Err(ShipActionError::WrongClass {
                required: ShipClass::Colony,
                actual: ship.class,
            });
        }
        let planet_id = ship.idle_planet()?;
        let settlers = ship.cargo.settlers;
        let required = self.config.settler_requirement;
        let planet = self
            .planets
            .get(planet_id)
            .ok_or(ShipActionError::PlanetNotFound)?;
        if planet.owner.is_some() {
            return Err(ShipActionError::AlreadyOwned);
        }
        if settlers < required {
            return Err(ShipActionError::NotEnoughSettlers {
                available: settlers,
                required,
            });
        }

        let Some(ship) = self.ships.remove(ship_id) else {
            return Err(ShipActionError::ShipNotFound);
        };
        self.busy_ships.remove(&ship_id);
        self.in_flight_ships.remove(&ship_id);
        if let Some(fleet) = ship.fleet {
            self.detach_from_fleet(ship_id, fleet, now);
        }

        if let Some(planet) = self.planets.get_mut(planet_id) {
            planet.owner = Some(player);
            planet.last_produced = now;
            for kind in [
                CargoKind::Minerals,
                CargoKind::Energy,
                CargoKind::Credits,
                CargoKind::Settlers,
            ] {
                let slot = planet.stock.get_mut(kind.resource());
                *slot = slot.saturating_add(Fixed64::from_num(ship.cargo.get(kind)));
            }
        }
        info!(target: "starhold::ship", planet = ?planet_id, %player, settlers, "planet colonized");
        self.pending_events.push(Event::PlanetColonized {
            planet: planet_id,
            owner: player,
            ship: ship_id,
            at: now,
        });
        Ok(planet_id)
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
    use crate::fixed::f64_to_fixed64;
    use crate::movement::Position;
    use crate::ship::ShipStatus;

    const ME: PlayerId = PlayerId(1);
    const FOE: PlayerId = PlayerId(2);

    fn setup() -> (Universe, PlanetId) {
        let mut u = Universe::new(GameConfig::default(), Catalog::default()).unwrap();
        let p = u.add_planet("Rhea", Position::default(), 4, 0);
        (u, p)
    }

    #[test]
    fn mining_run_completes_on_tick() {
        let (mut u, p) = setup();
        let miner = u.spawn_ship(ME, ShipClass::Miner, p).unwrap();
        let until = u.start_mining(ME, miner, 0).unwrap();
        assert_eq!(until, 600_000);
        assert_eq!(u.ship(miner).unwrap().status(), ShipStatus::Mining);

        assert!(u.step(599_999).events.is_empty());
        let report = u.step(600_000);
        assert!(report.events.iter().any(|e| matches!(
            e,
            Event::MiningCompleted { minerals: 100, .. }
        )));
        assert_eq!(u.ship(miner).unwrap().cargo.minerals, 100);
        assert_eq!(u.ship(miner).unwrap().status(), ShipStatus::Idle);
    }

    #[test]
    fn mining_rules() {
        let (mut u, p) = setup();
        let fighter = u.spawn_ship(ME, ShipClass::Fighter, p).unwrap();
        assert!(matches!(
            u.start_mining(ME, fighter, 0),
            Err(ShipActionError::WrongClass { .. })
        ));
        let miner = u.spawn_ship(ME, ShipClass::Miner, p).unwrap();
        u.set_owner(p, Some(FOE));
        assert_eq!(
            u.start_mining(ME, miner, 0),
            Err(ShipActionError::ForeignPlanet { owner: FOE })
        );
    }

    #[test]
    fn attack_until_destroyed() {
        let (mut u, p) = setup();
        let cruiser = u.spawn_ship(ME, ShipClass::Cruiser, p).unwrap();
        let scout = u.spawn_ship(FOE, ShipClass::Scout, p).unwrap();

        // 40 - 2/2 = 39 damage, scout has 40 hp
        let first = u.attack_ship(ME, cruiser, scout, 0).unwrap();
        assert_eq!(first.damage, 39);
        assert!(!first.destroyed);

        assert_eq!(
            u.attack_ship(ME, cruiser, scout, 0),
            Err(ShipActionError::Busy {
                activity: "attacking"
            })
        );
        u.step(30_000);

        let second = u.attack_ship(ME, cruiser, scout, 30_000).unwrap();
        assert!(second.destroyed);
        assert!(u.ship(scout).unwrap().is_destroyed());
        let report = u.step(31_000);
        assert!(
            report
                .events
                .iter()
                .any(|e| matches!(e, Event::ShipDestroyed { by: Some(_), .. }))
        );
    }

    #[test]
    fn destroyed_member_leaves_fleet() {
        let (mut u, p) = setup();
        let cruiser = u.spawn_ship(ME, ShipClass::Cruiser, p).unwrap();
        let scout = u.spawn_ship(FOE, ShipClass::Scout, p).unwrap();
        let fleet = u.create_fleet(FOE, "pickets", &[scout]).unwrap();
        u.ship_mut(scout).unwrap().health = 1;
        assert!(u.attack_ship(ME, cruiser, scout, 0).unwrap().destroyed);
        assert!(u.fleet(fleet).is_none());
    }

    #[test]
    fn cannot_attack_friend_or_distant() {
        let (mut u, p) = setup();
        let q = u.add_planet("Far", Position::new(500.0, 0.0), 2, 0);
        let a = u.spawn_ship(ME, ShipClass::Fighter, p).unwrap();
        let b = u.spawn_ship(ME, ShipClass::Fighter, p).unwrap();
        let c = u.spawn_ship(FOE, ShipClass::Fighter, q).unwrap();
        assert_eq!(u.attack_ship(ME, a, b, 0), Err(ShipActionError::FriendlyTarget));
        assert_eq!(u.attack_ship(ME, a, c, 0), Err(ShipActionError::OutOfRange));
        let miner = u.spawn_ship(ME, ShipClass::Miner, p).unwrap();
        assert_eq!(u.attack_ship(ME, miner, c, 0), Err(ShipActionError::Unarmed));
    }

    #[test]
    fn bombard_destroys_building() {
        let (mut u, p) = setup();
        u.set_owner(p, Some(FOE));
        u.place_building(p, BuildingType::MetalMine, 1).unwrap();
        let cruiser = u.spawn_ship(ME, ShipClass::Cruiser, p).unwrap();

        let mut now = 0;
        let mut destroyed = false;
        for _ in 0..5 {
            let out = u.bombard_planet(ME, cruiser, now).unwrap();
            assert_eq!(out.damage, 20);
            destroyed = out.destroyed;
            now += 30_000;
            u.step(now);
        }
        assert!(destroyed);
        assert!(u.planet(p).unwrap().buildings.is_empty());
        assert_eq!(
            u.bombard_planet(ME, cruiser, now),
            Err(ShipActionError::NoBuildings)
        );
    }

    #[test]
    fn bombard_own_planet_refused() {
        let (mut u, p) = setup();
        u.set_owner(p, Some(ME));
        let fighter = u.spawn_ship(ME, ShipClass::Fighter, p).unwrap();
        assert_eq!(
            u.bombard_planet(ME, fighter, 0),
            Err(ShipActionError::NotHostile)
        );
    }

    #[test]
    fn repair_needs_shipyard() {
        let (mut u, p) = setup();
        u.set_owner(p, Some(ME));
        let frigate = u.spawn_ship(ME, ShipClass::Frigate, p).unwrap();
        u.ship_mut(frigate).unwrap().health = 100;
        assert_eq!(u.start_repair(ME, frigate, 0), Err(ShipActionError::NoShipyard));

        u.place_building(p, BuildingType::Shipyard, 1).unwrap();
        let until = u.start_repair(ME, frigate, 0).unwrap();
        // 60 hp missing × 2 s
        assert_eq!(until, 120_000);
        u.step(120_000);
        assert_eq!(u.ship(frigate).unwrap().health, 160);
        assert_eq!(u.start_repair(ME, frigate, 120_000), Err(ShipActionError::NotDamaged));
    }

    #[test]
    fn cargo_round_trip() {
        let (mut u, p) = setup();
        u.set_owner(p, Some(ME));
        u.planet_mut(p).unwrap().stock.minerals = f64_to_fixed64(300.0);
        let t = u.spawn_ship(ME, ShipClass::Transport, p).unwrap();

        let cargo = u.load_cargo(ME, t, CargoKind::Minerals, 250).unwrap();
        assert_eq!(cargo.minerals, 250);
        assert_eq!(u.planet(p).unwrap().stock.minerals, f64_to_fixed64(50.0));
        assert!(matches!(
            u.load_cargo(ME, t, CargoKind::Minerals, 100),
            Err(ShipActionError::InsufficientStock { available: 50, .. })
        ));

        let cargo = u.unload_cargo(ME, t, CargoKind::Minerals, 200).unwrap();
        assert_eq!(cargo.minerals, 50);
        assert!(matches!(
            u.unload_cargo(ME, t, CargoKind::Minerals, 51),
            Err(ShipActionError::NotEnoughCargo { available: 50, .. })
        ));
        assert_eq!(
            u.load_cargo(ME, t, CargoKind::Energy, 0),
            Err(ShipActionError::ZeroAmount)
        );
    }

    #[test]
    fn colonize_consumes_ship() {
        let (mut u, home) = setup();
        u.set_owner(home, Some(ME));
        u.planet_mut(home).unwrap().stock.population = f64_to_fixed64(80.0);
        let target = u.add_planet("New Eden", Position::new(10.0, 0.0), 5, 0);
        let colony = u.spawn_ship(ME, ShipClass::Colony, home).unwrap();

        u.load_cargo(ME, colony, CargoKind::Settlers, 40).unwrap();
        u.move_ship(ME, colony, target, false, 0).unwrap();
        u.force_arrival_time(colony, 0);
        u.step(1);
        assert_eq!(
            u.colonize(ME, colony, 1),
            Err(ShipActionError::NotEnoughSettlers {
                available: 40,
                required: 50
            })
        );

        u.ship_mut(colony).unwrap().cargo.settlers = 60;
        assert_eq!(u.colonize(ME, colony, 2), Ok(target));
        assert!(u.ship(colony).is_none());
        let planet = u.planet(target).unwrap();
        assert_eq!(planet.owner, Some(ME));
        assert_eq!(planet.stock.population, f64_to_fixed64(60.0));
    }

    #[test]
    fn colonize_owned_planet_refused() {
        let (mut u, p) = setup();
        u.set_owner(p, Some(FOE));
        let colony = u.spawn_ship(ME, ShipClass::Colony, p).unwrap();
        u.ship_mut(colony).unwrap().cargo.settlers = 100;
        assert_eq!(u.colonize(ME, colony, 0), Err(ShipActionError::AlreadyOwned));
    }
}
