//! Fleets: named groups of co-located ships that move as one unit.

use crate::event::Event;
use crate::id::{FleetId, PlanetId, PlayerId, ShipId};
use crate::movement::Movement;
use crate::ship::ShipActivity;
use crate::time::Timestamp;
use crate::universe::Universe;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FleetLocation {
    Docked { planet: PlanetId },
    /// Mirror of the movement stored on every member.
    Moving(Movement),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fleet {
    pub id: FleetId,
    pub owner: PlayerId,
    pub name: String,
    pub members: Vec<ShipId>,
    pub location: FleetLocation,
}

impl Fleet {
    pub fn current_planet(&self) -> Option<PlanetId> {
        match self.location {
            FleetLocation::Docked { planet } => Some(planet),
            FleetLocation::Moving(_) => None,
        }
    }

    pub fn movement(&self) -> Option<&Movement> {
        match &self.location {
            FleetLocation::Moving(m) => Some(m),
            FleetLocation::Docked { .. } => None,
        }
    }
}

/// Why a fleet operation was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FleetError {
    #[error("fleet not found")]
    FleetNotFound,

    #[error("a fleet needs at least one ship")]
    Empty,

    #[error("ship {0:?} listed twice")]
    DuplicateShip(ShipId),

    #[error("ship {0:?} not found")]
    ShipNotFound(ShipId),

    #[error("ship {0:?} is not owned by the requester")]
    NotOwner(ShipId),

    #[error("requester does not own this fleet")]
    FleetNotOwned,

    #[error("ship {ship:?} already belongs to fleet {fleet:?}")]
    AlreadyAssigned { ship: ShipId, fleet: FleetId },

    #[error("ship {0:?} is destroyed")]
    ShipDestroyed(ShipId),

    #[error("ship {ship:?} is not docked and idle ({status})")]
    ShipNotReady { ship: ShipId, status: &'static str },

    #[error("fleet would have {size} ships, maximum is {max}")]
    TooLarge { size: usize, max: usize },

    #[error("ship {ship:?} is not at the fleet's planet")]
    NotColocated { ship: ShipId },

    #[error("fleet is moving")]
    FleetMoving,

    #[error("ship {0:?} is not a member of this fleet")]
    NotMember(ShipId),
}

/// Aggregate view of a fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetStats {
    pub fleet: FleetId,
    pub name: String,
    pub owner: PlayerId,
    pub member_count: usize,
    /// Speed of the slowest member.
    pub speed: f64,
    pub total_attack: u32,
    pub total_defense: u32,
    pub total_health: u32,
    pub cargo_used: u32,
    pub cargo_capacity: u32,
    pub location: FleetLocation,
}

impl Universe {
    /// Group docked, idle ships at one planet into a new fleet.
    pub fn create_fleet(
        &mut self,
        owner: PlayerId,
        name: impl Into<String>,
        ships: &[ShipId],
    ) -> Result<FleetId, FleetError> {
        if ships.is_empty() {
            return Err(FleetError::Empty);
        }
        let mut seen = BTreeSet::new();
        for &ship in ships {
            if !seen.insert(ship) {
                return Err(FleetError::DuplicateShip(ship));
            }
        }
        if ships.len() > self.config.max_fleet_size {
            return Err(FleetError::TooLarge {
                size: ships.len(),
                max: self.config.max_fleet_size,
            });
        }

        let mut planet = None;
        for &ship in ships {
            let here = self.check_joinable(owner, ship)?;
            match planet {
                None => planet = Some(here),
                Some(p) if p != here => return Err(FleetError::NotColocated { ship }),
                Some(_) => {}
            }
        }
        let Some(planet) = planet else {
            return Err(FleetError::Empty);
        };

        let name = name.into();
        let members = ships.to_vec();
        let fleet_id = self.fleets.insert_with_key(|id| Fleet {
            id,
            owner,
            name,
            members: members.clone(),
            location: FleetLocation::Docked { planet },
        });
        for ship in members {
            if let Some(s) = self.ships.get_mut(ship) {
                s.fleet = Some(fleet_id);
            }
        }
        debug!(target: "starhold::fleet", fleet = ?fleet_id, %owner, size = ships.len(), "fleet created");
        Ok(fleet_id)
    }

    /// Add a docked, idle ship at the fleet's planet.
    pub fn add_to_fleet(
        &mut self,
        owner: PlayerId,
        fleet_id: FleetId,
        ship: ShipId,
    ) -> Result<(), FleetError> {
        let fleet = self.fleets.get(fleet_id).ok_or(FleetError::FleetNotFound)?;
        if fleet.owner != owner {
            return Err(FleetError::FleetNotOwned);
        }
        let FleetLocation::Docked { planet } = fleet.location else {
            return Err(FleetError::FleetMoving);
        };
        if fleet.members.len() >= self.config.max_fleet_size {
            return Err(FleetError::TooLarge {
                size: fleet.members.len() + 1,
                max: self.config.max_fleet_size,
            });
        }
        if self.check_joinable(owner, ship)? != planet {
            return Err(FleetError::NotColocated { ship });
        }

        if let Some(fleet) = self.fleets.get_mut(fleet_id) {
            fleet.members.push(ship);
        }
        if let Some(s) = self.ships.get_mut(ship) {
            s.fleet = Some(fleet_id);
        }
        Ok(())
    }

    /// Remove a ship from a docked fleet. The fleet is disbanded when its
    /// last member leaves.
    pub fn remove_from_fleet(
        &mut self,
        owner: PlayerId,
        fleet_id: FleetId,
        ship: ShipId,
        now: Timestamp,
    ) -> Result<(), FleetError> {
        let fleet = self
            .fleets
            .get_mut(fleet_id)
            .ok_or(FleetError::FleetNotFound)?;
        if fleet.owner != owner {
            return Err(FleetError::FleetNotOwned);
        }
        if matches!(fleet.location, FleetLocation::Moving(_)) {
            return Err(FleetError::FleetMoving);
        }
        let index = fleet
            .members
            .iter()
            .position(|&m| m == ship)
            .ok_or(FleetError::NotMember(ship))?;
        fleet.members.remove(index);
        let now_empty = fleet.members.is_empty();

        if let Some(s) = self.ships.get_mut(ship) {
            s.fleet = None;
        }
        if now_empty {
            self.dissolve_fleet(fleet_id, now);
        }
        Ok(())
    }

    /// Dissolve a fleet, clearing membership on all members. A moving
    /// fleet's members keep flying as individual ships.
    pub fn disband_fleet(
        &mut self,
        owner: PlayerId,
        fleet_id: FleetId,
        now: Timestamp,
    ) -> Result<(), FleetError> {
        let fleet = self.fleets.get(fleet_id).ok_or(FleetError::FleetNotFound)?;
        if fleet.owner != owner {
            return Err(FleetError::FleetNotOwned);
        }
        self.dissolve_fleet(fleet_id, now);
        Ok(())
    }

    /// Remove a destroyed ship from its fleet, dissolving the fleet if it
    /// becomes empty.
    pub(crate) fn detach_from_fleet(&mut self, ship: ShipId, fleet_id: FleetId, now: Timestamp) {
        let Some(fleet) = self.fleets.get_mut(fleet_id) else {
            return;
        };
        fleet.members.retain(|&m| m != ship);
        if fleet.members.is_empty() {
            self.dissolve_fleet(fleet_id, now);
        }
    }

    fn dissolve_fleet(&mut self, fleet_id: FleetId, now: Timestamp) {
        let Some(fleet) = self.fleets.remove(fleet_id) else {
            return;
        };
        for member in fleet.members {
            if let Some(s) = self.ships.get_mut(member)
                && s.fleet == Some(fleet_id)
            {
                s.fleet = None;
            }
        }
        self.in_flight_fleets.remove(&fleet_id);
        debug!(target: "starhold::fleet", fleet = ?fleet_id, "fleet disbanded");
        self.pending_events.push(Event::FleetDisbanded {
            fleet: fleet_id,
            at: now,
        });
    }

    /// Checks shared by create and add. Returns the ship's planet.
    fn check_joinable(&self, owner: PlayerId, ship: ShipId) -> Result<PlanetId, FleetError> {
        let s = self.ships.get(ship).ok_or(FleetError::ShipNotFound(ship))?;
        if s.owner != owner {
            return Err(FleetError::NotOwner(ship));
        }
        if let Some(fleet) = s.fleet {
            return Err(FleetError::AlreadyAssigned { ship, fleet });
        }
        match s.activity {
            ShipActivity::Docked { planet } => Ok(planet),
            ShipActivity::Destroyed => Err(FleetError::ShipDestroyed(ship)),
            _ => Err(FleetError::ShipNotReady {
                ship,
                status: s.status().name(),
            }),
        }
    }

    pub fn fleet_stats(&self, fleet_id: FleetId) -> Option<FleetStats> {
        let fleet = self.fleets.get(fleet_id)?;
        let mut stats = FleetStats {
            fleet: fleet_id,
            name: fleet.name.clone(),
            owner: fleet.owner,
            member_count: fleet.members.len(),
            speed: 0.0,
            total_attack: 0,
            total_defense: 0,
            total_health: 0,
            cargo_used: 0,
            cargo_capacity: 0,
            location: fleet.location.clone(),
        };
        let mut speed = f64::INFINITY;
        for ship in fleet.members.iter().filter_map(|&m| self.ships.get(m)) {
            let class = ship.stats();
            speed = speed.min(class.speed);
            stats.total_attack += class.attack;
            stats.total_defense += class.defense;
            stats.total_health += ship.health;
            stats.cargo_used += ship.cargo.total();
            stats.cargo_capacity += class.cargo_capacity;
        }
        if speed.is_finite() {
            stats.speed = speed;
        }
        Some(stats)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
