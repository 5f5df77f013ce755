//! Ships: class stats, cargo and the activity state machine.
//!
//! A ship's activity is a single tagged union, so a ship is always in
//! exactly one state and a [`Movement`] only exists while `Moving`.

use crate::config::GameConfig;
use crate::id::{FleetId, PlanetId, PlayerId, ShipId};
use crate::movement::Movement;
use crate::resources::ResourceKind;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Classes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipClass {
    Scout,
    Fighter,
    Frigate,
    Cruiser,
    Miner,
    Transport,
    Colony,
}

/// Fixed base stats of a class. Speed is in map units per hour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassStats {
    pub speed: f64,
    pub attack: u32,
    pub defense: u32,
    pub health: u32,
    pub cargo_capacity: u32,
}

impl ShipClass {
    pub const ALL: [ShipClass; 7] = [
        ShipClass::Scout,
        ShipClass::Fighter,
        ShipClass::Frigate,
        ShipClass::Cruiser,
        ShipClass::Miner,
        ShipClass::Transport,
        ShipClass::Colony,
    ];

    pub const fn stats(self) -> ClassStats {
        let (speed, attack, defense, health, cargo_capacity) = match self {
            ShipClass::Scout => (400.0, 2, 2, 40, 10),
            ShipClass::Fighter => (200.0, 12, 6, 80, 0),
            ShipClass::Frigate => (150.0, 20, 14, 160, 50),
            ShipClass::Cruiser => (100.0, 40, 30, 400, 100),
            ShipClass::Miner => (120.0, 0, 8, 120, 500),
            ShipClass::Transport => (100.0, 0, 10, 150, 1_000),
            ShipClass::Colony => (80.0, 0, 6, 200, 200),
        };
        ClassStats {
            speed,
            attack,
            defense,
            health,
            cargo_capacity,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ShipClass::Scout => "scout",
            ShipClass::Fighter => "fighter",
            ShipClass::Frigate => "frigate",
            ShipClass::Cruiser => "cruiser",
            ShipClass::Miner => "miner",
            ShipClass::Transport => "transport",
            ShipClass::Colony => "colony",
        }
    }
}

impl std::fmt::Display for ShipClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Cargo
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CargoKind {
    Minerals,
    Energy,
    Credits,
    /// Carried population.
    Settlers,
}

impl CargoKind {
    /// Planet resource this cargo is loaded from and unloaded into.
    pub fn resource(self) -> ResourceKind {
        match self {
            CargoKind::Minerals => ResourceKind::Minerals,
            CargoKind::Energy => ResourceKind::Energy,
            CargoKind::Credits => ResourceKind::Credits,
            CargoKind::Settlers => ResourceKind::Population,
        }
    }
}

/// Ship hold contents, in whole units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cargo {
    pub minerals: u32,
    pub energy: u32,
    pub credits: u32,
    pub settlers: u32,
}

impl Cargo {
    pub fn get(&self, kind: CargoKind) -> u32 {
        match kind {
            CargoKind::Minerals => self.minerals,
            CargoKind::Energy => self.energy,
            CargoKind::Credits => self.credits,
            CargoKind::Settlers => self.settlers,
        }
    }

    pub fn get_mut(&mut self, kind: CargoKind) -> &mut u32 {
        match kind {
            CargoKind::Minerals => &mut self.minerals,
            CargoKind::Energy => &mut self.energy,
            CargoKind::Credits => &mut self.credits,
            CargoKind::Settlers => &mut self.settlers,
        }
    }

    pub fn total(&self) -> u32 {
        self.minerals
            .saturating_add(self.energy)
            .saturating_add(self.credits)
            .saturating_add(self.settlers)
    }
}

// ---------------------------------------------------------------------------
// Activity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShipActivity {
    /// Idle at a planet.
    Docked { planet: PlanetId },
    Moving(Movement),
    Mining { planet: PlanetId, until: Timestamp },
    /// Weapons cooling down after an attack.
    Attacking { planet: PlanetId, until: Timestamp },
    Repairing { planet: PlanetId, until: Timestamp },
    Destroyed,
}

/// Flat status, as reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipStatus {
    Idle,
    Moving,
    Mining,
    Attacking,
    Repairing,
    Destroyed,
}

impl ShipStatus {
    pub fn name(self) -> &'static str {
        match self {
            ShipStatus::Idle => "idle",
            ShipStatus::Moving => "moving",
            ShipStatus::Mining => "mining",
            ShipStatus::Attacking => "attacking",
            ShipStatus::Repairing => "repairing",
            ShipStatus::Destroyed => "destroyed",
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a ship action (mining, combat, repair, cargo, colonization) was
/// refused.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShipActionError {
    #[error("ship not found")]
    ShipNotFound,

    #[error("target ship not found")]
    TargetNotFound,

    #[error("planet not found")]
    PlanetNotFound,

    #[error("requester does not own this ship")]
    NotOwner,

    #[error("ship is destroyed")]
    ShipDestroyed,

    #[error("ship is not docked at a planet")]
    NotDocked,

    #[error("ship is busy ({activity})")]
    Busy { activity: &'static str },

    #[error("a {actual} cannot do this; requires {required}")]
    WrongClass {
        required: ShipClass,
        actual: ShipClass,
    },

    #[error("ship has no weapons")]
    Unarmed,

    #[error("cargo hold is full")]
    CargoFull,

    #[error("not enough {kind:?} aboard: have {available}, need {requested}")]
    NotEnoughCargo {
        kind: CargoKind,
        available: u32,
        requested: u32,
    },

    #[error("planet has only {available} {kind:?}, requested {requested}")]
    InsufficientStock {
        kind: CargoKind,
        available: u32,
        requested: u32,
    },

    #[error("planet belongs to {owner}")]
    ForeignPlanet { owner: PlayerId },

    #[error("planet is not owned by the requester")]
    PlanetNotOwned,

    #[error("planet is not hostile")]
    NotHostile,

    #[error("target is friendly")]
    FriendlyTarget,

    #[error("target is not at the same planet")]
    OutOfRange,

    #[error("planet has no buildings to bombard")]
    NoBuildings,

    #[error("repairs need an own planet with a shipyard")]
    NoShipyard,

    #[error("ship is not damaged")]
    NotDamaged,

    #[error("planet is already owned")]
    AlreadyOwned,

    #[error("need {required} settlers aboard, have {available}")]
    NotEnoughSettlers { available: u32, required: u32 },

    #[error("amount must be greater than zero")]
    ZeroAmount,
}

// ---------------------------------------------------------------------------
// Ship
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ship {
    pub id: ShipId,
    pub class: ShipClass,
    pub owner: PlayerId,
    pub health: u32,
    pub fleet: Option<FleetId>,
    pub cargo: Cargo,
    pub activity: ShipActivity,
}

/// A timed activity that finished during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityDone {
    Mined { planet: PlanetId, minerals: u32 },
    CooledDown { planet: PlanetId },
    Repaired { planet: PlanetId },
}

impl Ship {
    pub fn new(id: ShipId, class: ShipClass, owner: PlayerId, planet: PlanetId) -> Self {
        Self {
            id,
            class,
            owner,
            health: class.stats().health,
            fleet: None,
            cargo: Cargo::default(),
            activity: ShipActivity::Docked { planet },
        }
    }

    pub fn stats(&self) -> ClassStats {
        self.class.stats()
    }

    /// Planet the ship is at. `None` in transit or when destroyed.
    pub fn current_planet(&self) -> Option<PlanetId> {
        match self.activity {
            ShipActivity::Docked { planet }
            | ShipActivity::Mining { planet, .. }
            | ShipActivity::Attacking { planet, .. }
            | ShipActivity::Repairing { planet, .. } => Some(planet),
            ShipActivity::Moving(_) | ShipActivity::Destroyed => None,
        }
    }

    pub fn status(&self) -> ShipStatus {
        match self.activity {
            ShipActivity::Docked { .. } => ShipStatus::Idle,
            ShipActivity::Moving(_) => ShipStatus::Moving,
            ShipActivity::Mining { .. } => ShipStatus::Mining,
            ShipActivity::Attacking { .. } => ShipStatus::Attacking,
            ShipActivity::Repairing { .. } => ShipStatus::Repairing,
            ShipActivity::Destroyed => ShipStatus::Destroyed,
        }
    }

    pub fn movement(&self) -> Option<&Movement> {
        match &self.activity {
            ShipActivity::Moving(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_destroyed(&self) -> bool {
        matches!(self.activity, ShipActivity::Destroyed)
    }

    pub fn is_moving(&self) -> bool {
        matches!(self.activity, ShipActivity::Moving(_))
    }

    /// Docked planet when idle; the error names the blocking state otherwise.
    pub fn idle_planet(&self) -> Result<PlanetId, ShipActionError> {
        match self.activity {
            ShipActivity::Docked { planet } => Ok(planet),
            ShipActivity::Destroyed => Err(ShipActionError::ShipDestroyed),
            ShipActivity::Moving(_) => Err(ShipActionError::NotDocked),
            _ => Err(ShipActionError::Busy {
                activity: self.status().name(),
            }),
        }
    }

    pub fn free_cargo(&self) -> u32 {
        self.stats().cargo_capacity.saturating_sub(self.cargo.total())
    }

    pub fn max_health(&self) -> u32 {
        self.stats().health
    }

    /// Subtract `damage` from health. Returns true when the ship dies.
    pub fn take_damage(&mut self, damage: u32) -> bool {
        self.health = self.health.saturating_sub(damage);
        if self.health == 0 {
            self.activity = ShipActivity::Destroyed;
            self.fleet = None;
            true
        } else {
            false
        }
    }

    /// Finish the current timed activity if it is due.
    pub fn finish_activity(&mut self, now: Timestamp, config: &GameConfig) -> Option<ActivityDone> {
        let done = match self.activity {
            ShipActivity::Mining { planet, until } if until <= now => {
                let minerals = config.mining_yield.min(self.free_cargo());
                self.cargo.minerals = self.cargo.minerals.saturating_add(minerals);
                ActivityDone::Mined { planet, minerals }
            }
            ShipActivity::Attacking { planet, until } if until <= now => {
                ActivityDone::CooledDown { planet }
            }
            ShipActivity::Repairing { planet, until } if until <= now => {
                self.health = self.max_health();
                ActivityDone::Repaired { planet }
            }
            _ => return None,
        };
        let planet = match done {
            ActivityDone::Mined { planet, .. }
            | ActivityDone::CooledDown { planet }
            | ActivityDone::Repaired { planet } => planet,
        };
        self.activity = ShipActivity::Docked { planet };
        Some(done)
    }
}

/// Damage dealt by an attack: `max(attack - defense / 2, 1)`.
pub fn attack_damage(attack: u32, defense: u32) -> u32 {
    attack.saturating_sub(defense / 2).max(1)
}
