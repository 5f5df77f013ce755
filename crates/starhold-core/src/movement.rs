//! Geometry, travel calculation and the in-transit record.

use crate::id::PlanetId;
use crate::time::{SECONDS_PER_HOUR, Timestamp, after_secs};
use serde::{Deserialize, Serialize};

/// A point on the map, in map units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Point at fraction `t` (clamped to 0..=1) along the segment to `other`.
    pub fn lerp(&self, other: &Position, t: f64) -> Position {
        let t = t.clamp(0.0, 1.0);
        Position {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a move request was refused.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MovementError {
    #[error("ship not found")]
    ShipNotFound,

    #[error("fleet not found")]
    FleetNotFound,

    #[error("ship is destroyed")]
    ShipDestroyed,

    #[error("ship belongs to a fleet; move the fleet instead")]
    ShipInFleet,

    #[error("already moving")]
    AlreadyMoving,

    #[error("ship is busy ({activity})")]
    ShipBusy { activity: &'static str },

    #[error("not docked at a planet")]
    NoOrigin,

    #[error("destination planet not found")]
    DestinationNotFound,

    #[error("destination is the current planet")]
    SameAsOrigin,

    #[error("destination is owned by {owner}; confirm combat to proceed")]
    CombatRequired {
        enemy_planet_id: PlanetId,
        owner: crate::id::PlayerId,
    },

    #[error("speed must be positive and finite, got {0}")]
    InvalidSpeed(f64),

    #[error("not moving")]
    NotMoving,

    #[error("requester does not own this unit")]
    NotOwner,
}

// ---------------------------------------------------------------------------
// Travel calculation
// ---------------------------------------------------------------------------

/// Result of [`calculate_travel`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TravelPlan {
    pub distance: f64,
    pub travel_secs: u64,
    pub fuel_cost: f64,
}

/// Distance, travel time and fuel for a straight-line trip.
///
/// `speed` is in map units per hour, so the travel time is
/// `ceil(distance / speed × 3600)` seconds. Pure and deterministic.
pub fn calculate_travel(
    origin: Position,
    destination: Position,
    speed: f64,
    fuel_per_unit: f64,
) -> Result<TravelPlan, MovementError> {
    if !speed.is_finite() || speed <= 0.0 {
        return Err(MovementError::InvalidSpeed(speed));
    }
    let distance = origin.distance_to(&destination);
    let travel_secs = (distance / speed * SECONDS_PER_HOUR).ceil() as u64;
    Ok(TravelPlan {
        distance,
        travel_secs,
        fuel_cost: distance * fuel_per_unit,
    })
}

// ---------------------------------------------------------------------------
// Movement
// ---------------------------------------------------------------------------

/// An in-transit record. Exists only inside a `Moving` state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub origin: PlanetId,
    pub destination: PlanetId,
    pub origin_position: Position,
    pub destination_position: Position,
    pub departed_at: Timestamp,
    pub arrives_at: Timestamp,
    pub distance: f64,
    pub travel_secs: u64,
    pub fuel_cost: f64,
    /// The mover accepted a hostile destination.
    pub combat: bool,
}

impl Movement {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        origin: PlanetId,
        origin_position: Position,
        destination: PlanetId,
        destination_position: Position,
        plan: &TravelPlan,
        departed_at: Timestamp,
        combat: bool,
    ) -> Self {
        Self {
            origin,
            destination,
            origin_position,
            destination_position,
            departed_at,
            arrives_at: after_secs(departed_at, plan.travel_secs),
            distance: plan.distance,
            travel_secs: plan.travel_secs,
            fuel_cost: plan.fuel_cost,
            combat,
        }
    }

    pub fn has_arrived(&self, now: Timestamp) -> bool {
        now >= self.arrives_at
    }

    /// Fraction of the trip completed at `now`, in 0..=1.
    pub fn progress(&self, now: Timestamp) -> f64 {
        let total = self.arrives_at.saturating_sub(self.departed_at);
        if total == 0 {
            return 1.0;
        }
        (now.saturating_sub(self.departed_at) as f64 / total as f64).min(1.0)
    }

    /// Interpolated map position at `now`.
    pub fn position_at(&self, now: Timestamp) -> Position {
        self.origin_position
            .lerp(&self.destination_position, self.progress(now))
    }

    pub fn remaining_secs(&self, now: Timestamp) -> u64 {
        self.arrives_at.saturating_sub(now).div_ceil(1_000)
    }
}

/// Summary of one in-flight movement, as returned by
/// `Universe::active_movements`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementView {
    pub mover: Mover,
    pub movement: Movement,
    pub position: Position,
    pub remaining_secs: u64,
}

/// Which entity a movement belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mover {
    Ship(crate::id::ShipId),
    Fleet(crate::id::FleetId),
}
