//! Tick bookkeeping: counters, state hash, per-tick report and faults.

use crate::event::Event;
use crate::fixed::Fixed64;
use crate::id::{FleetId, OrderId, PlanetId, ShipId};
use crate::movement::Mover;
use crate::queue::QueueFault;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Simulation state
// ---------------------------------------------------------------------------

/// Counters tracked by the universe across ticks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimState {
    /// Incremented by 1 for each completed step.
    pub tick: u64,
    /// `now` of the most recent step.
    pub last_step: Option<Timestamp>,
}

impl SimState {
    pub fn new() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Faults
// ---------------------------------------------------------------------------

/// An unexpected inconsistency found mid-tick. The affected entity's update
/// is skipped for this tick; everything else proceeds.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimFault {
    #[error("planet {planet:?}: corrupt construction queue: {source}")]
    CorruptQueue {
        planet: PlanetId,
        #[source]
        source: QueueFault,
    },

    #[error("planet {planet:?}: order {order:?} completed for a building that no longer exists")]
    MissingBuilding { planet: PlanetId, order: OrderId },

    #[error("planet {planet:?}: order {order:?} targets level {target} but the building is at {current}")]
    LevelMismatch {
        planet: PlanetId,
        order: OrderId,
        current: u32,
        target: u32,
    },

    #[error("{mover:?}: destination planet {planet:?} vanished")]
    MissingDestination { mover: Mover, planet: PlanetId },

    #[error("fleet {fleet:?}: member ship {ship:?} vanished")]
    MissingMember { fleet: FleetId, ship: ShipId },

    #[error("ship {ship:?} is registered as in flight but is not moving")]
    StaleInFlight { ship: ShipId },
}

// ---------------------------------------------------------------------------
// Tick report
// ---------------------------------------------------------------------------

/// Outcome of one `Universe::step`.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub tick: u64,
    pub now: Timestamp,
    pub events: Vec<Event>,
    pub faults: Vec<SimFault>,
    pub state_hash: u64,
}

impl TickReport {
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A simple deterministic hash of simulation state for divergence checks.
///
/// Uses FNV-1a (64-bit) for speed and simplicity. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_fixed64(&mut self, v: Fixed64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    /// Hashes the bit pattern, so `0.0` and `-0.0` differ.
    pub fn write_f64(&mut self, v: f64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_state_starts_at_zero() {
        let state = SimState::new();
        assert_eq!(state.tick, 0);
        assert_eq!(state.last_step, None);
    }

    #[test]
    fn state_hash_deterministic() {
        let mut h1 = StateHash::new();
        h1.write_u64(42);
        h1.write_fixed64(Fixed64::from_num(1.5));
        let mut h2 = StateHash::new();
        h2.write_u64(42);
        h2.write_fixed64(Fixed64::from_num(1.5));
        assert_eq!(h1.finish(), h2.finish());
    }

    #[test]
    fn state_hash_order_sensitive() {
        let mut h1 = StateHash::new();
        h1.write_u32(1);
        h1.write_u32(2);
        let mut h2 = StateHash::new();
        h2.write_u32(2);
        h2.write_u32(1);
        assert_ne!(h1.finish(), h2.finish());
    }

    #[test]
    fn empty_hash_is_offset() {
        assert_eq!(StateHash::new().finish(), 0xcbf29ce484222325);
    }
}
