//! Simulation events and the recent-event ring buffer.
//!
//! Events are produced by commands (order accepted, colonization, combat)
//! and by the tick phases (completions, arrivals). They are collected into
//! each [`crate::sim::TickReport`] and copied into an [`EventBuffer`] that
//! keeps the most recent ones for late subscribers.

use crate::catalog::BuildingType;
use crate::id::{BuildingId, FleetId, OrderId, PlanetId, PlayerId, ShipId};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A simulation event. All events carry the timestamp at which they occurred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // -- Construction --
    OrderStarted {
        planet: PlanetId,
        order: OrderId,
        kind: BuildingType,
        target_level: u32,
        completion: Timestamp,
        at: Timestamp,
    },
    OrderCompleted {
        planet: PlanetId,
        order: OrderId,
        building: BuildingId,
        kind: BuildingType,
        level: u32,
        at: Timestamp,
    },
    BuildingUpgraded {
        planet: PlanetId,
        building: BuildingId,
        level: u32,
        at: Timestamp,
    },
    BuildingDestroyed {
        planet: PlanetId,
        building: BuildingId,
        kind: BuildingType,
        at: Timestamp,
    },

    // -- Movement --
    ShipArrived {
        ship: ShipId,
        planet: PlanetId,
        combat: bool,
        at: Timestamp,
    },
    FleetArrived {
        fleet: FleetId,
        planet: PlanetId,
        combat: bool,
        at: Timestamp,
    },

    // -- Ship activity --
    ShipDestroyed {
        ship: ShipId,
        owner: PlayerId,
        by: Option<ShipId>,
        at: Timestamp,
    },
    MiningCompleted {
        ship: ShipId,
        planet: PlanetId,
        minerals: u32,
        at: Timestamp,
    },
    RepairCompleted {
        ship: ShipId,
        planet: PlanetId,
        at: Timestamp,
    },
    PlanetColonized {
        planet: PlanetId,
        owner: PlayerId,
        ship: ShipId,
        at: Timestamp,
    },
    FleetDisbanded {
        fleet: FleetId,
        at: Timestamp,
    },
}

/// Discriminant tag for event types, used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    OrderStarted,
    OrderCompleted,
    BuildingUpgraded,
    BuildingDestroyed,
    ShipArrived,
    FleetArrived,
    ShipDestroyed,
    MiningCompleted,
    RepairCompleted,
    PlanetColonized,
    FleetDisbanded,
}

impl Event {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::OrderStarted { .. } => EventKind::OrderStarted,
            Event::OrderCompleted { .. } => EventKind::OrderCompleted,
            Event::BuildingUpgraded { .. } => EventKind::BuildingUpgraded,
            Event::BuildingDestroyed { .. } => EventKind::BuildingDestroyed,
            Event::ShipArrived { .. } => EventKind::ShipArrived,
            Event::FleetArrived { .. } => EventKind::FleetArrived,
            Event::ShipDestroyed { .. } => EventKind::ShipDestroyed,
            Event::MiningCompleted { .. } => EventKind::MiningCompleted,
            Event::RepairCompleted { .. } => EventKind::RepairCompleted,
            Event::PlanetColonized { .. } => EventKind::PlanetColonized,
            Event::FleetDisbanded { .. } => EventKind::FleetDisbanded,
        }
    }

    /// When the event occurred.
    pub fn at(&self) -> Timestamp {
        match *self {
            Event::OrderStarted { at, .. }
            | Event::OrderCompleted { at, .. }
            | Event::BuildingUpgraded { at, .. }
            | Event::BuildingDestroyed { at, .. }
            | Event::ShipArrived { at, .. }
            | Event::FleetArrived { at, .. }
            | Event::ShipDestroyed { at, .. }
            | Event::MiningCompleted { at, .. }
            | Event::RepairCompleted { at, .. }
            | Event::PlanetColonized { at, .. }
            | Event::FleetDisbanded { at, .. } => at,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBuffer
// ---------------------------------------------------------------------------

/// Recent events, oldest first. Holds at most `capacity` entries; pushing
/// into a full buffer evicts the oldest.
#[derive(Debug, Clone)]
pub struct EventBuffer {
    events: VecDeque<Event>,
    capacity: usize,
    /// Every event ever pushed, evicted ones included.
    total_written: u64,
}

impl EventBuffer {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            total_written: 0,
        }
    }

    pub fn push(&mut self, event: Event) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
        self.total_written += 1;
    }

    pub fn extend<'a>(&mut self, events: impl IntoIterator<Item = &'a Event>) {
        for event in events {
            self.push(event.clone());
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Events evicted to make room.
    pub fn dropped_count(&self) -> u64 {
        self.total_written - self.events.len() as u64
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Event> + '_ {
        self.events.iter()
    }

    /// The newest `n` events, oldest first.
    pub fn latest(&self, n: usize) -> Vec<Event> {
        let skip = self.events.len().saturating_sub(n);
        self.events.iter().skip(skip).cloned().collect()
    }

    /// Forget held events. `total_written` keeps counting.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

// ===========================================================================
// Tests
// ===========================================================================
