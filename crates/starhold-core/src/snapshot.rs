//! Owned, immutable views of the universe for broadcasting, and their
//! binary encoding.
//!
//! A [`UniverseSnapshot`] shares nothing with the live universe, so it can
//! be handed to other threads after the lock is released.

use crate::building::Building;
use crate::event::Event;
use crate::fleet::{FleetLocation, FleetStats};
use crate::id::{FleetId, PlanetId, PlayerId, ShipId};
use crate::movement::{Movement, Position};
use crate::production::ProductionReport;
use crate::queue::{QueueStats, QueuedOrder};
use crate::resources::Resources;
use crate::ship::{Cargo, ShipClass, ShipStatus};
use crate::time::Timestamp;
use crate::universe::{Player, Universe};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying an encoded universe snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0x57A8_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Prepended to every encoded snapshot for format detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    pub tick: u64,
}

impl SnapshotHeader {
    pub fn new(tick: u64) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            tick,
        }
    }

    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanetView {
    pub id: PlanetId,
    pub name: String,
    pub owner: Option<PlayerId>,
    pub position: Position,
    pub size: u8,
    pub stock: Resources,
    pub buildings: Vec<Building>,
    pub orders: Vec<QueuedOrder>,
    pub queue: QueueStats,
    pub production: ProductionReport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipView {
    pub id: ShipId,
    pub class: ShipClass,
    pub owner: PlayerId,
    pub health: u32,
    pub max_health: u32,
    pub fleet: Option<FleetId>,
    pub cargo: Cargo,
    pub status: ShipStatus,
    pub planet: Option<PlanetId>,
    /// Interpolated while moving. `None` once destroyed.
    pub position: Option<Position>,
    pub movement: Option<Movement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetView {
    pub members: Vec<ShipId>,
    pub stats: FleetStats,
    pub position: Option<Position>,
}

/// Everything a client sees after one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseSnapshot {
    pub tick: u64,
    pub now: Timestamp,
    pub state_hash: u64,
    pub players: Vec<Player>,
    pub planets: Vec<PlanetView>,
    pub ships: Vec<ShipView>,
    pub fleets: Vec<FleetView>,
    /// Events of the most recent step.
    pub events: Vec<Event>,
}

impl UniverseSnapshot {
    pub fn planet(&self, id: PlanetId) -> Option<&PlanetView> {
        self.planets.iter().find(|p| p.id == id)
    }

    pub fn ship(&self, id: ShipId) -> Option<&ShipView> {
        self.ships.iter().find(|s| s.id == id)
    }

    pub fn fleet(&self, id: FleetId) -> Option<&FleetView> {
        self.fleets.iter().find(|f| f.stats.fleet == id)
    }
}

impl Universe {
    /// Capture an owned snapshot; positions of moving ships are
    /// interpolated at `now`.
    pub fn snapshot(&self, now: Timestamp) -> UniverseSnapshot {
        let planet_position = |id: PlanetId| self.planets.get(id).map(|p| p.position);

        let planets = self
            .planets
            .iter()
            .map(|(id, p)| PlanetView {
                id,
                name: p.name.clone(),
                owner: p.owner,
                position: p.position,
                size: p.size,
                stock: p.stock,
                buildings: p.buildings.clone(),
                orders: p.queue.orders().cloned().collect(),
                queue: p.queue.stats(now),
                production: crate::production::production_report(p, &self.catalog, &self.config),
            })
            .collect();

        let ships = self
            .ships
            .iter()
            .map(|(id, s)| {
                let movement = s.movement().cloned();
                let position = match &movement {
                    Some(m) => Some(m.position_at(now)),
                    None => s.current_planet().and_then(planet_position),
                };
                ShipView {
                    id,
                    class: s.class,
                    owner: s.owner,
                    health: s.health,
                    max_health: s.max_health(),
                    fleet: s.fleet,
                    cargo: s.cargo,
                    status: s.status(),
                    planet: s.current_planet(),
                    position,
                    movement,
                }
            })
            .collect();

        let fleets = self
            .fleets
            .iter()
            .filter_map(|(id, f)| {
                let stats = self.fleet_stats(id)?;
                let position = match &f.location {
                    FleetLocation::Docked { planet } => planet_position(*planet),
                    FleetLocation::Moving(m) => Some(m.position_at(now)),
                };
                Some(FleetView {
                    members: f.members.clone(),
                    stats,
                    position,
                })
            })
            .collect();

        UniverseSnapshot {
            tick: self.sim.tick,
            now,
            state_hash: self.state_hash,
            players: self.players.values().cloned().collect(),
            planets,
            ships,
            fleets,
            events: self.last_events.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct EncodedSnapshot {
    header: SnapshotHeader,
    snapshot: UniverseSnapshot,
}

/// Encode a snapshot with a versioned header.
pub fn encode_snapshot(snapshot: &UniverseSnapshot) -> Result<Vec<u8>, SerializeError> {
    let encoded = EncodedSnapshot {
        header: SnapshotHeader::new(snapshot.tick),
        snapshot: snapshot.clone(),
    };
    bitcode::serialize(&encoded).map_err(|e| SerializeError::Encode(e.to_string()))
}

/// Decode a snapshot produced by [`encode_snapshot`], checking the header.
pub fn decode_snapshot(data: &[u8]) -> Result<UniverseSnapshot, DeserializeError> {
    let encoded: EncodedSnapshot =
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    encoded.header.validate()?;
    Ok(encoded.snapshot)
}

/// Read only the header, for version detection.
pub fn read_snapshot_header(data: &[u8]) -> Result<SnapshotHeader, DeserializeError> {
    let encoded: EncodedSnapshot =
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    Ok(encoded.header)
}

// ===========================================================================
// Tests
// ===========================================================================
