//! Planets: resource stock, buildings and the construction queue.

use crate::building::{Building, UpgradeState};
use crate::catalog::{BuildingType, Catalog};
use crate::config::GameConfig;
use crate::fixed::{Fixed64, f64_to_fixed64};
use crate::id::{BuildingId, PlanetId, PlayerId};
use crate::movement::Position;
use crate::queue::{ConstructionQueue, OrderTarget, QueuedOrder};
use crate::resources::Resources;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Smallest and largest planet size.
pub const MIN_SIZE: u8 = 1;
pub const MAX_SIZE: u8 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Planet {
    pub id: PlanetId,
    pub name: String,
    pub owner: Option<PlayerId>,
    pub position: Position,
    /// 1..=10. Bounds the number of building slots.
    pub size: u8,
    pub stock: Resources,
    pub buildings: Vec<Building>,
    pub queue: ConstructionQueue,
    /// Time of the last production integration.
    pub last_produced: Timestamp,
    next_building_id: u32,
}

/// What applying a completed order changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedOrder {
    pub building: BuildingId,
    pub kind: BuildingType,
    pub level: u32,
}

/// Why a completed order could not be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyFault {
    /// The upgraded building no longer exists.
    MissingBuilding,
    /// The building is not exactly one level below the order's target.
    LevelMismatch { current: u32, target: u32 },
}

impl Planet {
    pub fn new(id: PlanetId, name: impl Into<String>, position: Position, size: u8) -> Self {
        Self {
            id,
            name: name.into(),
            owner: None,
            position,
            size: size.clamp(MIN_SIZE, MAX_SIZE),
            stock: Resources::ZERO,
            buildings: Vec::new(),
            queue: ConstructionQueue::default(),
            last_produced: 0,
            next_building_id: 0,
        }
    }

    pub fn is_owned_by(&self, player: PlayerId) -> bool {
        self.owner == Some(player)
    }

    /// Owned by someone other than `player`.
    pub fn is_hostile_to(&self, player: PlayerId) -> bool {
        self.owner.is_some_and(|owner| owner != player)
    }

    pub fn building(&self, id: BuildingId) -> Option<&Building> {
        self.buildings.iter().find(|b| b.id == id)
    }

    pub fn building_mut(&mut self, id: BuildingId) -> Option<&mut Building> {
        self.buildings.iter_mut().find(|b| b.id == id)
    }

    /// Highest level among buildings of `kind`, or 0.
    pub fn level_of(&self, kind: BuildingType) -> u32 {
        self.buildings
            .iter()
            .filter(|b| b.kind == kind)
            .map(|b| b.level)
            .max()
            .unwrap_or(0)
    }

    pub fn has_building(&self, kind: BuildingType) -> bool {
        self.buildings.iter().any(|b| b.kind == kind)
    }

    pub fn command_center_level(&self) -> u32 {
        self.level_of(BuildingType::CommandCenter)
    }

    /// Population the planet can hold.
    pub fn population_capacity(&self, catalog: &Catalog, config: &GameConfig) -> Fixed64 {
        self.buildings
            .iter()
            .fold(f64_to_fixed64(config.base_population_capacity), |acc, b| {
                acc.saturating_add(catalog.spec(b.kind).housing_at(b.level))
            })
    }

    /// Population needed to staff every building at its current level.
    pub fn required_workers(&self, catalog: &Catalog) -> Fixed64 {
        self.buildings.iter().fold(Fixed64::ZERO, |acc, b| {
            acc.saturating_add(catalog.spec(b.kind).workers_at(b.level))
        })
    }

    /// Slots taken by standing buildings and pending new-building orders.
    pub fn used_slots(&self) -> BTreeSet<u32> {
        self.buildings
            .iter()
            .map(|b| b.slot)
            .chain(self.queue.reserved_slots())
            .collect()
    }

    /// Lowest slot index that is neither built on nor reserved.
    pub fn free_slot(&self, max_slots: u32) -> Option<u32> {
        let used = self.used_slots();
        (0..max_slots).find(|slot| !used.contains(slot))
    }

    /// Place a finished building. Returns its id.
    pub fn add_building(&mut self, kind: BuildingType, level: u32, slot: u32) -> BuildingId {
        let id = BuildingId(self.next_building_id);
        self.next_building_id += 1;
        self.buildings.push(Building::new(id, kind, level, slot));
        id
    }

    pub fn remove_building(&mut self, id: BuildingId) -> Option<Building> {
        let index = self.buildings.iter().position(|b| b.id == id)?;
        Some(self.buildings.remove(index))
    }

    /// Apply a completed order to the building list. An upgrade only ever
    /// raises a building by exactly one level; one already at the target is
    /// left as is.
    pub fn apply_order(&mut self, order: &QueuedOrder) -> Result<AppliedOrder, ApplyFault> {
        match order.target {
            OrderTarget::NewBuilding { slot } => {
                let building = self.add_building(order.kind, order.target_level, slot);
                Ok(AppliedOrder {
                    building,
                    kind: order.kind,
                    level: order.target_level,
                })
            }
            OrderTarget::Upgrade { building } => {
                let b = self.building_mut(building).ok_or(ApplyFault::MissingBuilding)?;
                b.upgrade = UpgradeState::Idle;
                // Production may already have finished the upgrade marker.
                if order.target_level == b.level.saturating_add(1) {
                    b.level = order.target_level;
                } else if order.target_level != b.level {
                    return Err(ApplyFault::LevelMismatch {
                        current: b.level,
                        target: order.target_level,
                    });
                }
                Ok(AppliedOrder {
                    building,
                    kind: b.kind,
                    level: b.level,
                })
            }
        }
    }

    /// Mark the building targeted by the active order as upgrading, with the
    /// order's completion as deadline.
    pub fn sync_upgrade_marker(&mut self) {
        let Some(active) = self.queue.active() else {
            return;
        };
        let (OrderTarget::Upgrade { building }, target_level, until) =
            (active.target, active.target_level, active.completion)
        else {
            return;
        };
        if let Some(b) = self.building_mut(building)
            && b.level < target_level
        {
            b.upgrade = UpgradeState::Upgrading {
                target_level,
                until,
            };
        }
    }
}
