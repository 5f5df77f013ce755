use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a planet in the universe.
    pub struct PlanetId;

    /// Identifies a ship in the universe.
    pub struct ShipId;

    /// Identifies a fleet (a group of ships moving as one unit).
    pub struct FleetId;
}

/// Identifies a player. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

/// Identifies a building on its planet. Unique per planet only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuildingId(pub u32);

/// Identifies a construction order within a planet's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "player#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn player_id_equality() {
        assert_eq!(PlayerId(3), PlayerId(3));
        assert_ne!(PlayerId(3), PlayerId(4));
    }

    #[test]
    fn slot_keys_are_distinct() {
        let mut planets = SlotMap::<PlanetId, ()>::with_key();
        let a = planets.insert(());
        let b = planets.insert(());
        assert_ne!(a, b);
    }

    #[test]
    fn ids_are_hashable() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(OrderId(0), "metal mine");
        map.insert(OrderId(1), "energy plant");
        assert_eq!(map[&OrderId(1)], "energy plant");
    }
}
