use crate::catalog::BuildingType;
use crate::id::BuildingId;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// Damage at which a building is destroyed.
pub const MAX_DAMAGE: u8 = 100;

/// Whether a building is being upgraded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpgradeState {
    #[default]
    Idle,
    /// Reaches `target_level` at `until`. Produces nothing meanwhile.
    Upgrading { target_level: u32, until: Timestamp },
}

/// A building standing on a planet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    pub id: BuildingId,
    pub kind: BuildingType,
    pub level: u32,
    /// Slot index on the planet surface.
    pub slot: u32,
    pub upgrade: UpgradeState,
    /// 0..=100. The building is removed when this reaches [`MAX_DAMAGE`].
    pub damage: u8,
}

impl Building {
    pub fn new(id: BuildingId, kind: BuildingType, level: u32, slot: u32) -> Self {
        Self {
            id,
            kind,
            level,
            slot,
            upgrade: UpgradeState::Idle,
            damage: 0,
        }
    }

    pub fn is_upgrading(&self) -> bool {
        matches!(self.upgrade, UpgradeState::Upgrading { .. })
    }

    /// Finish the upgrade if it is due. Returns the level when it completes.
    /// Setting the level to the target (rather than incrementing) keeps this
    /// idempotent with the construction queue applying the same order. A
    /// target more than one level up is left for the queue to report.
    pub fn complete_upgrade_if_due(&mut self, now: Timestamp) -> Option<u32> {
        match self.upgrade {
            UpgradeState::Upgrading {
                target_level,
                until,
            } if until <= now => {
                self.upgrade = UpgradeState::Idle;
                if target_level > self.level.saturating_add(1) {
                    return None;
                }
                self.level = self.level.max(target_level);
                Some(self.level)
            }
            _ => None,
        }
    }

    /// Add damage, saturating at [`MAX_DAMAGE`]. Returns true when the
    /// building is destroyed by this hit.
    pub fn apply_damage(&mut self, amount: u8) -> bool {
        self.damage = self.damage.saturating_add(amount).min(MAX_DAMAGE);
        self.damage >= MAX_DAMAGE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mine() -> Building {
        Building::new(BuildingId(1), BuildingType::MetalMine, 1, 0)
    }

    #[test]
    fn upgrade_completes_when_due() {
        let mut b = mine();
        b.upgrade = UpgradeState::Upgrading {
            target_level: 2,
            until: 1_000,
        };
        assert_eq!(b.complete_upgrade_if_due(999), None);
        assert!(b.is_upgrading());
        assert_eq!(b.complete_upgrade_if_due(1_000), Some(2));
        assert!(!b.is_upgrading());
        assert_eq!(b.complete_upgrade_if_due(2_000), None);
        assert_eq!(b.level, 2);
    }

    #[test]
    fn upgrade_never_lowers_level() {
        let mut b = mine();
        b.level = 3;
        b.upgrade = UpgradeState::Upgrading {
            target_level: 3,
            until: 0,
        };
        assert_eq!(b.complete_upgrade_if_due(0), Some(3));
    }

    #[test]
    fn upgrade_marker_never_skips_a_level() {
        let mut b = mine();
        b.upgrade = UpgradeState::Upgrading {
            target_level: 3,
            until: 0,
        };
        assert_eq!(b.complete_upgrade_if_due(0), None);
        assert_eq!(b.level, 1);
        assert!(!b.is_upgrading());
    }

    #[test]
    fn damage_saturates_and_destroys() {
        let mut b = mine();
        assert!(!b.apply_damage(60));
        assert!(b.apply_damage(60));
        assert_eq!(b.damage, MAX_DAMAGE);
    }
}
