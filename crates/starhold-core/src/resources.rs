//! Resource stock and cost arithmetic.
//!
//! Every amount is a [`Fixed64`]. Stored stock is never negative: all
//! subtraction goes through [`Resources::try_spend`] (which refuses) or
//! [`Resources::floor_zero`] (which clamps).

use crate::fixed::{Fixed64, f64_to_fixed64, fixed64_to_f64};
use serde::{Deserialize, Serialize};

/// One of the five tracked resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Minerals,
    Energy,
    Credits,
    Population,
    Research,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Minerals,
        ResourceKind::Energy,
        ResourceKind::Credits,
        ResourceKind::Population,
        ResourceKind::Research,
    ];
}

/// An amount of each resource. Used for planet stock, costs, and rates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    pub minerals: Fixed64,
    pub energy: Fixed64,
    pub credits: Fixed64,
    pub population: Fixed64,
    pub research: Fixed64,
}

impl Resources {
    pub const ZERO: Resources = Resources {
        minerals: Fixed64::ZERO,
        energy: Fixed64::ZERO,
        credits: Fixed64::ZERO,
        population: Fixed64::ZERO,
        research: Fixed64::ZERO,
    };

    /// Build from plain numbers. Initialization and config only.
    pub fn from_f64(minerals: f64, energy: f64, credits: f64, population: f64, research: f64) -> Self {
        Self {
            minerals: f64_to_fixed64(minerals),
            energy: f64_to_fixed64(energy),
            credits: f64_to_fixed64(credits),
            population: f64_to_fixed64(population),
            research: f64_to_fixed64(research),
        }
    }

    /// A cost in minerals, energy and credits.
    pub fn cost(minerals: f64, energy: f64, credits: f64) -> Self {
        Self::from_f64(minerals, energy, credits, 0.0, 0.0)
    }

    pub fn get(&self, kind: ResourceKind) -> Fixed64 {
        match kind {
            ResourceKind::Minerals => self.minerals,
            ResourceKind::Energy => self.energy,
            ResourceKind::Credits => self.credits,
            ResourceKind::Population => self.population,
            ResourceKind::Research => self.research,
        }
    }

    pub fn get_mut(&mut self, kind: ResourceKind) -> &mut Fixed64 {
        match kind {
            ResourceKind::Minerals => &mut self.minerals,
            ResourceKind::Energy => &mut self.energy,
            ResourceKind::Credits => &mut self.credits,
            ResourceKind::Population => &mut self.population,
            ResourceKind::Research => &mut self.research,
        }
    }

    /// Component-wise saturating sum.
    pub fn plus(&self, other: &Resources) -> Resources {
        let mut out = *self;
        for kind in ResourceKind::ALL {
            let slot = out.get_mut(kind);
            *slot = slot.saturating_add(other.get(kind));
        }
        out
    }

    /// Multiply every component by `factor`, saturating.
    pub fn scaled(&self, factor: Fixed64) -> Resources {
        let mut out = *self;
        for kind in ResourceKind::ALL {
            let slot = out.get_mut(kind);
            *slot = slot.saturating_mul(factor);
        }
        out
    }

    /// Clamp every negative component to zero.
    pub fn floor_zero(&mut self) {
        for kind in ResourceKind::ALL {
            let slot = self.get_mut(kind);
            if *slot < Fixed64::ZERO {
                *slot = Fixed64::ZERO;
            }
        }
    }

    /// Whether every component of `cost` is covered by this stock.
    pub fn can_afford(&self, cost: &Resources) -> bool {
        ResourceKind::ALL
            .iter()
            .all(|&kind| self.get(kind) >= cost.get(kind))
    }

    /// How much of each resource is missing to pay `cost`. Zero where the
    /// stock suffices.
    pub fn shortfall(&self, cost: &Resources) -> Resources {
        let mut missing = Resources::ZERO;
        for kind in ResourceKind::ALL {
            let have = self.get(kind);
            let need = cost.get(kind);
            if need > have {
                *missing.get_mut(kind) = need - have;
            }
        }
        missing
    }

    /// Deduct `cost`, or return the shortfall and leave the stock untouched.
    pub fn try_spend(&mut self, cost: &Resources) -> Result<(), Resources> {
        if !self.can_afford(cost) {
            return Err(self.shortfall(cost));
        }
        for kind in ResourceKind::ALL {
            let slot = self.get_mut(kind);
            *slot -= cost.get(kind);
        }
        Ok(())
    }

    /// Whether every component is zero.
    pub fn is_zero(&self) -> bool {
        ResourceKind::ALL
            .iter()
            .all(|&kind| self.get(kind) == Fixed64::ZERO)
    }

    /// Whether no component is negative.
    pub fn is_non_negative(&self) -> bool {
        ResourceKind::ALL
            .iter()
            .all(|&kind| self.get(kind) >= Fixed64::ZERO)
    }
}

impl std::fmt::Display for Resources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "minerals={:.1} energy={:.1} credits={:.1} population={:.1} research={:.1}",
            fixed64_to_f64(self.minerals),
            fixed64_to_f64(self.energy),
            fixed64_to_f64(self.credits),
            fixed64_to_f64(self.population),
            fixed64_to_f64(self.research),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_spend_deducts_when_affordable() {
        let mut stock = Resources::cost(100.0, 50.0, 10.0);
        stock.try_spend(&Resources::cost(60.0, 50.0, 0.0)).unwrap();
        assert_eq!(stock, Resources::cost(40.0, 0.0, 10.0));
    }

    #[test]
    fn try_spend_reports_shortfall_and_keeps_stock() {
        let mut stock = Resources::cost(10.0, 5.0, 0.0);
        let missing = stock.try_spend(&Resources::cost(30.0, 5.0, 2.0)).unwrap_err();
        assert_eq!(missing, Resources::cost(20.0, 0.0, 2.0));
        assert_eq!(stock, Resources::cost(10.0, 5.0, 0.0));
    }

    #[test]
    fn floor_zero_clamps_negative_components() {
        let mut r = Resources::from_f64(-1.0, 2.0, -0.5, 0.0, 3.0);
        r.floor_zero();
        assert_eq!(r, Resources::from_f64(0.0, 2.0, 0.0, 0.0, 3.0));
        assert!(r.is_non_negative());
    }

    #[test]
    fn plus_and_scaled() {
        let a = Resources::cost(1.0, 2.0, 3.0);
        let b = a.plus(&a).scaled(f64_to_fixed64(0.5));
        assert_eq!(b, a);
    }

    #[test]
    fn zero_is_zero() {
        assert!(Resources::ZERO.is_zero());
        assert!(!Resources::cost(0.0, 0.0, 1.0).is_zero());
    }
}
