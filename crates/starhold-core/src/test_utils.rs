//! Shared fixtures for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`.

use crate::catalog::{BuildingType, Catalog};
use crate::config::GameConfig;
use crate::fixed::Fixed64;
use crate::id::{PlanetId, PlayerId};
use crate::movement::Position;
use crate::resources::Resources;
use crate::ship::ShipClass;
use crate::universe::Universe;

pub const PLAYER: PlayerId = PlayerId(1);
pub const RIVAL: PlayerId = PlayerId(2);

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Empty universe with default config and catalog.
pub fn universe() -> Universe {
    Universe::new(GameConfig::default(), Catalog::default()).expect("default config is valid")
}

/// Two planets 100 units apart. `home` belongs to [`PLAYER`] with a
/// level 1 command center and a generous stock; `away` is unowned.
pub struct HomeWorld {
    pub universe: Universe,
    pub home: PlanetId,
    pub away: PlanetId,
}

pub fn home_world() -> HomeWorld {
    let mut universe = universe();
    universe.add_player(PLAYER, "Vega");
    universe.add_player(RIVAL, "Rigel");
    let home = universe.add_planet("Home", Position::new(0.0, 0.0), 6, 0);
    let away = universe.add_planet("Away", Position::new(100.0, 0.0), 4, 0);
    universe.set_owner(home, Some(PLAYER));
    universe
        .place_building(home, BuildingType::CommandCenter, 1)
        .expect("home has free slots");
    universe.planet_mut(home).expect("home exists").stock = rich_stock();
    HomeWorld {
        universe,
        home,
        away,
    }
}

pub fn rich_stock() -> Resources {
    Resources::from_f64(5_000.0, 2_000.0, 2_000.0, 200.0, 0.0)
}

/// A universe with `planets` owned, producing planets in a grid and
/// `ships` ships shuttling between neighbours. For benchmarks.
pub fn busy_universe(planets: usize, ships: usize) -> Universe {
    let mut u = universe();
    u.add_player(PLAYER, "Vega");
    let side = (planets as f64).sqrt().ceil().max(1.0) as usize;
    let ids: Vec<PlanetId> = (0..planets)
        .map(|i| {
            let pos = Position::new((i % side) as f64 * 50.0, (i / side) as f64 * 50.0);
            let id = u.add_planet(format!("P{i}"), pos, 8, 0);
            u.set_owner(id, Some(PLAYER));
            u.place_building(id, BuildingType::CommandCenter, 1);
            u.place_building(id, BuildingType::MetalMine, 3);
            u.place_building(id, BuildingType::EnergyPlant, 3);
            u.place_building(id, BuildingType::Habitat, 1);
            u.planet_mut(id).expect("just added").stock = rich_stock();
            id
        })
        .collect();
    if ids.len() < 2 {
        return u;
    }
    for i in 0..ships {
        let from = ids[i % ids.len()];
        let to = ids[(i + 1) % ids.len()];
        if let Ok(ship) = u.spawn_ship(PLAYER, ShipClass::ALL[i % ShipClass::ALL.len()], from) {
            let _ = u.move_ship(PLAYER, ship, to, true, 0);
        }
    }
    u
}
