//! Deterministic world generation.

use crate::catalog::{BuildingType, Catalog};
use crate::config::{ConfigError, GameConfig};
use crate::id::{PlanetId, PlayerId, ShipId};
use crate::movement::Position;
use crate::planet::{MAX_SIZE, MIN_SIZE};
use crate::rng::SimRng;
use crate::ship::ShipClass;
use crate::time::Timestamp;
use crate::universe::Universe;
use std::collections::BTreeMap;
use tracing::info;

/// Placement attempts per planet before giving up.
const MAX_ATTEMPTS: u32 = 200;

/// Home planets are at least this large.
const HOME_MIN_SIZE: u8 = 5;

const STARTER_CLASS: ShipClass = ShipClass::Scout;

const NAMES: [&str; 12] = [
    "Achernar", "Bellatrix", "Capella", "Deneb", "Elnath", "Fomalhaut", "Gienah", "Hadar", "Izar",
    "Kochab", "Lesath", "Mirach",
];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorldGenError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{players} players need at least as many planets, have {planets}")]
    TooManyPlayers { players: usize, planets: usize },

    #[error("placed {placed} of {requested} planets; map too small for the minimum distance")]
    MapTooCrowded { placed: usize, requested: usize },
}

/// A generated universe with each player's home planet and starter ship.
#[derive(Debug)]
pub struct GeneratedWorld {
    pub universe: Universe,
    pub homes: BTreeMap<PlayerId, PlanetId>,
    pub starter_ships: BTreeMap<PlayerId, ShipId>,
}

/// Build a universe from `config.world`. The same seed always yields the
/// same map.
pub fn generate_world(
    config: GameConfig,
    catalog: Catalog,
    players: &[(PlayerId, String)],
    now: Timestamp,
) -> Result<GeneratedWorld, WorldGenError> {
    let world = config.world.clone();
    if players.len() > world.planet_count {
        return Err(WorldGenError::TooManyPlayers {
            players: players.len(),
            planets: world.planet_count,
        });
    }
    let mut universe = Universe::new(config, catalog)?;
    let mut rng = SimRng::new(world.seed);

    let mut placed: Vec<Position> = Vec::with_capacity(world.planet_count);
    let mut planet_ids = Vec::with_capacity(world.planet_count);
    for index in 0..world.planet_count {
        let position = (0..MAX_ATTEMPTS)
            .map(|_| {
                Position::new(
                    rng.range_f64(0.0, world.map_width),
                    rng.range_f64(0.0, world.map_height),
                )
            })
            .find(|candidate| {
                placed
                    .iter()
                    .all(|p| p.distance_to(candidate) >= world.min_planet_distance)
            })
            .ok_or(WorldGenError::MapTooCrowded {
                placed: placed.len(),
                requested: world.planet_count,
            })?;
        let size = rng.range_u32(u32::from(MIN_SIZE), u32::from(MAX_SIZE)) as u8;
        let name = format!("{} {}", NAMES[index % NAMES.len()], index / NAMES.len() + 1);
        planet_ids.push(universe.add_planet(name, position, size, now));
        placed.push(position);
    }

    let mut homes = BTreeMap::new();
    let mut starter_ships = BTreeMap::new();
    let starting = universe.config.world.starting_resources.to_resources();
    for (k, (player, name)) in players.iter().enumerate() {
        // spread homes evenly over the placement order
        let home = planet_ids[k * planet_ids.len() / players.len()];
        universe.add_player(*player, name.clone());
        if let Some(planet) = universe.planets.get_mut(home) {
            planet.owner = Some(*player);
            planet.size = planet.size.max(HOME_MIN_SIZE);
            planet.stock = starting;
        }
        universe.place_building(home, BuildingType::CommandCenter, 1);
        if let Ok(ship) = universe.spawn_ship(*player, STARTER_CLASS, home) {
            starter_ships.insert(*player, ship);
        }
        homes.insert(*player, home);
    }

    info!(
        target: "starhold::worldgen",
        planets = planet_ids.len(),
        players = players.len(),
        seed = world.seed,
        "world generated"
    );
    Ok(GeneratedWorld {
        universe,
        homes,
        starter_ships,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;

    fn players(n: u32) -> Vec<(PlayerId, String)> {
        (1..=n).map(|i| (PlayerId(i), format!("player {i}"))).collect()
    }

    fn small_config(seed: u64) -> GameConfig {
        GameConfig {
            world: WorldConfig {
                planet_count: 20,
                seed,
                ..WorldConfig::default()
            },
            ..GameConfig::default()
        }
    }

    #[test]
    fn planets_respect_bounds_and_distance() {
        let world = generate_world(small_config(1), Catalog::default(), &players(2), 0).unwrap();
        let u = &world.universe;
        assert_eq!(u.planet_count(), 20);
        let planets: Vec<_> = u.planets().map(|(_, p)| p).collect();
        for (i, a) in planets.iter().enumerate() {
            assert!((MIN_SIZE..=MAX_SIZE).contains(&a.size));
            assert!(a.position.x >= 0.0 && a.position.x < 2_000.0);
            for b in &planets[i + 1..] {
                assert!(a.position.distance_to(&b.position) >= 60.0);
            }
        }
    }

    #[test]
    fn homes_are_equipped() {
        let world = generate_world(small_config(1), Catalog::default(), &players(3), 0).unwrap();
        assert_eq!(world.homes.len(), 3);
        for (player, home) in &world.homes {
            let planet = world.universe.planet(*home).unwrap();
            assert_eq!(planet.owner, Some(*player));
            assert_eq!(planet.command_center_level(), 1);
            assert!(planet.size >= HOME_MIN_SIZE);
            assert_eq!(planet.queue.capacity(), 3);
            let ship = world.universe.ship(world.starter_ships[player]).unwrap();
            assert_eq!(ship.current_planet(), Some(*home));
        }
    }

    #[test]
    fn same_seed_same_map() {
        let a = generate_world(small_config(9), Catalog::default(), &players(2), 0).unwrap();
        let b = generate_world(small_config(9), Catalog::default(), &players(2), 0).unwrap();
        assert_eq!(a.universe.compute_state_hash(), b.universe.compute_state_hash());
        let pos = |w: &GeneratedWorld| w.universe.planets().map(|(_, p)| p.position).collect::<Vec<_>>();
        assert_eq!(pos(&a), pos(&b));
        let c = generate_world(small_config(10), Catalog::default(), &players(2), 0).unwrap();
        assert_ne!(pos(&a), pos(&c));
    }

    #[test]
    fn crowded_map_fails() {
        let config = GameConfig {
            world: WorldConfig {
                planet_count: 50,
                map_width: 100.0,
                map_height: 100.0,
                min_planet_distance: 60.0,
                ..WorldConfig::default()
            },
            ..GameConfig::default()
        };
        assert!(matches!(
            generate_world(config, Catalog::default(), &[], 0),
            Err(WorldGenError::MapTooCrowded { .. })
        ));
    }

    #[test]
    fn more_players_than_planets_fails() {
        let config = GameConfig {
            world: WorldConfig {
                planet_count: 1,
                ..WorldConfig::default()
            },
            ..GameConfig::default()
        };
        assert_eq!(
            generate_world(config, Catalog::default(), &players(2), 0).unwrap_err(),
            WorldGenError::TooManyPlayers {
                players: 2,
                planets: 1
            }
        );
    }
}
