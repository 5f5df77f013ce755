//! Data directory to running server: load the bundled assets, generate a
//! world, and drive it through the tick loop with a manual clock.

use crossbeam_channel::unbounded;
use proptest::prelude::*;
use starhold_core::catalog::Catalog;
use starhold_core::command::{Command, CommandOutput};
use starhold_core::config::GameConfig;
use starhold_core::id::PlayerId;
use starhold_core::ship::ShipStatus;
use starhold_core::snapshot::{decode_snapshot, encode_snapshot, read_snapshot_header};
use starhold_core::time::ManualClock;
use starhold_core::worldgen::generate_world;
use starhold_data::load_game_data;
use starhold_server::{ChannelSink, TickLoop};
use std::path::Path;
use std::sync::Arc;

fn assets() -> &'static Path {
    Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/../starhold-data/assets"))
}

fn players(n: u32) -> Vec<(PlayerId, String)> {
    (1..=n).map(|i| (PlayerId(i), format!("P{i}"))).collect()
}

#[test]
fn starter_scout_explores_through_the_tick_loop() {
    let data = load_game_data(assets()).unwrap();
    let world = generate_world(data.config, data.catalog, &players(3), 0).unwrap();
    let me = PlayerId(1);
    let home = world.homes[&me];
    let scout = world.starter_ships[&me];
    let target = world
        .universe
        .planets()
        .find(|(_, p)| p.owner.is_none())
        .map(|(id, _)| id)
        .unwrap();

    let clock = Arc::new(ManualClock::new(0));
    let (tx, rx) = unbounded();
    let (mut tick_loop, ingress) = TickLoop::new(world.universe, clock.clone(), Box::new(ChannelSink::new(tx)));

    let reply = ingress
        .submit(
            me,
            Command::MoveShip {
                ship: scout,
                destination: target,
                allow_combat: false,
            },
        )
        .unwrap();
    tick_loop.run_cycle().unwrap();
    let arrives_at = match reply.recv().unwrap().data {
        Some(CommandOutput::Movement(out)) => out.movement.arrives_at,
        other => panic!("unexpected output: {other:?}"),
    };
    let departed = rx.recv().unwrap();
    assert_eq!(departed.ship(scout).unwrap().status, ShipStatus::Moving);

    clock.set(arrives_at);
    tick_loop.run_cycle().unwrap();
    let arrived = rx.recv().unwrap();
    let view = arrived.ship(scout).unwrap();
    assert_eq!(view.status, ShipStatus::Idle);
    assert_eq!(view.planet, Some(target));
    assert_ne!(view.planet, Some(home));

    let bytes = encode_snapshot(&arrived).unwrap();
    assert_eq!(read_snapshot_header(&bytes).unwrap().tick, arrived.tick);
    assert_eq!(decode_snapshot(&bytes).unwrap().state_hash, arrived.state_hash);
}

#[test]
fn same_seed_same_world() {
    let a = generate_world(GameConfig::default(), Catalog::default(), &players(2), 0).unwrap();
    let b = generate_world(GameConfig::default(), Catalog::default(), &players(2), 0).unwrap();
    assert_eq!(a.universe.state_hash(), b.universe.state_hash());
    assert_eq!(a.homes, b.homes);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Generated planets respect the minimum spacing and every player gets
    /// a distinct owned home.
    #[test]
    fn generated_worlds_are_well_formed(seed in any::<u64>(), count in 1u32..5) {
        let mut config = GameConfig::default();
        config.world.seed = seed;
        config.world.planet_count = 20;
        let min = config.world.min_planet_distance;
        let world = generate_world(config, Catalog::default(), &players(count), 0).unwrap();

        let planets: Vec<_> = world.universe.planets().map(|(_, p)| p.position).collect();
        for (i, a) in planets.iter().enumerate() {
            for b in &planets[i + 1..] {
                prop_assert!(a.distance_to(b) >= min);
            }
        }
        prop_assert_eq!(world.homes.len(), count as usize);
        for (player, home) in &world.homes {
            prop_assert_eq!(world.universe.planet(*home).unwrap().owner, Some(*player));
        }
    }
}
