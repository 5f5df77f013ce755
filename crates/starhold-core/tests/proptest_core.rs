//! Property-based tests for the Starhold core engine.
//!
//! Random queue operation sequences, worlds and fleets, checked against
//! the structural invariants of the simulation.

use starhold_core::catalog::{BuildingType, Catalog};
use starhold_core::movement::{Position, calculate_travel};
use starhold_core::queue::{ConstructionQueue, OrderRequest, OrderTarget};
use starhold_core::resources::Resources;
use starhold_core::ship::ShipClass;
use starhold_core::test_utils::*;
use proptest::prelude::*;

// ===========================================================================
// Generators
// ===========================================================================

#[derive(Debug, Clone)]
enum QueueOp {
    Enqueue(usize),
    /// Cancel the n-th waiting order, if any.
    Cancel(usize),
    /// Advance time by this many seconds and tick.
    Advance(u64),
}

fn arb_queue_ops(max_ops: usize) -> impl Strategy<Value = Vec<QueueOp>> {
    proptest::collection::vec(
        prop_oneof![
            (0..BuildingType::ALL.len()).prop_map(QueueOp::Enqueue),
            (0..6usize).prop_map(QueueOp::Cancel),
            (0..400u64).prop_map(QueueOp::Advance),
        ],
        1..=max_ops,
    )
}

fn arb_fleet_classes() -> impl Strategy<Value = Vec<ShipClass>> {
    proptest::collection::vec(
        (0..ShipClass::ALL.len()).prop_map(|i| ShipClass::ALL[i]),
        1..=8,
    )
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// After every enqueue, cancel and tick the waiting chain is contiguous,
    /// positions are dense, and completions strictly increase.
    #[test]
    fn queue_chain_holds_under_random_ops(ops in arb_queue_ops(40), capacity in 1usize..6) {
        let catalog = Catalog::default();
        let mut queue = ConstructionQueue::new(capacity);
        let mut now = 0u64;
        let mut slot = 0u32;

        for op in ops {
            match op {
                QueueOp::Enqueue(k) => {
                    let kind = BuildingType::ALL[k];
                    let request = OrderRequest {
                        kind,
                        target_level: 1,
                        cost: Resources::ZERO,
                        speed_bonus_level: 0,
                        target: OrderTarget::NewBuilding { slot },
                    };
                    slot += 1;
                    let before = queue.len();
                    match queue.enqueue(&catalog, request, now) {
                        Ok(order) => {
                            prop_assert_eq!(queue.len(), before + 1);
                            prop_assert!(order.completion > order.start);
                        }
                        Err(_) => prop_assert_eq!(before, capacity),
                    }
                }
                QueueOp::Cancel(n) => {
                    let target = queue.queued().nth(n).map(|o| o.id);
                    if let Some(id) = target {
                        prop_assert!(queue.cancel(id).is_ok());
                    }
                }
                QueueOp::Advance(secs) => {
                    now += secs * 1_000;
                    for done in queue.tick(now) {
                        prop_assert!(done.completion <= now);
                    }
                    if let Some(active) = queue.active() {
                        prop_assert!(active.completion > now);
                    }
                }
            }

            prop_assert!(queue.check_invariants().is_ok(), "{:?}", queue.check_invariants());
            prop_assert!(queue.len() <= capacity);
            let completions: Vec<u64> = queue.orders().map(|o| o.completion).collect();
            prop_assert!(completions.windows(2).all(|w| w[0] < w[1]));
        }
    }

    /// A second step at the same timestamp completes, arrives and produces
    /// nothing.
    #[test]
    fn repeated_step_is_idempotent(planets in 2usize..8, ships in 0usize..12, secs in 1u64..7_200) {
        let mut u = busy_universe(planets, ships);
        let now = secs * 1_000;
        u.step(now);
        let stocks: Vec<Resources> = u.planets().map(|(_, p)| p.stock).collect();
        let in_flight = u.active_movements(now).len();

        let again = u.step(now);
        prop_assert!(again.events.is_empty());
        prop_assert!(again.is_clean());
        let after: Vec<Resources> = u.planets().map(|(_, p)| p.stock).collect();
        prop_assert_eq!(stocks, after);
        prop_assert_eq!(u.active_movements(now).len(), in_flight);
    }

    /// Fleet travel time equals the travel time of its slowest member.
    #[test]
    fn fleet_moves_at_slowest_member(classes in arb_fleet_classes(), x in 10.0f64..2_000.0) {
        let mut u = universe();
        let a = u.add_planet("A", Position::new(0.0, 0.0), 5, 0);
        let b = u.add_planet("B", Position::new(x, 0.0), 5, 0);
        let ships: Vec<_> = classes
            .iter()
            .map(|&c| u.spawn_ship(PLAYER, c, a).unwrap())
            .collect();
        let fleet = u.create_fleet(PLAYER, "wing", &ships).unwrap();
        let out = u.move_fleet(PLAYER, fleet, b, false, 0).unwrap();

        let slowest = classes
            .iter()
            .map(|c| c.stats().speed)
            .fold(f64::INFINITY, f64::min);
        let expected = calculate_travel(
            Position::new(0.0, 0.0),
            Position::new(x, 0.0),
            slowest,
            u.config().fuel_per_unit,
        )
        .unwrap();
        prop_assert_eq!(out.movement.travel_secs, expected.travel_secs);
        for ship in ships {
            let m = u.ship(ship).unwrap().movement().unwrap();
            prop_assert_eq!(m.arrives_at, out.movement.arrives_at);
        }
    }
}
