//! Starhold Core -- the simulation engine of a persistent multiplayer space
//! strategy universe.
//!
//! Players own planets, queue building construction, and move ships and
//! fleets between planets. Everything time-based is advanced by one call:
//! [`universe::Universe::step`], which takes the current time explicitly.
//!
//! # Tick Pipeline
//!
//! 1. **Production** -- integrate resources and population, finish due upgrades.
//! 2. **Construction** -- complete due orders and promote the next one.
//! 3. **Movement** -- dock ships and fleets whose arrival time has passed.
//! 4. **Activity** -- finish mining runs, weapon cooldowns and repairs.
//! 5. **Bookkeeping** -- bump the tick counter, hash the state, record events.
//!
//! Commands ([`command::Command`]) mutate the universe between steps and
//! never complete anything themselves.
//!
//! # Key Types
//!
//! - [`universe::Universe`] -- owned registries and the tick pipeline.
//! - [`queue::ConstructionQueue`] -- per-planet chained build orders.
//! - [`movement::Movement`] -- one trip between two planets.
//! - [`catalog::Catalog`] -- building cost, time and production table.
//! - [`snapshot::UniverseSnapshot`] -- owned view for broadcasting.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for resource amounts.

pub mod build;
pub mod building;
pub mod catalog;
pub mod combat;
pub mod command;
pub mod config;
pub mod event;
pub mod fixed;
pub mod fleet;
pub mod id;
pub mod movement;
pub mod navigation;
pub mod planet;
pub mod production;
pub mod queue;
pub mod resources;
pub mod rng;
pub mod ship;
pub mod sim;
pub mod snapshot;
pub mod time;
pub mod universe;
pub mod worldgen;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
