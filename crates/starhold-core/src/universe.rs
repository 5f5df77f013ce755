//! The universe: owned registries of players, planets, ships and fleets,
//! and the tick pipeline that advances them.
//!
//! # Tick pipeline
//!
//! Each call to [`Universe::step`] runs, in order:
//!
//! 1. **Production** -- integrate resources and population on every planet
//!    and finish due building upgrades.
//! 2. **Construction** -- tick every construction queue, apply completed
//!    orders, promote the next order.
//! 3. **Movement** -- dock every ship, then every fleet, whose arrival time
//!    has passed.
//! 4. **Activity** -- finish due mining runs, weapon cooldowns and repairs.
//! 5. **Bookkeeping** -- bump the tick counter, hash the state, record the
//!    events in the recent-event buffer.
//!
//! A fault in one entity (corrupt queue, vanished destination) is logged,
//! recorded in the [`TickReport`], and only that entity is skipped.
//!
//! Commands mutate the universe synchronously between steps. They never
//! complete anything themselves; completion is always a tick transition.

use crate::building::UpgradeState;
use crate::catalog::{BuildingType, Catalog};
use crate::config::{ConfigError, GameConfig};
use crate::event::{Event, EventBuffer};
use crate::fleet::Fleet;
use crate::id::{BuildingId, FleetId, PlanetId, PlayerId, ShipId};
use crate::movement::Position;
use crate::planet::{ApplyFault, Planet};
use crate::production::{IntegrationOutcome, ProductionReport, integrate, production_report};
use crate::queue::{OrderTarget, QueueStats};
use crate::ship::{Ship, ShipActionError, ShipActivity, ShipClass};
use crate::sim::{SimFault, SimState, StateHash, TickReport};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error, info, warn};

/// A participant. Ownership is always compared by [`PlayerId`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
}

/// The whole simulated world. Independent universes share nothing.
#[derive(Debug, Clone)]
pub struct Universe {
    pub(crate) config: GameConfig,
    pub(crate) catalog: Catalog,
    pub(crate) players: BTreeMap<PlayerId, Player>,
    pub(crate) planets: SlotMap<PlanetId, Planet>,
    pub(crate) ships: SlotMap<ShipId, Ship>,
    pub(crate) fleets: SlotMap<FleetId, Fleet>,
    /// Ships with a movement in progress, fleet members included.
    pub(crate) in_flight_ships: BTreeSet<ShipId>,
    pub(crate) in_flight_fleets: BTreeSet<FleetId>,
    /// Ships mining, cooling down or repairing.
    pub(crate) busy_ships: BTreeSet<ShipId>,
    /// Events raised by commands since the last step.
    pub(crate) pending_events: Vec<Event>,
    pub(crate) history: EventBuffer,
    pub(crate) last_events: Vec<Event>,
    pub(crate) sim: SimState,
    pub(crate) state_hash: u64,
}

impl Universe {
    /// An empty universe. Fails if `config` is unusable.
    pub fn new(config: GameConfig, catalog: Catalog) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_parts(config, catalog))
    }

    fn from_parts(config: GameConfig, catalog: Catalog) -> Self {
        let history = EventBuffer::new(config.event_history);
        Self {
            config,
            catalog,
            players: BTreeMap::new(),
            planets: SlotMap::with_key(),
            ships: SlotMap::with_key(),
            fleets: SlotMap::with_key(),
            in_flight_ships: BTreeSet::new(),
            in_flight_fleets: BTreeSet::new(),
            busy_ships: BTreeSet::new(),
            pending_events: Vec::new(),
            history,
            last_events: Vec::new(),
            sim: SimState::new(),
            state_hash: StateHash::new().finish(),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn tick(&self) -> u64 {
        self.sim.tick
    }

    pub fn last_step(&self) -> Option<Timestamp> {
        self.sim.last_step
    }

    pub fn state_hash(&self) -> u64 {
        self.state_hash
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn planet(&self, id: PlanetId) -> Option<&Planet> {
        self.planets.get(id)
    }

    pub fn planets(&self) -> impl Iterator<Item = (PlanetId, &Planet)> {
        self.planets.iter()
    }

    pub fn ship(&self, id: ShipId) -> Option<&Ship> {
        self.ships.get(id)
    }

    pub fn ships(&self) -> impl Iterator<Item = (ShipId, &Ship)> {
        self.ships.iter()
    }

    pub fn fleet(&self, id: FleetId) -> Option<&Fleet> {
        self.fleets.get(id)
    }

    pub fn fleets(&self) -> impl Iterator<Item = (FleetId, &Fleet)> {
        self.fleets.iter()
    }

    pub fn planet_count(&self) -> usize {
        self.planets.len()
    }

    pub fn ship_count(&self) -> usize {
        self.ships.len()
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub fn planet_mut(&mut self, id: PlanetId) -> Option<&mut Planet> {
        self.planets.get_mut(id)
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub fn ship_mut(&mut self, id: ShipId) -> Option<&mut Ship> {
        self.ships.get_mut(id)
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub fn fleet_mut(&mut self, id: FleetId) -> Option<&mut Fleet> {
        self.fleets.get_mut(id)
    }

    // -----------------------------------------------------------------------
    // World setup
    // -----------------------------------------------------------------------

    /// Register or rename a player.
    pub fn add_player(&mut self, id: PlayerId, name: impl Into<String>) {
        self.players.insert(
            id,
            Player {
                id,
                name: name.into(),
            },
        );
    }

    /// Add an unowned planet. Production starts counting from `now`.
    pub fn add_planet(
        &mut self,
        name: impl Into<String>,
        position: Position,
        size: u8,
        now: Timestamp,
    ) -> PlanetId {
        let capacity = self.config.queue_capacity(0);
        let name = name.into();
        self.planets.insert_with_key(|id| {
            let mut planet = Planet::new(id, name, position, size);
            planet.queue.initialize(capacity);
            planet.last_produced = now;
            planet
        })
    }

    /// Change a planet's owner. Returns false if the planet does not exist.
    pub fn set_owner(&mut self, planet: PlanetId, owner: Option<PlayerId>) -> bool {
        match self.planets.get_mut(planet) {
            Some(p) => {
                p.owner = owner;
                true
            }
            None => false,
        }
    }

    /// Place a finished building instantly, at the lowest free slot. Used by
    /// world generation and fixtures; gameplay goes through
    /// [`Universe::enqueue_build`].
    pub fn place_building(
        &mut self,
        planet: PlanetId,
        kind: BuildingType,
        level: u32,
    ) -> Option<BuildingId> {
        let max_level = self.catalog.spec(kind).max_level;
        let p = self.planets.get_mut(planet)?;
        let slot = p.free_slot(self.config.max_slots(p.size))?;
        let id = p.add_building(kind, level.clamp(1, max_level), slot);
        if kind == BuildingType::CommandCenter {
            refresh_queue_capacity(p, &self.config);
        }
        Some(id)
    }

    /// Create a docked, idle ship. Shipyard production is outside the
    /// simulation, so ships enter through here.
    pub fn spawn_ship(
        &mut self,
        owner: PlayerId,
        class: ShipClass,
        planet: PlanetId,
    ) -> Result<ShipId, ShipActionError> {
        if !self.planets.contains_key(planet) {
            return Err(ShipActionError::PlanetNotFound);
        }
        let id = self
            .ships
            .insert_with_key(|id| Ship::new(id, class, owner, planet));
        debug!(target: "starhold::ship", ship = ?id, %owner, %class, "ship spawned");
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn queue_stats(&self, planet: PlanetId, now: Timestamp) -> Option<QueueStats> {
        self.planets.get(planet).map(|p| p.queue.stats(now))
    }

    pub fn production_report(&self, planet: PlanetId) -> Option<ProductionReport> {
        self.planets
            .get(planet)
            .map(|p| production_report(p, &self.catalog, &self.config))
    }

    /// Non-destroyed ships at `planet`, docked or busy there.
    pub fn ships_at_planet(&self, planet: PlanetId) -> Vec<ShipId> {
        self.ships
            .iter()
            .filter(|(_, s)| s.current_planet() == Some(planet))
            .map(|(id, _)| id)
            .collect()
    }

    /// The newest `n` events, oldest first.
    pub fn recent_events(&self, n: usize) -> Vec<Event> {
        self.history.latest(n)
    }

    /// Events produced by the most recent step.
    pub fn last_events(&self) -> &[Event] {
        &self.last_events
    }

    // -----------------------------------------------------------------------
    // Tick pipeline
    // -----------------------------------------------------------------------

    /// Advance every time-based state machine to `now`.
    ///
    /// Calling twice with the same `now` completes, arrives and produces
    /// nothing the second time.
    pub fn step(&mut self, now: Timestamp) -> TickReport {
        let _span = tracing::debug_span!(target: "starhold::tick", "step", tick = self.sim.tick, now).entered();

        let mut report = TickReport {
            now,
            events: std::mem::take(&mut self.pending_events),
            ..TickReport::default()
        };

        self.phase_production(now, &mut report);
        self.phase_construction(now, &mut report);
        self.tick_movements(now, &mut report);
        self.phase_activity(now, &mut report);
        self.phase_bookkeeping(now, &mut report);

        report
    }

    fn phase_production(&mut self, now: Timestamp, report: &mut TickReport) {
        let catalog = &self.catalog;
        let config = &self.config;

        #[cfg(feature = "parallel")]
        let outcomes: Vec<(PlanetId, IntegrationOutcome)> = {
            use rayon::prelude::*;
            let _span =
                tracing::debug_span!(target: "starhold::production", "planets_parallel", count = self.planets.len())
                    .entered();
            self.planets
                .iter_mut()
                .collect::<Vec<_>>()
                .into_par_iter()
                .map(|(id, planet)| (id, integrate(planet, catalog, config, now)))
                .collect()
        };

        #[cfg(not(feature = "parallel"))]
        let outcomes: Vec<(PlanetId, IntegrationOutcome)> = self
            .planets
            .iter_mut()
            .map(|(id, planet)| (id, integrate(planet, catalog, config, now)))
            .collect();

        for (planet_id, outcome) in outcomes {
            if outcome.upgraded.is_empty() {
                continue;
            }
            let Some(planet) = self.planets.get_mut(planet_id) else {
                continue;
            };
            let mut command_center_changed = false;
            for (building, level) in outcome.upgraded {
                if planet
                    .building(building)
                    .is_some_and(|b| b.kind == BuildingType::CommandCenter)
                {
                    command_center_changed = true;
                }
                debug!(target: "starhold::production", planet = ?planet_id, ?building, level, "upgrade finished");
                report.events.push(Event::BuildingUpgraded {
                    planet: planet_id,
                    building,
                    level,
                    at: now,
                });
            }
            if command_center_changed {
                refresh_queue_capacity(planet, &self.config);
            }
        }
    }

    fn phase_construction(&mut self, now: Timestamp, report: &mut TickReport) {
        for (planet_id, planet) in self.planets.iter_mut() {
            if let Err(fault) = planet.queue.check_invariants() {
                error!(target: "starhold::queue", planet = ?planet_id, %fault, "corrupt construction queue, skipping planet");
                report.faults.push(SimFault::CorruptQueue {
                    planet: planet_id,
                    source: fault,
                });
                continue;
            }

            let active_before = planet.queue.active().map(|o| o.id);
            let completed = planet.queue.tick(now);
            let mut command_center_changed = false;

            for order in &completed {
                let level_before = match order.target {
                    OrderTarget::Upgrade { building } => planet.building(building).map(|b| b.level),
                    OrderTarget::NewBuilding { .. } => None,
                };
                let applied = match planet.apply_order(order) {
                    Ok(applied) => applied,
                    Err(ApplyFault::MissingBuilding) => {
                        warn!(target: "starhold::queue", planet = ?planet_id, order = ?order.id, "completed order targets a vanished building");
                        report.faults.push(SimFault::MissingBuilding {
                            planet: planet_id,
                            order: order.id,
                        });
                        continue;
                    }
                    Err(ApplyFault::LevelMismatch { current, target }) => {
                        error!(target: "starhold::queue", planet = ?planet_id, order = ?order.id, current, target, "upgrade would skip a level");
                        report.faults.push(SimFault::LevelMismatch {
                            planet: planet_id,
                            order: order.id,
                            current,
                            target,
                        });
                        continue;
                    }
                };
                info!(
                    target: "starhold::queue",
                    planet = ?planet_id,
                    order = ?order.id,
                    kind = %applied.kind,
                    level = applied.level,
                    "order completed"
                );
                command_center_changed |= applied.kind == BuildingType::CommandCenter;
                report.events.push(Event::OrderCompleted {
                    planet: planet_id,
                    order: order.id,
                    building: applied.building,
                    kind: applied.kind,
                    level: applied.level,
                    at: now,
                });
                if level_before.is_some_and(|before| before < applied.level) {
                    report.events.push(Event::BuildingUpgraded {
                        planet: planet_id,
                        building: applied.building,
                        level: applied.level,
                        at: now,
                    });
                }
            }

            if let Some(active) = planet.queue.active()
                && Some(active.id) != active_before
            {
                debug!(target: "starhold::queue", planet = ?planet_id, order = ?active.id, completion = active.completion, "order promoted");
                report.events.push(Event::OrderStarted {
                    planet: planet_id,
                    order: active.id,
                    kind: active.kind,
                    target_level: active.target_level,
                    completion: active.completion,
                    at: now,
                });
            }
            planet.sync_upgrade_marker();

            if command_center_changed {
                refresh_queue_capacity(planet, &self.config);
            }
        }
    }

    fn phase_activity(&mut self, now: Timestamp, report: &mut TickReport) {
        let busy: Vec<ShipId> = self.busy_ships.iter().copied().collect();
        for ship_id in busy {
            let Some(ship) = self.ships.get_mut(ship_id) else {
                self.busy_ships.remove(&ship_id);
                continue;
            };
            if ship.is_destroyed() {
                self.busy_ships.remove(&ship_id);
                continue;
            }
            let Some(done) = ship.finish_activity(now, &self.config) else {
                continue;
            };
            self.busy_ships.remove(&ship_id);
            match done {
                crate::ship::ActivityDone::Mined { planet, minerals } => {
                    debug!(target: "starhold::ship", ship = ?ship_id, minerals, "mining finished");
                    report.events.push(Event::MiningCompleted {
                        ship: ship_id,
                        planet,
                        minerals,
                        at: now,
                    });
                }
                crate::ship::ActivityDone::Repaired { planet } => {
                    debug!(target: "starhold::ship", ship = ?ship_id, "repair finished");
                    report.events.push(Event::RepairCompleted {
                        ship: ship_id,
                        planet,
                        at: now,
                    });
                }
                crate::ship::ActivityDone::CooledDown { .. } => {}
            }
        }
    }

    fn phase_bookkeeping(&mut self, now: Timestamp, report: &mut TickReport) {
        self.sim.tick += 1;
        self.sim.last_step = Some(now);
        self.state_hash = self.compute_state_hash();

        self.history.extend(&report.events);
        self.last_events = report.events.clone();

        report.tick = self.sim.tick;
        report.state_hash = self.state_hash;

        if report.faults.is_empty() {
            debug!(target: "starhold::tick", tick = report.tick, events = report.events.len(), "tick complete");
        } else {
            warn!(
                target: "starhold::tick",
                tick = report.tick,
                events = report.events.len(),
                faults = report.faults.len(),
                "tick complete with faults"
            );
        }
    }

    /// FNV-1a over the simulation-relevant state, in registry order.
    pub fn compute_state_hash(&self) -> u64 {
        let mut h = StateHash::new();
        h.write_u64(self.sim.tick);
        for (_, planet) in &self.planets {
            h.write_u32(planet.owner.map_or(u32::MAX, |o| o.0));
            h.write_fixed64(planet.stock.minerals);
            h.write_fixed64(planet.stock.energy);
            h.write_fixed64(planet.stock.credits);
            h.write_fixed64(planet.stock.population);
            h.write_fixed64(planet.stock.research);
            for building in &planet.buildings {
                h.write_u32(building.id.0);
                h.write_u32(building.level);
                h.write_u32(u32::from(building.damage));
                if let UpgradeState::Upgrading { until, .. } = building.upgrade {
                    h.write_u64(until);
                }
            }
            for order in planet.queue.orders() {
                h.write_u64(order.id.0);
                h.write_u64(order.completion);
            }
        }
        for (_, ship) in &self.ships {
            h.write_u32(ship.owner.0);
            h.write_u32(ship.health);
            h.write_u32(ship.cargo.total());
            h.write_u32(ship.status() as u32);
            if let ShipActivity::Moving(m) = &ship.activity {
                h.write_u64(m.arrives_at);
            }
        }
        h.write_u64(self.fleets.len() as u64);
        h.finish()
    }
}

/// Set a planet's queue capacity from its command-center level.
pub(crate) fn refresh_queue_capacity(planet: &mut Planet, config: &GameConfig) {
    let capacity = config.queue_capacity(planet.command_center_level());
    if capacity != planet.queue.capacity() {
        debug!(target: "starhold::queue", planet = ?planet.id, capacity, "queue capacity changed");
        planet.queue.initialize(capacity);
    }
}

// ===========================================================================
// Tests
// ===========================================================================
