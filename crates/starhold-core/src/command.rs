//! Player commands and the buffer that carries them to the tick driver.
//!
//! Every mutating operation a player can request is a [`Command`].
//! [`Universe::execute`] runs one synchronously; the driver buffers
//! commands in a [`CommandQueue`] and applies them between steps, so a
//! command never interleaves with a tick.

use crate::build::{BuildError, BuildRequest};
use crate::combat::{AttackOutcome, BombardOutcome};
use crate::fleet::FleetError;
use crate::id::{FleetId, OrderId, PlanetId, PlayerId, ShipId};
use crate::movement::MovementError;
use crate::navigation::MoveOutcome;
use crate::queue::QueuedOrder;
use crate::resources::Resources;
use crate::ship::{Cargo, CargoKind, ShipActionError, ShipClass};
use crate::time::Timestamp;
use crate::universe::Universe;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ---------------------------------------------------------------------------
// Command enum
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    EnqueueBuild {
        planet: PlanetId,
        request: BuildRequest,
    },
    CancelBuild {
        planet: PlanetId,
        order: OrderId,
    },
    MoveShip {
        ship: ShipId,
        destination: PlanetId,
        allow_combat: bool,
    },
    CancelMovement {
        ship: ShipId,
    },
    CreateFleet {
        name: String,
        ships: Vec<ShipId>,
    },
    AddToFleet {
        fleet: FleetId,
        ship: ShipId,
    },
    RemoveFromFleet {
        fleet: FleetId,
        ship: ShipId,
    },
    DisbandFleet {
        fleet: FleetId,
    },
    MoveFleet {
        fleet: FleetId,
        destination: PlanetId,
        allow_combat: bool,
    },
    CancelFleetMovement {
        fleet: FleetId,
    },
    StartMining {
        ship: ShipId,
    },
    AttackShip {
        attacker: ShipId,
        target: ShipId,
    },
    BombardPlanet {
        ship: ShipId,
    },
    StartRepair {
        ship: ShipId,
    },
    LoadCargo {
        ship: ShipId,
        kind: CargoKind,
        amount: u32,
    },
    UnloadCargo {
        ship: ShipId,
        kind: CargoKind,
        amount: u32,
    },
    Colonize {
        ship: ShipId,
    },
    /// Deliver a finished ship to an own planet.
    SpawnShip {
        class: ShipClass,
        planet: PlanetId,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::EnqueueBuild { .. } => "enqueue_build",
            Command::CancelBuild { .. } => "cancel_build",
            Command::MoveShip { .. } => "move_ship",
            Command::CancelMovement { .. } => "cancel_movement",
            Command::CreateFleet { .. } => "create_fleet",
            Command::AddToFleet { .. } => "add_to_fleet",
            Command::RemoveFromFleet { .. } => "remove_from_fleet",
            Command::DisbandFleet { .. } => "disband_fleet",
            Command::MoveFleet { .. } => "move_fleet",
            Command::CancelFleetMovement { .. } => "cancel_fleet_movement",
            Command::StartMining { .. } => "start_mining",
            Command::AttackShip { .. } => "attack_ship",
            Command::BombardPlanet { .. } => "bombard_planet",
            Command::StartRepair { .. } => "start_repair",
            Command::LoadCargo { .. } => "load_cargo",
            Command::UnloadCargo { .. } => "unload_cargo",
            Command::Colonize { .. } => "colonize",
            Command::SpawnShip { .. } => "spawn_ship",
        }
    }
}

/// Payload of a successful command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandOutput {
    Order(QueuedOrder),
    Refund(Resources),
    Movement(MoveOutcome),
    /// The mover is back at this planet.
    Recalled(PlanetId),
    Fleet(FleetId),
    /// A timed activity finishing at this time.
    Busy { until: Timestamp },
    Attack(AttackOutcome),
    Bombard(BombardOutcome),
    Cargo(Cargo),
    Colonized(PlanetId),
    Ship(ShipId),
    Done,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Movement(#[from] MovementError),

    #[error(transparent)]
    Fleet(#[from] FleetError),

    #[error(transparent)]
    Ship(#[from] ShipActionError),
}

/// Caller-facing result of a command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResponse {
    pub success: bool,
    pub message: String,
    pub data: Option<CommandOutput>,
    pub error: Option<CommandError>,
}

impl CommandResponse {
    pub fn from_result(command: &Command, result: Result<CommandOutput, CommandError>) -> Self {
        match result {
            Ok(data) => Self {
                success: true,
                message: format!("{} ok", command.name()),
                data: Some(data),
                error: None,
            },
            Err(error) => Self {
                success: false,
                message: format!("{} failed: {error}", command.name()),
                data: None,
                error: Some(error),
            },
        }
    }
}

impl Universe {
    /// Run one command for `player` at `now`.
    pub fn execute(
        &mut self,
        player: PlayerId,
        command: &Command,
        now: Timestamp,
    ) -> Result<CommandOutput, CommandError> {
        let output = match *command {
            Command::EnqueueBuild { planet, request } => {
                CommandOutput::Order(self.enqueue_build(player, planet, request, now)?)
            }
            Command::CancelBuild { planet, order } => {
                CommandOutput::Refund(self.cancel_build(player, planet, order)?)
            }
            Command::MoveShip {
                ship,
                destination,
                allow_combat,
            } => CommandOutput::Movement(self.move_ship(player, ship, destination, allow_combat, now)?),
            Command::CancelMovement { ship } => {
                CommandOutput::Recalled(self.cancel_movement(player, ship)?)
            }
            Command::CreateFleet {
                ref name,
                ref ships,
            } => CommandOutput::Fleet(self.create_fleet(player, name.clone(), ships)?),
            Command::AddToFleet { fleet, ship } => {
                self.add_to_fleet(player, fleet, ship)?;
                CommandOutput::Done
            }
            Command::RemoveFromFleet { fleet, ship } => {
                self.remove_from_fleet(player, fleet, ship, now)?;
                CommandOutput::Done
            }
            Command::DisbandFleet { fleet } => {
                self.disband_fleet(player, fleet, now)?;
                CommandOutput::Done
            }
            Command::MoveFleet {
                fleet,
                destination,
                allow_combat,
            } => CommandOutput::Movement(self.move_fleet(player, fleet, destination, allow_combat, now)?),
            Command::CancelFleetMovement { fleet } => {
                CommandOutput::Recalled(self.cancel_fleet_movement(player, fleet)?)
            }
            Command::StartMining { ship } => CommandOutput::Busy {
                until: self.start_mining(player, ship, now)?,
            },
            Command::AttackShip { attacker, target } => {
                CommandOutput::Attack(self.attack_ship(player, attacker, target, now)?)
            }
            Command::BombardPlanet { ship } => {
                CommandOutput::Bombard(self.bombard_planet(player, ship, now)?)
            }
            Command::StartRepair { ship } => CommandOutput::Busy {
                until: self.start_repair(player, ship, now)?,
            },
            Command::LoadCargo { ship, kind, amount } => {
                CommandOutput::Cargo(self.load_cargo(player, ship, kind, amount)?)
            }
            Command::UnloadCargo { ship, kind, amount } => {
                CommandOutput::Cargo(self.unload_cargo(player, ship, kind, amount)?)
            }
            Command::Colonize { ship } => CommandOutput::Colonized(self.colonize(player, ship, now)?),
            Command::SpawnShip { class, planet } => {
                let p = self
                    .planets
                    .get(planet)
                    .ok_or(ShipActionError::PlanetNotFound)?;
                if !p.is_owned_by(player) {
                    return Err(ShipActionError::PlanetNotOwned.into());
                }
                CommandOutput::Ship(self.spawn_ship(player, class, planet)?)
            }
        };
        Ok(output)
    }

    /// Drain `queue` and run every command in submission order.
    pub fn apply_commands(&mut self, queue: &mut CommandQueue, now: Timestamp) -> Vec<(u64, CommandResponse)> {
        let tick = self.tick();
        queue
            .drain(tick)
            .into_iter()
            .map(|pending| {
                let result = self.execute(pending.player, &pending.command, now);
                if let Err(e) = &result {
                    debug!(
                        target: "starhold::command",
                        ticket = pending.ticket,
                        player = %pending.player,
                        command = pending.command.name(),
                        error = %e,
                        "command rejected"
                    );
                }
                (pending.ticket, CommandResponse::from_result(&pending.command, result))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// CommandQueue
// ---------------------------------------------------------------------------

/// A command waiting for the next tick boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCommand {
    /// Submission number, unique per queue.
    pub ticket: u64,
    pub player: PlayerId,
    pub command: Command,
}

/// Commands waiting to be applied, with optional bounded history for
/// replay and debugging.
#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: Vec<PendingCommand>,
    /// Applied commands: (tick, command).
    history: Vec<(u64, PendingCommand)>,
    /// 0 = no history.
    max_history: usize,
    next_ticket: u64,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            max_history,
            ..Self::default()
        }
    }

    /// Buffer a command. Returns its ticket.
    pub fn push(&mut self, player: PlayerId, command: Command) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.pending.push(PendingCommand {
            ticket,
            player,
            command,
        });
        ticket
    }

    /// Take every pending command in submission order, recording them in
    /// history under `tick`.
    pub fn drain(&mut self, tick: u64) -> Vec<PendingCommand> {
        let commands: Vec<PendingCommand> = self.pending.drain(..).collect();

        if self.max_history > 0 {
            self.history
                .extend(commands.iter().map(|c| (tick, c.clone())));
            let excess = self.history.len().saturating_sub(self.max_history);
            if excess > 0 {
                self.history.drain(..excess);
            }
        }

        commands
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn history(&self) -> &[(u64, PendingCommand)] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

// ===========================================================================
// Tests
// ===========================================================================
