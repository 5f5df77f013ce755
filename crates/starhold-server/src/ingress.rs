//! Command ingress: how the outside world hands commands to the driver.

use crate::error::ServerError;
use crossbeam_channel::{Receiver, Sender, bounded};
use starhold_core::command::{Command, CommandResponse};
use starhold_core::id::PlayerId;
use starhold_core::time::Clock;
use starhold_core::universe::Universe;
use std::sync::{Arc, Mutex};
use tracing::trace;

/// A command on its way to the next tick, with the channel its response
/// goes back on.
#[derive(Debug)]
pub struct Submission {
    pub player: PlayerId,
    pub command: Command,
    pub reply: Sender<CommandResponse>,
}

/// Cloneable handle for submitting commands.
///
/// [`CommandIngress::submit`] defers a command to the next tick boundary.
/// [`CommandIngress::execute_now`] runs it immediately under the universe
/// lock; it can never interleave with a tick.
#[derive(Clone)]
pub struct CommandIngress {
    tx: Sender<Submission>,
    universe: Arc<Mutex<Universe>>,
    clock: Arc<dyn Clock>,
}

impl CommandIngress {
    pub(crate) fn new(tx: Sender<Submission>, universe: Arc<Mutex<Universe>>, clock: Arc<dyn Clock>) -> Self {
        Self { tx, universe, clock }
    }

    /// Queue `command` for the next tick. The response arrives on the
    /// returned receiver once the tick has applied it.
    pub fn submit(&self, player: PlayerId, command: Command) -> Result<Receiver<CommandResponse>, ServerError> {
        let (reply, rx) = bounded(1);
        trace!(target: "starhold::ingress", %player, command = command.name(), "submitted");
        self.tx
            .send(Submission {
                player,
                command,
                reply,
            })
            .map_err(|_| ServerError::Stopped)?;
        Ok(rx)
    }

    /// Run `command` now, at the clock's current time.
    pub fn execute_now(&self, player: PlayerId, command: &Command) -> Result<CommandResponse, ServerError> {
        let mut universe = self.universe.lock().map_err(|_| ServerError::Poisoned)?;
        let now = self.clock.now();
        let result = universe.execute(player, command, now);
        Ok(CommandResponse::from_result(command, result))
    }
}

impl std::fmt::Debug for CommandIngress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandIngress")
            .field("pending", &self.tx.len())
            .finish_non_exhaustive()
    }
}
