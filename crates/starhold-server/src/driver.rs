//! The tick driver: one dedicated thread advancing the universe at a fixed
//! cadence.
//!
//! Each cycle takes the universe lock, applies every command submitted
//! since the previous cycle, steps the universe to `clock.now()`, captures a
//! snapshot and releases the lock. The snapshot is handed to the
//! [`BroadcastSink`] after the lock is released.

use crate::error::ServerError;
use crate::ingress::{CommandIngress, Submission};
use crate::sink::BroadcastSink;
use crossbeam_channel::{Receiver, Sender, bounded, select, tick, unbounded};
use starhold_core::command::{CommandQueue, CommandResponse, PendingCommand};
use starhold_core::snapshot::UniverseSnapshot;
use starhold_core::time::Clock;
use starhold_core::universe::Universe;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info};

/// Applied commands kept for inspection.
const COMMAND_HISTORY: usize = 256;

/// What one cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSummary {
    pub tick: u64,
    pub commands: usize,
    pub events: usize,
    pub faults: usize,
    pub state_hash: u64,
}

// ---------------------------------------------------------------------------
// TickLoop
// ---------------------------------------------------------------------------

/// The state one tick thread owns. [`TickLoop::run_cycle`] is public so a
/// cycle can be driven by hand with a manual clock.
pub struct TickLoop {
    universe: Arc<Mutex<Universe>>,
    clock: Arc<dyn Clock>,
    sink: Box<dyn BroadcastSink>,
    submissions: Receiver<Submission>,
    queue: CommandQueue,
    replies: HashMap<u64, Sender<CommandResponse>>,
}

impl TickLoop {
    /// Build a loop around `universe` and return it with its ingress.
    pub fn new(universe: Universe, clock: Arc<dyn Clock>, sink: Box<dyn BroadcastSink>) -> (Self, CommandIngress) {
        let universe = Arc::new(Mutex::new(universe));
        let (tx, rx) = unbounded();
        let ingress = CommandIngress::new(tx, Arc::clone(&universe), Arc::clone(&clock));
        let tick_loop = Self {
            universe,
            clock,
            sink,
            submissions: rx,
            queue: CommandQueue::with_max_history(COMMAND_HISTORY),
            replies: HashMap::new(),
        };
        (tick_loop, ingress)
    }

    pub fn universe(&self) -> Arc<Mutex<Universe>> {
        Arc::clone(&self.universe)
    }

    /// Run one cycle.
    pub fn run_cycle(&mut self) -> Result<CycleSummary, ServerError> {
        for submission in self.submissions.try_iter() {
            let ticket = self.queue.push(submission.player, submission.command);
            self.replies.insert(ticket, submission.reply);
        }

        let (summary, snapshot) = {
            let mut universe = self.universe.lock().map_err(|_| ServerError::Poisoned)?;
            let now = self.clock.now();
            let responses = universe.apply_commands(&mut self.queue, now);
            let commands = responses.len();
            for (ticket, response) in responses {
                if let Some(reply) = self.replies.remove(&ticket) {
                    // The submitter may have stopped listening.
                    let _ = reply.send(response);
                }
            }

            let report = universe.step(now);
            let snapshot = universe.snapshot(now);
            let summary = CycleSummary {
                tick: report.tick,
                commands,
                events: report.events.len(),
                faults: report.faults.len(),
                state_hash: report.state_hash,
            };
            (summary, Arc::new(snapshot))
        };

        self.sink.broadcast(snapshot);
        debug!(
            target: "starhold::driver",
            tick = summary.tick,
            commands = summary.commands,
            events = summary.events,
            "cycle"
        );
        Ok(summary)
    }

    /// Commands applied by recent cycles, oldest first.
    pub fn command_history(&self) -> &[(u64, PendingCommand)] {
        self.queue.history()
    }
}

// ---------------------------------------------------------------------------
// TickDriver
// ---------------------------------------------------------------------------

/// A running tick thread. Dropping the driver stops the thread.
pub struct TickDriver {
    universe: Arc<Mutex<Universe>>,
    ingress: CommandIngress,
    shutdown: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl TickDriver {
    /// Spawn the tick thread at the universe's configured interval.
    pub fn spawn(universe: Universe, clock: Arc<dyn Clock>, sink: Box<dyn BroadcastSink>) -> Result<Self, ServerError> {
        universe.config().validate()?;
        let interval = Duration::from_millis(universe.config().tick_interval_ms);
        let (tick_loop, ingress) = TickLoop::new(universe, clock, sink);
        let shared = tick_loop.universe();
        let (shutdown, shutdown_rx) = bounded(1);

        let handle = std::thread::Builder::new()
            .name("starhold-tick".into())
            .spawn(move || run(tick_loop, interval, shutdown_rx))
            .map_err(ServerError::Spawn)?;

        info!(target: "starhold::driver", interval_ms = interval.as_millis() as u64, "tick driver started");
        Ok(Self {
            universe: shared,
            ingress,
            shutdown,
            handle: Some(handle),
        })
    }

    pub fn ingress(&self) -> CommandIngress {
        self.ingress.clone()
    }

    /// The shared universe. Holding the lock stalls the tick thread.
    pub fn universe(&self) -> Arc<Mutex<Universe>> {
        Arc::clone(&self.universe)
    }

    /// Stop after the current cycle and wait for the thread.
    pub fn shutdown(mut self) -> Result<(), ServerError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<(), ServerError> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        let _ = self.shutdown.send(());
        handle.join().map_err(|_| ServerError::Panicked)?;
        info!(target: "starhold::driver", "tick driver stopped");
        Ok(())
    }
}

impl Drop for TickDriver {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!(target: "starhold::driver", error = %e, "tick driver did not stop cleanly");
        }
    }
}

fn run(mut tick_loop: TickLoop, interval: Duration, shutdown: Receiver<()>) {
    let ticker = tick(interval);
    loop {
        select! {
            recv(shutdown) -> _ => break,
            recv(ticker) -> _ => {
                if let Err(e) = tick_loop.run_cycle() {
                    error!(target: "starhold::driver", error = %e, "cycle failed");
                    if matches!(e, ServerError::Poisoned) {
                        break;
                    }
                }
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
