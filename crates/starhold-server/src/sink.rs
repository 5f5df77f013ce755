//! Where snapshots go after each tick.

use crossbeam_channel::{Sender, TrySendError};
use starhold_core::snapshot::UniverseSnapshot;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Receives one snapshot per tick, outside the universe lock.
pub trait BroadcastSink: Send {
    fn broadcast(&mut self, snapshot: Arc<UniverseSnapshot>);
}

/// Logs a one-line summary of every snapshot.
#[derive(Debug, Default)]
pub struct LogSink;

impl BroadcastSink for LogSink {
    fn broadcast(&mut self, snapshot: Arc<UniverseSnapshot>) {
        if snapshot.events.is_empty() {
            debug!(
                target: "starhold::broadcast",
                tick = snapshot.tick,
                hash = snapshot.state_hash,
                "snapshot"
            );
        } else {
            info!(
                target: "starhold::broadcast",
                tick = snapshot.tick,
                hash = snapshot.state_hash,
                events = snapshot.events.len(),
                planets = snapshot.planets.len(),
                ships = snapshot.ships.len(),
                "snapshot"
            );
        }
    }
}

/// Forwards snapshots to a channel. A full channel drops the snapshot
/// rather than stalling the tick loop.
#[derive(Debug)]
pub struct ChannelSink {
    tx: Sender<Arc<UniverseSnapshot>>,
    dropped: u64,
}

impl ChannelSink {
    pub fn new(tx: Sender<Arc<UniverseSnapshot>>) -> Self {
        Self { tx, dropped: 0 }
    }

    /// Snapshots discarded because the receiver was full or gone.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl BroadcastSink for ChannelSink {
    fn broadcast(&mut self, snapshot: Arc<UniverseSnapshot>) {
        match self.tx.try_send(snapshot) {
            Ok(()) => {}
            Err(TrySendError::Full(s)) => {
                self.dropped += 1;
                warn!(target: "starhold::broadcast", tick = s.tick, dropped = self.dropped, "subscriber lagging");
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped += 1;
            }
        }
    }
}

/// Fan out to several sinks in order.
#[derive(Default)]
pub struct MultiSink {
    sinks: Vec<Box<dyn BroadcastSink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl BroadcastSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl BroadcastSink for MultiSink {
    fn broadcast(&mut self, snapshot: Arc<UniverseSnapshot>) {
        for sink in &mut self.sinks {
            sink.broadcast(Arc::clone(&snapshot));
        }
    }
}
