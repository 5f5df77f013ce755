//! Starhold server runtime.
//!
//! Owns a [`Universe`](starhold_core::universe::Universe) behind a single
//! lock and advances it on a dedicated thread:
//!
//! - [`driver::TickDriver`] -- the fixed-cadence tick thread.
//! - [`ingress::CommandIngress`] -- submit commands for the next tick, or run
//!   them immediately.
//! - [`sink::BroadcastSink`] -- receives each tick's snapshot outside the lock.

pub mod driver;
pub mod error;
pub mod ingress;
pub mod sink;

pub use driver::{CycleSummary, TickDriver, TickLoop};
pub use error::ServerError;
pub use ingress::CommandIngress;
pub use sink::{BroadcastSink, ChannelSink, LogSink, MultiSink};
