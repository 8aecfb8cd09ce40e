//! Sanext heat meter polling client
//!
//! This crate keeps one meter polled: it connects over TCP, sends the
//! command catalog one request at a time, decodes every answer and writes
//! changed values to a state store. Lost connections are retried after a
//! fixed backoff for as long as the client runs.
//!
//! # Components
//!
//! - [`ConnectionManager`]: socket ownership, connectivity flag, reconnect backoff
//! - [`PollSequencer`]: catalog cursor, response timeout, idle delay between sweeps
//! - [`StatePublisher`]: change detection in front of the [`StateStore`]
//! - [`SanextClient`] / [`ClientHandle`]: the polling task and its lifecycle
//! - [`ClientBuilder`] / [`ClientConfig`]: settings and validation

pub mod builder;
pub mod client;
pub mod config;
pub mod connection;
pub mod poller;
pub mod shutdown;
pub mod state;
pub mod statistics;
pub mod store;
pub mod timer;

#[cfg(test)]
pub(crate) mod testing;

pub use builder::ClientBuilder;
pub use client::{ClientHandle, SanextClient};
pub use config::ClientConfig;
pub use connection::ConnectionManager;
pub use poller::{PollCursor, PollSequencer, PollSettings};
pub use shutdown::Shutdown;
pub use state::ConnectionState;
pub use statistics::PollStatistics;
pub use store::{MemoryStateStore, StatePublisher, StateStore, StateValue, CONNECTION_STATE};
pub use timer::Timer;
