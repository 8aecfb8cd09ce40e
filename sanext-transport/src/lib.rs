//! Transport layer module for the Sanext heat meter protocol
//!
//! This crate provides the stream abstraction used by the client, the TCP
//! transport that talks to the meter (or to the serial-over-TCP gateway in
//! front of it), and the classification of transport failures.

pub mod error;
pub mod failure;
pub mod stream;
pub mod tcp;

pub use error::{SanextError, SanextResult};
pub use failure::TransportFailure;
pub use stream::{StreamAccessor, TransportLayer};
pub use tcp::{TcpSettings, TcpTransport};
