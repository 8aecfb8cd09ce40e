//! Classification of transport failures
//!
//! The meter sits behind an unreliable link, so every failure seen on the
//! socket ends in a reconnect. The kinds below are kept apart for log lines
//! and so a new kind can be added in one place.

use crate::error::SanextError;
use std::fmt;
use std::io::ErrorKind;

/// Kind of transport failure observed on the meter connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailure {
    /// The peer reset or aborted the connection
    ConnectionReset,
    /// Write on a socket whose other end is gone
    BrokenPipe,
    /// Open requested on a transport that is already connected
    AlreadyConnected,
    /// Operation not valid in the socket's current state
    InvalidState,
    /// The configured host name did not resolve
    HostNotFound,
    /// Nothing listens on the configured port
    ConnectionRefused,
    /// The peer closed the stream (end of file)
    ClosedByPeer,
    /// Connect or write did not finish in time
    TimedOut,
    /// Any other I/O or non I/O failure
    Other,
}

impl TransportFailure {
    /// Classify an error returned by the transport
    pub fn classify(error: &SanextError) -> Self {
        match error {
            SanextError::Timeout => TransportFailure::TimedOut,
            SanextError::Connection(io) => match io.kind() {
                ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
                    TransportFailure::ConnectionReset
                }
                ErrorKind::BrokenPipe => TransportFailure::BrokenPipe,
                ErrorKind::AlreadyExists => TransportFailure::AlreadyConnected,
                ErrorKind::NotConnected | ErrorKind::InvalidInput => TransportFailure::InvalidState,
                ErrorKind::NotFound => TransportFailure::HostNotFound,
                ErrorKind::ConnectionRefused => TransportFailure::ConnectionRefused,
                ErrorKind::UnexpectedEof => TransportFailure::ClosedByPeer,
                ErrorKind::TimedOut => TransportFailure::TimedOut,
                _ => TransportFailure::Other,
            },
            _ => TransportFailure::Other,
        }
    }

    /// Short name used in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportFailure::ConnectionReset => "connection reset",
            TransportFailure::BrokenPipe => "broken pipe",
            TransportFailure::AlreadyConnected => "already connected",
            TransportFailure::InvalidState => "invalid socket state",
            TransportFailure::HostNotFound => "host not found",
            TransportFailure::ConnectionRefused => "connection refused",
            TransportFailure::ClosedByPeer => "closed by peer",
            TransportFailure::TimedOut => "timed out",
            TransportFailure::Other => "other",
        }
    }
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
