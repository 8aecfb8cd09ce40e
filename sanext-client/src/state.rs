//! Connection state machine

use sanext_core::{SanextError, SanextResult};
use std::fmt;

/// Connection state
///
/// # State Transitions
/// ```text
/// Disconnected -> Connecting   (connect attempt starts)
/// Connecting   -> Connected    (socket open)
/// Connecting   -> Disconnected (attempt failed)
/// Connected    -> Disconnected (socket error, peer close or shutdown)
/// ```
///
/// There is no terminal failure state: from `Disconnected` the client always
/// tries again after the backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No socket; polling is paused
    #[default]
    Disconnected,
    /// Socket is being opened
    Connecting,
    /// Socket is open; the poller may send
    Connected,
}

impl ConnectionState {
    /// Check if requests may be sent
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Validate state transition
    ///
    /// # Returns
    /// `Ok(())` if transition is valid, `Err` otherwise
    pub fn validate_transition(&self, new_state: ConnectionState) -> SanextResult<()> {
        let valid = matches!(
            (*self, new_state),
            (ConnectionState::Disconnected, ConnectionState::Connecting)
                | (ConnectionState::Connecting, ConnectionState::Connected)
                | (ConnectionState::Connecting, ConnectionState::Disconnected)
                | (ConnectionState::Connected, ConnectionState::Disconnected)
        );

        if valid {
            Ok(())
        } else {
            Err(SanextError::Protocol(format!(
                "Invalid connection state transition: {} -> {}",
                self, new_state
            )))
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
        }
    }
}
