//! Connection manager
//!
//! Owns the transport to the meter and its state. It opens the socket,
//! reports connectivity to the state store, tears the socket down on any
//! transport failure and schedules the next attempt after a fixed backoff.

use crate::shutdown::Shutdown;
use crate::state::ConnectionState;
use crate::statistics::PollStatistics;
use crate::store::{StatePublisher, StateStore};
use crate::timer::Timer;
use bytes::Bytes;
use log::{debug, error, info, warn};
use sanext_core::{to_hex_string, SanextError, SanextResult};
use sanext_transport::{TransportFailure, TransportLayer};
use std::io::ErrorKind;
use std::time::Duration;

/// Largest response a single read accepts
const READ_BUFFER_SIZE: usize = 256;

/// Connection manager for one meter
pub struct ConnectionManager<T: TransportLayer> {
    transport: T,
    state: ConnectionState,
    reconnect_delay: Duration,
    /// Backoff before the next connection attempt
    reconnect_timer: Timer,
}

impl<T: TransportLayer> ConnectionManager<T> {
    pub fn new(transport: T, reconnect_delay: Duration) -> Self {
        Self {
            transport,
            state: ConnectionState::Disconnected,
            reconnect_delay,
            reconnect_timer: Timer::new("reconnect"),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn reconnect_timer(&self) -> &Timer {
        &self.reconnect_timer
    }

    fn transition(&mut self, new_state: ConnectionState) -> SanextResult<()> {
        self.state.validate_transition(new_state)?;
        debug!("Connection state {} -> {}", self.state, new_state);
        self.state = new_state;
        Ok(())
    }

    fn mark_disconnected(&mut self) {
        if self.state != ConnectionState::Disconnected {
            debug!("Connection state {} -> {}", self.state, ConnectionState::Disconnected);
            self.state = ConnectionState::Disconnected;
        }
    }

    fn ensure_connected(&self) -> SanextResult<()> {
        if self.state.is_connected() {
            Ok(())
        } else {
            Err(SanextError::connection(
                ErrorKind::NotConnected,
                format!("Meter connection is {}", self.state),
            ))
        }
    }

    /// Open the connection
    ///
    /// On success the state is `Connected` and connectivity `true` has been
    /// published. On failure the state is back to `Disconnected`; the caller
    /// passes the error to `fail` to publish it and arm the backoff.
    pub async fn connect<S: StateStore>(
        &mut self,
        publisher: &mut StatePublisher<S>,
        statistics: &mut PollStatistics,
    ) -> SanextResult<()> {
        self.transition(ConnectionState::Connecting)?;
        statistics.connect_attempts += 1;
        debug!("Connect to {}", self.transport.peer());

        if let Err(e) = self.transport.open().await {
            self.transition(ConnectionState::Disconnected)?;
            return Err(e);
        }
        self.transition(ConnectionState::Connected)?;
        info!("Connected to {}", self.transport.peer());

        if let Err(e) = publisher.publish_connectivity(true).await {
            error!("Failed to publish connectivity: {}", e);
        }
        Ok(())
    }

    /// Handle a transport failure
    ///
    /// Closes the socket, publishes connectivity `false` and arms the
    /// reconnect timer. Every failure kind is retried.
    pub async fn fail<S: StateStore>(
        &mut self,
        error: &SanextError,
        publisher: &mut StatePublisher<S>,
        statistics: &mut PollStatistics,
    ) {
        let failure = TransportFailure::classify(error);
        statistics.transport_failures += 1;
        error!(
            "Connection to {} failed ({}): {}",
            self.transport.peer(),
            failure,
            error
        );

        self.close_transport().await;
        self.mark_disconnected();

        if let Err(e) = publisher.publish_connectivity(false).await {
            error!("Failed to publish connectivity: {}", e);
        }

        debug!(
            "Reconnect to {} after {} seconds",
            self.transport.peer(),
            self.reconnect_delay.as_secs_f64()
        );
        self.reconnect_timer.arm(self.reconnect_delay);
    }

    /// Wait for the reconnect backoff
    ///
    /// Returns `false` if shutdown was requested first.
    pub async fn wait_reconnect(&mut self, shutdown: &mut Shutdown) -> bool {
        if !self.reconnect_timer.is_armed() {
            return !shutdown.is_requested();
        }

        let elapsed = tokio::select! {
            biased;
            _ = shutdown.requested() => false,
            _ = self.reconnect_timer.expired() => true,
        };
        self.reconnect_timer.cancel();
        elapsed
    }

    /// Transmit one frame
    pub async fn send(&mut self, frame: &[u8]) -> SanextResult<()> {
        self.ensure_connected()?;
        self.transport.write_all(frame).await?;
        self.transport.flush().await
    }

    /// Wait for the next chunk of bytes from the meter
    ///
    /// Each call is a fresh, single-use wait for one response. Dropping the
    /// future (on timeout) loses nothing: unread bytes are picked up by
    /// `discard_stale` before the next request.
    pub async fn receive(&mut self) -> SanextResult<Bytes> {
        self.ensure_connected()?;
        let mut buf = [0u8; READ_BUFFER_SIZE];
        let n = self.transport.read(&mut buf).await?;
        if n == 0 {
            return Err(SanextError::connection(
                ErrorKind::UnexpectedEof,
                "Connection closed by peer",
            ));
        }
        Ok(Bytes::copy_from_slice(&buf[..n]))
    }

    /// Drop bytes that are already waiting on the socket
    ///
    /// A reply that arrives after its command timed out must not be taken
    /// for the reply to the next command. Returns the number of bytes dropped.
    pub async fn discard_stale(&mut self) -> SanextResult<usize> {
        let mut discarded = 0;
        loop {
            match tokio::time::timeout(Duration::ZERO, self.receive()).await {
                Ok(Ok(bytes)) => {
                    debug!("Discarding late response: [{}]", to_hex_string(&bytes));
                    discarded += bytes.len();
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => return Ok(discarded),
            }
        }
    }

    /// Disarm the reconnect timer
    pub fn cancel_timers(&mut self) {
        if self.reconnect_timer.cancel() {
            debug!("Cancelled {} timer", self.reconnect_timer.name());
        }
    }

    /// Tear the connection down; never fails
    pub async fn close(&mut self) {
        self.cancel_timers();
        self.close_transport().await;
        self.mark_disconnected();
    }

    async fn close_transport(&mut self) {
        if let Err(e) = self.transport.close().await {
            warn!("Error while closing {}: {}", self.transport.peer(), e);
        }
    }
}
