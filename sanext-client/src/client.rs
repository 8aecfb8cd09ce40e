//! Polling client
//!
//! Ties the connection manager, the poll sequencer and the state publisher
//! together in one task that owns the whole session.

use crate::connection::ConnectionManager;
use crate::poller::PollSequencer;
use crate::shutdown::Shutdown;
use crate::state::ConnectionState;
use crate::statistics::PollStatistics;
use crate::store::{StatePublisher, StateStore};
use log::{debug, error, info};
use sanext_transport::TransportLayer;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Polling client for one meter
///
/// Built with [`ClientBuilder`](crate::ClientBuilder). [`run`](Self::run)
/// drives the session on the current task; [`start`](Self::start) moves it
/// onto its own task.
pub struct SanextClient<T: TransportLayer, S: StateStore> {
    connection: ConnectionManager<T>,
    sequencer: PollSequencer,
    publisher: StatePublisher<S>,
    statistics: PollStatistics,
}

impl<T, S> SanextClient<T, S>
where
    T: TransportLayer + 'static,
    S: StateStore + 'static,
{
    pub fn new(
        connection: ConnectionManager<T>,
        sequencer: PollSequencer,
        publisher: StatePublisher<S>,
    ) -> Self {
        Self {
            connection,
            sequencer,
            publisher,
            statistics: PollStatistics::new(),
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn statistics(&self) -> &PollStatistics {
        &self.statistics
    }

    pub fn sequencer(&self) -> &PollSequencer {
        &self.sequencer
    }

    pub fn publisher(&self) -> &StatePublisher<S> {
        &self.publisher
    }

    /// Names of every armed timer
    pub fn armed_timers(&self) -> Vec<&'static str> {
        let mut armed = self.sequencer.armed_timers();
        if self.connection.reconnect_timer().is_armed() {
            armed.push(self.connection.reconnect_timer().name());
        }
        armed
    }

    /// Connect, poll, reconnect on failure, until shutdown is requested
    ///
    /// On return every timer is disarmed and the socket is closed.
    pub async fn run(&mut self, mut shutdown: Shutdown) {
        info!(
            "Polling meter {} via {}",
            self.sequencer.address(),
            self.connection.transport().peer()
        );

        loop {
            if shutdown.is_requested() {
                break;
            }

            let connected = tokio::select! {
                biased;
                _ = shutdown.requested() => break,
                result = self.connection.connect(&mut self.publisher, &mut self.statistics) => result,
            };

            let error = match connected {
                Ok(()) => {
                    match self
                        .sequencer
                        .run(
                            &mut self.connection,
                            &mut self.publisher,
                            &mut self.statistics,
                            &mut shutdown,
                        )
                        .await
                    {
                        Ok(()) => break,
                        Err(e) => e,
                    }
                }
                Err(e) => e,
            };

            self.connection
                .fail(&error, &mut self.publisher, &mut self.statistics)
                .await;
            if !self.connection.wait_reconnect(&mut shutdown).await {
                break;
            }
        }

        self.teardown().await;
    }

    async fn teardown(&mut self) {
        self.sequencer.cancel_timers();
        self.connection.cancel_timers();

        if self.connection.state().is_connected() {
            if let Err(e) = self.publisher.publish_connectivity(false).await {
                error!("Failed to publish connectivity: {}", e);
            }
        }
        self.connection.close().await;
        info!("Stopped polling: {}", self.statistics);
        debug!("cleaned everything up...");
    }

    /// Spawn the polling task
    pub fn start(mut self) -> ClientHandle {
        let (tx, shutdown) = Shutdown::channel();
        let task = tokio::spawn(async move {
            self.run(shutdown).await;
            self.statistics
        });
        ClientHandle { shutdown: tx, task }
    }
}

/// Handle to a spawned polling task
pub struct ClientHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<PollStatistics>,
}

impl ClientHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop polling and wait for the task to clean up
    ///
    /// Always completes. Returns the final statistics, or `None` if the task
    /// panicked.
    pub async fn stop(self) -> Option<PollStatistics> {
        let _ = self.shutdown.send(true);
        match self.task.await {
            Ok(statistics) => Some(statistics),
            Err(e) => {
                error!("Polling task ended abnormally: {}", e);
                None
            }
        }
    }
}
