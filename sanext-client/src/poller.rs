//! Poll sequencer
//!
//! Walks the command catalog one request at a time. A sweep sends every
//! descriptor in catalog order; after the last one the sequencer waits for
//! the polling interval before starting over at the first descriptor.

use crate::connection::ConnectionManager;
use crate::shutdown::Shutdown;
use crate::statistics::PollStatistics;
use crate::store::{StatePublisher, StateStore};
use crate::timer::Timer;
use bytes::Bytes;
use log::{debug, error, warn};
use sanext_application::{decode, CommandCatalog, CommandDescriptor};
use sanext_core::{to_hex_string, DeviceAddress, SanextResult};
use sanext_session::{has_valid_checksum, RequestFrame};
use sanext_transport::TransportLayer;
use std::time::Duration;

/// Default delay between two sweeps
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_millis(5000);
/// Default time a command may take to be answered
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Position in the catalog
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollCursor {
    index: usize,
    sweep_count: u64,
}

impl PollCursor {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of sweeps completed so far
    pub fn sweep_count(&self) -> u64 {
        self.sweep_count
    }

    /// Move to the next descriptor of a catalog with `len` entries
    ///
    /// Returns `true` when this completed a sweep; the cursor is then back
    /// at 0.
    pub fn advance(&mut self, len: usize) -> bool {
        self.index += 1;
        if self.index >= len {
            self.index = 0;
            self.sweep_count += 1;
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }
}

/// Timing of the poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Idle delay after a completed sweep
    pub polling_interval: Duration,
    /// How long one command may wait for its response
    pub response_timeout: Duration,
    /// Pause before every send; some meters drop requests that follow
    /// their previous answer too closely
    pub send_delay: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            polling_interval: DEFAULT_POLLING_INTERVAL,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            send_delay: Duration::ZERO,
        }
    }
}

/// How one poll step ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepOutcome {
    Answered,
    TimedOut,
    /// Nothing was sent, or the answer could not be decoded
    Skipped,
    Shutdown,
}

enum Reply {
    Data(SanextResult<Bytes>),
    TimedOut,
    Shutdown,
}

/// Sends the catalog to one meter, one request at a time
pub struct PollSequencer {
    catalog: CommandCatalog,
    address: DeviceAddress,
    settings: PollSettings,
    cursor: PollCursor,
    response_timer: Timer,
    idle_timer: Timer,
}

impl PollSequencer {
    pub fn new(catalog: CommandCatalog, address: DeviceAddress, settings: PollSettings) -> Self {
        Self {
            catalog,
            address,
            settings,
            cursor: PollCursor::default(),
            response_timer: Timer::new("response"),
            idle_timer: Timer::new("idle"),
        }
    }

    pub fn catalog(&self) -> &CommandCatalog {
        &self.catalog
    }

    pub fn address(&self) -> DeviceAddress {
        self.address
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    pub fn cursor(&self) -> PollCursor {
        self.cursor
    }

    /// Names of the timers that are currently armed
    pub fn armed_timers(&self) -> Vec<&'static str> {
        [&self.response_timer, &self.idle_timer]
            .into_iter()
            .filter(|timer| timer.is_armed())
            .map(|timer| timer.name())
            .collect()
    }

    pub fn cancel_timers(&mut self) {
        for timer in [&mut self.response_timer, &mut self.idle_timer] {
            if timer.cancel() {
                debug!("Cancelled {} timer", timer.name());
            }
        }
    }

    /// Poll until shutdown or a transport error
    ///
    /// Returns `Ok(())` only when shutdown was requested. A transport error
    /// leaves the cursor on the interrupted command so it is sent again once
    /// the connection is back. Any other step error is logged and the cursor
    /// moves on.
    pub async fn run<T: TransportLayer, S: StateStore>(
        &mut self,
        conn: &mut ConnectionManager<T>,
        publisher: &mut StatePublisher<S>,
        statistics: &mut PollStatistics,
        shutdown: &mut Shutdown,
    ) -> SanextResult<()> {
        loop {
            if shutdown.is_requested() {
                return Ok(());
            }

            let descriptor = match self.catalog.at(self.cursor.index()) {
                Some(descriptor) => *descriptor,
                None => {
                    self.cursor.reset();
                    continue;
                }
            };

            let outcome = match self
                .step(&descriptor, conn, publisher, statistics, shutdown)
                .await
            {
                Ok(outcome) => outcome,
                Err(e) if e.is_transport() => return Err(e),
                Err(e) => {
                    error!("Poll step failed - {}: {}", descriptor.label, e);
                    StepOutcome::Skipped
                }
            };
            if outcome == StepOutcome::Shutdown {
                return Ok(());
            }

            if self.cursor.advance(self.catalog.len()) {
                statistics.sweeps_completed += 1;
                debug!(
                    "Sweep {} complete: {}",
                    self.cursor.sweep_count(),
                    statistics
                );
                if !self.idle(conn, shutdown).await? {
                    return Ok(());
                }
            }
        }
    }

    /// Wait out the polling interval while watching the socket
    ///
    /// Returns `false` if shutdown was requested.
    async fn idle<T: TransportLayer>(
        &mut self,
        conn: &mut ConnectionManager<T>,
        shutdown: &mut Shutdown,
    ) -> SanextResult<bool> {
        self.idle_timer.arm(self.settings.polling_interval);

        let result = loop {
            tokio::select! {
                biased;
                _ = shutdown.requested() => break Ok(false),
                _ = self.idle_timer.expired() => break Ok(true),
                received = conn.receive() => match received {
                    Ok(bytes) => debug!("Discarding unsolicited data: [{}]", to_hex_string(&bytes)),
                    Err(e) => break Err(e),
                },
            }
        };

        self.idle_timer.cancel();
        result
    }

    /// Send one command and handle its response
    pub(crate) async fn step<T: TransportLayer, S: StateStore>(
        &mut self,
        descriptor: &CommandDescriptor,
        conn: &mut ConnectionManager<T>,
        publisher: &mut StatePublisher<S>,
        statistics: &mut PollStatistics,
        shutdown: &mut Shutdown,
    ) -> SanextResult<StepOutcome> {
        let frame = match RequestFrame::new(
            self.address,
            descriptor.function_code,
            descriptor.sub_command,
        ) {
            Ok(frame) => frame.encode(),
            Err(e) => {
                error!("Cannot build request - {}: {}", descriptor.label, e);
                return Ok(StepOutcome::Skipped);
            }
        };

        debug!("Sending request - {}", descriptor.label);

        if !self.settings.send_delay.is_zero() {
            tokio::select! {
                biased;
                _ = shutdown.requested() => return Ok(StepOutcome::Shutdown),
                _ = tokio::time::sleep(self.settings.send_delay) => {}
            }
        }

        // Anything buffered now answers an earlier command, including
        // replies that arrived during the send delay.
        conn.discard_stale().await?;
        self.response_timer.arm(self.settings.response_timeout);
        debug!("Send cmd - [{}]", to_hex_string(&frame));
        if let Err(e) = conn.send(&frame).await {
            self.response_timer.cancel();
            return Err(e);
        }
        statistics.frames_sent += 1;

        let reply = tokio::select! {
            biased;
            _ = shutdown.requested() => Reply::Shutdown,
            received = conn.receive() => Reply::Data(received),
            _ = self.response_timer.expired() => Reply::TimedOut,
        };
        self.response_timer.cancel();

        let response = match reply {
            Reply::Shutdown => return Ok(StepOutcome::Shutdown),
            Reply::TimedOut => {
                statistics.timeouts += 1;
                error!("No response - {}", descriptor.label);
                return Ok(StepOutcome::TimedOut);
            }
            Reply::Data(received) => received?,
        };

        statistics.responses_received += 1;
        debug!("RESPONSE: [{}]", to_hex_string(&response));
        if !has_valid_checksum(&response) {
            statistics.checksum_mismatches += 1;
            debug!("Response checksum mismatch - {}", descriptor.label);
        }

        let value = match decode(descriptor, &response) {
            Ok(value) => value,
            Err(e) => {
                statistics.decode_errors += 1;
                warn!("Cannot decode response - {}: {}", descriptor.label, e);
                return Ok(StepOutcome::Skipped);
            }
        };
        debug!("{} ({}) = {}", descriptor.state_name, descriptor.label, value);

        if publisher.publish(descriptor.state_name, value).await? {
            statistics.states_written += 1;
        }
        Ok(StepOutcome::Answered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStateStore, MockStateStore, StateValue};
    use sanext_core::SanextError;
    use crate::testing::{float_response, response, Reply as Scripted, ScriptedTransport};
    use sanext_application::{function_code, DecoderKind};
    use sanext_transport::TransportFailure;
    use std::io::ErrorKind;

    const ADDRESS: DeviceAddress = DeviceAddress::new([0x00, 0x12, 0x34, 0x56]);

    struct Rig {
        conn: ConnectionManager<ScriptedTransport>,
        publisher: StatePublisher<MemoryStateStore>,
        statistics: PollStatistics,
        shutdown: Shutdown,
        _stop: tokio::sync::watch::Sender<bool>,
    }

    async fn rig(transport: ScriptedTransport, store: MemoryStateStore) -> Rig {
        let (stop, shutdown) = Shutdown::channel();
        let mut rig = Rig {
            conn: ConnectionManager::new(transport, Duration::from_secs(10)),
            publisher: StatePublisher::new(store),
            statistics: PollStatistics::new(),
            shutdown,
            _stop: stop,
        };
        rig.conn
            .connect(&mut rig.publisher, &mut rig.statistics)
            .await
            .unwrap();
        rig
    }

    fn catalog(descriptors: &[CommandDescriptor]) -> CommandCatalog {
        CommandCatalog::new(descriptors.to_vec()).unwrap()
    }

    const TEMP_IN: CommandDescriptor = CommandDescriptor::new(
        function_code::READ_CURRENT,
        &[0x04, 0x00, 0x00, 0x00],
        DecoderKind::RoundedFloat,
        "tempIn",
        "supply temperature",
    );

    const TEMP_OUT: CommandDescriptor = CommandDescriptor::new(
        function_code::READ_CURRENT,
        &[0x08, 0x00, 0x00, 0x00],
        DecoderKind::RoundedFloat,
        "tempOut",
        "return temperature",
    );

    #[test]
    fn test_cursor_wraps_at_sweep_end() {
        let mut cursor = PollCursor::default();
        assert!(!cursor.advance(3));
        assert!(!cursor.advance(3));
        assert_eq!(cursor.index(), 2);
        assert!(cursor.advance(3));
        assert_eq!(cursor.index(), 0);
        assert_eq!(cursor.sweep_count(), 1);
    }

    #[test]
    fn test_default_settings() {
        let settings = PollSettings::default();
        assert_eq!(settings.polling_interval, Duration::from_secs(5));
        assert_eq!(settings.response_timeout, Duration::from_secs(5));
        assert!(settings.send_delay.is_zero());
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_publishes_decoded_value() {
        let (transport, log) = ScriptedTransport::new();
        transport.push_replies(vec![Scripted::Data(float_response(
            ADDRESS,
            function_code::READ_CURRENT,
            61.25,
        ))]);
        let store = MemoryStateStore::new();
        let mut rig = rig(transport, store.clone()).await;
        let mut sequencer = PollSequencer::new(catalog(&[TEMP_IN]), ADDRESS, PollSettings::default());

        let outcome = sequencer
            .step(&TEMP_IN, &mut rig.conn, &mut rig.publisher, &mut rig.statistics, &mut rig.shutdown)
            .await
            .unwrap();
        assert_eq!(outcome, StepOutcome::Answered);
        assert_eq!(store.get("tempIn").await, Some(StateValue::Number(61.25)));
        assert_eq!(rig.statistics.states_written, 1);
        assert_eq!(rig.statistics.checksum_mismatches, 0);
        assert!(sequencer.armed_timers().is_empty());

        let frames = log.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0].1[..6], &[0x00, 0x12, 0x34, 0x56, 0x01, 0x0E]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_times_out_without_reconnect() {
        let (transport, log) = ScriptedTransport::new();
        transport.push_replies(vec![Scripted::Silence]);
        let mut rig = rig(transport, MemoryStateStore::new()).await;
        let mut sequencer = PollSequencer::new(catalog(&[TEMP_IN]), ADDRESS, PollSettings::default());

        let start = tokio::time::Instant::now();
        let outcome = sequencer
            .step(&TEMP_IN, &mut rig.conn, &mut rig.publisher, &mut rig.statistics, &mut rig.shutdown)
            .await
            .unwrap();
        assert_eq!(outcome, StepOutcome::TimedOut);
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert_eq!(rig.statistics.timeouts, 1);
        assert!(rig.conn.state().is_connected());
        assert_eq!(log.opens().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_response_is_skipped() {
        let (transport, _log) = ScriptedTransport::new();
        transport.push_replies(vec![Scripted::Data(vec![0x00, 0x12, 0x34])]);
        let store = MemoryStateStore::new();
        let mut rig = rig(transport, store.clone()).await;
        let mut sequencer = PollSequencer::new(catalog(&[TEMP_IN]), ADDRESS, PollSettings::default());

        let outcome = sequencer
            .step(&TEMP_IN, &mut rig.conn, &mut rig.publisher, &mut rig.statistics, &mut rig.shutdown)
            .await
            .unwrap();
        assert_eq!(outcome, StepOutcome::Skipped);
        assert_eq!(rig.statistics.decode_errors, 1);
        assert_eq!(rig.statistics.checksum_mismatches, 1);
        assert_eq!(store.get("tempIn").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_propagates() {
        let (transport, _log) = ScriptedTransport::new();
        transport.push_replies(vec![Scripted::Fail(ErrorKind::ConnectionReset)]);
        let mut rig = rig(transport, MemoryStateStore::new()).await;
        let mut sequencer = PollSequencer::new(catalog(&[TEMP_IN]), ADDRESS, PollSettings::default());

        let err = sequencer
            .run(&mut rig.conn, &mut rig.publisher, &mut rig.statistics, &mut rig.shutdown)
            .await
            .unwrap_err();
        assert_eq!(TransportFailure::classify(&err), TransportFailure::ConnectionReset);
        assert_eq!(sequencer.cursor().index(), 0);
        assert!(sequencer.armed_timers().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_failure_stays_in_step() {
        let (transport, log) = ScriptedTransport::new();
        transport.set_fallback(Scripted::Data(float_response(
            ADDRESS,
            function_code::READ_CURRENT,
            3.5,
        )));
        let mut store = MockStateStore::new();
        store.expect_get_state().returning(|_| Ok(None));
        store
            .expect_set_state()
            .returning(|_, _, _| Err(SanextError::Store("database offline".to_string())));
        let mut publisher = StatePublisher::new(store);
        let mut statistics = PollStatistics::new();
        let (_stop, mut shutdown) = Shutdown::channel();
        let mut conn = ConnectionManager::new(transport, Duration::from_secs(10));
        conn.connect(&mut publisher, &mut statistics).await.unwrap();
        let mut sequencer = PollSequencer::new(catalog(&[TEMP_IN, TEMP_OUT]), ADDRESS, PollSettings::default());

        let result = tokio::time::timeout(
            Duration::from_secs(1),
            sequencer.run(&mut conn, &mut publisher, &mut statistics, &mut shutdown),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(log.frames().len(), 2);
        assert_eq!(log.opens().len(), 1);
        assert!(conn.state().is_connected());
        assert_eq!(statistics.responses_received, 2);
        assert_eq!(statistics.states_written, 0);
        assert_eq!(statistics.sweeps_completed, 1);
        assert_eq!(statistics.transport_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_sweep_then_idle() {
        let (transport, log) = ScriptedTransport::new();
        transport.set_fallback(Scripted::Data(float_response(
            ADDRESS,
            function_code::READ_CURRENT,
            1.0,
        )));
        let mut rig = rig(transport, MemoryStateStore::new()).await;
        let full = CommandCatalog::sanext();
        let len = full.len();
        let mut sequencer = PollSequencer::new(full, ADDRESS, PollSettings::default());

        let _ = tokio::time::timeout(
            Duration::from_millis(7500),
            sequencer.run(&mut rig.conn, &mut rig.publisher, &mut rig.statistics, &mut rig.shutdown),
        )
        .await;

        let frames = log.frames();
        assert_eq!(frames.len(), 2 * len);
        let first_sweep_end = frames[len - 1].0;
        let second_sweep_start = frames[len].0;
        assert!(second_sweep_start - first_sweep_end >= Duration::from_secs(5));
        assert_eq!(frames[0].1, frames[len].1);
        assert_eq!(rig.statistics.sweeps_completed, 2);
        assert_eq!(sequencer.cursor().index(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_request_in_flight() {
        let (transport, log) = ScriptedTransport::new();
        let mut rig = rig(transport, MemoryStateStore::new()).await;
        let mut sequencer = PollSequencer::new(CommandCatalog::sanext(), ADDRESS, PollSettings::default());

        let _ = tokio::time::timeout(
            Duration::from_secs(16),
            sequencer.run(&mut rig.conn, &mut rig.publisher, &mut rig.statistics, &mut rig.shutdown),
        )
        .await;

        let frames = log.frames();
        assert_eq!(frames.len(), 4);
        for pair in frames.windows(2) {
            assert!(pair[1].0 - pair[0].0 >= Duration::from_secs(5));
        }
        assert_eq!(rig.statistics.timeouts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_delay_precedes_every_request() {
        let (transport, log) = ScriptedTransport::new();
        transport.set_fallback(Scripted::Data(response(ADDRESS, function_code::READ_CURRENT, &[0; 4])));
        let mut rig = rig(transport, MemoryStateStore::new()).await;
        let settings = PollSettings {
            send_delay: Duration::from_millis(500),
            ..PollSettings::default()
        };
        let mut sequencer = PollSequencer::new(CommandCatalog::sanext(), ADDRESS, settings);

        let start = tokio::time::Instant::now();
        let _ = tokio::time::timeout(
            Duration::from_millis(1250),
            sequencer.run(&mut rig.conn, &mut rig.publisher, &mut rig.statistics, &mut rig.shutdown),
        )
        .await;

        let frames = log.frames();
        assert_eq!(frames.len(), 2);
        assert!(frames[0].0 - start >= Duration::from_millis(500));
        assert!(frames[1].0 - frames[0].0 >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_reply_during_send_delay_is_dropped() {
        let (transport, log) = ScriptedTransport::new();
        let store = MemoryStateStore::new();
        let mut rig = rig(transport.clone(), store.clone()).await;
        let settings = PollSettings {
            response_timeout: Duration::from_secs(1),
            send_delay: Duration::from_millis(500),
            ..PollSettings::default()
        };
        let mut sequencer = PollSequencer::new(catalog(&[TEMP_IN, TEMP_OUT]), ADDRESS, settings);

        // tempIn goes out at 0.5s and times out at 1.5s; its reply lands at
        // 1.7s, while tempOut is still waiting out the send delay.
        let run = tokio::time::timeout(
            Duration::from_millis(3200),
            sequencer.run(&mut rig.conn, &mut rig.publisher, &mut rig.statistics, &mut rig.shutdown),
        );
        let late = async {
            tokio::time::sleep(Duration::from_millis(1700)).await;
            transport.inject(Scripted::Data(float_response(
                ADDRESS,
                function_code::READ_CURRENT,
                99.0,
            )));
        };
        let (result, ()) = tokio::join!(run, late);

        assert!(result.is_err());
        assert_eq!(store.get("tempIn").await, None);
        assert_eq!(store.get("tempOut").await, None);
        assert_eq!(rig.statistics.timeouts, 2);
        assert_eq!(rig.statistics.responses_received, 0);
        assert_eq!(log.frames().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_peer_close_during_idle_aborts_wait() {
        let (transport, log) = ScriptedTransport::new();
        transport.push_replies(vec![
            Scripted::Data(float_response(ADDRESS, function_code::READ_CURRENT, 2.0)),
        ]);
        let mut rig = rig(transport.clone(), MemoryStateStore::new()).await;
        let mut sequencer = PollSequencer::new(catalog(&[TEMP_IN]), ADDRESS, PollSettings::default());

        let run = sequencer.run(&mut rig.conn, &mut rig.publisher, &mut rig.statistics, &mut rig.shutdown);
        let stray = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            transport.inject(Scripted::Close);
            std::future::pending::<()>().await
        };
        let err = tokio::select! {
            result = run => result.unwrap_err(),
            _ = stray => unreachable!(),
        };

        assert_eq!(TransportFailure::classify(&err), TransportFailure::ClosedByPeer);
        assert_eq!(log.frames().len(), 1);
    }
}
