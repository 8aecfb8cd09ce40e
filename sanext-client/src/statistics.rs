//! Polling statistics collection

use std::fmt;

/// Polling statistics
///
/// Counters are updated by the connection manager and the poll sequencer and
/// logged at the end of every sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollStatistics {
    /// Total number of request frames sent
    pub frames_sent: u64,
    /// Number of responses received before their timeout
    pub responses_received: u64,
    /// Number of commands that got no response in time
    pub timeouts: u64,
    /// Number of responses too short for their decoder
    pub decode_errors: u64,
    /// Number of responses whose trailing checksum did not match
    pub checksum_mismatches: u64,
    /// Number of state writes
    pub states_written: u64,
    /// Number of connection attempts
    pub connect_attempts: u64,
    /// Number of transport failures (failed attempts included)
    pub transport_failures: u64,
    /// Number of completed sweeps
    pub sweeps_completed: u64,
}

impl PollStatistics {
    /// Create new statistics with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all statistics counters
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Share of sent requests that got a usable response, in percent
    ///
    /// Returns 0.0 if nothing has been sent.
    pub fn success_rate(&self) -> f64 {
        if self.frames_sent == 0 {
            return 0.0;
        }
        let usable = self.responses_received.saturating_sub(self.decode_errors);
        (usable as f64 / self.frames_sent as f64) * 100.0
    }
}

impl fmt::Display for PollStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sweeps={} sent={} received={} timeouts={} decode_errors={} crc_mismatches={} written={} connects={} failures={}",
            self.sweeps_completed,
            self.frames_sent,
            self.responses_received,
            self.timeouts,
            self.decode_errors,
            self.checksum_mismatches,
            self.states_written,
            self.connect_attempts,
            self.transport_failures
        )
    }
}
