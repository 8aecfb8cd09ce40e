//! Named, cancellable deadlines
//!
//! The client has three of them: the per-command response timeout, the idle
//! delay between sweeps and the reconnect backoff. Each is a field of the
//! component that owns it so teardown can disarm it explicitly.

use std::time::Duration;
use tokio::time::Instant;

/// A single named deadline that is either armed or idle
#[derive(Debug)]
pub struct Timer {
    name: &'static str,
    deadline: Option<Instant>,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            deadline: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Arm the timer to fire `after` from now, replacing any earlier deadline
    pub fn arm(&mut self, after: Duration) {
        self.deadline = Some(Instant::now() + after);
    }

    /// Disarm the timer; returns whether it was armed
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Resolve when the deadline passes; never resolves while disarmed
    pub async fn expired(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }
}
