//! In-memory transport and store used by the client tests

use crate::store::{StateStore, StateValue};
use async_trait::async_trait;
use sanext_core::{DeviceAddress, SanextError, SanextResult};
use sanext_session::crc;
use sanext_transport::{StreamAccessor, TransportLayer};
use std::collections::{HashMap, VecDeque};
use std::io::ErrorKind;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::time::Instant;

/// What the scripted meter does after receiving a request
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Data(Vec<u8>),
    /// Never answer
    Silence,
    /// Close the connection (read returns 0)
    Close,
    Fail(ErrorKind),
}

#[derive(Debug, Default)]
struct Script {
    open_failures: VecDeque<ErrorKind>,
    replies: VecDeque<Reply>,
    fallback: Option<Reply>,
    /// Bytes and events waiting on the socket, oldest first
    pending: VecDeque<Reply>,
    fail_closes: bool,
}

#[derive(Debug, Default)]
struct Recording {
    opens: Vec<Instant>,
    frames: Vec<(Instant, Vec<u8>)>,
    closes: usize,
}

/// Shared view of what a `ScriptedTransport` saw
#[derive(Debug, Clone, Default)]
pub struct TransportLog {
    inner: Arc<Mutex<Recording>>,
}

impl TransportLog {
    /// Instants of every open attempt, failed ones included
    pub fn opens(&self) -> Vec<Instant> {
        self.inner.lock().unwrap().opens.clone()
    }

    pub fn frames(&self) -> Vec<(Instant, Vec<u8>)> {
        self.inner.lock().unwrap().frames.clone()
    }

    pub fn closes(&self) -> usize {
        self.inner.lock().unwrap().closes
    }
}

/// Transport that answers each written frame with the next scripted reply
#[derive(Debug, Clone)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
    wakeup: Arc<Notify>,
    log: TransportLog,
    open: bool,
}

impl ScriptedTransport {
    pub fn new() -> (Self, TransportLog) {
        let log = TransportLog::default();
        let transport = Self {
            script: Arc::new(Mutex::new(Script::default())),
            wakeup: Arc::new(Notify::new()),
            log: log.clone(),
            open: false,
        };
        (transport, log)
    }

    /// Fail the next open attempts, one kind per attempt
    pub fn fail_opens(&self, kinds: &[ErrorKind]) {
        self.script.lock().unwrap().open_failures.extend(kinds.iter().copied());
    }

    pub fn push_replies(&self, replies: Vec<Reply>) {
        self.script.lock().unwrap().replies.extend(replies);
    }

    /// Reply used once the scripted replies run out (silence by default)
    pub fn set_fallback(&self, reply: Reply) {
        self.script.lock().unwrap().fallback = Some(reply);
    }

    pub fn fail_closes(&self) {
        self.script.lock().unwrap().fail_closes = true;
    }

    /// Deliver `reply` without waiting for a request (unsolicited data,
    /// late replies, peer close while idle)
    pub fn inject(&self, reply: Reply) {
        self.script.lock().unwrap().pending.push_back(reply);
        self.wakeup.notify_one();
    }
}

#[async_trait]
impl StreamAccessor for ScriptedTransport {
    async fn read(&mut self, buf: &mut [u8]) -> SanextResult<usize> {
        loop {
            let reply = self.script.lock().unwrap().pending.pop_front();
            match reply {
                Some(Reply::Data(data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    return Ok(n);
                }
                Some(Reply::Close) => {
                    self.open = false;
                    return Ok(0);
                }
                Some(Reply::Fail(kind)) => {
                    return Err(SanextError::connection(kind, "scripted failure"));
                }
                Some(Reply::Silence) => continue,
                None => self.wakeup.notified().await,
            }
        }
    }

    async fn write(&mut self, buf: &[u8]) -> SanextResult<usize> {
        if !self.open {
            return Err(SanextError::connection(ErrorKind::NotConnected, "not open"));
        }
        self.log
            .inner
            .lock()
            .unwrap()
            .frames
            .push((Instant::now(), buf.to_vec()));

        let mut script = self.script.lock().unwrap();
        let next = match script.replies.pop_front() {
            Some(reply) => Some(reply),
            None => script.fallback.clone(),
        };
        if let Some(reply) = next {
            script.pending.push_back(reply);
        }
        drop(script);
        self.wakeup.notify_one();
        Ok(buf.len())
    }

    async fn flush(&mut self) -> SanextResult<()> {
        Ok(())
    }

    fn is_closed(&self) -> bool {
        !self.open
    }

    async fn close(&mut self) -> SanextResult<()> {
        self.open = false;
        self.log.inner.lock().unwrap().closes += 1;
        let mut script = self.script.lock().unwrap();
        script.pending.clear();
        if script.fail_closes {
            return Err(SanextError::connection(ErrorKind::Other, "scripted close failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl TransportLayer for ScriptedTransport {
    async fn open(&mut self) -> SanextResult<()> {
        self.log.inner.lock().unwrap().opens.push(Instant::now());
        let failure = self.script.lock().unwrap().open_failures.pop_front();
        if let Some(kind) = failure {
            return Err(SanextError::connection(kind, "scripted open failure"));
        }
        self.open = true;
        Ok(())
    }

    fn peer(&self) -> String {
        "scripted meter".to_string()
    }
}

/// State store that keeps every write with the instant it happened
#[derive(Debug, Clone, Default)]
pub struct RecordingStore {
    inner: Arc<Mutex<(HashMap<String, StateValue>, Vec<(Instant, String, StateValue)>)>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<(Instant, String, StateValue)> {
        self.inner.lock().unwrap().1.clone()
    }

    pub fn writes_to(&self, name: &str) -> Vec<(Instant, StateValue)> {
        self.writes()
            .into_iter()
            .filter(|(_, n, _)| n == name)
            .map(|(at, _, value)| (at, value))
            .collect()
    }
}

#[async_trait]
impl StateStore for RecordingStore {
    async fn get_state(&self, name: &str) -> SanextResult<Option<StateValue>> {
        Ok(self.inner.lock().unwrap().0.get(name).cloned())
    }

    async fn set_state(&self, name: &str, value: StateValue, _ack: bool) -> SanextResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.0.insert(name.to_string(), value.clone());
        inner.1.push((Instant::now(), name.to_string(), value));
        Ok(())
    }
}

/// Meter response carrying `value` as a little-endian f32
pub fn float_response(address: DeviceAddress, function_code: u8, value: f32) -> Vec<u8> {
    response(address, function_code, &value.to_le_bytes())
}

/// Meter response: address, function code, length, `payload`, checksum
pub fn response(address: DeviceAddress, function_code: u8, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(6 + payload.len());
    body.extend_from_slice(address.as_bytes());
    body.push(function_code);
    body.push((6 + payload.len() + 2) as u8);
    body.extend_from_slice(payload);
    crc::frame(&body)
}
