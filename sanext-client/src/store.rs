//! State store boundary and the publisher that writes through it
//!
//! The store itself (a home automation object database, an MQTT retained
//! topic tree, ...) lives outside this crate. The client only reads the
//! current value of a state and writes a new one when it changed.

use async_trait::async_trait;
use log::{debug, info};
use sanext_application::DecodedValue;
use sanext_core::SanextResult;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// State that reflects whether the meter connection is up
pub const CONNECTION_STATE: &str = "info.connection";

/// Value shape written to the store
#[derive(Debug, Clone, PartialEq)]
pub enum StateValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl From<DecodedValue> for StateValue {
    fn from(value: DecodedValue) -> Self {
        match value {
            DecodedValue::Float(v) | DecodedValue::RawFloat(v) => StateValue::Number(v),
            DecodedValue::Timestamp(clock) => StateValue::Text(clock.to_string()),
        }
    }
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        StateValue::Bool(value)
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Bool(v) => write!(f, "{}", v),
            StateValue::Number(v) => write!(f, "{}", v),
            StateValue::Text(v) => f.write_str(v),
        }
    }
}

/// External state store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Current value of `name`, `None` if it was never written
    async fn get_state(&self, name: &str) -> SanextResult<Option<StateValue>>;

    /// Write `value`; `ack` marks it as confirmed by the device
    async fn set_state(&self, name: &str, value: StateValue, ack: bool) -> SanextResult<()>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    states: RwLock<HashMap<String, StateValue>>,
    writes: AtomicU64,
}

/// In-process state store
///
/// Clones share the same states, so a caller can keep a handle while the
/// client owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<MemoryInner>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set_state` calls so far
    pub fn writes(&self) -> u64 {
        self.inner.writes.load(Ordering::Relaxed)
    }

    /// Current value of `name`
    pub async fn get(&self, name: &str) -> Option<StateValue> {
        self.inner.states.read().await.get(name).cloned()
    }

    /// Copy of every state
    pub async fn snapshot(&self) -> HashMap<String, StateValue> {
        self.inner.states.read().await.clone()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get_state(&self, name: &str) -> SanextResult<Option<StateValue>> {
        Ok(self.get(name).await)
    }

    async fn set_state(&self, name: &str, value: StateValue, _ack: bool) -> SanextResult<()> {
        self.inner.writes.fetch_add(1, Ordering::Relaxed);
        self.inner
            .states
            .write()
            .await
            .insert(name.to_string(), value);
        Ok(())
    }
}

/// Writes decoded values through to the store when they change
pub struct StatePublisher<S: StateStore> {
    store: S,
    last_known: HashMap<String, StateValue>,
}

impl<S: StateStore> StatePublisher<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            last_known: HashMap::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Last value published (or found in the store) for `name`
    pub fn last_known(&self, name: &str) -> Option<&StateValue> {
        self.last_known.get(name)
    }

    /// Publish a decoded value under `name`
    ///
    /// The store is only consulted the first time a state is seen; after that
    /// the cache decides. Returns whether a write happened.
    pub async fn publish(&mut self, name: &str, value: DecodedValue) -> SanextResult<bool> {
        let value = StateValue::from(value);

        let previous = match self.last_known.get(name) {
            Some(known) => Some(known.clone()),
            None => self.store.get_state(name).await?,
        };

        if let Some(old) = previous {
            if old == value {
                debug!("setState {} {{ oldVal: {} = newVal: {} }}", name, old, value);
                self.last_known.insert(name.to_string(), value);
                return Ok(false);
            }
            debug!("setState {} {{ oldVal: {} != newVal: {} }}", name, old, value);
        }

        self.store.set_state(name, value.clone(), true).await?;
        self.last_known.insert(name.to_string(), value);
        Ok(true)
    }

    /// Publish the connection flag; always written
    pub async fn publish_connectivity(&mut self, connected: bool) -> SanextResult<()> {
        info!("{} = {}", CONNECTION_STATE, connected);
        self.store
            .set_state(CONNECTION_STATE, StateValue::Bool(connected), true)
            .await
    }
}
