//! Client builder
//!
//! Collects the connection, addressing and timing settings of a polling
//! client and checks them before anything touches the network.
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use sanext_client::{ClientBuilder, MemoryStateStore};
//! use std::time::Duration;
//!
//! # async fn demo() -> sanext_core::SanextResult<()> {
//! let client = ClientBuilder::new()
//!     .tcp("192.168.1.50", 4001)
//!     .serial_number("00A1B2C3")
//!     .polling_interval(Duration::from_secs(10))
//!     .build(MemoryStateStore::new())?;
//!
//! let handle = client.start();
//! // ...
//! handle.stop().await;
//! # Ok(())
//! # }
//! ```

use crate::client::SanextClient;
use crate::config::{ClientConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_RECONNECT_DELAY};
use crate::connection::ConnectionManager;
use crate::poller::{PollSequencer, PollSettings};
use crate::store::{StatePublisher, StateStore};
use sanext_application::CommandCatalog;
use sanext_core::{DeviceAddress, SanextError, SanextResult};
use sanext_session::RequestFrame;
use sanext_transport::{TcpSettings, TcpTransport, TransportLayer};
use std::time::Duration;

/// Builder for [`SanextClient`]
///
/// Host, port and the device address are required; every timing setting
/// has a default.
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    host: Option<String>,
    port: Option<u16>,
    /// Serial number as configured, parsed on build
    serial_number: Option<String>,
    address: Option<DeviceAddress>,
    catalog: CommandCatalog,
    settings: PollSettings,
    reconnect_delay: Duration,
    connect_timeout: Duration,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            host: None,
            port: None,
            serial_number: None,
            address: None,
            catalog: CommandCatalog::sanext(),
            settings: PollSettings::default(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Start from a loaded configuration
    pub fn from_config(config: &ClientConfig) -> Self {
        let mut builder = Self::new()
            .polling_interval(config.polling_interval())
            .response_timeout(config.response_timeout())
            .send_delay(config.send_delay())
            .reconnect_delay(config.reconnect_delay())
            .connect_timeout(config.connect_timeout());
        builder.host = config.host.clone();
        builder.port = config.port;
        builder.serial_number = config.device_serial_number.clone();
        builder
    }

    /// Meter (or serial gateway) reachable over TCP
    pub fn tcp(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = Some(host.into());
        self.port = Some(port);
        self
    }

    /// Hexadecimal serial number printed on the meter
    pub fn serial_number(mut self, serial: impl Into<String>) -> Self {
        self.serial_number = Some(serial.into());
        self.address = None;
        self
    }

    /// Device address, when it is already known in wire form
    pub fn address(mut self, address: DeviceAddress) -> Self {
        self.address = Some(address);
        self.serial_number = None;
        self
    }

    /// Replace the command catalog
    pub fn catalog(mut self, catalog: CommandCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn polling_interval(mut self, interval: Duration) -> Self {
        self.settings.polling_interval = interval;
        self
    }

    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.settings.response_timeout = timeout;
        self
    }

    pub fn send_delay(mut self, delay: Duration) -> Self {
        self.settings.send_delay = delay;
        self
    }

    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn resolve_address(&self) -> SanextResult<DeviceAddress> {
        if let Some(address) = self.address {
            return Ok(address);
        }
        match self.serial_number.as_deref() {
            Some(serial) => DeviceAddress::from_serial_number(serial),
            None => Err(SanextError::Configuration(
                "device serial number is not set".to_string(),
            )),
        }
    }

    /// Build a client polling over TCP
    ///
    /// # Errors
    ///
    /// `SanextError::Configuration` if host, port or the serial number is
    /// missing or invalid.
    pub fn build<S>(self, store: S) -> SanextResult<SanextClient<TcpTransport, S>>
    where
        S: StateStore + 'static,
    {
        let host = match self.host.as_deref().map(str::trim) {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => return Err(SanextError::Configuration("host is not set".to_string())),
        };
        let port = match self.port {
            Some(port) if port != 0 => port,
            _ => return Err(SanextError::Configuration("port is not set".to_string())),
        };

        let settings = TcpSettings::with_connect_timeout(host, port, self.connect_timeout);
        self.build_with_transport(TcpTransport::new(settings), store)
    }

    /// Build a client on top of any transport
    pub fn build_with_transport<T, S>(self, transport: T, store: S) -> SanextResult<SanextClient<T, S>>
    where
        T: TransportLayer + 'static,
        S: StateStore + 'static,
    {
        let address = self.resolve_address()?;
        for descriptor in self.catalog.iter() {
            RequestFrame::new(address, descriptor.function_code, descriptor.sub_command)?;
        }

        Ok(SanextClient::new(
            ConnectionManager::new(transport, self.reconnect_delay),
            PollSequencer::new(self.catalog, address, self.settings),
            StatePublisher::new(store),
        ))
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
