//! Client configuration
//!
//! Loaded from a TOML file. Field names follow the snake_case style; the
//! short names used by older installations (`ip`, `pollingtime`, `sn`) are
//! accepted as aliases.
//!
//! ```toml
//! host = "192.168.1.50"
//! port = 4001
//! device_serial_number = "00A1B2C3"
//! polling_interval_ms = 5000
//! ```

use crate::poller::{DEFAULT_POLLING_INTERVAL, DEFAULT_RESPONSE_TIMEOUT};
use sanext_core::{DeviceAddress, SanextError, SanextResult};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::time::Duration;

/// Default reconnect backoff
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(10_000);
/// Default TCP connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Settings of one polling client
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    #[serde(alias = "ip")]
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Idle delay between sweeps; anything that is not a non-negative
    /// number falls back to the default
    #[serde(alias = "pollingtime", deserialize_with = "lenient_millis")]
    pub polling_interval_ms: Option<u64>,
    /// Hexadecimal serial number printed on the meter
    #[serde(alias = "sn")]
    pub device_serial_number: Option<String>,
    pub response_timeout_ms: Option<u64>,
    pub reconnect_delay_ms: Option<u64>,
    pub send_delay_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
}

impl ClientConfig {
    /// Read a configuration file
    pub fn load(path: impl AsRef<Path>) -> SanextResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SanextError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> SanextResult<Self> {
        toml::from_str(content).map_err(|e| SanextError::Configuration(e.to_string()))
    }

    pub fn polling_interval(&self) -> Duration {
        self.polling_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_POLLING_INTERVAL)
    }

    pub fn response_timeout(&self) -> Duration {
        self.response_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_RESPONSE_TIMEOUT)
    }

    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_RECONNECT_DELAY)
    }

    pub fn send_delay(&self) -> Duration {
        self.send_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(Duration::ZERO)
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT)
    }

    /// Meter address derived from the serial number
    ///
    /// # Errors
    ///
    /// `SanextError::Configuration` if the serial number is missing or not
    /// a hex number of at most 8 digits.
    pub fn device_address(&self) -> SanextResult<DeviceAddress> {
        match self.device_serial_number.as_deref() {
            Some(serial) => DeviceAddress::from_serial_number(serial),
            None => Err(SanextError::Configuration(
                "device serial number is not set".to_string(),
            )),
        }
    }

    /// Check everything polling cannot start without
    pub fn validate(&self) -> SanextResult<()> {
        match self.host.as_deref().map(str::trim) {
            Some(host) if !host.is_empty() => {}
            _ => return Err(SanextError::Configuration("host is not set".to_string())),
        }
        match self.port {
            Some(port) if port != 0 => {}
            _ => return Err(SanextError::Configuration("port is not set".to_string())),
        }
        self.device_address().map(|_| ())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LenientNumber {
    Integer(i64),
    Float(f64),
    Text(String),
    Other(IgnoredAny),
}

fn lenient_millis<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = match LenientNumber::deserialize(deserializer)? {
        LenientNumber::Integer(value) => u64::try_from(value).ok(),
        LenientNumber::Float(value) if value.is_finite() && value >= 0.0 => Some(value as u64),
        LenientNumber::Text(text) => leading_integer(&text),
        LenientNumber::Float(_) | LenientNumber::Other(_) => None,
    };
    Ok(millis)
}

/// Integer at the start of `text`, so `"7000 ms"` reads as 7000
fn leading_integer(text: &str) -> Option<u64> {
    let digits: String = text
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
