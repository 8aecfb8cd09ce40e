//! Device address derived from the meter serial number

use crate::error::{SanextError, SanextResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

/// Up to eight hex digits, optionally prefixed with `0x`
static SERIAL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:0[xX])?([0-9A-Fa-f]{1,8})$").expect("serial number pattern is valid")
});

/// Four byte device address placed at the start of every request frame
///
/// The address is the meter serial number read as a hexadecimal number and
/// written big-endian, so serial `"00A1B2C3"` becomes `[0x00, 0xA1, 0xB2, 0xC3]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceAddress {
    bytes: [u8; 4],
}

impl DeviceAddress {
    /// Number of address bytes on the wire
    pub const LENGTH: usize = 4;

    /// Create an address from raw bytes
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self { bytes }
    }

    /// Parse the hexadecimal serial number printed on the meter
    ///
    /// # Errors
    ///
    /// Returns `SanextError::Configuration` if the serial number is empty,
    /// contains non-hex characters or does not fit in 32 bits.
    pub fn from_serial_number(serial: &str) -> SanextResult<Self> {
        let serial = serial.trim();
        if serial.is_empty() {
            return Err(SanextError::Configuration(
                "device serial number is empty".to_string(),
            ));
        }

        let digits = SERIAL_PATTERN
            .captures(serial)
            .and_then(|caps| caps.get(1))
            .ok_or_else(|| {
                SanextError::Configuration(format!(
                    "device serial number {:?} is not a hex number of at most 8 digits",
                    serial
                ))
            })?;

        let value = u32::from_str_radix(digits.as_str(), 16).map_err(|e| {
            SanextError::Configuration(format!("device serial number {:?}: {}", serial, e))
        })?;

        Ok(Self {
            bytes: value.to_be_bytes(),
        })
    }

    /// Get the address bytes in wire order
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.bytes
    }

    /// Get the address as the numeric serial number
    pub fn serial(&self) -> u32 {
        u32::from_be_bytes(self.bytes)
    }
}

impl FromStr for DeviceAddress {
    type Err = SanextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_serial_number(s)
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.serial())
    }
}
