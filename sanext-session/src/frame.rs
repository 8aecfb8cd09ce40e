//! Request frame structure and encoding

use crate::crc::CrcCalc;
use crate::error::{SanextError, SanextResult};
use bytes::{BufMut, BytesMut};
use sanext_core::DeviceAddress;
use std::fmt;

/// Two fixed bytes closing the request body, right before the checksum
pub const TERMINATOR: [u8; 2] = [0x78, 0x78];

/// Longest sub-command a read request carries
pub const MAX_SUB_COMMAND_LENGTH: usize = 4;

/// Base of the length byte; the sub-command length is added to it
const LENGTH_BASE: u8 = 10;

/// Read request sent to the meter
///
/// Wire layout:
/// ```text
/// | address (4) | function | length | sub-command (0..4) | 0x78 0x78 | crc lo | crc hi |
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    address: DeviceAddress,
    function_code: u8,
    sub_command: Vec<u8>,
}

impl RequestFrame {
    /// Create a new request frame
    ///
    /// # Errors
    ///
    /// Returns `SanextError::InvalidData` if the sub-command is longer than
    /// `MAX_SUB_COMMAND_LENGTH` bytes.
    pub fn new(address: DeviceAddress, function_code: u8, sub_command: &[u8]) -> SanextResult<Self> {
        if sub_command.len() > MAX_SUB_COMMAND_LENGTH {
            return Err(SanextError::InvalidData(format!(
                "Sub-command of {} bytes exceeds the maximum of {}",
                sub_command.len(),
                MAX_SUB_COMMAND_LENGTH
            )));
        }
        Ok(Self {
            address,
            function_code,
            sub_command: sub_command.to_vec(),
        })
    }

    /// Value of the length byte
    pub fn length_byte(&self) -> u8 {
        LENGTH_BASE + self.sub_command.len() as u8
    }

    /// Number of bytes `encode` produces
    pub fn encoded_len(&self) -> usize {
        DeviceAddress::LENGTH + 2 + self.sub_command.len() + TERMINATOR.len() + 2
    }

    /// Encode the frame, checksum included
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_slice(self.address.as_bytes());
        buf.put_u8(self.function_code);
        buf.put_u8(self.length_byte());
        buf.put_slice(&self.sub_command);
        buf.put_slice(&TERMINATOR);

        let mut crc = CrcCalc::new();
        crc.update_bytes(&buf);
        buf.put_slice(&crc.value_bytes());
        buf.to_vec()
    }

    pub fn address(&self) -> DeviceAddress {
        self.address
    }

    pub fn function_code(&self) -> u8 {
        self.function_code
    }

    pub fn sub_command(&self) -> &[u8] {
        &self.sub_command
    }
}

impl fmt::Display for RequestFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] fn=0x{:02X} sub=[{}]",
            self.address,
            self.function_code,
            sanext_core::to_hex_string(&self.sub_command)
        )
    }
}
