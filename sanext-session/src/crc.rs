//! CRC-16 checksum used by Sanext frames
//!
//! Initial value 0xFFFF, reflected polynomial 0xA001 (the Modbus CRC). The
//! checksum is sent low byte first.

/// CRC calculation constants
const INITIAL_CRC: u16 = 0xFFFF;
const POLYNOMIAL: u16 = 0xA001; // Bit-reversed 0x8005

/// Precomputed CRC table, built from the bit-at-a-time definition
static CRC_TABLE: once_cell::sync::Lazy<[u16; 256]> = once_cell::sync::Lazy::new(|| {
    let mut table = [0u16; 256];
    for (b, entry) in table.iter_mut().enumerate() {
        *entry = shift_byte(b as u16);
    }
    table
});

/// Run the eight shift/XOR steps for one byte already XORed into the register
fn shift_byte(mut crc: u16) -> u16 {
    for _ in 0..8 {
        let odd = crc & 0x0001;
        crc >>= 1;
        if odd == 1 {
            crc ^= POLYNOMIAL;
        }
    }
    crc
}

/// Incremental CRC-16 calculator
#[derive(Debug, Clone)]
pub struct CrcCalc {
    crc_value: u16,
}

impl CrcCalc {
    /// Create a new CRC calculator
    pub fn new() -> Self {
        Self {
            crc_value: INITIAL_CRC,
        }
    }

    /// Reset the CRC value to initial state
    pub fn reset(&mut self) {
        self.crc_value = INITIAL_CRC;
    }

    /// Update the CRC value with a single byte
    pub fn update(&mut self, data: u8) {
        self.crc_value =
            (self.crc_value >> 8) ^ CRC_TABLE[((self.crc_value ^ data as u16) & 0xFF) as usize];
    }

    /// Update the CRC value with multiple bytes
    pub fn update_bytes(&mut self, data: &[u8]) {
        for &byte in data {
            self.update(byte);
        }
    }

    /// Get the current CRC value
    pub fn value(&self) -> u16 {
        self.crc_value
    }

    /// Get the CRC value in wire order (low byte, high byte)
    pub fn value_bytes(&self) -> [u8; 2] {
        self.crc_value.to_le_bytes()
    }
}

impl Default for CrcCalc {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute the checksum of `bytes`
pub fn checksum(bytes: &[u8]) -> u16 {
    let mut calc = CrcCalc::new();
    calc.update_bytes(bytes);
    calc.value()
}

/// Append the checksum of `command` (low byte, then high byte)
pub fn frame(command: &[u8]) -> Vec<u8> {
    let mut calc = CrcCalc::new();
    calc.update_bytes(command);

    let mut result = Vec::with_capacity(command.len() + 2);
    result.extend_from_slice(command);
    result.extend_from_slice(&calc.value_bytes());
    result
}

/// Check that the last two bytes of `data` are the checksum of the rest
///
/// Returns `false` for inputs shorter than a checksum.
pub fn has_valid_checksum(data: &[u8]) -> bool {
    if data.len() < 2 {
        return false;
    }
    let (body, crc) = data.split_at(data.len() - 2);
    checksum(body).to_le_bytes() == [crc[0], crc[1]]
}
