//! Typed values decoded from meter responses

use std::fmt;

/// Device clock as reported by the system time command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SystemClock {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl SystemClock {
    /// Number of clock bytes in a response
    pub const LENGTH: usize = 6;

    /// Build from the wire bytes `[year - 2000, month, day, hour, minute, second]`
    pub fn from_bytes(bytes: [u8; 6]) -> Self {
        Self {
            year: 2000 + bytes[0] as u16,
            month: bytes[1],
            day: bytes[2],
            hour: bytes[3],
            minute: bytes[4],
            second: bytes[5],
        }
    }
}

/// Renders `DD.MM(YYYY) HH:MM:SS`; consumers parse this exact layout
impl fmt::Display for SystemClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}.{:02}({}) {:02}:{:02}:{:02}",
            self.day, self.month, self.year, self.hour, self.minute, self.second
        )
    }
}

/// Result of decoding one response
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    /// Measurement rounded to four decimal places
    Float(f64),
    /// Measurement exactly as transmitted
    RawFloat(f64),
    Timestamp(SystemClock),
}

impl DecodedValue {
    /// Numeric value, `None` for timestamps
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DecodedValue::Float(v) | DecodedValue::RawFloat(v) => Some(*v),
            DecodedValue::Timestamp(_) => None,
        }
    }
}

impl fmt::Display for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedValue::Float(v) | DecodedValue::RawFloat(v) => write!(f, "{}", v),
            DecodedValue::Timestamp(clock) => write!(f, "{}", clock),
        }
    }
}
