//! Catalog of read commands polled from the meter
//!
//! The order of the catalog is the order of a sweep. Each descriptor names
//! the state its decoded value is published under; those names are what
//! downstream consumers subscribe to and must stay stable.

use sanext_core::{SanextError, SanextResult};
use std::fmt;

/// Function codes understood by the meter
pub mod function_code {
    /// Read current measurement selected by the sub-command bit mask
    pub const READ_CURRENT: u8 = 0x01;
    /// Read the device system clock
    pub const READ_SYSTEM_TIME: u8 = 0x04;
}

/// How the payload of a response is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecoderKind {
    /// Little-endian f32 rounded to four decimal places
    RoundedFloat,
    /// Little-endian f32 published as is (counters, run time)
    RawFloat,
    /// Six byte device clock rendered as `DD.MM(YYYY) HH:MM:SS`
    SystemClock,
}

impl DecoderKind {
    /// Name used in log lines and errors
    pub fn name(&self) -> &'static str {
        match self {
            DecoderKind::RoundedFloat => "rounded float",
            DecoderKind::RawFloat => "raw float",
            DecoderKind::SystemClock => "system clock",
        }
    }
}

impl fmt::Display for DecoderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static description of one read command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub function_code: u8,
    pub sub_command: &'static [u8],
    pub decoder: DecoderKind,
    /// State the decoded value is published under
    pub state_name: &'static str,
    pub label: &'static str,
}

impl CommandDescriptor {
    pub const fn new(
        function_code: u8,
        sub_command: &'static [u8],
        decoder: DecoderKind,
        state_name: &'static str,
        label: &'static str,
    ) -> Self {
        Self {
            function_code,
            sub_command,
            decoder,
            state_name,
            label,
        }
    }

    const fn current(
        mask: &'static [u8],
        decoder: DecoderKind,
        state_name: &'static str,
        label: &'static str,
    ) -> Self {
        Self::new(function_code::READ_CURRENT, mask, decoder, state_name, label)
    }
}

use DecoderKind::{RawFloat, RoundedFloat, SystemClock};

const SANEXT_COMMANDS: [CommandDescriptor; 14] = [
    CommandDescriptor::current(&[0x40, 0x00, 0x00, 0x00], RoundedFloat, "Energy", "accumulated energy"),
    CommandDescriptor::current(&[0x04, 0x00, 0x00, 0x00], RoundedFloat, "tempIn", "supply temperature"),
    CommandDescriptor::current(&[0x08, 0x00, 0x00, 0x00], RoundedFloat, "tempOut", "return temperature"),
    CommandDescriptor::current(&[0x10, 0x00, 0x00, 0x00], RoundedFloat, "tempDiff", "temperature differential"),
    CommandDescriptor::current(&[0x20, 0x00, 0x00, 0x00], RoundedFloat, "power", "instantaneous power"),
    CommandDescriptor::current(&[0x80, 0x00, 0x00, 0x00], RoundedFloat, "volume", "accumulated volume"),
    CommandDescriptor::current(&[0x00, 0x01, 0x00, 0x00], RoundedFloat, "rate", "flow rate"),
    CommandDescriptor::current(&[0x00, 0x02, 0x00, 0x00], RawFloat, "imp1", "pulse input 1"),
    CommandDescriptor::current(&[0x00, 0x04, 0x00, 0x00], RawFloat, "imp2", "pulse input 2"),
    CommandDescriptor::current(&[0x00, 0x08, 0x00, 0x00], RawFloat, "imp3", "pulse input 3"),
    CommandDescriptor::current(&[0x00, 0x10, 0x00, 0x00], RawFloat, "imp4", "pulse input 4"),
    CommandDescriptor::current(&[0x00, 0x20, 0x00, 0x00], RoundedFloat, "rateEn", "flow rate (by energy)"),
    CommandDescriptor::current(&[0x00, 0x00, 0x08, 0x00], RawFloat, "timeWork", "total running time"),
    CommandDescriptor::new(function_code::READ_SYSTEM_TIME, &[], SystemClock, "sysTime", "device system clock"),
];

/// Ordered, read-only list of commands making up one sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCatalog {
    descriptors: Vec<CommandDescriptor>,
}

impl CommandCatalog {
    /// Catalog of everything a Sanext heat meter is polled for
    pub fn sanext() -> Self {
        Self {
            descriptors: SANEXT_COMMANDS.to_vec(),
        }
    }

    /// Build a custom catalog
    ///
    /// # Errors
    ///
    /// Returns `SanextError::InvalidData` for an empty list, since a sweep
    /// over nothing would spin without ever talking to the meter.
    pub fn new(descriptors: Vec<CommandDescriptor>) -> SanextResult<Self> {
        if descriptors.is_empty() {
            return Err(SanextError::InvalidData(
                "Command catalog must not be empty".to_string(),
            ));
        }
        Ok(Self { descriptors })
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Descriptor at `index`, `None` past the end
    pub fn at(&self, index: usize) -> Option<&CommandDescriptor> {
        self.descriptors.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandDescriptor> {
        self.descriptors.iter()
    }
}

impl Default for CommandCatalog {
    fn default() -> Self {
        Self::sanext()
    }
}
