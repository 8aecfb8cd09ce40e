//! Framing layer for the Sanext heat meter protocol
//!
//! Every request is a short frame addressed to one meter and closed by a
//! CRC-16 checksum. Responses carry no framing beyond what a single TCP read
//! delivers, so this crate only builds requests and inspects response
//! checksums for diagnostics.

pub mod crc;
pub mod error;
pub mod frame;

pub use crc::{checksum, frame, has_valid_checksum, CrcCalc};
pub use error::{SanextError, SanextResult};
pub use frame::{RequestFrame, MAX_SUB_COMMAND_LENGTH, TERMINATOR};
