//! Core types and utilities for the Sanext heat meter protocol
//!
//! This crate provides the error type, the device address derived from the
//! meter serial number, and small formatting helpers shared by every layer.

pub mod address;
pub mod error;
pub mod hex_fmt;

pub use address::DeviceAddress;
pub use error::{SanextError, SanextResult};
pub use hex_fmt::to_hex_string;
