//! Application layer for the Sanext heat meter protocol
//!
//! This crate holds the fixed catalog of read commands, the typed values a
//! response decodes to, and the decoders themselves.

pub mod catalog;
pub mod decoder;
pub mod value;

pub use catalog::{function_code, CommandCatalog, CommandDescriptor, DecoderKind};
pub use decoder::{decode, PAYLOAD_OFFSET};
pub use value::{DecodedValue, SystemClock};
