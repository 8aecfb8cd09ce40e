//! Error types shared with the core crate

pub use sanext_core::error::{SanextError, SanextResult};
