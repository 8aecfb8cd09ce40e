//! sanext - Rust client for Sanext heat meters
//!
//! Polls a Sanext heat meter over its proprietary binary request/response
//! protocol (usually behind a serial-to-TCP gateway) and publishes the
//! decoded readings to a state store.
//!
//! # Architecture
//!
//! This library is organized as a workspace with multiple crates:
//!
//! - `sanext-core`: Error type, device address, hex formatting
//! - `sanext-transport`: Stream abstraction, TCP transport, failure classification
//! - `sanext-session`: CRC-16 checksum and request frames
//! - `sanext-application`: Command catalog and response decoders
//! - `sanext-client`: Connection manager, poll sequencer, state publisher, lifecycle
//!
//! # Usage
//!
//! ```no_run
//! use sanext::client::{ClientBuilder, MemoryStateStore};
//!
//! # async fn demo() -> sanext::SanextResult<()> {
//! let handle = ClientBuilder::new()
//!     .tcp("192.168.1.50", 4001)
//!     .serial_number("00A1B2C3")
//!     .build(MemoryStateStore::new())?
//!     .start();
//! handle.stop().await;
//! # Ok(())
//! # }
//! ```

// Re-export core types
pub use sanext_core::{to_hex_string, DeviceAddress, SanextError, SanextResult};

// Re-export protocol layers
pub mod protocol {
    pub use sanext_application::*;
    pub use sanext_session::{checksum, has_valid_checksum, CrcCalc, RequestFrame};
}

// Re-export transport API
pub mod transport {
    pub use sanext_transport::*;
}

// Re-export client API
pub mod client {
    pub use sanext_client::*;
}
