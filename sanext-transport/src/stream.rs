//! Stream accessor trait for transport layer

use crate::error::{SanextError, SanextResult};
use async_trait::async_trait;

/// Stream accessor interface to access a physical stream to a remote meter
#[async_trait]
pub trait StreamAccessor: Send + Sync {
    /// Read data from the stream
    ///
    /// Resolves with whatever the peer delivered next. A result of 0 means
    /// the peer closed the connection. Implementations must be cancel safe:
    /// dropping the future before it resolves must not lose bytes that were
    /// not yet returned.
    async fn read(&mut self, buf: &mut [u8]) -> SanextResult<usize>;

    /// Write data to the stream
    ///
    /// # Returns
    ///
    /// Number of bytes written
    async fn write(&mut self, buf: &[u8]) -> SanextResult<usize>;

    /// Write all data to the stream
    async fn write_all(&mut self, buf: &[u8]) -> SanextResult<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = self.write(&buf[written..]).await?;
            if n == 0 {
                return Err(SanextError::connection(
                    std::io::ErrorKind::WriteZero,
                    "Failed to write all data",
                ));
            }
            written += n;
        }
        Ok(())
    }

    /// Flush any buffered data
    async fn flush(&mut self) -> SanextResult<()>;

    /// Check if the stream is closed
    fn is_closed(&self) -> bool;

    /// Close the stream
    ///
    /// Closing an already closed stream is not an error.
    async fn close(&mut self) -> SanextResult<()>;
}

/// Transport layer trait that extends StreamAccessor
#[async_trait]
pub trait TransportLayer: StreamAccessor {
    /// Open the physical layer connection
    ///
    /// A transport can be opened again after it was closed; this is how the
    /// client reconnects.
    async fn open(&mut self) -> SanextResult<()>;

    /// Human readable peer description for log lines
    fn peer(&self) -> String;
}
