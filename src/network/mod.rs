//! Network layer of the sensor node.
//!
//! The broker session talks to its peer through the small blocking transport
//! traits defined here, so the same MQTT code runs on a microcontroller
//! socket, a host `TcpStream` ([`tcp::TcpNetwork`] with the `std` feature) or
//! a scripted mock in tests. The WiFi association lives in [`link`].

#![deny(unsafe_code)]

use error::TransportError;

/// Common error types for transport operations
pub mod error;

/// WiFi association with primary and fallback profiles
pub mod link;

/// Minimal MQTT 3.1.1 codec and broker session
pub mod mqtt;

/// `std::net` transport
#[cfg(feature = "std")]
pub mod tcp;

/// Re-exports of the transport traits
pub mod prelude {
    pub use super::{Close, Connect, Connection, Read, Write};
}

/// Byte source half of a connection.
pub trait Read {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Read data from the connection.
    ///
    /// `Ok(0)` means the peer closed the stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

/// Byte sink half of a connection.
pub trait Write {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Write data to the connection, returning how many bytes were accepted
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
    /// Flush the write buffer
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// Consuming shutdown of a connection.
pub trait Close {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Close the connection
    fn close(self) -> Result<(), Self::Error>;
}

/// A synchronous stream connection
pub trait Connection: Read + Write + Close {}

/// Opens stream connections to a remote host.
pub trait Connect {
    /// Associated connection type
    type Connection: Connection;
    /// Associated error type, reported to the session as a [`TransportError`]
    type Error: core::fmt::Debug + Into<TransportError>;

    /// Resolve `host`, open a stream to `host:port` and arm a read timeout of
    /// `read_timeout_ms` on it.
    fn connect(
        &mut self,
        host: &str,
        port: u16,
        read_timeout_ms: u32,
    ) -> Result<Self::Connection, Self::Error>;
}
