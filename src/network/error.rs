//! Common error types for transport operations

/// Failure of the byte-stream transport underneath the broker session.
///
/// The session only needs to know that the stream is unusable; details go to
/// the log.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TransportError {
    /// The host name could not be resolved to an address.
    Resolve,
    /// The connection attempt was refused or could not be established.
    ConnectionRefused,
    /// An operation was attempted while no stream is open.
    NotOpen,
    /// An error occurred during a write operation.
    WriteError,
    /// An error occurred during a read operation.
    ReadError,
    /// The read timeout expired.
    Timeout,
    /// The peer closed the stream.
    ConnectionClosed,
}

#[cfg(feature = "defmt")]
impl defmt::Format for TransportError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            TransportError::Resolve => defmt::write!(f, "Resolve"),
            TransportError::ConnectionRefused => defmt::write!(f, "ConnectionRefused"),
            TransportError::NotOpen => defmt::write!(f, "NotOpen"),
            TransportError::WriteError => defmt::write!(f, "WriteError"),
            TransportError::ReadError => defmt::write!(f, "ReadError"),
            TransportError::Timeout => defmt::write!(f, "Timeout"),
            TransportError::ConnectionClosed => defmt::write!(f, "ConnectionClosed"),
        }
    }
}
