//! Host transport over `std::net::TcpStream`.

use super::error::TransportError;
use super::{Close, Connect, Connection, Read, Write};
use std::io::{ErrorKind, Read as StdRead, Write as StdWrite};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// A TCP stream usable as a broker connection.
#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
}

impl Read for TcpConnection {
    type Error = TransportError;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.stream.read(buf).map_err(|e| match e.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => TransportError::Timeout,
            _ => TransportError::ReadError,
        })
    }
}

impl Write for TcpConnection {
    type Error = TransportError;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.stream
            .write(buf)
            .map_err(|_| TransportError::WriteError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.stream.flush().map_err(|_| TransportError::WriteError)
    }
}

impl Close for TcpConnection {
    type Error = TransportError;

    fn close(self) -> Result<(), Self::Error> {
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            // Already torn down by the peer.
            Err(e) if e.kind() == ErrorKind::NotConnected => Ok(()),
            Err(_) => Err(TransportError::ConnectionClosed),
        }
    }
}

impl Connection for TcpConnection {}

/// Opens [`TcpConnection`]s through the host resolver.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpNetwork;

impl Connect for TcpNetwork {
    type Connection = TcpConnection;
    type Error = TransportError;

    fn connect(
        &mut self,
        host: &str,
        port: u16,
        read_timeout_ms: u32,
    ) -> Result<Self::Connection, Self::Error> {
        let timeout = Duration::from_millis(u64::from(read_timeout_ms.max(1)));
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|_| TransportError::Resolve)?
            .next()
            .ok_or(TransportError::Resolve)?;

        let stream = TcpStream::connect_timeout(&addr, timeout)
            .map_err(|_| TransportError::ConnectionRefused)?;
        stream
            .set_read_timeout(Some(timeout))
            .map_err(|_| TransportError::NotOpen)?;
        // Frames are tiny; send them as soon as they are written.
        stream
            .set_nodelay(true)
            .map_err(|_| TransportError::NotOpen)?;

        Ok(TcpConnection { stream })
    }
}
