//! Broker session: one MQTT connection and its lifecycle.
//!
//! ```text
//!                 connect() + CONNACK ok
//!   Disconnected ───────────────────────▶ Connected ──┐ publish() ok
//!        ▲                                    │  ◀────┘
//!        └──── any transport/protocol error ──┘
//!        └──── disconnect() ──────────────────┘
//! ```
//!
//! The session never exposes a half-open connection: whenever an operation
//! fails the stream is closed and the state is `Disconnected`, so the next
//! attempt always starts from scratch.

use super::codec::{self, Packet, ProtocolError, QoS};
use super::{Endpoint, TOPIC_LEN};
use crate::network::error::TransportError;
use crate::network::{Close, Connect, Read, Write};
use crate::telemetry::Reading;
use heapless::String;
use log::{debug, error, info, warn};

/// Capacity of the serialized reading.
pub const MAX_PAYLOAD_LEN: usize = 512;

const DEFAULT_TOPIC: &str = "sensor/default";

/// Observable state of a [`Session`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SessionState {
    /// No broker connection.
    Disconnected,
    /// CONNACK accepted, publishes go straight to the socket.
    Connected,
}

/// How a successful [`Session::publish`] went.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Delivery {
    /// The frame was written.
    Sent,
    /// The write failed but the session was rebuilt. The reading was *not*
    /// resent.
    Recovered,
}

/// A session operation failed; the session is `Disconnected` afterwards.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SessionError {
    /// The stream could not be opened, written or read.
    Transport(TransportError),
    /// The broker's answer was not an accepting CONNACK, or a frame could not
    /// be built.
    Protocol(ProtocolError),
    /// The reading does not fit into the payload buffer.
    Serialize,
}

impl From<ProtocolError> for SessionError {
    fn from(e: ProtocolError) -> Self {
        SessionError::Protocol(e)
    }
}

impl From<TransportError> for SessionError {
    fn from(e: TransportError) -> Self {
        SessionError::Transport(e)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SessionError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            SessionError::Transport(e) => defmt::write!(f, "Transport({})", e),
            SessionError::Protocol(e) => defmt::write!(f, "Protocol({})", e),
            SessionError::Serialize => defmt::write!(f, "Serialize"),
        }
    }
}

/// Session tuning that is not part of the broker identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Topic readings are published on.
    pub topic: String<TOPIC_LEN>,
    /// Keep-alive announced in CONNECT.
    pub keep_alive_seconds: u16,
    /// Upper bound for the CONNACK read.
    pub connack_timeout_ms: u32,
    /// Retain flag for published readings.
    pub retain: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        let mut topic = String::new();
        let _ = topic.push_str(DEFAULT_TOPIC);

        Self {
            topic,
            keep_alive_seconds: 60,
            connack_timeout_ms: 3_000,
            retain: false,
        }
    }
}

/// Running totals, for diagnostics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    /// Successful CONNECT handshakes.
    pub connects: u32,
    /// Frames written by publish.
    pub published: u32,
    /// Sessions rebuilt after a failed publish.
    pub recoveries: u32,
}

/// An MQTT session publishing to one broker.
///
/// The session exclusively owns its stream; at most one connection is alive
/// and it is always closed before a new one is opened.
pub struct Session<N: Connect> {
    network: N,
    endpoint: Endpoint,
    options: SessionOptions,
    connection: Option<N::Connection>,
    stats: SessionStats,
}

impl<N: Connect> core::fmt::Debug for Session<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint)
            .field("options", &self.options)
            .field("state", &self.state())
            .field("stats", &self.stats)
            .finish()
    }
}

impl<N: Connect> Session<N> {
    /// A disconnected session for `endpoint`.
    pub fn new(network: N, endpoint: Endpoint, options: SessionOptions) -> Self {
        Self {
            network,
            endpoint,
            options,
            connection: None,
            stats: SessionStats::default(),
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        if self.connection.is_some() {
            SessionState::Connected
        } else {
            SessionState::Disconnected
        }
    }

    /// Whether a CONNACK-accepted connection is open.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// The broker this session talks to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Running totals.
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Open a fresh connection and perform the CONNECT/CONNACK handshake.
    ///
    /// A live connection is torn down first. On any failure the new stream is
    /// closed again and the session stays `Disconnected`.
    pub fn connect(&mut self) -> Result<(), SessionError> {
        if self.connection.is_some() {
            self.disconnect();
        }

        let endpoint = &self.endpoint;
        let frame: Packet = codec::encode_connect(
            &endpoint.client_id,
            self.options.keep_alive_seconds,
            endpoint.username.as_deref(),
            endpoint.password.as_deref(),
        )?;

        let mut connection = self
            .network
            .connect(&endpoint.host, endpoint.port, self.options.connack_timeout_ms)
            .map_err(|e| {
                warn!(
                    "mqtt: cannot open {}:{}: {:?}",
                    endpoint.host, endpoint.port, e
                );
                SessionError::Transport(e.into())
            })?;

        match handshake(&mut connection, &frame) {
            Ok(()) => {
                info!(
                    "mqtt: connected to {}:{} as '{}'",
                    endpoint.host, endpoint.port, endpoint.client_id
                );
                self.connection = Some(connection);
                self.stats.connects += 1;
                Ok(())
            }
            Err(e) => {
                warn!("mqtt: handshake with {} failed: {:?}", endpoint.host, e);
                let _ = connection.close();
                Err(e)
            }
        }
    }

    /// Serialize `reading` and publish it on the configured topic.
    ///
    /// A disconnected session reconnects once first. When the write fails the
    /// session is rebuilt once and [`Delivery::Recovered`] is returned without
    /// resending; if the rebuild fails too the error is returned.
    pub fn publish(&mut self, reading: &Reading) -> Result<Delivery, SessionError> {
        if !self.is_connected() {
            warn!("mqtt: not connected, reconnecting before publish");
            self.connect()?;
            info!("mqtt: reconnected");
        }

        let mut buf = [0u8; MAX_PAYLOAD_LEN];
        let len = reading.write_json(&mut buf).map_err(|_| {
            error!("mqtt: reading does not fit into {} bytes", MAX_PAYLOAD_LEN);
            SessionError::Serialize
        })?;

        let topic = self.options.topic.clone();
        match self.publish_raw(&topic, &buf[..len], self.options.retain) {
            Ok(()) => {
                debug!(
                    "mqtt: sent {}",
                    core::str::from_utf8(&buf[..len]).unwrap_or("<binary>")
                );
                Ok(Delivery::Sent)
            }
            Err(SessionError::Transport(e)) => {
                warn!("mqtt: publish failed ({:?}), rebuilding session", e);
                match self.connect() {
                    Ok(()) => {
                        self.stats.recoveries += 1;
                        info!("mqtt: session rebuilt, reading dropped");
                        Ok(Delivery::Recovered)
                    }
                    Err(e) => {
                        error!("mqtt: rebuild failed: {:?}", e);
                        Err(e)
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Frame `payload` as a QoS 0 PUBLISH on `topic` and write it.
    ///
    /// Fails with [`TransportError::NotOpen`] when disconnected. Any failure
    /// closes the connection.
    pub fn publish_raw(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), SessionError> {
        let Some(connection) = self.connection.as_mut() else {
            return Err(TransportError::NotOpen.into());
        };

        let result = codec::encode_publish::<{ codec::MAX_PACKET_LEN }>(
            topic,
            payload,
            QoS::AtMostOnce,
            retain,
        )
        .map_err(SessionError::from)
        .and_then(|frame| send(connection, &frame).map_err(SessionError::from));

        match result {
            Ok(()) => {
                self.stats.published += 1;
                Ok(())
            }
            Err(e) => {
                if let Some(connection) = self.connection.take() {
                    let _ = connection.close();
                }
                Err(e)
            }
        }
    }

    /// Send DISCONNECT (best effort) and close the stream.
    ///
    /// The session is `Disconnected` afterwards whatever happens on the wire.
    pub fn disconnect(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            let _ = send(&mut connection, &codec::encode_disconnect());
            let _ = connection.close();
            info!("mqtt: disconnected from {}", self.endpoint.host);
        }
    }
}

impl<N: Connect> Drop for Session<N> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn handshake<C: Read + Write>(connection: &mut C, frame: &[u8]) -> Result<(), SessionError> {
    send(connection, frame)?;

    let mut connack = [0u8; codec::CONNACK_LEN];
    let received = receive(connection, &mut connack)?;
    codec::decode_connack(&connack[..received])?;
    Ok(())
}

/// Write the whole frame, looping over partial writes.
fn send<C: Write>(connection: &mut C, frame: &[u8]) -> Result<(), TransportError> {
    let mut written = 0;
    while written < frame.len() {
        match connection.write(&frame[written..]) {
            Ok(0) => return Err(TransportError::ConnectionClosed),
            Ok(n) => written += n,
            Err(_) => return Err(TransportError::WriteError),
        }
    }
    connection.flush().map_err(|_| TransportError::WriteError)
}

/// Fill `buf` until it is full or the peer closes; returns the byte count.
fn receive<C: Read>(connection: &mut C, buf: &mut [u8]) -> Result<usize, TransportError> {
    let mut total_read = 0;
    while total_read < buf.len() {
        match connection.read(&mut buf[total_read..]) {
            Ok(0) => break,
            Ok(n) => total_read += n,
            Err(e) => {
                debug!("mqtt: read failed after {} bytes: {:?}", total_read, e);
                return Err(TransportError::ReadError);
            }
        }
    }
    Ok(total_read)
}
