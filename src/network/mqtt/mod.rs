//! Minimal MQTT 3.1.1 client.
//!
//! The node only ever publishes, so the client is split in two layers:
//!
//! - [`codec`] builds CONNECT, PUBLISH and DISCONNECT frames and validates the
//!   CONNACK answer, without any I/O;
//! - [`session`] owns one broker connection opened through
//!   [`Connect`](crate::network::Connect) and tracks whether it is usable;
//! - [`broker`] puts the configured [`BrokerMode`] in front of the session.
//!
//! ```rust,no_run
//! use sensornode::network::mqtt::{Endpoint, Session, SessionOptions};
//! # use sensornode::network::{Close, Connect, Connection, Read, Write};
//! # struct Socket;
//! # impl Connection for Socket {}
//! # impl Read for Socket {
//! #     type Error = ();
//! #     fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> { Ok(0) }
//! # }
//! # impl Write for Socket {
//! #     type Error = ();
//! #     fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> { Ok(buf.len()) }
//! #     fn flush(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # impl Close for Socket {
//! #     type Error = ();
//! #     fn close(self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # struct Net;
//! # impl Connect for Net {
//! #     type Connection = Socket;
//! #     type Error = sensornode::network::error::TransportError;
//! #     fn connect(&mut self, _: &str, _: u16, _: u32) -> Result<Socket, Self::Error> { Ok(Socket) }
//! # }
//!
//! let endpoint = Endpoint::new("192.168.1.100", 1883, "sensor1").unwrap();
//! let mut session = Session::new(Net, endpoint, SessionOptions::default());
//! // session.connect()?;
//! // session.publish(&reading)?;
//! ```

use heapless::String;

/// Frame encoders and the CONNACK check.
pub mod codec;

/// Broker connection lifecycle.
pub mod session;

/// Active, dummy or inactive publishing.
pub mod broker;

pub use broker::{Broker, BrokerMode};
pub use codec::{ConnectReturnCode, ProtocolError, QoS};
pub use session::{Delivery, Session, SessionError, SessionOptions, SessionState, SessionStats};

/// Capacity of the broker host name.
pub const HOST_LEN: usize = 64;
/// Capacity of the client identifier.
pub const CLIENT_ID_LEN: usize = 32;
/// Capacity of the username.
pub const USERNAME_LEN: usize = 32;
/// Capacity of the password.
pub const PASSWORD_LEN: usize = 64;
/// Capacity of the publish topic.
pub const TOPIC_LEN: usize = 64;

/// Where and as whom the node connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Broker host name or dotted address.
    pub host: String<HOST_LEN>,
    /// Broker TCP port.
    pub port: u16,
    /// Client identifier, never empty.
    pub client_id: String<CLIENT_ID_LEN>,
    /// Optional username; only sent together with a password.
    pub username: Option<String<USERNAME_LEN>>,
    /// Optional password; only sent together with a username.
    pub password: Option<String<PASSWORD_LEN>>,
}

impl Endpoint {
    /// An anonymous endpoint.
    ///
    /// Returns `None` when the client id is empty or a value does not fit.
    pub fn new(host: &str, port: u16, client_id: &str) -> Option<Self> {
        if client_id.is_empty() {
            return None;
        }
        Some(Self {
            host: String::try_from(host).ok()?,
            port,
            client_id: String::try_from(client_id).ok()?,
            username: None,
            password: None,
        })
    }

    /// The same endpoint authenticating with `username` and `password`.
    pub fn with_credentials(mut self, username: &str, password: &str) -> Option<Self> {
        self.username = Some(String::try_from(username).ok()?);
        self.password = Some(String::try_from(password).ok()?);
        Some(self)
    }
}
