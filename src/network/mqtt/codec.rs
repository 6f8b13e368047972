//! MQTT 3.1.1 wire codec.
//!
//! Pure functions turning connect/publish requests into frames and checking
//! the broker's CONNACK. Nothing here touches a socket, so every function can
//! be exercised byte-for-byte in tests.
//!
//! Only the subset the sensor node needs is covered:
//!
//! | Packet     | Direction | Notes                                        |
//! |------------|-----------|----------------------------------------------|
//! | CONNECT    | out       | clean session, optional username + password  |
//! | CONNACK    | in        | fixed 4 bytes, session-present flag ignored  |
//! | PUBLISH    | out       | QoS 0 only, no packet identifier             |
//! | DISCONNECT | out       | `E0 00`                                      |
//!
//! Frames are built into fixed-capacity [`heapless::Vec`]s. Encoders are
//! generic over that capacity; running out of room is reported as
//! [`ProtocolError::PacketTooLarge`].

use heapless::Vec;

// MQTT Control Packet types - these are the fixed header packet type values
/// MQTT CONNECT packet type identifier.
pub const CONNECT: u8 = 0x10;
/// MQTT CONNACK packet type identifier.
pub const CONNACK: u8 = 0x20;
/// MQTT PUBLISH packet type identifier.
pub const PUBLISH: u8 = 0x30;
/// MQTT DISCONNECT packet type identifier.
pub const DISCONNECT: u8 = 0xE0;

/// MQTT 3.1.1 protocol name.
const PROTOCOL_NAME: &[u8] = b"MQTT";
/// MQTT protocol level for version 3.1.1.
const PROTOCOL_LEVEL: u8 = 4;

const CLEAN_SESSION: u8 = 0x02;
const PASSWORD_FLAG: u8 = 0x40;
const USERNAME_FLAG: u8 = 0x80;
const RETAIN_FLAG: u8 = 0x01;

/// Size of a CONNACK frame including its fixed header.
pub const CONNACK_LEN: usize = 4;

/// Largest value the four-byte remaining-length field can carry.
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Most bytes a remaining-length field may occupy.
pub const MAX_REMAINING_LENGTH_BYTES: usize = 4;

/// Capacity of the frames the broker session builds.
pub const MAX_PACKET_LEN: usize = 1024;

/// An outbound frame as built by the broker session.
pub type Packet = Vec<u8, MAX_PACKET_LEN>;

/// Quality of Service levels for outbound messages.
///
/// Only QoS 0 is supported.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum QoS {
    /// At most once delivery.
    AtMostOnce = 0,
}

/// Non-zero CONNACK return codes.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ConnectReturnCode {
    /// 0x01 - the broker does not support protocol level 4.
    UnacceptableProtocolVersion,
    /// 0x02 - the client identifier is not allowed.
    IdentifierRejected,
    /// 0x03 - the MQTT service is unavailable.
    ServerUnavailable,
    /// 0x04 - the username or password is malformed or wrong.
    BadUserNameOrPassword,
    /// 0x05 - the client is not authorized to connect.
    NotAuthorized,
    /// Any code outside the range defined by MQTT 3.1.1.
    Reserved(u8),
}

impl From<u8> for ConnectReturnCode {
    fn from(code: u8) -> Self {
        match code {
            1 => ConnectReturnCode::UnacceptableProtocolVersion,
            2 => ConnectReturnCode::IdentifierRejected,
            3 => ConnectReturnCode::ServerUnavailable,
            4 => ConnectReturnCode::BadUserNameOrPassword,
            5 => ConnectReturnCode::NotAuthorized,
            other => ConnectReturnCode::Reserved(other),
        }
    }
}

/// A frame could not be built, or the broker answered with something other
/// than an accepting CONNACK.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ProtocolError {
    /// CONNECT requires a non-empty client identifier.
    EmptyClientId,
    /// The frame does not fit into the output buffer.
    PacketTooLarge,
    /// A remaining-length value is out of range or its encoding is truncated
    /// or longer than four bytes.
    RemainingLength,
    /// Fewer than four CONNACK bytes arrived.
    ShortConnack,
    /// The first byte is not a CONNACK fixed header.
    UnexpectedPacket(u8),
    /// The CONNACK length field is not 2, or extra bytes followed.
    MalformedConnack,
    /// The broker refused the connection.
    Refused(ConnectReturnCode),
}

#[cfg(feature = "defmt")]
impl defmt::Format for ProtocolError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ProtocolError::EmptyClientId => defmt::write!(f, "EmptyClientId"),
            ProtocolError::PacketTooLarge => defmt::write!(f, "PacketTooLarge"),
            ProtocolError::RemainingLength => defmt::write!(f, "RemainingLength"),
            ProtocolError::ShortConnack => defmt::write!(f, "ShortConnack"),
            ProtocolError::UnexpectedPacket(b) => defmt::write!(f, "UnexpectedPacket({=u8})", b),
            ProtocolError::MalformedConnack => defmt::write!(f, "MalformedConnack"),
            ProtocolError::Refused(code) => match code {
                ConnectReturnCode::Reserved(c) => defmt::write!(f, "Refused({=u8})", c),
                _ => defmt::write!(f, "Refused"),
            },
        }
    }
}

/// Append the remaining-length field for a body of `len` bytes.
///
/// Each byte carries seven bits of the value, least significant group first;
/// the top bit is set while more bytes follow.
pub fn encode_remaining_length<const N: usize>(
    buf: &mut Vec<u8, N>,
    mut len: usize,
) -> Result<(), ProtocolError> {
    if len > MAX_REMAINING_LENGTH {
        return Err(ProtocolError::RemainingLength);
    }
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        buf.push(byte).map_err(|_| ProtocolError::PacketTooLarge)?;
        if len == 0 {
            return Ok(());
        }
    }
}

/// Decode a remaining-length field at the start of `bytes`.
///
/// Returns the value and the number of bytes the field occupied.
pub fn decode_remaining_length(bytes: &[u8]) -> Result<(usize, usize), ProtocolError> {
    let mut value = 0usize;
    let mut multiplier = 1usize;
    for (i, &byte) in bytes.iter().take(MAX_REMAINING_LENGTH_BYTES).enumerate() {
        value += (byte & 0x7F) as usize * multiplier;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        multiplier *= 128;
    }
    Err(ProtocolError::RemainingLength)
}

/// Build a CONNECT frame requesting a clean session.
///
/// The username and password flags are only raised when both credentials are
/// given; a lone username or password is left out of the frame.
pub fn encode_connect<const N: usize>(
    client_id: &str,
    keep_alive_seconds: u16,
    username: Option<&str>,
    password: Option<&str>,
) -> Result<Vec<u8, N>, ProtocolError> {
    if client_id.is_empty() {
        return Err(ProtocolError::EmptyClientId);
    }

    let credentials = match (username, password) {
        (Some(user), Some(pass)) => Some((user, pass)),
        _ => None,
    };

    let mut flags = CLEAN_SESSION;
    // protocol name, level, flags, keep-alive, then the client id
    let mut remaining = 2 + PROTOCOL_NAME.len() + 1 + 1 + 2 + 2 + client_id.len();
    if let Some((user, pass)) = credentials {
        flags |= USERNAME_FLAG | PASSWORD_FLAG;
        remaining += 2 + user.len() + 2 + pass.len();
    }

    // --- Fixed Header ---
    let mut packet = Vec::new();
    put(&mut packet, &[CONNECT])?;
    encode_remaining_length(&mut packet, remaining)?;

    // --- Variable Header ---
    put_prefixed(&mut packet, PROTOCOL_NAME)?;
    put(&mut packet, &[PROTOCOL_LEVEL, flags])?;
    put(&mut packet, &keep_alive_seconds.to_be_bytes())?;

    // --- Payload ---
    put_prefixed(&mut packet, client_id.as_bytes())?;
    if let Some((user, pass)) = credentials {
        put_prefixed(&mut packet, user.as_bytes())?;
        put_prefixed(&mut packet, pass.as_bytes())?;
    }

    Ok(packet)
}

/// Check a CONNACK frame.
///
/// Accepts exactly `20 02 xx 00`; the session-present byte is not inspected.
pub fn decode_connack(bytes: &[u8]) -> Result<(), ProtocolError> {
    if bytes.len() < CONNACK_LEN {
        return Err(ProtocolError::ShortConnack);
    }
    if bytes.len() > CONNACK_LEN {
        return Err(ProtocolError::MalformedConnack);
    }
    if bytes[0] != CONNACK {
        return Err(ProtocolError::UnexpectedPacket(bytes[0]));
    }
    if bytes[1] != 0x02 {
        return Err(ProtocolError::MalformedConnack);
    }
    match bytes[3] {
        0 => Ok(()),
        code => Err(ProtocolError::Refused(code.into())),
    }
}

/// Build a PUBLISH frame.
pub fn encode_publish<const N: usize>(
    topic: &str,
    payload: &[u8],
    qos: QoS,
    retain: bool,
) -> Result<Vec<u8, N>, ProtocolError> {
    let mut header = PUBLISH | ((qos as u8) << 1);
    if retain {
        header |= RETAIN_FLAG;
    }

    let mut packet = Vec::new();
    put(&mut packet, &[header])?;
    encode_remaining_length(&mut packet, 2 + topic.len() + payload.len())?;
    put_prefixed(&mut packet, topic.as_bytes())?;
    put(&mut packet, payload)?;

    Ok(packet)
}

/// The two-byte DISCONNECT frame.
pub const fn encode_disconnect() -> [u8; 2] {
    [DISCONNECT, 0x00]
}

fn put<const N: usize>(packet: &mut Vec<u8, N>, bytes: &[u8]) -> Result<(), ProtocolError> {
    packet
        .extend_from_slice(bytes)
        .map_err(|_| ProtocolError::PacketTooLarge)
}

fn put_prefixed<const N: usize>(
    packet: &mut Vec<u8, N>,
    bytes: &[u8],
) -> Result<(), ProtocolError> {
    put(packet, &(bytes.len() as u16).to_be_bytes())?;
    put(packet, bytes)
}
