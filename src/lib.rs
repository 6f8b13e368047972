//! # sensornode - environmental sensor node core
//!
//! Everything a small WiFi sensor node needs between its hardware drivers and
//! the MQTT broker: it joins one of two WiFi networks, reads a climate sensor
//! (temperature, pressure, humidity) and an ambient light sensor, and
//! publishes one JSON reading per cycle to a fixed topic. The crate is
//! `no_std` and allocation free; the board supplies the radio, sockets, sensor
//! drivers, clock and LED through small traits.
//!
//! ## Modules
//!
//! - [`network`]: transport traits, the WiFi [`link`](network::link) manager
//!   and a minimal MQTT 3.1.1 [`codec`](network::mqtt::codec),
//!   [`session`](network::mqtt::session) and active, dummy or inactive
//!   [`broker`](network::mqtt::broker)
//! - [`telemetry`]: sensor lifecycle, dummy and inactive modes, and the
//!   ordered [`Reading`](telemetry::Reading)
//! - [`node`]: the control loop with its retry, fallback and reset policy
//! - [`system`]: delays, uptime, reset and the status LED
//! - [`config`]: typed configuration with firmware defaults
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! sensornode = "0.1.0"
//! ```
//!
//! ### Publishing a reading
//!
//! ```rust,no_run
//! use sensornode::network::mqtt::{Endpoint, Session, SessionOptions};
//! use sensornode::telemetry::{FieldList, Reading, Value};
//! # use sensornode::network::{Close, Connect, Connection, Read, Write};
//! # struct Socket;
//! # impl Connection for Socket {}
//! # impl Read for Socket {
//! #     type Error = ();
//! #     fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
//! #         buf[..4].copy_from_slice(&[0x20, 0x02, 0x00, 0x00]);
//! #         Ok(4)
//! #     }
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
//!
//! let mut fields = FieldList::new();
//! fields.push("temp".try_into().unwrap()).unwrap();
//! let reading = Reading::from_fields(&fields, |_| Some(Value::number(21.5)));
//!
//! session.connect().unwrap();
//! session.publish(&reading).unwrap();
//! ```
//!
//! ## Optional Features
//!
//! - `std`: `std::net` transport and environment based configuration
//! - `defmt`: `defmt::Format` for the error types

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

/// Configuration with firmware defaults and key based overrides.
pub mod config;

/// Transport traits, WiFi link management and the MQTT client.
pub mod network;

/// The per-cycle control loop.
pub mod node;

/// Board services: delays, uptime, reset and the status LED.
pub mod system;

/// Sensor lifecycle and readings.
pub mod telemetry;
