//! The broker as the node sees it: a real session, a simulation, or nothing.
//!
//! [`BrokerMode`] is parsed once from configuration and [`Broker::resolve`]
//! turns it into the variant the control loop drives. The two non-active
//! variants never touch the network and always report success, so a node can
//! run its full cycle on a bench without a broker.

use super::session::{Delivery, MAX_PAYLOAD_LEN, Session, SessionError};
use crate::config::ConfigError;
use crate::network::Connect;
use crate::telemetry::Reading;
use core::str::FromStr;
use log::{info, warn};

/// How readings leave the node.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum BrokerMode {
    /// Publish to the configured broker.
    #[default]
    Active,
    /// Log the payload instead of sending it.
    Dummy,
    /// Drop every reading.
    Inactive,
}

impl FromStr for BrokerMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "active" => Ok(BrokerMode::Active),
            "dummy" => Ok(BrokerMode::Dummy),
            "inactive" => Ok(BrokerMode::Inactive),
            _ => Err(ConfigError::UnknownBrokerMode),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for BrokerMode {
    fn format(&self, f: defmt::Formatter) {
        match self {
            BrokerMode::Active => defmt::write!(f, "Active"),
            BrokerMode::Dummy => defmt::write!(f, "Dummy"),
            BrokerMode::Inactive => defmt::write!(f, "Inactive"),
        }
    }
}

/// A [`BrokerMode`] resolved against a session.
pub enum Broker<N: Connect> {
    /// Every call goes to the session.
    Active(Session<N>),
    /// Payloads are logged, nothing is sent.
    Dummy,
    /// Publishing is skipped.
    Inactive,
}

impl<N: Connect> core::fmt::Debug for Broker<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Broker::Active(session) => f.debug_tuple("Active").field(session).finish(),
            Broker::Dummy => f.write_str("Dummy"),
            Broker::Inactive => f.write_str("Inactive"),
        }
    }
}

impl<N: Connect> From<Session<N>> for Broker<N> {
    fn from(session: Session<N>) -> Self {
        Broker::Active(session)
    }
}

impl<N: Connect> Broker<N> {
    /// Resolve `mode`; the session is dropped unless the mode is `Active`.
    pub fn resolve(mode: BrokerMode, session: Session<N>) -> Self {
        match mode {
            BrokerMode::Active => Broker::Active(session),
            BrokerMode::Dummy => {
                info!("mqtt: dummy mode, payloads are only logged");
                Broker::Dummy
            }
            BrokerMode::Inactive => {
                info!("mqtt: inactive, nothing will be published");
                Broker::Inactive
            }
        }
    }

    /// The mode this broker was resolved from.
    pub fn mode(&self) -> BrokerMode {
        match self {
            Broker::Active(_) => BrokerMode::Active,
            Broker::Dummy => BrokerMode::Dummy,
            Broker::Inactive => BrokerMode::Inactive,
        }
    }

    /// The underlying session in active mode.
    pub fn session(&self) -> Option<&Session<N>> {
        match self {
            Broker::Active(session) => Some(session),
            _ => None,
        }
    }

    /// Always `true` unless active and disconnected.
    pub fn is_connected(&self) -> bool {
        match self {
            Broker::Active(session) => session.is_connected(),
            Broker::Dummy | Broker::Inactive => true,
        }
    }

    /// See [`Session::connect`].
    pub fn connect(&mut self) -> Result<(), SessionError> {
        match self {
            Broker::Active(session) => session.connect(),
            Broker::Dummy => {
                info!("mqtt: [dummy] simulating broker connection");
                Ok(())
            }
            Broker::Inactive => Ok(()),
        }
    }

    /// See [`Session::publish`]. The non-active modes report
    /// [`Delivery::Sent`].
    pub fn publish(&mut self, reading: &Reading) -> Result<Delivery, SessionError> {
        match self {
            Broker::Active(session) => session.publish(reading),
            Broker::Dummy => {
                let mut buf = [0u8; MAX_PAYLOAD_LEN];
                let len = reading.write_json(&mut buf).map_err(|_| {
                    warn!("mqtt: [dummy] reading does not fit into {} bytes", MAX_PAYLOAD_LEN);
                    SessionError::Serialize
                })?;
                info!(
                    "mqtt: [dummy] publish {}",
                    core::str::from_utf8(&buf[..len]).unwrap_or("<binary>")
                );
                Ok(Delivery::Sent)
            }
            Broker::Inactive => {
                info!("mqtt: publish skipped, inactive");
                Ok(Delivery::Sent)
            }
        }
    }

    /// See [`Session::disconnect`].
    pub fn disconnect(&mut self) {
        if let Broker::Active(session) = self {
            session.disconnect();
        }
    }
}
