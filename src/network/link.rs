//! WiFi association across a primary and a fallback network.
//!
//! [`LinkManager`] owns the radio and both [`Profile`]s. It knows how to join
//! one profile and whether the link is up; *when* to try which profile is the
//! orchestrator's policy (see [`crate::node`]).

use core::net::Ipv4Addr;
use heapless::String;
use log::{info, warn};

use crate::system::Delay;

/// Capacity of an SSID.
pub const SSID_LEN: usize = 32;
/// Capacity of a WPA passphrase.
pub const PASSPHRASE_LEN: usize = 64;

/// Fixed interface configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticIp {
    /// Interface address.
    pub ip: Ipv4Addr,
    /// Subnet mask.
    pub netmask: Ipv4Addr,
    /// Default gateway.
    pub gateway: Ipv4Addr,
    /// Name server.
    pub dns: Ipv4Addr,
}

/// How the interface gets its address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// Ask the network (DHCP).
    Dhcp,
    /// Use a fixed configuration.
    Static(StaticIp),
}

/// Credentials and addressing for one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Network name.
    pub ssid: String<SSID_LEN>,
    /// Passphrase.
    pub password: String<PASSPHRASE_LEN>,
    /// Address configuration.
    pub addressing: Addressing,
}

impl Profile {
    /// A DHCP profile; `None` when a value does not fit.
    pub fn new(ssid: &str, password: &str) -> Option<Self> {
        Some(Self {
            ssid: String::try_from(ssid).ok()?,
            password: String::try_from(password).ok()?,
            addressing: Addressing::Dhcp,
        })
    }

    /// The same profile with a fixed address.
    pub fn with_static(mut self, config: StaticIp) -> Self {
        self.addressing = Addressing::Static(config);
        self
    }
}

/// Which of the two profiles to join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileSlot {
    /// The preferred network.
    Primary,
    /// The network used while the primary is unreachable.
    Fallback,
}

/// Association state as seen by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Not associated.
    Disconnected,
    /// Associated with the primary profile.
    ConnectedPrimary,
    /// Associated with the fallback profile.
    ConnectedFallback,
}

/// Joining a network failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// The radio rejected a command.
    Radio,
    /// The radio never reported an association within the poll budget.
    Exhausted,
}

#[cfg(feature = "defmt")]
impl defmt::Format for LinkError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            LinkError::Radio => defmt::write!(f, "Radio"),
            LinkError::Exhausted => defmt::write!(f, "Exhausted"),
        }
    }
}

/// The station-mode WiFi interface.
pub trait Radio {
    /// Associated error type
    type Error: core::fmt::Debug;

    /// Whether the interface is powered up.
    fn is_active(&self) -> bool;

    /// Power up the interface.
    fn activate(&mut self) -> Result<(), Self::Error>;

    /// Apply static addressing, or switch to DHCP.
    fn configure(&mut self, addressing: &Addressing) -> Result<(), Self::Error>;

    /// Start associating; completion is observed through
    /// [`is_associated`](Radio::is_associated).
    fn associate(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error>;

    /// Whether the station is associated and has an address.
    fn is_associated(&self) -> bool;

    /// The interface address.
    fn ip(&self) -> Option<Ipv4Addr>;
}

/// Association polling budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTiming {
    /// How many times association is polled after the request.
    pub max_retries: u8,
    /// Delay between polls.
    pub retry_delay_ms: u32,
}

impl Default for LinkTiming {
    fn default() -> Self {
        Self {
            max_retries: 10,
            retry_delay_ms: 500,
        }
    }
}

/// Owner of the radio and of the two network profiles.
#[derive(Debug)]
pub struct LinkManager<R: Radio> {
    radio: R,
    primary: Profile,
    fallback: Profile,
    timing: LinkTiming,
    using_fallback: bool,
    state: LinkState,
    last_primary_check: u64,
}

impl<R: Radio> LinkManager<R> {
    /// A manager that has not joined anything yet.
    pub fn new(radio: R, primary: Profile, fallback: Profile, timing: LinkTiming) -> Self {
        Self {
            radio,
            primary,
            fallback,
            timing,
            using_fallback: false,
            state: LinkState::Disconnected,
            last_primary_check: 0,
        }
    }

    /// Join the profile in `slot`.
    ///
    /// Activates the radio if needed, applies the profile's addressing, asks
    /// for association and then polls up to `max_retries` times,
    /// `retry_delay_ms` apart.
    pub fn connect<D: Delay>(&mut self, slot: ProfileSlot, delay: &mut D) -> Result<(), LinkError> {
        self.using_fallback = slot == ProfileSlot::Fallback;
        self.state = LinkState::Disconnected;
        let profile = match slot {
            ProfileSlot::Primary => &self.primary,
            ProfileSlot::Fallback => &self.fallback,
        };

        if !self.radio.is_active() {
            self.radio.activate().map_err(|e| {
                warn!("wifi: cannot activate radio: {:?}", e);
                LinkError::Radio
            })?;
        }

        match profile.addressing {
            Addressing::Static(cfg) => info!("wifi: {:?} uses static address {}", slot, cfg.ip),
            Addressing::Dhcp => info!("wifi: {:?} uses DHCP", slot),
        }
        self.radio.configure(&profile.addressing).map_err(|e| {
            warn!("wifi: cannot apply addressing: {:?}", e);
            LinkError::Radio
        })?;

        info!("wifi: joining '{}'", profile.ssid.as_str());
        self.radio
            .associate(&profile.ssid, &profile.password)
            .map_err(|e| {
                warn!("wifi: association request rejected: {:?}", e);
                LinkError::Radio
            })?;

        let mut retries = 0;
        while !self.radio.is_associated() && retries < self.timing.max_retries {
            delay.delay_ms(self.timing.retry_delay_ms);
            retries += 1;
        }

        if !self.radio.is_associated() {
            warn!(
                "wifi: '{}' not associated after {} polls",
                profile.ssid.as_str(),
                retries
            );
            return Err(LinkError::Exhausted);
        }

        self.state = match slot {
            ProfileSlot::Primary => LinkState::ConnectedPrimary,
            ProfileSlot::Fallback => LinkState::ConnectedFallback,
        };
        match self.radio.ip() {
            Some(ip) => info!("wifi: connected to '{}', ip {}", profile.ssid.as_str(), ip),
            None => info!("wifi: connected to '{}'", profile.ssid.as_str()),
        }
        Ok(())
    }

    /// Association polling budget.
    pub fn timing(&self) -> LinkTiming {
        self.timing
    }

    /// Whether the radio currently reports an association.
    pub fn is_connected(&self) -> bool {
        self.radio.is_associated()
    }

    /// The interface address while connected.
    pub fn get_ip(&self) -> Option<Ipv4Addr> {
        if self.is_connected() {
            self.radio.ip()
        } else {
            None
        }
    }

    /// Current association state.
    pub fn state(&self) -> LinkState {
        if self.is_connected() {
            self.state
        } else {
            LinkState::Disconnected
        }
    }

    /// Whether the last join targeted the fallback profile.
    pub fn using_fallback(&self) -> bool {
        self.using_fallback
    }

    /// Whether the node sits on the fallback network and the primary has not
    /// been re-checked for `interval_secs`.
    pub fn primary_check_due(&self, now_secs: u64, interval_secs: u64) -> bool {
        self.using_fallback && now_secs.saturating_sub(self.last_primary_check) >= interval_secs
    }

    /// Restart the primary re-check timer.
    pub fn mark_primary_checked(&mut self, now_secs: u64) {
        self.last_primary_check = now_secs;
    }
}
