//! Node configuration.
//!
//! [`Config::default`] carries the values a freshly flashed node runs with.
//! Deployments override them by key, either from any lookup function
//! ([`Config::from_lookup`], usable without `std`) or from the process
//! environment and a `.env` file ([`Config::from_env`], `std` only).
//!
//! | key | meaning | default |
//! |-----|---------|---------|
//! | `SSID`, `PASSWORD` | primary network | `Your_Primary_SSID` |
//! | `STATIC_IP`, `NETMASK`, `GATEWAY`, `DNS` | primary addressing, empty IP = DHCP | DHCP |
//! | `SSID_FB`, `PASSWORD_FB` | fallback network | `Your_Secondary_SSID` |
//! | `STATIC_IP_FB`, `NETMASK_FB`, `GATEWAY_FB`, `DNS_FB` | fallback addressing | DHCP |
//! | `MAX_WIFI_RETRIES` | association polls per attempt | 10 |
//! | `WIFI_RETRY_DELAY_MS` | delay between polls | 500 |
//! | `WIFI_PRIMARY_CHECK` | seconds between primary re-checks | 10 |
//! | `MQTT_BROKER`, `MQTT_PORT` | broker | `192.168.1.100:1883` |
//! | `MQTT_CLIENT_ID` | client identifier | `sensor_default` |
//! | `MQTT_USER`, `MQTT_PASSWORD` | credentials, both or none | none |
//! | `MQTT_TOPIC` | publish topic | `sensor/default` |
//! | `MQTT_MODE` | `active`, `dummy` or `inactive` | `active` |
//! | `MQTT_FIELDS` | comma separated publish fields | `date,time,temp,pressure,humidity,lux` |
//! | `MQTT_KEEPALIVE`, `MQTT_CONNACK_TIMEOUT_MS` | session tuning | 60, 3000 |
//! | `UPDATE_INTERVAL` | seconds between cycles | 10 |
//! | `BROKER_RETRY_DELAY_MS`, `SENSOR_RETRY_DELAY_MS` | back-off after a failed cycle | 5000 |
//! | `LINK_RETRY_BACKOFF_MS` | back-off when no network is reachable | 10000 |
//! | `MAX_PUBLISH_FAILURES` | consecutive failures before reset | 5 |
//! | `VEML_SDA`, `VEML_SCL`, `VEML_PWR`, `VEML_MODE` | light sensor | 0, 1, 15, `active` |
//! | `BME_SDA`, `BME_SCL`, `BME_PWR`, `BME_MODE` | climate sensor | 2, 3, 14, `active` |
//! | `STATUS_LED` | status LED pin | 16 |
//! | `NTP_SERVER`, `UTC_OFFSET` | clock sync | `pool.ntp.org`, 3600 |

use core::net::Ipv4Addr;
use core::str::FromStr;
use heapless::String;
use log::warn;

use crate::network::link::{Addressing, LinkTiming, PASSPHRASE_LEN, Profile, SSID_LEN, StaticIp};
use crate::network::mqtt::{
    BrokerMode, CLIENT_ID_LEN, Endpoint, HOST_LEN, PASSWORD_LEN, SessionOptions, TOPIC_LEN,
    USERNAME_LEN,
};
use crate::telemetry::{FieldList, KNOWN_FIELDS, SensorMode};

/// Highest usable GPIO number.
pub const MAX_PIN: u8 = 28;

/// Capacity of the NTP server name.
pub const NTP_SERVER_LEN: usize = 64;

const DEFAULT_FIELDS: &str = "date,time,temp,pressure,humidity,lux";

/// A configuration value was rejected.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ConfigError {
    /// A pin number above [`MAX_PIN`].
    InvalidPin,
    /// Two roles of one sensor share a pin.
    PinConflict,
    /// The publish field list is empty.
    EmptyFieldList,
    /// The publish field list has more entries than a reading holds.
    TooManyFields,
    /// A publish field is listed twice.
    DuplicateField,
    /// The MQTT client id is empty.
    EmptyClientId,
    /// Not a dotted IPv4 address.
    InvalidAddress,
    /// Sensor mode other than `active`, `dummy` or `inactive`.
    UnknownSensorMode,
    /// `MQTT_MODE` other than `active`, `dummy` or `inactive`.
    UnknownBrokerMode,
    /// Not a number, or out of range for the setting.
    InvalidNumber,
    /// The value does not fit its buffer.
    TooLong,
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConfigError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ConfigError::InvalidPin => defmt::write!(f, "InvalidPin"),
            ConfigError::PinConflict => defmt::write!(f, "PinConflict"),
            ConfigError::EmptyFieldList => defmt::write!(f, "EmptyFieldList"),
            ConfigError::TooManyFields => defmt::write!(f, "TooManyFields"),
            ConfigError::DuplicateField => defmt::write!(f, "DuplicateField"),
            ConfigError::EmptyClientId => defmt::write!(f, "EmptyClientId"),
            ConfigError::InvalidAddress => defmt::write!(f, "InvalidAddress"),
            ConfigError::UnknownSensorMode => defmt::write!(f, "UnknownSensorMode"),
            ConfigError::UnknownBrokerMode => defmt::write!(f, "UnknownBrokerMode"),
            ConfigError::InvalidNumber => defmt::write!(f, "InvalidNumber"),
            ConfigError::TooLong => defmt::write!(f, "TooLong"),
        }
    }
}

/// One WiFi network as configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Network name.
    pub ssid: String<SSID_LEN>,
    /// Passphrase.
    pub password: String<PASSPHRASE_LEN>,
    /// Fixed address; `None` selects DHCP.
    pub static_ip: Option<Ipv4Addr>,
    /// Subnet mask for the fixed address.
    pub netmask: Ipv4Addr,
    /// Gateway for the fixed address.
    pub gateway: Ipv4Addr,
    /// Name server for the fixed address.
    pub dns: Ipv4Addr,
}

impl NetworkConfig {
    fn new(ssid: &str, password: &str, gateway: Ipv4Addr, dns: Ipv4Addr) -> Self {
        Self {
            ssid: fixed(ssid),
            password: fixed(password),
            static_ip: None,
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            gateway,
            dns,
        }
    }

    /// The link profile for this network.
    pub fn profile(&self) -> Profile {
        let profile = Profile {
            ssid: self.ssid.clone(),
            password: self.password.clone(),
            addressing: Addressing::Dhcp,
        };
        match self.static_ip {
            Some(ip) => profile.with_static(StaticIp {
                ip,
                netmask: self.netmask,
                gateway: self.gateway,
                dns: self.dns,
            }),
            None => profile,
        }
    }
}

/// Broker identity and session tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Broker host.
    pub host: String<HOST_LEN>,
    /// Broker port.
    pub port: u16,
    /// Client identifier.
    pub client_id: String<CLIENT_ID_LEN>,
    /// Username, sent only together with a password.
    pub username: Option<String<USERNAME_LEN>>,
    /// Password, sent only together with a username.
    pub password: Option<String<PASSWORD_LEN>>,
    /// Publish topic.
    pub topic: String<TOPIC_LEN>,
    /// Keep-alive announced in CONNECT.
    pub keep_alive_seconds: u16,
    /// CONNACK read timeout.
    pub connack_timeout_ms: u32,
    /// Whether readings really go to the broker.
    pub mode: BrokerMode,
}

impl BrokerConfig {
    /// The session endpoint.
    pub fn endpoint(&self) -> Result<Endpoint, ConfigError> {
        if self.client_id.is_empty() {
            return Err(ConfigError::EmptyClientId);
        }
        if self.username.is_some() != self.password.is_some() {
            warn!("config: MQTT_USER and MQTT_PASSWORD must be set together, connecting anonymously");
        }
        Ok(Endpoint {
            host: self.host.clone(),
            port: self.port,
            client_id: self.client_id.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        })
    }

    /// The session options.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            topic: self.topic.clone(),
            keep_alive_seconds: self.keep_alive_seconds,
            connack_timeout_ms: self.connack_timeout_ms,
            retain: false,
        }
    }
}

/// I2C bus and supply pins of one sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorPins {
    /// Data line.
    pub sda: u8,
    /// Clock line.
    pub scl: u8,
    /// Supply switch, used for power cycling.
    pub power: u8,
}

/// Wiring and mode of one sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorConfig {
    /// Pins.
    pub pins: SensorPins,
    /// How the sensor is run.
    pub mode: SensorMode,
}

/// Control loop timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Sleep after a published cycle.
    pub update_interval_ms: u32,
    /// How long the node stays on the fallback network before trying the
    /// primary again.
    pub primary_check_interval_secs: u64,
    /// Back-off after a failed broker connect or publish.
    pub broker_retry_delay_ms: u32,
    /// Back-off when neither network could be joined.
    pub link_retry_backoff_ms: u32,
    /// Back-off after a failed sensor read.
    pub sensor_retry_delay_ms: u32,
    /// Consecutive failed publishes that trigger a device reset.
    pub max_publish_failures: u8,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            update_interval_ms: 10_000,
            primary_check_interval_secs: 10,
            broker_retry_delay_ms: 5_000,
            link_retry_backoff_ms: 10_000,
            sensor_retry_delay_ms: 5_000,
            max_publish_failures: 5,
        }
    }
}

/// Wall-clock synchronisation settings, consumed by the board's
/// [`Platform::sync_time`](crate::system::Platform::sync_time).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockConfig {
    /// NTP server.
    pub ntp_server: String<NTP_SERVER_LEN>,
    /// Local offset from UTC in seconds.
    pub utc_offset_secs: i32,
}

/// Everything the node needs to run.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Preferred network.
    pub primary: NetworkConfig,
    /// Network used while the primary is unreachable.
    pub fallback: NetworkConfig,
    /// Association polling.
    pub link: LinkTiming,
    /// Broker.
    pub broker: BrokerConfig,
    /// Publish fields, in order.
    pub fields: FieldList,
    /// Ambient light sensor.
    pub light: SensorConfig,
    /// Temperature, pressure and humidity sensor.
    pub climate: SensorConfig,
    /// Status LED pin.
    pub status_led: u8,
    /// Control loop timing.
    pub timing: Timing,
    /// Clock synchronisation.
    pub clock: ClockConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            primary: NetworkConfig::new(
                "Your_Primary_SSID",
                "your_primary_password",
                Ipv4Addr::new(192, 168, 1, 1),
                Ipv4Addr::new(8, 8, 8, 8),
            ),
            fallback: NetworkConfig::new(
                "Your_Secondary_SSID",
                "your_fallback_password",
                Ipv4Addr::new(192, 168, 2, 1),
                Ipv4Addr::new(1, 1, 1, 1),
            ),
            link: LinkTiming::default(),
            broker: BrokerConfig {
                host: fixed("192.168.1.100"),
                port: 1883,
                client_id: fixed("sensor_default"),
                username: None,
                password: None,
                topic: fixed("sensor/default"),
                keep_alive_seconds: 60,
                connack_timeout_ms: 3_000,
                mode: BrokerMode::Active,
            },
            fields: parse_fields(DEFAULT_FIELDS).unwrap_or_default(),
            light: SensorConfig {
                pins: SensorPins {
                    sda: 0,
                    scl: 1,
                    power: 15,
                },
                mode: SensorMode::Active,
            },
            climate: SensorConfig {
                pins: SensorPins {
                    sda: 2,
                    scl: 3,
                    power: 14,
                },
                mode: SensorMode::Active,
            },
            status_led: 16,
            timing: Timing::default(),
            clock: ClockConfig {
                ntp_server: fixed("pool.ntp.org"),
                utc_offset_secs: 3600,
            },
        }
    }
}

impl Config {
    /// Defaults overridden by whatever `lookup` returns for each key.
    ///
    /// The result is validated.
    pub fn from_lookup<F, S>(lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<S>,
        S: AsRef<str>,
    {
        let mut src = Lookup(lookup);
        let mut c = Self::default();

        src.network("", &mut c.primary)?;
        src.network("_FB", &mut c.fallback)?;
        src.apply("MAX_WIFI_RETRIES", &mut c.link.max_retries, number)?;
        src.apply("WIFI_RETRY_DELAY_MS", &mut c.link.retry_delay_ms, number)?;

        let b = &mut c.broker;
        src.apply("MQTT_BROKER", &mut b.host, text)?;
        src.apply("MQTT_PORT", &mut b.port, number)?;
        src.apply("MQTT_CLIENT_ID", &mut b.client_id, text)?;
        src.apply("MQTT_USER", &mut b.username, optional_text)?;
        src.apply("MQTT_PASSWORD", &mut b.password, optional_text)?;
        src.apply("MQTT_TOPIC", &mut b.topic, text)?;
        src.apply("MQTT_KEEPALIVE", &mut b.keep_alive_seconds, number)?;
        src.apply("MQTT_CONNACK_TIMEOUT_MS", &mut b.connack_timeout_ms, number)?;
        src.apply("MQTT_MODE", &mut b.mode, |raw| raw.parse())?;
        src.apply("MQTT_FIELDS", &mut c.fields, parse_fields)?;

        src.sensor("VEML", &mut c.light)?;
        src.sensor("BME", &mut c.climate)?;
        src.apply("STATUS_LED", &mut c.status_led, number)?;

        let t = &mut c.timing;
        src.apply("UPDATE_INTERVAL", &mut t.update_interval_ms, seconds_as_ms)?;
        src.apply("WIFI_PRIMARY_CHECK", &mut t.primary_check_interval_secs, number)?;
        src.apply("BROKER_RETRY_DELAY_MS", &mut t.broker_retry_delay_ms, number)?;
        src.apply("LINK_RETRY_BACKOFF_MS", &mut t.link_retry_backoff_ms, number)?;
        src.apply("SENSOR_RETRY_DELAY_MS", &mut t.sensor_retry_delay_ms, number)?;
        src.apply("MAX_PUBLISH_FAILURES", &mut t.max_publish_failures, number)?;

        src.apply("NTP_SERVER", &mut c.clock.ntp_server, text)?;
        src.apply("UTC_OFFSET", &mut c.clock.utc_offset_secs, number)?;

        c.validate()?;
        Ok(c)
    }

    /// Load `.env` if present, then read the process environment.
    #[cfg(feature = "std")]
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Check the values the node cannot run with.
    ///
    /// Publish fields no source can fill are only warned about; they are
    /// published as `null`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_pins(&self.light.pins)?;
        check_pins(&self.climate.pins)?;
        if self.status_led > MAX_PIN {
            return Err(ConfigError::InvalidPin);
        }

        if self.broker.client_id.is_empty() {
            return Err(ConfigError::EmptyClientId);
        }
        if self.timing.max_publish_failures == 0 {
            return Err(ConfigError::InvalidNumber);
        }

        if self.fields.is_empty() {
            return Err(ConfigError::EmptyFieldList);
        }
        for (i, field) in self.fields.iter().enumerate() {
            if self.fields[..i].contains(field) {
                return Err(ConfigError::DuplicateField);
            }
            if !KNOWN_FIELDS.contains(&field.as_str()) {
                warn!("config: publish field '{}' has no source", field.as_str());
            }
        }
        Ok(())
    }
}

fn check_pins(pins: &SensorPins) -> Result<(), ConfigError> {
    if pins.sda > MAX_PIN || pins.scl > MAX_PIN || pins.power > MAX_PIN {
        return Err(ConfigError::InvalidPin);
    }
    if pins.sda == pins.scl || pins.sda == pins.power || pins.scl == pins.power {
        return Err(ConfigError::PinConflict);
    }
    Ok(())
}

struct Lookup<F>(F);

impl<F, S> Lookup<F>
where
    F: FnMut(&str) -> Option<S>,
    S: AsRef<str>,
{
    /// Overwrite `slot` when `key` is set.
    fn apply<T>(
        &mut self,
        key: &str,
        slot: &mut T,
        parse: impl FnOnce(&str) -> Result<T, ConfigError>,
    ) -> Result<(), ConfigError> {
        if let Some(raw) = (self.0)(key) {
            *slot = parse(raw.as_ref()).inspect_err(|e| warn!("config: {}: {:?}", key, e))?;
        }
        Ok(())
    }

    fn network(&mut self, suffix: &str, net: &mut NetworkConfig) -> Result<(), ConfigError> {
        let mut key = KeyBuf::new();
        self.apply(key.join("SSID", suffix)?, &mut net.ssid, text)?;
        self.apply(key.join("PASSWORD", suffix)?, &mut net.password, text)?;
        self.apply(key.join("STATIC_IP", suffix)?, &mut net.static_ip, optional_address)?;
        self.apply(key.join("NETMASK", suffix)?, &mut net.netmask, address)?;
        self.apply(key.join("GATEWAY", suffix)?, &mut net.gateway, address)?;
        self.apply(key.join("DNS", suffix)?, &mut net.dns, address)
    }

    fn sensor(&mut self, prefix: &str, sensor: &mut SensorConfig) -> Result<(), ConfigError> {
        let mut key = KeyBuf::new();
        self.apply(key.join(prefix, "_SDA")?, &mut sensor.pins.sda, number)?;
        self.apply(key.join(prefix, "_SCL")?, &mut sensor.pins.scl, number)?;
        self.apply(key.join(prefix, "_PWR")?, &mut sensor.pins.power, number)?;
        self.apply(key.join(prefix, "_MODE")?, &mut sensor.mode, |raw| raw.parse())
    }
}

/// Scratch space for composed keys such as `GATEWAY_FB`.
struct KeyBuf(String<24>);

impl KeyBuf {
    fn new() -> Self {
        Self(String::new())
    }

    fn join(&mut self, head: &str, tail: &str) -> Result<&str, ConfigError> {
        self.0.clear();
        self.0.push_str(head).map_err(|_| ConfigError::TooLong)?;
        self.0.push_str(tail).map_err(|_| ConfigError::TooLong)?;
        Ok(self.0.as_str())
    }
}

/// A compile-time default that is known to fit.
fn fixed<const N: usize>(s: &str) -> String<N> {
    let mut out = String::new();
    let _ = out.push_str(s);
    out
}

fn text<const N: usize>(raw: &str) -> Result<String<N>, ConfigError> {
    String::try_from(raw.trim()).map_err(|_| ConfigError::TooLong)
}

/// Empty means unset.
fn optional_text<const N: usize>(raw: &str) -> Result<Option<String<N>>, ConfigError> {
    let raw = raw.trim();
    if raw.is_empty() {
        Ok(None)
    } else {
        text(raw).map(Some)
    }
}

fn number<T: FromStr>(raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidNumber)
}

fn seconds_as_ms(raw: &str) -> Result<u32, ConfigError> {
    number::<u32>(raw)?
        .checked_mul(1000)
        .ok_or(ConfigError::InvalidNumber)
}

fn address(raw: &str) -> Result<Ipv4Addr, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidAddress)
}

/// Empty means DHCP.
fn optional_address(raw: &str) -> Result<Option<Ipv4Addr>, ConfigError> {
    if raw.trim().is_empty() {
        Ok(None)
    } else {
        address(raw).map(Some)
    }
}

/// Comma separated, whitespace around names ignored, empty entries skipped.
fn parse_fields(raw: &str) -> Result<FieldList, ConfigError> {
    let mut fields = FieldList::new();
    for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let name = String::try_from(name).map_err(|_| ConfigError::TooLong)?;
        fields.push(name).map_err(|_| ConfigError::TooManyFields)?;
    }
    Ok(fields)
}
