//! # Node control loop
//!
//! [`Node`] owns every component and drives one fixed sequence per cycle:
//!
//! 1. make sure the WiFi link is up, falling back to the secondary network;
//! 2. while on the fallback network, periodically try the primary again;
//! 3. make sure the broker is connected;
//! 4. read the sensors;
//! 5. publish the reading;
//! 6. sleep for the update interval.
//!
//! A failing step blinks its pattern on the status LED, backs off and ends
//! the cycle early. The loop itself never gives up except in two cases, both
//! ending in a device reset:
//!
//! * no network can be joined at startup;
//! * publishing fails `max_publish_failures` times in a row.
//!
//! Every wait goes through [`Platform`], so the whole loop runs against test
//! doubles on a host.

use log::{error, info, warn};

use crate::config::Timing;
use crate::network::Connect;
use crate::network::link::{LinkError, LinkManager, ProfileSlot, Radio};
use crate::network::mqtt::{Broker, Delivery};
use crate::system::{BlinkPattern, Platform, Signal};
use crate::telemetry::{SensorError, Telemetry};

/// Why the node reset itself.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Halt {
    /// Neither network could be joined at startup.
    LinkExhausted,
    /// Too many consecutive failed publishes.
    PublishFailures,
}

/// What one [`Node::cycle`] did.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CycleOutcome {
    /// The reading went out (or the session was rebuilt while trying).
    Published(Delivery),
    /// No network could be joined; the cycle was skipped.
    LinkDown,
    /// The broker could not be reached; the cycle was skipped.
    BrokerUnavailable,
    /// A sensor failed and was reset; the cycle was skipped.
    SensorFailed(SensorError),
    /// The publish failed for the `consecutive`-th time in a row.
    PublishFailed {
        /// Failures since the last successful publish.
        consecutive: u8,
    },
    /// The device was reset.
    Reset(Halt),
}

/// The sensor node.
#[derive(Debug)]
pub struct Node<R, N, T, S, P>
where
    R: Radio,
    N: Connect,
    T: Telemetry,
    S: Signal,
    P: Platform,
{
    link: LinkManager<R>,
    broker: Broker<N>,
    telemetry: T,
    signal: S,
    platform: P,
    timing: Timing,
    publish_failures: u8,
}

impl<R, N, T, S, P> Node<R, N, T, S, P>
where
    R: Radio,
    N: Connect,
    T: Telemetry,
    S: Signal,
    P: Platform,
{
    /// Assemble a node from its parts.
    pub fn new(
        link: LinkManager<R>,
        broker: Broker<N>,
        telemetry: T,
        signal: S,
        platform: P,
        timing: Timing,
    ) -> Self {
        Self {
            link,
            broker,
            telemetry,
            signal,
            platform,
            timing,
            publish_failures: 0,
        }
    }

    /// Join a network, synchronise the clock and bring the sensors up.
    ///
    /// When neither profile can be joined the LED blinks
    /// [`BlinkPattern::LINK_EXHAUSTED`] and the device is reset. A sensor
    /// that fails to initialise is reset once and left to the cycle.
    pub fn start(&mut self) -> Result<(), Halt> {
        info!("node: starting");
        if self.establish_link().is_err() {
            error!("node: no network reachable, resetting");
            return Err(self.reset(BlinkPattern::LINK_EXHAUSTED, Halt::LinkExhausted));
        }
        self.link.mark_primary_checked(self.platform.uptime_secs());

        if let Err(e) = self.platform.sync_time() {
            warn!("node: clock sync failed: {:?}", e);
        }

        if let Err(e) = self.telemetry.start() {
            warn!("node: {} sensor failed to start: {:?}", e.sensor.name(), e.fault);
            self.telemetry.reset(e.sensor);
        }
        Ok(())
    }

    /// Run one cycle.
    pub fn cycle(&mut self) -> CycleOutcome {
        if !self.link.is_connected() {
            warn!("node: link lost, reconnecting");
            self.broker.disconnect();
            if self.establish_link().is_err() {
                warn!("node: no network reachable");
                return self.back_off(
                    BlinkPattern::LINK_DOWN,
                    self.timing.link_retry_backoff_ms,
                    CycleOutcome::LinkDown,
                );
            }
        }

        let now = self.platform.uptime_secs();
        if self
            .link
            .primary_check_due(now, self.timing.primary_check_interval_secs)
        {
            let back_on_primary = self.check_primary();
            self.link.mark_primary_checked(self.platform.uptime_secs());
            if !back_on_primary && !self.link.is_connected() {
                return self.back_off(
                    BlinkPattern::LINK_DOWN,
                    self.timing.link_retry_backoff_ms,
                    CycleOutcome::LinkDown,
                );
            }
        }

        if !self.broker.is_connected() && self.broker.connect().is_err() {
            warn!("node: broker unreachable");
            return self.back_off(
                BlinkPattern::BROKER,
                self.timing.broker_retry_delay_ms,
                CycleOutcome::BrokerUnavailable,
            );
        }

        let reading = match self.telemetry.read_all() {
            Ok(reading) => reading,
            Err(e) => {
                warn!("node: {} sensor failed: {:?}", e.sensor.name(), e.fault);
                self.signal.blink(BlinkPattern::SENSOR);
                self.telemetry.reset(e.sensor);
                self.platform.delay_ms(self.timing.sensor_retry_delay_ms);
                return CycleOutcome::SensorFailed(e);
            }
        };

        match self.broker.publish(&reading) {
            Ok(delivery) => {
                if delivery == Delivery::Recovered {
                    info!("node: session rebuilt, reading skipped");
                }
                self.publish_failures = 0;
                self.platform.delay_ms(self.timing.update_interval_ms);
                CycleOutcome::Published(delivery)
            }
            Err(e) => {
                self.publish_failures = self.publish_failures.saturating_add(1);
                error!(
                    "node: publish failed ({:?}), {} of {}",
                    e, self.publish_failures, self.timing.max_publish_failures
                );
                if self.publish_failures >= self.timing.max_publish_failures {
                    return CycleOutcome::Reset(
                        self.reset(BlinkPattern::BROKER, Halt::PublishFailures),
                    );
                }
                let consecutive = self.publish_failures;
                self.back_off(
                    BlinkPattern::BROKER,
                    self.timing.broker_retry_delay_ms,
                    CycleOutcome::PublishFailed { consecutive },
                )
            }
        }
    }

    /// [`start`](Self::start), then cycle until the device resets.
    ///
    /// On hardware [`Platform::reset`] does not return, so neither does this.
    pub fn run(&mut self) -> Halt {
        if let Err(halt) = self.start() {
            return halt;
        }
        loop {
            if let CycleOutcome::Reset(halt) = self.cycle() {
                return halt;
            }
        }
    }

    /// Consecutive failed publishes.
    pub fn publish_failures(&self) -> u8 {
        self.publish_failures
    }

    /// The link manager.
    pub fn link(&self) -> &LinkManager<R> {
        &self.link
    }

    /// The broker.
    pub fn broker(&self) -> &Broker<N> {
        &self.broker
    }

    /// The telemetry source.
    pub fn telemetry(&self) -> &T {
        &self.telemetry
    }

    /// The status signal.
    pub fn signal(&self) -> &S {
        &self.signal
    }

    /// The platform.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Primary first, then fallback, each up to `max_retries` attempts.
    fn establish_link(&mut self) -> Result<(), LinkError> {
        let timing = self.link.timing();
        for slot in [ProfileSlot::Primary, ProfileSlot::Fallback] {
            for attempt in 1..=timing.max_retries {
                info!(
                    "node: joining {:?} network, attempt {} of {}",
                    slot, attempt, timing.max_retries
                );
                if self.link.connect(slot, &mut self.platform).is_ok() {
                    if slot == ProfileSlot::Fallback {
                        self.link.mark_primary_checked(self.platform.uptime_secs());
                    }
                    return Ok(());
                }
                self.platform.delay_ms(timing.retry_delay_ms);
            }
        }
        Err(LinkError::Exhausted)
    }

    /// One attempt to return to the primary network; on failure the fallback
    /// is joined again. Returns whether the node is back on the primary.
    fn check_primary(&mut self) -> bool {
        info!("node: checking primary network");
        self.broker.disconnect();
        if self
            .link
            .connect(ProfileSlot::Primary, &mut self.platform)
            .is_ok()
        {
            info!("node: back on primary network");
            return true;
        }
        warn!("node: primary still unavailable, staying on fallback");
        if let Err(e) = self.link.connect(ProfileSlot::Fallback, &mut self.platform) {
            warn!("node: fallback rejoin failed: {:?}", e);
        }
        false
    }

    fn back_off(&mut self, pattern: BlinkPattern, ms: u32, outcome: CycleOutcome) -> CycleOutcome {
        self.signal.blink(pattern);
        self.platform.delay_ms(ms);
        outcome
    }

    fn reset(&mut self, pattern: BlinkPattern, halt: Halt) -> Halt {
        self.signal.blink(pattern);
        error!("node: resetting device ({:?})", halt);
        self.platform.reset();
        halt
    }
}
