//! Reference driver running a scenario end to end.
//!
//! High-level flow:
//! 1) Build the configuration space, gateway, strategy, metrics and a seeded RNG.
//! 2) Schedule each device's first uplink at a uniform offset inside its
//!    interval, then one per interval up to its message limit and the duration.
//! 3) Pop uplinks in time order from a binary heap and run one decision cycle
//!    each: select, evaluate at the gateway, feed back, record.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use serde::Serialize;

use super::configuration_space::ConfigurationSpace;
use super::gateway::Gateway;
use super::geometry::Position;
use super::metrics::{MetricsAggregator, MetricsSummary};
use super::types::{DeviceId, EngineError, TransmissionConfiguration, TransmissionOutcome};
use crate::SimRng;
use crate::common::scenario::{DeviceConfig, Scenario};
use crate::strategy::{DeviceContext, RateAdaptationStrategy, build_strategy};

/// A pending uplink. Ordered so that the earliest time pops first from the
/// max-heap, ties broken by device index.
#[derive(Debug, Clone, Copy)]
struct ScheduledUplink {
    time: f64,
    device_index: usize,
}

impl PartialEq for ScheduledUplink {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScheduledUplink {}

impl PartialOrd for ScheduledUplink {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledUplink {
    fn cmp(&self, other: &Self) -> Ordering {
        other.time.total_cmp(&self.time).then_with(|| other.device_index.cmp(&self.device_index))
    }
}

#[derive(Debug, Clone)]
struct DeviceRuntime {
    config: DeviceConfig,
    is_mobile: bool,
    sent: u32,
    successful: u32,
    last_configuration: Option<TransmissionConfiguration>,
}

impl DeviceRuntime {
    fn position_at(&self, now: f64) -> Position {
        self.config.position.advanced(&self.config.velocity, now)
    }

    fn has_budget(&self) -> bool {
        self.config.max_messages.is_none_or(|max| self.sent < max)
    }
}

/// Final state of one device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceReport {
    pub id: DeviceId,
    pub is_mobile: bool,
    pub sent: u32,
    pub successful: u32,
    pub final_configuration: Option<TransmissionConfiguration>,
}

/// Result of [`Network::run`].
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub strategy: String,
    pub seed: u64,
    pub configurations: usize,
    pub simulated_time_s: f64,
    pub metrics: MetricsSummary,
    pub devices: Vec<DeviceReport>,
    /// Wall-clock completion time, RFC 3339.
    pub completed_at: String,
}

pub struct Network {
    space: Arc<ConfigurationSpace>,
    gateway: Gateway,
    strategy: Box<dyn RateAdaptationStrategy>,
    metrics: MetricsAggregator,
    devices: Vec<DeviceRuntime>,
    queue: BinaryHeap<ScheduledUplink>,
    rng: SimRng,
    seed: u64,
    duration_s: f64,
    now: f64,
}

impl Network {
    /// Build every component of a run and schedule the first uplinks.
    ///
    /// The scenario is expected to be validated already; model parameters are
    /// still checked and reported as [`EngineError`].
    pub fn new(scenario: &Scenario) -> Result<Self, EngineError> {
        let space = Arc::new(ConfigurationSpace::build(scenario.payload_bytes, scenario.space_shape, &scenario.axes)?);
        let gateway = Gateway::new(
            scenario.gateway.position,
            scenario.gateway.shadowing_sigma_db,
            scenario.gateway.channel_separation,
            scenario.gateway.channel_schedule.clone(),
        )?;
        let strategy = build_strategy(&scenario.strategy, space.clone());
        let mut rng = SimRng::seed_from_u64(scenario.seed);

        let devices: Vec<DeviceRuntime> = scenario
            .devices
            .iter()
            .map(|d| DeviceRuntime { config: d.clone(), is_mobile: d.velocity.is_mobile(), sent: 0, successful: 0, last_configuration: None })
            .collect();

        let mut queue = BinaryHeap::with_capacity(devices.len());
        for (device_index, device) in devices.iter().enumerate() {
            if !(device.config.interval_s.is_finite() && device.config.interval_s > 0.0) {
                return Err(EngineError::InvalidParameter(format!("device {} interval must be positive", device.config.id)));
            }
            let offset = rng.gen_range(0.0..device.config.interval_s);
            if offset < scenario.duration_s {
                queue.push(ScheduledUplink { time: offset, device_index });
            }
        }

        log::info!(
            "Network ready: {} devices ({} mobile), strategy {}, {} configurations, seed {}",
            devices.len(),
            devices.iter().filter(|d| d.is_mobile).count(),
            strategy.name(),
            space.len(),
            scenario.seed
        );

        Ok(Self {
            space,
            gateway,
            strategy,
            metrics: MetricsAggregator::new(),
            devices,
            queue,
            rng,
            seed: scenario.seed,
            duration_s: scenario.duration_s,
            now: 0.0,
        })
    }

    /// Run a scenario to completion and report.
    pub fn run(scenario: &Scenario) -> Result<RunReport, EngineError> {
        let mut network = Network::new(scenario)?;
        while network.step().is_some() {}
        Ok(network.report())
    }

    /// Process the next scheduled uplink. Returns `None` once nothing is left.
    pub fn step(&mut self) -> Option<TransmissionOutcome> {
        let uplink = self.queue.pop()?;
        self.now = uplink.time;
        let outcome = self.transmit(uplink.device_index, uplink.time);

        let device = &self.devices[uplink.device_index];
        let next = uplink.time + device.config.interval_s;
        if device.has_budget() && next < self.duration_s {
            self.queue.push(ScheduledUplink { time: next, device_index: uplink.device_index });
        }
        Some(outcome)
    }

    /// One decision cycle for the device at `device_index` at time `now`.
    fn transmit(&mut self, device_index: usize, now: f64) -> TransmissionOutcome {
        let device = &self.devices[device_index];
        let context = DeviceContext { device_id: device.config.id, now, is_mobile: device.is_mobile };
        let position = device.position_at(now);

        let config = self.strategy.select_parameters(&context, &mut self.rng);
        let outcome = self.gateway.evaluate(context.device_id, &position, &config, context.is_mobile, now, &mut self.rng);
        self.strategy.update_from_outcome(&context, &config, &outcome);
        self.metrics.record(context.device_id, outcome.success, &config);

        let device = &mut self.devices[device_index];
        device.sent += 1;
        if outcome.success {
            device.successful += 1;
        }
        device.last_configuration = Some(config);
        outcome
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn metrics(&self) -> &MetricsAggregator {
        &self.metrics
    }

    pub fn space(&self) -> &ConfigurationSpace {
        &self.space
    }

    pub fn report(&self) -> RunReport {
        RunReport {
            strategy: self.strategy.name().to_string(),
            seed: self.seed,
            configurations: self.space.len(),
            simulated_time_s: self.now,
            metrics: self.metrics.summary(),
            devices: self
                .devices
                .iter()
                .map(|d| DeviceReport {
                    id: d.config.id,
                    is_mobile: d.is_mobile,
                    sent: d.sent,
                    successful: d.successful,
                    final_configuration: d.last_configuration,
                })
                .collect(),
            completed_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
