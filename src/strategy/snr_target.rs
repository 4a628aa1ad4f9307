//! SNR-target ADR (ADR-MAX / ADR-AVG).
//!
//! Keeps the SNR of the last successful uplinks per device. Once enough
//! samples exist, the target SNR is their maximum or mean minus a safety
//! margin, and the cheapest configuration whose spreading factor can still be
//! demodulated at that target is chosen. With too few samples the device
//! stays at its start rank.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{DeviceContext, DeviceStateTable, RateAdaptationStrategy, SnrHistory, start_rank_index};
use crate::SimRng;
use crate::simulation::configuration_space::ConfigurationSpace;
use crate::simulation::signal_calculations::calculate_snr_limit;
use crate::simulation::types::{TransmissionConfiguration, TransmissionOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnrTargetMode {
    #[default]
    Max,
    Avg,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SnrTargetParameters {
    pub mode: SnrTargetMode,
    pub static_min_samples: usize,
    pub mobile_min_samples: usize,
    /// Margin subtracted from the target; `None` uses the mode's default.
    pub static_margin_db: Option<f64>,
    pub mobile_margin_db: Option<f64>,
    /// Extra headroom above the SF's demodulation limit.
    pub static_headroom_db: f64,
    pub mobile_headroom_db: f64,
}

impl Default for SnrTargetParameters {
    fn default() -> Self {
        Self {
            mode: SnrTargetMode::Max,
            static_min_samples: 5,
            mobile_min_samples: 8,
            static_margin_db: None,
            mobile_margin_db: None,
            static_headroom_db: 1.0,
            mobile_headroom_db: 2.0,
        }
    }
}

impl SnrTargetParameters {
    pub fn validate(&self) -> Result<(), String> {
        if self.static_min_samples == 0 || self.mobile_min_samples == 0 {
            return Err("SNR target minimum sample counts must be at least 1".to_string());
        }
        if self.static_min_samples > super::SNR_HISTORY_CAPACITY || self.mobile_min_samples > super::SNR_HISTORY_CAPACITY {
            return Err(format!("SNR target minimum sample counts cannot exceed the history size {}", super::SNR_HISTORY_CAPACITY));
        }
        Ok(())
    }

    fn margin(&self, is_mobile: bool) -> f64 {
        let configured = if is_mobile { self.mobile_margin_db } else { self.static_margin_db };
        configured.unwrap_or(match (self.mode, is_mobile) {
            (SnrTargetMode::Max, false) => 4.0,
            (SnrTargetMode::Max, true) => 8.0,
            (SnrTargetMode::Avg, false) => 3.0,
            (SnrTargetMode::Avg, true) => 6.0,
        })
    }
}

pub struct SnrTargetStrategy {
    space: Arc<ConfigurationSpace>,
    parameters: SnrTargetParameters,
    devices: DeviceStateTable<SnrHistory>,
}

impl SnrTargetStrategy {
    pub fn new(space: Arc<ConfigurationSpace>, parameters: SnrTargetParameters) -> Self {
        Self { space, parameters, devices: DeviceStateTable::new() }
    }

    /// Cheapest rank whose SF limit plus headroom fits under `effective_snr_db`.
    fn rank_for_target(&self, effective_snr_db: f64, is_mobile: bool) -> Option<usize> {
        let headroom = if is_mobile { self.parameters.mobile_headroom_db } else { self.parameters.static_headroom_db };
        self.space.iter().find(|c| calculate_snr_limit(c.spreading_factor) + headroom <= effective_snr_db).map(|c| c.rank)
    }
}

impl RateAdaptationStrategy for SnrTargetStrategy {
    fn name(&self) -> &str {
        match self.parameters.mode {
            SnrTargetMode::Max => "adr-max",
            SnrTargetMode::Avg => "adr-avg",
        }
    }

    fn select_parameters(&mut self, device: &DeviceContext, _rng: &mut SimRng) -> TransmissionConfiguration {
        let min_samples = if device.is_mobile { self.parameters.mobile_min_samples } else { self.parameters.static_min_samples };
        let history = self.devices.get_or_insert_with(device.device_id, SnrHistory::default);

        let target = if history.len() >= min_samples {
            match self.parameters.mode {
                SnrTargetMode::Max => history.max(),
                SnrTargetMode::Avg => history.mean(),
            }
        } else {
            None
        };

        let rank = target
            .and_then(|t| self.rank_for_target(t - self.parameters.margin(device.is_mobile), device.is_mobile))
            .unwrap_or_else(|| start_rank_index(self.space.len(), device.is_mobile) - 1);
        *self.space.get_or_last(rank)
    }

    fn update_from_outcome(&mut self, device: &DeviceContext, _config: &TransmissionConfiguration, outcome: &TransmissionOutcome) {
        if outcome.success {
            self.devices.get_or_insert_with(device.device_id, SnrHistory::default).push(outcome.snr_db);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::configuration_space::{ConfigurationAxes, SpaceShape};
    use rand::SeedableRng;

    fn ctx(is_mobile: bool) -> DeviceContext {
        DeviceContext { device_id: 4, now: 0.0, is_mobile }
    }

    fn success(config: TransmissionConfiguration, snr_db: f64) -> TransmissionOutcome {
        TransmissionOutcome { success: true, rssi_dbm: -100.0, snr_db, config, failure: None }
    }

    fn space() -> Arc<ConfigurationSpace> {
        Arc::new(ConfigurationSpace::build(20, SpaceShape::SfPower, &ConfigurationAxes::default()).unwrap())
    }

    #[test]
    fn uses_start_rank_until_history_is_filled() {
        let space = space();
        let mut strategy = SnrTargetStrategy::new(space.clone(), SnrTargetParameters::default());
        let mut rng = SimRng::seed_from_u64(1);
        for _ in 0..4 {
            let config = strategy.select_parameters(&ctx(false), &mut rng);
            assert_eq!(config.rank, space.len() / 2 - 1);
            strategy.update_from_outcome(&ctx(false), &config, &success(config, 20.0));
        }
        strategy.update_from_outcome(&ctx(false), space.first(), &success(*space.first(), 20.0));
        assert_eq!(strategy.select_parameters(&ctx(false), &mut rng).rank, 0);
    }

    #[test]
    fn low_snr_target_forces_robust_spreading_factor() {
        let space = space();
        let mut strategy = SnrTargetStrategy::new(space.clone(), SnrTargetParameters { mode: SnrTargetMode::Avg, ..Default::default() });
        let mut rng = SimRng::seed_from_u64(1);
        // avg -10 dB, margin 3 dB, headroom 1 dB -> needs limit <= -14 dB -> SF10 or slower
        for _ in 0..5 {
            strategy.update_from_outcome(&ctx(false), space.first(), &success(*space.first(), -10.0));
        }
        let config = strategy.select_parameters(&ctx(false), &mut rng);
        assert_eq!(config.spreading_factor, 10);
        assert!(space.iter().take(config.rank).all(|c| c.spreading_factor < 10));
    }

    #[test]
    fn unreachable_target_falls_back_to_start_rank() {
        let space = space();
        let mut strategy = SnrTargetStrategy::new(space.clone(), SnrTargetParameters::default());
        let mut rng = SimRng::seed_from_u64(1);
        for _ in 0..8 {
            strategy.update_from_outcome(&ctx(true), space.first(), &success(*space.first(), -40.0));
        }
        assert_eq!(strategy.select_parameters(&ctx(true), &mut rng).rank, space.len() * 3 / 4 - 1);
    }

    #[test]
    fn failures_are_not_recorded() {
        let space = space();
        let mut strategy = SnrTargetStrategy::new(space.clone(), SnrTargetParameters::default());
        let mut failed = success(*space.first(), 30.0);
        failed.success = false;
        for _ in 0..10 {
            strategy.update_from_outcome(&ctx(false), space.first(), &failed);
        }
        let mut rng = SimRng::seed_from_u64(1);
        assert_eq!(strategy.select_parameters(&ctx(false), &mut rng).rank, space.len() / 2 - 1);
    }
}
