//! ADR-Lite: bisection-style walk over the energy ranking.
//!
//! Each device holds a 1-based position `k` on the ranking. Successes with a
//! comfortable SNR margin move it down by a large step, other successes by
//! one, and failures move it up towards the robust end.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{DeviceContext, DeviceStateTable, RateAdaptationStrategy, SnrHistory, start_rank_index};
use crate::SimRng;
use crate::simulation::configuration_space::ConfigurationSpace;
use crate::simulation::signal_calculations::calculate_snr_limit;
use crate::simulation::types::{TransmissionConfiguration, TransmissionOutcome};

/// Thresholds and steps of ADR-Lite, separately for static and mobile devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BisectionParameters {
    /// SNR margin above the SF's demodulation limit needed for a large step down (dB).
    pub static_margin_threshold_db: f64,
    pub mobile_margin_threshold_db: f64,
    pub static_success_step: usize,
    pub mobile_success_step: usize,
    pub static_failure_step: usize,
    pub mobile_failure_step: usize,
}

impl Default for BisectionParameters {
    fn default() -> Self {
        Self {
            static_margin_threshold_db: 2.5,
            mobile_margin_threshold_db: 4.5,
            static_success_step: 2,
            mobile_success_step: 1,
            static_failure_step: 1,
            mobile_failure_step: 2,
        }
    }
}

impl BisectionParameters {
    pub fn validate(&self) -> Result<(), String> {
        let steps = [self.static_success_step, self.mobile_success_step, self.static_failure_step, self.mobile_failure_step];
        if steps.iter().any(|s| *s == 0) {
            return Err("ADR-Lite steps must be at least 1".to_string());
        }
        if !self.static_margin_threshold_db.is_finite() || !self.mobile_margin_threshold_db.is_finite() {
            return Err("ADR-Lite margin thresholds must be finite".to_string());
        }
        Ok(())
    }

    fn margin_threshold(&self, is_mobile: bool) -> f64 {
        if is_mobile { self.mobile_margin_threshold_db } else { self.static_margin_threshold_db }
    }

    fn success_step(&self, is_mobile: bool) -> usize {
        if is_mobile { self.mobile_success_step } else { self.static_success_step }
    }

    fn failure_step(&self, is_mobile: bool) -> usize {
        if is_mobile { self.mobile_failure_step } else { self.static_failure_step }
    }
}

#[derive(Debug, Clone)]
pub struct BisectionState {
    /// 1-based position on the ranking, always in `1..=N`.
    pub current_k: usize,
    pub snr_history: SnrHistory,
}

pub struct BisectionStrategy {
    space: Arc<ConfigurationSpace>,
    parameters: BisectionParameters,
    devices: DeviceStateTable<BisectionState>,
}

impl BisectionStrategy {
    pub fn new(space: Arc<ConfigurationSpace>, parameters: BisectionParameters) -> Self {
        Self { space, parameters, devices: DeviceStateTable::new() }
    }

    fn state_for(&mut self, device: &DeviceContext) -> &mut BisectionState {
        let n = self.space.len();
        self.devices.get_or_insert_with(device.device_id, || BisectionState {
            current_k: start_rank_index(n, device.is_mobile),
            snr_history: SnrHistory::default(),
        })
    }

    pub fn state(&self, device_id: u32) -> Option<&BisectionState> {
        self.devices.get(device_id)
    }
}

impl RateAdaptationStrategy for BisectionStrategy {
    fn name(&self) -> &str {
        "adr-lite"
    }

    fn select_parameters(&mut self, device: &DeviceContext, _rng: &mut SimRng) -> TransmissionConfiguration {
        let k = self.state_for(device).current_k;
        *self.space.get_or_last(k - 1)
    }

    fn update_from_outcome(&mut self, device: &DeviceContext, config: &TransmissionConfiguration, outcome: &TransmissionOutcome) {
        let n = self.space.len();
        let threshold = self.parameters.margin_threshold(device.is_mobile);
        let success_step = self.parameters.success_step(device.is_mobile);
        let failure_step = self.parameters.failure_step(device.is_mobile);

        let state = self.state_for(device);
        let old_k = state.current_k;
        if outcome.success {
            state.snr_history.push(outcome.snr_db);
            let margin = outcome.snr_db - calculate_snr_limit(config.spreading_factor);
            if margin > threshold && state.current_k > success_step {
                state.current_k = (state.current_k - success_step).max(1);
            } else if state.current_k > 1 {
                state.current_k -= 1;
            }
        } else {
            state.current_k = (state.current_k + failure_step).min(n);
        }

        if state.current_k != old_k {
            log::trace!("ADR-Lite device {}: k {} -> {}", device.device_id, old_k, state.current_k);
        }
    }
}
