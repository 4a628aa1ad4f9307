//! Tug-of-war selector with oscillating forgetting factors.
//!
//! Every arm carries a value `Q`, and forgetting-weighted play and reward
//! counts `N` and `R` whose ratio estimates the arm's success probability.
//! The selection score compares an arm's `Q` against the mean of the others
//! and adds a cosine oscillation that keeps arms in play:
//!
//! ```text
//! score_k = Q_k − mean(Q_j, j ≠ k) + A · cos(2π (t + k) / K)
//! ```
//!
//! After an outcome every `N`, `R` and `Q` decays by β or α. A success adds 1
//! to the chosen arm's `Q`; a failure subtracts `ω`, derived from the two best
//! success estimates:
//!
//! ```text
//! ω = (p₁ + p₂) / 2 − |p₁ − p₂|
//! ```

use std::f64::consts::PI;
use std::sync::Arc;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::arms::{ArmConfig, ArmSet, arm_for_feedback};
use super::{DeviceContext, DeviceStateTable, RateAdaptationStrategy};
use crate::SimRng;
use crate::simulation::configuration_space::ConfigurationSpace;
use crate::simulation::types::{TransmissionConfiguration, TransmissionOutcome};

/// Scores closer than this are treated as equal.
const SCORE_TIE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TugOfWarParameters {
    /// Forgetting factor of the arm values `Q`.
    pub alpha: f64,
    /// Forgetting factor of the play and reward counts.
    pub beta: f64,
    /// Amplitude of the cosine oscillation.
    pub amplitude: f64,
    pub arms: ArmConfig,
}

impl Default for TugOfWarParameters {
    fn default() -> Self {
        Self { alpha: 0.9, beta: 0.9, amplitude: 0.5, arms: ArmConfig::Ranks }
    }
}

impl TugOfWarParameters {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(format!("alpha must be within (0, 1], got {}", self.alpha));
        }
        if !(self.beta > 0.0 && self.beta <= 1.0) {
            return Err(format!("beta must be within (0, 1], got {}", self.beta));
        }
        if !self.amplitude.is_finite() || self.amplitude < 0.0 {
            return Err(format!("amplitude must be >= 0, got {}", self.amplitude));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TugOfWarArm {
    pub q: f64,
    /// Forgetting-weighted play count.
    pub n: f64,
    /// Forgetting-weighted reward count.
    pub r: f64,
}

impl TugOfWarArm {
    /// Success estimate `R / N`, 0 for an arm without weight.
    pub fn estimate(&self) -> f64 {
        if self.n > 0.0 { self.r / self.n } else { 0.0 }
    }
}

#[derive(Debug, Clone)]
pub struct TugOfWarState {
    pub arms: Vec<TugOfWarArm>,
    /// Decisions made for the device so far.
    pub decisions: u64,
}

impl TugOfWarState {
    fn new(arm_count: usize) -> Self {
        Self { arms: vec![TugOfWarArm::default(); arm_count], decisions: 0 }
    }

    pub fn scores(&self, amplitude: f64) -> Vec<f64> {
        let k_count = self.arms.len();
        let q_total: f64 = self.arms.iter().map(|a| a.q).sum();
        self.arms
            .iter()
            .enumerate()
            .map(|(k, arm)| {
                let others_mean = if k_count > 1 { (q_total - arm.q) / (k_count - 1) as f64 } else { 0.0 };
                let phase = 2.0 * PI * (self.decisions + k as u64) as f64 / k_count as f64;
                arm.q - others_mean + amplitude * phase.cos()
            })
            .collect()
    }

    /// `ω` from the two highest success estimates; a lone arm pairs with 0.
    pub fn omega(&self) -> f64 {
        let mut estimates: Vec<f64> = self.arms.iter().map(|a| a.estimate()).collect();
        estimates.sort_by(|a, b| b.total_cmp(a));
        let p1 = estimates.first().copied().unwrap_or(0.0);
        let p2 = estimates.get(1).copied().unwrap_or(0.0);
        (p1 + p2) / 2.0 - (p1 - p2).abs()
    }

    fn apply(&mut self, chosen: usize, success: bool, alpha: f64, beta: f64) {
        for (k, arm) in self.arms.iter_mut().enumerate() {
            if k == chosen {
                arm.n = 1.0 + beta * arm.n;
                arm.r = if success { 1.0 + beta * arm.r } else { beta * arm.r };
            } else {
                arm.n *= beta;
                arm.r *= beta;
            }
        }
        let delta_q = if success { 1.0 } else { -self.omega() };
        for (k, arm) in self.arms.iter_mut().enumerate() {
            arm.q = if k == chosen { alpha * arm.q + delta_q } else { alpha * arm.q };
        }
    }
}

pub struct TugOfWarStrategy {
    space: Arc<ConfigurationSpace>,
    arms: ArmSet,
    parameters: TugOfWarParameters,
    devices: DeviceStateTable<TugOfWarState>,
}

impl TugOfWarStrategy {
    pub fn new(space: Arc<ConfigurationSpace>, parameters: &TugOfWarParameters) -> Self {
        let arms = ArmSet::from_config(&parameters.arms, &space);
        Self { space, arms, parameters: parameters.clone(), devices: DeviceStateTable::new() }
    }

    pub fn state(&self, device_id: u32) -> Option<&TugOfWarState> {
        self.devices.get(device_id)
    }
}

impl RateAdaptationStrategy for TugOfWarStrategy {
    fn name(&self) -> &str {
        "tug-of-war"
    }

    fn select_parameters(&mut self, device: &DeviceContext, rng: &mut SimRng) -> TransmissionConfiguration {
        let arm_count = self.arms.len();
        let amplitude = self.parameters.amplitude;
        let state = self.devices.get_or_insert_with(device.device_id, || TugOfWarState::new(arm_count));

        let arm = if state.decisions == 0 {
            rng.gen_range(0..arm_count)
        } else {
            let scores = state.scores(amplitude);
            let best = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let tied: Vec<usize> = scores.iter().enumerate().filter(|(_, s)| best - **s <= SCORE_TIE_TOLERANCE).map(|(k, _)| k).collect();
            tied.choose(rng).copied().unwrap_or(0)
        };
        state.decisions += 1;
        *self.space.get_or_last(self.arms.rank(arm))
    }

    fn update_from_outcome(&mut self, device: &DeviceContext, config: &TransmissionConfiguration, outcome: &TransmissionOutcome) {
        let Some(arm) = arm_for_feedback(&self.arms, &self.space, config, "tug-of-war") else {
            return;
        };
        let arm_count = self.arms.len();
        let state = self.devices.get_or_insert_with(device.device_id, || TugOfWarState::new(arm_count));
        state.apply(arm, outcome.success, self.parameters.alpha, self.parameters.beta);
        log::trace!("Tug-of-war device {}: arm {} success {} q {:.3}", device.device_id, arm, outcome.success, state.arms[arm].q);
    }
}
