//! UCB1-tuned bandit over ranks or channels.
//!
//! # Formula
//!
//! ```text
//! V_k   = var_k + sqrt(2 · ln t / n_k)
//! UCB_k = mean_k + sqrt((ln t / n_k) · min(1/4, V_k))
//! ```
//!
//! `t` is the number of selections made for the device and `n_k` the number
//! of times arm `k` was selected. Unplayed arms are played first, lowest
//! index first.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::arms::{ArmConfig, ArmSet, ArmStatistics, RewardKind, arm_for_feedback};
use super::{DeviceContext, DeviceStateTable, RateAdaptationStrategy};
use crate::SimRng;
use crate::simulation::configuration_space::ConfigurationSpace;
use crate::simulation::types::{TransmissionConfiguration, TransmissionOutcome};

/// Upper bound on the Bernoulli variance term.
const VARIANCE_CAP: f64 = 0.25;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Ucb1TunedParameters {
    pub arms: ArmConfig,
    pub reward: RewardKind,
}

#[derive(Debug, Clone)]
pub struct Ucb1TunedState {
    pub arms: Vec<ArmStatistics>,
    pub total_selections: u64,
}

pub struct Ucb1TunedStrategy {
    space: Arc<ConfigurationSpace>,
    arms: ArmSet,
    reward: RewardKind,
    devices: DeviceStateTable<Ucb1TunedState>,
}

impl Ucb1TunedStrategy {
    pub fn new(space: Arc<ConfigurationSpace>, parameters: &Ucb1TunedParameters) -> Self {
        let arms = ArmSet::from_config(&parameters.arms, &space);
        Self { space, arms, reward: parameters.reward, devices: DeviceStateTable::new() }
    }

    pub fn state(&self, device_id: u32) -> Option<&Ucb1TunedState> {
        self.devices.get(device_id)
    }
}

/// UCB1-tuned index of an arm that was played at least once.
pub fn ucb1_tuned_index(stats: &ArmStatistics, total_selections: u64) -> f64 {
    let n = stats.plays.max(1) as f64;
    let ln_t = (total_selections.max(1) as f64).ln();
    let v = stats.variance() + (2.0 * ln_t / n).sqrt();
    stats.mean() + ((ln_t / n) * v.min(VARIANCE_CAP)).sqrt()
}

fn choose_arm(state: &Ucb1TunedState) -> usize {
    if let Some(unplayed) = state.arms.iter().position(|a| a.plays == 0) {
        return unplayed;
    }
    let mut best = 0;
    let mut best_index = f64::NEG_INFINITY;
    for (k, stats) in state.arms.iter().enumerate() {
        let index = ucb1_tuned_index(stats, state.total_selections);
        if index > best_index {
            best_index = index;
            best = k;
        }
    }
    best
}

impl RateAdaptationStrategy for Ucb1TunedStrategy {
    fn name(&self) -> &str {
        "ucb1-tuned"
    }

    fn select_parameters(&mut self, device: &DeviceContext, _rng: &mut SimRng) -> TransmissionConfiguration {
        let arm_count = self.arms.len();
        let state = self.devices.get_or_insert_with(device.device_id, || Ucb1TunedState { arms: vec![ArmStatistics::default(); arm_count], total_selections: 0 });
        let arm = choose_arm(state);
        state.arms[arm].record_play();
        state.total_selections += 1;
        *self.space.get_or_last(self.arms.rank(arm))
    }

    fn update_from_outcome(&mut self, device: &DeviceContext, config: &TransmissionConfiguration, outcome: &TransmissionOutcome) {
        let Some(arm) = arm_for_feedback(&self.arms, &self.space, config, "UCB1-tuned") else {
            return;
        };
        let reward = self.reward.reward(outcome, self.arms.fastest_airtime_s());
        let arm_count = self.arms.len();
        let state = self.devices.get_or_insert_with(device.device_id, || Ucb1TunedState { arms: vec![ArmStatistics::default(); arm_count], total_selections: 0 });
        state.arms[arm].record_reward(reward);
        log::trace!("UCB1-tuned device {}: arm {} reward {:.3} mean {:.3}", device.device_id, arm, reward, state.arms[arm].mean());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::configuration_space::{ConfigurationAxes, SpaceShape};
    use crate::simulation::types::FailureCause;
    use rand::SeedableRng;

    fn ctx() -> DeviceContext {
        DeviceContext { device_id: 3, now: 0.0, is_mobile: false }
    }

    fn outcome(config: TransmissionConfiguration, success: bool) -> TransmissionOutcome {
        TransmissionOutcome { success, rssi_dbm: -100.0, snr_db: 0.0, config, failure: if success { None } else { Some(FailureCause::Collision) } }
    }

    #[test]
    fn every_arm_is_played_once_before_any_twice() {
        let space = Arc::new(ConfigurationSpace::build(20, SpaceShape::SfPower, &ConfigurationAxes::default()).unwrap());
        let mut strategy = Ucb1TunedStrategy::new(space.clone(), &Ucb1TunedParameters::default());
        let mut rng = SimRng::seed_from_u64(5);
        let mut seen = Vec::new();
        for i in 0..space.len() {
            let config = strategy.select_parameters(&ctx(), &mut rng);
            assert_eq!(config.rank, i, "cold start plays arms in index order");
            assert!(!seen.contains(&config.rank));
            seen.push(config.rank);
            strategy.update_from_outcome(&ctx(), &config, &outcome(config, i % 3 == 0));
        }
        let state = strategy.state(3).unwrap();
        assert!(state.arms.iter().all(|a| a.plays == 1));
        assert_eq!(state.total_selections, space.len() as u64);
    }

    #[test]
    fn converges_on_the_only_rewarding_arm() {
        let axes = ConfigurationAxes { spreading_factors: vec![7, 8, 9], tx_powers_dbm: vec![14.0], ..ConfigurationAxes::default() };
        let space = Arc::new(ConfigurationSpace::build(20, SpaceShape::SfPower, &axes).unwrap());
        let mut strategy = Ucb1TunedStrategy::new(space.clone(), &Ucb1TunedParameters::default());
        let mut rng = SimRng::seed_from_u64(5);
        let mut picks = [0u32; 3];
        for _ in 0..300 {
            let config = strategy.select_parameters(&ctx(), &mut rng);
            picks[config.rank] += 1;
            strategy.update_from_outcome(&ctx(), &config, &outcome(config, config.rank == 1));
        }
        assert!(picks[1] > picks[0] + picks[2], "picks {:?}", picks);
    }

    #[test]
    fn channel_arms_select_across_frequencies() {
        let space = Arc::new(ConfigurationSpace::build(20, SpaceShape::SfPowerFrequency, &ConfigurationAxes::default()).unwrap());
        let parameters = Ucb1TunedParameters { arms: ArmConfig::Channels(Default::default()), reward: RewardKind::InverseAirtime };
        let mut strategy = Ucb1TunedStrategy::new(space, &parameters);
        let mut rng = SimRng::seed_from_u64(5);
        let freqs: Vec<f64> = (0..3)
            .map(|_| {
                let config = strategy.select_parameters(&ctx(), &mut rng);
                strategy.update_from_outcome(&ctx(), &config, &outcome(config, true));
                config.carrier_frequency_mhz
            })
            .collect();
        assert_eq!(freqs, vec![868.1, 868.4, 868.7]);
    }

    #[test]
    fn index_grows_with_uncertainty() {
        let mut few = ArmStatistics::default();
        let mut many = ArmStatistics::default();
        for _ in 0..2 {
            few.record_play();
            few.record_reward(1.0);
        }
        for _ in 0..50 {
            many.record_play();
            many.record_reward(1.0);
        }
        assert!(ucb1_tuned_index(&few, 100) > ucb1_tuned_index(&many, 100));
    }
}
