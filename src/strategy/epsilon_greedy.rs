//! Epsilon-greedy selection on mean success.

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::arms::{ArmConfig, ArmSet, ArmStatistics, RewardKind, arm_for_feedback};
use super::{DeviceContext, DeviceStateTable, RateAdaptationStrategy};
use crate::SimRng;
use crate::simulation::configuration_space::ConfigurationSpace;
use crate::simulation::types::{TransmissionConfiguration, TransmissionOutcome};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EpsilonGreedyParameters {
    /// Probability of a uniformly random arm.
    pub epsilon: f64,
    pub arms: ArmConfig,
    pub reward: RewardKind,
}

impl Default for EpsilonGreedyParameters {
    fn default() -> Self {
        Self { epsilon: 0.1, arms: ArmConfig::Ranks, reward: RewardKind::Binary }
    }
}

impl EpsilonGreedyParameters {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(format!("epsilon must be within [0, 1], got {}", self.epsilon));
        }
        Ok(())
    }
}

pub struct EpsilonGreedyStrategy {
    space: Arc<ConfigurationSpace>,
    arms: ArmSet,
    epsilon: f64,
    reward: RewardKind,
    devices: DeviceStateTable<Vec<ArmStatistics>>,
}

impl EpsilonGreedyStrategy {
    pub fn new(space: Arc<ConfigurationSpace>, parameters: &EpsilonGreedyParameters) -> Self {
        let arms = ArmSet::from_config(&parameters.arms, &space);
        Self { space, arms, epsilon: parameters.epsilon.clamp(0.0, 1.0), reward: parameters.reward, devices: DeviceStateTable::new() }
    }
}

/// Arm with the highest mean reward; the first one wins ties.
fn greedy_arm(arms: &[ArmStatistics]) -> usize {
    let mut best = 0;
    for (k, stats) in arms.iter().enumerate() {
        if stats.mean() > arms[best].mean() {
            best = k;
        }
    }
    best
}

impl RateAdaptationStrategy for EpsilonGreedyStrategy {
    fn name(&self) -> &str {
        "epsilon-greedy"
    }

    fn select_parameters(&mut self, device: &DeviceContext, rng: &mut SimRng) -> TransmissionConfiguration {
        let arm_count = self.arms.len();
        let state = self.devices.get_or_insert_with(device.device_id, || vec![ArmStatistics::default(); arm_count]);
        let arm = if rng.gen_bool(self.epsilon) { rng.gen_range(0..arm_count) } else { greedy_arm(state) };
        state[arm].record_play();
        *self.space.get_or_last(self.arms.rank(arm))
    }

    fn update_from_outcome(&mut self, device: &DeviceContext, config: &TransmissionConfiguration, outcome: &TransmissionOutcome) {
        let Some(arm) = arm_for_feedback(&self.arms, &self.space, config, "epsilon-greedy") else {
            return;
        };
        let reward = self.reward.reward(outcome, self.arms.fastest_airtime_s());
        let arm_count = self.arms.len();
        let state = self.devices.get_or_insert_with(device.device_id, || vec![ArmStatistics::default(); arm_count]);
        state[arm].record_reward(reward);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::configuration_space::{ConfigurationAxes, SpaceShape};
    use crate::simulation::types::FailureCause;
    use rand::SeedableRng;

    fn ctx() -> DeviceContext {
        DeviceContext { device_id: 9, now: 0.0, is_mobile: false }
    }

    fn outcome(config: TransmissionConfiguration, success: bool) -> TransmissionOutcome {
        TransmissionOutcome { success, rssi_dbm: -100.0, snr_db: 0.0, config, failure: if success { None } else { Some(FailureCause::Collision) } }
    }

    fn space() -> Arc<ConfigurationSpace> {
        Arc::new(ConfigurationSpace::build(20, SpaceShape::SfPower, &ConfigurationAxes::default()).unwrap())
    }

    #[test]
    fn zero_epsilon_always_exploits_the_successful_arm() {
        let space = space();
        let parameters = EpsilonGreedyParameters { epsilon: 0.0, ..Default::default() };
        let mut strategy = EpsilonGreedyStrategy::new(space.clone(), &parameters);
        let mut rng = SimRng::seed_from_u64(17);

        let arm_a = *space.get(4).unwrap();
        let arm_b = *space.get(0).unwrap();
        strategy.update_from_outcome(&ctx(), &arm_a, &outcome(arm_a, true));
        strategy.update_from_outcome(&ctx(), &arm_b, &outcome(arm_b, false));

        for _ in 0..100 {
            assert_eq!(strategy.select_parameters(&ctx(), &mut rng).rank, 4);
        }
    }

    #[test]
    fn untrained_greedy_choice_is_first_arm() {
        let parameters = EpsilonGreedyParameters { epsilon: 0.0, ..Default::default() };
        let mut strategy = EpsilonGreedyStrategy::new(space(), &parameters);
        let mut rng = SimRng::seed_from_u64(17);
        assert_eq!(strategy.select_parameters(&ctx(), &mut rng).rank, 0);
    }

    #[test]
    fn full_epsilon_explores_many_arms() {
        let space = space();
        let parameters = EpsilonGreedyParameters { epsilon: 1.0, ..Default::default() };
        let mut strategy = EpsilonGreedyStrategy::new(space.clone(), &parameters);
        let mut rng = SimRng::seed_from_u64(17);
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..500 {
            seen.insert(strategy.select_parameters(&ctx(), &mut rng).rank);
        }
        assert_eq!(seen.len(), space.len());
    }

    #[test]
    fn epsilon_outside_unit_interval_is_rejected() {
        assert!(EpsilonGreedyParameters { epsilon: 1.5, ..Default::default() }.validate().is_err());
        assert!(EpsilonGreedyParameters { epsilon: -0.1, ..Default::default() }.validate().is_err());
        assert!(EpsilonGreedyParameters::default().validate().is_ok());
    }
}
