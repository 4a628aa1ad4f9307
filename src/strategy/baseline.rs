//! Non-adaptive baselines: a fixed configuration per device, and uniform random selection.

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::arms::{ArmConfig, ArmSet};
use super::{DeviceContext, DeviceStateTable, RateAdaptationStrategy};
use crate::SimRng;
use crate::simulation::configuration_space::ConfigurationSpace;
use crate::simulation::types::{TransmissionConfiguration, TransmissionOutcome};

/// How a fixed strategy assigns the configuration of each device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixedAssignment {
    /// Every device uses this rank (out-of-range ranks use the last one).
    Rank(usize),
    /// Drawn once per device: with `probability` from the lowest
    /// `low_fraction` of ranks, otherwise from the whole space.
    LowEnergyDraw { low_fraction: f64, probability: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FixedParameters {
    /// Explicit rank; when absent the low-energy draw is used.
    pub rank: Option<usize>,
    pub low_fraction: f64,
    pub probability: f64,
}

impl Default for FixedParameters {
    fn default() -> Self {
        Self { rank: None, low_fraction: 0.3, probability: 0.95 }
    }
}

impl FixedParameters {
    pub fn assignment(&self) -> FixedAssignment {
        match self.rank {
            Some(rank) => FixedAssignment::Rank(rank),
            None => FixedAssignment::LowEnergyDraw { low_fraction: self.low_fraction, probability: self.probability },
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.low_fraction) {
            return Err(format!("low-fraction must be within [0, 1], got {}", self.low_fraction));
        }
        if !(0.0..=1.0).contains(&self.probability) {
            return Err(format!("probability must be within [0, 1], got {}", self.probability));
        }
        Ok(())
    }
}

pub struct FixedStrategy {
    space: Arc<ConfigurationSpace>,
    assignment: FixedAssignment,
    devices: DeviceStateTable<usize>,
}

impl FixedStrategy {
    pub fn new(space: Arc<ConfigurationSpace>, parameters: FixedParameters) -> Self {
        Self { space, assignment: parameters.assignment(), devices: DeviceStateTable::new() }
    }

    fn draw(&self, rng: &mut SimRng) -> usize {
        let n = self.space.len();
        match self.assignment {
            FixedAssignment::Rank(rank) => rank.min(n - 1),
            FixedAssignment::LowEnergyDraw { low_fraction, probability } => {
                if rng.gen_bool(probability.clamp(0.0, 1.0)) {
                    let low_count = ((n as f64 * low_fraction) as usize).max(1);
                    rng.gen_range(0..low_count)
                } else {
                    rng.gen_range(0..n)
                }
            }
        }
    }
}

impl RateAdaptationStrategy for FixedStrategy {
    fn name(&self) -> &str {
        "fixed"
    }

    fn select_parameters(&mut self, device: &DeviceContext, rng: &mut SimRng) -> TransmissionConfiguration {
        let rank = match self.devices.get(device.device_id).copied() {
            Some(rank) => rank,
            None => {
                let rank = self.draw(rng);
                log::debug!("Fixed device {} assigned rank {}", device.device_id, rank);
                *self.devices.get_or_insert_with(device.device_id, || rank)
            }
        };
        *self.space.get_or_last(rank)
    }

    fn update_from_outcome(&mut self, _device: &DeviceContext, _config: &TransmissionConfiguration, _outcome: &TransmissionOutcome) {}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RandomParameters {
    pub arms: ArmConfig,
}

pub struct RandomStrategy {
    space: Arc<ConfigurationSpace>,
    arms: ArmSet,
}

impl RandomStrategy {
    pub fn new(space: Arc<ConfigurationSpace>, arms: &ArmConfig) -> Self {
        let arms = ArmSet::from_config(arms, &space);
        Self { space, arms }
    }
}

impl RateAdaptationStrategy for RandomStrategy {
    fn name(&self) -> &str {
        "random"
    }

    fn select_parameters(&mut self, _device: &DeviceContext, rng: &mut SimRng) -> TransmissionConfiguration {
        let arm = rng.gen_range(0..self.arms.len());
        *self.space.get_or_last(self.arms.rank(arm))
    }

    fn update_from_outcome(&mut self, _device: &DeviceContext, _config: &TransmissionConfiguration, _outcome: &TransmissionOutcome) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::configuration_space::{ConfigurationAxes, SpaceShape};
    use rand::SeedableRng;

    fn ctx(device_id: u32) -> DeviceContext {
        DeviceContext { device_id, now: 0.0, is_mobile: false }
    }

    fn space() -> Arc<ConfigurationSpace> {
        Arc::new(ConfigurationSpace::build(20, SpaceShape::SfPower, &ConfigurationAxes::default()).unwrap())
    }

    #[test]
    fn explicit_rank_is_clamped_to_space() {
        let space = space();
        let mut rng = SimRng::seed_from_u64(3);
        let mut fixed = FixedStrategy::new(space.clone(), FixedParameters { rank: Some(3), ..Default::default() });
        assert_eq!(fixed.select_parameters(&ctx(1), &mut rng).rank, 3);
        let mut fixed = FixedStrategy::new(space.clone(), FixedParameters { rank: Some(999), ..Default::default() });
        assert_eq!(fixed.select_parameters(&ctx(1), &mut rng).rank, space.len() - 1);
    }

    #[test]
    fn draw_is_sticky_per_device_and_mostly_low_energy() {
        let space = space();
        let mut rng = SimRng::seed_from_u64(3);
        let mut fixed = FixedStrategy::new(space.clone(), FixedParameters::default());
        let mut low = 0;
        for id in 0..200 {
            let first = fixed.select_parameters(&ctx(id), &mut rng).rank;
            for _ in 0..3 {
                assert_eq!(fixed.select_parameters(&ctx(id), &mut rng).rank, first);
            }
            if first < 9 {
                low += 1;
            }
        }
        assert!(low > 170, "low-energy draws {}", low);
    }

    #[test]
    fn random_covers_every_arm() {
        let space = space();
        let mut rng = SimRng::seed_from_u64(3);
        let mut random = RandomStrategy::new(space.clone(), &ArmConfig::Ranks);
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..600 {
            seen.insert(random.select_parameters(&ctx(1), &mut rng).rank);
        }
        assert_eq!(seen.len(), space.len());
    }
}
