//! Arm sets and per-arm statistics shared by the bandit strategies.
//!
//! An arm is either one rank of the configuration space or one radio channel.
//! Channel arms pin spreading factor, power and coding rate to a base
//! configuration and vary only the carrier frequency.

use serde::{Deserialize, Serialize};

use crate::simulation::configuration_space::ConfigurationSpace;
use crate::simulation::types::{CodingRate, TransmissionConfiguration, TransmissionOutcome};

/// Fixed parameters of channel arms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ChannelArmBase {
    pub spreading_factor: u8,
    pub tx_power_dbm: f64,
    pub coding_rate: CodingRate,
}

impl Default for ChannelArmBase {
    fn default() -> Self {
        Self { spreading_factor: 7, tx_power_dbm: 14.0, coding_rate: CodingRate::Cr45 }
    }
}

/// What the arms of a bandit are.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ArmConfig {
    /// One arm per rank of the configuration space.
    #[default]
    Ranks,
    /// One arm per carrier frequency of the space.
    Channels(ChannelArmBase),
}

/// Reward credited to an arm after a transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RewardKind {
    /// 1 on success, 0 on failure.
    #[default]
    Binary,
    /// On success, the fastest arm's airtime divided by this arm's airtime; 0 on failure.
    InverseAirtime,
}

impl RewardKind {
    pub fn reward(self, outcome: &TransmissionOutcome, fastest_airtime_s: f64) -> f64 {
        if !outcome.success {
            return 0.0;
        }
        match self {
            RewardKind::Binary => 1.0,
            RewardKind::InverseAirtime => {
                if outcome.config.time_on_air_s > 0.0 { (fastest_airtime_s / outcome.config.time_on_air_s).min(1.0) } else { 0.0 }
            }
        }
    }
}

/// The ranks a bandit chooses between, indexed by arm.
#[derive(Debug, Clone, PartialEq)]
pub struct ArmSet {
    ranks: Vec<usize>,
    fastest_airtime_s: f64,
}

impl ArmSet {
    /// Resolve `config` against `space`. Channel arms whose base configuration
    /// is not in the space are skipped; when none remain the set falls back to
    /// all ranks.
    pub fn from_config(config: &ArmConfig, space: &ConfigurationSpace) -> Self {
        let mut ranks: Vec<usize> = match config {
            ArmConfig::Ranks => (0..space.len()).collect(),
            ArmConfig::Channels(base) => space
                .frequencies_mhz()
                .iter()
                .filter_map(|freq| {
                    let probe = TransmissionConfiguration::new(
                        base.spreading_factor,
                        base.tx_power_dbm,
                        *freq,
                        base.coding_rate,
                        space.first().bandwidth_khz,
                        space.payload_bytes(),
                    );
                    space.find_rank(&probe)
                })
                .collect(),
        };
        ranks.dedup();

        if ranks.is_empty() {
            log::warn!("No channel arm matches the configuration space, using every rank as an arm");
            ranks = (0..space.len()).collect();
        }

        let fastest_airtime_s = ranks.iter().map(|r| space.get_or_last(*r).time_on_air_s).fold(f64::INFINITY, f64::min);
        Self { ranks, fastest_airtime_s }
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }

    /// Space rank played by `arm`.
    pub fn rank(&self, arm: usize) -> usize {
        self.ranks[arm]
    }

    /// Arm that plays `rank`, if any.
    pub fn arm_of_rank(&self, rank: usize) -> Option<usize> {
        self.ranks.iter().position(|r| *r == rank)
    }

    pub fn ranks(&self) -> &[usize] {
        &self.ranks
    }

    /// Shortest time-on-air among the arms (s).
    pub fn fastest_airtime_s(&self) -> f64 {
        self.fastest_airtime_s
    }
}

/// Running reward statistics of one arm.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ArmStatistics {
    /// Times the arm was selected.
    pub plays: u64,
    /// Times a reward was fed back.
    pub observations: u64,
    pub reward_sum: f64,
    pub reward_sq_sum: f64,
}

impl ArmStatistics {
    pub fn record_play(&mut self) {
        self.plays += 1;
    }

    pub fn record_reward(&mut self, reward: f64) {
        self.observations += 1;
        self.reward_sum += reward;
        self.reward_sq_sum += reward * reward;
    }

    pub fn mean(&self) -> f64 {
        if self.observations == 0 { 0.0 } else { self.reward_sum / self.observations as f64 }
    }

    /// Population variance of the observed rewards.
    pub fn variance(&self) -> f64 {
        if self.observations == 0 {
            return 0.0;
        }
        let mean = self.mean();
        (self.reward_sq_sum / self.observations as f64 - mean * mean).max(0.0)
    }
}

/// Map a fed-back configuration to its arm, logging when it is not one.
pub(crate) fn arm_for_feedback(arms: &ArmSet, space: &ConfigurationSpace, config: &TransmissionConfiguration, strategy: &str) -> Option<usize> {
    let arm = space.find_rank(config).and_then(|rank| arms.arm_of_rank(rank));
    if arm.is_none() {
        log::debug!("{}: feedback for configuration {} outside the arm set ignored", strategy, config);
    }
    arm
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::configuration_space::{ConfigurationAxes, SpaceShape};
    use crate::simulation::types::FailureCause;

    fn outcome(config: TransmissionConfiguration, success: bool) -> TransmissionOutcome {
        TransmissionOutcome { success, rssi_dbm: -90.0, snr_db: 10.0, config, failure: if success { None } else { Some(FailureCause::Collision) } }
    }

    #[test]
    fn rank_arms_cover_space() {
        let space = ConfigurationSpace::build(20, SpaceShape::SfPower, &ConfigurationAxes::default()).unwrap();
        let arms = ArmSet::from_config(&ArmConfig::Ranks, &space);
        assert_eq!(arms.len(), space.len());
        assert_eq!(arms.arm_of_rank(7), Some(7));
        assert_eq!(arms.fastest_airtime_s(), space.first().time_on_air_s);
    }

    #[test]
    fn channel_arms_vary_only_frequency() {
        let space = ConfigurationSpace::build(20, SpaceShape::SfPowerFrequency, &ConfigurationAxes::default()).unwrap();
        let arms = ArmSet::from_config(&ArmConfig::Channels(ChannelArmBase::default()), &space);
        assert_eq!(arms.len(), 3);
        let freqs: Vec<f64> = arms.ranks().iter().map(|r| space.get_or_last(*r).carrier_frequency_mhz).collect();
        assert_eq!(freqs, vec![868.1, 868.4, 868.7]);
        assert!(arms.ranks().iter().all(|r| space.get_or_last(*r).spreading_factor == 7));
    }

    #[test]
    fn channel_arms_fall_back_to_ranks_when_base_missing() {
        let space = ConfigurationSpace::build(20, SpaceShape::SfPowerFrequency, &ConfigurationAxes::default()).unwrap();
        let base = ChannelArmBase { tx_power_dbm: 20.0, ..ChannelArmBase::default() };
        let arms = ArmSet::from_config(&ArmConfig::Channels(base), &space);
        assert_eq!(arms.len(), space.len());
    }

    #[test]
    fn inverse_airtime_reward_is_one_for_fastest_arm() {
        let space = ConfigurationSpace::build(20, SpaceShape::SfPower, &ConfigurationAxes::default()).unwrap();
        let arms = ArmSet::from_config(&ArmConfig::Ranks, &space);
        let fastest = *space.first();
        let slowest = *space.last();
        assert_eq!(RewardKind::InverseAirtime.reward(&outcome(fastest, true), arms.fastest_airtime_s()), 1.0);
        let slow = RewardKind::InverseAirtime.reward(&outcome(slowest, true), arms.fastest_airtime_s());
        assert!(slow > 0.0 && slow < 0.1);
        assert_eq!(RewardKind::InverseAirtime.reward(&outcome(fastest, false), arms.fastest_airtime_s()), 0.0);
        assert_eq!(RewardKind::Binary.reward(&outcome(slowest, true), arms.fastest_airtime_s()), 1.0);
    }

    #[test]
    fn statistics_mean_and_variance() {
        let mut stats = ArmStatistics::default();
        assert_eq!(stats.mean(), 0.0);
        assert_eq!(stats.variance(), 0.0);
        for r in [1.0, 0.0, 1.0, 0.0] {
            stats.record_play();
            stats.record_reward(r);
        }
        assert_eq!(stats.plays, 4);
        assert_eq!(stats.mean(), 0.5);
        assert!((stats.variance() - 0.25).abs() < 1e-12);
    }
}
