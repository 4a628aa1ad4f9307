//! Rate adaptation strategies.
//!
//! Every strategy implements [`RateAdaptationStrategy`]: it is asked for a
//! configuration whenever a device is about to transmit and is told the
//! outcome afterwards. Each implementation owns a [`DeviceStateTable`] with
//! one state record per device, created lazily on the first decision.
//!
//! ## Algorithms
//!
//! - `bisection`: ADR-Lite, moves through the energy ranking in steps
//! - `ucb1_tuned`: UCB1-tuned bandit over ranks or channels
//! - `epsilon_greedy`: greedy on mean success with ε exploration
//! - `tug_of_war`: oscillating forgetting-factor selector
//! - `snr_target`: SNR history based ADR (max or average)
//! - `baseline`: fixed and uniformly random selection

pub mod arms;
pub mod baseline;
pub mod bisection;
pub mod epsilon_greedy;
pub mod snr_target;
pub mod tug_of_war;
pub mod ucb1_tuned;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::SimRng;
use crate::simulation::configuration_space::ConfigurationSpace;
use crate::simulation::types::{DeviceId, TransmissionConfiguration, TransmissionOutcome};

use self::baseline::{FixedParameters, FixedStrategy, RandomParameters, RandomStrategy};
use self::bisection::{BisectionParameters, BisectionStrategy};
use self::epsilon_greedy::{EpsilonGreedyParameters, EpsilonGreedyStrategy};
use self::snr_target::{SnrTargetParameters, SnrTargetStrategy};
use self::tug_of_war::{TugOfWarParameters, TugOfWarStrategy};
use self::ucb1_tuned::{Ucb1TunedParameters, Ucb1TunedStrategy};

/// Number of successful SNR samples kept per device.
pub const SNR_HISTORY_CAPACITY: usize = 20;

/// What a strategy knows about the device it decides for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceContext {
    pub device_id: DeviceId,
    /// Current simulated time (s).
    pub now: f64,
    pub is_mobile: bool,
}

pub trait RateAdaptationStrategy {
    /// Short algorithm label used in logs and reports.
    fn name(&self) -> &str;

    /// Pick the configuration for the device's next transmission.
    fn select_parameters(&mut self, device: &DeviceContext, rng: &mut SimRng) -> TransmissionConfiguration;

    /// Feed back the outcome of a transmission sent with `config`.
    fn update_from_outcome(&mut self, device: &DeviceContext, config: &TransmissionConfiguration, outcome: &TransmissionOutcome);
}

/// Per-device state records of one strategy instance.
#[derive(Debug, Clone)]
pub struct DeviceStateTable<S> {
    states: HashMap<DeviceId, S>,
}

impl<S> Default for DeviceStateTable<S> {
    fn default() -> Self {
        Self { states: HashMap::new() }
    }
}

impl<S> DeviceStateTable<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// State of `device_id`, created with `init` on first access.
    pub fn get_or_insert_with(&mut self, device_id: DeviceId, init: impl FnOnce() -> S) -> &mut S {
        self.states.entry(device_id).or_insert_with(init)
    }

    pub fn get(&self, device_id: DeviceId) -> Option<&S> {
        self.states.get(&device_id)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Bounded history of received SNR values, oldest evicted first.
#[derive(Debug, Clone)]
pub struct SnrHistory {
    values: VecDeque<f64>,
    capacity: usize,
}

impl Default for SnrHistory {
    fn default() -> Self {
        Self::with_capacity(SNR_HISTORY_CAPACITY)
    }
}

impl SnrHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { values: VecDeque::with_capacity(capacity), capacity: capacity.max(1) }
    }

    pub fn push(&mut self, snr_db: f64) {
        if self.values.len() >= self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(snr_db);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn max(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::max)
    }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() { None } else { Some(self.values.iter().sum::<f64>() / self.values.len() as f64) }
    }
}

/// Start position on the energy ranking (1-based): N/2 for static, 3N/4 for
/// mobile devices, never below 1.
pub fn start_rank_index(space_len: usize, is_mobile: bool) -> usize {
    let k = if is_mobile { space_len * 3 / 4 } else { space_len / 2 };
    k.max(1)
}

/// Strategy selection and tuning as read from a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "kebab-case")]
pub enum StrategyConfig {
    Bisection(BisectionParameters),
    Ucb1Tuned(Ucb1TunedParameters),
    EpsilonGreedy(EpsilonGreedyParameters),
    OscillatingForgetting(TugOfWarParameters),
    Fixed(FixedParameters),
    Random(RandomParameters),
    SnrTarget(SnrTargetParameters),
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::Bisection(BisectionParameters::default())
    }
}

impl StrategyConfig {
    /// Range checks on tuning parameters.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StrategyConfig::Bisection(p) => p.validate(),
            StrategyConfig::EpsilonGreedy(p) => p.validate(),
            StrategyConfig::OscillatingForgetting(p) => p.validate(),
            StrategyConfig::Fixed(p) => p.validate(),
            StrategyConfig::SnrTarget(p) => p.validate(),
            StrategyConfig::Ucb1Tuned(_) | StrategyConfig::Random(_) => Ok(()),
        }
    }
}

/// Instantiate the configured strategy over `space`.
pub fn build_strategy(config: &StrategyConfig, space: Arc<ConfigurationSpace>) -> Box<dyn RateAdaptationStrategy> {
    match config {
        StrategyConfig::Bisection(p) => Box::new(BisectionStrategy::new(space, p.clone())),
        StrategyConfig::Ucb1Tuned(p) => Box::new(Ucb1TunedStrategy::new(space, p)),
        StrategyConfig::EpsilonGreedy(p) => Box::new(EpsilonGreedyStrategy::new(space, p)),
        StrategyConfig::OscillatingForgetting(p) => Box::new(TugOfWarStrategy::new(space, p)),
        StrategyConfig::Fixed(p) => Box::new(FixedStrategy::new(space, p.clone())),
        StrategyConfig::Random(p) => Box::new(RandomStrategy::new(space, &p.arms)),
        StrategyConfig::SnrTarget(p) => Box::new(SnrTargetStrategy::new(space, p.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::configuration_space::{ConfigurationAxes, SpaceShape};

    #[test]
    fn snr_history_evicts_oldest() {
        let mut history = SnrHistory::with_capacity(3);
        assert_eq!(history.max(), None);
        assert_eq!(history.mean(), None);
        for v in [1.0, 9.0, 2.0, 3.0] {
            history.push(v);
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.max(), Some(9.0));
        assert!((history.mean().unwrap() - 14.0 / 3.0).abs() < 1e-12);
        history.push(0.0);
        assert_eq!(history.max(), Some(3.0));
    }

    #[test]
    fn start_rank_index_by_mobility() {
        assert_eq!(start_rank_index(30, false), 15);
        assert_eq!(start_rank_index(30, true), 22);
        assert_eq!(start_rank_index(1, false), 1);
        assert_eq!(start_rank_index(1, true), 1);
    }

    #[test]
    fn strategy_config_parses_from_toml() {
        let config: StrategyConfig = toml::from_str("algorithm = \"epsilon-greedy\"\nepsilon = 0.2\n").unwrap();
        assert_eq!(config, StrategyConfig::EpsilonGreedy(EpsilonGreedyParameters { epsilon: 0.2, ..Default::default() }));
        let config: StrategyConfig = toml::from_str("algorithm = \"oscillating-forgetting\"\n[arms]\nkind = \"channels\"\n").unwrap();
        assert!(matches!(config, StrategyConfig::OscillatingForgetting(_)));
        assert!(toml::from_str::<StrategyConfig>("algorithm = \"nope\"\n").is_err());
    }

    #[test]
    fn build_strategy_names() {
        let space = Arc::new(ConfigurationSpace::build(20, SpaceShape::SfPowerFrequency, &ConfigurationAxes::default()).unwrap());
        let configs = [
            (StrategyConfig::Bisection(Default::default()), "adr-lite"),
            (StrategyConfig::Ucb1Tuned(Default::default()), "ucb1-tuned"),
            (StrategyConfig::EpsilonGreedy(Default::default()), "epsilon-greedy"),
            (StrategyConfig::OscillatingForgetting(Default::default()), "tug-of-war"),
            (StrategyConfig::Fixed(Default::default()), "fixed"),
            (StrategyConfig::Random(Default::default()), "random"),
            (StrategyConfig::SnrTarget(Default::default()), "adr-max"),
        ];
        for (config, name) in configs {
            assert_eq!(build_strategy(&config, space.clone()).name(), name);
        }
    }
}
