//! Energy-ranked space of candidate transmission configurations.
//!
//! The space is the Cartesian product of the varied axes, sorted ascending by
//! energy per transmission. Rank 0 is the cheapest configuration and rank
//! `N − 1` the most expensive (and usually the most robust). Strategies share
//! one space read-only through an `Arc`.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::signal_calculations::{MAX_SPREADING_FACTOR, MIN_SPREADING_FACTOR};
use super::types::{CodingRate, EngineError, POWER_TOLERANCE_DB, TransmissionConfiguration, same_channel};

/// Which axes are enumerated. Axes that are not varied use their first value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpaceShape {
    /// Spreading factor × transmit power.
    #[default]
    SfPower,
    /// Spreading factor × transmit power × carrier frequency.
    SfPowerFrequency,
    /// Spreading factor × transmit power × coding rate.
    SfPowerCodingRate,
    /// All four axes.
    Full,
}

impl SpaceShape {
    fn varies_frequency(self) -> bool {
        matches!(self, SpaceShape::SfPowerFrequency | SpaceShape::Full)
    }

    fn varies_coding_rate(self) -> bool {
        matches!(self, SpaceShape::SfPowerCodingRate | SpaceShape::Full)
    }
}

/// Values available on each axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ConfigurationAxes {
    pub spreading_factors: Vec<u8>,
    pub tx_powers_dbm: Vec<f64>,
    pub frequencies_mhz: Vec<f64>,
    pub coding_rates: Vec<CodingRate>,
    pub bandwidth_khz: u32,
}

impl Default for ConfigurationAxes {
    fn default() -> Self {
        Self {
            spreading_factors: (MIN_SPREADING_FACTOR..=MAX_SPREADING_FACTOR).collect(),
            tx_powers_dbm: vec![2.0, 5.0, 8.0, 11.0, 14.0],
            frequencies_mhz: vec![868.1, 868.4, 868.7],
            coding_rates: CodingRate::ALL.to_vec(),
            bandwidth_khz: 125,
        }
    }
}

impl ConfigurationAxes {
    /// Check axis values. Empty axes are not an error here; they surface as an
    /// empty space from [`ConfigurationSpace::build`].
    pub fn validate(&self) -> Result<(), EngineError> {
        if let Some(sf) = self.spreading_factors.iter().find(|sf| !(MIN_SPREADING_FACTOR..=MAX_SPREADING_FACTOR).contains(*sf)) {
            return Err(EngineError::InvalidAxis(format!("spreading factor {} outside {}..={}", sf, MIN_SPREADING_FACTOR, MAX_SPREADING_FACTOR)));
        }
        if self.tx_powers_dbm.iter().any(|p| !p.is_finite()) {
            return Err(EngineError::InvalidAxis("transmit power must be finite".to_string()));
        }
        if self.frequencies_mhz.iter().any(|f| !f.is_finite() || *f <= 0.0) {
            return Err(EngineError::InvalidAxis("carrier frequencies must be positive".to_string()));
        }
        if self.bandwidth_khz == 0 {
            return Err(EngineError::InvalidAxis("bandwidth must be positive".to_string()));
        }
        if let Some((a, _)) = first_close_pair(&self.spreading_factors, |a, b| a == b) {
            return Err(EngineError::InvalidAxis(format!("spreading factor {} listed twice", a)));
        }
        if let Some((a, _)) = first_close_pair(&self.coding_rates, |a, b| a == b) {
            return Err(EngineError::InvalidAxis(format!("coding rate {} listed twice", a)));
        }
        if let Some((a, b)) = first_close_pair(&self.tx_powers_dbm, |a, b| (a - b).abs() < POWER_TOLERANCE_DB) {
            return Err(EngineError::InvalidAxis(format!("transmit powers {} and {} dBm are indistinguishable", a, b)));
        }
        if let Some((a, b)) = first_close_pair(&self.frequencies_mhz, |a, b| same_channel(*a, *b)) {
            return Err(EngineError::InvalidAxis(format!("frequencies {} and {} MHz are the same channel", a, b)));
        }
        Ok(())
    }
}

/// First pair of distinct positions whose values `same` considers equal.
fn first_close_pair<T>(values: &[T], same: impl Fn(&T, &T) -> bool) -> Option<(&T, &T)> {
    values.iter().enumerate().find_map(|(i, a)| values[i + 1..].iter().find(|b| same(a, *b)).map(|b| (a, b)))
}

/// Configurations sorted ascending by energy, ranks `0..N`.
#[derive(Debug, Clone)]
pub struct ConfigurationSpace {
    configurations: Vec<TransmissionConfiguration>,
    shape: SpaceShape,
    payload_bytes: usize,
    frequencies_mhz: Vec<f64>,
}

impl ConfigurationSpace {
    /// Enumerate and rank the configurations for `payload_bytes` byte frames.
    ///
    /// Ties in energy keep enumeration order (SF, then power, then frequency,
    /// then coding rate).
    pub fn build(payload_bytes: usize, shape: SpaceShape, axes: &ConfigurationAxes) -> Result<Self, EngineError> {
        axes.validate()?;

        let frequencies: Vec<f64> = if shape.varies_frequency() { axes.frequencies_mhz.clone() } else { axes.frequencies_mhz.iter().take(1).copied().collect() };
        let coding_rates: Vec<CodingRate> = if shape.varies_coding_rate() { axes.coding_rates.clone() } else { axes.coding_rates.iter().take(1).copied().collect() };

        let mut configurations = Vec::with_capacity(axes.spreading_factors.len() * axes.tx_powers_dbm.len() * frequencies.len() * coding_rates.len());
        for &sf in &axes.spreading_factors {
            for &tp in &axes.tx_powers_dbm {
                for &freq in &frequencies {
                    for &cr in &coding_rates {
                        configurations.push(TransmissionConfiguration::new(sf, tp, freq, cr, axes.bandwidth_khz, payload_bytes));
                    }
                }
            }
        }

        if configurations.is_empty() {
            return Err(EngineError::EmptyConfigurationSpace);
        }

        // sort_by is stable
        configurations.sort_by(|a, b| a.energy_joules.total_cmp(&b.energy_joules));
        for (rank, config) in configurations.iter_mut().enumerate() {
            config.rank = rank;
        }

        info!(
            "Built {:?} configuration space: {} configurations, {:.3}..{:.3} mJ",
            shape,
            configurations.len(),
            configurations[0].energy_joules * 1000.0,
            configurations[configurations.len() - 1].energy_joules * 1000.0
        );
        for config in &configurations {
            debug!("  {}", config);
        }

        Ok(Self { configurations, shape, payload_bytes, frequencies_mhz: axes.frequencies_mhz.clone() })
    }

    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    /// Always false for a built space; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }

    pub fn get(&self, rank: usize) -> Option<&TransmissionConfiguration> {
        self.configurations.get(rank)
    }

    /// Configuration at `rank`, or the highest-energy configuration when out of range.
    pub fn get_or_last(&self, rank: usize) -> &TransmissionConfiguration {
        self.configurations.get(rank).unwrap_or_else(|| self.last())
    }

    /// Cheapest configuration.
    pub fn first(&self) -> &TransmissionConfiguration {
        &self.configurations[0]
    }

    /// Most expensive configuration.
    pub fn last(&self) -> &TransmissionConfiguration {
        &self.configurations[self.configurations.len() - 1]
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransmissionConfiguration> {
        self.configurations.iter()
    }

    /// Rank of the configuration with the same parameters, or the last rank when absent.
    pub fn rank_of(&self, config: &TransmissionConfiguration) -> usize {
        self.find_rank(config).unwrap_or(self.configurations.len() - 1)
    }

    /// Rank of the configuration with the same parameters, if any.
    pub fn find_rank(&self, config: &TransmissionConfiguration) -> Option<usize> {
        self.configurations.iter().position(|c| c.same_parameters(config))
    }

    /// Whether the space holds a configuration on `frequency_mhz`.
    pub fn has_channel(&self, frequency_mhz: f64) -> bool {
        self.configurations.iter().any(|c| same_channel(c.carrier_frequency_mhz, frequency_mhz))
    }

    pub fn shape(&self) -> SpaceShape {
        self.shape
    }

    pub fn payload_bytes(&self) -> usize {
        self.payload_bytes
    }

    /// Frequency axis the space was built from, including values not varied by the shape.
    pub fn frequencies_mhz(&self) -> &[f64] {
        &self.frequencies_mhz
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sf_power_space_is_ranked_by_energy() {
        let space = ConfigurationSpace::build(20, SpaceShape::SfPower, &ConfigurationAxes::default()).unwrap();
        assert_eq!(space.len(), 30);
        for (r, c) in space.iter().enumerate() {
            assert_eq!(c.rank, r);
            assert_eq!(space.rank_of(c), r);
        }
        for pair in space.iter().collect::<Vec<_>>().windows(2) {
            assert!(pair[0].energy_joules <= pair[1].energy_joules);
        }
        assert_eq!(space.first().spreading_factor, 7);
        assert_eq!(space.first().tx_power_dbm, 2.0);
        assert_eq!(space.last().spreading_factor, 12);
        assert_eq!(space.last().tx_power_dbm, 14.0);
    }

    #[test]
    fn shapes_enumerate_expected_sizes() {
        let axes = ConfigurationAxes::default();
        assert_eq!(ConfigurationSpace::build(20, SpaceShape::SfPowerFrequency, &axes).unwrap().len(), 90);
        assert_eq!(ConfigurationSpace::build(20, SpaceShape::SfPowerCodingRate, &axes).unwrap().len(), 120);
        assert_eq!(ConfigurationSpace::build(20, SpaceShape::Full, &axes).unwrap().len(), 360);
    }

    #[test]
    fn non_varied_axes_use_first_value() {
        let space = ConfigurationSpace::build(20, SpaceShape::SfPower, &ConfigurationAxes::default()).unwrap();
        assert!(space.iter().all(|c| c.carrier_frequency_mhz == 868.1 && c.coding_rate == CodingRate::Cr45));
        assert_eq!(space.frequencies_mhz().len(), 3);
    }

    #[test]
    fn rank_of_unknown_config_is_last_rank() {
        let space = ConfigurationSpace::build(20, SpaceShape::SfPower, &ConfigurationAxes::default()).unwrap();
        let foreign = TransmissionConfiguration::new(9, 20.0, 868.1, CodingRate::Cr45, 125, 20);
        assert_eq!(space.rank_of(&foreign), space.len() - 1);
        assert_eq!(space.find_rank(&foreign), None);
        assert_eq!(space.get_or_last(10_000).rank, space.len() - 1);
    }

    #[test]
    fn empty_axis_is_fatal() {
        let axes = ConfigurationAxes { tx_powers_dbm: vec![], ..ConfigurationAxes::default() };
        assert_eq!(ConfigurationSpace::build(20, SpaceShape::SfPower, &axes).unwrap_err(), EngineError::EmptyConfigurationSpace);
    }

    #[test]
    fn duplicate_axis_values_are_rejected() {
        let duplicates = [
            ConfigurationAxes { tx_powers_dbm: vec![14.0, 14.0], ..ConfigurationAxes::default() },
            ConfigurationAxes { tx_powers_dbm: vec![8.0, 14.0, 8.05], ..ConfigurationAxes::default() },
            ConfigurationAxes { spreading_factors: vec![7, 9, 7], ..ConfigurationAxes::default() },
            ConfigurationAxes { coding_rates: vec![CodingRate::Cr45, CodingRate::Cr45], ..ConfigurationAxes::default() },
            ConfigurationAxes { frequencies_mhz: vec![868.1, 868.15], ..ConfigurationAxes::default() },
        ];
        for axes in duplicates {
            assert!(matches!(axes.validate(), Err(EngineError::InvalidAxis(_))), "{:?}", axes);
            assert!(ConfigurationSpace::build(20, SpaceShape::Full, &axes).is_err());
        }
    }

    #[test]
    fn every_rank_round_trips_in_the_full_space() {
        let space = ConfigurationSpace::build(20, SpaceShape::Full, &ConfigurationAxes::default()).unwrap();
        for (r, c) in space.iter().enumerate() {
            assert_eq!(space.rank_of(c), r);
        }
    }

    #[test]
    fn out_of_range_sf_is_rejected() {
        let axes = ConfigurationAxes { spreading_factors: vec![6, 7], ..ConfigurationAxes::default() };
        assert!(matches!(ConfigurationSpace::build(20, SpaceShape::SfPower, &axes), Err(EngineError::InvalidAxis(_))));
    }
}
