//! Type definitions shared by the physical layer and the strategies.
//!
//! Contains:
//! - Transmission configurations (the ranked reference data)
//! - In-flight transmission records owned by the contention model
//! - Outcomes produced by the gateway for each decision cycle
//! - The engine error type

use serde::{Deserialize, Serialize};

use super::geometry::Position;
use super::signal_calculations::{calculate_air_time, calculate_energy};

/// Identifier of an end device.
pub type DeviceId = u32;

/// Frequency tolerance (MHz) used when matching configurations and channels.
pub const FREQUENCY_TOLERANCE_MHZ: f64 = 0.1;

/// Transmit power tolerance (dB) used when matching configurations.
pub const POWER_TOLERANCE_DB: f64 = 0.1;

/// LoRa forward error correction rate 4/5 to 4/8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CodingRate {
    #[serde(rename = "4/5")]
    Cr45,
    #[serde(rename = "4/6")]
    Cr46,
    #[serde(rename = "4/7")]
    Cr47,
    #[serde(rename = "4/8")]
    Cr48,
}

impl CodingRate {
    /// All coding rates, lowest redundancy first.
    pub const ALL: [CodingRate; 4] = [CodingRate::Cr45, CodingRate::Cr46, CodingRate::Cr47, CodingRate::Cr48];

    /// Denominator of the rate (5..=8), the multiplier on payload symbol blocks.
    pub fn denominator(self) -> u8 {
        match self {
            CodingRate::Cr45 => 5,
            CodingRate::Cr46 => 6,
            CodingRate::Cr47 => 7,
            CodingRate::Cr48 => 8,
        }
    }

    pub fn from_denominator(denominator: u8) -> Option<Self> {
        match denominator {
            5 => Some(CodingRate::Cr45),
            6 => Some(CodingRate::Cr46),
            7 => Some(CodingRate::Cr47),
            8 => Some(CodingRate::Cr48),
            _ => None,
        }
    }
}

impl std::fmt::Display for CodingRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "4/{}", self.denominator())
    }
}

/// One candidate set of radio parameters.
///
/// Built once by the configuration space and never mutated afterwards. The
/// energy and airtime are cached for the payload size the space was built
/// with, so every configuration of a space is comparable by energy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TransmissionConfiguration {
    /// Spreading factor (7..=12).
    pub spreading_factor: u8,
    /// Transmit power at the antenna port (dBm).
    pub tx_power_dbm: f64,
    /// Carrier frequency (MHz).
    pub carrier_frequency_mhz: f64,
    pub coding_rate: CodingRate,
    /// Bandwidth (kHz).
    pub bandwidth_khz: u32,
    /// Position in the energy ordering of the owning space.
    pub rank: usize,
    /// Energy per transmission (J).
    pub energy_joules: f64,
    /// Time-on-air per transmission (s).
    pub time_on_air_s: f64,
}

impl TransmissionConfiguration {
    /// Create a configuration and compute its airtime and energy for `payload_bytes`.
    ///
    /// The rank is left at 0; the configuration space assigns it after sorting.
    pub fn new(spreading_factor: u8, tx_power_dbm: f64, carrier_frequency_mhz: f64, coding_rate: CodingRate, bandwidth_khz: u32, payload_bytes: usize) -> Self {
        let time_on_air_s = calculate_air_time(spreading_factor, bandwidth_khz, coding_rate, payload_bytes);
        Self {
            spreading_factor,
            tx_power_dbm,
            carrier_frequency_mhz,
            coding_rate,
            bandwidth_khz,
            rank: 0,
            energy_joules: calculate_energy(tx_power_dbm, time_on_air_s),
            time_on_air_s,
        }
    }

    /// Whether both configurations describe the same radio parameters,
    /// tolerating small differences on the continuous fields.
    pub fn same_parameters(&self, other: &TransmissionConfiguration) -> bool {
        self.spreading_factor == other.spreading_factor
            && self.coding_rate == other.coding_rate
            && self.bandwidth_khz == other.bandwidth_khz
            && (self.tx_power_dbm - other.tx_power_dbm).abs() < POWER_TOLERANCE_DB
            && same_channel(self.carrier_frequency_mhz, other.carrier_frequency_mhz)
    }

    /// Channel key of this configuration (carrier frequency in kHz).
    pub fn channel(&self) -> u32 {
        channel_key(self.carrier_frequency_mhz)
    }
}

impl std::fmt::Display for TransmissionConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "#{} SF{} {:.1} dBm {:.1} MHz CR {} ({:.3} mJ)",
            self.rank,
            self.spreading_factor,
            self.tx_power_dbm,
            self.carrier_frequency_mhz,
            self.coding_rate,
            self.energy_joules * 1000.0
        )
    }
}

/// Whether two carrier frequencies denote the same channel.
pub fn same_channel(a_mhz: f64, b_mhz: f64) -> bool {
    (a_mhz - b_mhz).abs() < FREQUENCY_TOLERANCE_MHZ
}

/// Integer key for a carrier frequency, used to index per-channel statistics.
pub fn channel_key(frequency_mhz: f64) -> u32 {
    (frequency_mhz * 1000.0).round() as u32
}

/// A transmission currently occupying the gateway's receiver.
#[derive(Debug, Clone)]
pub struct OngoingTransmission {
    pub device_id: DeviceId,
    /// Simulated time the transmission started (s).
    pub start_time: f64,
    /// `start_time` plus time-on-air (s).
    pub end_time: f64,
    pub config: TransmissionConfiguration,
    /// Received power at the gateway (dBm).
    pub rssi_dbm: f64,
    pub snr_db: f64,
    pub position: Position,
}

/// Why a transmission was not received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureCause {
    /// RSSI or SNR below the spreading factor's limits.
    BelowSensitivity,
    /// Overlapped a same-SF transmission within the capture threshold.
    Collision,
    /// The carrier frequency is not open at the gateway at this time.
    ChannelUnavailable,
}

/// Result of one decision cycle.
#[derive(Debug, Clone, Copy)]
pub struct TransmissionOutcome {
    pub success: bool,
    pub rssi_dbm: f64,
    pub snr_db: f64,
    pub config: TransmissionConfiguration,
    /// Set when `success` is false.
    pub failure: Option<FailureCause>,
}

/// Fatal setup errors of the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The configuration axes produced no configuration at all.
    EmptyConfigurationSpace,
    /// An axis value outside the supported range.
    InvalidAxis(String),
    /// A model parameter outside its domain.
    InvalidParameter(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::EmptyConfigurationSpace => write!(f, "Configuration space is empty"),
            EngineError::InvalidAxis(msg) => write!(f, "Invalid configuration axis: {}", msg),
            EngineError::InvalidParameter(msg) => write!(f, "Invalid model parameter: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coding_rate_denominator_roundtrip() {
        for cr in CodingRate::ALL {
            assert_eq!(CodingRate::from_denominator(cr.denominator()), Some(cr));
        }
        assert_eq!(CodingRate::from_denominator(4), None);
        assert_eq!(CodingRate::Cr47.to_string(), "4/7");
    }

    #[test]
    fn same_parameters_tolerates_small_float_noise() {
        let a = TransmissionConfiguration::new(9, 8.0, 868.1, CodingRate::Cr45, 125, 20);
        let b = TransmissionConfiguration::new(9, 8.05, 868.14, CodingRate::Cr45, 125, 20);
        let c = TransmissionConfiguration::new(9, 8.2, 868.1, CodingRate::Cr45, 125, 20);
        assert!(a.same_parameters(&b));
        assert!(!a.same_parameters(&c));
        assert_eq!(a.channel(), 868_100);
    }
}
