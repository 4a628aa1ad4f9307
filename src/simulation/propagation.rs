//! Link budget between an end device and the gateway.
//!
//! RSSI is the transmit power minus the Hata-like median path loss, an
//! optional log-normal shadowing term and, for mobile devices, three extra
//! fading terms (Rayleigh, a mobility penalty and a slow temporal fade).

use rand::Rng;
use rand_distr::{Distribution, Exp, Normal};

use super::geometry::{Position, distance};
use super::signal_calculations::{calculate_path_loss, calculate_snr_limit, noise_floor_dbm, receiver_sensitivity, sample_shadowing};
use super::types::{EngineError, TransmissionConfiguration};

/// Mean of the exponential power gain behind the Rayleigh fading term.
pub const RAYLEIGH_MEAN: f64 = 0.8;

/// Extra loss range applied to mobile links (dB).
pub const MOBILE_PENALTY_DB: (f64, f64) = (5.0, 15.0);

/// Temporal fading range applied to mobile links (dB).
pub const TEMPORAL_FADING_DB: (f64, f64) = (0.0, 5.0);

/// Received power and SNR of one transmission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkBudget {
    pub rssi_dbm: f64,
    pub snr_db: f64,
    /// Total loss including shadowing and fading (dB).
    pub path_loss_db: f64,
}

impl LinkBudget {
    /// Whether the gateway can demodulate this link with the given configuration.
    pub fn is_receivable(&self, config: &TransmissionConfiguration) -> bool {
        is_receivable(self.rssi_dbm, self.snr_db, config.spreading_factor)
    }
}

/// `RSSI > sensitivity(SF)` and `SNR > min SNR(SF)`.
pub fn is_receivable(rssi_dbm: f64, snr_db: f64, spreading_factor: u8) -> bool {
    rssi_dbm > receiver_sensitivity(spreading_factor) && snr_db > calculate_snr_limit(spreading_factor)
}

#[derive(Debug, Clone)]
pub struct PropagationModel {
    shadowing: Option<Normal<f64>>,
    rayleigh: Exp<f64>,
}

impl PropagationModel {
    /// Create a model with shadowing standard deviation `shadowing_sigma_db`; 0 disables shadowing.
    pub fn new(shadowing_sigma_db: f64) -> Result<Self, EngineError> {
        if !shadowing_sigma_db.is_finite() || shadowing_sigma_db < 0.0 {
            return Err(EngineError::InvalidParameter(format!("shadowing sigma must be >= 0, got {}", shadowing_sigma_db)));
        }
        let shadowing = if shadowing_sigma_db > 0.0 {
            Some(Normal::new(0.0, shadowing_sigma_db).map_err(|e| EngineError::InvalidParameter(e.to_string()))?)
        } else {
            None
        };
        let rayleigh = Exp::new(1.0 / RAYLEIGH_MEAN).map_err(|e| EngineError::InvalidParameter(e.to_string()))?;
        Ok(Self { shadowing, rayleigh })
    }

    /// Sample the link budget from `tx` to a receiver at `rx`.
    ///
    /// The receiver height (`rx.z`) is the antenna height of the path loss model.
    /// Consumes random numbers only when shadowing is enabled or the link is mobile.
    pub fn compute_link<R: Rng + ?Sized>(&self, tx: &Position, rx: &Position, config: &TransmissionConfiguration, is_mobile: bool, rng: &mut R) -> LinkBudget {
        let d = distance(tx, rx);
        let mut loss = calculate_path_loss(d, config.carrier_frequency_mhz, rx.z);
        loss += sample_shadowing(self.shadowing.as_ref(), rng);

        if is_mobile {
            let gain = self.rayleigh.sample(rng).max(f64::MIN_POSITIVE);
            loss += -10.0 * gain.log10();
            loss += rng.gen_range(MOBILE_PENALTY_DB.0..MOBILE_PENALTY_DB.1);
            loss += rng.gen_range(TEMPORAL_FADING_DB.0..TEMPORAL_FADING_DB.1);
        }

        let rssi_dbm = config.tx_power_dbm - loss;
        let snr_db = rssi_dbm - noise_floor_dbm(config.bandwidth_khz);
        LinkBudget { rssi_dbm, snr_db, path_loss_db: loss }
    }
}
