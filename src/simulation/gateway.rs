//! Gateway reception: channel availability, link budget and contention folded
//! into one [`TransmissionOutcome`] per uplink.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::contention::ContentionModel;
use super::geometry::Position;
use super::propagation::{LinkBudget, PropagationModel};
use super::types::{DeviceId, EngineError, FailureCause, OngoingTransmission, TransmissionConfiguration, TransmissionOutcome, same_channel};

/// Channels open at the gateway until `until_s`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AvailabilityWindow {
    pub until_s: f64,
    pub frequencies_mhz: Vec<f64>,
}

/// Time-windowed channel availability. Windows are consulted in order; the
/// first window whose `until_s` lies after `now` decides. Past the last
/// window every channel is open.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelSchedule {
    pub windows: Vec<AvailabilityWindow>,
}

impl ChannelSchedule {
    pub fn is_available(&self, frequency_mhz: f64, now: f64) -> bool {
        match self.windows.iter().find(|w| now < w.until_s) {
            Some(window) => window.frequencies_mhz.iter().any(|f| same_channel(*f, frequency_mhz)),
            None => true,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut prev = f64::NEG_INFINITY;
        for window in &self.windows {
            if !window.until_s.is_finite() || window.until_s <= prev {
                return Err(format!("Channel availability windows must have strictly increasing end times (got {} after {})", window.until_s, prev));
            }
            prev = window.until_s;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Gateway {
    position: Position,
    propagation: PropagationModel,
    contention: ContentionModel,
    schedule: Option<ChannelSchedule>,
}

impl Gateway {
    pub fn new(position: Position, shadowing_sigma_db: f64, channel_separation: bool, schedule: Option<ChannelSchedule>) -> Result<Self, EngineError> {
        Ok(Self {
            position,
            propagation: PropagationModel::new(shadowing_sigma_db)?,
            contention: ContentionModel::new(channel_separation),
            schedule,
        })
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn contention(&self) -> &ContentionModel {
        &self.contention
    }

    /// Decide whether the uplink of `device_id` sent at `now` from `tx_position` is received.
    ///
    /// Order of checks:
    /// 1. Channel closed by the availability schedule: fails without touching contention.
    /// 2. Link budget sampled and recorded as an ongoing transmission.
    /// 3. Below sensitivity or SNR limit: `BelowSensitivity`.
    /// 4. Overlap with a same-SF transmission within the capture threshold: `Collision`.
    pub fn evaluate<R: Rng + ?Sized>(
        &mut self,
        device_id: DeviceId,
        tx_position: &Position,
        config: &TransmissionConfiguration,
        is_mobile: bool,
        now: f64,
        rng: &mut R,
    ) -> TransmissionOutcome {
        if let Some(schedule) = &self.schedule {
            if !schedule.is_available(config.carrier_frequency_mhz, now) {
                log::debug!("Device {} used closed channel {:.1} MHz at t={:.1}s", device_id, config.carrier_frequency_mhz, now);
                return TransmissionOutcome {
                    success: false,
                    rssi_dbm: f64::NEG_INFINITY,
                    snr_db: f64::NEG_INFINITY,
                    config: *config,
                    failure: Some(FailureCause::ChannelUnavailable),
                };
            }
        }

        let link: LinkBudget = self.propagation.compute_link(tx_position, &self.position, config, is_mobile, rng);
        let collided = self.contention.register(OngoingTransmission {
            device_id,
            start_time: now,
            end_time: now + config.time_on_air_s,
            config: *config,
            rssi_dbm: link.rssi_dbm,
            snr_db: link.snr_db,
            position: *tx_position,
        });

        let failure = if !link.is_receivable(config) {
            Some(FailureCause::BelowSensitivity)
        } else if collided {
            Some(FailureCause::Collision)
        } else {
            None
        };

        log::trace!(
            "Device {} {} -> rssi {:.1} dBm snr {:.1} dB {:?}",
            device_id,
            config,
            link.rssi_dbm,
            link.snr_db,
            failure
        );

        TransmissionOutcome { success: failure.is_none(), rssi_dbm: link.rssi_dbm, snr_db: link.snr_db, config: *config, failure }
    }
}
