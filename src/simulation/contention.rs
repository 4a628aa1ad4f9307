//! Receiver contention at one gateway.
//!
//! Keeps the set of transmissions still on air and decides whether a new
//! arrival is destroyed by an overlapping same-SF transmission. Two
//! transmissions on the same spreading factor (and channel, when channel
//! separation is on) collide unless their received powers differ by at least
//! the capture threshold of that SF. Different SFs are treated as orthogonal.

use super::signal_calculations::capture_threshold;
use super::types::{OngoingTransmission, same_channel};

/// Upper bound of simultaneously tracked transmissions.
pub const MAX_ACTIVE_TRANSMISSIONS: usize = 1000;
const ACTIVE_CAPACITY_WARNING_THRESHOLD: f64 = 0.8; // 80%

#[derive(Debug, Clone)]
pub struct ContentionModel {
    active: Vec<OngoingTransmission>,
    channel_separation: bool,
    capacity: usize,
}

impl ContentionModel {
    /// With `channel_separation` on, transmissions on different carrier
    /// frequencies never interfere.
    pub fn new(channel_separation: bool) -> Self {
        Self::with_capacity(channel_separation, MAX_ACTIVE_TRANSMISSIONS)
    }

    pub fn with_capacity(channel_separation: bool, capacity: usize) -> Self {
        Self { active: Vec::new(), channel_separation, capacity: capacity.max(1) }
    }

    /// Drop transmissions that ended before `now`.
    pub fn purge_expired(&mut self, now: f64) {
        self.active.retain(|tx| tx.end_time >= now);
    }

    /// Whether `candidate` is destroyed by any tracked transmission.
    pub fn collides(&self, candidate: &OngoingTransmission) -> bool {
        let sf = candidate.config.spreading_factor;
        let threshold = capture_threshold(sf);
        self.active.iter().any(|other| {
            other.config.spreading_factor == sf
                && (!self.channel_separation || same_channel(other.config.carrier_frequency_mhz, candidate.config.carrier_frequency_mhz))
                && (candidate.rssi_dbm - other.rssi_dbm).abs() < threshold
        })
    }

    /// Purge, check for a collision against the remaining set, then record
    /// `transmission`. The transmission is recorded even when it collided,
    /// since it still occupies the channel.
    ///
    /// # Returns
    ///
    /// `true` when the new arrival collided.
    pub fn register(&mut self, transmission: OngoingTransmission) -> bool {
        self.purge_expired(transmission.start_time);
        let collided = self.collides(&transmission);
        if collided {
            log::debug!(
                "Device {} SF{} on {:.1} MHz collided ({} on air)",
                transmission.device_id,
                transmission.config.spreading_factor,
                transmission.config.carrier_frequency_mhz,
                self.active.len()
            );
        }
        self.push_active(transmission);
        collided
    }

    fn push_active(&mut self, transmission: OngoingTransmission) {
        if self.active.len() >= self.capacity {
            log::error!("Active transmission set overflow! Capacity: {}/{}, dropping oldest transmissions", self.active.len(), self.capacity);
            let excess = self.active.len() + 1 - self.capacity;
            self.active.drain(..excess);
        } else if self.active.len() as f64 >= self.capacity as f64 * ACTIVE_CAPACITY_WARNING_THRESHOLD {
            log::warn!("Active transmission set approaching capacity: {}/{}", self.active.len(), self.capacity);
        }
        self.active.push(transmission);
    }

    pub fn active(&self) -> &[OngoingTransmission] {
        &self.active
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}
