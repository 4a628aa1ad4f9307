//! Delivery, energy and selection statistics of a run.
//!
//! Counters are updated once per decision cycle; every derived ratio is
//! computed on demand and guarded so it is 0.0 instead of NaN when its
//! denominator is zero.

use std::collections::BTreeMap;

use serde::Serialize;

use super::types::{DeviceId, TransmissionConfiguration};

/// Selection and success counts of one rank, channel or device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SelectionCounter {
    pub selected: u64,
    pub succeeded: u64,
}

impl SelectionCounter {
    fn record(&mut self, success: bool) {
        self.selected += 1;
        if success {
            self.succeeded += 1;
        }
    }

    pub fn success_ratio(&self) -> f64 {
        ratio(self.succeeded, self.selected)
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 { 0.0 } else { numerator as f64 / denominator as f64 }
}

#[derive(Debug, Clone, Default)]
pub struct MetricsAggregator {
    attempted: u64,
    successful: u64,
    /// Energy of successfully delivered transmissions (J).
    successful_energy_joules: f64,
    /// Energy of every transmission (J).
    total_energy_joules: f64,
    per_rank: BTreeMap<usize, SelectionCounter>,
    per_channel: BTreeMap<u32, SelectionCounter>,
    per_device: BTreeMap<DeviceId, SelectionCounter>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, device_id: DeviceId, success: bool, config: &TransmissionConfiguration) {
        self.attempted += 1;
        self.total_energy_joules += config.energy_joules;
        if success {
            self.successful += 1;
            self.successful_energy_joules += config.energy_joules;
        }
        self.per_rank.entry(config.rank).or_default().record(success);
        self.per_channel.entry(config.channel()).or_default().record(success);
        self.per_device.entry(device_id).or_default().record(success);
    }

    pub fn attempted(&self) -> u64 {
        self.attempted
    }

    pub fn successful(&self) -> u64 {
        self.successful
    }

    /// Packet delivery ratio.
    pub fn pdr(&self) -> f64 {
        ratio(self.successful, self.attempted)
    }

    /// Energy of successful transmissions divided by their count, in mJ.
    pub fn mean_energy_per_success_millijoules(&self) -> f64 {
        if self.successful == 0 { 0.0 } else { self.successful_energy_joules * 1000.0 / self.successful as f64 }
    }

    /// Energy of all transmissions per delivered packet, in mJ.
    pub fn energy_per_delivered_packet_millijoules(&self) -> f64 {
        if self.successful == 0 { 0.0 } else { self.total_energy_joules * 1000.0 / self.successful as f64 }
    }

    /// Share of decisions that picked each rank.
    pub fn selection_ratios(&self) -> BTreeMap<usize, f64> {
        self.per_rank.iter().map(|(rank, c)| (*rank, ratio(c.selected, self.attempted))).collect()
    }

    /// Share of decisions that picked each channel, keyed by frequency in kHz.
    pub fn channel_selection_ratios(&self) -> BTreeMap<u32, f64> {
        self.per_channel.iter().map(|(channel, c)| (*channel, ratio(c.selected, self.attempted))).collect()
    }

    pub fn device_counters(&self) -> &BTreeMap<DeviceId, SelectionCounter> {
        &self.per_device
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            attempted: self.attempted,
            successful: self.successful,
            pdr: self.pdr(),
            mean_energy_per_success_mj: self.mean_energy_per_success_millijoules(),
            energy_per_delivered_packet_mj: self.energy_per_delivered_packet_millijoules(),
            total_energy_mj: self.total_energy_joules * 1000.0,
            rank_selection_ratios: self.selection_ratios(),
            channel_selection_ratios: self.channel_selection_ratios(),
            rank_success_ratios: self.per_rank.iter().map(|(rank, c)| (*rank, c.success_ratio())).collect(),
            device_pdr: self.per_device.iter().map(|(id, c)| (*id, c.success_ratio())).collect(),
        }
    }
}

/// Serializable snapshot of a [`MetricsAggregator`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub attempted: u64,
    pub successful: u64,
    pub pdr: f64,
    pub mean_energy_per_success_mj: f64,
    pub energy_per_delivered_packet_mj: f64,
    pub total_energy_mj: f64,
    pub rank_selection_ratios: BTreeMap<usize, f64>,
    pub channel_selection_ratios: BTreeMap<u32, f64>,
    pub rank_success_ratios: BTreeMap<usize, f64>,
    pub device_pdr: BTreeMap<DeviceId, f64>,
}
