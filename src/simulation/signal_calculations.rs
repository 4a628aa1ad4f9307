//! Radio signal, timing and energy calculations.
//!
//! Contains helpers for:
//! - LoRa time-on-air and per-transmission energy
//! - Hata-like median path loss and log-normal shadowing samples
//! - Per-SF receiver sensitivity, SNR limits and capture thresholds
//!
//! Units:
//! - Power: dBm, mW and W (conversions provided)
//! - Time: seconds (f64)
//! - Distance: meters in the API, kilometers inside the Hata expression

use rand::Rng;
use rand_distr::{Distribution, Normal};

use super::types::CodingRate;

/// Number of programmed preamble symbols.
pub const PREAMBLE_SYMBOLS: f64 = 8.0;

/// Power drawn by the MCU and radio logic while transmitting (W).
pub const MCU_ACTIVE_POWER_W: f64 = 1.4e-3;

/// Thermal noise density at room temperature (dBm/Hz).
pub const THERMAL_NOISE_DBM_PER_HZ: f64 = -174.0;

/// Distances below this are clamped before entering the path loss model (m).
pub const MIN_LINK_DISTANCE_M: f64 = 1.0;

/// Supported spreading factors.
pub const MIN_SPREADING_FACTOR: u8 = 7;
pub const MAX_SPREADING_FACTOR: u8 = 12;

/// Duration of one LoRa symbol in seconds: `T_sym = 2^SF / BW`.
pub fn symbol_time(spreading_factor: u8, bandwidth_khz: u32) -> f64 {
    2.0_f64.powi(spreading_factor as i32) / (bandwidth_khz as f64 * 1000.0)
}

/// Calculate the time-on-air of one LoRa frame.
///
/// # Formula
///
/// ```text
/// T_preamble = (N_preamble + 4.25) × T_sym
/// N_payload  = 8 + max(0, ceil((8·PL − 4·SF + 16 + 28 − 20·H) / (4·(SF − 2·DE))) × CR_d)
/// ToA        = T_preamble + N_payload × T_sym
/// ```
///
/// Where:
/// - `PL`: payload size in bytes
/// - `H`: 0 (explicit header always on)
/// - `DE`: low data rate optimization, enabled for SF ≥ 11
/// - `CR_d`: coding rate denominator (5 for 4/5 up to 8 for 4/8)
///
/// # Returns
///
/// Time-on-air in seconds.
pub fn calculate_air_time(spreading_factor: u8, bandwidth_khz: u32, coding_rate: CodingRate, payload_bytes: usize) -> f64 {
    let t_sym = symbol_time(spreading_factor, bandwidth_khz);
    let preamble_time = (PREAMBLE_SYMBOLS + 4.25) * t_sym;

    let sf = spreading_factor as f64;
    let pl = payload_bytes as f64;
    let header = 0.0_f64;
    let de = if spreading_factor >= 11 { 1.0 } else { 0.0 };

    let numerator = 8.0 * pl - 4.0 * sf + 16.0 + 28.0 - 20.0 * header;
    let denom = 4.0 * (sf - 2.0 * de);
    let blocks = (numerator / denom).ceil() * coding_rate.denominator() as f64;
    let payload_symbols = 8.0 + blocks.max(0.0);

    preamble_time + payload_symbols * t_sym
}

/// Energy spent on one transmission.
///
/// # Formula
///
/// ```text
/// E = (P_mcu + P_tx(W)) × ToA
/// ```
///
/// # Returns
///
/// Energy in joules.
pub fn calculate_energy(tx_power_dbm: f64, time_on_air_s: f64) -> f64 {
    (MCU_ACTIVE_POWER_W + dbm_to_watts(tx_power_dbm)) * time_on_air_s
}

/// Median path loss of the Hata-like urban model, without shadowing.
///
/// # Formula
///
/// ```text
/// PL = 69.55 + 26.16·log₁₀(f) − 13.82·log₁₀(h) + (44.9 − 6.55·log₁₀(h))·log₁₀(d)
/// ```
///
/// Where:
/// - `f`: carrier frequency in MHz
/// - `h`: receiver (gateway) antenna height in m
/// - `d`: distance in km, after clamping to at least 1 m
///
/// # Notes
///
/// The model is deterministic. Shadowing and fading are added by the caller.
pub fn calculate_path_loss(distance_m: f64, frequency_mhz: f64, receiver_height_m: f64) -> f64 {
    let d_km = distance_m.max(MIN_LINK_DISTANCE_M) / 1000.0;
    let h = receiver_height_m.max(1.0);
    69.55 + 26.16 * frequency_mhz.log10() - 13.82 * h.log10() + (44.9 - 6.55 * h.log10()) * d_km.log10()
}

/// Draw one log-normal shadowing term (dB). A missing distribution means σ = 0.
pub fn sample_shadowing<R: Rng + ?Sized>(shadowing: Option<&Normal<f64>>, rng: &mut R) -> f64 {
    shadowing.map(|normal| normal.sample(rng)).unwrap_or(0.0)
}

/// Receiver noise floor over the channel bandwidth: `−174 + 10·log₁₀(BW_Hz)`.
pub fn noise_floor_dbm(bandwidth_khz: u32) -> f64 {
    THERMAL_NOISE_DBM_PER_HZ + 10.0 * (bandwidth_khz as f64 * 1000.0).log10()
}

/// Minimum demodulation SNR for a spreading factor (dB).
pub fn calculate_snr_limit(spreading_factor: u8) -> f64 {
    match spreading_factor {
        7 => -7.5,
        8 => -10.0,
        9 => -12.5,
        10 => -15.0,
        11 => -17.5,
        12 => -20.0,
        _ => -20.0, // Default to the most robust SF if out of range
    }
}

/// Receiver sensitivity for a spreading factor at 125 kHz (dBm).
pub fn receiver_sensitivity(spreading_factor: u8) -> f64 {
    match spreading_factor {
        7 => -124.0,
        8 => -127.0,
        9 => -130.0,
        10 => -133.0,
        11 => -135.0,
        12 => -137.0,
        _ => -137.0,
    }
}

/// Power difference (dB) a transmission must hold over a same-SF interferer to be captured.
pub fn capture_threshold(spreading_factor: u8) -> f64 {
    match spreading_factor {
        7 => 10.0,
        8 => 9.0,
        9 => 8.0,
        10 => 7.0,
        11 => 6.0,
        12 => 5.0,
        _ => 5.0,
    }
}

/// Convert power from dBm to milliwatts: `P(mW) = 10^(P(dBm) / 10)`.
pub fn dbm_to_mw(dbm: f64) -> f64 {
    10f64.powf(dbm / 10.0)
}

/// Convert power from milliwatts to dBm: `P(dBm) = 10 × log₁₀(P(mW))`.
///
/// For `mw <= 0` the result is NaN or −∞.
pub fn mw_to_dbm(mw: f64) -> f64 {
    10.0 * mw.log10()
}

pub fn dbm_to_watts(dbm: f64) -> f64 {
    dbm_to_mw(dbm) / 1000.0
}
