//! Scenario loading, parsing, and validation logic.
//!
//! A scenario describes one run: the configuration space, the gateway, the
//! adaptation strategy and its tuning, and the devices with their traffic.
//! Files are TOML or JSON, picked by extension.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::simulation::configuration_space::{ConfigurationAxes, SpaceShape};
use crate::simulation::gateway::ChannelSchedule;
use crate::simulation::geometry::{Position, Velocity};
use crate::simulation::types::DeviceId;
use crate::strategy::StrategyConfig;

/// Error type for scenario loading failures.
#[derive(Debug)]
pub enum ScenarioLoadError {
    FileReadError(String),
    ParseError(String),
    ValidationError(String),
}

impl std::fmt::Display for ScenarioLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScenarioLoadError::FileReadError(msg) => write!(f, "Failed to read file: {}", msg),
            ScenarioLoadError::ParseError(msg) => write!(f, "Failed to parse scenario: {}", msg),
            ScenarioLoadError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ScenarioLoadError {}

/// On-disk scenario encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioFormat {
    Toml,
    Json,
}

impl ScenarioFormat {
    /// `.toml` files are TOML, everything else is read as JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ScenarioFormat::Toml,
            _ => ScenarioFormat::Json,
        }
    }
}

/// Gateway placement and channel model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GatewayConfig {
    /// Antenna position; `z` is the antenna height used by the path loss model.
    pub position: Position,
    /// Log-normal shadowing standard deviation (dB); 0 disables shadowing.
    pub shadowing_sigma_db: f64,
    /// When set, transmissions on different carrier frequencies never interfere.
    /// Off by default: only the spreading factor separates transmissions.
    pub channel_separation: bool,
    pub channel_schedule: Option<ChannelSchedule>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { position: Position::new(0.0, 0.0, 15.0), shadowing_sigma_db: 0.0, channel_separation: false, channel_schedule: None }
    }
}

/// One end device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeviceConfig {
    pub id: DeviceId,
    /// Position at t = 0 (m).
    pub position: Position,
    /// Constant velocity (m/s); devices faster than 0.05 m/s are mobile.
    #[serde(default)]
    pub velocity: Velocity,
    /// Time between uplinks (s).
    #[serde(default = "default_interval_s")]
    pub interval_s: f64,
    /// Stop after this many uplinks; unlimited within the duration when absent.
    #[serde(default)]
    pub max_messages: Option<u32>,
}

fn default_interval_s() -> f64 {
    50.0
}

fn default_payload_bytes() -> usize {
    20
}

fn default_duration_s() -> f64 {
    3600.0
}

/// Root structure of a scenario file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Scenario {
    /// Seed of the run's random number generator.
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_payload_bytes")]
    pub payload_bytes: usize,
    #[serde(default)]
    pub space_shape: SpaceShape,
    #[serde(default)]
    pub axes: ConfigurationAxes,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    /// Simulated time span (s).
    #[serde(default = "default_duration_s")]
    pub duration_s: f64,
    pub devices: Vec<DeviceConfig>,
}

/// Parse a scenario from a string without validating it.
pub fn parse_scenario(data: &str, format: ScenarioFormat) -> Result<Scenario, ScenarioLoadError> {
    match format {
        ScenarioFormat::Toml => toml::from_str(data)
            .context("Invalid TOML format")
            .map_err(|e| ScenarioLoadError::ParseError(format!("{:#}", e))),
        ScenarioFormat::Json => serde_json::from_str(data)
            .context("Invalid JSON format")
            .map_err(|e| ScenarioLoadError::ParseError(format!("{:#}", e))),
    }
}

/// Load, parse and validate a scenario file.
///
/// # Parameters
///
/// * `path` - Path to a `.toml` or `.json` scenario file
///
/// # Returns
///
/// Parsed and validated Scenario or an error.
pub fn load_scenario(path: &str) -> Result<Scenario, ScenarioLoadError> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path))
        .map_err(|e| ScenarioLoadError::FileReadError(format!("{:#}", e)))?;

    let scenario = parse_scenario(&data, ScenarioFormat::from_path(Path::new(path)))?;

    validate_scenario(&scenario).map_err(ScenarioLoadError::ValidationError)?;

    log::info!("Loaded scenario {}: {} devices, strategy {:?}", path, scenario.devices.len(), scenario.strategy);
    Ok(scenario)
}

/// Validate scenario contents.
///
/// # Returns
///
/// `Ok(())` if validation passes, `Err(String)` with error description otherwise.
pub fn validate_scenario(scenario: &Scenario) -> Result<(), String> {
    const MAX_DEVICES: usize = 100_000;
    const MAX_PAYLOAD_BYTES: usize = 255;

    if scenario.devices.is_empty() {
        return Err("Scenario must contain at least one device".to_string());
    }
    if scenario.devices.len() > MAX_DEVICES {
        return Err(format!("Device count {} exceeds maximum of {}", scenario.devices.len(), MAX_DEVICES));
    }

    let mut device_ids = HashSet::new();
    for device in &scenario.devices {
        if !device_ids.insert(device.id) {
            return Err(format!("Duplicate device id found: {}", device.id));
        }
    }

    for device in &scenario.devices {
        let p = &device.position;
        let v = &device.velocity;
        if ![p.x, p.y, p.z, v.x, v.y, v.z].iter().all(|c| c.is_finite()) {
            return Err(format!("Device {} has a non-finite position or velocity", device.id));
        }
        if !(device.interval_s.is_finite() && device.interval_s > 0.0) {
            return Err(format!("Device {} interval {} s must be positive", device.id, device.interval_s));
        }
        if device.max_messages == Some(0) {
            return Err(format!("Device {} max-messages must be at least 1", device.id));
        }
    }

    if scenario.payload_bytes == 0 || scenario.payload_bytes > MAX_PAYLOAD_BYTES {
        return Err(format!("Invalid payload-bytes {}, must be 1-{}", scenario.payload_bytes, MAX_PAYLOAD_BYTES));
    }
    if !(scenario.duration_s.is_finite() && scenario.duration_s > 0.0) {
        return Err(format!("Invalid duration-s {}, must be positive", scenario.duration_s));
    }

    scenario.axes.validate().map_err(|e| e.to_string())?;

    let gateway = &scenario.gateway;
    if !(gateway.shadowing_sigma_db.is_finite() && gateway.shadowing_sigma_db >= 0.0) {
        return Err(format!("Invalid shadowing-sigma-db {}, must be non-negative", gateway.shadowing_sigma_db));
    }
    if gateway.position.z < 1.0 {
        return Err(format!("Gateway antenna height {} m must be at least 1 m", gateway.position.z));
    }
    if let Some(schedule) = &gateway.channel_schedule {
        schedule.validate()?;
    }

    scenario.strategy.validate()?;

    Ok(())
}
