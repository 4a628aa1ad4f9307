//! Physical layer and reference driver.
//!
//! This module provides everything below the adaptation strategies:
//! - Configuration space construction and energy ranking
//! - Time-on-air and energy per transmission
//! - Link budget with shadowing and mobile fading
//! - Same-SF contention with capture at the gateway
//! - Delivery and energy metrics
//!
//! ## Module Organization
//!
//! - `types`: Core data structures (configurations, outcomes, errors)
//! - `signal_calculations`: Radio signal, timing and energy calculations
//! - `geometry`: Positions, velocities and distances
//! - `configuration_space`: Energy-ranked candidate configurations
//! - `propagation`: RSSI and SNR of a device to gateway link
//! - `contention`: In-flight transmissions and collisions
//! - `gateway`: Reception decision combining the above
//! - `metrics`: Run statistics
//! - `network`: Time-ordered driver over a scenario

pub mod configuration_space;
pub mod contention;
pub mod gateway;
pub mod geometry;
pub mod metrics;
pub mod network;
pub mod propagation;
pub mod signal_calculations;
pub mod types;

// Re-export commonly used types
pub use configuration_space::{ConfigurationAxes, ConfigurationSpace, SpaceShape};
pub use gateway::Gateway;
pub use metrics::MetricsAggregator;
pub use network::{Network, RunReport};
pub use types::{CodingRate, DeviceId, EngineError, FailureCause, TransmissionConfiguration, TransmissionOutcome};
