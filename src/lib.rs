//! LoRa link-adaptation decision engine.
//!
//! The crate chooses transmission parameters (spreading factor, power, channel,
//! coding rate) for simulated LoRa end devices, decides whether the gateway
//! receives each uplink, and feeds the outcome back into per-device learning
//! state.
//!
//! ## Module Organization
//!
//! - `simulation`: physical layer (energy, propagation, contention), the
//!   gateway that folds them together, metrics and a reference event driver
//! - `strategy`: rate adaptation algorithms (ADR-Lite bisection, UCB1-tuned,
//!   epsilon-greedy, tug-of-war, SNR-target ADR and baselines)
//! - `common`: scenario loading and validation
//!
//! All randomness flows through a single seeded [`SimRng`] owned by the caller.

pub mod common;
pub mod simulation;
pub mod strategy;

/// Random number generator threaded through every stochastic call of a run.
pub type SimRng = rand::rngs::StdRng;
