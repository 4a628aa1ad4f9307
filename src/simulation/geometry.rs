//! Positions, velocities and distance calculations.
//!
//! Contains helper functions for:
//! - 3D Euclidean distances between a device and its gateway
//! - Linear motion (`position = initial + velocity · t`)
//! - Mobility classification from speed

use serde::{Deserialize, Serialize};

/// Speed above which a device is treated as mobile (m/s).
pub const MOBILITY_SPEED_THRESHOLD: f64 = 0.05;

/// A point in meters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Position reached after moving with constant `velocity` for `elapsed_s` seconds.
    pub fn advanced(&self, velocity: &Velocity, elapsed_s: f64) -> Position {
        Position {
            x: self.x + velocity.x * elapsed_s,
            y: self.y + velocity.y * elapsed_s,
            z: self.z + velocity.z * elapsed_s,
        }
    }
}

/// A velocity vector in m/s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Velocity {
    pub fn speed(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Whether a device moving with this velocity counts as mobile.
    pub fn is_mobile(&self) -> bool {
        self.speed() > MOBILITY_SPEED_THRESHOLD
    }
}

/// Squared Euclidean distance, for comparisons that do not need the root.
pub fn distance2(a: &Position, b: &Position) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    let dz = a.z - b.z;
    dx * dx + dy * dy + dz * dz
}

/// Euclidean distance in meters.
pub fn distance(a: &Position, b: &Position) -> f64 {
    distance2(a, b).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_three_dimensional() {
        let a = Position::new(0.0, 0.0, 0.0);
        let b = Position::new(3.0, 4.0, 12.0);
        assert_eq!(distance2(&a, &b), 169.0);
        assert_eq!(distance(&a, &b), 13.0);
    }

    #[test]
    fn advanced_moves_linearly() {
        let p = Position::new(10.0, 0.0, 1.5);
        let v = Velocity { x: 1.0, y: -2.0, z: 0.0 };
        assert_eq!(p.advanced(&v, 5.0), Position::new(15.0, -10.0, 1.5));
    }

    #[test]
    fn mobility_threshold_is_strict() {
        assert!(!Velocity::default().is_mobile());
        assert!(!Velocity { x: 0.05, y: 0.0, z: 0.0 }.is_mobile());
        assert!(Velocity { x: 0.04, y: 0.04, z: 0.0 }.is_mobile());
    }
}
