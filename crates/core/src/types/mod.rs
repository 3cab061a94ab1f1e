//! Shared type definitions and newtypes

use serde::{Deserialize, Serialize};

/// Percentage value in (0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Percent(pub f64);

impl Percent {
    pub fn new(value: f64) -> Self {
        Percent(value)
    }

    pub fn as_f64(&self) -> f64 {
        self.0
    }

    /// Whole basis points, e.g. 1% -> 100, 0.5% -> 50
    pub fn basis_points(&self) -> u64 {
        (self.0 * 100.0).round().clamp(0.0, 10_000.0) as u64
    }
}

/// Round a float to 6 decimal places
pub fn round_to_6_decimals(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

/// Shorten an address for operator-facing log lines ("0x1234ab...")
pub fn short_address(address: &str) -> String {
    let prefix: String = address.chars().take(8).collect();
    format!("{}...", prefix)
}
