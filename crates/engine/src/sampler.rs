//! Organic-looking trade sizes

use rand::Rng;
use std::f64::consts::PI;
use swapcycle_core::{round_to_6_decimals, Error, Result};

/// Rejection-sampling attempts before falling back to clamping
const MAX_ATTEMPTS: u32 = 1_000;

pub struct TradeAmountSampler;

impl TradeAmountSampler {
    /// Draw a size in `[min, max]` from a normal distribution around a
    /// slightly shifted midpoint, rounded to 6 decimals.
    pub fn sample<R: Rng + ?Sized>(
        min: f64,
        max: f64,
        variability: f64,
        rng: &mut R,
    ) -> Result<f64> {
        if !(min.is_finite() && max.is_finite()) || min <= 0.0 || min > max {
            return Err(Error::InvalidTradeParameters(format!(
                "amount bounds must satisfy 0 < min <= max (min {}, max {})",
                min, max
            )));
        }
        if !variability.is_finite() || variability < 0.0 {
            return Err(Error::InvalidTradeParameters(format!(
                "variability must be non-negative, got {}",
                variability
            )));
        }
        if min == max {
            return Ok(min);
        }

        let mean = (max + min) / 2.0 * rng.gen_range(0.9..1.1);
        let std_dev = (max - min) / 6.0;

        for _ in 0..MAX_ATTEMPTS {
            let value = mean + standard_normal(rng) * std_dev * variability;
            if (min..=max).contains(&value) {
                return Ok(round_to_6_decimals(value).clamp(min, max));
            }
        }

        Ok(round_to_6_decimals(mean).clamp(min, max))
    }
}

/// Box-Muller transform
fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // (0, 1] keeps ln() finite
    let u1 = 1.0 - rng.gen::<f64>();
    let u2 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}
