//! Conversions between decimal amounts and 18-decimal base units

use alloy::primitives::utils::{format_ether, parse_ether};
use alloy::primitives::U256;
use swapcycle_core::{Error, Result};

/// Decimal amount to wei (18 decimals)
pub fn to_wei(amount: f64) -> Result<U256> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(Error::InvalidTradeParameters(format!(
            "amount must be a non-negative number, got {}",
            amount
        )));
    }
    parse_ether(&format!("{:.18}", amount))
        .map_err(|e| Error::InvalidTradeParameters(format!("amount {}: {}", amount, e)))
}

/// Wei to a decimal amount, for display and balance comparisons in logs
pub fn from_wei(value: U256) -> f64 {
    format_ether(value).parse().unwrap_or(f64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_wei() {
        assert_eq!(to_wei(1.0).unwrap(), U256::from(10u128.pow(18)));
        assert_eq!(to_wei(0.01).unwrap(), U256::from(10u128.pow(16)));
        assert!(to_wei(-1.0).is_err());
        assert!(to_wei(f64::NAN).is_err());
    }

    #[test]
    fn test_from_wei() {
        assert_eq!(from_wei(U256::from(25u128 * 10u128.pow(16))), 0.25);
        assert_eq!(from_wei(U256::ZERO), 0.0);
    }
}
