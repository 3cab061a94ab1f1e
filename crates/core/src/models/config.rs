//! Per-wallet trading policy

use crate::{Error, Percent, Result, TradeDirection};
use serde::{Deserialize, Serialize};

/// Default network key when none is configured
pub const DEFAULT_NETWORK: &str = "core";

/// An (hours, minutes, seconds) interval between operations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalSpec {
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl IntervalSpec {
    pub fn new(hours: u32, minutes: u32, seconds: u32) -> Self {
        Self {
            hours,
            minutes,
            seconds,
        }
    }

    pub fn total_seconds(&self) -> u64 {
        self.hours as u64 * 3600 + self.minutes as u64 * 60 + self.seconds as u64
    }

    pub fn total_millis(&self) -> u64 {
        self.total_seconds() * 1000
    }
}

/// Trading policy for a single wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletConfig {
    pub wallet_id: i64,
    pub min_buy_amount: f64,
    pub max_buy_amount: f64,
    /// Percent, (0, 100]
    pub buy_slippage: f64,
    pub buy_interval: IntervalSpec,
    pub min_sell_amount: f64,
    pub max_sell_amount: f64,
    pub sell_slippage: f64,
    pub sell_interval: IntervalSpec,
    /// Target token contract address; empty until the operator picks one
    #[serde(default)]
    pub selected_token: String,
    #[serde(default = "default_network")]
    pub selected_network: String,
    /// Router address; empty means the network's default router
    #[serde(default)]
    pub selected_dex: String,
}

fn default_network() -> String {
    DEFAULT_NETWORK.to_string()
}

impl WalletConfig {
    /// Operator defaults for a freshly added wallet
    pub fn default_for(wallet_id: i64) -> Self {
        Self {
            wallet_id,
            min_buy_amount: 0.01,
            max_buy_amount: 0.1,
            buy_slippage: 1.0,
            buy_interval: IntervalSpec::new(0, 1, 0),
            min_sell_amount: 0.01,
            max_sell_amount: 0.1,
            sell_slippage: 1.0,
            sell_interval: IntervalSpec::new(0, 1, 0),
            selected_token: String::new(),
            selected_network: default_network(),
            selected_dex: String::new(),
        }
    }

    pub fn has_token(&self) -> bool {
        !self.selected_token.trim().is_empty()
    }

    /// (min, max) amount bounds for a direction
    pub fn bounds(&self, direction: TradeDirection) -> (f64, f64) {
        match direction {
            TradeDirection::Buy => (self.min_buy_amount, self.max_buy_amount),
            TradeDirection::Sell => (self.min_sell_amount, self.max_sell_amount),
        }
    }

    pub fn slippage(&self, direction: TradeDirection) -> Percent {
        match direction {
            TradeDirection::Buy => Percent::new(self.buy_slippage),
            TradeDirection::Sell => Percent::new(self.sell_slippage),
        }
    }

    pub fn interval(&self, direction: TradeDirection) -> IntervalSpec {
        match direction {
            TradeDirection::Buy => self.buy_interval,
            TradeDirection::Sell => self.sell_interval,
        }
    }

    /// Check the policy before it is allowed to drive trades.
    ///
    /// A missing token is reported as `TokenNotSelected`; every other
    /// violation as `InvalidTradeParameters`.
    pub fn validate(&self) -> Result<()> {
        if !self.has_token() {
            return Err(Error::TokenNotSelected(self.wallet_id));
        }
        if !is_address(self.selected_token.trim()) {
            return Err(Error::InvalidTradeParameters(format!(
                "selected token is not an address: {}",
                self.selected_token
            )));
        }
        if !self.selected_dex.is_empty() && !is_address(&self.selected_dex) {
            return Err(Error::InvalidTradeParameters(format!(
                "selected dex is not an address: {}",
                self.selected_dex
            )));
        }

        for direction in [TradeDirection::Buy, TradeDirection::Sell] {
            let (min, max) = self.bounds(direction);
            if !(min.is_finite() && max.is_finite()) || min <= 0.0 || max <= 0.0 {
                return Err(Error::InvalidTradeParameters(format!(
                    "{} bounds must be positive (min {}, max {})",
                    direction, min, max
                )));
            }
            if min > max {
                return Err(Error::InvalidTradeParameters(format!(
                    "{} min {} exceeds max {}",
                    direction, min, max
                )));
            }

            let slippage = self.slippage(direction).as_f64();
            if !(slippage > 0.0 && slippage <= 100.0) {
                return Err(Error::InvalidTradeParameters(format!(
                    "{} slippage {}% outside (0, 100]",
                    direction, slippage
                )));
            }
        }

        Ok(())
    }
}

/// `0x` followed by 40 hex digits
pub fn is_address(value: &str) -> bool {
    value
        .strip_prefix("0x")
        .map(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> WalletConfig {
        let mut config = WalletConfig::default_for(7);
        config.selected_token = "0x892CCdD2624ef09Ca5814661c566316253353820".to_string();
        config
    }

    #[test]
    fn test_interval_seconds() {
        let interval = IntervalSpec::new(1, 2, 3);
        assert_eq!(interval.total_seconds(), 3723);
        assert_eq!(interval.total_millis(), 3_723_000);
    }

    #[test]
    fn test_defaults_need_token() {
        let config = WalletConfig::default_for(7);
        assert!(matches!(config.validate(), Err(Error::TokenNotSelected(7))));
        assert!(configured().validate().is_ok());
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let mut config = configured();
        config.min_sell_amount = 2.0;
        config.max_sell_amount = 1.0;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidTradeParameters(_))
        ));
    }

    #[test]
    fn test_non_positive_bounds_rejected() {
        let mut config = configured();
        config.min_buy_amount = 0.0;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidTradeParameters(_))
        ));
    }

    #[test]
    fn test_slippage_range() {
        let mut config = configured();
        config.buy_slippage = 0.0;
        assert!(config.validate().is_err());
        config.buy_slippage = 100.0;
        assert!(config.validate().is_ok());
        config.sell_slippage = 100.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_token_must_be_address() {
        let mut config = configured();
        config.selected_token = "CORE".to_string();
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidTradeParameters(_))
        ));
        assert!(!is_address("0x1234"));
    }

    #[test]
    fn test_direction_accessors() {
        let config = configured();
        assert_eq!(config.bounds(TradeDirection::Sell), (0.01, 0.1));
        assert_eq!(config.interval(TradeDirection::Buy).total_seconds(), 60);
    }
}
