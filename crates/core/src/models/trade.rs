//! Trade-related models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trade direction (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    Buy,
    Sell,
}

impl TradeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeDirection::Buy => "buy",
            TradeDirection::Sell => "sell",
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, TradeDirection::Buy)
    }
}

impl fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeDirection {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(TradeDirection::Buy),
            "sell" => Ok(TradeDirection::Sell),
            other => Err(crate::Error::InvalidData(format!(
                "Unknown trade direction: {}",
                other
            ))),
        }
    }
}

/// Outcome of a submitted swap
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapReceipt {
    pub direction: TradeDirection,
    /// Decimal amount traded (native for buys, token for sells)
    pub amount: f64,
    /// 0x-prefixed transaction hash of the swap
    pub tx_hash: String,
    /// Approval transaction sent before a sell, if one was needed
    #[serde(default)]
    pub approval_tx_hash: Option<String>,
    /// Whether a successful receipt was seen before the confirmation timeout
    pub confirmed: bool,
}

/// Trade history row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: i64,
    pub wallet_id: i64,
    pub direction: TradeDirection,
    pub amount: f64,
    pub token_address: String,
    pub tx_hash: String,
    pub success: bool,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_roundtrip_str() {
        assert_eq!("buy".parse::<TradeDirection>().unwrap(), TradeDirection::Buy);
        assert_eq!(TradeDirection::Sell.to_string(), "sell");
        assert!("hold".parse::<TradeDirection>().is_err());
    }

    #[test]
    fn test_direction_serde_tags() {
        let json = serde_json::to_string(&vec![TradeDirection::Buy, TradeDirection::Sell]).unwrap();
        assert_eq!(json, r#"["buy","sell"]"#);
    }
}
