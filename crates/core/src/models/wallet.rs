//! Wallet identity, lifecycle flags and running metrics

use crate::TradeDirection;
use serde::{Deserialize, Serialize};

/// Monotonic per-wallet counters updated after each attempted operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletMetrics {
    pub total_buys: u64,
    pub total_sells: u64,
    pub total_volume: f64,
    pub error_count: u64,
}

impl WalletMetrics {
    /// Count a submitted swap
    pub fn record_success(&mut self, direction: TradeDirection, amount: f64) {
        match direction {
            TradeDirection::Buy => self.total_buys += 1,
            TradeDirection::Sell => self.total_sells += 1,
        }
        self.total_volume += amount;
    }

    pub fn record_error(&mut self) {
        self.error_count += 1;
    }
}

/// A managed wallet (the encrypted signing key is stored separately)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub id: i64,
    /// Checksummed chain address, unique
    pub address: String,
    pub name: String,
    /// Whether the coordinator should schedule this wallet
    pub active: bool,
    pub is_imported: bool,
    pub metrics: WalletMetrics,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}
