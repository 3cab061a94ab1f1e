//! Durable scheduling state for a wallet

use crate::TradeDirection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operations in one cycle
pub const CYCLE_LENGTH: u32 = 10;
pub const BUYS_PER_CYCLE: u32 = 5;
pub const SELLS_PER_CYCLE: u32 = 5;

/// One batch of shuffled operations and its remaining counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cycle {
    pub remaining_buys: u32,
    pub remaining_sells: u32,
    pub operations_left: u32,
    pub operations: Vec<TradeDirection>,
}

impl Cycle {
    pub fn is_exhausted(&self) -> bool {
        self.operations_left == 0
    }

    /// Number of operations already consumed, which is also the index of the next one
    pub fn operation_index(&self) -> usize {
        CYCLE_LENGTH.saturating_sub(self.operations_left) as usize
    }

    /// Direction the next consumed slot will have, without consuming it
    pub fn next_direction(&self) -> Option<TradeDirection> {
        if self.is_exhausted() {
            return None;
        }
        self.operations.get(self.operation_index()).copied()
    }

    /// Whether the counters agree with each other and with the operation list
    pub fn is_consistent(&self) -> bool {
        if self.operations.len() != CYCLE_LENGTH as usize
            || self.operations_left > CYCLE_LENGTH
            || self.remaining_buys + self.remaining_sells != self.operations_left
        {
            return false;
        }
        let tail = &self.operations[self.operation_index()..];
        let buys = tail.iter().filter(|d| d.is_buy()).count() as u32;
        buys == self.remaining_buys
    }
}

/// Per-wallet strategy record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletStrategy {
    pub wallet_id: i64,
    pub current_cycle: Cycle,
    pub consecutive_buys: u32,
    pub consecutive_sells: u32,
    /// [0.3, 0.7), resampled on every cycle rollover
    pub amount_variability: f64,
    /// [0.2, 0.5), resampled on every cycle rollover
    pub time_variability: f64,
    pub base_success_prob: f64,
    pub market_bias: f64,
    pub last_operation_time: Option<DateTime<Utc>>,
}

impl WalletStrategy {
    /// Progress through the current cycle, for display
    pub fn progress(&self) -> CycleProgress {
        let cycle = &self.current_cycle;
        CycleProgress {
            completed: CYCLE_LENGTH - cycle.operations_left.min(CYCLE_LENGTH),
            total: CYCLE_LENGTH,
            remaining_buys: cycle.remaining_buys,
            remaining_sells: cycle.remaining_sells,
            next_operation: cycle.next_direction(),
            last_operation_time: self.last_operation_time,
        }
    }
}

/// Read-only view of a wallet's cycle for dashboards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleProgress {
    pub completed: u32,
    pub total: u32,
    pub remaining_buys: u32,
    pub remaining_sells: u32,
    pub next_operation: Option<TradeDirection>,
    pub last_operation_time: Option<DateTime<Utc>>,
}
