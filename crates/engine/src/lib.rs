//! Swapcycle Engine - scheduling, sampling, swap execution and the tick coordinator

pub mod balances;
pub mod coordinator;
pub mod cycle;
pub mod interval;
pub mod keys;
pub mod sampler;
pub mod swap;
pub mod wallets;

#[cfg(test)]
mod testing;

pub use balances::{wallet_balances, WalletBalances};
pub use coordinator::{
    Coordinator, CoordinatorSettings, CoordinatorState, CoordinatorStatus, TickOutcome,
    TickReport, WalletOutcome,
};
pub use cycle::{CycleGenerator, NextOperation};
pub use interval::IntervalScheduler;
pub use keys::{EncryptedKeyProvider, SigningKeyProvider};
pub use sampler::TradeAmountSampler;
pub use swap::{SwapExecutor, SwapOrder, SwapSettings, SwapState};
pub use wallets::{WalletProgress, WalletService};
