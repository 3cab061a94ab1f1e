//! Data models for wallets, their trading policy and scheduling state

mod config;
mod log;
mod strategy;
mod trade;
mod wallet;

pub use config::*;
pub use log::*;
pub use strategy::*;
pub use trade::*;
pub use wallet::*;
