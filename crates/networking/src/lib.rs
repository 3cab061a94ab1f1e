//! Swapcycle Networking - chain RPC access, contract bindings and price lookups

pub mod abi;
pub mod chain;
pub mod gas;
pub mod network;
pub mod price;
pub mod units;

pub use chain::{ChainClient, ChainRegistry, NetworkHandle, RpcChainClient};
pub use network::NetworkConfig;
pub use price::PriceFeed;
