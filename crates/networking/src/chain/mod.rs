//! Chain access as an injected capability
//!
//! `ChainClient` is everything the swap executor needs from a node. The
//! production implementation is [`RpcChainClient`]; tests substitute a fake.

mod rpc;

pub use rpc::RpcChainClient;

use crate::network::NetworkConfig;
use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::eth::TransactionRequest;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use swapcycle_core::{Error, Result};

#[async_trait]
pub trait ChainClient: Send + Sync {
    fn chain_id(&self) -> u64;

    /// Current network gas price in wei, unadjusted
    async fn gas_price(&self) -> Result<u128>;

    /// Transaction count including pending transactions
    async fn pending_nonce(&self, address: Address) -> Result<u64>;

    async fn native_balance(&self, address: Address) -> Result<U256>;

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256>;

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256>;

    /// Router quote for `amount_in` along `path`
    async fn amounts_out(
        &self,
        router: Address,
        amount_in: U256,
        path: Vec<Address>,
    ) -> Result<Vec<U256>>;

    async fn estimate_gas(&self, request: TransactionRequest) -> Result<u64>;

    /// Broadcast a signed transaction, returning its hash
    async fn send_raw_transaction(&self, raw: Vec<u8>) -> Result<B256>;

    /// `None` while the transaction is not yet mined, else its success flag
    async fn receipt_status(&self, hash: B256) -> Result<Option<bool>>;
}

/// A configured network with the client that talks to it
#[derive(Clone)]
pub struct NetworkHandle {
    pub config: NetworkConfig,
    pub client: Arc<dyn ChainClient>,
}

/// Network name to handle lookup
#[derive(Clone, Default)]
pub struct ChainRegistry {
    networks: HashMap<String, NetworkHandle>,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, config: NetworkConfig, client: Arc<dyn ChainClient>) {
        self.networks
            .insert(config.name.clone(), NetworkHandle { config, client });
    }

    pub fn get(&self, name: &str) -> Result<&NetworkHandle> {
        self.networks
            .get(name)
            .ok_or_else(|| Error::UnknownNetwork(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.networks.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}
