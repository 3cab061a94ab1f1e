//! Scriptable chain and fixtures for engine tests

use crate::swap::SwapSettings;
use crate::wallets::WalletService;
use alloy::consensus::TxEnvelope;
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::eth::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use swapcycle_core::{Error, Result};
use swapcycle_networking::gas::GWEI;
use swapcycle_networking::units::to_wei;
use swapcycle_networking::ChainClient;
use swapcycle_persistence::{Database, KeyEncryptor};

/// Well-known development key (first hardhat account)
pub const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

pub fn test_signer() -> PrivateKeySigner {
    TEST_KEY.parse().unwrap()
}

pub fn fast_swap_settings() -> SwapSettings {
    SwapSettings {
        approval_settle: Duration::ZERO,
        confirmation_timeout: Duration::from_millis(50),
        receipt_poll_interval: Duration::from_millis(10),
        ..SwapSettings::default()
    }
}

pub async fn wallet_service() -> (WalletService, Arc<Database>) {
    let db = Arc::new(Database::connect_in_memory().await.unwrap());
    let encryptor = Arc::new(KeyEncryptor::from_password("test").unwrap());
    (WalletService::new(db.clone(), encryptor), db)
}

struct ChainState {
    native_balance: U256,
    token_balance: U256,
    allowance: U256,
    quote_out: U256,
    gas_price: u128,
    gas_estimate: u64,
    gas_queries_fail: bool,
    unavailable: bool,
    grant_allowance_on_send: bool,
    receipt: Option<bool>,
    sent: Vec<TxEnvelope>,
}

/// In-memory `ChainClient` that records every submitted transaction
pub struct FakeChain {
    state: Mutex<ChainState>,
}

impl FakeChain {
    pub const TOKEN: &'static str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
    pub const CHAIN_ID: u64 = 1116;

    /// Plenty of everything, unlimited allowance, quote of 1000 wei
    pub fn funded() -> Self {
        Self {
            state: Mutex::new(ChainState {
                native_balance: to_wei(10.0).unwrap(),
                token_balance: to_wei(10.0).unwrap(),
                allowance: U256::MAX,
                quote_out: U256::from(1000u64),
                gas_price: 30 * GWEI,
                gas_estimate: 150_000,
                gas_queries_fail: false,
                unavailable: false,
                grant_allowance_on_send: false,
                receipt: Some(true),
                sent: Vec::new(),
            }),
        }
    }

    pub fn set_native_balance(&self, value: U256) {
        self.state.lock().unwrap().native_balance = value;
    }

    pub fn set_token_balance(&self, value: U256) {
        self.state.lock().unwrap().token_balance = value;
    }

    pub fn set_allowance(&self, value: U256) {
        self.state.lock().unwrap().allowance = value;
    }

    pub fn set_quote_out(&self, value: U256) {
        self.state.lock().unwrap().quote_out = value;
    }

    pub fn set_receipt(&self, status: Option<bool>) {
        self.state.lock().unwrap().receipt = status;
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().unavailable = unavailable;
    }

    /// Any submitted transaction raises the allowance to the maximum
    pub fn grant_allowance_on_send(&self, grant: bool) {
        self.state.lock().unwrap().grant_allowance_on_send = grant;
    }

    /// Gas price and gas estimation both error
    pub fn fail_gas_queries(&self) {
        self.state.lock().unwrap().gas_queries_fail = true;
    }

    pub fn sent_transactions(&self) -> Vec<TxEnvelope> {
        self.state.lock().unwrap().sent.clone()
    }

    fn read<T>(&self, f: impl FnOnce(&ChainState) -> T) -> Result<T> {
        let state = self.state.lock().unwrap();
        if state.unavailable {
            return Err(Error::RpcUnavailable("fake chain offline".to_string()));
        }
        Ok(f(&state))
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    fn chain_id(&self) -> u64 {
        Self::CHAIN_ID
    }

    async fn gas_price(&self) -> Result<u128> {
        let (fail, price) = self.read(|s| (s.gas_queries_fail, s.gas_price))?;
        if fail {
            return Err(Error::RpcUnavailable("gas price".to_string()));
        }
        Ok(price)
    }

    async fn pending_nonce(&self, _address: Address) -> Result<u64> {
        self.read(|s| s.sent.len() as u64)
    }

    async fn native_balance(&self, _address: Address) -> Result<U256> {
        self.read(|s| s.native_balance)
    }

    async fn token_balance(&self, _token: Address, _owner: Address) -> Result<U256> {
        self.read(|s| s.token_balance)
    }

    async fn allowance(&self, _token: Address, _owner: Address, _spender: Address) -> Result<U256> {
        self.read(|s| s.allowance)
    }

    async fn amounts_out(
        &self,
        _router: Address,
        amount_in: U256,
        _path: Vec<Address>,
    ) -> Result<Vec<U256>> {
        self.read(|s| vec![amount_in, s.quote_out])
    }

    async fn estimate_gas(&self, _request: TransactionRequest) -> Result<u64> {
        let (fail, estimate) = self.read(|s| (s.gas_queries_fail, s.gas_estimate))?;
        if fail {
            return Err(Error::TransactionFailed("execution reverted".to_string()));
        }
        Ok(estimate)
    }

    async fn send_raw_transaction(&self, raw: Vec<u8>) -> Result<B256> {
        let envelope = TxEnvelope::decode_2718(&mut raw.as_slice())
            .map_err(|e| Error::TransactionFailed(e.to_string()))?;
        let hash = *envelope.tx_hash();

        let mut state = self.state.lock().unwrap();
        if state.unavailable {
            return Err(Error::RpcUnavailable("fake chain offline".to_string()));
        }
        if state.grant_allowance_on_send {
            state.allowance = U256::MAX;
        }
        state.sent.push(envelope);
        Ok(hash)
    }

    async fn receipt_status(&self, _hash: B256) -> Result<Option<bool>> {
        self.read(|s| s.receipt)
    }
}
