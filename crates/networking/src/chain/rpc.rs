//! JSON-RPC chain client with endpoint rotation and per-call timeouts

use super::ChainClient;
use crate::abi::{IUniswapV2Router, IERC20};
use crate::network::NetworkConfig;
use alloy::network::Ethereum;
use alloy::primitives::{keccak256, Address, B256, U256};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::eth::TransactionRequest;
use alloy::transports::{RpcError, TransportError};
use async_trait::async_trait;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use swapcycle_core::{Error, Result};
use tracing::{debug, info, instrument, warn};
use url::Url;

pub type HttpProvider = RootProvider<Ethereum>;

/// Failures that tell apart a broken endpoint from a node that answered
/// with an error (revert, bad nonce). Only the former rotates endpoints.
trait EndpointError: Display {
    fn answered(&self) -> bool;
}

impl EndpointError for TransportError {
    fn answered(&self) -> bool {
        matches!(self, RpcError::ErrorResp(_))
    }
}

impl EndpointError for alloy::contract::Error {
    fn answered(&self) -> bool {
        match self {
            alloy::contract::Error::TransportError(e) => e.answered(),
            _ => true,
        }
    }
}

/// How a node's refusal of a broadcast relates to the transaction itself
#[derive(Debug, PartialEq, Eq)]
enum Rejection {
    /// The node already holds this exact transaction
    AlreadyKnown,
    /// The nonce is spent, possibly by this transaction via another endpoint
    NonceTooLow,
    Other,
}

fn classify_rejection(message: &str) -> Rejection {
    let message = message.to_ascii_lowercase();
    let known = [
        "already known",
        "known transaction",
        "already imported",
        "transaction already exists",
    ];
    if known.iter().any(|m| message.contains(m)) {
        Rejection::AlreadyKnown
    } else if message.contains("nonce too low") {
        Rejection::NonceTooLow
    } else {
        Rejection::Other
    }
}

struct Endpoint {
    url: Url,
    provider: HttpProvider,
}

/// Talks to one network through an ordered list of HTTP endpoints.
///
/// Every call is bounded by `timeout`. A failing or slow endpoint is skipped
/// and the next one tried; the last endpoint that answered is tried first
/// next time. When every endpoint fails the call returns `RpcUnavailable`.
pub struct RpcChainClient {
    network: String,
    chain_id: u64,
    endpoints: Vec<Endpoint>,
    current: AtomicUsize,
    timeout: Duration,
    closed: AtomicBool,
}

impl RpcChainClient {
    /// Build the client without touching the network. Malformed URLs are skipped.
    pub fn new(config: &NetworkConfig, timeout: Duration) -> Result<Self> {
        let endpoints: Vec<Endpoint> = config
            .rpc_endpoints
            .iter()
            .filter_map(|raw| match Url::parse(raw) {
                Ok(url) => Some(Endpoint {
                    provider: RootProvider::new_http(url.clone()),
                    url,
                }),
                Err(e) => {
                    warn!(network = %config.name, endpoint = %raw, "Skipping invalid RPC URL: {}", e);
                    None
                }
            })
            .collect();

        if endpoints.is_empty() {
            return Err(Error::RpcUnavailable(format!(
                "no usable RPC endpoints configured for {}",
                config.name
            )));
        }

        Ok(Self {
            network: config.name.clone(),
            chain_id: config.chain_id,
            endpoints,
            current: AtomicUsize::new(0),
            timeout,
            closed: AtomicBool::new(false),
        })
    }

    /// Probe the endpoints and check they serve the expected chain
    #[instrument(skip(self), fields(network = %self.network))]
    pub async fn connect(&self) -> Result<()> {
        self.closed.store(false, Ordering::SeqCst);
        let reported = self
            .with_fallback("eth_chainId", |p| async move { p.get_chain_id().await })
            .await?;

        if reported != self.chain_id {
            return Err(Error::UnknownNetwork(format!(
                "{} endpoints report chain {}, expected {}",
                self.network, reported, self.chain_id
            )));
        }

        info!(
            network = %self.network,
            endpoint = %self.current_endpoint(),
            "Connected to chain {}",
            reported
        );
        Ok(())
    }

    /// Start again from the first endpoint and re-probe
    pub async fn reconnect(&self) -> Result<()> {
        self.current.store(0, Ordering::SeqCst);
        self.connect().await
    }

    /// Refuse further calls until `connect` or `reconnect`
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        info!(network = %self.network, "Chain client closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn current_endpoint(&self) -> &Url {
        let idx = self.current.load(Ordering::Relaxed) % self.endpoints.len();
        &self.endpoints[idx].url
    }

    async fn with_fallback<T, E, F, Fut>(&self, op: &'static str, call: F) -> Result<T>
    where
        F: Fn(HttpProvider) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: EndpointError,
    {
        if self.is_closed() {
            return Err(Error::RpcUnavailable(format!(
                "{} client is closed",
                self.network
            )));
        }

        let count = self.endpoints.len();
        let start = self.current.load(Ordering::Relaxed) % count;
        let mut last_error = String::new();

        for attempt in 0..count {
            let idx = (start + attempt) % count;
            let endpoint = &self.endpoints[idx];

            match tokio::time::timeout(self.timeout, call(endpoint.provider.clone())).await {
                Ok(Ok(value)) => {
                    if idx != start {
                        self.current.store(idx, Ordering::Relaxed);
                        info!(network = %self.network, endpoint = %endpoint.url, "Switched RPC endpoint");
                    }
                    return Ok(value);
                }
                Ok(Err(e)) if e.answered() => {
                    debug!(network = %self.network, op, "Node rejected call: {}", e);
                    return Err(Error::TransactionFailed(format!("{}: {}", op, e)));
                }
                Ok(Err(e)) => {
                    warn!(network = %self.network, endpoint = %endpoint.url, op, "RPC call failed: {}", e);
                    last_error = e.to_string();
                }
                Err(_) => {
                    warn!(network = %self.network, endpoint = %endpoint.url, op, "RPC call timed out");
                    last_error = format!("timed out after {:?}", self.timeout);
                }
            }
        }

        Err(Error::RpcUnavailable(format!(
            "{} failed on all {} endpoints of {}: {}",
            op, count, self.network, last_error
        )))
    }
}

impl RpcChainClient {
    async fn transaction_known(&self, hash: B256) -> bool {
        self.with_fallback("eth_getTransactionByHash", move |p| async move {
            p.get_transaction_by_hash(hash).await.map(|tx| tx.is_some())
        })
        .await
        .unwrap_or(false)
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn gas_price(&self) -> Result<u128> {
        self.with_fallback("eth_gasPrice", |p| async move { p.get_gas_price().await })
            .await
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64> {
        self.with_fallback("eth_getTransactionCount", move |p| async move {
            p.get_transaction_count(address).pending().await
        })
        .await
    }

    async fn native_balance(&self, address: Address) -> Result<U256> {
        self.with_fallback("eth_getBalance", move |p| async move {
            p.get_balance(address).await
        })
        .await
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        self.with_fallback("balanceOf", move |p| async move {
            IERC20::new(token, p).balanceOf(owner).call().await
        })
        .await
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        self.with_fallback("allowance", move |p| async move {
            IERC20::new(token, p).allowance(owner, spender).call().await
        })
        .await
    }

    #[instrument(skip(self, path), fields(network = %self.network))]
    async fn amounts_out(
        &self,
        router: Address,
        amount_in: U256,
        path: Vec<Address>,
    ) -> Result<Vec<U256>> {
        self.with_fallback("getAmountsOut", move |p| {
            let path = path.clone();
            async move {
                IUniswapV2Router::new(router, p)
                    .getAmountsOut(amount_in, path)
                    .call()
                    .await
            }
        })
        .await
    }

    async fn estimate_gas(&self, request: TransactionRequest) -> Result<u64> {
        self.with_fallback("eth_estimateGas", move |p| {
            let request = request.clone();
            async move { p.estimate_gas(request).await }
        })
        .await
    }

    /// A broadcast that timed out on one endpoint may still have reached
    /// the network; a later endpoint reporting it as known counts as sent.
    #[instrument(skip(self, raw), fields(network = %self.network))]
    async fn send_raw_transaction(&self, raw: Vec<u8>) -> Result<B256> {
        let hash = keccak256(&raw);
        let sent = self
            .with_fallback("eth_sendRawTransaction", move |p| {
                let raw = raw.clone();
                async move {
                    p.send_raw_transaction(&raw)
                        .await
                        .map(|pending| *pending.tx_hash())
                }
            })
            .await;

        match sent {
            Err(Error::TransactionFailed(message)) => match classify_rejection(&message) {
                Rejection::AlreadyKnown => {
                    info!(network = %self.network, tx = %hash, "Node already has the transaction");
                    Ok(hash)
                }
                Rejection::NonceTooLow if self.transaction_known(hash).await => {
                    info!(network = %self.network, tx = %hash, "Transaction already broadcast");
                    Ok(hash)
                }
                _ => Err(Error::TransactionFailed(message)),
            },
            other => other,
        }
    }

    async fn receipt_status(&self, hash: B256) -> Result<Option<bool>> {
        self.with_fallback("eth_getTransactionReceipt", move |p| async move {
            p.get_transaction_receipt(hash)
                .await
                .map(|receipt| receipt.map(|r| r.status()))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network(endpoints: &[&str]) -> NetworkConfig {
        NetworkConfig {
            rpc_endpoints: endpoints.iter().map(|s| s.to_string()).collect(),
            ..NetworkConfig::core()
        }
    }

    #[test]
    fn test_invalid_urls_skipped() {
        let client = RpcChainClient::new(
            &network(&["not a url", "http://127.0.0.1:1"]),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(client.current_endpoint().as_str(), "http://127.0.0.1:1/");
        assert_eq!(client.chain_id(), 1116);
    }

    #[test]
    fn test_duplicate_broadcast_rejections() {
        assert_eq!(
            classify_rejection("eth_sendRawTransaction: server returned an error response: error code -32000: already known"),
            Rejection::AlreadyKnown
        );
        assert_eq!(
            classify_rejection("Known transaction: 0x5e2f"),
            Rejection::AlreadyKnown
        );
        assert_eq!(
            classify_rejection("error code -32000: nonce too low: next nonce 8, tx nonce 7"),
            Rejection::NonceTooLow
        );
        assert_eq!(
            classify_rejection("error code -32000: insufficient funds for gas * price + value"),
            Rejection::Other
        );
        assert_eq!(
            classify_rejection("replacement transaction underpriced"),
            Rejection::Other
        );
    }

    #[test]
    fn test_no_endpoints_is_unavailable() {
        let result = RpcChainClient::new(&network(&["::"]), Duration::from_secs(1));
        assert!(matches!(result, Err(Error::RpcUnavailable(_))));
    }

    #[tokio::test]
    async fn test_closed_client_refuses_calls() {
        let client =
            RpcChainClient::new(&network(&["http://127.0.0.1:1"]), Duration::from_secs(1))
                .unwrap();
        client.close();
        assert!(client.is_closed());
        assert!(matches!(
            client.gas_price().await,
            Err(Error::RpcUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_all_endpoints_down_is_unavailable() {
        let client = RpcChainClient::new(
            &network(&["http://127.0.0.1:1", "http://127.0.0.1:2"]),
            Duration::from_secs(2),
        )
        .unwrap();
        let err = client.gas_price().await.unwrap_err();
        match err {
            Error::RpcUnavailable(msg) => assert!(msg.contains("all 2 endpoints")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
