//! Builds, signs and submits router swaps
//!
//! One call to [`SwapExecutor::execute`] walks
//! `Idle -> ConfirmingBalance -> (Approving) -> Building -> Signing -> Submitting -> Confirmed | Failed`.
//! Nothing here touches wallet metrics or strategy state; the caller applies
//! those once it sees the outcome.

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, Bytes, TxKind, B256, U256};
use alloy::rpc::types::eth::{TransactionInput, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolCall;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use swapcycle_core::{Error, Percent, Result, SwapReceipt, TradeDirection, WalletConfig};
use swapcycle_networking::abi::{IUniswapV2Router, IERC20};
use swapcycle_networking::gas::{adjust_gas_price, FALLBACK_GAS_PRICE};
use swapcycle_networking::network::parse_address;
use swapcycle_networking::units::{from_wei, to_wei};
use swapcycle_networking::{ChainClient, NetworkConfig};
use tracing::{debug, info, warn};

/// Timing and gas defaults for swap submission
#[derive(Debug, Clone)]
pub struct SwapSettings {
    /// Wait after sending an approval before re-reading the allowance
    pub approval_settle: Duration,
    /// Added to the current time for the router deadline
    pub deadline: Duration,
    /// How long to poll for a receipt before reporting the swap unconfirmed
    pub confirmation_timeout: Duration,
    pub receipt_poll_interval: Duration,
    pub swap_gas_limit: u64,
    pub approve_gas_limit: u64,
}

impl Default for SwapSettings {
    fn default() -> Self {
        Self {
            approval_settle: Duration::from_secs(5),
            deadline: Duration::from_secs(20 * 60),
            confirmation_timeout: Duration::from_secs(60),
            receipt_poll_interval: Duration::from_secs(3),
            swap_gas_limit: 700_000,
            approve_gas_limit: 100_000,
        }
    }
}

/// States a single swap passes through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapState {
    Idle,
    ConfirmingBalance,
    Approving,
    Building,
    Signing,
    Submitting,
    Confirmed,
    Failed,
}

/// Everything needed to route one swap
#[derive(Debug, Clone)]
pub struct SwapOrder {
    pub direction: TradeDirection,
    /// Decimal amount: native currency for buys, tokens for sells
    pub amount: f64,
    pub token: Address,
    pub router: Address,
    pub wrapped_native: Address,
    pub slippage: Percent,
    /// Native currency symbol, for messages
    pub native_symbol: String,
}

impl SwapOrder {
    pub fn from_config(
        config: &WalletConfig,
        network: &NetworkConfig,
        direction: TradeDirection,
        amount: f64,
    ) -> Result<Self> {
        Ok(Self {
            direction,
            amount,
            token: parse_address(&config.selected_token, "token")?,
            router: network.router_address(&config.selected_dex)?,
            wrapped_native: network.wrapped_native_address()?,
            slippage: config.slippage(direction),
            native_symbol: network.symbol.clone(),
        })
    }

    fn path(&self) -> Vec<Address> {
        match self.direction {
            TradeDirection::Buy => vec![self.wrapped_native, self.token],
            TradeDirection::Sell => vec![self.token, self.wrapped_native],
        }
    }
}

/// `expected * (10000 - bps) / 10000`, truncating
pub fn min_out(expected: U256, slippage: Percent) -> U256 {
    let bps = slippage.basis_points().min(10_000);
    expected * U256::from(10_000 - bps) / U256::from(10_000u64)
}

struct Progress {
    state: SwapState,
    direction: TradeDirection,
    wallet: Address,
}

impl Progress {
    fn to(&mut self, next: SwapState) {
        debug!(
            wallet = %self.wallet,
            direction = %self.direction,
            "Swap {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }
}

pub struct SwapExecutor {
    settings: SwapSettings,
    /// One lock per sender so nonce reads and submissions never interleave
    address_locks: Mutex<HashMap<Address, Arc<tokio::sync::Mutex<()>>>>,
}

impl SwapExecutor {
    pub fn new(settings: SwapSettings) -> Self {
        Self {
            settings,
            address_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &SwapSettings {
        &self.settings
    }

    fn lock_for(&self, address: Address) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .address_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(address).or_default().clone()
    }

    /// Drop the sender's lock once nobody else holds or waits on it
    fn release(&self, address: Address, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self
            .address_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        drop(lock);
        if locks
            .get(&address)
            .is_some_and(|held| Arc::strong_count(held) == 1)
        {
            locks.remove(&address);
        }
    }

    /// Run one swap to completion. Holds the sender's lock throughout.
    pub async fn execute(
        &self,
        chain: &dyn ChainClient,
        signer: &PrivateKeySigner,
        order: &SwapOrder,
    ) -> Result<SwapReceipt> {
        let wallet = signer.address();
        let lock = self.lock_for(wallet);
        let mut progress = Progress {
            state: SwapState::Idle,
            direction: order.direction,
            wallet,
        };

        let result = {
            let _guard = lock.lock().await;
            match order.direction {
                TradeDirection::Buy => self.buy(chain, signer, order, &mut progress).await,
                TradeDirection::Sell => self.sell(chain, signer, order, &mut progress).await,
            }
        };
        self.release(wallet, lock);

        match &result {
            Ok(receipt) => info!(
                wallet = %wallet,
                tx = %receipt.tx_hash,
                confirmed = receipt.confirmed,
                "{} {} submitted",
                order.direction,
                order.amount
            ),
            Err(e) => {
                progress.to(SwapState::Failed);
                warn!(wallet = %wallet, "{} {} failed: {}", order.direction, order.amount, e);
            }
        }
        result
    }

    async fn buy(
        &self,
        chain: &dyn ChainClient,
        signer: &PrivateKeySigner,
        order: &SwapOrder,
        progress: &mut Progress,
    ) -> Result<SwapReceipt> {
        let from = signer.address();
        let amount_wei = positive_wei(order.amount)?;

        progress.to(SwapState::ConfirmingBalance);
        let balance = chain.native_balance(from).await?;
        if balance < amount_wei {
            return Err(Error::InsufficientBalance {
                asset: order.native_symbol.clone(),
                required: order.amount,
                available: from_wei(balance),
            });
        }

        progress.to(SwapState::Building);
        let path = order.path();
        let expected = self.quote(chain, order.router, amount_wei, path.clone()).await?;
        let call = IUniswapV2Router::swapExactETHForTokensCall {
            amountOutMin: min_out(expected, order.slippage),
            path,
            to: from,
            deadline: self.deadline(),
        };

        let tx_hash = self
            .send(
                chain,
                signer,
                order.router,
                amount_wei,
                call.abi_encode(),
                self.settings.swap_gas_limit,
                progress,
            )
            .await?;

        let confirmed = self.confirm(chain, tx_hash, progress).await?;
        Ok(SwapReceipt {
            direction: TradeDirection::Buy,
            amount: order.amount,
            tx_hash: format!("{:#x}", tx_hash),
            approval_tx_hash: None,
            confirmed,
        })
    }

    async fn sell(
        &self,
        chain: &dyn ChainClient,
        signer: &PrivateKeySigner,
        order: &SwapOrder,
        progress: &mut Progress,
    ) -> Result<SwapReceipt> {
        let from = signer.address();
        let amount_wei = positive_wei(order.amount)?;

        progress.to(SwapState::ConfirmingBalance);
        let balance = chain.token_balance(order.token, from).await?;
        if balance < amount_wei {
            return Err(Error::InsufficientBalance {
                asset: "token".to_string(),
                required: order.amount,
                available: from_wei(balance),
            });
        }

        let allowance = chain.allowance(order.token, from, order.router).await?;
        let approval_tx_hash = if allowance < amount_wei {
            Some(self.approve(chain, signer, order, amount_wei, progress).await?)
        } else {
            None
        };

        progress.to(SwapState::Building);
        let path = order.path();
        let expected = self.quote(chain, order.router, amount_wei, path.clone()).await?;
        let call = IUniswapV2Router::swapExactTokensForETHSupportingFeeOnTransferTokensCall {
            amountIn: amount_wei,
            amountOutMin: min_out(expected, order.slippage),
            path,
            to: from,
            deadline: self.deadline(),
        };

        let tx_hash = self
            .send(
                chain,
                signer,
                order.router,
                U256::ZERO,
                call.abi_encode(),
                self.settings.swap_gas_limit,
                progress,
            )
            .await?;

        let confirmed = self.confirm(chain, tx_hash, progress).await?;
        Ok(SwapReceipt {
            direction: TradeDirection::Sell,
            amount: order.amount,
            tx_hash: format!("{:#x}", tx_hash),
            approval_tx_hash: approval_tx_hash.map(|h| format!("{:#x}", h)),
            confirmed,
        })
    }

    /// Grant the router an unlimited allowance and wait for it to show up
    async fn approve(
        &self,
        chain: &dyn ChainClient,
        signer: &PrivateKeySigner,
        order: &SwapOrder,
        required: U256,
        progress: &mut Progress,
    ) -> Result<B256> {
        let from = signer.address();
        progress.to(SwapState::Approving);

        let call = IERC20::approveCall {
            spender: order.router,
            amount: U256::MAX,
        };
        let hash = self
            .send(
                chain,
                signer,
                order.token,
                U256::ZERO,
                call.abi_encode(),
                self.settings.approve_gas_limit,
                progress,
            )
            .await
            .map_err(|e| match e {
                Error::TransactionFailed(msg) => Error::ApprovalFailed(msg),
                other => other,
            })?;
        info!(wallet = %from, tx = %hash, "Approval sent, waiting {:?}", self.settings.approval_settle);

        tokio::time::sleep(self.settings.approval_settle).await;

        let allowance = chain.allowance(order.token, from, order.router).await?;
        if allowance < required {
            return Err(Error::ApprovalFailed(format!(
                "allowance still {} after approval {:#x}",
                allowance, hash
            )));
        }
        Ok(hash)
    }

    /// Last element of the router quote; zero or missing means no liquidity
    async fn quote(
        &self,
        chain: &dyn ChainClient,
        router: Address,
        amount_in: U256,
        path: Vec<Address>,
    ) -> Result<U256> {
        let amounts = chain
            .amounts_out(router, amount_in, path)
            .await
            .map_err(|e| match e {
                Error::TransactionFailed(msg) => Error::InsufficientLiquidity(msg),
                other => other,
            })?;

        match amounts.last() {
            Some(out) if amounts.len() >= 2 && !out.is_zero() => Ok(*out),
            _ => Err(Error::InsufficientLiquidity(format!(
                "router quoted {:?} for {}",
                amounts, amount_in
            ))),
        }
    }

    async fn gas_price(&self, chain: &dyn ChainClient) -> u128 {
        match chain.gas_price().await {
            Ok(price) => adjust_gas_price(price),
            Err(e) => {
                warn!("Gas price unavailable, using fallback: {}", e);
                FALLBACK_GAS_PRICE
            }
        }
    }

    /// Node estimate with 20% headroom, or the configured limit
    async fn gas_limit(
        &self,
        chain: &dyn ChainClient,
        from: Address,
        to: Address,
        value: U256,
        input: &Bytes,
        fallback: u64,
    ) -> u64 {
        let request = TransactionRequest {
            from: Some(from),
            to: Some(TxKind::Call(to)),
            value: Some(value),
            input: TransactionInput::new(input.clone()),
            ..Default::default()
        };
        match chain.estimate_gas(request).await {
            Ok(estimate) if estimate > 0 => estimate.saturating_mul(12) / 10,
            Ok(_) => fallback,
            Err(e) => {
                debug!("Gas estimation failed, using {}: {}", fallback, e);
                fallback
            }
        }
    }

    /// Nonce, gas, sign and broadcast one transaction
    #[allow(clippy::too_many_arguments)]
    async fn send(
        &self,
        chain: &dyn ChainClient,
        signer: &PrivateKeySigner,
        to: Address,
        value: U256,
        calldata: Vec<u8>,
        fallback_gas: u64,
        progress: &mut Progress,
    ) -> Result<B256> {
        let from = signer.address();
        let input = Bytes::from(calldata);

        let nonce = chain.pending_nonce(from).await?;
        let gas_price = self.gas_price(chain).await;
        let gas_limit = self
            .gas_limit(chain, from, to, value, &input, fallback_gas)
            .await;

        progress.to(SwapState::Signing);
        let mut tx = TxLegacy {
            chain_id: Some(chain.chain_id()),
            nonce,
            gas_price,
            gas_limit,
            to: TxKind::Call(to),
            value,
            input,
        };
        let signature = signer
            .sign_transaction_sync(&mut tx)
            .map_err(|e| Error::TransactionFailed(format!("signing failed: {}", e)))?;
        let envelope: TxEnvelope = tx.into_signed(signature).into();
        let hash = *envelope.tx_hash();

        progress.to(SwapState::Submitting);
        chain.send_raw_transaction(envelope.encoded_2718()).await?;
        debug!(wallet = %from, nonce, gas_price, gas_limit, tx = %hash, "Transaction submitted");
        Ok(hash)
    }

    /// Poll for the receipt. A revert fails the swap; silence past the
    /// timeout leaves it submitted but unconfirmed.
    async fn confirm(
        &self,
        chain: &dyn ChainClient,
        hash: B256,
        progress: &mut Progress,
    ) -> Result<bool> {
        let deadline = tokio::time::Instant::now() + self.settings.confirmation_timeout;

        loop {
            match chain.receipt_status(hash).await {
                Ok(Some(true)) => {
                    progress.to(SwapState::Confirmed);
                    return Ok(true);
                }
                Ok(Some(false)) => {
                    return Err(Error::TransactionFailed(format!(
                        "transaction {:#x} reverted",
                        hash
                    )));
                }
                Ok(None) => {}
                Err(e) => debug!(tx = %hash, "Receipt lookup failed: {}", e),
            }

            if tokio::time::Instant::now() >= deadline {
                warn!(tx = %hash, "No receipt within {:?}, leaving unconfirmed", self.settings.confirmation_timeout);
                return Ok(false);
            }
            tokio::time::sleep(self.settings.receipt_poll_interval).await;
        }
    }

    fn deadline(&self) -> U256 {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        U256::from(now + self.settings.deadline.as_secs())
    }
}

fn positive_wei(amount: f64) -> Result<U256> {
    let wei = to_wei(amount)?;
    if wei.is_zero() {
        return Err(Error::InvalidTradeParameters(format!(
            "trade amount {} rounds to zero",
            amount
        )));
    }
    Ok(wei)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_signer, FakeChain};
    use alloy::consensus::Transaction;

    fn order(direction: TradeDirection, amount: f64) -> SwapOrder {
        let mut config = WalletConfig::default_for(1);
        config.selected_token = FakeChain::TOKEN.to_string();
        SwapOrder::from_config(&config, &NetworkConfig::core(), direction, amount).unwrap()
    }

    fn executor() -> SwapExecutor {
        SwapExecutor::new(crate::testing::fast_swap_settings())
    }

    #[test]
    fn test_min_out_truncates() {
        assert_eq!(min_out(U256::from(1000u64), Percent::new(1.0)), U256::from(990u64));
        assert_eq!(min_out(U256::from(999u64), Percent::new(1.0)), U256::from(989u64));
        assert_eq!(min_out(U256::from(1000u64), Percent::new(100.0)), U256::ZERO);
        assert_eq!(min_out(U256::from(1000u64), Percent::new(0.5)), U256::from(995u64));
    }

    #[tokio::test]
    async fn test_buy_submits_router_call_with_value() {
        let chain = FakeChain::funded();
        let signer = test_signer();
        let o = order(TradeDirection::Buy, 0.01);

        let receipt = executor().execute(&chain, &signer, &o).await.unwrap();
        assert!(receipt.confirmed);
        assert!(receipt.approval_tx_hash.is_none());

        let sent = chain.sent_transactions();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to(), Some(o.router));
        assert_eq!(sent[0].value(), to_wei(0.01).unwrap());
        assert_eq!(sent[0].gas_price(), Some(33 * swapcycle_networking::gas::GWEI));
        assert_eq!(format!("{:#x}", sent[0].tx_hash()), receipt.tx_hash);

        let decoded = IUniswapV2Router::swapExactETHForTokensCall::abi_decode(sent[0].input()).unwrap();
        assert_eq!(decoded.amountOutMin, U256::from(990u64));
        assert_eq!(decoded.path, vec![o.wrapped_native, o.token]);
        assert_eq!(decoded.to, signer.address());
    }

    #[tokio::test]
    async fn test_buy_insufficient_native_balance() {
        let chain = FakeChain::funded();
        chain.set_native_balance(to_wei(0.005).unwrap());

        let err = executor()
            .execute(&chain, &test_signer(), &order(TradeDirection::Buy, 0.01))
            .await
            .unwrap_err();
        assert!(err.is_insufficient_balance());
        assert!(chain.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn test_zero_quote_is_insufficient_liquidity() {
        let chain = FakeChain::funded();
        chain.set_quote_out(U256::ZERO);

        let err = executor()
            .execute(&chain, &test_signer(), &order(TradeDirection::Buy, 0.01))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientLiquidity(_)));
        assert!(chain.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn test_sell_approves_then_swaps() {
        let chain = FakeChain::funded();
        chain.set_allowance(U256::ZERO);
        chain.grant_allowance_on_send(true);
        let o = order(TradeDirection::Sell, 0.02);

        let receipt = executor().execute(&chain, &test_signer(), &o).await.unwrap();
        assert!(receipt.approval_tx_hash.is_some());

        let sent = chain.sent_transactions();
        assert_eq!(sent.len(), 2);

        let approve = IERC20::approveCall::abi_decode(sent[0].input()).unwrap();
        assert_eq!(sent[0].to(), Some(o.token));
        assert_eq!(approve.spender, o.router);
        assert_eq!(approve.amount, U256::MAX);
        // 150k estimate plus headroom
        assert_eq!(sent[0].gas_limit(), 180_000);

        assert_eq!(sent[1].to(), Some(o.router));
        assert_eq!(sent[1].value(), U256::ZERO);
        assert_eq!(sent[1].nonce(), sent[0].nonce() + 1);
        let swap = IUniswapV2Router::swapExactTokensForETHSupportingFeeOnTransferTokensCall::abi_decode(
            sent[1].input(),
        )
        .unwrap();
        assert_eq!(swap.amountIn, to_wei(0.02).unwrap());
        assert_eq!(swap.path, vec![o.token, o.wrapped_native]);
    }

    #[tokio::test]
    async fn test_sell_approval_that_never_lands() {
        let chain = FakeChain::funded();
        chain.set_allowance(U256::ZERO);
        chain.grant_allowance_on_send(false);

        let err = executor()
            .execute(&chain, &test_signer(), &order(TradeDirection::Sell, 0.02))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ApprovalFailed(_)));
        assert_eq!(chain.sent_transactions().len(), 1);
    }

    #[tokio::test]
    async fn test_sell_insufficient_token_balance() {
        let chain = FakeChain::funded();
        chain.set_token_balance(to_wei(0.01).unwrap());

        let err = executor()
            .execute(&chain, &test_signer(), &order(TradeDirection::Sell, 0.02))
            .await
            .unwrap_err();
        match err {
            Error::InsufficientBalance { asset, .. } => assert_eq!(asset, "token"),
            other => panic!("unexpected {other}"),
        }
    }

    #[tokio::test]
    async fn test_gas_fallbacks() {
        let chain = FakeChain::funded();
        chain.fail_gas_queries();

        executor()
            .execute(&chain, &test_signer(), &order(TradeDirection::Buy, 0.01))
            .await
            .unwrap();
        let sent = chain.sent_transactions();
        assert_eq!(sent[0].gas_price(), Some(FALLBACK_GAS_PRICE));
        assert_eq!(sent[0].gas_limit(), 700_000);
    }

    #[tokio::test]
    async fn test_reverted_receipt_fails() {
        let chain = FakeChain::funded();
        chain.set_receipt(Some(false));

        let err = executor()
            .execute(&chain, &test_signer(), &order(TradeDirection::Buy, 0.01))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TransactionFailed(_)));
    }

    #[tokio::test]
    async fn test_missing_receipt_is_unconfirmed_success() {
        let chain = FakeChain::funded();
        chain.set_receipt(None);

        let receipt = executor()
            .execute(&chain, &test_signer(), &order(TradeDirection::Buy, 0.01))
            .await
            .unwrap();
        assert!(!receipt.confirmed);
    }

    #[tokio::test]
    async fn test_rpc_outage_propagates() {
        let chain = FakeChain::funded();
        chain.set_unavailable(true);

        let err = executor()
            .execute(&chain, &test_signer(), &order(TradeDirection::Buy, 0.01))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RpcUnavailable(_)));
    }

    #[tokio::test]
    async fn test_sender_lock_released_after_swap() {
        let chain = FakeChain::funded();
        let executor = executor();
        let signer = test_signer();

        executor
            .execute(&chain, &signer, &order(TradeDirection::Buy, 0.01))
            .await
            .unwrap();
        chain.set_unavailable(true);
        executor
            .execute(&chain, &signer, &order(TradeDirection::Sell, 0.01))
            .await
            .unwrap_err();

        assert!(executor.address_locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_waiting_sender_keeps_its_lock() {
        let executor = executor();
        let address = test_signer().address();

        let held = executor.lock_for(address);
        let waiting = executor.lock_for(address);
        executor.release(address, held);
        assert!(executor.address_locks.lock().unwrap().contains_key(&address));

        executor.release(address, waiting);
        assert!(executor.address_locks.lock().unwrap().is_empty());
    }
}
