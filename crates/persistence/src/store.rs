//! The durable state the coordinator reads and writes, as a capability

use crate::sqlite;
use crate::Database;
use async_trait::async_trait;
use swapcycle_core::{
    LogLevel, Result, TradeDirection, Wallet, WalletConfig, WalletMetrics, WalletStrategy,
};

/// Per-wallet records keyed by wallet id. Every write touches one wallet's rows.
#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn active_wallets(&self) -> Result<Vec<Wallet>>;

    async fn config(&self, wallet_id: i64) -> Result<Option<WalletConfig>>;

    async fn strategy(&self, wallet_id: i64) -> Result<Option<WalletStrategy>>;

    async fn save_strategy(&self, strategy: &WalletStrategy) -> Result<()>;

    async fn save_metrics(&self, wallet_id: i64, metrics: &WalletMetrics) -> Result<()>;

    async fn set_active(&self, wallet_id: i64, active: bool) -> Result<()>;

    async fn append_log(&self, wallet_id: Option<i64>, level: LogLevel, message: &str)
        -> Result<()>;

    async fn record_trade(
        &self,
        wallet_id: i64,
        direction: TradeDirection,
        amount: f64,
        token_address: &str,
        tx_hash: &str,
    ) -> Result<()>;
}

#[async_trait]
impl WalletStore for Database {
    async fn active_wallets(&self) -> Result<Vec<Wallet>> {
        sqlite::list_active_wallets(self.pool()).await
    }

    async fn config(&self, wallet_id: i64) -> Result<Option<WalletConfig>> {
        sqlite::get_config(self.pool(), wallet_id).await
    }

    async fn strategy(&self, wallet_id: i64) -> Result<Option<WalletStrategy>> {
        sqlite::get_strategy(self.pool(), wallet_id).await
    }

    async fn save_strategy(&self, strategy: &WalletStrategy) -> Result<()> {
        sqlite::save_strategy(self.pool(), strategy).await
    }

    async fn save_metrics(&self, wallet_id: i64, metrics: &WalletMetrics) -> Result<()> {
        sqlite::update_wallet_metrics(self.pool(), wallet_id, metrics).await
    }

    async fn set_active(&self, wallet_id: i64, active: bool) -> Result<()> {
        sqlite::set_wallet_active(self.pool(), wallet_id, active).await
    }

    async fn append_log(
        &self,
        wallet_id: Option<i64>,
        level: LogLevel,
        message: &str,
    ) -> Result<()> {
        sqlite::append_log(self.pool(), wallet_id, level, message).await?;
        Ok(())
    }

    async fn record_trade(
        &self,
        wallet_id: i64,
        direction: TradeDirection,
        amount: f64,
        token_address: &str,
        tx_hash: &str,
    ) -> Result<()> {
        sqlite::record_trade(
            self.pool(),
            wallet_id,
            direction,
            amount,
            token_address,
            tx_hash,
            true,
        )
        .await?;
        Ok(())
    }
}
