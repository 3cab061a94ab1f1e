//! Wallet management for the admin surface: create, import, configure, remove

use crate::cycle::CycleGenerator;
use crate::interval::IntervalScheduler;
use crate::keys::{encode_signing_key, parse_signing_key};
use alloy::signers::local::PrivateKeySigner;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use swapcycle_core::{
    short_address, CycleProgress, Error, Result, Wallet, WalletConfig, WalletStrategy,
};
use swapcycle_persistence::{sqlite, Database, KeyEncryptor};
use tracing::info;

/// Cycle progress plus time until the next slot's base interval elapses
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletProgress {
    pub wallet_id: i64,
    #[serde(flatten)]
    pub cycle: CycleProgress,
    pub seconds_until_due: u64,
}

pub struct WalletService {
    db: Arc<Database>,
    encryptor: Arc<KeyEncryptor>,
}

impl WalletService {
    pub fn new(db: Arc<Database>, encryptor: Arc<KeyEncryptor>) -> Self {
        Self { db, encryptor }
    }

    pub async fn list(&self) -> Result<Vec<Wallet>> {
        sqlite::list_wallets(self.db.pool()).await
    }

    pub async fn get(&self, wallet_id: i64) -> Result<Wallet> {
        sqlite::get_wallet(self.db.pool(), wallet_id)
            .await?
            .ok_or_else(|| Error::WalletNotFound(wallet_id.to_string()))
    }

    /// Create `count` fresh wallets, inactive, with default configs
    pub async fn generate(&self, count: u32) -> Result<Vec<Wallet>> {
        if count == 0 || count > 100 {
            return Err(Error::InvalidData(format!(
                "wallet count must be between 1 and 100, got {}",
                count
            )));
        }

        let existing = self.list().await?.len();
        let mut created = Vec::with_capacity(count as usize);

        for i in 0..count as usize {
            let signer = PrivateKeySigner::random();
            let name = format!("Wallet {}", existing + i + 1);
            created.push(self.store(&signer, &name, false).await?);
        }

        info!("Generated {} wallets", created.len());
        Ok(created)
    }

    /// Import an existing private key
    pub async fn import(&self, private_key: &str, name: Option<&str>) -> Result<Wallet> {
        let signer = parse_signing_key(private_key)?;
        let address = signer.address().to_checksum(None);

        if sqlite::wallet_exists(self.db.pool(), &address).await? {
            return Err(Error::InvalidData(format!(
                "wallet {} already exists",
                address
            )));
        }

        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(n) => n.to_string(),
            None => format!("Imported {}", short_address(&address)),
        };

        let wallet = self.store(&signer, &name, true).await?;
        info!(wallet_id = wallet.id, "Imported wallet {}", short_address(&address));
        Ok(wallet)
    }

    async fn store(&self, signer: &PrivateKeySigner, name: &str, imported: bool) -> Result<Wallet> {
        let address = signer.address().to_checksum(None);
        let sealed = self.encryptor.encrypt(&encode_signing_key(signer))?;

        let id = sqlite::create_wallet(self.db.pool(), &address, name, &sealed, imported).await?;
        sqlite::save_config(self.db.pool(), &WalletConfig::default_for(id)).await?;

        self.get(id).await
    }

    pub async fn rename(&self, wallet_id: i64, name: &str) -> Result<Wallet> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidData("wallet name cannot be empty".to_string()));
        }
        self.get(wallet_id).await?;
        sqlite::rename_wallet(self.db.pool(), wallet_id, name).await?;
        self.get(wallet_id).await
    }

    /// Toggle scheduling. Activating creates the strategy if there is none yet.
    pub async fn set_active(&self, wallet_id: i64, active: bool) -> Result<Wallet> {
        self.get(wallet_id).await?;

        if active && sqlite::get_strategy(self.db.pool(), wallet_id).await?.is_none() {
            let strategy = {
                let mut rng = rand::thread_rng();
                CycleGenerator::new_strategy(wallet_id, &mut rng)
            };
            sqlite::save_strategy(self.db.pool(), &strategy).await?;
        }

        sqlite::set_wallet_active(self.db.pool(), wallet_id, active).await?;
        self.get(wallet_id).await
    }

    /// Delete the wallet with its config and strategy. Logs and trade history stay.
    pub async fn remove(&self, wallet_id: i64) -> Result<()> {
        let wallet = self.get(wallet_id).await?;
        sqlite::delete_wallet(self.db.pool(), wallet_id).await?;
        info!(wallet_id, "Removed wallet {}", short_address(&wallet.address));
        Ok(())
    }

    /// The stored policy, or the defaults when none was saved
    pub async fn config(&self, wallet_id: i64) -> Result<WalletConfig> {
        self.get(wallet_id).await?;
        Ok(sqlite::get_config(self.db.pool(), wallet_id)
            .await?
            .unwrap_or_else(|| WalletConfig::default_for(wallet_id)))
    }

    /// Persist a policy. A missing token is accepted; the coordinator skips
    /// such wallets until one is chosen.
    pub async fn save_config(&self, config: WalletConfig) -> Result<WalletConfig> {
        self.get(config.wallet_id).await?;

        match config.validate() {
            Ok(()) | Err(Error::TokenNotSelected(_)) => {}
            Err(e) => return Err(e),
        }

        let mut config = config;
        config.selected_token = config.selected_token.trim().to_string();
        config.selected_dex = config.selected_dex.trim().to_string();

        sqlite::save_config(self.db.pool(), &config).await?;
        Ok(config)
    }

    pub async fn strategy(&self, wallet_id: i64) -> Result<Option<WalletStrategy>> {
        sqlite::get_strategy(self.db.pool(), wallet_id).await
    }

    /// Read-only progress for dashboards; `None` before the first activation
    pub async fn progress(&self, wallet_id: i64) -> Result<Option<WalletProgress>> {
        let Some(strategy) = self.strategy(wallet_id).await? else {
            return Ok(None);
        };
        let config = self.config(wallet_id).await?;
        let cycle = strategy.progress();

        let seconds_until_due = cycle
            .next_operation
            .map(|direction| {
                IntervalScheduler::seconds_until_due(&strategy, &config, direction, Utc::now())
            })
            .unwrap_or(0);

        Ok(Some(WalletProgress {
            wallet_id,
            cycle,
            seconds_until_due,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{wallet_service, TEST_ADDRESS, TEST_KEY};
    use swapcycle_core::IntervalSpec;

    #[tokio::test]
    async fn test_generate_names_and_defaults() {
        let (service, _) = wallet_service().await;
        let wallets = service.generate(3).await.unwrap();

        assert_eq!(wallets.len(), 3);
        assert_eq!(wallets[2].name, "Wallet 3");
        assert!(wallets.iter().all(|w| !w.active && !w.is_imported));
        assert!(wallets.iter().all(|w| w.address.starts_with("0x") && w.address.len() == 42));

        let config = service.config(wallets[0].id).await.unwrap();
        assert_eq!(config, WalletConfig::default_for(wallets[0].id));

        assert!(service.generate(0).await.is_err());
    }

    #[tokio::test]
    async fn test_import_rejects_duplicates_and_bad_keys() {
        let (service, _) = wallet_service().await;

        let wallet = service.import(TEST_KEY, Some("main")).await.unwrap();
        assert_eq!(wallet.address, TEST_ADDRESS);
        assert_eq!(wallet.name, "main");
        assert!(wallet.is_imported);

        assert!(matches!(
            service.import(&TEST_KEY[2..], None).await,
            Err(Error::InvalidData(_))
        ));
        assert!(matches!(
            service.import("0xdeadbeef", None).await,
            Err(Error::InvalidSigningKey(_))
        ));
    }

    #[tokio::test]
    async fn test_activation_creates_strategy_once() {
        let (service, _) = wallet_service().await;
        let wallet = service.import(TEST_KEY, None).await.unwrap();
        assert!(service.progress(wallet.id).await.unwrap().is_none());

        service.set_active(wallet.id, true).await.unwrap();
        let first = service.strategy(wallet.id).await.unwrap().unwrap();
        assert_eq!(first.current_cycle.operations_left, 10);

        service.set_active(wallet.id, false).await.unwrap();
        let wallet = service.set_active(wallet.id, true).await.unwrap();
        assert!(wallet.active);
        assert_eq!(service.strategy(wallet.id).await.unwrap().unwrap(), first);

        let progress = service.progress(wallet.id).await.unwrap().unwrap();
        assert_eq!(progress.cycle.completed, 0);
        assert_eq!(progress.seconds_until_due, 0);
    }

    #[tokio::test]
    async fn test_save_config_validation() {
        let (service, _) = wallet_service().await;
        let wallet = service.import(TEST_KEY, None).await.unwrap();

        // no token yet is fine
        let mut config = WalletConfig::default_for(wallet.id);
        config.buy_interval = IntervalSpec::new(0, 5, 0);
        service.save_config(config.clone()).await.unwrap();
        assert_eq!(service.config(wallet.id).await.unwrap().buy_interval.total_seconds(), 300);

        config.selected_token = " 0x5FbDB2315678afecb367f032d93F642f64180aa3 ".to_string();
        let saved = service.save_config(config.clone()).await.unwrap();
        assert_eq!(saved.selected_token, "0x5FbDB2315678afecb367f032d93F642f64180aa3");

        config.min_sell_amount = 1.0;
        config.max_sell_amount = 0.5;
        assert!(matches!(
            service.save_config(config.clone()).await,
            Err(Error::InvalidTradeParameters(_))
        ));

        config.wallet_id = wallet.id + 100;
        assert!(matches!(
            service.save_config(config).await,
            Err(Error::WalletNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rename_and_remove() {
        let (service, db) = wallet_service().await;
        let wallet = service.import(TEST_KEY, None).await.unwrap();

        assert_eq!(service.rename(wallet.id, " trader ").await.unwrap().name, "trader");
        assert!(service.rename(wallet.id, "  ").await.is_err());

        service.set_active(wallet.id, true).await.unwrap();
        service.remove(wallet.id).await.unwrap();

        assert!(matches!(service.get(wallet.id).await, Err(Error::WalletNotFound(_))));
        assert!(sqlite::get_config(db.pool(), wallet.id).await.unwrap().is_none());
        assert!(sqlite::get_strategy(db.pool(), wallet.id).await.unwrap().is_none());
    }
}
