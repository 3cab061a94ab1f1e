//! Swapcycle daemon: periodic swap scheduler with an HTTP trigger

mod config;
mod server;

use anyhow::Context;
use config::DaemonConfig;
use server::{build_router, ApiState};
use std::sync::Arc;
use swapcycle_engine::{Coordinator, EncryptedKeyProvider, SwapExecutor, WalletService};
use swapcycle_networking::{ChainRegistry, PriceFeed, RpcChainClient};
use swapcycle_persistence::sqlite::{self, BOT_ENABLED_KEY};
use swapcycle_persistence::{Database, KeyEncryptor, PriceCache};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const PASSPHRASE_ENV: &str = "SWAPCYCLE_KEY_PASSPHRASE";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "swapcycle_daemon=info,swapcycle_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting swapcycle daemon");

    let config = DaemonConfig::load()?;

    let db = Arc::new(
        Database::connect(&config.database_path)
            .await
            .with_context(|| format!("opening {}", config.database_path.display()))?,
    );
    info!("Database ready at {}", config.database_path.display());

    let encryptor = Arc::new(match std::env::var(PASSPHRASE_ENV) {
        Ok(passphrase) if !passphrase.is_empty() => KeyEncryptor::from_password(&passphrase)?,
        _ => {
            warn!(
                "{} not set, sealing keys with the machine-bound key",
                PASSPHRASE_ENV
            );
            KeyEncryptor::for_machine()?
        }
    });

    let mut registry = ChainRegistry::new();
    let mut clients = Vec::new();
    for network in config.networks() {
        let client = match RpcChainClient::new(&network, config.rpc_timeout()) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                error!("Network {} disabled: {}", network.name, e);
                continue;
            }
        };
        if let Err(e) = client.connect().await {
            // Endpoints are retried on every call
            warn!("Network {} not reachable yet: {}", network.name, e);
        }
        clients.push(client.clone());
        registry.insert(network, client);
    }
    if registry.is_empty() {
        warn!("No usable networks configured; every trade will be skipped");
    }
    let networks = Arc::new(registry);

    let coordinator = Arc::new(Coordinator::new(
        db.clone(),
        Arc::new(EncryptedKeyProvider::new(db.clone(), encryptor.clone())),
        networks.clone(),
        SwapExecutor::new(config.swap_settings()),
        config.coordinator_settings(),
    ));

    let enabled = sqlite::get_setting(db.pool(), BOT_ENABLED_KEY)
        .await?
        .map(|v| v == "true")
        .unwrap_or(config.autostart);
    if enabled {
        coordinator.start().await;
    } else {
        info!("Coordinator left stopped; POST /api/coordinator/start to run it");
    }

    let state = ApiState {
        db: db.clone(),
        wallets: Arc::new(WalletService::new(db.clone(), encryptor)),
        coordinator: coordinator.clone(),
        networks,
        prices: Arc::new(PriceFeed::new(Arc::new(PriceCache::default()))?),
        api_token: config.http.api_token.clone().filter(|t| !t.is_empty()),
    };
    if state.api_token.is_none() {
        warn!("http.api_token not set, the API is unauthenticated");
    }

    let listener = tokio::net::TcpListener::bind(&config.http.bind)
        .await
        .with_context(|| format!("binding {}", config.http.bind))?;
    info!("API listening on http://{}", config.http.bind);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown requested");
        })
        .await?;

    coordinator.stop().await;
    coordinator.wait_idle().await;
    for client in &clients {
        client.close();
    }
    db.close().await;
    info!("Swapcycle daemon stopped");
    Ok(())
}
