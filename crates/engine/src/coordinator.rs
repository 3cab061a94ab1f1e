//! Bot execution coordinator
//!
//! A periodic tick over all active wallets. Each wallet is processed
//! independently: cycle slot, due check, amount, swap, persist. Only store
//! failures escape a wallet and count against the circuit breaker.

use crate::cycle::CycleGenerator;
use crate::interval::IntervalScheduler;
use crate::keys::SigningKeyProvider;
use crate::sampler::TradeAmountSampler;
use crate::swap::{SwapExecutor, SwapOrder};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use swapcycle_core::{
    short_address, Error, LogLevel, Result, SwapReceipt, TradeDirection, Wallet, WalletConfig,
};
use swapcycle_networking::ChainRegistry;
use swapcycle_persistence::WalletStore;
use tokio::sync::{Mutex, RwLock};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub tick_interval: Duration,
    /// Wallets processed concurrently within one tick
    pub max_concurrent_wallets: usize,
    /// Consecutive failed ticks before the coordinator stops itself
    pub circuit_breaker_threshold: u32,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(30),
            max_concurrent_wallets: 8,
            circuit_breaker_threshold: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CoordinatorState {
    Stopped,
    Running,
}

/// What happened to one wallet during a tick
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum WalletOutcome {
    Executed {
        direction: TradeDirection,
        amount: f64,
        tx_hash: String,
        confirmed: bool,
    },
    NotDue {
        direction: TradeDirection,
    },
    Skipped {
        reason: String,
    },
    InsufficientBalance {
        reason: String,
    },
    Failed {
        reason: String,
    },
    Deactivated {
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletResult {
    pub wallet_id: i64,
    #[serde(flatten)]
    pub outcome: WalletOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub started_at: Option<DateTime<Utc>>,
    pub active_wallets: usize,
    pub executed: usize,
    pub not_due: usize,
    pub skipped: usize,
    pub failed: usize,
    pub wallets: Vec<WalletResult>,
}

impl TickReport {
    fn record(&mut self, wallet_id: i64, outcome: WalletOutcome) {
        match &outcome {
            WalletOutcome::Executed { .. } => self.executed += 1,
            WalletOutcome::NotDue { .. } => self.not_due += 1,
            WalletOutcome::Skipped { .. } | WalletOutcome::InsufficientBalance { .. } => {
                self.skipped += 1
            }
            WalletOutcome::Failed { .. } | WalletOutcome::Deactivated { .. } => self.failed += 1,
        }
        self.wallets.push(WalletResult { wallet_id, outcome });
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum TickOutcome {
    Completed(TickReport),
    /// Another tick was still running
    Skipped,
    Failed {
        error: String,
        /// Per-wallet results when the failure happened mid-tick
        #[serde(skip_serializing_if = "Option::is_none")]
        report: Option<TickReport>,
    },
}

/// A tick that hit the store. `report` holds whatever was processed first.
struct TickFailure {
    error: Error,
    report: Option<TickReport>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorStatus {
    pub state: CoordinatorState,
    pub last_execution: Option<DateTime<Utc>>,
    pub execution_count: u64,
    pub consecutive_failures: u32,
    pub last_tick: Option<TickReport>,
    /// Set when the circuit breaker stopped the loop
    pub halted_reason: Option<String>,
}

impl Default for CoordinatorStatus {
    fn default() -> Self {
        Self {
            state: CoordinatorState::Stopped,
            last_execution: None,
            execution_count: 0,
            consecutive_failures: 0,
            last_tick: None,
            halted_reason: None,
        }
    }
}

pub struct Coordinator {
    store: Arc<dyn WalletStore>,
    keys: Arc<dyn SigningKeyProvider>,
    networks: Arc<ChainRegistry>,
    executor: SwapExecutor,
    settings: CoordinatorSettings,
    status: RwLock<CoordinatorStatus>,
    /// Held for the duration of a tick; ticks never overlap
    tick_guard: Mutex<()>,
    cancel: std::sync::Mutex<Option<CancellationToken>>,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn WalletStore>,
        keys: Arc<dyn SigningKeyProvider>,
        networks: Arc<ChainRegistry>,
        executor: SwapExecutor,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            store,
            keys,
            networks,
            executor,
            settings,
            status: RwLock::new(CoordinatorStatus::default()),
            tick_guard: Mutex::new(()),
            cancel: std::sync::Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    pub async fn status(&self) -> CoordinatorStatus {
        self.status.read().await.clone()
    }

    pub async fn is_running(&self) -> bool {
        self.status.read().await.state == CoordinatorState::Running
    }

    /// Spawn the tick loop. Returns false if it is already running.
    pub async fn start(self: &Arc<Self>) -> bool {
        let token = {
            let mut slot = self.cancel.lock().unwrap_or_else(|p| p.into_inner());
            if slot.as_ref().is_some_and(|t| !t.is_cancelled()) {
                return false;
            }
            let token = CancellationToken::new();
            *slot = Some(token.clone());
            token
        };

        {
            let mut status = self.status.write().await;
            status.state = CoordinatorState::Running;
            status.consecutive_failures = 0;
            status.halted_reason = None;
        }

        info!(
            "Coordinator started (tick every {:?}, up to {} wallets at once)",
            self.settings.tick_interval, self.settings.max_concurrent_wallets
        );
        tokio::spawn(Arc::clone(self).run_loop(token));
        true
    }

    /// Stop scheduling new ticks. A tick already in progress runs to completion.
    pub async fn stop(&self) -> bool {
        let was_running = {
            let mut slot = self.cancel.lock().unwrap_or_else(|p| p.into_inner());
            match slot.take() {
                Some(token) => {
                    let running = !token.is_cancelled();
                    token.cancel();
                    running
                }
                None => false,
            }
        };

        self.status.write().await.state = CoordinatorState::Stopped;
        if was_running {
            info!("Coordinator stopped");
        }
        was_running
    }

    /// Resolves once no tick is running
    pub async fn wait_idle(&self) {
        let _guard = self.tick_guard.lock().await;
    }

    async fn run_loop(self: Arc<Self>, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.settings.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("Coordinator loop cancelled, exiting");
                    break;
                }
                _ = ticker.tick() => {
                    match self.tick().await {
                        TickOutcome::Completed(report) => debug!(
                            "Tick: {} active, {} executed, {} not due, {} skipped, {} failed",
                            report.active_wallets,
                            report.executed,
                            report.not_due,
                            report.skipped,
                            report.failed
                        ),
                        TickOutcome::Skipped => debug!("Previous tick still running, skipped"),
                        TickOutcome::Failed { .. } => {}
                    }
                }
            }
        }
    }

    /// Run one pass over the active wallets now. Safe to call while the loop
    /// is running; an overlapping call returns `Skipped`.
    pub async fn tick(&self) -> TickOutcome {
        let Ok(_guard) = self.tick_guard.try_lock() else {
            return TickOutcome::Skipped;
        };

        match self.run_tick().await {
            Ok(report) => {
                let mut status = self.status.write().await;
                status.consecutive_failures = 0;
                status.last_execution = Some(Utc::now());
                status.execution_count += 1;
                status.last_tick = Some(report.clone());
                TickOutcome::Completed(report)
            }
            Err(TickFailure { error: e, report }) => {
                error!("Tick failed: {}", e);
                let failures = {
                    let mut status = self.status.write().await;
                    if let Some(report) = &report {
                        status.last_execution = Some(Utc::now());
                        status.execution_count += 1;
                        status.last_tick = Some(report.clone());
                    }
                    status.consecutive_failures += 1;
                    status.consecutive_failures
                };

                if failures >= self.settings.circuit_breaker_threshold {
                    let reason = format!("{} consecutive failed ticks, last: {}", failures, e);
                    error!("Circuit breaker tripped: {}", reason);
                    self.status.write().await.halted_reason = Some(reason);
                    self.stop().await;
                }
                TickOutcome::Failed {
                    error: e.to_string(),
                    report,
                }
            }
        }
    }

    async fn run_tick(&self) -> std::result::Result<TickReport, TickFailure> {
        let wallets = self
            .store
            .active_wallets()
            .await
            .map_err(|error| TickFailure {
                error,
                report: None,
            })?;
        let mut report = TickReport {
            started_at: Some(Utc::now()),
            active_wallets: wallets.len(),
            ..TickReport::default()
        };

        if wallets.is_empty() {
            info!("No active wallets found");
            return Ok(report);
        }

        let results: Vec<(i64, Result<WalletOutcome>)> = stream::iter(wallets)
            .map(|wallet| async move {
                let outcome = self.process_wallet(&wallet).await;
                (wallet.id, outcome)
            })
            .buffer_unordered(self.settings.max_concurrent_wallets.max(1))
            .collect()
            .await;

        let mut store_failure = None;
        for (wallet_id, result) in results {
            match result {
                Ok(outcome) => report.record(wallet_id, outcome),
                Err(e) => {
                    error!(wallet_id, "Wallet processing aborted: {}", e);
                    report.record(
                        wallet_id,
                        WalletOutcome::Failed {
                            reason: e.to_string(),
                        },
                    );
                    if e.is_store_failure() {
                        store_failure.get_or_insert(e);
                    }
                }
            }
        }

        match store_failure {
            Some(error) => Err(TickFailure {
                error,
                report: Some(report),
            }),
            None => Ok(report),
        }
    }

    /// One wallet's turn. Only store failures are returned as errors.
    async fn process_wallet(&self, wallet: &Wallet) -> Result<WalletOutcome> {
        let short = short_address(&wallet.address);

        let config = match self.store.config(wallet.id).await {
            Ok(Some(config)) => config,
            Ok(None) => return Ok(self.skip(wallet, Error::ConfigMissing(wallet.id)).await),
            Err(e) if e.is_store_failure() => return Err(e),
            Err(e) => return self.fail(wallet, e, "").await,
        };
        if let Err(e) = config.validate() {
            return Ok(self.skip(wallet, e).await);
        }

        let mut rng = StdRng::from_entropy();
        let mut strategy = match self.store.strategy(wallet.id).await {
            Ok(Some(strategy)) => strategy,
            Ok(None) => {
                let strategy = CycleGenerator::new_strategy(wallet.id, &mut rng);
                self.store.save_strategy(&strategy).await?;
                strategy
            }
            Err(e) if e.is_store_failure() => return Err(e),
            Err(e) => {
                // Unreadable record: replace it so the wallet trades again next tick
                let strategy = CycleGenerator::new_strategy(wallet.id, &mut rng);
                self.store.save_strategy(&strategy).await?;
                return self.fail(wallet, e, ". Strategy reset to a new cycle").await;
            }
        };

        if CycleGenerator::needs_rollover(&strategy.current_cycle) {
            CycleGenerator::roll_over(&mut strategy, &mut rng);
            self.store.save_strategy(&strategy).await?;
            self.log(
                Some(wallet.id),
                LogLevel::Info,
                &format!("Starting new cycle for wallet {}", short),
            )
            .await;
        }

        // The slot is consumed before the due check; a wallet that is not due
        // does not persist it.
        let direction = CycleGenerator::next_operation(&mut strategy, &mut rng).direction;

        if !IntervalScheduler::is_due(&strategy, &config, direction, Utc::now(), &mut rng) {
            debug!(wallet_id = wallet.id, "Wallet {} waiting for next {}", short, direction);
            return Ok(WalletOutcome::NotDue { direction });
        }

        let variability = strategy.amount_variability;

        match self
            .trade(wallet, &config, direction, variability, &mut rng)
            .await
        {
            Ok(receipt) => {
                let mut metrics = wallet.metrics.clone();
                metrics.record_success(direction, receipt.amount);
                strategy.last_operation_time = Some(Utc::now());
                self.store.save_strategy(&strategy).await?;
                self.store.save_metrics(wallet.id, &metrics).await?;
                self.store
                    .record_trade(
                        wallet.id,
                        direction,
                        receipt.amount,
                        &config.selected_token,
                        &receipt.tx_hash,
                    )
                    .await?;

                let mut message = format!(
                    "{} {:.6} - TX: {}",
                    direction.as_str().to_uppercase(),
                    receipt.amount,
                    receipt.tx_hash
                );
                if !receipt.confirmed {
                    message.push_str(" (unconfirmed)");
                }
                self.log(Some(wallet.id), LogLevel::Success, &message).await;

                Ok(WalletOutcome::Executed {
                    direction,
                    amount: receipt.amount,
                    tx_hash: receipt.tx_hash,
                    confirmed: receipt.confirmed,
                })
            }
            Err(e) if e.is_store_failure() => Err(e),
            Err(e @ Error::InvalidSigningKey(_)) => self.deactivate(wallet, e).await,
            Err(Error::WalletNotFound(_)) => Ok(WalletOutcome::Skipped {
                reason: "wallet removed".to_string(),
            }),
            Err(e) if e.is_insufficient_balance() => {
                // Slot stays consumed so one unaffordable trade cannot stall the cycle
                self.store.save_strategy(&strategy).await?;
                self.log(
                    Some(wallet.id),
                    LogLevel::Warning,
                    &format!("Wallet {}: {}", short, e),
                )
                .await;
                Ok(WalletOutcome::InsufficientBalance {
                    reason: e.to_string(),
                })
            }
            Err(e) if e.is_skip() => Ok(self.skip(wallet, e).await),
            Err(e) => self.fail(wallet, e, "").await,
        }
    }

    async fn trade(
        &self,
        wallet: &Wallet,
        config: &WalletConfig,
        direction: TradeDirection,
        variability: f64,
        rng: &mut StdRng,
    ) -> Result<SwapReceipt> {
        let network = self.networks.get(&config.selected_network)?;

        let signer = self.keys.signer(wallet.id).await?;
        if !signer
            .address()
            .to_checksum(None)
            .eq_ignore_ascii_case(&wallet.address)
        {
            return Err(Error::InvalidSigningKey(
                "stored key does not match wallet address".to_string(),
            ));
        }

        let (min, max) = config.bounds(direction);
        let amount = TradeAmountSampler::sample(min, max, variability, rng)?;
        let order = SwapOrder::from_config(config, &network.config, direction, amount)?;

        self.executor
            .execute(network.client.as_ref(), &signer, &order)
            .await
    }

    /// Counted against the wallet and logged; the tick carries on
    async fn fail(&self, wallet: &Wallet, reason: Error, note: &str) -> Result<WalletOutcome> {
        let mut metrics = wallet.metrics.clone();
        metrics.record_error();
        self.store.save_metrics(wallet.id, &metrics).await?;
        self.log(
            Some(wallet.id),
            LogLevel::Error,
            &format!("Error: {}{}", reason, note),
        )
        .await;
        Ok(WalletOutcome::Failed {
            reason: reason.to_string(),
        })
    }

    async fn skip(&self, wallet: &Wallet, reason: Error) -> WalletOutcome {
        let message = format!("Skipping wallet {}: {}", short_address(&wallet.address), reason);
        self.log(Some(wallet.id), LogLevel::Info, &message).await;
        WalletOutcome::Skipped {
            reason: reason.to_string(),
        }
    }

    /// Unusable key: stop scheduling the wallet until it is re-imported
    async fn deactivate(&self, wallet: &Wallet, reason: Error) -> Result<WalletOutcome> {
        let mut metrics = wallet.metrics.clone();
        metrics.record_error();
        self.store.set_active(wallet.id, false).await?;
        self.store.save_metrics(wallet.id, &metrics).await?;

        warn!(wallet_id = wallet.id, "Deactivating wallet: {}", reason);
        self.log(
            Some(wallet.id),
            LogLevel::Error,
            &format!(
                "Error: {}. Wallet {} deactivated, re-import the key to resume",
                reason,
                short_address(&wallet.address)
            ),
        )
        .await;

        Ok(WalletOutcome::Deactivated {
            reason: reason.to_string(),
        })
    }

    /// Best effort: a failed log write never affects the tick
    async fn log(&self, wallet_id: Option<i64>, level: LogLevel, message: &str) {
        if let Err(e) = self.store.append_log(wallet_id, level, message).await {
            warn!("Failed to write bot log: {}", e);
        }
    }
}
