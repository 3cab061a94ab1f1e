//! Daemon configuration loaded from TOML

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use swapcycle_engine::{CoordinatorSettings, SwapSettings};
use swapcycle_networking::NetworkConfig;

const CONFIG_ENV: &str = "SWAPCYCLE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/swapcycle.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    #[serde(default = "default_max_concurrent_wallets")]
    pub max_concurrent_wallets: usize,

    #[serde(default = "default_circuit_breaker_threshold")]
    pub circuit_breaker_threshold: u32,

    /// Start the coordinator on boot unless an operator stopped it earlier
    #[serde(default = "default_true")]
    pub autostart: bool,

    #[serde(default)]
    pub rpc: RpcConfig,

    #[serde(default)]
    pub swap: SwapConfig,

    #[serde(default)]
    pub http: HttpConfig,

    /// Keyed by the name wallets use in `selectedNetwork`
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapConfig {
    #[serde(default = "default_approval_settle_secs")]
    pub approval_settle_secs: u64,
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
    #[serde(default = "default_swap_gas_limit")]
    pub swap_gas_limit: u64,
    #[serde(default = "default_approve_gas_limit")]
    pub approve_gas_limit: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Bearer token required on every API call when set
    #[serde(default)]
    pub api_token: Option<String>,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("data/swapcycle.db")
}

fn default_tick_interval_secs() -> u64 {
    30
}

fn default_max_concurrent_wallets() -> usize {
    8
}

fn default_circuit_breaker_threshold() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

fn default_rpc_timeout_secs() -> u64 {
    10
}

fn default_approval_settle_secs() -> u64 {
    5
}

fn default_deadline_secs() -> u64 {
    20 * 60
}

fn default_confirmation_timeout_secs() -> u64 {
    60
}

fn default_swap_gas_limit() -> u64 {
    700_000
}

fn default_approve_gas_limit() -> u64 {
    100_000
}

fn default_bind() -> String {
    "127.0.0.1:8787".to_string()
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_rpc_timeout_secs(),
        }
    }
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            approval_settle_secs: default_approval_settle_secs(),
            deadline_secs: default_deadline_secs(),
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
            swap_gas_limit: default_swap_gas_limit(),
            approve_gas_limit: default_approve_gas_limit(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            api_token: None,
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            tick_interval_secs: default_tick_interval_secs(),
            max_concurrent_wallets: default_max_concurrent_wallets(),
            circuit_breaker_threshold: default_circuit_breaker_threshold(),
            autostart: true,
            rpc: RpcConfig::default(),
            swap: SwapConfig::default(),
            http: HttpConfig::default(),
            networks: BTreeMap::new(),
        }
    }
}

impl DaemonConfig {
    /// Read from `$SWAPCYCLE_CONFIG` or the default path; a missing file means defaults
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        if !path.exists() {
            tracing::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::from_path(&path)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        if config.tick_interval_secs == 0 {
            anyhow::bail!("tick_interval_secs must be positive");
        }
        Ok(config)
    }

    /// Configured networks with names filled in, or the built-in Core network
    pub fn networks(&self) -> Vec<NetworkConfig> {
        if self.networks.is_empty() {
            return vec![NetworkConfig::core()];
        }
        self.networks
            .iter()
            .map(|(name, network)| NetworkConfig {
                name: name.clone(),
                ..network.clone()
            })
            .collect()
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.timeout_secs.max(1))
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            tick_interval: Duration::from_secs(self.tick_interval_secs),
            max_concurrent_wallets: self.max_concurrent_wallets.max(1),
            circuit_breaker_threshold: self.circuit_breaker_threshold.max(1),
        }
    }

    pub fn swap_settings(&self) -> SwapSettings {
        SwapSettings {
            approval_settle: Duration::from_secs(self.swap.approval_settle_secs),
            deadline: Duration::from_secs(self.swap.deadline_secs),
            confirmation_timeout: Duration::from_secs(self.swap.confirmation_timeout_secs),
            swap_gas_limit: self.swap.swap_gas_limit,
            approve_gas_limit: self.swap.approve_gas_limit,
            ..SwapSettings::default()
        }
    }
}
