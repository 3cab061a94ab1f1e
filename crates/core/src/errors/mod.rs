//! Error types and Result alias for the trading scheduler

use thiserror::Error;

/// Main error type for the scheduler
#[derive(Error, Debug)]
pub enum Error {
    #[error("Wallet {0} has no trading configuration")]
    ConfigMissing(i64),

    #[error("Wallet {0} has no token selected")]
    TokenNotSelected(i64),

    #[error("Insufficient {asset} balance: required {required}, available {available}")]
    InsufficientBalance {
        asset: String,
        required: f64,
        available: f64,
    },

    #[error("Approval failed: {0}")]
    ApprovalFailed(String),

    #[error("Insufficient liquidity: {0}")]
    InsufficientLiquidity(String),

    #[error("RPC unavailable: {0}")]
    RpcUnavailable(String),

    #[error("Invalid signing key: {0}")]
    InvalidSigningKey(String),

    #[error("Invalid trade parameters: {0}")]
    InvalidTradeParameters(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Encryption error: {0}")]
    EncryptionError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    #[error("Unknown network: {0}")]
    UnknownNetwork(String),
}

impl Error {
    /// Store connectivity failures are the only errors that count
    /// against the coordinator's circuit breaker.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Error::DatabaseError(_))
    }

    /// Configuration problems that skip a wallet without touching metrics
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            Error::ConfigMissing(_) | Error::TokenNotSelected(_) | Error::InvalidTradeParameters(_)
        )
    }

    /// Expected shortfalls: logged as a warning, slot consumed, no error metric
    pub fn is_insufficient_balance(&self) -> bool {
        matches!(self, Error::InsufficientBalance { .. })
    }
}

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::NetworkError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidData(err.to_string())
    }
}
