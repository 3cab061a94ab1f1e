//! Database connection and initialization

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use swapcycle_core::{Error, Result};

/// Database wrapper for SQLite operations
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to database at the given path, creating if necessary
    pub async fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::DatabaseError(e.to_string()))?;
        }

        let path_str = path.to_string_lossy();
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path_str))
            .map_err(|e| Error::DatabaseError(e.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Connect to in-memory database (for testing)
    pub async fn connect_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| Error::DatabaseError(e.to_string()))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS wallets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                address TEXT NOT NULL,
                name TEXT NOT NULL,
                key_encrypted BLOB NOT NULL,
                iv BLOB NOT NULL,
                active INTEGER DEFAULT 0,
                is_imported INTEGER DEFAULT 0,
                total_buys INTEGER DEFAULT 0,
                total_sells INTEGER DEFAULT 0,
                total_volume REAL DEFAULT 0.0,
                error_count INTEGER DEFAULT 0,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(address)
            );

            CREATE TABLE IF NOT EXISTS wallet_configurations (
                wallet_id INTEGER PRIMARY KEY,
                min_buy_amount REAL NOT NULL,
                max_buy_amount REAL NOT NULL,
                buy_slippage REAL NOT NULL,
                buy_interval_hours INTEGER NOT NULL DEFAULT 0,
                buy_interval_minutes INTEGER NOT NULL DEFAULT 0,
                buy_interval_seconds INTEGER NOT NULL DEFAULT 0,
                min_sell_amount REAL NOT NULL,
                max_sell_amount REAL NOT NULL,
                sell_slippage REAL NOT NULL,
                sell_interval_hours INTEGER NOT NULL DEFAULT 0,
                sell_interval_minutes INTEGER NOT NULL DEFAULT 0,
                sell_interval_seconds INTEGER NOT NULL DEFAULT 0,
                selected_token TEXT NOT NULL DEFAULT '',
                selected_network TEXT NOT NULL DEFAULT 'core',
                selected_dex TEXT NOT NULL DEFAULT '',
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (wallet_id) REFERENCES wallets(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS wallet_strategies (
                wallet_id INTEGER PRIMARY KEY,
                remaining_buys INTEGER NOT NULL,
                remaining_sells INTEGER NOT NULL,
                operations_left INTEGER NOT NULL,
                operations TEXT NOT NULL,
                consecutive_buys INTEGER NOT NULL DEFAULT 0,
                consecutive_sells INTEGER NOT NULL DEFAULT 0,
                amount_variability REAL NOT NULL,
                time_variability REAL NOT NULL,
                base_success_prob REAL NOT NULL,
                market_bias REAL NOT NULL,
                last_operation_time TIMESTAMP,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (wallet_id) REFERENCES wallets(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS bot_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                wallet_id INTEGER,
                message TEXT NOT NULL,
                level TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL
            );

            CREATE TABLE IF NOT EXISTS trading_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                wallet_id INTEGER NOT NULL,
                trade_type TEXT NOT NULL,
                amount REAL NOT NULL,
                token_address TEXT NOT NULL,
                tx_hash TEXT NOT NULL,
                success INTEGER NOT NULL DEFAULT 1,
                timestamp TIMESTAMP NOT NULL
            );

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        // Dashboards page through these newest-first
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_bot_logs_wallet ON bot_logs (wallet_id, id);
            CREATE INDEX IF NOT EXISTS idx_trading_history_wallet ON trading_history (wallet_id, id);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Cheap round trip used to tell whether the store is reachable
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;
        Ok(())
    }

    /// Close the pool; subsequent queries fail with `DatabaseError`
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
