//! Wallet CRUD operations

use crate::encryption::EncryptedKey;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use swapcycle_core::{Error, Result, Wallet, WalletMetrics};

/// Database row for wallet (the key columns are read separately)
#[derive(Debug, sqlx::FromRow)]
struct WalletRow {
    id: i64,
    address: String,
    name: String,
    active: i32,
    is_imported: i32,
    total_buys: i64,
    total_sells: i64,
    total_volume: f64,
    error_count: i64,
    created_at: Option<DateTime<Utc>>,
}

impl From<WalletRow> for Wallet {
    fn from(row: WalletRow) -> Self {
        Wallet {
            id: row.id,
            address: row.address,
            name: row.name,
            active: row.active != 0,
            is_imported: row.is_imported != 0,
            metrics: WalletMetrics {
                total_buys: row.total_buys.max(0) as u64,
                total_sells: row.total_sells.max(0) as u64,
                total_volume: row.total_volume,
                error_count: row.error_count.max(0) as u64,
            },
            created_at: row.created_at,
        }
    }
}

const WALLET_COLUMNS: &str = "id, address, name, active, is_imported, total_buys, total_sells, \
                              total_volume, error_count, created_at";

/// Insert a wallet with its encrypted signing key
pub async fn create_wallet(
    pool: &SqlitePool,
    address: &str,
    name: &str,
    encrypted: &EncryptedKey,
    is_imported: bool,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO wallets (address, name, key_encrypted, iv, active, is_imported)
        VALUES (?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(address)
    .bind(name)
    .bind(&encrypted.ciphertext)
    .bind(&encrypted.iv[..])
    .bind(is_imported as i32)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(result.last_insert_rowid())
}

pub async fn list_wallets(pool: &SqlitePool) -> Result<Vec<Wallet>> {
    let rows: Vec<WalletRow> =
        sqlx::query_as(&format!("SELECT {} FROM wallets ORDER BY id", WALLET_COLUMNS))
            .fetch_all(pool)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(rows.into_iter().map(Wallet::from).collect())
}

/// Wallets the coordinator should schedule
pub async fn list_active_wallets(pool: &SqlitePool) -> Result<Vec<Wallet>> {
    let rows: Vec<WalletRow> = sqlx::query_as(&format!(
        "SELECT {} FROM wallets WHERE active = 1 ORDER BY id",
        WALLET_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(rows.into_iter().map(Wallet::from).collect())
}

pub async fn get_wallet(pool: &SqlitePool, id: i64) -> Result<Option<Wallet>> {
    let row: Option<WalletRow> = sqlx::query_as(&format!(
        "SELECT {} FROM wallets WHERE id = ?",
        WALLET_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(row.map(Wallet::from))
}

/// Encrypted signing key for a wallet
pub async fn get_wallet_key(pool: &SqlitePool, id: i64) -> Result<Option<EncryptedKey>> {
    let row: Option<(Vec<u8>, Vec<u8>)> =
        sqlx::query_as("SELECT key_encrypted, iv FROM wallets WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

    match row {
        Some((ciphertext, iv)) => Ok(Some(EncryptedKey::from_parts(ciphertext, &iv)?)),
        None => Ok(None),
    }
}

pub async fn set_wallet_active(pool: &SqlitePool, id: i64, active: bool) -> Result<()> {
    sqlx::query("UPDATE wallets SET active = ? WHERE id = ?")
        .bind(active as i32)
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(())
}

pub async fn rename_wallet(pool: &SqlitePool, id: i64, name: &str) -> Result<()> {
    sqlx::query("UPDATE wallets SET name = ? WHERE id = ?")
        .bind(name)
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(())
}

/// Overwrite the running counters for a wallet
pub async fn update_wallet_metrics(
    pool: &SqlitePool,
    id: i64,
    metrics: &WalletMetrics,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE wallets
        SET total_buys = ?, total_sells = ?, total_volume = ?, error_count = ?
        WHERE id = ?
        "#,
    )
    .bind(metrics.total_buys as i64)
    .bind(metrics.total_sells as i64)
    .bind(metrics.total_volume)
    .bind(metrics.error_count as i64)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(())
}

/// Delete a wallet together with its configuration and strategy
pub async fn delete_wallet(pool: &SqlitePool, id: i64) -> Result<()> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    for statement in [
        "DELETE FROM wallet_strategies WHERE wallet_id = ?",
        "DELETE FROM wallet_configurations WHERE wallet_id = ?",
        "DELETE FROM wallets WHERE id = ?",
    ] {
        sqlx::query(statement)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;
    }

    tx.commit()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(())
}

pub async fn wallet_exists(pool: &SqlitePool, address: &str) -> Result<bool> {
    let count: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM wallets WHERE lower(address) = lower(?)")
            .bind(address)
            .fetch_one(pool)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(count.0 > 0)
}
