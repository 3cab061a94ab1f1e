//! Trading history persistence

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use swapcycle_core::{Error, Result, TradeDirection, TradeRecord};

#[derive(Debug, sqlx::FromRow)]
struct TradeRow {
    id: i64,
    wallet_id: i64,
    trade_type: String,
    amount: f64,
    token_address: String,
    tx_hash: String,
    success: i32,
    timestamp: DateTime<Utc>,
}

impl TryFrom<TradeRow> for TradeRecord {
    type Error = Error;

    fn try_from(row: TradeRow) -> Result<Self> {
        Ok(TradeRecord {
            id: row.id,
            wallet_id: row.wallet_id,
            direction: row.trade_type.parse()?,
            amount: row.amount,
            token_address: row.token_address,
            tx_hash: row.tx_hash,
            success: row.success != 0,
            timestamp: row.timestamp,
        })
    }
}

/// Append a trade to the history
pub async fn record_trade(
    pool: &SqlitePool,
    wallet_id: i64,
    direction: TradeDirection,
    amount: f64,
    token_address: &str,
    tx_hash: &str,
    success: bool,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO trading_history (wallet_id, trade_type, amount, token_address, tx_hash, success, timestamp)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(wallet_id)
    .bind(direction.as_str())
    .bind(amount)
    .bind(token_address)
    .bind(tx_hash)
    .bind(success as i32)
    .bind(Utc::now())
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(result.last_insert_rowid())
}

/// Newest trades first with optional wallet filter
pub async fn list_trades(
    pool: &SqlitePool,
    wallet_id: Option<i64>,
    limit: u32,
    offset: u32,
) -> Result<Vec<TradeRecord>> {
    let mut query = String::from(
        r#"
        SELECT id, wallet_id, trade_type, amount, token_address, tx_hash, success, timestamp
        FROM trading_history
        "#,
    );

    if wallet_id.is_some() {
        query.push_str(" WHERE wallet_id = ?");
    }
    query.push_str(" ORDER BY id DESC LIMIT ? OFFSET ?");

    let mut builder = sqlx::query_as::<_, TradeRow>(&query);
    if let Some(id) = wallet_id {
        builder = builder.bind(id);
    }

    let rows = builder
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    rows.into_iter().map(TradeRecord::try_from).collect()
}

pub async fn count_trades(pool: &SqlitePool, wallet_id: i64) -> Result<u32> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM trading_history WHERE wallet_id = ?")
        .bind(wallet_id)
        .fetch_one(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(row.0 as u32)
}
