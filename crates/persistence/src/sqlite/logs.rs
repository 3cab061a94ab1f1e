//! Bot log stream persistence

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use swapcycle_core::{Error, LogEntry, LogLevel, Result};

#[derive(Debug, sqlx::FromRow)]
struct LogRow {
    id: i64,
    wallet_id: Option<i64>,
    message: String,
    level: String,
    created_at: DateTime<Utc>,
}

impl From<LogRow> for LogEntry {
    fn from(row: LogRow) -> Self {
        LogEntry {
            id: row.id,
            wallet_id: row.wallet_id,
            message: row.message,
            // Rows are only ever written from a LogLevel
            level: row.level.parse().unwrap_or(LogLevel::Info),
            timestamp: row.created_at,
        }
    }
}

pub async fn append_log(
    pool: &SqlitePool,
    wallet_id: Option<i64>,
    level: LogLevel,
    message: &str,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO bot_logs (wallet_id, message, level, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(wallet_id)
    .bind(message)
    .bind(level.as_str())
    .bind(Utc::now())
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(result.last_insert_rowid())
}

/// Newest entries first, optionally for a single wallet
pub async fn list_logs(
    pool: &SqlitePool,
    wallet_id: Option<i64>,
    limit: u32,
) -> Result<Vec<LogEntry>> {
    let mut query = String::from(
        r#"
        SELECT id, wallet_id, message, level, created_at
        FROM bot_logs
        "#,
    );

    if wallet_id.is_some() {
        query.push_str(" WHERE wallet_id = ?");
    }
    query.push_str(" ORDER BY id DESC LIMIT ?");

    let mut builder = sqlx::query_as::<_, LogRow>(&query);
    if let Some(id) = wallet_id {
        builder = builder.bind(id);
    }

    let rows = builder
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(rows.into_iter().map(LogEntry::from).collect())
}
