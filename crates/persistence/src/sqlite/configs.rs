//! Wallet trading configuration persistence

use sqlx::SqlitePool;
use swapcycle_core::{Error, IntervalSpec, Result, WalletConfig};

#[derive(Debug, sqlx::FromRow)]
struct ConfigRow {
    wallet_id: i64,
    min_buy_amount: f64,
    max_buy_amount: f64,
    buy_slippage: f64,
    buy_interval_hours: i64,
    buy_interval_minutes: i64,
    buy_interval_seconds: i64,
    min_sell_amount: f64,
    max_sell_amount: f64,
    sell_slippage: f64,
    sell_interval_hours: i64,
    sell_interval_minutes: i64,
    sell_interval_seconds: i64,
    selected_token: String,
    selected_network: String,
    selected_dex: String,
}

fn interval(hours: i64, minutes: i64, seconds: i64) -> IntervalSpec {
    let clamp = |v: i64| v.clamp(0, u32::MAX as i64) as u32;
    IntervalSpec::new(clamp(hours), clamp(minutes), clamp(seconds))
}

impl From<ConfigRow> for WalletConfig {
    fn from(row: ConfigRow) -> Self {
        WalletConfig {
            wallet_id: row.wallet_id,
            min_buy_amount: row.min_buy_amount,
            max_buy_amount: row.max_buy_amount,
            buy_slippage: row.buy_slippage,
            buy_interval: interval(
                row.buy_interval_hours,
                row.buy_interval_minutes,
                row.buy_interval_seconds,
            ),
            min_sell_amount: row.min_sell_amount,
            max_sell_amount: row.max_sell_amount,
            sell_slippage: row.sell_slippage,
            sell_interval: interval(
                row.sell_interval_hours,
                row.sell_interval_minutes,
                row.sell_interval_seconds,
            ),
            selected_token: row.selected_token,
            selected_network: row.selected_network,
            selected_dex: row.selected_dex,
        }
    }
}

pub async fn get_config(pool: &SqlitePool, wallet_id: i64) -> Result<Option<WalletConfig>> {
    let row: Option<ConfigRow> = sqlx::query_as(
        r#"
        SELECT wallet_id, min_buy_amount, max_buy_amount, buy_slippage,
               buy_interval_hours, buy_interval_minutes, buy_interval_seconds,
               min_sell_amount, max_sell_amount, sell_slippage,
               sell_interval_hours, sell_interval_minutes, sell_interval_seconds,
               selected_token, selected_network, selected_dex
        FROM wallet_configurations
        WHERE wallet_id = ?
        "#,
    )
    .bind(wallet_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(row.map(WalletConfig::from))
}

/// Insert or replace the configuration for a wallet
pub async fn save_config(pool: &SqlitePool, config: &WalletConfig) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO wallet_configurations (
            wallet_id, min_buy_amount, max_buy_amount, buy_slippage,
            buy_interval_hours, buy_interval_minutes, buy_interval_seconds,
            min_sell_amount, max_sell_amount, sell_slippage,
            sell_interval_hours, sell_interval_minutes, sell_interval_seconds,
            selected_token, selected_network, selected_dex, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(wallet_id) DO UPDATE SET
            min_buy_amount = excluded.min_buy_amount,
            max_buy_amount = excluded.max_buy_amount,
            buy_slippage = excluded.buy_slippage,
            buy_interval_hours = excluded.buy_interval_hours,
            buy_interval_minutes = excluded.buy_interval_minutes,
            buy_interval_seconds = excluded.buy_interval_seconds,
            min_sell_amount = excluded.min_sell_amount,
            max_sell_amount = excluded.max_sell_amount,
            sell_slippage = excluded.sell_slippage,
            sell_interval_hours = excluded.sell_interval_hours,
            sell_interval_minutes = excluded.sell_interval_minutes,
            sell_interval_seconds = excluded.sell_interval_seconds,
            selected_token = excluded.selected_token,
            selected_network = excluded.selected_network,
            selected_dex = excluded.selected_dex,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(config.wallet_id)
    .bind(config.min_buy_amount)
    .bind(config.max_buy_amount)
    .bind(config.buy_slippage)
    .bind(config.buy_interval.hours as i64)
    .bind(config.buy_interval.minutes as i64)
    .bind(config.buy_interval.seconds as i64)
    .bind(config.min_sell_amount)
    .bind(config.max_sell_amount)
    .bind(config.sell_slippage)
    .bind(config.sell_interval.hours as i64)
    .bind(config.sell_interval.minutes as i64)
    .bind(config.sell_interval.seconds as i64)
    .bind(&config.selected_token)
    .bind(&config.selected_network)
    .bind(&config.selected_dex)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(())
}
