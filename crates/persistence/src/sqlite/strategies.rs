//! Wallet strategy (cycle progress) persistence

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use swapcycle_core::{Cycle, Error, Result, TradeDirection, WalletStrategy};

#[derive(Debug, sqlx::FromRow)]
struct StrategyRow {
    wallet_id: i64,
    remaining_buys: i64,
    remaining_sells: i64,
    operations_left: i64,
    operations: String,
    consecutive_buys: i64,
    consecutive_sells: i64,
    amount_variability: f64,
    time_variability: f64,
    base_success_prob: f64,
    market_bias: f64,
    last_operation_time: Option<DateTime<Utc>>,
}

fn counter(value: i64) -> u32 {
    value.clamp(0, u32::MAX as i64) as u32
}

impl TryFrom<StrategyRow> for WalletStrategy {
    type Error = Error;

    fn try_from(row: StrategyRow) -> Result<Self> {
        let operations: Vec<TradeDirection> = serde_json::from_str(&row.operations)?;
        Ok(WalletStrategy {
            wallet_id: row.wallet_id,
            current_cycle: Cycle {
                remaining_buys: counter(row.remaining_buys),
                remaining_sells: counter(row.remaining_sells),
                operations_left: counter(row.operations_left),
                operations,
            },
            consecutive_buys: counter(row.consecutive_buys),
            consecutive_sells: counter(row.consecutive_sells),
            amount_variability: row.amount_variability,
            time_variability: row.time_variability,
            base_success_prob: row.base_success_prob,
            market_bias: row.market_bias,
            last_operation_time: row.last_operation_time,
        })
    }
}

pub async fn get_strategy(pool: &SqlitePool, wallet_id: i64) -> Result<Option<WalletStrategy>> {
    let row: Option<StrategyRow> = sqlx::query_as(
        r#"
        SELECT wallet_id, remaining_buys, remaining_sells, operations_left, operations,
               consecutive_buys, consecutive_sells, amount_variability, time_variability,
               base_success_prob, market_bias, last_operation_time
        FROM wallet_strategies
        WHERE wallet_id = ?
        "#,
    )
    .bind(wallet_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    row.map(WalletStrategy::try_from).transpose()
}

/// Insert or replace the strategy for a wallet
pub async fn save_strategy(pool: &SqlitePool, strategy: &WalletStrategy) -> Result<()> {
    let cycle = &strategy.current_cycle;
    let operations = serde_json::to_string(&cycle.operations)?;

    sqlx::query(
        r#"
        INSERT INTO wallet_strategies (
            wallet_id, remaining_buys, remaining_sells, operations_left, operations,
            consecutive_buys, consecutive_sells, amount_variability, time_variability,
            base_success_prob, market_bias, last_operation_time, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(wallet_id) DO UPDATE SET
            remaining_buys = excluded.remaining_buys,
            remaining_sells = excluded.remaining_sells,
            operations_left = excluded.operations_left,
            operations = excluded.operations,
            consecutive_buys = excluded.consecutive_buys,
            consecutive_sells = excluded.consecutive_sells,
            amount_variability = excluded.amount_variability,
            time_variability = excluded.time_variability,
            base_success_prob = excluded.base_success_prob,
            market_bias = excluded.market_bias,
            last_operation_time = excluded.last_operation_time,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(strategy.wallet_id)
    .bind(cycle.remaining_buys as i64)
    .bind(cycle.remaining_sells as i64)
    .bind(cycle.operations_left as i64)
    .bind(operations)
    .bind(strategy.consecutive_buys as i64)
    .bind(strategy.consecutive_sells as i64)
    .bind(strategy.amount_variability)
    .bind(strategy.time_variability)
    .bind(strategy.base_success_prob)
    .bind(strategy.market_bias)
    .bind(strategy.last_operation_time)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::create_wallet;
    use crate::{Database, KeyEncryptor};
    use chrono::TimeZone;
    use TradeDirection::{Buy, Sell};

    #[tokio::test]
    async fn test_strategy_roundtrip_keeps_order_and_time() {
        let db = Database::connect_in_memory().await.unwrap();
        let sealed = KeyEncryptor::from_password("pw").unwrap().encrypt("k").unwrap();
        let id = create_wallet(
            db.pool(),
            "0x9965507D1a55bcC2695C58ba16FB37d819B0A4dc",
            "w",
            &sealed,
            false,
        )
        .await
        .unwrap();

        let mut strategy = WalletStrategy {
            wallet_id: id,
            current_cycle: Cycle {
                remaining_buys: 4,
                remaining_sells: 5,
                operations_left: 9,
                operations: vec![Buy, Sell, Sell, Buy, Sell, Buy, Buy, Sell, Sell, Buy],
            },
            consecutive_buys: 1,
            consecutive_sells: 0,
            amount_variability: 0.42,
            time_variability: 0.33,
            base_success_prob: 0.9,
            market_bias: -0.1,
            last_operation_time: None,
        };
        save_strategy(db.pool(), &strategy).await.unwrap();
        assert_eq!(get_strategy(db.pool(), id).await.unwrap().unwrap(), strategy);

        strategy.last_operation_time = Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        strategy.current_cycle.operations_left = 8;
        strategy.current_cycle.remaining_sells = 4;
        save_strategy(db.pool(), &strategy).await.unwrap();

        let stored = get_strategy(db.pool(), id).await.unwrap().unwrap();
        assert_eq!(stored, strategy);
        assert!(stored.current_cycle.is_consistent());
    }
}
