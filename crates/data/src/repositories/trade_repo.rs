//! Trade repository.
//!
//! State transitions are single conditional UPDATEs keyed on
//! `status = 'active'`, so settlement and cancellation are at-most-once
//! even under duplicate timers or racing requests.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use binopt_core::domain::Trade;
use binopt_core::traits::TradeStore;

use crate::models::TradeRow;

const TRADE_COLUMNS: &str = "id, user_id, symbol, direction, amount, entry_price, exit_price, \
                             duration_secs, status, profit, created_at, expires_at, completed_at";

/// Repository for trade operations.
#[derive(Debug, Clone)]
pub struct PgTradeStore {
    pool: PgPool,
}

impl PgTradeStore {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TradeStore for PgTradeStore {
    async fn insert(&self, trade: &Trade) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trades
                (id, user_id, symbol, direction, amount, entry_price, duration_secs,
                 status, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(trade.id)
        .bind(trade.user_id)
        .bind(&trade.symbol)
        .bind(trade.direction.as_str())
        .bind(trade.amount)
        .bind(trade.entry_price)
        .bind(i32::try_from(trade.duration_secs)?)
        .bind(trade.status.as_str())
        .bind(trade.created_at)
        .bind(trade.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Trade>> {
        let row = sqlx::query_as::<_, TradeRow>(&format!(
            "SELECT {TRADE_COLUMNS} FROM trades WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Trade::try_from).transpose()
    }

    async fn list_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<Trade>> {
        let rows = sqlx::query_as::<_, TradeRow>(&format!(
            "SELECT {TRADE_COLUMNS} FROM trades \
             WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Trade::try_from).collect()
    }

    async fn list_active(&self) -> Result<Vec<Trade>> {
        let rows = sqlx::query_as::<_, TradeRow>(&format!(
            "SELECT {TRADE_COLUMNS} FROM trades \
             WHERE status = 'active' ORDER BY expires_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Trade::try_from).collect()
    }

    async fn list_active_due(&self, now: DateTime<Utc>) -> Result<Vec<Trade>> {
        let rows = sqlx::query_as::<_, TradeRow>(&format!(
            "SELECT {TRADE_COLUMNS} FROM trades \
             WHERE status = 'active' AND expires_at <= $1 ORDER BY expires_at ASC"
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Trade::try_from).collect()
    }

    async fn settle(
        &self,
        id: Uuid,
        exit_price: Decimal,
        profit: Decimal,
        completed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE trades
            SET status = 'completed', exit_price = $2, profit = $3, completed_at = $4
            WHERE id = $1 AND status = 'active'
            "#,
        )
        .bind(id)
        .bind(exit_price)
        .bind(profit)
        .bind(completed_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn cancel(&self, id: Uuid, user_id: Uuid) -> Result<Option<Trade>> {
        let row = sqlx::query_as::<_, TradeRow>(&format!(
            "UPDATE trades SET status = 'cancelled', completed_at = $3 \
             WHERE id = $1 AND user_id = $2 AND status = 'active' \
             RETURNING {TRADE_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Trade::try_from).transpose()
    }
}
