//! Balance repository.
//!
//! Every mutation is a single conditional statement so concurrent
//! settlements, deposits, and withdrawals on the same (user, symbol)
//! row cannot lose updates.

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use binopt_core::domain::Balance;
use binopt_core::traits::BalanceStore;

use crate::models::BalanceRow;

/// Repository for balance operations.
#[derive(Debug, Clone)]
pub struct PgBalanceStore {
    pool: PgPool,
}

impl PgBalanceStore {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BalanceStore for PgBalanceStore {
    async fn get(&self, user_id: Uuid, symbol: &str) -> Result<Option<Balance>> {
        let row = sqlx::query_as::<_, BalanceRow>(
            r#"
            SELECT user_id, symbol, available, locked
            FROM balances
            WHERE user_id = $1 AND symbol = $2
            "#,
        )
        .bind(user_id)
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Balance::from))
    }

    async fn deposit(&self, user_id: Uuid, symbol: &str, amount: Decimal) -> Result<Balance> {
        let row = sqlx::query_as::<_, BalanceRow>(
            r#"
            INSERT INTO balances (user_id, symbol, available, locked)
            VALUES ($1, $2, $3, 0)
            ON CONFLICT (user_id, symbol) DO UPDATE
            SET available = balances.available + EXCLUDED.available
            RETURNING user_id, symbol, available, locked
            "#,
        )
        .bind(user_id)
        .bind(symbol)
        .bind(amount)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn withdraw(&self, user_id: Uuid, symbol: &str, amount: Decimal) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE balances
            SET available = available - $3
            WHERE user_id = $1 AND symbol = $2 AND available >= $3
            "#,
        )
        .bind(user_id)
        .bind(symbol)
        .bind(amount)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn lock(&self, user_id: Uuid, symbol: &str, amount: Decimal) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE balances
            SET available = available - $3, locked = locked + $3
            WHERE user_id = $1 AND symbol = $2 AND available >= $3
            "#,
        )
        .bind(user_id)
        .bind(symbol)
        .bind(amount)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn settle(
        &self,
        user_id: Uuid,
        symbol: &str,
        amount: Decimal,
        profit: Decimal,
    ) -> Result<()> {
        // Credit is stake + profit: the full payout on a win, zero on a
        // total loss.
        sqlx::query(
            r#"
            UPDATE balances
            SET locked = locked - $3, available = available + $4
            WHERE user_id = $1 AND symbol = $2
            "#,
        )
        .bind(user_id)
        .bind(symbol)
        .bind(amount)
        .bind(amount + profit)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn refund(&self, user_id: Uuid, symbol: &str, amount: Decimal) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE balances
            SET locked = locked - $3, available = available + $3
            WHERE user_id = $1 AND symbol = $2
            "#,
        )
        .bind(user_id)
        .bind(symbol)
        .bind(amount)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
