//! Row types for the Postgres repositories.
//!
//! Direction, status, and control type travel as text columns and are
//! parsed back into the core enums when rows are mapped.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use binopt_core::domain::{Balance, OutcomeControl, Trade};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TradeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub symbol: String,
    pub direction: String,
    pub amount: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Option<Decimal>,
    pub duration_secs: i32,
    pub status: String,
    pub profit: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<TradeRow> for Trade {
    type Error = anyhow::Error;

    fn try_from(row: TradeRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            symbol: row.symbol,
            direction: row.direction.parse().map_err(|e: String| anyhow!(e))?,
            amount: row.amount,
            entry_price: row.entry_price,
            exit_price: row.exit_price,
            duration_secs: u32::try_from(row.duration_secs)?,
            status: row.status.parse().map_err(|e: String| anyhow!(e))?,
            profit: row.profit,
            created_at: row.created_at,
            expires_at: row.expires_at,
            completed_at: row.completed_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BalanceRow {
    pub user_id: Uuid,
    pub symbol: String,
    pub available: Decimal,
    pub locked: Decimal,
}

impl From<BalanceRow> for Balance {
    fn from(row: BalanceRow) -> Self {
        Self {
            user_id: row.user_id,
            symbol: row.symbol,
            available: row.available,
            locked: row.locked,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OutcomeControlRow {
    pub user_id: Uuid,
    pub control_type: String,
    pub is_active: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<OutcomeControlRow> for OutcomeControl {
    type Error = anyhow::Error;

    fn try_from(row: OutcomeControlRow) -> Result<Self> {
        Ok(Self {
            user_id: row.user_id,
            control_type: row.control_type.parse().map_err(|e: String| anyhow!(e))?,
            is_active: row.is_active,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
