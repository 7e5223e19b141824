//! Store and price-feed seams.
//!
//! The engine only talks to these traits; Postgres repositories and the
//! in-memory test stores are interchangeable behind them. Conditional
//! mutations (`lock`, `settle`, `cancel`) must be atomic in the
//! implementation: a single statement or a single critical section, so
//! concurrent settlements and deposits cannot lose updates.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{Balance, OutcomeControl, PriceQuote, Trade};

#[async_trait]
pub trait TradeStore: Send + Sync {
    async fn insert(&self, trade: &Trade) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Trade>>;

    /// Most recent trades for a user, newest first.
    async fn list_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<Trade>>;

    /// All active trades, due or not. Used by the startup recovery pass
    /// to re-arm timers after a restart.
    async fn list_active(&self) -> Result<Vec<Trade>>;

    /// Active trades whose expiry has passed. The durable due-time
    /// index behind the recovery sweep.
    async fn list_active_due(&self, now: DateTime<Utc>) -> Result<Vec<Trade>>;

    /// Transitions an active trade to completed, recording the outcome.
    /// Returns false when the trade was not active, which makes
    /// settlement at-most-once under duplicate timers.
    async fn settle(
        &self,
        id: Uuid,
        exit_price: Decimal,
        profit: Decimal,
        completed_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Transitions an active trade owned by `user_id` to cancelled.
    /// Returns the trade as it was before cancellation, or `None` when
    /// it was terminal or owned by someone else.
    async fn cancel(&self, id: Uuid, user_id: Uuid) -> Result<Option<Trade>>;
}

#[async_trait]
pub trait BalanceStore: Send + Sync {
    /// Current balance, or `None` when the pair has no row yet.
    async fn get(&self, user_id: Uuid, symbol: &str) -> Result<Option<Balance>>;

    /// Credits available funds, creating the row if needed.
    async fn deposit(&self, user_id: Uuid, symbol: &str, amount: Decimal) -> Result<Balance>;

    /// Debits available funds. Returns false when funds are short.
    async fn withdraw(&self, user_id: Uuid, symbol: &str, amount: Decimal) -> Result<bool>;

    /// Moves `amount` from available to locked, conditional on
    /// sufficient available funds. Returns false when short.
    async fn lock(&self, user_id: Uuid, symbol: &str, amount: Decimal) -> Result<bool>;

    /// Releases `amount` from locked and applies the settlement credit
    /// (`amount + profit`, which is zero on a full loss) to available,
    /// as one atomic mutation.
    async fn settle(
        &self,
        user_id: Uuid,
        symbol: &str,
        amount: Decimal,
        profit: Decimal,
    ) -> Result<()>;

    /// Returns a cancelled trade's stake from locked to available.
    async fn refund(&self, user_id: Uuid, symbol: &str, amount: Decimal) -> Result<()>;
}

#[async_trait]
pub trait ControlStore: Send + Sync {
    /// The user's active outcome override, if any.
    async fn get_active(&self, user_id: Uuid) -> Result<Option<OutcomeControl>>;

    async fn upsert(&self, control: &OutcomeControl) -> Result<()>;
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Latest quote for a symbol. `None` surfaces as `PriceUnavailable`.
    async fn latest(&self, symbol: &str) -> Result<Option<PriceQuote>>;

    /// Latest quote for every tracked symbol.
    async fn snapshot(&self) -> Result<Vec<PriceQuote>>;
}
