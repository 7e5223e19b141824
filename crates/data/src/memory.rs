//! In-memory store implementations.
//!
//! Back the engine in tests and in `binopt simulate`, where no Postgres
//! is available. Each mutation runs inside one mutex critical section,
//! which gives the same atomicity the Postgres repositories get from
//! single conditional statements.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use binopt_core::domain::{Balance, OutcomeControl, Trade, TradeStatus};
use binopt_core::traits::{BalanceStore, ControlStore, TradeStore};

#[derive(Debug, Default)]
pub struct MemoryTradeStore {
    trades: Mutex<HashMap<Uuid, Trade>>,
}

impl MemoryTradeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TradeStore for MemoryTradeStore {
    async fn insert(&self, trade: &Trade) -> Result<()> {
        self.trades.lock().await.insert(trade.id, trade.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Trade>> {
        Ok(self.trades.lock().await.get(&id).cloned())
    }

    async fn list_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<Trade>> {
        let mut trades: Vec<Trade> = self
            .trades
            .lock()
            .await
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        trades.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        trades.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(trades)
    }

    async fn list_active(&self) -> Result<Vec<Trade>> {
        let mut trades: Vec<Trade> = self
            .trades
            .lock()
            .await
            .values()
            .filter(|t| t.is_active())
            .cloned()
            .collect();
        trades.sort_by_key(|t| t.expires_at);
        Ok(trades)
    }

    async fn list_active_due(&self, now: DateTime<Utc>) -> Result<Vec<Trade>> {
        let mut trades: Vec<Trade> = self
            .trades
            .lock()
            .await
            .values()
            .filter(|t| t.is_active() && t.expires_at <= now)
            .cloned()
            .collect();
        trades.sort_by_key(|t| t.expires_at);
        Ok(trades)
    }

    async fn settle(
        &self,
        id: Uuid,
        exit_price: Decimal,
        profit: Decimal,
        completed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut trades = self.trades.lock().await;
        match trades.get_mut(&id) {
            Some(trade) if trade.is_active() => {
                trade.status = TradeStatus::Completed;
                trade.exit_price = Some(exit_price);
                trade.profit = Some(profit);
                trade.completed_at = Some(completed_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn cancel(&self, id: Uuid, user_id: Uuid) -> Result<Option<Trade>> {
        let mut trades = self.trades.lock().await;
        match trades.get_mut(&id) {
            Some(trade) if trade.is_active() && trade.user_id == user_id => {
                trade.status = TradeStatus::Cancelled;
                trade.completed_at = Some(Utc::now());
                Ok(Some(trade.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryBalanceStore {
    balances: Mutex<HashMap<(Uuid, String), Balance>>,
}

impl MemoryBalanceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BalanceStore for MemoryBalanceStore {
    async fn get(&self, user_id: Uuid, symbol: &str) -> Result<Option<Balance>> {
        Ok(self
            .balances
            .lock()
            .await
            .get(&(user_id, symbol.to_string()))
            .cloned())
    }

    async fn deposit(&self, user_id: Uuid, symbol: &str, amount: Decimal) -> Result<Balance> {
        let mut balances = self.balances.lock().await;
        let entry = balances
            .entry((user_id, symbol.to_string()))
            .or_insert_with(|| Balance::zero(user_id, symbol.to_string()));
        entry.available += amount;
        Ok(entry.clone())
    }

    async fn withdraw(&self, user_id: Uuid, symbol: &str, amount: Decimal) -> Result<bool> {
        let mut balances = self.balances.lock().await;
        match balances.get_mut(&(user_id, symbol.to_string())) {
            Some(balance) if balance.available >= amount => {
                balance.available -= amount;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn lock(&self, user_id: Uuid, symbol: &str, amount: Decimal) -> Result<bool> {
        let mut balances = self.balances.lock().await;
        match balances.get_mut(&(user_id, symbol.to_string())) {
            Some(balance) if balance.available >= amount => {
                balance.available -= amount;
                balance.locked += amount;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn settle(
        &self,
        user_id: Uuid,
        symbol: &str,
        amount: Decimal,
        profit: Decimal,
    ) -> Result<()> {
        let mut balances = self.balances.lock().await;
        if let Some(balance) = balances.get_mut(&(user_id, symbol.to_string())) {
            balance.locked -= amount;
            balance.available += amount + profit;
        }
        Ok(())
    }

    async fn refund(&self, user_id: Uuid, symbol: &str, amount: Decimal) -> Result<()> {
        self.settle(user_id, symbol, amount, Decimal::ZERO).await
    }
}

#[derive(Debug, Default)]
pub struct MemoryControlStore {
    controls: Mutex<HashMap<Uuid, OutcomeControl>>,
}

impl MemoryControlStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ControlStore for MemoryControlStore {
    async fn get_active(&self, user_id: Uuid) -> Result<Option<OutcomeControl>> {
        Ok(self
            .controls
            .lock()
            .await
            .get(&user_id)
            .filter(|c| c.is_active)
            .cloned())
    }

    async fn upsert(&self, control: &OutcomeControl) -> Result<()> {
        self.controls
            .lock()
            .await
            .insert(control.user_id, control.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binopt_core::domain::{ControlType, Direction};
    use rust_decimal_macros::dec;

    fn sample_trade(user_id: Uuid) -> Trade {
        Trade::open(
            user_id,
            "BTCUSDT".to_string(),
            Direction::Up,
            dec!(100),
            dec!(50000),
            30,
        )
    }

    #[tokio::test]
    async fn settle_is_at_most_once() {
        let store = MemoryTradeStore::new();
        let trade = sample_trade(Uuid::new_v4());
        store.insert(&trade).await.unwrap();

        let first = store
            .settle(trade.id, dec!(50100), dec!(10), Utc::now())
            .await
            .unwrap();
        let second = store
            .settle(trade.id, dec!(49000), dec!(-100), Utc::now())
            .await
            .unwrap();

        assert!(first);
        assert!(!second);

        let settled = store.get(trade.id).await.unwrap().unwrap();
        assert_eq!(settled.exit_price, Some(dec!(50100)));
        assert_eq!(settled.profit, Some(dec!(10)));
    }

    #[tokio::test]
    async fn cancel_requires_ownership_and_active_status() {
        let store = MemoryTradeStore::new();
        let owner = Uuid::new_v4();
        let trade = sample_trade(owner);
        store.insert(&trade).await.unwrap();

        assert!(store.cancel(trade.id, Uuid::new_v4()).await.unwrap().is_none());
        assert!(store.cancel(trade.id, owner).await.unwrap().is_some());
        // Already cancelled.
        assert!(store.cancel(trade.id, owner).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lock_fails_without_funds() {
        let store = MemoryBalanceStore::new();
        let user = Uuid::new_v4();

        assert!(!store.lock(user, "BTCUSDT", dec!(100)).await.unwrap());

        store.deposit(user, "BTCUSDT", dec!(150)).await.unwrap();
        assert!(store.lock(user, "BTCUSDT", dec!(100)).await.unwrap());

        let balance = store.get(user, "BTCUSDT").await.unwrap().unwrap();
        assert_eq!(balance.available, dec!(50));
        assert_eq!(balance.locked, dec!(100));

        // Second lock exceeds the remainder.
        assert!(!store.lock(user, "BTCUSDT", dec!(100)).await.unwrap());
    }

    #[tokio::test]
    async fn settle_credits_stake_plus_profit() {
        let store = MemoryBalanceStore::new();
        let user = Uuid::new_v4();
        store.deposit(user, "BTCUSDT", dec!(100)).await.unwrap();
        store.lock(user, "BTCUSDT", dec!(100)).await.unwrap();

        store.settle(user, "BTCUSDT", dec!(100), dec!(10)).await.unwrap();

        let balance = store.get(user, "BTCUSDT").await.unwrap().unwrap();
        assert_eq!(balance.available, dec!(110));
        assert_eq!(balance.locked, dec!(0));
    }

    #[tokio::test]
    async fn full_loss_returns_nothing_to_available() {
        let store = MemoryBalanceStore::new();
        let user = Uuid::new_v4();
        store.deposit(user, "BTCUSDT", dec!(100)).await.unwrap();
        store.lock(user, "BTCUSDT", dec!(100)).await.unwrap();

        store
            .settle(user, "BTCUSDT", dec!(100), dec!(-100))
            .await
            .unwrap();

        let balance = store.get(user, "BTCUSDT").await.unwrap().unwrap();
        assert_eq!(balance.available, dec!(0));
        assert_eq!(balance.locked, dec!(0));
    }

    #[tokio::test]
    async fn inactive_control_reads_as_absent() {
        let store = MemoryControlStore::new();
        let user = Uuid::new_v4();

        let mut control = OutcomeControl::new(user, ControlType::Win, None);
        store.upsert(&control).await.unwrap();
        assert!(store.get_active(user).await.unwrap().is_some());

        control.is_active = false;
        store.upsert(&control).await.unwrap();
        assert!(store.get_active(user).await.unwrap().is_none());
    }
}
