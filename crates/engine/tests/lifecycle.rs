//! End-to-end trade lifecycle tests against the in-memory stores and a
//! hand-driven price source.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use binopt_core::domain::{ControlType, Direction, OutcomeControl, Trade, TradeStatus};
use binopt_core::error::TradeError;
use binopt_core::traits::{BalanceStore, ControlStore, TradeStore};
use binopt_data::{MemoryBalanceStore, MemoryControlStore, MemoryTradeStore};
use binopt_engine::{scheduler, TradeEngine};
use binopt_feed::ManualPriceSource;

struct Harness {
    engine: Arc<TradeEngine>,
    trades: Arc<MemoryTradeStore>,
    balances: Arc<MemoryBalanceStore>,
    controls: Arc<MemoryControlStore>,
    prices: Arc<ManualPriceSource>,
}

fn harness() -> Harness {
    let trades = Arc::new(MemoryTradeStore::new());
    let balances = Arc::new(MemoryBalanceStore::new());
    let controls = Arc::new(MemoryControlStore::new());
    let prices = Arc::new(ManualPriceSource::new());

    let engine = Arc::new(TradeEngine::new(
        Arc::clone(&trades) as Arc<dyn binopt_core::traits::TradeStore>,
        Arc::clone(&balances) as Arc<dyn binopt_core::traits::BalanceStore>,
        Arc::clone(&controls) as Arc<dyn binopt_core::traits::ControlStore>,
        Arc::clone(&prices) as Arc<dyn binopt_core::traits::PriceSource>,
    ));

    Harness {
        engine,
        trades,
        balances,
        controls,
        prices,
    }
}

async fn fund(h: &Harness, user: Uuid, amount: Decimal) {
    h.engine.deposit(user, "BTCUSDT", amount).await.unwrap();
}

#[tokio::test]
async fn win_scenario_pays_ten_percent_on_thirty_seconds() {
    let h = harness();
    let user = Uuid::new_v4();
    fund(&h, user, dec!(1000)).await;
    h.prices.set("BTCUSDT", dec!(50000)).await;

    let trade = h
        .engine
        .place(user, "BTCUSDT", Direction::Up, dec!(100), 30)
        .await
        .unwrap();
    assert_eq!(trade.entry_price, dec!(50000));

    let locked = h.engine.balance(user, "BTCUSDT").await.unwrap();
    assert_eq!(locked.available, dec!(900));
    assert_eq!(locked.locked, dec!(100));

    h.prices.set("BTCUSDT", dec!(50100)).await;
    assert!(h.engine.settle(trade.id).await.unwrap());

    let settled = h.trades.get(trade.id).await.unwrap().unwrap();
    assert_eq!(settled.status, TradeStatus::Completed);
    assert_eq!(settled.exit_price, Some(dec!(50100)));
    assert_eq!(settled.profit, Some(dec!(10.00)));
    assert!(settled.completed_at.is_some());

    let after = h.engine.balance(user, "BTCUSDT").await.unwrap();
    assert_eq!(after.available, dec!(1010.00));
    assert_eq!(after.locked, dec!(0));
}

#[tokio::test]
async fn loss_scenario_forfeits_the_stake() {
    let h = harness();
    let user = Uuid::new_v4();
    fund(&h, user, dec!(1000)).await;
    h.prices.set("BTCUSDT", dec!(50000)).await;

    let trade = h
        .engine
        .place(user, "BTCUSDT", Direction::Up, dec!(100), 30)
        .await
        .unwrap();

    h.prices.set("BTCUSDT", dec!(49900)).await;
    assert!(h.engine.settle(trade.id).await.unwrap());

    let settled = h.trades.get(trade.id).await.unwrap().unwrap();
    assert_eq!(settled.profit, Some(dec!(-100)));

    let after = h.engine.balance(user, "BTCUSDT").await.unwrap();
    assert_eq!(after.available, dec!(900));
    assert_eq!(after.locked, dec!(0));
}

#[tokio::test]
async fn balance_is_conserved_across_a_lifecycle() {
    let h = harness();
    let user = Uuid::new_v4();
    fund(&h, user, dec!(500)).await;
    h.prices.set("BTCUSDT", dec!(50000)).await;

    let before = h.engine.balance(user, "BTCUSDT").await.unwrap().total();
    let trade = h
        .engine
        .place(user, "BTCUSDT", Direction::Down, dec!(50), 300)
        .await
        .unwrap();

    h.prices.set("BTCUSDT", dec!(49000)).await;
    h.engine.settle(trade.id).await.unwrap();

    let settled = h.trades.get(trade.id).await.unwrap().unwrap();
    let profit = settled.profit.unwrap();
    assert_eq!(profit, dec!(25.00)); // 50% bucket

    let after = h.engine.balance(user, "BTCUSDT").await.unwrap();
    assert_eq!(after.total(), before + profit);
}

#[tokio::test]
async fn lose_override_beats_a_winning_market() {
    let h = harness();
    let user = Uuid::new_v4();
    fund(&h, user, dec!(1000)).await;
    h.prices.set("BTCUSDT", dec!(50000)).await;

    h.controls
        .upsert(&OutcomeControl::new(user, ControlType::Lose, None))
        .await
        .unwrap();

    let trade = h
        .engine
        .place(user, "BTCUSDT", Direction::Up, dec!(100), 30)
        .await
        .unwrap();

    // Market moved the trader's way; the override still loses.
    h.prices.set("BTCUSDT", dec!(51000)).await;
    h.engine.settle(trade.id).await.unwrap();

    let settled = h.trades.get(trade.id).await.unwrap().unwrap();
    assert_eq!(settled.profit, Some(dec!(-100)));
    assert!(settled.exit_price.unwrap() < dec!(50000));
}

#[tokio::test]
async fn win_override_beats_a_losing_market() {
    let h = harness();
    let user = Uuid::new_v4();
    fund(&h, user, dec!(1000)).await;
    h.prices.set("BTCUSDT", dec!(50000)).await;

    h.controls
        .upsert(&OutcomeControl::new(user, ControlType::Win, None))
        .await
        .unwrap();

    let trade = h
        .engine
        .place(user, "BTCUSDT", Direction::Up, dec!(100), 60)
        .await
        .unwrap();

    h.prices.set("BTCUSDT", dec!(48000)).await;
    h.engine.settle(trade.id).await.unwrap();

    let settled = h.trades.get(trade.id).await.unwrap().unwrap();
    assert_eq!(settled.profit, Some(dec!(15.00))); // 15% bucket
    assert!(settled.exit_price.unwrap() > dec!(50000));
}

#[tokio::test]
async fn settlement_is_idempotent() {
    let h = harness();
    let user = Uuid::new_v4();
    fund(&h, user, dec!(1000)).await;
    h.prices.set("BTCUSDT", dec!(50000)).await;

    let mut events = h.engine.subscribe();
    let trade = h
        .engine
        .place(user, "BTCUSDT", Direction::Up, dec!(100), 30)
        .await
        .unwrap();

    h.prices.set("BTCUSDT", dec!(50100)).await;
    assert!(h.engine.settle(trade.id).await.unwrap());
    assert!(!h.engine.settle(trade.id).await.unwrap());
    assert!(!h.engine.settle(trade.id).await.unwrap());

    // Balance applied exactly once.
    let after = h.engine.balance(user, "BTCUSDT").await.unwrap();
    assert_eq!(after.available, dec!(1010.00));

    // Exactly one event broadcast.
    assert!(events.try_recv().is_ok());
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn cancel_refunds_and_disarms() {
    let h = harness();
    let user = Uuid::new_v4();
    fund(&h, user, dec!(1000)).await;
    h.prices.set("BTCUSDT", dec!(50000)).await;

    let trade = h
        .engine
        .place(user, "BTCUSDT", Direction::Up, dec!(100), 600)
        .await
        .unwrap();
    assert_eq!(h.engine.armed_timers().await, 1);

    assert!(h.engine.cancel(trade.id, user).await.unwrap());
    assert_eq!(h.engine.armed_timers().await, 0);

    let cancelled = h.trades.get(trade.id).await.unwrap().unwrap();
    assert_eq!(cancelled.status, TradeStatus::Cancelled);
    assert!(cancelled.exit_price.is_none());
    assert!(cancelled.profit.is_none());

    let after = h.engine.balance(user, "BTCUSDT").await.unwrap();
    assert_eq!(after.available, dec!(1000));
    assert_eq!(after.locked, dec!(0));

    // No settlement side effects fire later.
    assert!(!h.engine.settle(trade.id).await.unwrap());
    assert!(!h.engine.cancel(trade.id, user).await.unwrap());
}

#[tokio::test]
async fn cancel_rejects_non_owners() {
    let h = harness();
    let user = Uuid::new_v4();
    fund(&h, user, dec!(1000)).await;
    h.prices.set("BTCUSDT", dec!(50000)).await;

    let trade = h
        .engine
        .place(user, "BTCUSDT", Direction::Up, dec!(100), 30)
        .await
        .unwrap();

    assert!(!h.engine.cancel(trade.id, Uuid::new_v4()).await.unwrap());
    let unchanged = h.trades.get(trade.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, TradeStatus::Active);
}

#[tokio::test]
async fn placement_validations() {
    let h = harness();
    let user = Uuid::new_v4();
    fund(&h, user, dec!(1000)).await;
    h.prices.set("BTCUSDT", dec!(50000)).await;

    let err = h
        .engine
        .place(user, "BTCUSDT", Direction::Up, dec!(100), 45)
        .await
        .unwrap_err();
    assert!(matches!(err, TradeError::InvalidDuration(45)));

    let err = h
        .engine
        .place(user, "BTCUSDT", Direction::Up, dec!(5), 30)
        .await
        .unwrap_err();
    assert!(matches!(err, TradeError::Validation(_)));

    let err = h
        .engine
        .place(user, "ETHUSDT", Direction::Up, dec!(100), 30)
        .await
        .unwrap_err();
    assert!(matches!(err, TradeError::PriceUnavailable(_)));

    let err = h
        .engine
        .place(user, "BTCUSDT", Direction::Up, dec!(5000), 30)
        .await
        .unwrap_err();
    assert!(matches!(err, TradeError::InsufficientBalance { .. }));

    // Failed placements leave the balance untouched.
    let balance = h.engine.balance(user, "BTCUSDT").await.unwrap();
    assert_eq!(balance.available, dec!(1000));
    assert_eq!(balance.locked, dec!(0));
}

#[tokio::test]
async fn price_outage_leaves_trade_active_for_retry() {
    let h = harness();
    let user = Uuid::new_v4();
    fund(&h, user, dec!(1000)).await;
    h.prices.set("BTCUSDT", dec!(50000)).await;

    let trade = h
        .engine
        .place(user, "BTCUSDT", Direction::Up, dec!(100), 30)
        .await
        .unwrap();

    h.prices.clear("BTCUSDT").await;
    let err = h.engine.settle(trade.id).await.unwrap_err();
    assert!(matches!(err, TradeError::PriceUnavailable(_)));

    let still_active = h.trades.get(trade.id).await.unwrap().unwrap();
    assert_eq!(still_active.status, TradeStatus::Active);

    // Feed comes back; retry succeeds.
    h.prices.set("BTCUSDT", dec!(50200)).await;
    assert!(h.engine.settle(trade.id).await.unwrap());
}

#[tokio::test]
async fn sweep_settles_overdue_trades() {
    let h = harness();
    let user = Uuid::new_v4();
    h.prices.set("BTCUSDT", dec!(50100)).await;

    // An overdue active trade, as left behind by a crashed process.
    h.balances.deposit(user, "BTCUSDT", dec!(100)).await.unwrap();
    h.balances.lock(user, "BTCUSDT", dec!(100)).await.unwrap();
    let mut trade = Trade::open(
        user,
        "BTCUSDT".to_string(),
        Direction::Up,
        dec!(100),
        dec!(50000),
        30,
    );
    trade.created_at = Utc::now() - ChronoDuration::seconds(90);
    trade.expires_at = Utc::now() - ChronoDuration::seconds(60);
    h.trades.insert(&trade).await.unwrap();

    let settled = scheduler::sweep_once(&h.engine).await.unwrap();
    assert_eq!(settled, 1);

    let done = h.trades.get(trade.id).await.unwrap().unwrap();
    assert_eq!(done.status, TradeStatus::Completed);
    assert_eq!(done.profit, Some(dec!(10.00)));
}

#[tokio::test]
async fn recovery_settles_due_and_rearms_future_trades() {
    let h = harness();
    let user = Uuid::new_v4();
    h.prices.set("BTCUSDT", dec!(49000)).await;

    for secs_ago in [60_i64, -300] {
        h.balances.deposit(user, "BTCUSDT", dec!(100)).await.unwrap();
        h.balances.lock(user, "BTCUSDT", dec!(100)).await.unwrap();
        let mut trade = Trade::open(
            user,
            "BTCUSDT".to_string(),
            Direction::Up,
            dec!(100),
            dec!(50000),
            300,
        );
        trade.expires_at = Utc::now() - ChronoDuration::seconds(secs_ago);
        h.trades.insert(&trade).await.unwrap();
    }

    let recovered = scheduler::recover(&h.engine).await.unwrap();
    assert_eq!(recovered, 2);

    // The overdue trade settled, the future one got a timer back.
    assert_eq!(h.trades.list_active().await.unwrap().len(), 1);
    assert_eq!(h.engine.armed_timers().await, 1);
}

#[tokio::test]
async fn event_sequence_is_monotonic() {
    let h = harness();
    let user = Uuid::new_v4();
    fund(&h, user, dec!(1000)).await;
    h.prices.set("BTCUSDT", dec!(50000)).await;

    let mut events = h.engine.subscribe();

    let first = h
        .engine
        .place(user, "BTCUSDT", Direction::Up, dec!(100), 30)
        .await
        .unwrap();
    let second = h
        .engine
        .place(user, "BTCUSDT", Direction::Down, dec!(100), 30)
        .await
        .unwrap();

    h.prices.set("BTCUSDT", dec!(50100)).await;
    h.engine.settle(first.id).await.unwrap();
    h.engine.settle(second.id).await.unwrap();

    let e1 = events.recv().await.unwrap();
    let e2 = events.recv().await.unwrap();
    assert!(e1.seq < e2.seq);
    assert_eq!(e1.trade_id, first.id);
    assert!(e1.won);
    assert!(!e2.won);
    // Events always carry authoritative prices.
    assert_eq!(e1.entry_price, dec!(50000));
    assert_eq!(e1.exit_price, dec!(50100));
}

/// Trade store whose inserts always fail, for exercising the
/// compensating refund during placement.
struct InsertFailingStore;

#[async_trait::async_trait]
impl TradeStore for InsertFailingStore {
    async fn insert(&self, _trade: &Trade) -> anyhow::Result<()> {
        anyhow::bail!("insert rejected")
    }

    async fn get(&self, _id: Uuid) -> anyhow::Result<Option<Trade>> {
        Ok(None)
    }

    async fn list_for_user(&self, _user_id: Uuid, _limit: i64) -> anyhow::Result<Vec<Trade>> {
        Ok(Vec::new())
    }

    async fn list_active(&self) -> anyhow::Result<Vec<Trade>> {
        Ok(Vec::new())
    }

    async fn list_active_due(
        &self,
        _now: chrono::DateTime<Utc>,
    ) -> anyhow::Result<Vec<Trade>> {
        Ok(Vec::new())
    }

    async fn settle(
        &self,
        _id: Uuid,
        _exit_price: Decimal,
        _profit: Decimal,
        _completed_at: chrono::DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        Ok(false)
    }

    async fn cancel(&self, _id: Uuid, _user_id: Uuid) -> anyhow::Result<Option<Trade>> {
        Ok(None)
    }
}

#[tokio::test]
async fn failed_insert_refunds_the_locked_stake() {
    let balances = Arc::new(MemoryBalanceStore::new());
    let prices = Arc::new(ManualPriceSource::new());
    prices.set("BTCUSDT", dec!(50000)).await;

    let engine = Arc::new(TradeEngine::new(
        Arc::new(InsertFailingStore) as Arc<dyn TradeStore>,
        Arc::clone(&balances) as Arc<dyn BalanceStore>,
        Arc::new(MemoryControlStore::new()) as Arc<dyn ControlStore>,
        Arc::clone(&prices) as Arc<dyn binopt_core::traits::PriceSource>,
    ));

    let user = Uuid::new_v4();
    engine.deposit(user, "BTCUSDT", dec!(1000)).await.unwrap();

    let err = engine
        .place(user, "BTCUSDT", Direction::Up, dec!(100), 30)
        .await
        .unwrap_err();
    assert!(matches!(err, TradeError::Internal(_)));

    // The stake locked before the insert came back.
    let balance = engine.balance(user, "BTCUSDT").await.unwrap();
    assert_eq!(balance.available, dec!(1000));
    assert_eq!(balance.locked, dec!(0));
}

#[tokio::test(start_paused = true)]
async fn timer_settles_at_expiry() {
    let h = harness();
    let user = Uuid::new_v4();
    fund(&h, user, dec!(1000)).await;
    h.prices.set("BTCUSDT", dec!(50000)).await;

    let trade = h
        .engine
        .place(user, "BTCUSDT", Direction::Up, dec!(100), 30)
        .await
        .unwrap();
    h.prices.set("BTCUSDT", dec!(50500)).await;

    tokio::time::advance(std::time::Duration::from_secs(31)).await;
    // Let the timer task run to completion.
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    let settled = h.trades.get(trade.id).await.unwrap().unwrap();
    assert_eq!(settled.status, TradeStatus::Completed);
    assert_eq!(settled.profit, Some(dec!(10.00)));
}
