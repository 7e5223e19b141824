//! Trade lifecycle engine.
//!
//! Placement locks the stake and arms an in-process settlement timer;
//! the durable `expires_at` column is what the recovery sweep scans, so
//! timers are an optimization rather than the source of truth. The
//! store's conditional transitions make settlement at-most-once no
//! matter how many timers or sweep passes race for the same trade.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use binopt_core::domain::{
    Balance, Direction, OutcomeControl, SettlementEvent, Trade,
};
use binopt_core::error::TradeError;
use binopt_core::traits::{BalanceStore, ControlStore, PriceSource, TradeStore};
use binopt_core::{outcome, payout};

pub struct TradeEngine {
    trades: Arc<dyn TradeStore>,
    balances: Arc<dyn BalanceStore>,
    controls: Arc<dyn ControlStore>,
    prices: Arc<dyn PriceSource>,
    events: broadcast::Sender<SettlementEvent>,
    seq: AtomicU64,
    timers: Mutex<HashMap<Uuid, JoinHandle<()>>>,
}

impl TradeEngine {
    #[must_use]
    pub fn new(
        trades: Arc<dyn TradeStore>,
        balances: Arc<dyn BalanceStore>,
        controls: Arc<dyn ControlStore>,
        prices: Arc<dyn PriceSource>,
    ) -> Self {
        let (events, _) = broadcast::channel(1000);
        Self {
            trades,
            balances,
            controls,
            prices,
            events,
            seq: AtomicU64::new(0),
            timers: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribes to settlement events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SettlementEvent> {
        self.events.subscribe()
    }

    /// Places a timed trade: validates the duration bucket and stake,
    /// locks funds, persists the trade, and arms its settlement timer.
    ///
    /// # Errors
    /// `InvalidDuration`, `Validation` (stake below the bucket
    /// minimum), `PriceUnavailable`, `InsufficientBalance`, or
    /// `Internal` on store failure.
    pub async fn place(
        self: &Arc<Self>,
        user_id: Uuid,
        symbol: &str,
        direction: Direction,
        amount: Decimal,
        duration_secs: u32,
    ) -> Result<Trade, TradeError> {
        payout::payout_percent(duration_secs)
            .ok_or(TradeError::InvalidDuration(duration_secs))?;
        let min = payout::min_amount(duration_secs)
            .ok_or(TradeError::InvalidDuration(duration_secs))?;
        if amount < min {
            return Err(TradeError::Validation(format!(
                "minimum stake for {duration_secs}s is {min}"
            )));
        }

        let quote = self
            .prices
            .latest(symbol)
            .await
            .map_err(TradeError::internal)?
            .ok_or_else(|| TradeError::PriceUnavailable(symbol.to_string()))?;

        let locked = self
            .balances
            .lock(user_id, symbol, amount)
            .await
            .map_err(TradeError::internal)?;
        if !locked {
            let available = self
                .balances
                .get(user_id, symbol)
                .await
                .map_err(TradeError::internal)?
                .map_or(Decimal::ZERO, |b| b.available);
            return Err(TradeError::InsufficientBalance {
                needed: amount,
                available,
            });
        }

        let trade = Trade::open(
            user_id,
            symbol.to_string(),
            direction,
            amount,
            quote.price,
            duration_secs,
        );
        if let Err(e) = self.trades.insert(&trade).await {
            // The stake was already locked; give it back before failing.
            if let Err(refund_err) = self.balances.refund(user_id, symbol, amount).await {
                tracing::error!(
                    user_id = %user_id,
                    symbol = %symbol,
                    amount = %amount,
                    error = %refund_err,
                    "Refund after failed trade insert also failed, funds remain locked"
                );
            }
            return Err(TradeError::internal(e));
        }

        self.arm_timer(&trade).await;

        tracing::info!(
            trade_id = %trade.id,
            user_id = %user_id,
            symbol = %symbol,
            direction = %direction,
            amount = %amount,
            duration_secs,
            entry_price = %trade.entry_price,
            "Trade opened"
        );

        Ok(trade)
    }

    /// Arms the in-process settlement timer for an active trade.
    pub(crate) async fn arm_timer(self: &Arc<Self>, trade: &Trade) {
        let engine = Arc::clone(self);
        let trade_id = trade.id;
        let expires_at = trade.expires_at;
        // Anchor the deadline to the runtime clock now, so the timer
        // fires at `expires_at` regardless of when the task is first
        // polled (and under tokio's paused test clock).
        let deadline = tokio::time::Instant::now()
            + (expires_at - Utc::now()).to_std().unwrap_or_default();

        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            match engine.settle(trade_id).await {
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(
                        trade_id = %trade_id,
                        error = %e,
                        "Timer settlement failed, sweep will retry"
                    );
                }
            }
        });

        self.timers.lock().await.insert(trade_id, handle);
    }

    /// Settles a trade at expiry. Returns false when the trade was
    /// already terminal or another settlement won the transition.
    ///
    /// On `PriceUnavailable` the trade stays active and the next sweep
    /// pass retries it.
    ///
    /// # Errors
    /// `NotFound`, `PriceUnavailable`, or `Internal` on store failure.
    pub async fn settle(&self, trade_id: Uuid) -> Result<bool, TradeError> {
        let trade = self
            .trades
            .get(trade_id)
            .await
            .map_err(TradeError::internal)?
            .ok_or_else(|| TradeError::NotFound("trade".to_string()))?;

        if !trade.is_active() {
            return Ok(false);
        }

        let quote = self
            .prices
            .latest(&trade.symbol)
            .await
            .map_err(TradeError::internal)?
            .ok_or_else(|| TradeError::PriceUnavailable(trade.symbol.clone()))?;

        let control = self
            .controls
            .get_active(trade.user_id)
            .await
            .map_err(TradeError::internal)?
            .map(|c| c.control_type)
            .unwrap_or_default();

        let outcome = outcome::decide(trade.direction, trade.entry_price, quote.price, control);
        let pct = payout::payout_percent(trade.duration_secs)
            .ok_or(TradeError::InvalidDuration(trade.duration_secs))?;
        let profit = outcome::profit(outcome.won, trade.amount, pct);
        let completed_at = Utc::now();

        let transitioned = self
            .trades
            .settle(trade.id, outcome.exit_price, profit, completed_at)
            .await
            .map_err(TradeError::internal)?;
        if !transitioned {
            return Ok(false);
        }

        self.balances
            .settle(trade.user_id, &trade.symbol, trade.amount, profit)
            .await
            .map_err(TradeError::internal)?;

        self.timers.lock().await.remove(&trade.id);

        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let event = SettlementEvent {
            trade_id: trade.id,
            user_id: trade.user_id,
            seq,
            symbol: trade.symbol.clone(),
            direction: trade.direction,
            amount: trade.amount,
            entry_price: trade.entry_price,
            exit_price: outcome.exit_price,
            profit,
            won: outcome.won,
            completed_at,
        };
        // Best-effort fan-out; the poll path covers missed deliveries.
        let _ = self.events.send(event);

        tracing::info!(
            trade_id = %trade.id,
            user_id = %trade.user_id,
            won = outcome.won,
            exit_price = %outcome.exit_price,
            profit = %profit,
            control = control.as_str(),
            seq,
            "Trade settled"
        );

        Ok(true)
    }

    /// Cancels an active trade owned by `user_id`: aborts its timer and
    /// refunds the locked stake. Returns false when the trade is
    /// terminal or not owned by the caller, leaving state unchanged.
    ///
    /// # Errors
    /// `Internal` on store failure.
    pub async fn cancel(&self, trade_id: Uuid, user_id: Uuid) -> Result<bool, TradeError> {
        let Some(trade) = self
            .trades
            .cancel(trade_id, user_id)
            .await
            .map_err(TradeError::internal)?
        else {
            return Ok(false);
        };

        if let Some(handle) = self.timers.lock().await.remove(&trade_id) {
            handle.abort();
        }

        self.balances
            .refund(trade.user_id, &trade.symbol, trade.amount)
            .await
            .map_err(TradeError::internal)?;

        tracing::info!(
            trade_id = %trade_id,
            user_id = %user_id,
            amount = %trade.amount,
            "Trade cancelled"
        );

        Ok(true)
    }

    /// Credits available funds.
    ///
    /// # Errors
    /// `Validation` for non-positive amounts, `Internal` on store failure.
    pub async fn deposit(
        &self,
        user_id: Uuid,
        symbol: &str,
        amount: Decimal,
    ) -> Result<Balance, TradeError> {
        if amount <= Decimal::ZERO {
            return Err(TradeError::Validation(
                "deposit amount must be positive".to_string(),
            ));
        }
        self.balances
            .deposit(user_id, symbol, amount)
            .await
            .map_err(TradeError::internal)
    }

    /// Current balance, zero when the pair has no row yet.
    ///
    /// # Errors
    /// `Internal` on store failure.
    pub async fn balance(&self, user_id: Uuid, symbol: &str) -> Result<Balance, TradeError> {
        Ok(self
            .balances
            .get(user_id, symbol)
            .await
            .map_err(TradeError::internal)?
            .unwrap_or_else(|| Balance::zero(user_id, symbol.to_string())))
    }

    /// Most recent trades for a user, newest first.
    ///
    /// # Errors
    /// `Internal` on store failure.
    pub async fn trades_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Trade>, TradeError> {
        self.trades
            .list_for_user(user_id, limit)
            .await
            .map_err(TradeError::internal)
    }

    /// The user's active outcome override, if any.
    ///
    /// # Errors
    /// `Internal` on store failure.
    pub async fn control(&self, user_id: Uuid) -> Result<Option<OutcomeControl>, TradeError> {
        self.controls
            .get_active(user_id)
            .await
            .map_err(TradeError::internal)
    }

    /// Creates or replaces a user's outcome override.
    ///
    /// # Errors
    /// `Internal` on store failure.
    pub async fn set_control(&self, control: &OutcomeControl) -> Result<(), TradeError> {
        self.controls
            .upsert(control)
            .await
            .map_err(TradeError::internal)
    }

    pub(crate) fn trade_store(&self) -> &Arc<dyn TradeStore> {
        &self.trades
    }

    /// Number of armed in-process timers.
    pub async fn armed_timers(&self) -> usize {
        self.timers.lock().await.len()
    }
}
