//! Durable settlement scheduling.
//!
//! In-process timers are lost on restart, so the `expires_at` column is
//! the real due-time index: [`recover`] rebuilds timers (and settles
//! anything already overdue) at startup, and [`run_sweep`] retries
//! trades whose timer fired but whose settlement failed.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::{interval, Duration};

use binopt_core::error::TradeError;

use crate::engine::TradeEngine;

/// Startup pass over active trades: settles overdue ones immediately
/// and re-arms timers for the rest. Returns how many trades were
/// picked up.
///
/// # Errors
/// Returns an error if the active-trade query fails; individual
/// settlement failures are logged and left for the sweep.
pub async fn recover(engine: &Arc<TradeEngine>) -> Result<usize, TradeError> {
    let active = engine
        .trade_store()
        .list_active()
        .await
        .map_err(TradeError::internal)?;
    let count = active.len();
    let now = Utc::now();

    for trade in active {
        if trade.expires_at <= now {
            if let Err(e) = engine.settle(trade.id).await {
                tracing::error!(
                    trade_id = %trade.id,
                    error = %e,
                    "Recovery settlement failed, sweep will retry"
                );
            }
        } else {
            engine.arm_timer(&trade).await;
        }
    }

    if count > 0 {
        tracing::info!(count, "Recovered active trades");
    }
    Ok(count)
}

/// Periodic sweep over due active trades. Runs until the task is
/// aborted; each pass settles whatever the timers missed.
pub async fn run_sweep(engine: Arc<TradeEngine>, interval_secs: u64) {
    let mut tick = interval(Duration::from_secs(interval_secs.max(1)));

    loop {
        tick.tick().await;
        if let Err(e) = sweep_once(&engine).await {
            tracing::error!(error = %e, "Settlement sweep failed");
        }
    }
}

/// One sweep pass. Returns how many trades were settled.
///
/// # Errors
/// Returns an error if the due-trade query fails.
pub async fn sweep_once(engine: &Arc<TradeEngine>) -> Result<usize, TradeError> {
    let due = engine
        .trade_store()
        .list_active_due(Utc::now())
        .await
        .map_err(TradeError::internal)?;

    let mut settled = 0;
    for trade in due {
        match engine.settle(trade.id).await {
            Ok(true) => settled += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(
                    trade_id = %trade.id,
                    error = %e,
                    "Sweep settlement failed, will retry next pass"
                );
            }
        }
    }

    if settled > 0 {
        tracing::debug!(settled, "Sweep pass settled due trades");
    }
    Ok(settled)
}
