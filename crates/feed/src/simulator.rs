//! Simulated market data.
//!
//! Random-walks one price per configured symbol at a fixed tick
//! interval, keeps the latest quote queryable, and broadcasts every
//! tick for the realtime price stream.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{interval, Duration};

use binopt_core::config::FeedConfig;
use binopt_core::domain::PriceQuote;
use binopt_core::traits::PriceSource;

/// Max per-tick move, as a fraction of the current price.
const MAX_STEP: f64 = 0.002;

#[derive(Debug, Clone)]
struct QuoteState {
    quote: PriceQuote,
    session_open: Decimal,
}

pub struct SimulatedFeed {
    quotes: RwLock<HashMap<String, QuoteState>>,
    tick_tx: broadcast::Sender<PriceQuote>,
    tick_interval: Duration,
}

impl SimulatedFeed {
    /// Seeds one quote per configured symbol. Symbols without a
    /// position-matched start price fall back to 100.
    #[must_use]
    pub fn new(config: &FeedConfig) -> Self {
        let now = Utc::now();
        let mut quotes = HashMap::new();
        for (i, symbol) in config.symbols.iter().enumerate() {
            let start = config
                .start_prices
                .get(i)
                .copied()
                .and_then(Decimal::from_f64)
                .unwrap_or_else(|| Decimal::from(100));
            quotes.insert(
                symbol.clone(),
                QuoteState {
                    quote: PriceQuote {
                        symbol: symbol.clone(),
                        price: start,
                        change_24h: Decimal::ZERO,
                        high_24h: start,
                        low_24h: start,
                        volume_24h: Decimal::ZERO,
                        timestamp: now,
                    },
                    session_open: start,
                },
            );
        }

        let (tick_tx, _) = broadcast::channel(1024);
        Self {
            quotes: RwLock::new(quotes),
            tick_tx,
            tick_interval: Duration::from_millis(config.tick_interval_ms.max(10)),
        }
    }

    /// Subscribes to the tick stream.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PriceQuote> {
        self.tick_tx.subscribe()
    }

    /// Sender handle for wiring the tick stream into other components.
    #[must_use]
    pub fn sender(&self) -> broadcast::Sender<PriceQuote> {
        self.tick_tx.clone()
    }

    /// Runs the tick loop until the task is aborted.
    pub async fn run(&self) {
        let mut rng = StdRng::from_entropy();
        let mut tick = interval(self.tick_interval);

        loop {
            tick.tick().await;
            self.step(&mut rng).await;
        }
    }

    /// Advances every symbol one tick.
    async fn step(&self, rng: &mut StdRng) {
        let now = Utc::now();
        let mut quotes = self.quotes.write().await;

        for state in quotes.values_mut() {
            let step: f64 = rng.gen_range(-MAX_STEP..MAX_STEP);
            let factor = Decimal::from_f64(1.0 + step).unwrap_or(Decimal::ONE);
            let volume: f64 = rng.gen_range(0.1..25.0);

            let quote = &mut state.quote;
            quote.price = (quote.price * factor).round_dp(2);
            quote.high_24h = quote.high_24h.max(quote.price);
            quote.low_24h = quote.low_24h.min(quote.price);
            quote.volume_24h += Decimal::from_f64(volume).unwrap_or_default().round_dp(4);
            quote.change_24h = if state.session_open.is_zero() {
                Decimal::ZERO
            } else {
                ((quote.price - state.session_open) / state.session_open
                    * Decimal::from(100))
                .round_dp(2)
            };
            quote.timestamp = now;

            // Ticks are best-effort; a lagging or absent subscriber is
            // not an error.
            let _ = self.tick_tx.send(quote.clone());
        }
    }
}

#[async_trait]
impl PriceSource for SimulatedFeed {
    async fn latest(&self, symbol: &str) -> Result<Option<PriceQuote>> {
        Ok(self.quotes.read().await.get(symbol).map(|s| s.quote.clone()))
    }

    async fn snapshot(&self) -> Result<Vec<PriceQuote>> {
        let mut all: Vec<PriceQuote> = self
            .quotes
            .read()
            .await
            .values()
            .map(|s| s.quote.clone())
            .collect();
        all.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(all)
    }
}
