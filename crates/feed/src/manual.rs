//! Hand-driven price source for tests and simulations.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use binopt_core::domain::PriceQuote;
use binopt_core::traits::PriceSource;

/// Price source whose quotes are set explicitly.
#[derive(Debug, Default)]
pub struct ManualPriceSource {
    quotes: RwLock<HashMap<String, PriceQuote>>,
}

impl ManualPriceSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the current price for a symbol.
    pub async fn set(&self, symbol: &str, price: Decimal) {
        let quote = PriceQuote {
            symbol: symbol.to_string(),
            price,
            change_24h: Decimal::ZERO,
            high_24h: price,
            low_24h: price,
            volume_24h: Decimal::ZERO,
            timestamp: Utc::now(),
        };
        self.quotes.write().await.insert(symbol.to_string(), quote);
    }

    /// Removes a symbol, making its price unavailable.
    pub async fn clear(&self, symbol: &str) {
        self.quotes.write().await.remove(symbol);
    }
}

#[async_trait]
impl PriceSource for ManualPriceSource {
    async fn latest(&self, symbol: &str) -> Result<Option<PriceQuote>> {
        Ok(self.quotes.read().await.get(symbol).cloned())
    }

    async fn snapshot(&self) -> Result<Vec<PriceQuote>> {
        let mut all: Vec<PriceQuote> = self.quotes.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(all)
    }
}
