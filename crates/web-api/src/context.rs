use std::sync::Arc;

use tokio::sync::broadcast;

use binopt_core::config::AuthConfig;
use binopt_core::domain::PriceQuote;
use binopt_core::traits::PriceSource;
use binopt_engine::TradeEngine;

/// Shared state behind every handler and WebSocket session.
pub struct ApiContext {
    pub engine: Arc<TradeEngine>,
    pub prices: Arc<dyn PriceSource>,
    /// Feed tick stream fanned out to WebSocket subscribers.
    pub ticks: broadcast::Sender<PriceQuote>,
    pub auth: AuthConfig,
}

impl ApiContext {
    #[must_use]
    pub fn new(
        engine: Arc<TradeEngine>,
        prices: Arc<dyn PriceSource>,
        ticks: broadcast::Sender<PriceQuote>,
        auth: AuthConfig,
    ) -> Self {
        Self {
            engine,
            prices,
            ticks,
            auth,
        }
    }
}
