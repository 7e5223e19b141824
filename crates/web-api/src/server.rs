use crate::context::ApiContext;
use crate::{handlers, websocket};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub struct ApiServer {
    ctx: Arc<ApiContext>,
}

impl ApiServer {
    #[must_use]
    pub fn new(ctx: Arc<ApiContext>) -> Self {
        Self { ctx }
    }

    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/api/auth/token", post(handlers::issue_token))
            .route("/api/trades", post(handlers::place_trade))
            .route("/api/trades/:trade_id/cancel", post(handlers::cancel_trade))
            .route("/api/users/:user_id/trades", get(handlers::list_user_trades))
            .route("/api/balances/deposit", post(handlers::deposit))
            .route("/api/balances/:symbol", get(handlers::get_balance))
            .route("/api/market-data", get(handlers::market_data))
            .route("/api/market-data/:symbol", get(handlers::market_data_symbol))
            .route(
                "/api/admin/outcome-controls/:user_id",
                get(handlers::get_outcome_control).put(handlers::set_outcome_control),
            )
            .route("/ws", get(websocket::websocket_handler))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.ctx.clone())
    }

    /// Starts the web server listening on the specified address.
    ///
    /// # Errors
    /// Returns an error if the server fails to bind to the address or serve requests.
    pub async fn serve(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Web API listening on {}", addr);

        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}
