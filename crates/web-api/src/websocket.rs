//! Realtime channel.
//!
//! Message-typed JSON over WebSocket: the client subscribes to symbols
//! and receives `price_update`, `trade_completed`, and `balance_update`
//! pushes. Delivery is best-effort with no replay; settled trades
//! missed here are picked up by polling `GET /api/users/:id/trades`
//! and reconciled through the sequence-keyed notification gate.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use binopt_core::domain::{Balance, PriceQuote, SettlementEvent};

use crate::auth::{self, AuthUser};
use crate::context::ApiContext;

#[derive(Deserialize)]
pub struct WsQuery {
    pub token: String,
}

/// Messages the client sends.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { symbols: Vec<String> },
}

/// Messages the server pushes.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    PriceUpdate { quote: PriceQuote },
    TradeCompleted { event: SettlementEvent },
    BalanceUpdate { balance: Balance },
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(ctx): State<Arc<ApiContext>>,
    Query(query): Query<WsQuery>,
) -> Response {
    let user = match auth::authenticate_token(&ctx.auth, &query.token) {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };

    ws.on_upgrade(move |socket| websocket_connection(socket, ctx, user))
}

async fn websocket_connection(mut socket: WebSocket, ctx: Arc<ApiContext>, user: AuthUser) {
    let mut ticks = ctx.ticks.subscribe();
    let mut events = ctx.engine.subscribe();
    let mut symbols: HashSet<String> = HashSet::new();

    loop {
        tokio::select! {
            tick = ticks.recv() => {
                match tick {
                    Ok(quote) if symbols.contains(&quote.symbol) => {
                        if send(&mut socket, &ServerMessage::PriceUpdate { quote }).await.is_err() {
                            break;
                        }
                    }
                    // Skipped symbol or a lagged receiver; price ticks
                    // are droppable.
                    Ok(_) | Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) if event.user_id == user.user_id => {
                        let balance = ctx
                            .engine
                            .balance(event.user_id, &event.symbol)
                            .await
                            .ok();
                        if send(&mut socket, &ServerMessage::TradeCompleted { event }).await.is_err() {
                            break;
                        }
                        if let Some(balance) = balance {
                            if send(&mut socket, &ServerMessage::BalanceUpdate { balance }).await.is_err() {
                                break;
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(user_id = %user.user_id, skipped = n, "WebSocket lagged behind settlement events");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(ClientMessage::Subscribe { symbols: requested }) =
                            serde_json::from_str(&text)
                        {
                            symbols = requested.into_iter().collect();
                        }
                    }
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    _ => {}
                }
            }
        }
    }

    tracing::info!(user_id = %user.user_id, "WebSocket connection closed");
}

async fn send(socket: &mut WebSocket, message: &ServerMessage) -> Result<(), axum::Error> {
    let json = serde_json::to_string(message).unwrap_or_default();
    socket.send(Message::Text(json)).await
}
