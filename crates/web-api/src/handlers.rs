use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use binopt_core::domain::{
    Balance, ControlType, Direction, OutcomeControl, PriceQuote, Trade,
};
use binopt_core::error::TradeError;

use crate::auth;
use crate::context::ApiContext;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct TokenRequest {
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub admin: bool,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct PlaceTradeRequest {
    pub symbol: String,
    pub direction: Direction,
    pub amount: Decimal,
    pub duration_secs: u32,
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

#[derive(Deserialize)]
pub struct TradesQuery {
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct DepositRequest {
    pub symbol: String,
    pub amount: Decimal,
}

#[derive(Deserialize)]
pub struct SetControlRequest {
    pub control_type: ControlType,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub notes: Option<String>,
}

const fn default_true() -> bool {
    true
}

#[derive(Serialize)]
pub struct ControlResponse {
    pub control: Option<OutcomeControl>,
}

/// Issues a token for a (possibly fresh) user id. Admin tokens require
/// an existing admin bearer unless the config explicitly allows open
/// admin minting.
///
/// # Errors
/// Returns 401/403 when admin minting is requested without admin
/// credentials, 500 if token signing fails.
pub async fn issue_token(
    State(ctx): State<Arc<ApiContext>>,
    headers: HeaderMap,
    Json(req): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    if req.admin && !ctx.auth.allow_admin_tokens {
        auth::require_admin(&ctx.auth, &headers)?;
    }

    let user_id = req.user_id.unwrap_or_else(Uuid::new_v4);
    let token = auth::issue_token(&ctx.auth, user_id, req.admin)?;
    Ok(Json(TokenResponse { token, user_id }))
}

/// Places a timed up/down trade for the authenticated user.
///
/// # Errors
/// Returns 400 for invalid duration/stake or insufficient balance,
/// 503 when no price is available, 401 without valid credentials.
pub async fn place_trade(
    State(ctx): State<Arc<ApiContext>>,
    headers: HeaderMap,
    Json(req): Json<PlaceTradeRequest>,
) -> Result<(StatusCode, Json<Trade>), ApiError> {
    let user = auth::authenticate(&ctx.auth, &headers)?;
    let trade = ctx
        .engine
        .place(
            user.user_id,
            &req.symbol,
            req.direction,
            req.amount,
            req.duration_secs,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(trade)))
}

/// Cancels one of the caller's active trades.
///
/// Returns `{"cancelled": false}` rather than an error when the trade
/// is already terminal or not owned by the caller.
///
/// # Errors
/// Returns 401 without valid credentials, 500 on store failure.
pub async fn cancel_trade(
    State(ctx): State<Arc<ApiContext>>,
    headers: HeaderMap,
    Path(trade_id): Path<Uuid>,
) -> Result<Json<CancelResponse>, ApiError> {
    let user = auth::authenticate(&ctx.auth, &headers)?;
    let cancelled = ctx.engine.cancel(trade_id, user.user_id).await?;
    Ok(Json(CancelResponse { cancelled }))
}

/// Lists a user's trades, newest first. The polling fallback for
/// settlement notifications reads this.
///
/// # Errors
/// Returns 403 when requesting another user's trades without the admin
/// flag, 401 without valid credentials.
pub async fn list_user_trades(
    State(ctx): State<Arc<ApiContext>>,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
    Query(query): Query<TradesQuery>,
) -> Result<Json<Vec<Trade>>, ApiError> {
    let caller = auth::authenticate(&ctx.auth, &headers)?;
    if caller.user_id != user_id && !caller.is_admin {
        return Err(TradeError::Forbidden.into());
    }

    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let trades = ctx.engine.trades_for_user(user_id, limit).await?;
    Ok(Json(trades))
}

/// Gets the caller's balance for a symbol.
///
/// # Errors
/// Returns 401 without valid credentials.
pub async fn get_balance(
    State(ctx): State<Arc<ApiContext>>,
    headers: HeaderMap,
    Path(symbol): Path<String>,
) -> Result<Json<Balance>, ApiError> {
    let user = auth::authenticate(&ctx.auth, &headers)?;
    let balance = ctx.engine.balance(user.user_id, &symbol).await?;
    Ok(Json(balance))
}

/// Credits the caller's available balance.
///
/// # Errors
/// Returns 400 for non-positive amounts, 401 without valid credentials.
pub async fn deposit(
    State(ctx): State<Arc<ApiContext>>,
    headers: HeaderMap,
    Json(req): Json<DepositRequest>,
) -> Result<Json<Balance>, ApiError> {
    let user = auth::authenticate(&ctx.auth, &headers)?;
    let balance = ctx
        .engine
        .deposit(user.user_id, &req.symbol, req.amount)
        .await?;
    Ok(Json(balance))
}

/// Latest quote for every tracked symbol.
///
/// # Errors
/// Returns 500 if the price source fails.
pub async fn market_data(
    State(ctx): State<Arc<ApiContext>>,
) -> Result<Json<Vec<PriceQuote>>, ApiError> {
    let quotes = ctx.prices.snapshot().await?;
    Ok(Json(quotes))
}

/// Latest quote for one symbol.
///
/// # Errors
/// Returns 404 for untracked symbols.
pub async fn market_data_symbol(
    State(ctx): State<Arc<ApiContext>>,
    Path(symbol): Path<String>,
) -> Result<Json<PriceQuote>, ApiError> {
    let quote = ctx
        .prices
        .latest(&symbol)
        .await?
        .ok_or_else(|| TradeError::NotFound(format!("symbol {symbol}")))?;
    Ok(Json(quote))
}

/// Gets a user's outcome override. Admin only.
///
/// # Errors
/// Returns 401/403 on auth failure.
pub async fn get_outcome_control(
    State(ctx): State<Arc<ApiContext>>,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ControlResponse>, ApiError> {
    auth::require_admin(&ctx.auth, &headers)?;
    let control = ctx.engine.control(user_id).await?;
    Ok(Json(ControlResponse { control }))
}

/// Creates or replaces a user's outcome override. Admin only.
///
/// # Errors
/// Returns 401/403 on auth failure, 500 on store failure.
pub async fn set_outcome_control(
    State(ctx): State<Arc<ApiContext>>,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
    Json(req): Json<SetControlRequest>,
) -> Result<Json<OutcomeControl>, ApiError> {
    auth::require_admin(&ctx.auth, &headers)?;

    let mut control = OutcomeControl::new(user_id, req.control_type, req.notes);
    control.is_active = req.is_active;
    ctx.engine.set_control(&control).await?;

    tracing::info!(
        user_id = %user_id,
        control_type = control.control_type.as_str(),
        is_active = control.is_active,
        "Outcome control updated"
    );

    Ok(Json(control))
}
