use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregator::sync::{fetch_joined_holdings, sync_holdings, JoinedHolding, SyncReport};
use crate::aggregator::{AccessGrant, Account, Aggregator, LinkToken, TransactionsPage};
use crate::api::user::UserId;
use crate::errors::AppError;
use crate::AppState;

use super::ApiResponse;

const DEFAULT_TRANSACTION_DAYS: i64 = 30;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ExchangeTokenRequest {
    pub public_token: String,
}

#[derive(Deserialize)]
pub struct AccessTokenRequest {
    pub access_token: String,
}

#[derive(Deserialize)]
pub struct TransactionsRequest {
    pub access_token: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Serialize)]
pub struct HoldingsView {
    pub holdings: Vec<JoinedHolding>,
    pub unsupported: usize,
}

fn aggregator(state: &AppState) -> Result<Arc<dyn Aggregator>, AppError> {
    state
        .aggregator
        .clone()
        .ok_or_else(|| AppError::Unavailable("aggregator not configured".into()))
}

fn require(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/aggregator/link-token: start account linking for the user
pub async fn link_token(
    State(state): State<AppState>,
    user: UserId,
) -> Result<Json<ApiResponse<LinkToken>>, AppError> {
    let token = aggregator(&state)?.create_link_token(user.as_str()).await?;
    Ok(Json(ApiResponse::ok(token)))
}

/// POST /api/aggregator/exchange-token: swap the one-time public token
pub async fn exchange_token(
    State(state): State<AppState>,
    user: UserId,
    Json(body): Json<ExchangeTokenRequest>,
) -> Result<Json<ApiResponse<AccessGrant>>, AppError> {
    require(&body.public_token, "public_token")?;

    let grant = aggregator(&state)?
        .exchange_public_token(&body.public_token)
        .await?;
    tracing::info!(user_id = %user.as_str(), item_id = %grant.item_id, "Aggregator item linked");

    Ok(Json(ApiResponse::ok(grant)))
}

/// POST /api/aggregator/holdings: accounts joined with holdings and securities
pub async fn holdings(
    State(state): State<AppState>,
    Json(body): Json<AccessTokenRequest>,
) -> Result<Json<ApiResponse<HoldingsView>>, AppError> {
    require(&body.access_token, "access_token")?;

    let aggregator = aggregator(&state)?;
    let outcome = fetch_joined_holdings(aggregator.as_ref(), &body.access_token).await?;

    Ok(Json(ApiResponse::ok(HoldingsView {
        holdings: outcome.joined,
        unsupported: outcome.unsupported,
    })))
}

/// POST /api/aggregator/transactions: defaults to the last 30 days
pub async fn transactions(
    State(state): State<AppState>,
    Json(body): Json<TransactionsRequest>,
) -> Result<Json<ApiResponse<TransactionsPage>>, AppError> {
    require(&body.access_token, "access_token")?;

    let end = body.end_date.unwrap_or_else(|| Utc::now().date_naive());
    let start = body
        .start_date
        .unwrap_or(end - Duration::days(DEFAULT_TRANSACTION_DAYS));
    if start > end {
        return Err(AppError::BadRequest("start_date must not be after end_date".into()));
    }

    let page = aggregator(&state)?
        .transactions(&body.access_token, start, end)
        .await?;
    Ok(Json(ApiResponse::ok(page)))
}

/// POST /api/aggregator/sync: upsert holdings into investments by symbol
pub async fn sync(
    State(state): State<AppState>,
    user: UserId,
    Json(body): Json<AccessTokenRequest>,
) -> Result<Json<ApiResponse<SyncReport>>, AppError> {
    require(&body.access_token, "access_token")?;

    let aggregator = aggregator(&state)?;
    let report = sync_holdings(
        state.store.as_ref(),
        aggregator.as_ref(),
        user.as_str(),
        &body.access_token,
    )
    .await?;

    Ok(Json(ApiResponse::ok(report)))
}

/// POST /api/aggregator/balances: real-time account balances
pub async fn balances(
    State(state): State<AppState>,
    Json(body): Json<AccessTokenRequest>,
) -> Result<Json<ApiResponse<Vec<Account>>>, AppError> {
    require(&body.access_token, "access_token")?;

    let accounts = aggregator(&state)?.balances(&body.access_token).await?;
    Ok(Json(ApiResponse::ok(accounts)))
}
