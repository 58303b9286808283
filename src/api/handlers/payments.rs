use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::user::UserId;
use crate::errors::AppError;
use crate::models::{Investment, PurchaseOrder};
use crate::processor::webhook::{self, WebhookEvent};
use crate::processor::{PaymentMethodSummary, PaymentProcessor};
use crate::purchase::saga::apply_processor_event;
use crate::purchase::{
    quote, ConfirmPaymentRequest, PaymentOrder, PurchaseParams, PurchaseQuote, PurchaseSaga,
};
use crate::AppState;

use super::ApiResponse;

const SIGNATURE_HEADER: &str = "stripe-signature";

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct QuoteRequest {
    #[serde(alias = "unit_price")]
    pub price: Decimal,
    pub quantity: i64,
}

#[derive(Deserialize)]
pub struct PaymentMethodsQuery {
    pub customer: Option<String>,
}

fn processor(state: &AppState) -> Result<Arc<dyn PaymentProcessor>, AppError> {
    state
        .processor
        .clone()
        .ok_or_else(|| AppError::Unavailable("payment processor not configured".into()))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/payments/quote: price a purchase form without side effects
///
/// Always 200: validation errors come back in `errors` rather than as a 422.
pub async fn quote_purchase(
    State(state): State<AppState>,
    Json(body): Json<QuoteRequest>,
) -> Json<ApiResponse<PurchaseQuote>> {
    Json(ApiResponse::ok(quote(
        body.price,
        body.quantity,
        &state.config.purchase_limits,
    )))
}

/// POST /api/payments/create-order: validate and open a payment intent
pub async fn create_order(
    State(state): State<AppState>,
    user: UserId,
    Json(body): Json<PurchaseParams>,
) -> Result<Json<ApiResponse<PaymentOrder>>, AppError> {
    let processor = processor(&state)?;
    let saga = PurchaseSaga::new(
        state.store.as_ref(),
        processor.as_ref(),
        state.config.purchase_limits,
        &state.config.payment_currency,
    );

    let order = saga.initiate(user.as_str(), &body).await?;
    Ok(Json(ApiResponse::ok(order)))
}

/// POST /api/payments/confirm: verify the captured charge and record the investment
pub async fn confirm(
    State(state): State<AppState>,
    user: UserId,
    Json(body): Json<ConfirmPaymentRequest>,
) -> Result<Json<ApiResponse<Investment>>, AppError> {
    if body.payment_intent_id.trim().is_empty() {
        return Err(AppError::BadRequest("payment_intent_id is required".into()));
    }

    let processor = processor(&state)?;
    let saga = PurchaseSaga::new(
        state.store.as_ref(),
        processor.as_ref(),
        state.config.purchase_limits,
        &state.config.payment_currency,
    );

    let investment = saga.confirm(user.as_str(), &body).await?;
    Ok(Json(ApiResponse::ok(investment)))
}

/// GET /api/payments/history: the acting user's purchase journal
pub async fn history(
    State(state): State<AppState>,
    user: UserId,
) -> Result<Json<ApiResponse<Vec<PurchaseOrder>>>, AppError> {
    let orders = state.store.list_orders(user.as_str()).await?;
    Ok(Json(ApiResponse::ok(orders)))
}

/// GET /api/payments/unreconciled: captured charges with no investment record
pub async fn unreconciled(
    State(state): State<AppState>,
    user: UserId,
) -> Result<Json<ApiResponse<Vec<PurchaseOrder>>>, AppError> {
    let orders = state.store.list_unreconciled_orders(user.as_str()).await?;
    Ok(Json(ApiResponse::ok(orders)))
}

/// GET /api/payments/methods?customer=: saved cards at the processor
pub async fn methods(
    State(state): State<AppState>,
    Query(query): Query<PaymentMethodsQuery>,
) -> Result<Json<ApiResponse<Vec<PaymentMethodSummary>>>, AppError> {
    let processor = processor(&state)?;

    let Some(customer) = query.customer.filter(|c| !c.trim().is_empty()) else {
        return Ok(Json(ApiResponse::ok(Vec::new())));
    };

    let methods = processor.list_payment_methods(&customer).await?;
    Ok(Json(ApiResponse::ok(methods)))
}

/// POST /api/payments/webhook: signed processor events
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let secret = state
        .config
        .stripe_webhook_secret
        .as_deref()
        .ok_or_else(|| AppError::Unavailable("webhook secret not configured".into()))?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("missing signature header".into()))?;

    webhook::verify_signature(
        &body,
        signature,
        secret,
        chrono::Utc::now().timestamp(),
        webhook::DEFAULT_TOLERANCE_SECS,
    )
    .map_err(|e| {
        tracing::warn!(error = %e, "Rejected webhook");
        AppError::BadRequest(format!("invalid signature: {e}"))
    })?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("malformed event: {e}")))?;

    apply_processor_event(state.store.as_ref(), &event).await?;

    Ok(Json(json!({ "received": true })))
}
