use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;
use super::handlers;

pub fn create_router(state: AppState) -> Router {
    let ops = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::render));

    // The acting user comes from the x-user-id header; nothing is authenticated.
    let api = Router::new()
        // Purchases
        .route("/api/payments/quote", post(handlers::payments::quote_purchase))
        .route("/api/payments/create-order", post(handlers::payments::create_order))
        .route("/api/payments/confirm", post(handlers::payments::confirm))
        .route("/api/payments/history", get(handlers::payments::history))
        .route("/api/payments/unreconciled", get(handlers::payments::unreconciled))
        .route("/api/payments/methods", get(handlers::payments::methods))
        .route("/api/payments/webhook", post(handlers::payments::webhook))
        // Investments
        .route("/api/investments", get(handlers::investments::list))
        // Aggregator
        .route("/api/aggregator/link-token", post(handlers::aggregator::link_token))
        .route("/api/aggregator/exchange-token", post(handlers::aggregator::exchange_token))
        .route("/api/aggregator/holdings", post(handlers::aggregator::holdings))
        .route("/api/aggregator/transactions", post(handlers::aggregator::transactions))
        .route("/api/aggregator/sync", post(handlers::aggregator::sync))
        .route("/api/aggregator/balances", post(handlers::aggregator::balances));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    ops.merge(api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
