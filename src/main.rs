use std::sync::Arc;

use finboard::aggregator::{Aggregator, PlaidClient};
use finboard::api::router::create_router;
use finboard::config::AppConfig;
use finboard::db::{self, InvestmentStore, MemoryStore, PgStore};
use finboard::processor::{PaymentProcessor, StripeClient};
use finboard::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    init_tracing(config.log_json);

    let addr = format!("{}:{}", config.host, config.port);
    let metrics_handle = finboard::metrics::init_metrics();

    let store: Arc<dyn InvestmentStore> = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let pool = db::init_pool(url).await?;
            tracing::info!("Database connected");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store, data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let http = reqwest::Client::new();

    let processor: Option<Arc<dyn PaymentProcessor>> = match &config.stripe_secret_key {
        Some(key) => {
            let mut client = StripeClient::new(http.clone(), key.clone());
            if let Some(base) = &config.stripe_api_base {
                tracing::info!(base_url = %base, "Using custom Stripe API host");
                client = client.with_base_url(base.clone());
            }
            Some(Arc::new(client))
        }
        None => {
            tracing::warn!("No Stripe secret key, payment endpoints disabled");
            None
        }
    };
    if processor.is_some() && config.stripe_webhook_secret.is_none() {
        tracing::warn!("STRIPE_WEBHOOK_SECRET not set, webhook endpoint will reject events");
    }

    let aggregator: Option<Arc<dyn Aggregator>> = match config.plaid_credentials() {
        Some((client_id, secret)) => {
            tracing::info!(env = ?config.plaid_env, "Plaid client configured");
            Some(Arc::new(PlaidClient::new(http, client_id, secret, config.plaid_env)))
        }
        None => {
            tracing::warn!("No Plaid credentials, aggregator endpoints disabled");
            None
        }
    };

    tracing::info!(
        currency = %config.payment_currency,
        min_amount = %config.purchase_limits.min_amount,
        max_amount = %config.purchase_limits.max_amount,
        default_user = %config.default_user_id,
        "Purchase settings"
    );

    let state = AppState {
        store,
        config,
        metrics_handle,
        processor,
        aggregator,
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {addr}");
    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
