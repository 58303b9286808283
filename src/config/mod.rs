use rust_decimal::Decimal;
use std::env;

use crate::aggregator::PlaidEnvironment;
use crate::purchase::PurchaseLimits;

const DEFAULT_USER_ID: &str = "demo-user";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Unset → in-memory store.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,

    // Payment processor (optional; payment endpoints answer 503 without it)
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    /// Overrides the Stripe API host (stripe-mock, proxies).
    pub stripe_api_base: Option<String>,

    // Aggregator (optional; aggregator endpoints answer 503 without it)
    pub plaid_client_id: Option<String>,
    pub plaid_secret: Option<String>,
    pub plaid_env: PlaidEnvironment,

    // Purchases
    pub payment_currency: String,
    pub purchase_limits: PurchaseLimits,

    /// Acting user when a request carries no user header.
    pub default_user_id: String,
    pub log_json: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = PurchaseLimits::default();
        let purchase_limits = PurchaseLimits {
            min_amount: decimal_var("PURCHASE_MIN_AMOUNT", defaults.min_amount)?,
            max_amount: decimal_var("PURCHASE_MAX_AMOUNT", defaults.max_amount)?,
        };
        if purchase_limits.min_amount > purchase_limits.max_amount {
            anyhow::bail!(
                "PURCHASE_MIN_AMOUNT ({}) exceeds PURCHASE_MAX_AMOUNT ({})",
                purchase_limits.min_amount,
                purchase_limits.max_amount
            );
        }

        Ok(Self {
            database_url: non_empty_var("DATABASE_URL"),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,

            stripe_secret_key: non_empty_var("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: non_empty_var("STRIPE_WEBHOOK_SECRET"),
            stripe_api_base: non_empty_var("STRIPE_API_BASE"),

            plaid_client_id: non_empty_var("PLAID_CLIENT_ID"),
            plaid_secret: non_empty_var("PLAID_SECRET"),
            plaid_env: PlaidEnvironment::from_str(
                &env::var("PLAID_ENV").unwrap_or_else(|_| "sandbox".into()),
            ),

            payment_currency: env::var("PAYMENT_CURRENCY")
                .unwrap_or_else(|_| "usd".into())
                .to_lowercase(),
            purchase_limits,

            default_user_id: non_empty_var("DEFAULT_USER_ID")
                .unwrap_or_else(|| DEFAULT_USER_ID.into()),
            log_json: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }

    /// Config for tests and local runs: in-memory store, no third parties.
    pub fn local() -> Self {
        Self {
            database_url: None,
            host: "127.0.0.1".into(),
            port: 0,
            stripe_secret_key: None,
            stripe_webhook_secret: None,
            stripe_api_base: None,
            plaid_client_id: None,
            plaid_secret: None,
            plaid_env: PlaidEnvironment::Sandbox,
            payment_currency: "usd".into(),
            purchase_limits: PurchaseLimits::default(),
            default_user_id: DEFAULT_USER_ID.into(),
            log_json: false,
        }
    }

    /// Returns the Plaid credentials when both halves are configured.
    pub fn plaid_credentials(&self) -> Option<(String, String)> {
        match (&self.plaid_client_id, &self.plaid_secret) {
            (Some(id), Some(secret)) => Some((id.clone(), secret.clone())),
            _ => None,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn decimal_var(key: &str, default: Decimal) -> anyhow::Result<Decimal> {
    match non_empty_var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{key} must be a decimal amount: {e}")),
        None => Ok(default),
    }
}
