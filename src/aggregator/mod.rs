pub mod plaid;
pub mod sync;

pub use plaid::{PlaidClient, PlaidEnvironment};

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("aggregator error {code}: {message}")]
    Api { code: String, message: String },

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

// ---------------------------------------------------------------------------
// Link / token exchange
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkToken {
    pub link_token: String,
    pub expiration: String,
}

/// Durable credential obtained from a one-time public token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessGrant {
    pub access_token: String,
    pub item_id: String,
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Balances {
    #[serde(default)]
    pub available: Option<Decimal>,
    #[serde(default)]
    pub current: Option<Decimal>,
    #[serde(default)]
    pub iso_currency_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub account_id: String,
    pub name: String,
    #[serde(default)]
    pub official_name: Option<String>,
    #[serde(default)]
    pub mask: Option<String>,
    #[serde(rename = "type")]
    pub account_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub balances: Balances,
}

// ---------------------------------------------------------------------------
// Holdings / securities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub account_id: String,
    pub security_id: String,
    pub quantity: Decimal,
    pub institution_price: Decimal,
    #[serde(default)]
    pub institution_value: Option<Decimal>,
    #[serde(default)]
    pub cost_basis: Option<Decimal>,
    #[serde(default)]
    pub iso_currency_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Security {
    pub security_id: String,
    #[serde(default)]
    pub ticker_symbol: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub security_type: Option<String>,
    #[serde(default)]
    pub close_price: Option<Decimal>,
    #[serde(default)]
    pub sector: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HoldingsSnapshot {
    pub holdings: Vec<Holding>,
    pub securities: Vec<Security>,
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub account_id: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub name: String,
    #[serde(default)]
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub category: Option<Vec<String>>,
    #[serde(default)]
    pub pending: bool,
    #[serde(default)]
    pub iso_currency_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionsPage {
    pub accounts: Vec<Account>,
    pub transactions: Vec<Transaction>,
    pub total_transactions: u32,
}

/// Bank-data aggregator seam.
#[async_trait]
pub trait Aggregator: Send + Sync {
    async fn create_link_token(&self, user_id: &str) -> Result<LinkToken, AggregatorError>;

    async fn exchange_public_token(&self, public_token: &str) -> Result<AccessGrant, AggregatorError>;

    async fn accounts(&self, access_token: &str) -> Result<Vec<Account>, AggregatorError>;

    async fn investment_holdings(&self, access_token: &str) -> Result<HoldingsSnapshot, AggregatorError>;

    async fn transactions(
        &self,
        access_token: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<TransactionsPage, AggregatorError>;

    async fn balances(&self, access_token: &str) -> Result<Vec<Account>, AggregatorError>;
}
