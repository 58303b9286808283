use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    Account, AccessGrant, Aggregator, AggregatorError, HoldingsSnapshot, LinkToken,
    TransactionsPage,
};

const CLIENT_NAME: &str = "Finboard";
const TRANSACTIONS_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaidEnvironment {
    Sandbox,
    Development,
    Production,
}

impl PlaidEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            PlaidEnvironment::Sandbox => "https://sandbox.plaid.com",
            PlaidEnvironment::Development => "https://development.plaid.com",
            PlaidEnvironment::Production => "https://production.plaid.com",
        }
    }

    /// Unknown names fall back to sandbox.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" => PlaidEnvironment::Production,
            "development" => PlaidEnvironment::Development,
            _ => PlaidEnvironment::Sandbox,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlaidErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    accounts: Vec<Account>,
}

#[derive(Debug, Clone)]
pub struct PlaidClient {
    http: Client,
    client_id: String,
    secret: String,
    base_url: String,
}

impl PlaidClient {
    pub fn new(http: Client, client_id: String, secret: String, env: PlaidEnvironment) -> Self {
        Self {
            http,
            client_id,
            secret,
            base_url: env.base_url().into(),
        }
    }

    /// POST a JSON body with credentials merged in, decoding Plaid errors.
    async fn post<T: DeserializeOwned>(&self, path: &str, mut body: Value) -> Result<T, AggregatorError> {
        if let Value::Object(map) = &mut body {
            map.insert("client_id".into(), Value::String(self.client_id.clone()));
            map.insert("secret".into(), Value::String(self.secret.clone()));
        }

        let url = format!("{}{}", self.base_url, path);
        let resp = self.http.post(&url).json(&body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let err = serde_json::from_str::<PlaidErrorBody>(&text).ok();
            return Err(AggregatorError::Api {
                code: err
                    .as_ref()
                    .and_then(|e| e.error_code.clone())
                    .unwrap_or_else(|| status.as_u16().to_string()),
                message: err.and_then(|e| e.error_message).unwrap_or(text),
            });
        }

        let parsed = resp.json::<T>().await?;
        Ok(parsed)
    }
}

#[async_trait]
impl Aggregator for PlaidClient {
    async fn create_link_token(&self, user_id: &str) -> Result<LinkToken, AggregatorError> {
        self.post(
            "/link/token/create",
            json!({
                "client_name": CLIENT_NAME,
                "user": { "client_user_id": user_id },
                "products": ["investments", "transactions"],
                "country_codes": ["US"],
                "language": "en",
            }),
        )
        .await
    }

    async fn exchange_public_token(&self, public_token: &str) -> Result<AccessGrant, AggregatorError> {
        self.post(
            "/item/public_token/exchange",
            json!({ "public_token": public_token }),
        )
        .await
    }

    async fn accounts(&self, access_token: &str) -> Result<Vec<Account>, AggregatorError> {
        let resp: AccountsResponse = self
            .post("/accounts/get", json!({ "access_token": access_token }))
            .await?;
        Ok(resp.accounts)
    }

    async fn investment_holdings(&self, access_token: &str) -> Result<HoldingsSnapshot, AggregatorError> {
        self.post(
            "/investments/holdings/get",
            json!({ "access_token": access_token }),
        )
        .await
    }

    async fn transactions(
        &self,
        access_token: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<TransactionsPage, AggregatorError> {
        if start_date > end_date {
            return Err(AggregatorError::Unexpected(format!(
                "start date {start_date} is after end date {end_date}"
            )));
        }

        self.post(
            "/transactions/get",
            json!({
                "access_token": access_token,
                "start_date": start_date.format("%Y-%m-%d").to_string(),
                "end_date": end_date.format("%Y-%m-%d").to_string(),
                "options": { "count": TRANSACTIONS_PAGE_SIZE, "offset": 0 },
            }),
        )
        .await
    }

    async fn balances(&self, access_token: &str) -> Result<Vec<Account>, AggregatorError> {
        let resp: AccountsResponse = self
            .post("/accounts/balance/get", json!({ "access_token": access_token }))
            .await?;
        Ok(resp.accounts)
    }
}
