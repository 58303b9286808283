use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;

use super::{CreateIntent, PaymentIntent, PaymentMethodSummary, PaymentProcessor, ProcessorError};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeList<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct StripePaymentMethod {
    id: String,
    #[serde(default)]
    card: Option<StripeCard>,
}

#[derive(Debug, Deserialize)]
struct StripeCard {
    brand: Option<String>,
    last4: Option<String>,
    exp_month: Option<u32>,
    exp_year: Option<u32>,
}

impl From<StripePaymentMethod> for PaymentMethodSummary {
    fn from(pm: StripePaymentMethod) -> Self {
        let card = pm.card;
        Self {
            id: pm.id,
            brand: card.as_ref().and_then(|c| c.brand.clone()),
            last4: card.as_ref().and_then(|c| c.last4.clone()),
            exp_month: card.as_ref().and_then(|c| c.exp_month),
            exp_year: card.as_ref().and_then(|c| c.exp_year),
        }
    }
}

/// Stripe REST client. Requests are form-encoded with the secret key as a
/// bearer token.
#[derive(Debug, Clone)]
pub struct StripeClient {
    http: Client,
    secret_key: String,
    base_url: String,
}

impl StripeClient {
    pub fn new(http: Client, secret_key: String) -> Self {
        Self {
            http,
            secret_key,
            base_url: STRIPE_API_BASE.into(),
        }
    }

    /// Point the client at a different API host (stripe-mock, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Turn a non-2xx Stripe response into `ProcessorError::Api`.
    async fn check(resp: Response) -> Result<Response, ProcessorError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .map(|e| {
                let msg = e.error.message.unwrap_or_else(|| "unknown error".into());
                match e.error.code {
                    Some(code) => format!("{code}: {msg}"),
                    None => msg,
                }
            })
            .unwrap_or(body);

        Err(ProcessorError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl PaymentProcessor for StripeClient {
    async fn create_payment_intent(&self, request: &CreateIntent) -> Result<PaymentIntent, ProcessorError> {
        let mut form: Vec<(String, String)> = vec![
            ("amount".into(), request.amount_minor.to_string()),
            ("currency".into(), request.currency.to_lowercase()),
            ("description".into(), request.description.clone()),
            ("automatic_payment_methods[enabled]".into(), "true".into()),
        ];
        form.extend(
            request
                .metadata
                .iter()
                .map(|(k, v)| (format!("metadata[{k}]"), v.clone())),
        );

        let url = format!("{}/payment_intents", self.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;

        let intent: PaymentIntent = Self::check(resp).await?.json().await?;
        if intent.client_secret.is_none() {
            return Err(ProcessorError::Unexpected(format!(
                "payment intent {} has no client secret",
                intent.id
            )));
        }

        Ok(intent)
    }

    async fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent, ProcessorError> {
        let url = format!("{}/payment_intents/{}", self.base_url, id);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        let intent: PaymentIntent = Self::check(resp).await?.json().await?;
        Ok(intent)
    }

    async fn list_payment_methods(&self, customer: &str) -> Result<Vec<PaymentMethodSummary>, ProcessorError> {
        let url = format!("{}/payment_methods", self.base_url);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.secret_key)
            .query(&[("customer", customer), ("type", "card")])
            .send()
            .await?;

        let list: StripeList<StripePaymentMethod> = Self::check(resp).await?.json().await?;
        Ok(list.data.into_iter().map(PaymentMethodSummary::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_method_summary_from_card() {
        let raw = r#"{
            "object": "list",
            "data": [
                {"id": "pm_1", "type": "card", "card": {"brand": "visa", "last4": "4242", "exp_month": 12, "exp_year": 2030}},
                {"id": "pm_2", "type": "card"}
            ]
        }"#;
        let list: StripeList<StripePaymentMethod> = serde_json::from_str(raw).unwrap();
        let methods: Vec<PaymentMethodSummary> = list.data.into_iter().map(Into::into).collect();

        assert_eq!(methods.len(), 2);
        assert_eq!(methods[0].brand.as_deref(), Some("visa"));
        assert_eq!(methods[0].last4.as_deref(), Some("4242"));
        assert_eq!(methods[1].last4, None);
    }

    #[test]
    fn test_payment_intent_decodes_stripe_shape() {
        let raw = r#"{
            "id": "pi_123",
            "object": "payment_intent",
            "amount": 100000,
            "amount_received": 100000,
            "currency": "usd",
            "status": "succeeded",
            "client_secret": "pi_123_secret_abc",
            "metadata": {"symbol": "AAPL"}
        }"#;
        let intent: PaymentIntent = serde_json::from_str(raw).unwrap();
        assert_eq!(intent.amount_received, 100_000);
        assert_eq!(intent.status, super::super::IntentStatus::Succeeded);
        assert_eq!(intent.metadata.get("symbol").map(String::as_str), Some("AAPL"));
    }
}
