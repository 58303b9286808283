use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tower::ServiceExt;
use uuid::Uuid;

use finboard::aggregator::{
    AccessGrant, Account, Aggregator, AggregatorError, Balances, Holding, HoldingsSnapshot,
    LinkToken, Security, TransactionsPage,
};
use finboard::api::router::create_router;
use finboard::config::AppConfig;
use finboard::db::{InvestmentStore, MemoryStore};
use finboard::models::{Investment, NewInvestment, NewPurchaseOrder, PurchaseOrder, PurchaseStatus};
use finboard::processor::{
    CreateIntent, IntentStatus, PaymentIntent, PaymentMethodSummary, PaymentProcessor,
    ProcessorError,
};
use finboard::AppState;

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

// ---------------------------------------------------------------------------
// Fake payment processor
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeProcessor {
    intents: Mutex<HashMap<String, PaymentIntent>>,
    next_id: AtomicUsize,
    pub fail_create: AtomicBool,
    pub fail_retrieve: AtomicBool,
}

#[allow(dead_code)]
impl FakeProcessor {
    /// Simulate the client completing the card form.
    pub fn capture(&self, intent_id: &str) {
        let mut intents = self.intents.lock().unwrap();
        let intent = intents.get_mut(intent_id).expect("unknown intent");
        intent.status = IntentStatus::Succeeded;
        intent.amount_received = intent.amount;
    }

    pub fn capture_amount(&self, intent_id: &str, amount_received: i64) {
        let mut intents = self.intents.lock().unwrap();
        let intent = intents.get_mut(intent_id).expect("unknown intent");
        intent.status = IntentStatus::Succeeded;
        intent.amount_received = amount_received;
    }

    /// Register an intent created outside this server.
    pub fn insert_intent(&self, intent: PaymentIntent) {
        self.intents.lock().unwrap().insert(intent.id.clone(), intent);
    }
}

#[async_trait]
impl PaymentProcessor for FakeProcessor {
    async fn create_payment_intent(&self, request: &CreateIntent) -> Result<PaymentIntent, ProcessorError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ProcessorError::Api {
                status: 500,
                message: "processor unavailable".into(),
            });
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = format!("pi_test_{n}");
        let intent = PaymentIntent {
            id: id.clone(),
            amount: request.amount_minor,
            amount_received: 0,
            currency: request.currency.clone(),
            status: IntentStatus::RequiresPaymentMethod,
            client_secret: Some(format!("{id}_secret")),
            metadata: request.metadata.iter().cloned().collect(),
        };
        self.intents.lock().unwrap().insert(id, intent.clone());
        Ok(intent)
    }

    async fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent, ProcessorError> {
        if self.fail_retrieve.load(Ordering::SeqCst) {
            return Err(ProcessorError::Unexpected("connection reset".into()));
        }
        self.intents
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| ProcessorError::Api {
                status: 404,
                message: format!("No such payment_intent: {id}"),
            })
    }

    async fn list_payment_methods(&self, customer: &str) -> Result<Vec<PaymentMethodSummary>, ProcessorError> {
        Ok(vec![PaymentMethodSummary {
            id: format!("pm_{customer}"),
            brand: Some("visa".into()),
            last4: Some("4242".into()),
            exp_month: Some(12),
            exp_year: Some(2030),
        }])
    }
}

// ---------------------------------------------------------------------------
// Fake aggregator
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeAggregator {
    pub accounts: Mutex<Vec<Account>>,
    pub snapshot: Mutex<HoldingsSnapshot>,
    pub fail: AtomicBool,
}

#[allow(dead_code)]
impl FakeAggregator {
    /// One brokerage account holding `quantity` units of each ticker at `price`.
    pub fn with_holdings(holdings: &[(&str, &str, i64, i64)]) -> Self {
        let fake = Self::default();
        fake.set_holdings(holdings);
        fake
    }

    /// `(ticker, security type, quantity, price)` tuples.
    pub fn set_holdings(&self, holdings: &[(&str, &str, i64, i64)]) {
        *self.accounts.lock().unwrap() = vec![Account {
            account_id: "acc_1".into(),
            name: "Brokerage".into(),
            official_name: None,
            mask: Some("0000".into()),
            account_type: "investment".into(),
            subtype: Some("brokerage".into()),
            balances: Balances {
                available: None,
                current: Some(Decimal::from(10_000)),
                iso_currency_code: Some("USD".into()),
            },
        }];

        let mut snapshot = HoldingsSnapshot::default();
        for (i, (ticker, kind, quantity, price)) in holdings.iter().enumerate() {
            let security_id = format!("sec_{i}");
            snapshot.securities.push(Security {
                security_id: security_id.clone(),
                ticker_symbol: Some(ticker.to_string()),
                name: Some(format!("{ticker} Inc.")),
                security_type: Some(kind.to_string()),
                close_price: Some(Decimal::from(*price)),
                sector: Some("Technology".into()),
            });
            snapshot.holdings.push(Holding {
                account_id: "acc_1".into(),
                security_id,
                quantity: Decimal::from(*quantity),
                institution_price: Decimal::from(*price),
                institution_value: None,
                cost_basis: None,
                iso_currency_code: Some("USD".into()),
            });
        }
        *self.snapshot.lock().unwrap() = snapshot;
    }

    fn check(&self) -> Result<(), AggregatorError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AggregatorError::Api {
                code: "ITEM_LOGIN_REQUIRED".into(),
                message: "the login details of this item have changed".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Aggregator for FakeAggregator {
    async fn create_link_token(&self, user_id: &str) -> Result<LinkToken, AggregatorError> {
        self.check()?;
        Ok(LinkToken {
            link_token: format!("link-sandbox-{user_id}"),
            expiration: "2030-01-01T00:00:00Z".into(),
        })
    }

    async fn exchange_public_token(&self, public_token: &str) -> Result<AccessGrant, AggregatorError> {
        self.check()?;
        Ok(AccessGrant {
            access_token: format!("access-{public_token}"),
            item_id: "item_1".into(),
        })
    }

    async fn accounts(&self, _access_token: &str) -> Result<Vec<Account>, AggregatorError> {
        self.check()?;
        Ok(self.accounts.lock().unwrap().clone())
    }

    async fn investment_holdings(&self, _access_token: &str) -> Result<HoldingsSnapshot, AggregatorError> {
        self.check()?;
        Ok(self.snapshot.lock().unwrap().clone())
    }

    async fn transactions(
        &self,
        _access_token: &str,
        _start_date: NaiveDate,
        _end_date: NaiveDate,
    ) -> Result<TransactionsPage, AggregatorError> {
        self.check()?;
        Ok(TransactionsPage {
            accounts: self.accounts.lock().unwrap().clone(),
            transactions: vec![],
            total_transactions: 0,
        })
    }

    async fn balances(&self, _access_token: &str) -> Result<Vec<Account>, AggregatorError> {
        self.check()?;
        Ok(self.accounts.lock().unwrap().clone())
    }
}

// ---------------------------------------------------------------------------
// Store that can refuse investment writes
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_investment_writes: AtomicBool,
}

#[async_trait]
impl InvestmentStore for FlakyStore {
    async fn ping(&self) -> anyhow::Result<()> {
        self.inner.ping().await
    }

    async fn insert_investment(&self, new: &NewInvestment) -> anyhow::Result<Investment> {
        if self.fail_investment_writes.load(Ordering::SeqCst) {
            anyhow::bail!("write timed out");
        }
        self.inner.insert_investment(new).await
    }

    async fn find_investment(&self, user_id: &str, symbol: &str) -> anyhow::Result<Option<Investment>> {
        self.inner.find_investment(user_id, symbol).await
    }

    async fn list_investments(&self, user_id: &str) -> anyhow::Result<Vec<Investment>> {
        self.inner.list_investments(user_id).await
    }

    async fn insert_order(&self, new: &NewPurchaseOrder) -> anyhow::Result<PurchaseOrder> {
        self.inner.insert_order(new).await
    }

    async fn attach_payment_intent(&self, order_id: Uuid, payment_intent_id: &str) -> anyhow::Result<()> {
        self.inner.attach_payment_intent(order_id, payment_intent_id).await
    }

    async fn set_order_status(
        &self,
        order_id: Uuid,
        status: PurchaseStatus,
        error_message: Option<&str>,
    ) -> anyhow::Result<()> {
        self.inner.set_order_status(order_id, status, error_message).await
    }

    async fn mark_order_recorded(&self, order_id: Uuid, investment_id: Uuid) -> anyhow::Result<()> {
        self.inner.mark_order_recorded(order_id, investment_id).await
    }

    async fn mark_order_captured(&self, payment_intent_id: &str) -> anyhow::Result<bool> {
        self.inner.mark_order_captured(payment_intent_id).await
    }

    async fn find_order_by_intent(&self, payment_intent_id: &str) -> anyhow::Result<Option<PurchaseOrder>> {
        self.inner.find_order_by_intent(payment_intent_id).await
    }

    async fn list_orders(&self, user_id: &str) -> anyhow::Result<Vec<PurchaseOrder>> {
        self.inner.list_orders(user_id).await
    }

    async fn list_unreconciled_orders(&self, user_id: &str) -> anyhow::Result<Vec<PurchaseOrder>> {
        self.inner.list_unreconciled_orders(user_id).await
    }
}

// ---------------------------------------------------------------------------
// App harness
// ---------------------------------------------------------------------------

#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub store: Arc<FlakyStore>,
    pub processor: Arc<FakeProcessor>,
    pub aggregator: Arc<FakeAggregator>,
}

/// Router over an in-memory store with fake third parties.
#[allow(dead_code)]
pub fn build_test_app() -> TestApp {
    build_test_app_with(FakeAggregator::default())
}

#[allow(dead_code)]
pub fn build_test_app_with(aggregator: FakeAggregator) -> TestApp {
    let store = Arc::new(FlakyStore::default());
    let processor = Arc::new(FakeProcessor::default());
    let aggregator = Arc::new(aggregator);

    let mut config = AppConfig::local();
    config.stripe_webhook_secret = Some(WEBHOOK_SECRET.into());
    config.purchase_limits.min_amount = Decimal::from(100);
    config.purchase_limits.max_amount = Decimal::from(100_000);

    let state = AppState {
        store: store.clone(),
        config,
        metrics_handle: finboard::metrics::init_metrics(),
        processor: Some(processor.clone()),
        aggregator: Some(aggregator.clone()),
    };

    TestApp {
        router: create_router(state),
        store,
        processor,
        aggregator,
    }
}

/// Router with no processor or aggregator configured.
#[allow(dead_code)]
pub fn build_bare_app() -> axum::Router {
    let state = AppState {
        store: Arc::new(MemoryStore::new()),
        config: AppConfig::local(),
        metrics_handle: finboard::metrics::init_metrics(),
        processor: None,
        aggregator: None,
    };
    create_router(state)
}

/// Send a request and decode the JSON response body.
#[allow(dead_code)]
pub async fn send(
    router: &axum::Router,
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_string(&json).unwrap())
        }
        None => Body::empty(),
    };

    let resp = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

/// Decimals serialize as strings; accept either form.
#[allow(dead_code)]
pub fn decimal(value: &serde_json::Value) -> Decimal {
    match value {
        serde_json::Value::String(s) => s.parse().expect("decimal string"),
        serde_json::Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("not a decimal: {other}"),
    }
}
