use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Investment, NewInvestment, NewPurchaseOrder, PurchaseOrder, PurchaseStatus};

use super::InvestmentStore;

/// In-process store used when no database is configured, and by tests.
/// Same semantics as the Postgres store, including the lack of a
/// `(user, symbol)` constraint.
#[derive(Debug, Default)]
pub struct MemoryStore {
    investments: RwLock<Vec<Investment>>,
    orders: RwLock<Vec<PurchaseOrder>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InvestmentStore for MemoryStore {
    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn insert_investment(&self, new: &NewInvestment) -> anyhow::Result<Investment> {
        let investment = new.clone().into_investment(Uuid::new_v4());
        self.investments.write().await.push(investment.clone());
        Ok(investment)
    }

    async fn find_investment(&self, user_id: &str, symbol: &str) -> anyhow::Result<Option<Investment>> {
        let investments = self.investments.read().await;
        Ok(investments
            .iter()
            .find(|i| i.user_id == user_id && i.symbol == symbol)
            .cloned())
    }

    async fn list_investments(&self, user_id: &str) -> anyhow::Result<Vec<Investment>> {
        let investments = self.investments.read().await;
        let mut found: Vec<Investment> = investments
            .iter()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.purchase_date.cmp(&a.purchase_date));
        Ok(found)
    }

    async fn insert_order(&self, new: &NewPurchaseOrder) -> anyhow::Result<PurchaseOrder> {
        let now = Utc::now();
        let order = PurchaseOrder {
            id: Uuid::new_v4(),
            user_id: new.user_id.clone(),
            symbol: new.symbol.clone(),
            name: new.name.clone(),
            instrument_type: new.instrument_type,
            sector: new.sector.clone(),
            quantity: new.quantity,
            unit_price: new.unit_price,
            total: new.total,
            currency: new.currency.clone(),
            status: PurchaseStatus::Draft,
            payment_intent_id: None,
            investment_id: None,
            payment_captured: false,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        self.orders.write().await.push(order.clone());
        Ok(order)
    }

    async fn attach_payment_intent(&self, order_id: Uuid, payment_intent_id: &str) -> anyhow::Result<()> {
        let mut orders = self.orders.write().await;
        if let Some(order) = orders.iter_mut().find(|o| o.id == order_id) {
            order.payment_intent_id = Some(payment_intent_id.to_string());
            order.status = PurchaseStatus::AwaitingPayment;
            order.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_order_status(
        &self,
        order_id: Uuid,
        status: PurchaseStatus,
        error_message: Option<&str>,
    ) -> anyhow::Result<()> {
        let mut orders = self.orders.write().await;
        if let Some(order) = orders.iter_mut().find(|o| o.id == order_id) {
            order.status = status;
            if let Some(msg) = error_message {
                order.error_message = Some(msg.to_string());
            }
            order.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_order_recorded(&self, order_id: Uuid, investment_id: Uuid) -> anyhow::Result<()> {
        let mut orders = self.orders.write().await;
        if let Some(order) = orders.iter_mut().find(|o| o.id == order_id) {
            order.status = PurchaseStatus::Recorded;
            order.investment_id = Some(investment_id);
            order.payment_captured = true;
            order.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_order_captured(&self, payment_intent_id: &str) -> anyhow::Result<bool> {
        let mut orders = self.orders.write().await;
        let mut found = false;
        for order in orders
            .iter_mut()
            .filter(|o| o.payment_intent_id.as_deref() == Some(payment_intent_id))
        {
            order.payment_captured = true;
            order.updated_at = Utc::now();
            found = true;
        }
        Ok(found)
    }

    async fn find_order_by_intent(&self, payment_intent_id: &str) -> anyhow::Result<Option<PurchaseOrder>> {
        let orders = self.orders.read().await;
        Ok(orders
            .iter()
            .find(|o| o.payment_intent_id.as_deref() == Some(payment_intent_id))
            .cloned())
    }

    async fn list_orders(&self, user_id: &str) -> anyhow::Result<Vec<PurchaseOrder>> {
        let orders = self.orders.read().await;
        let mut found: Vec<PurchaseOrder> = orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn list_unreconciled_orders(&self, user_id: &str) -> anyhow::Result<Vec<PurchaseOrder>> {
        let orders = self.orders.read().await;
        Ok(orders
            .iter()
            .filter(|o| o.user_id == user_id && o.is_unreconciled())
            .cloned()
            .collect())
    }
}
