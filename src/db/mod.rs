pub mod investment_repo;
pub mod memory;
pub mod purchase_repo;

pub use memory::MemoryStore;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Investment, NewInvestment, NewPurchaseOrder, PurchaseOrder, PurchaseStatus};

pub async fn init_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    // Verify connectivity
    sqlx::query("SELECT 1").execute(&pool).await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Persistence seam for investments and the purchase journal.
#[async_trait]
pub trait InvestmentStore: Send + Sync {
    async fn ping(&self) -> anyhow::Result<()>;

    async fn insert_investment(&self, new: &NewInvestment) -> anyhow::Result<Investment>;

    async fn find_investment(&self, user_id: &str, symbol: &str) -> anyhow::Result<Option<Investment>>;

    async fn list_investments(&self, user_id: &str) -> anyhow::Result<Vec<Investment>>;

    async fn insert_order(&self, new: &NewPurchaseOrder) -> anyhow::Result<PurchaseOrder>;

    async fn attach_payment_intent(&self, order_id: Uuid, payment_intent_id: &str) -> anyhow::Result<()>;

    async fn set_order_status(
        &self,
        order_id: Uuid,
        status: PurchaseStatus,
        error_message: Option<&str>,
    ) -> anyhow::Result<()>;

    async fn mark_order_recorded(&self, order_id: Uuid, investment_id: Uuid) -> anyhow::Result<()>;

    async fn mark_order_captured(&self, payment_intent_id: &str) -> anyhow::Result<bool>;

    async fn find_order_by_intent(&self, payment_intent_id: &str) -> anyhow::Result<Option<PurchaseOrder>>;

    async fn list_orders(&self, user_id: &str) -> anyhow::Result<Vec<PurchaseOrder>>;

    async fn list_unreconciled_orders(&self, user_id: &str) -> anyhow::Result<Vec<PurchaseOrder>>;
}

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InvestmentStore for PgStore {
    async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_investment(&self, new: &NewInvestment) -> anyhow::Result<Investment> {
        investment_repo::insert_investment(&self.pool, new).await
    }

    async fn find_investment(&self, user_id: &str, symbol: &str) -> anyhow::Result<Option<Investment>> {
        investment_repo::find_by_user_and_symbol(&self.pool, user_id, symbol).await
    }

    async fn list_investments(&self, user_id: &str) -> anyhow::Result<Vec<Investment>> {
        investment_repo::get_investments_by_user(&self.pool, user_id).await
    }

    async fn insert_order(&self, new: &NewPurchaseOrder) -> anyhow::Result<PurchaseOrder> {
        purchase_repo::insert_order(&self.pool, new).await
    }

    async fn attach_payment_intent(&self, order_id: Uuid, payment_intent_id: &str) -> anyhow::Result<()> {
        purchase_repo::attach_payment_intent(&self.pool, order_id, payment_intent_id).await
    }

    async fn set_order_status(
        &self,
        order_id: Uuid,
        status: PurchaseStatus,
        error_message: Option<&str>,
    ) -> anyhow::Result<()> {
        purchase_repo::set_status(&self.pool, order_id, status, error_message).await
    }

    async fn mark_order_recorded(&self, order_id: Uuid, investment_id: Uuid) -> anyhow::Result<()> {
        purchase_repo::mark_recorded(&self.pool, order_id, investment_id).await
    }

    async fn mark_order_captured(&self, payment_intent_id: &str) -> anyhow::Result<bool> {
        purchase_repo::mark_captured(&self.pool, payment_intent_id).await
    }

    async fn find_order_by_intent(&self, payment_intent_id: &str) -> anyhow::Result<Option<PurchaseOrder>> {
        purchase_repo::get_by_payment_intent(&self.pool, payment_intent_id).await
    }

    async fn list_orders(&self, user_id: &str) -> anyhow::Result<Vec<PurchaseOrder>> {
        purchase_repo::get_orders_by_user(&self.pool, user_id).await
    }

    async fn list_unreconciled_orders(&self, user_id: &str) -> anyhow::Result<Vec<PurchaseOrder>> {
        purchase_repo::get_unreconciled_orders(&self.pool, user_id).await
    }
}
