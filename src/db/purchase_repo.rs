use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{NewPurchaseOrder, PurchaseOrder, PurchaseStatus};

/// Journal a new purchase attempt in `draft`.
pub async fn insert_order(pool: &PgPool, new: &NewPurchaseOrder) -> anyhow::Result<PurchaseOrder> {
    let now = Utc::now();
    let order = sqlx::query_as::<_, PurchaseOrder>(
        r#"
        INSERT INTO purchase_orders (
            id, user_id, symbol, name, instrument_type, sector, quantity,
            unit_price, total, currency, status, payment_captured, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, false, $12, $12)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&new.user_id)
    .bind(&new.symbol)
    .bind(&new.name)
    .bind(new.instrument_type.as_str())
    .bind(&new.sector)
    .bind(new.quantity)
    .bind(new.unit_price)
    .bind(new.total)
    .bind(&new.currency)
    .bind(PurchaseStatus::Draft.as_str())
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(order)
}

/// Attach the processor's intent and move to `awaiting_payment`.
pub async fn attach_payment_intent(
    pool: &PgPool,
    order_id: Uuid,
    payment_intent_id: &str,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE purchase_orders
        SET payment_intent_id = $2, status = $3, updated_at = $4
        WHERE id = $1
        "#,
    )
    .bind(order_id)
    .bind(payment_intent_id)
    .bind(PurchaseStatus::AwaitingPayment.as_str())
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Set a new status, optionally with an error message.
pub async fn set_status(
    pool: &PgPool,
    order_id: Uuid,
    status: PurchaseStatus,
    error_message: Option<&str>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE purchase_orders
        SET status = $2, error_message = COALESCE($3, error_message), updated_at = $4
        WHERE id = $1
        "#,
    )
    .bind(order_id)
    .bind(status.as_str())
    .bind(error_message)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Mark an order `recorded` against the investment it produced.
pub async fn mark_recorded(pool: &PgPool, order_id: Uuid, investment_id: Uuid) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE purchase_orders
        SET status = $2, investment_id = $3, payment_captured = true, updated_at = $4
        WHERE id = $1
        "#,
    )
    .bind(order_id)
    .bind(PurchaseStatus::Recorded.as_str())
    .bind(investment_id)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Flag the charge behind an intent as captured. Returns false when no order
/// carries that intent.
pub async fn mark_captured(pool: &PgPool, payment_intent_id: &str) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE purchase_orders
        SET payment_captured = true, updated_at = $2
        WHERE payment_intent_id = $1
        "#,
    )
    .bind(payment_intent_id)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_by_payment_intent(
    pool: &PgPool,
    payment_intent_id: &str,
) -> anyhow::Result<Option<PurchaseOrder>> {
    let order = sqlx::query_as::<_, PurchaseOrder>(
        "SELECT * FROM purchase_orders WHERE payment_intent_id = $1 LIMIT 1",
    )
    .bind(payment_intent_id)
    .fetch_optional(pool)
    .await?;

    Ok(order)
}

/// Purchase history for a user, newest first.
pub async fn get_orders_by_user(pool: &PgPool, user_id: &str) -> anyhow::Result<Vec<PurchaseOrder>> {
    let orders = sqlx::query_as::<_, PurchaseOrder>(
        "SELECT * FROM purchase_orders WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(orders)
}

/// Orders whose charge was captured but never turned into an investment.
pub async fn get_unreconciled_orders(pool: &PgPool, user_id: &str) -> anyhow::Result<Vec<PurchaseOrder>> {
    let orders = sqlx::query_as::<_, PurchaseOrder>(
        r#"
        SELECT * FROM purchase_orders
        WHERE user_id = $1 AND payment_captured = true AND status <> 'recorded'
        ORDER BY created_at ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(orders)
}
