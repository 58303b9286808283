use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Investment, InvestmentStatus, NewInvestment};

/// Insert a new investment record. No uniqueness is enforced here.
pub async fn insert_investment(pool: &PgPool, new: &NewInvestment) -> anyhow::Result<Investment> {
    let investment = sqlx::query_as::<_, Investment>(
        r#"
        INSERT INTO investments (
            id, user_id, symbol, name, instrument_type, quantity,
            avg_price, current_price, total_invested, current_value,
            gain_loss, gain_loss_percent, sector, purchase_date, last_updated,
            payment_intent_id, status, source
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14, $15, $16, $17)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&new.user_id)
    .bind(&new.symbol)
    .bind(&new.name)
    .bind(new.instrument_type.as_str())
    .bind(new.quantity)
    .bind(new.avg_price)
    .bind(new.current_price)
    .bind(new.total_invested)
    .bind(new.valuation.current_value)
    .bind(new.valuation.gain_loss)
    .bind(new.valuation.gain_loss_percent)
    .bind(&new.sector)
    .bind(new.purchase_date)
    .bind(&new.payment_intent_id)
    .bind(InvestmentStatus::Active.as_str())
    .bind(new.source.as_str())
    .fetch_one(pool)
    .await?;

    Ok(investment)
}

/// Find any investment the user holds in `symbol`.
pub async fn find_by_user_and_symbol(
    pool: &PgPool,
    user_id: &str,
    symbol: &str,
) -> anyhow::Result<Option<Investment>> {
    let investment = sqlx::query_as::<_, Investment>(
        "SELECT * FROM investments WHERE user_id = $1 AND symbol = $2 LIMIT 1",
    )
    .bind(user_id)
    .bind(symbol)
    .fetch_optional(pool)
    .await?;

    Ok(investment)
}

/// All investments for a user, newest first.
pub async fn get_investments_by_user(pool: &PgPool, user_id: &str) -> anyhow::Result<Vec<Investment>> {
    let investments = sqlx::query_as::<_, Investment>(
        "SELECT * FROM investments WHERE user_id = $1 ORDER BY purchase_date DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(investments)
}

