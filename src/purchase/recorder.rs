use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;

use crate::db::InvestmentStore;
use crate::models::{Investment, NewInvestment, Provenance};

use super::PurchaseParams;

/// Write the investment behind a confirmed payment.
///
/// Always inserts: there is no idempotency key, so recording the same
/// payment twice yields two records.
pub async fn record_manual_purchase(
    store: &dyn InvestmentStore,
    user_id: &str,
    params: &PurchaseParams,
    total: Decimal,
    payment_intent_id: &str,
) -> anyhow::Result<Investment> {
    if params.quantity < 1 {
        anyhow::bail!("cannot record a purchase of {} units", params.quantity);
    }
    let avg_price = total / Decimal::from(params.quantity);

    let new = NewInvestment::new(
        user_id,
        &params.symbol,
        &params.name,
        params.instrument_type,
        params.quantity,
        avg_price,
        avg_price,
        params.sector.clone(),
        Some(payment_intent_id.to_string()),
        Provenance::Manual,
        Utc::now(),
    )?
    .with_total_invested(total);

    let investment = store.insert_investment(&new).await?;
    counter!("investments_recorded").increment(1);

    tracing::info!(
        user_id,
        investment_id = %investment.id,
        symbol = %investment.symbol,
        quantity = investment.quantity,
        total = %investment.total_invested,
        payment_intent_id,
        "Investment recorded"
    );

    Ok(investment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{InstrumentType, InvestmentStatus};

    fn params(quantity: i64) -> PurchaseParams {
        PurchaseParams {
            symbol: "MSFT".into(),
            name: "Microsoft".into(),
            instrument_type: InstrumentType::Stock,
            sector: Some("Technology".into()),
            quantity,
            unit_price: Decimal::from(100),
        }
    }

    #[tokio::test]
    async fn test_records_active_manual_investment() {
        let store = MemoryStore::new();
        let inv = record_manual_purchase(&store, "u1", &params(4), Decimal::from(400), "pi_1")
            .await
            .unwrap();

        assert_eq!(inv.status, InvestmentStatus::Active);
        assert_eq!(inv.source, Provenance::Manual);
        assert_eq!(inv.total_invested, Decimal::from(400));
        assert_eq!(inv.avg_price, Decimal::from(100));
        assert_eq!(inv.payment_intent_id.as_deref(), Some("pi_1"));
    }

    #[tokio::test]
    async fn test_total_preserved_when_not_divisible() {
        let store = MemoryStore::new();
        let inv = record_manual_purchase(&store, "u1", &params(3), Decimal::from(100), "pi_2")
            .await
            .unwrap();

        assert_eq!(inv.total_invested, Decimal::from(100));
        assert_eq!(inv.avg_price, Decimal::from(100) / Decimal::from(3));
    }

    #[tokio::test]
    async fn test_repeat_recording_duplicates() {
        let store = MemoryStore::new();
        for _ in 0..2 {
            record_manual_purchase(&store, "u1", &params(1), Decimal::from(100), "pi_3")
                .await
                .unwrap();
        }
        assert_eq!(store.list_investments("u1").await.unwrap().len(), 2);
    }
}
