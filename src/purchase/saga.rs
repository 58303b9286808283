use std::time::Instant;

use metrics::{counter, histogram};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::db::InvestmentStore;
use crate::models::{Investment, NewPurchaseOrder, PurchaseStatus};
use crate::processor::webhook::WebhookEvent;
use crate::processor::{
    from_minor_units, to_minor_units, CreateIntent, IntentStatus, PaymentIntent, PaymentProcessor,
    ProcessorError,
};

use super::quote::{quote, PurchaseLimits, QuoteError};
use super::recorder::record_manual_purchase;
use super::PurchaseParams;

#[derive(Debug, Error)]
pub enum SagaError {
    #[error("invalid purchase")]
    Validation(Vec<QuoteError>),

    #[error("purchase details are required for an unknown payment")]
    MissingPurchase,

    #[error("payment not found")]
    NotFound,

    #[error("could not create payment order")]
    OrderCreation(#[source] ProcessorError),

    #[error("payment could not be verified")]
    Verification(#[source] ProcessorError),

    #[error("payment was not completed (status {0:?})")]
    NotCompleted(IntentStatus),

    #[error("payment does not match purchase: {0}")]
    Mismatch(String),

    #[error("payment captured but investment could not be recorded")]
    Recording(#[source] anyhow::Error),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Returned to the client after initiation; the client secret drives the
/// card form.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentOrder {
    pub order_id: Uuid,
    pub payment_intent_id: String,
    pub client_secret: String,
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub payment_intent_id: String,
    /// Used only when no journaled order carries this intent.
    #[serde(default)]
    pub purchase: Option<PurchaseParams>,
}

/// The purchase saga: initiate a payment, then verify the captured charge
/// and record the investment.
///
/// The two steps are not atomic across the processor and the store. If
/// recording fails after the charge was captured, the journal order ends in
/// `failed` with `payment_captured = true` and nothing compensates.
pub struct PurchaseSaga<'a> {
    store: &'a dyn InvestmentStore,
    processor: &'a dyn PaymentProcessor,
    limits: PurchaseLimits,
    currency: &'a str,
}

impl<'a> PurchaseSaga<'a> {
    pub fn new(
        store: &'a dyn InvestmentStore,
        processor: &'a dyn PaymentProcessor,
        limits: PurchaseLimits,
        currency: &'a str,
    ) -> Self {
        Self {
            store,
            processor,
            limits,
            currency,
        }
    }

    /// Validate the form, journal a draft order and ask the processor for a
    /// payment intent. No retry on processor failure.
    pub async fn initiate(&self, user_id: &str, params: &PurchaseParams) -> Result<PaymentOrder, SagaError> {
        let priced = quote(params.unit_price, params.quantity, &self.limits);
        if !priced.can_submit {
            return Err(SagaError::Validation(priced.errors));
        }
        let amount_minor = to_minor_units(priced.total)
            .ok_or_else(|| SagaError::Validation(vec![QuoteError::AboveMaximum {
                total: priced.total,
                max: self.limits.max_amount,
            }]))?;

        let order = self
            .store
            .insert_order(&NewPurchaseOrder {
                user_id: user_id.to_string(),
                symbol: params.symbol.trim().to_uppercase(),
                name: params.name.clone(),
                instrument_type: params.instrument_type,
                sector: params.sector.clone(),
                quantity: params.quantity,
                unit_price: params.unit_price,
                total: priced.total,
                currency: self.currency.to_string(),
            })
            .await?;

        let request = CreateIntent {
            amount_minor,
            currency: self.currency.to_string(),
            description: format!("{} x {}", order.quantity, order.symbol),
            metadata: vec![
                ("order_id".into(), order.id.to_string()),
                ("user_id".into(), user_id.to_string()),
                ("symbol".into(), order.symbol.clone()),
                ("quantity".into(), order.quantity.to_string()),
            ],
        };

        let intent = match self.processor.create_payment_intent(&request).await {
            Ok(intent) => intent,
            Err(e) => {
                tracing::error!(order_id = %order.id, error = %e, "Payment intent creation failed");
                self.fail(Some(order.id), "could not create payment order").await;
                return Err(SagaError::OrderCreation(e));
            }
        };

        let Some(client_secret) = intent.client_secret.clone() else {
            self.fail(Some(order.id), "processor returned no client secret").await;
            return Err(SagaError::OrderCreation(ProcessorError::Unexpected(
                "missing client secret".into(),
            )));
        };

        self.store.attach_payment_intent(order.id, &intent.id).await?;
        counter!("purchase_orders_created").increment(1);

        tracing::info!(
            user_id,
            order_id = %order.id,
            payment_intent_id = %intent.id,
            total = %priced.total,
            "Payment order created"
        );

        Ok(PaymentOrder {
            order_id: order.id,
            payment_intent_id: intent.id,
            client_secret,
            amount: priced.total,
            currency: self.currency.to_string(),
        })
    }

    /// Verify the charge with the processor and record the investment.
    ///
    /// Resubmitting a confirmation records another investment; a journal
    /// order already in a terminal state is left as it is.
    pub async fn confirm(&self, user_id: &str, request: &ConfirmPaymentRequest) -> Result<Investment, SagaError> {
        let started = Instant::now();
        let result = self.confirm_inner(user_id, request).await;
        histogram!("payment_confirmation_seconds").record(started.elapsed().as_secs_f64());
        if result.is_err() {
            counter!("purchase_orders_failed").increment(1);
        }
        result
    }

    async fn confirm_inner(&self, user_id: &str, request: &ConfirmPaymentRequest) -> Result<Investment, SagaError> {
        let intent_id = request.payment_intent_id.as_str();

        let order = match self.store.find_order_by_intent(intent_id).await? {
            Some(order) if order.user_id != user_id => return Err(SagaError::NotFound),
            other => other,
        };

        let (params, currency) = match &order {
            Some(order) => (PurchaseParams::from(order), order.currency.clone()),
            None => (
                request.purchase.clone().ok_or(SagaError::MissingPurchase)?,
                self.currency.to_string(),
            ),
        };

        let priced = quote(params.unit_price, params.quantity, &self.limits);
        if !priced.errors.is_empty() {
            return Err(SagaError::Validation(priced.errors));
        }

        // Only a live journal order moves through the saga states.
        let journal = match &order {
            Some(o) if o.status.can_transition_to(PurchaseStatus::Confirming) => Some(o.id),
            Some(o) if o.status.is_terminal() => {
                tracing::warn!(
                    order_id = %o.id,
                    status = %o.status,
                    payment_intent_id = intent_id,
                    "Confirmation resubmitted for settled order; recording again"
                );
                None
            }
            Some(o) => {
                tracing::warn!(
                    order_id = %o.id,
                    status = %o.status,
                    payment_intent_id = intent_id,
                    "Order is mid-confirmation; journal left unchanged"
                );
                None
            }
            None => None,
        };

        if let Some(id) = journal {
            self.store
                .set_order_status(id, PurchaseStatus::Confirming, None)
                .await?;
        }

        let intent = match self.processor.retrieve_payment_intent(intent_id).await {
            Ok(intent) => intent,
            Err(e) => {
                tracing::error!(payment_intent_id = intent_id, error = %e, "Payment verification failed");
                self.fail(journal, "payment could not be verified").await;
                return Err(SagaError::Verification(e));
            }
        };

        if let Some(owner) = intent.metadata.get("user_id") {
            if owner != user_id {
                self.fail(journal, "payment belongs to another user").await;
                return Err(SagaError::NotFound);
            }
        }

        if intent.status != IntentStatus::Succeeded {
            tracing::warn!(
                payment_intent_id = intent_id,
                status = ?intent.status,
                "Payment not completed"
            );
            self.fail(journal, "payment was not completed").await;
            return Err(SagaError::NotCompleted(intent.status));
        }

        if let Err(reason) = check_charge(&intent, priced.total, &currency) {
            tracing::error!(payment_intent_id = intent_id, reason = %reason, "Captured charge does not match purchase");
            // The processor holds the money either way.
            if let Err(store_err) = self.store.mark_order_captured(intent_id).await {
                tracing::error!(error = %store_err, "Failed to flag captured charge");
            }
            self.fail(journal, &reason).await;
            return Err(SagaError::Mismatch(reason));
        }

        let investment = match record_manual_purchase(self.store, user_id, &params, priced.total, intent_id).await {
            Ok(investment) => investment,
            Err(e) => {
                // Money is captured and there is no record: surfaced, not compensated.
                tracing::error!(
                    payment_intent_id = intent_id,
                    user_id,
                    error = %e,
                    "Charge captured but investment write failed; manual reconciliation required"
                );
                if let Err(store_err) = self.store.mark_order_captured(intent_id).await {
                    tracing::error!(error = %store_err, "Failed to flag captured charge");
                }
                self.fail(journal, "payment captured but investment could not be recorded")
                    .await;
                return Err(SagaError::Recording(e));
            }
        };

        match (journal, &order) {
            (Some(id), _) => {
                if let Err(e) = self.store.mark_order_recorded(id, investment.id).await {
                    tracing::error!(order_id = %id, error = %e, "Failed to mark order recorded");
                }
            }
            (None, Some(o)) => {
                tracing::warn!(
                    order_id = %o.id,
                    status = %o.status,
                    investment_id = %investment.id,
                    payment_intent_id = intent_id,
                    "Investment recorded against an order whose journal was left unchanged"
                );
            }
            (None, None) => {}
        }

        Ok(investment)
    }

    /// Move a journal order to `failed`. Store errors are logged only.
    async fn fail(&self, order_id: Option<Uuid>, reason: &str) {
        let Some(id) = order_id else {
            return;
        };
        if let Err(e) = self
            .store
            .set_order_status(id, PurchaseStatus::Failed, Some(reason))
            .await
        {
            tracing::error!(order_id = %id, error = %e, "Failed to mark order failed");
        }
    }
}

/// The captured amount and currency must match the quoted purchase.
fn check_charge(intent: &PaymentIntent, total: Decimal, currency: &str) -> Result<(), String> {
    if !intent.currency.eq_ignore_ascii_case(currency) {
        return Err(format!(
            "currency {} does not match {}",
            intent.currency, currency
        ));
    }
    match to_minor_units(total) {
        Some(expected) if expected == intent.amount_received => Ok(()),
        Some(_) => Err(format!(
            "captured {} {}, expected {}",
            from_minor_units(intent.amount_received),
            intent.currency,
            total
        )),
        None => Err(format!("total {total} is out of range")),
    }
}

/// Apply a verified processor event to the purchase journal.
pub async fn apply_processor_event(store: &dyn InvestmentStore, event: &WebhookEvent) -> anyhow::Result<()> {
    counter!("webhook_events_total").increment(1);

    let Some(intent) = event.payment_intent() else {
        tracing::debug!(event_id = %event.id, event_type = %event.event_type, "Ignoring processor event");
        return Ok(());
    };

    match event.event_type.as_str() {
        "payment_intent.succeeded" => {
            let found = store.mark_order_captured(&intent.id).await?;
            tracing::info!(
                event_id = %event.id,
                payment_intent_id = %intent.id,
                journaled = found,
                "Charge captured"
            );
        }
        "payment_intent.payment_failed" | "payment_intent.canceled" => {
            if let Some(order) = store.find_order_by_intent(&intent.id).await? {
                if order.status.can_transition_to(PurchaseStatus::Failed) {
                    store
                        .set_order_status(order.id, PurchaseStatus::Failed, Some(&event.event_type))
                        .await?;
                }
            }
            tracing::warn!(
                event_id = %event.id,
                payment_intent_id = %intent.id,
                event_type = %event.event_type,
                "Payment failed at processor"
            );
        }
        _ => {
            tracing::debug!(event_id = %event.id, event_type = %event.event_type, "Unhandled payment intent event");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn intent(amount_received: i64, currency: &str) -> PaymentIntent {
        PaymentIntent {
            id: "pi_1".into(),
            amount: amount_received,
            amount_received,
            currency: currency.into(),
            status: IntentStatus::Succeeded,
            client_secret: None,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_check_charge_matches() {
        assert!(check_charge(&intent(100_000, "usd"), Decimal::from(1000), "USD").is_ok());
    }

    #[test]
    fn test_check_charge_amount_mismatch() {
        assert!(check_charge(&intent(99_999, "usd"), Decimal::from(1000), "usd").is_err());
    }

    #[test]
    fn test_check_charge_currency_mismatch() {
        assert!(check_charge(&intent(100_000, "eur"), Decimal::from(1000), "usd").is_err());
    }
}
