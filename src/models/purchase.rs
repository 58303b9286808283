use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::investment::InstrumentType;
use super::UnknownVariant;

/// Lifecycle of a purchase attempt.
///
/// `Draft → AwaitingPayment → Confirming → {Recorded | Failed}`. `Draft` and
/// `AwaitingPayment` may also fail directly. There is no refunded or
/// cancelled state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Draft,
    AwaitingPayment,
    Confirming,
    Recorded,
    Failed,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Draft => "draft",
            PurchaseStatus::AwaitingPayment => "awaiting_payment",
            PurchaseStatus::Confirming => "confirming",
            PurchaseStatus::Recorded => "recorded",
            PurchaseStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PurchaseStatus::Recorded | PurchaseStatus::Failed)
    }

    pub fn can_transition_to(&self, next: PurchaseStatus) -> bool {
        use PurchaseStatus::*;
        matches!(
            (self, next),
            (Draft, AwaitingPayment)
                | (Draft, Failed)
                | (AwaitingPayment, Confirming)
                | (AwaitingPayment, Failed)
                | (Confirming, Recorded)
                | (Confirming, Failed)
        )
    }
}

impl TryFrom<String> for PurchaseStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "draft" => Ok(PurchaseStatus::Draft),
            "awaiting_payment" => Ok(PurchaseStatus::AwaitingPayment),
            "confirming" => Ok(PurchaseStatus::Confirming),
            "recorded" => Ok(PurchaseStatus::Recorded),
            "failed" => Ok(PurchaseStatus::Failed),
            _ => Err(UnknownVariant::new("purchase status", value)),
        }
    }
}

impl std::fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database row for the purchase_orders journal.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub user_id: String,
    pub symbol: String,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub instrument_type: InstrumentType,
    pub sector: Option<String>,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub total: Decimal,
    pub currency: String,
    #[sqlx(try_from = "String")]
    pub status: PurchaseStatus,
    pub payment_intent_id: Option<String>,
    pub investment_id: Option<Uuid>,
    pub payment_captured: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PurchaseOrder {
    /// Captured charge with no investment behind it.
    pub fn is_unreconciled(&self) -> bool {
        self.payment_captured && self.status != PurchaseStatus::Recorded
    }
}

#[derive(Debug, Clone)]
pub struct NewPurchaseOrder {
    pub user_id: String,
    pub symbol: String,
    pub name: String,
    pub instrument_type: InstrumentType,
    pub sector: Option<String>,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub total: Decimal,
    pub currency: String,
}
