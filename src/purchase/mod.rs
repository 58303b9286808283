pub mod quote;
pub mod recorder;
pub mod saga;

pub use quote::{quote, PurchaseLimits, PurchaseQuote, QuoteError};
pub use recorder::record_manual_purchase;
pub use saga::{ConfirmPaymentRequest, PaymentOrder, PurchaseSaga, SagaError};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{InstrumentType, PurchaseOrder};

/// What the user is buying.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseParams {
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    pub instrument_type: InstrumentType,
    #[serde(default)]
    pub sector: Option<String>,
    pub quantity: i64,
    #[serde(alias = "price")]
    pub unit_price: Decimal,
}

impl From<&PurchaseOrder> for PurchaseParams {
    fn from(order: &PurchaseOrder) -> Self {
        Self {
            symbol: order.symbol.clone(),
            name: order.name.clone(),
            instrument_type: order.instrument_type,
            sector: order.sector.clone(),
            quantity: order.quantity,
            unit_price: order.unit_price,
        }
    }
}
