pub mod investment;
pub mod purchase;

pub use investment::{
    InstrumentType, Investment, InvestmentError, InvestmentStatus, NewInvestment, Provenance,
    Valuation,
};
pub use purchase::{NewPurchaseOrder, PurchaseOrder, PurchaseStatus};

use thiserror::Error;

/// A stored enum column held a value this build does not know about.
#[derive(Debug, Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: String) -> Self {
        Self { kind, value }
    }
}
