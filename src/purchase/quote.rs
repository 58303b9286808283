use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bounds on the total of a single purchase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PurchaseLimits {
    pub min_amount: Decimal,
    pub max_amount: Decimal,
}

impl Default for PurchaseLimits {
    fn default() -> Self {
        Self {
            min_amount: Decimal::ONE,
            max_amount: Decimal::from(100_000),
        }
    }
}

/// A user-correctable problem with a purchase form.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum QuoteError {
    #[error("quantity must be at least 1")]
    QuantityTooSmall { quantity: i64 },

    #[error("price must be positive")]
    InvalidPrice { price: Decimal },

    #[error("total {total} is below the minimum of {min}")]
    BelowMinimum { total: Decimal, min: Decimal },

    #[error("total {total} exceeds the maximum of {max}")]
    AboveMaximum { total: Decimal, max: Decimal },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PurchaseQuote {
    pub total: Decimal,
    pub errors: Vec<QuoteError>,
    pub can_submit: bool,
}

impl PurchaseQuote {
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

/// Price a purchase of `quantity` units at `price`, collecting every
/// validation error rather than stopping at the first.
pub fn quote(price: Decimal, quantity: i64, limits: &PurchaseLimits) -> PurchaseQuote {
    // An unrepresentable total is treated as exceeding any maximum.
    let total = Decimal::from(quantity)
        .checked_mul(price)
        .unwrap_or(Decimal::MAX);
    let mut errors = Vec::new();

    if quantity < 1 {
        errors.push(QuoteError::QuantityTooSmall { quantity });
    }

    if price <= Decimal::ZERO {
        errors.push(QuoteError::InvalidPrice { price });
    }

    // Bounds only make sense once the inputs are usable.
    if errors.is_empty() {
        if total < limits.min_amount {
            errors.push(QuoteError::BelowMinimum {
                total,
                min: limits.min_amount,
            });
        }
        if total > limits.max_amount {
            errors.push(QuoteError::AboveMaximum {
                total,
                max: limits.max_amount,
            });
        }
    }

    let can_submit = errors.is_empty() && total >= limits.min_amount;

    PurchaseQuote {
        total,
        errors,
        can_submit,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
