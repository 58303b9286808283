use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

use super::UnknownVariant;

// ---------------------------------------------------------------------------
// InstrumentType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentType {
    Stock,
    Etf,
    MutualFund,
    Bond,
}

impl InstrumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentType::Stock => "stock",
            InstrumentType::Etf => "etf",
            InstrumentType::MutualFund => "mutual_fund",
            InstrumentType::Bond => "bond",
        }
    }

    /// Map an aggregator security type (`equity`, `etf`, `mutual fund`,
    /// `fixed income`) onto the instrument types we record.
    pub fn from_aggregator(security_type: &str) -> Option<Self> {
        match security_type.to_lowercase().as_str() {
            "equity" => Some(InstrumentType::Stock),
            "etf" => Some(InstrumentType::Etf),
            "mutual fund" => Some(InstrumentType::MutualFund),
            "fixed income" => Some(InstrumentType::Bond),
            _ => None,
        }
    }
}

impl TryFrom<String> for InstrumentType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "stock" => Ok(InstrumentType::Stock),
            "etf" => Ok(InstrumentType::Etf),
            "mutual_fund" => Ok(InstrumentType::MutualFund),
            "bond" => Ok(InstrumentType::Bond),
            _ => Err(UnknownVariant::new("instrument type", value)),
        }
    }
}

impl std::fmt::Display for InstrumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Lifecycle status / provenance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentStatus {
    Active,
    Closed,
}

impl InvestmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvestmentStatus::Active => "active",
            InvestmentStatus::Closed => "closed",
        }
    }
}

impl TryFrom<String> for InvestmentStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "active" => Ok(InvestmentStatus::Active),
            "closed" => Ok(InvestmentStatus::Closed),
            _ => Err(UnknownVariant::new("investment status", value)),
        }
    }
}

/// Where an investment record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Manual,
    Aggregator,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Manual => "manual",
            Provenance::Aggregator => "aggregator",
        }
    }
}

impl TryFrom<String> for Provenance {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "manual" => Ok(Provenance::Manual),
            "aggregator" => Ok(Provenance::Aggregator),
            _ => Err(UnknownVariant::new("provenance", value)),
        }
    }
}

// ---------------------------------------------------------------------------
// Investment
// ---------------------------------------------------------------------------

/// Database row for the investments table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Investment {
    pub id: Uuid,
    pub user_id: String,
    pub symbol: String,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub instrument_type: InstrumentType,
    pub quantity: i64,
    pub avg_price: Decimal,
    pub current_price: Decimal,
    pub total_invested: Decimal,
    pub current_value: Decimal,
    pub gain_loss: Decimal,
    pub gain_loss_percent: Decimal,
    pub sector: Option<String>,
    pub purchase_date: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub payment_intent_id: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: InvestmentStatus,
    #[sqlx(try_from = "String")]
    pub source: Provenance,
}

impl Investment {
    /// Recompute market value and gain/loss against a fresh price.
    pub fn revalue(&mut self, current_price: Decimal, now: DateTime<Utc>) {
        let valuation = Valuation::compute(self.quantity, self.total_invested, current_price);
        self.current_price = current_price;
        self.current_value = valuation.current_value;
        self.gain_loss = valuation.gain_loss;
        self.gain_loss_percent = valuation.gain_loss_percent;
        self.last_updated = now;
    }
}

/// Derived market values for a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Valuation {
    pub current_value: Decimal,
    pub gain_loss: Decimal,
    pub gain_loss_percent: Decimal,
}

impl Valuation {
    pub fn compute(quantity: i64, total_invested: Decimal, current_price: Decimal) -> Self {
        let current_value = Decimal::from(quantity) * current_price;
        let gain_loss = current_value - total_invested;
        let gain_loss_percent = if total_invested.is_zero() {
            Decimal::ZERO
        } else {
            (gain_loss / total_invested * Decimal::ONE_HUNDRED).round_dp(4)
        };

        Self {
            current_value,
            gain_loss,
            gain_loss_percent,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvestmentError {
    #[error("quantity must be at least 1, got {0}")]
    QuantityTooSmall(i64),

    #[error("{field} must be positive, got {value}")]
    NonPositivePrice { field: &'static str, value: Decimal },

    #[error("symbol must not be empty")]
    EmptySymbol,
}

/// An investment ready to be inserted. Derived values are computed here so
/// that callers can never supply inconsistent totals.
#[derive(Debug, Clone)]
pub struct NewInvestment {
    pub user_id: String,
    pub symbol: String,
    pub name: String,
    pub instrument_type: InstrumentType,
    pub quantity: i64,
    pub avg_price: Decimal,
    pub current_price: Decimal,
    pub total_invested: Decimal,
    pub valuation: Valuation,
    pub sector: Option<String>,
    pub purchase_date: DateTime<Utc>,
    pub payment_intent_id: Option<String>,
    pub source: Provenance,
}

impl NewInvestment {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: &str,
        symbol: &str,
        name: &str,
        instrument_type: InstrumentType,
        quantity: i64,
        avg_price: Decimal,
        current_price: Decimal,
        sector: Option<String>,
        payment_intent_id: Option<String>,
        source: Provenance,
        purchase_date: DateTime<Utc>,
    ) -> Result<Self, InvestmentError> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(InvestmentError::EmptySymbol);
        }
        if quantity < 1 {
            return Err(InvestmentError::QuantityTooSmall(quantity));
        }
        if avg_price <= Decimal::ZERO {
            return Err(InvestmentError::NonPositivePrice {
                field: "average price",
                value: avg_price,
            });
        }
        if current_price <= Decimal::ZERO {
            return Err(InvestmentError::NonPositivePrice {
                field: "current price",
                value: current_price,
            });
        }

        let total_invested = Decimal::from(quantity) * avg_price;
        let valuation = Valuation::compute(quantity, total_invested, current_price);

        Ok(Self {
            user_id: user_id.to_string(),
            name: if name.trim().is_empty() {
                symbol.clone()
            } else {
                name.trim().to_string()
            },
            symbol,
            instrument_type,
            quantity,
            avg_price,
            current_price,
            total_invested,
            valuation,
            sector,
            purchase_date,
            payment_intent_id,
            source,
        })
    }

    /// Pin total_invested to the amount actually paid. Dividing a charge
    /// by the quantity can leave a remainder that quantity × avg_price
    /// would not reproduce.
    pub fn with_total_invested(mut self, total: Decimal) -> Self {
        self.total_invested = total;
        self.valuation = Valuation::compute(self.quantity, total, self.current_price);
        self
    }

    /// Materialise the record as the store would return it.
    pub fn into_investment(self, id: Uuid) -> Investment {
        Investment {
            id,
            user_id: self.user_id,
            symbol: self.symbol,
            name: self.name,
            instrument_type: self.instrument_type,
            quantity: self.quantity,
            avg_price: self.avg_price,
            current_price: self.current_price,
            total_invested: self.total_invested,
            current_value: self.valuation.current_value,
            gain_loss: self.valuation.gain_loss,
            gain_loss_percent: self.valuation.gain_loss_percent,
            sector: self.sector,
            purchase_date: self.purchase_date,
            last_updated: self.purchase_date,
            payment_intent_id: self.payment_intent_id,
            status: InvestmentStatus::Active,
            source: self.source,
        }
    }
}
