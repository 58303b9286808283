use std::collections::HashMap;

use chrono::Utc;
use metrics::counter;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::db::InvestmentStore;
use crate::models::{InstrumentType, NewInvestment, Provenance};

use super::{Account, Aggregator, AggregatorError, HoldingsSnapshot};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Aggregator(#[from] AggregatorError),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// A holding joined with its account and security metadata.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JoinedHolding {
    pub account_id: String,
    pub account_name: String,
    pub symbol: String,
    pub name: String,
    pub instrument_type: InstrumentType,
    pub sector: Option<String>,
    /// Whole units; fractional quantities are truncated.
    pub quantity: i64,
    pub price: Decimal,
    pub value: Decimal,
    pub cost_basis: Option<Decimal>,
}

impl JoinedHolding {
    /// Average cost per unit, falling back to the current price.
    pub fn avg_price(&self) -> Decimal {
        match self.cost_basis {
            Some(basis) if basis > Decimal::ZERO => basis / Decimal::from(self.quantity),
            _ => self.price,
        }
    }
}

/// Result of joining holdings in memory.
#[derive(Debug, Default)]
pub struct JoinOutcome {
    pub joined: Vec<JoinedHolding>,
    pub unsupported: usize,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SyncReport {
    pub inserted: usize,
    pub skipped_existing: usize,
    pub skipped_unsupported: usize,
}

/// Join holdings to accounts (by account id) and securities (by security id).
///
/// Holdings are dropped when the security is missing, has no ticker, has a
/// type we do not record, a non-positive price, or fewer than one whole unit.
pub fn join_holdings(accounts: &[Account], snapshot: &HoldingsSnapshot) -> JoinOutcome {
    let accounts_by_id: HashMap<&str, &Account> =
        accounts.iter().map(|a| (a.account_id.as_str(), a)).collect();
    let securities_by_id: HashMap<&str, _> = snapshot
        .securities
        .iter()
        .map(|s| (s.security_id.as_str(), s))
        .collect();

    let mut outcome = JoinOutcome::default();

    for holding in &snapshot.holdings {
        let Some(security) = securities_by_id.get(holding.security_id.as_str()) else {
            tracing::debug!(security_id = %holding.security_id, "Holding references unknown security");
            outcome.unsupported += 1;
            continue;
        };

        let symbol = match security.ticker_symbol.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s.to_uppercase(),
            _ => {
                outcome.unsupported += 1;
                continue;
            }
        };

        let Some(instrument_type) = security
            .security_type
            .as_deref()
            .and_then(InstrumentType::from_aggregator)
        else {
            tracing::debug!(symbol = %symbol, security_type = ?security.security_type, "Unsupported security type");
            outcome.unsupported += 1;
            continue;
        };

        let quantity = holding.quantity.trunc().to_i64().unwrap_or(0);
        if quantity < 1 || holding.institution_price <= Decimal::ZERO {
            outcome.unsupported += 1;
            continue;
        }

        let account_name = accounts_by_id
            .get(holding.account_id.as_str())
            .map(|a| a.name.clone())
            .unwrap_or_default();

        outcome.joined.push(JoinedHolding {
            account_id: holding.account_id.clone(),
            account_name,
            name: security.name.clone().unwrap_or_else(|| symbol.clone()),
            symbol,
            instrument_type,
            sector: security.sector.clone(),
            quantity,
            price: holding.institution_price,
            value: holding
                .institution_value
                .unwrap_or(holding.institution_price * holding.quantity),
            cost_basis: holding.cost_basis,
        });
    }

    outcome
}

/// Fetch accounts and holdings concurrently and join them.
pub async fn fetch_joined_holdings(
    aggregator: &dyn Aggregator,
    access_token: &str,
) -> Result<JoinOutcome, AggregatorError> {
    let (accounts, snapshot) = tokio::try_join!(
        aggregator.accounts(access_token),
        aggregator.investment_holdings(access_token)
    )?;

    Ok(join_holdings(&accounts, &snapshot))
}

/// Insert an aggregator-sourced investment for every joined holding whose
/// `(user, symbol)` is not yet recorded.
///
/// Existing records are never refreshed. The existence check and the insert
/// are not atomic, so concurrent syncs for one user can both insert.
pub async fn sync_holdings(
    store: &dyn InvestmentStore,
    aggregator: &dyn Aggregator,
    user_id: &str,
    access_token: &str,
) -> Result<SyncReport, SyncError> {
    let outcome = fetch_joined_holdings(aggregator, access_token).await?;

    let mut report = SyncReport {
        skipped_unsupported: outcome.unsupported,
        ..SyncReport::default()
    };

    for holding in outcome.joined {
        if store.find_investment(user_id, &holding.symbol).await?.is_some() {
            report.skipped_existing += 1;
            continue;
        }

        let new = match NewInvestment::new(
            user_id,
            &holding.symbol,
            &holding.name,
            holding.instrument_type,
            holding.quantity,
            holding.avg_price(),
            holding.price,
            holding.sector.clone(),
            None,
            Provenance::Aggregator,
            Utc::now(),
        ) {
            Ok(new) => new,
            Err(e) => {
                tracing::warn!(symbol = %holding.symbol, error = %e, "Skipping invalid holding");
                report.skipped_unsupported += 1;
                continue;
            }
        };

        let investment = store.insert_investment(&new).await?;
        tracing::info!(
            user_id,
            symbol = %investment.symbol,
            quantity = investment.quantity,
            account = %holding.account_name,
            "Synced holding into investments"
        );
        report.inserted += 1;
    }

    counter!("aggregator_sync_inserted").increment(report.inserted as u64);
    counter!("aggregator_sync_skipped")
        .increment((report.skipped_existing + report.skipped_unsupported) as u64);

    tracing::info!(
        user_id,
        inserted = report.inserted,
        skipped_existing = report.skipped_existing,
        skipped_unsupported = report.skipped_unsupported,
        "Aggregator sync complete"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{Balances, Holding, Security};

    fn account(id: &str, name: &str) -> Account {
        Account {
            account_id: id.into(),
            name: name.into(),
            official_name: None,
            mask: None,
            account_type: "investment".into(),
            subtype: Some("brokerage".into()),
            balances: Balances::default(),
        }
    }

    fn security(id: &str, ticker: Option<&str>, kind: &str) -> Security {
        Security {
            security_id: id.into(),
            ticker_symbol: ticker.map(Into::into),
            name: ticker.map(|t| format!("{t} Corp")),
            security_type: Some(kind.into()),
            close_price: None,
            sector: None,
        }
    }

    fn holding(account: &str, security: &str, qty: Decimal, price: i64) -> Holding {
        Holding {
            account_id: account.into(),
            security_id: security.into(),
            quantity: qty,
            institution_price: Decimal::from(price),
            institution_value: None,
            cost_basis: None,
            iso_currency_code: Some("USD".into()),
        }
    }

    #[test]
    fn test_join_by_account_and_security() {
        let accounts = vec![account("acc_1", "Brokerage")];
        let snapshot = HoldingsSnapshot {
            holdings: vec![holding("acc_1", "sec_1", Decimal::from(3), 100)],
            securities: vec![security("sec_1", Some("aapl"), "equity")],
        };

        let outcome = join_holdings(&accounts, &snapshot);
        assert_eq!(outcome.unsupported, 0);
        assert_eq!(outcome.joined.len(), 1);

        let joined = &outcome.joined[0];
        assert_eq!(joined.symbol, "AAPL");
        assert_eq!(joined.account_name, "Brokerage");
        assert_eq!(joined.instrument_type, InstrumentType::Stock);
        assert_eq!(joined.value, Decimal::from(300));
    }

    #[test]
    fn test_join_skips_unusable_holdings() {
        let snapshot = HoldingsSnapshot {
            holdings: vec![
                holding("acc_1", "sec_cash", Decimal::from(100), 1),
                holding("acc_1", "sec_noticker", Decimal::from(1), 10),
                holding("acc_1", "sec_missing", Decimal::from(1), 10),
                holding("acc_1", "sec_frac", Decimal::new(5, 1), 10),
            ],
            securities: vec![
                security("sec_cash", Some("CUR:USD"), "cash"),
                security("sec_noticker", None, "equity"),
                security("sec_frac", Some("VTI"), "etf"),
            ],
        };

        let outcome = join_holdings(&[], &snapshot);
        assert!(outcome.joined.is_empty());
        assert_eq!(outcome.unsupported, 4);
    }

    #[test]
    fn test_fractional_quantity_truncated_and_cost_basis_used() {
        let mut h = holding("acc_1", "sec_1", Decimal::new(105, 1), 20); // 10.5
        h.cost_basis = Some(Decimal::from(150));
        let snapshot = HoldingsSnapshot {
            holdings: vec![h],
            securities: vec![security("sec_1", Some("VTI"), "etf")],
        };

        let outcome = join_holdings(&[], &snapshot);
        let joined = &outcome.joined[0];
        assert_eq!(joined.quantity, 10);
        assert_eq!(joined.avg_price(), Decimal::from(15));
    }
}
