//! Balance projection over recorded movements.
//!
//! Balances are folds: `initial_balance + Σ signed movements`. The only stored
//! balance is the cash-box cache, which the recorder updates by delta and the
//! reconciliation job rewrites from the fold.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tesoro_shared::types::{AgencyId, CashBoxId, Currency, FinancialAccountId};
use tracing::{debug, error, info, instrument, warn};

use super::error::LedgerError;
use super::store::LedgerStore;
use super::types::{CashBox, CashBoxDelta, LedgerMovement};

/// Fold-and-rewrite rounds tried before a busy box is left for the next run.
const MAX_RECONCILE_ATTEMPTS: u32 = 3;

/// Amount a movement contributes to a target held in `currency`.
///
/// Same-currency movements count at their original amount. Foreign movements
/// on a base-currency target count at their ARS equivalent.
#[must_use]
pub fn signed_amount_in(movement: &LedgerMovement, currency: Currency) -> Decimal {
    if movement.currency == currency {
        movement.signed_original()
    } else if currency.is_base() {
        movement.signed_ars_equivalent()
    } else {
        // Rejected on write; only reachable with legacy data.
        Decimal::ZERO
    }
}

/// Folds movements into a balance. Order does not matter.
#[must_use]
pub fn project<'a, I>(
    initial_balance: Decimal,
    currency: Currency,
    movements: I,
    as_of: Option<DateTime<Utc>>,
) -> Decimal
where
    I: IntoIterator<Item = &'a LedgerMovement>,
{
    movements
        .into_iter()
        .filter(|m| as_of.is_none_or(|cutoff| m.created_at <= cutoff))
        .fold(initial_balance, |acc, m| acc + signed_amount_in(m, currency))
}

/// Cash-box delta for a movement, if it is routed to a box.
#[must_use]
pub fn cash_box_delta(movement: &LedgerMovement) -> Option<CashBoxDelta> {
    movement.cash_box_id.map(|cash_box_id| CashBoxDelta {
        cash_box_id,
        amount: movement.signed_original(),
    })
}

/// What a balance is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum BalanceTarget {
    /// A financial account.
    Account(FinancialAccountId),
    /// A cash box.
    CashBox(CashBoxId),
}

/// A projected balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Target the balance belongs to.
    pub target: BalanceTarget,
    /// Currency of the amount.
    pub currency: Currency,
    /// Balance amount.
    pub amount: Decimal,
    /// Cutoff applied, if any.
    pub as_of: Option<DateTime<Utc>>,
}

/// Outcome of reconciling one cash box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Agency of the box.
    pub agency_id: AgencyId,
    /// Reconciled box.
    pub cash_box_id: CashBoxId,
    /// Cached balance before reconciliation.
    pub cached: Decimal,
    /// Balance projected from movements.
    pub projected: Decimal,
    /// `projected - cached`.
    pub drift: Decimal,
    /// Whether the cache was rewritten.
    pub corrected: bool,
}

/// Read-side balance projections and cash-box reconciliation.
pub struct BalanceProjector {
    store: Arc<dyn LedgerStore>,
}

impl BalanceProjector {
    /// Creates a new projector.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Projects the balance of an account or box, optionally bounded by `as_of`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::AccountNotFound`/`CashBoxNotFound` or a storage failure.
    pub async fn project_balance(
        &self,
        agency_id: AgencyId,
        target: BalanceTarget,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Balance, LedgerError> {
        let (currency, amount) = match target {
            BalanceTarget::Account(account_id) => {
                let account = self
                    .store
                    .find_account(agency_id, account_id)
                    .await?
                    .ok_or(LedgerError::AccountNotFound(account_id))?;
                let movements = self
                    .store
                    .movements_for_account(agency_id, account_id, as_of)
                    .await?;
                (
                    account.currency,
                    project(account.initial_balance, account.currency, &movements, as_of),
                )
            }
            BalanceTarget::CashBox(cash_box_id) => {
                let cash_box = self.load_cash_box(agency_id, cash_box_id).await?;
                let amount = self.fold_cash_box(&cash_box, as_of).await?;
                (cash_box.currency, amount)
            }
        };
        Ok(Balance {
            target,
            currency,
            amount,
            as_of,
        })
    }

    /// Cached balance of a cash box.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::CashBoxNotFound` or a storage failure.
    pub async fn cash_box_balance_fast(
        &self,
        agency_id: AgencyId,
        cash_box_id: CashBoxId,
    ) -> Result<Decimal, LedgerError> {
        Ok(self
            .load_cash_box(agency_id, cash_box_id)
            .await?
            .current_balance)
    }

    /// Balance of a cash box recomputed from its movements.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::CashBoxNotFound` or a storage failure.
    pub async fn cash_box_balance_projected(
        &self,
        agency_id: AgencyId,
        cash_box_id: CashBoxId,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Decimal, LedgerError> {
        let cash_box = self.load_cash_box(agency_id, cash_box_id).await?;
        self.fold_cash_box(&cash_box, as_of).await
    }

    /// Rewrites a box's cached balance from the fold when they differ.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::CashBoxNotFound` or a storage failure.
    #[instrument(skip(self))]
    pub async fn reconcile_cash_box(
        &self,
        agency_id: AgencyId,
        cash_box_id: CashBoxId,
    ) -> Result<ReconciliationReport, LedgerError> {
        let cash_box = self.load_cash_box(agency_id, cash_box_id).await?;
        self.reconcile(&cash_box).await
    }

    /// Reconciles every active cash box. Failures are logged and skipped.
    pub async fn reconcile_all_cash_boxes(&self) -> Result<Vec<ReconciliationReport>, LedgerError> {
        let boxes = self.store.list_active_cash_boxes().await?;
        let mut reports = Vec::with_capacity(boxes.len());
        for cash_box in &boxes {
            match self.reconcile(cash_box).await {
                Ok(report) => reports.push(report),
                Err(e) => error!(
                    agency_id = %cash_box.agency_id,
                    cash_box_id = %cash_box.id,
                    error = %e,
                    "cash box reconciliation failed"
                ),
            }
        }
        let corrected = reports.iter().filter(|r| r.corrected).count();
        info!(boxes = reports.len(), corrected, "cash box reconciliation finished");
        Ok(reports)
    }

    /// The rewrite only lands if the cache still holds the value the fold was
    /// compared against; a delta applied in between forces a fresh fold.
    async fn reconcile(&self, cash_box: &CashBox) -> Result<ReconciliationReport, LedgerError> {
        let mut cash_box = cash_box.clone();
        let mut attempt = 1;
        loop {
            let cached = cash_box.current_balance;
            let projected = self.fold_cash_box(&cash_box, None).await?;
            let drift = projected - cached;
            let mut report = ReconciliationReport {
                agency_id: cash_box.agency_id,
                cash_box_id: cash_box.id,
                cached,
                projected,
                drift,
                corrected: false,
            };
            if drift.is_zero() {
                return Ok(report);
            }
            warn!(
                agency_id = %cash_box.agency_id,
                cash_box_id = %cash_box.id,
                %cached,
                %projected,
                %drift,
                "cash box cache drifted, rewriting"
            );
            if self
                .store
                .replace_cash_box_balance(cash_box.agency_id, cash_box.id, cached, projected)
                .await?
            {
                report.corrected = true;
                return Ok(report);
            }
            if attempt == MAX_RECONCILE_ATTEMPTS {
                warn!(
                    cash_box_id = %cash_box.id,
                    attempt,
                    "cash box kept changing during reconciliation, leaving it for the next run"
                );
                return Ok(report);
            }
            debug!(cash_box_id = %cash_box.id, attempt, "cash box moved during reconciliation");
            attempt += 1;
            cash_box = self.load_cash_box(cash_box.agency_id, cash_box.id).await?;
        }
    }

    async fn load_cash_box(
        &self,
        agency_id: AgencyId,
        cash_box_id: CashBoxId,
    ) -> Result<CashBox, LedgerError> {
        self.store
            .find_cash_box(agency_id, cash_box_id)
            .await?
            .ok_or(LedgerError::CashBoxNotFound(cash_box_id))
    }

    async fn fold_cash_box(
        &self,
        cash_box: &CashBox,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Decimal, LedgerError> {
        let movements = self
            .store
            .movements_for_cash_box(cash_box.agency_id, cash_box.id, as_of)
            .await?;
        Ok(project(
            cash_box.initial_balance,
            cash_box.currency,
            &movements,
            as_of,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::types::{MovementType, PaymentMethod};
    use crate::testing::{InMemoryLedger, movement};
    use chrono::Duration;
    use rust_decimal_macros::dec;

    #[test]
    fn test_base_account_uses_ars_equivalent() {
        let agency = AgencyId::new();
        let mut usd = movement(agency, MovementType::Income, Currency::Usd, dec!(10));
        usd.exchange_rate = Some(dec!(1000));
        usd.amount_ars_equivalent = dec!(10000);
        let ars = movement(agency, MovementType::Expense, Currency::Ars, dec!(2500));
        assert_eq!(
            project(dec!(100), Currency::Ars, [&usd, &ars], None),
            dec!(7600)
        );
        assert_eq!(project(dec!(0), Currency::Usd, [&usd], None), dec!(10));
    }

    #[test]
    fn test_as_of_excludes_later_movements() {
        let agency = AgencyId::new();
        let early = movement(agency, MovementType::Income, Currency::Ars, dec!(100));
        let mut late = movement(agency, MovementType::Income, Currency::Ars, dec!(50));
        late.created_at = early.created_at + Duration::days(2);
        let cutoff = early.created_at + Duration::days(1);
        assert_eq!(
            project(dec!(0), Currency::Ars, [&early, &late], Some(cutoff)),
            dec!(100)
        );
    }

    #[test]
    fn test_cash_box_delta_sign() {
        let agency = AgencyId::new();
        let mut m = movement(agency, MovementType::OperatorPayment, Currency::Usd, dec!(40));
        assert!(cash_box_delta(&m).is_none());
        let box_id = CashBoxId::new();
        m.cash_box_id = Some(box_id);
        m.method = PaymentMethod::Bank;
        let delta = cash_box_delta(&m).unwrap();
        assert_eq!(delta.amount, dec!(-40));
        assert_eq!(delta.reversed().amount, dec!(40));
    }

    #[tokio::test]
    async fn test_reconcile_rewrites_drifted_cache() {
        let agency = AgencyId::new();
        let ledger = Arc::new(InMemoryLedger::default());
        let box_id = ledger.add_cash_box(agency, Currency::Ars, dec!(1000));
        let mut m = movement(agency, MovementType::Income, Currency::Ars, dec!(250));
        m.cash_box_id = Some(box_id);
        ledger.push_movement_raw(m);

        let projector = BalanceProjector::new(ledger.clone());
        assert_eq!(
            projector.cash_box_balance_fast(agency, box_id).await.unwrap(),
            dec!(1000)
        );
        assert_eq!(
            projector
                .cash_box_balance_projected(agency, box_id, None)
                .await
                .unwrap(),
            dec!(1250)
        );

        let report = projector.reconcile_cash_box(agency, box_id).await.unwrap();
        assert!(report.corrected);
        assert_eq!(report.drift, dec!(250));
        assert_eq!(
            projector.cash_box_balance_fast(agency, box_id).await.unwrap(),
            dec!(1250)
        );

        let again = projector.reconcile_all_cash_boxes().await.unwrap();
        assert_eq!(again.len(), 1);
        assert!(!again[0].corrected);
    }

    #[tokio::test]
    async fn test_reconcile_keeps_delta_recorded_mid_fold() {
        let agency = AgencyId::new();
        let ledger = Arc::new(InMemoryLedger::default());
        let box_id = ledger.add_cash_box(agency, Currency::Ars, dec!(1000));
        let mut drifted = movement(agency, MovementType::Income, Currency::Ars, dec!(250));
        drifted.cash_box_id = Some(box_id);
        ledger.push_movement_raw(drifted);
        let mut concurrent = movement(agency, MovementType::Income, Currency::Ars, dec!(40));
        concurrent.cash_box_id = Some(box_id);
        ledger.record_after_next_read(concurrent);

        let projector = BalanceProjector::new(ledger.clone());
        let report = projector.reconcile_cash_box(agency, box_id).await.unwrap();

        assert!(report.corrected);
        assert_eq!(report.cached, dec!(1040));
        assert_eq!(report.projected, dec!(1290));
        let cached = projector.cash_box_balance_fast(agency, box_id).await.unwrap();
        let fold = projector
            .cash_box_balance_projected(agency, box_id, None)
            .await
            .unwrap();
        assert_eq!(cached, dec!(1290));
        assert_eq!(cached, fold);
    }

    #[tokio::test]
    async fn test_project_unknown_target_is_not_found() {
        let projector = BalanceProjector::new(Arc::new(InMemoryLedger::default()));
        let err = projector
            .project_balance(
                AgencyId::new(),
                BalanceTarget::Account(FinancialAccountId::new()),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound(_)));
    }
}
