//! Ledger movement recorder: the single writer of movements.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tesoro_shared::types::{AgencyId, Currency, MovementId, OperationId};
use tracing::{info, instrument, warn};

use super::balance::cash_box_delta;
use super::error::LedgerError;
use super::store::LedgerStore;
use super::types::{CashBox, FinancialAccount, LedgerMovement, RecordMovementInput};
use crate::currency::{CurrencyError, ExchangeRateResolver, convert_to_base};
use crate::signal::DashboardSignal;

/// Base-currency normalization of an amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedAmount {
    /// Rate applied, `None` for base-currency amounts.
    pub exchange_rate: Option<Decimal>,
    /// Amount in the base currency.
    pub amount_ars_equivalent: Decimal,
}

/// Normalizes `amount` to the base currency.
///
/// `rate` is only consulted for non-base currencies, where it must be positive.
///
/// # Errors
///
/// Returns `LedgerError::InvalidAmount` for non-positive amounts.
pub fn normalize_amount(
    amount: Decimal,
    currency: Currency,
    rate: Option<Decimal>,
) -> Result<NormalizedAmount, LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount);
    }
    if currency.is_base() {
        return Ok(NormalizedAmount {
            exchange_rate: None,
            amount_ars_equivalent: amount,
        });
    }
    let rate = rate
        .filter(|r| *r > Decimal::ZERO)
        .ok_or(LedgerError::ExchangeRate(CurrencyError::NonPositiveRate))?;
    Ok(NormalizedAmount {
        exchange_rate: Some(rate),
        amount_ars_equivalent: convert_to_base(amount, rate),
    })
}

/// Checks that a movement in `currency` may be booked on `account`.
///
/// Base-currency accounts accept any currency through the ARS equivalent;
/// foreign accounts only accept their own currency.
///
/// # Errors
///
/// Returns `LedgerError::AccountInactive` or `LedgerError::CurrencyMismatch`.
pub fn check_account(account: &FinancialAccount, currency: Currency) -> Result<(), LedgerError> {
    if !account.is_active {
        return Err(LedgerError::AccountInactive(account.id));
    }
    if !account.currency.is_base() && account.currency != currency {
        return Err(LedgerError::CurrencyMismatch {
            expected: account.currency,
            actual: currency,
        });
    }
    Ok(())
}

/// Checks that a movement in `currency` may be routed to `cash_box`.
///
/// # Errors
///
/// Returns `LedgerError::CashBoxInactive` or `LedgerError::CurrencyMismatch`.
pub fn check_cash_box(cash_box: &CashBox, currency: Currency) -> Result<(), LedgerError> {
    if !cash_box.is_active {
        return Err(LedgerError::CashBoxInactive(cash_box.id));
    }
    if cash_box.currency != currency {
        return Err(LedgerError::CurrencyMismatch {
            expected: cash_box.currency,
            actual: currency,
        });
    }
    Ok(())
}

/// Records and deletes ledger movements, keeping cash-box caches in lockstep.
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    resolver: Arc<ExchangeRateResolver>,
    signal: Arc<dyn DashboardSignal>,
    allow_degraded_rates: bool,
}

impl LedgerService {
    /// Creates a new recorder.
    #[must_use]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        resolver: Arc<ExchangeRateResolver>,
        signal: Arc<dyn DashboardSignal>,
        allow_degraded_rates: bool,
    ) -> Self {
        Self {
            store,
            resolver,
            signal,
            allow_degraded_rates,
        }
    }

    /// Records a movement.
    ///
    /// Validation runs before any write. Non-base currencies resolve their
    /// rate for `movement_date`; the degraded fallback is refused unless
    /// explicitly allowed.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` on invalid input, unknown or inactive targets,
    /// currency mismatches, unavailable rates or storage failures.
    #[instrument(skip(self, input), fields(agency_id = %input.agency_id, movement_type = input.movement_type.as_str()))]
    pub async fn record(&self, input: RecordMovementInput) -> Result<LedgerMovement, LedgerError> {
        if input.amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }

        let account = self
            .store
            .find_account(input.agency_id, input.account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(input.account_id))?;
        check_account(&account, input.currency)?;

        if let Some(cash_box_id) = input.cash_box_id {
            let cash_box = self
                .store
                .find_cash_box(input.agency_id, cash_box_id)
                .await?
                .ok_or(LedgerError::CashBoxNotFound(cash_box_id))?;
            check_cash_box(&cash_box, input.currency)?;
        }

        let rate = if input.currency.is_base() {
            None
        } else if self.allow_degraded_rates {
            Some(self.resolver.resolve(input.movement_date).await?.rate)
        } else {
            Some(self.resolver.resolve_strict(input.movement_date).await?.rate)
        };
        let normalized = normalize_amount(input.amount, input.currency, rate)?;

        let movement = LedgerMovement {
            id: MovementId::new(),
            agency_id: input.agency_id,
            operation_id: input.operation_id,
            lead_id: input.lead_id,
            movement_type: input.movement_type,
            concept: input.concept,
            currency: input.currency,
            amount_original: input.amount,
            exchange_rate: normalized.exchange_rate,
            amount_ars_equivalent: normalized.amount_ars_equivalent,
            method: input.method,
            account_id: input.account_id,
            cash_box_id: input.cash_box_id,
            operator_id: input.operator_id,
            seller_id: input.seller_id,
            movement_date: input.movement_date,
            created_by: input.created_by,
            created_at: Utc::now(),
        };

        self.store
            .insert_movement(&movement, cash_box_delta(&movement))
            .await?;

        info!(
            movement_id = %movement.id,
            amount = %movement.amount_original,
            currency = %movement.currency,
            amount_ars = %movement.amount_ars_equivalent,
            "ledger movement recorded"
        );
        self.signal.kpis_changed(movement.agency_id);
        Ok(movement)
    }

    /// Deletes a movement, reversing its cash-box delta.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::MovementNotFound` or a storage failure.
    #[instrument(skip(self))]
    pub async fn delete_movement(
        &self,
        agency_id: AgencyId,
        id: MovementId,
    ) -> Result<(), LedgerError> {
        let movement = self
            .store
            .find_movement(agency_id, id)
            .await?
            .ok_or(LedgerError::MovementNotFound(id))?;
        let reverse = cash_box_delta(&movement).map(super::types::CashBoxDelta::reversed);
        if !self.store.delete_movement(agency_id, id, reverse).await? {
            return Err(LedgerError::MovementNotFound(id));
        }
        info!(movement_id = %id, "ledger movement deleted");
        self.signal.kpis_changed(agency_id);
        Ok(())
    }

    /// Deletes every movement of an operation, reversing their deltas.
    ///
    /// Returns the number of deleted movements.
    ///
    /// # Errors
    ///
    /// Returns a storage failure; movements deleted before it stay deleted.
    #[instrument(skip(self))]
    pub async fn delete_operation_movements(
        &self,
        agency_id: AgencyId,
        operation_id: OperationId,
    ) -> Result<usize, LedgerError> {
        let movements = self
            .store
            .movements_for_operation(agency_id, operation_id)
            .await?;
        let mut deleted = 0;
        for movement in &movements {
            let reverse = cash_box_delta(movement).map(super::types::CashBoxDelta::reversed);
            if self
                .store
                .delete_movement(agency_id, movement.id, reverse)
                .await?
            {
                deleted += 1;
            } else {
                warn!(movement_id = %movement.id, "movement vanished during operation reversal");
            }
        }
        if deleted > 0 {
            self.signal.kpis_changed(agency_id);
        }
        Ok(deleted)
    }
}
