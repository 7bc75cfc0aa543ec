use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tesoro_shared::types::{
    AgencyId, CashBoxId, Currency, FinancialAccountId, MovementId, OperationId,
};
use tesoro_shared::{AppError, AppResult};

use super::lock;
use crate::currency::{ExchangeRate, ExchangeRateStore};
use crate::ledger::{
    CashBox, CashBoxDelta, FinancialAccount, LedgerMovement, LedgerStore, cash_box_delta,
};

#[derive(Default)]
pub struct InMemoryExchangeRates {
    rates: Mutex<BTreeMap<NaiveDate, Decimal>>,
}

impl InMemoryExchangeRates {
    pub fn insert(&self, rate: ExchangeRate) {
        lock(&self.rates).insert(rate.effective_date, rate.rate);
    }
}

#[async_trait]
impl ExchangeRateStore for InMemoryExchangeRates {
    async fn latest_on_or_before(&self, date: NaiveDate) -> AppResult<Option<ExchangeRate>> {
        Ok(lock(&self.rates)
            .range(..=date)
            .next_back()
            .map(|(d, r)| ExchangeRate::new(*d, *r)))
    }

    async fn upsert_rate(&self, rate: ExchangeRate) -> AppResult<ExchangeRate> {
        self.insert(rate.clone());
        Ok(rate)
    }
}

#[derive(Default)]
struct LedgerState {
    accounts: Vec<FinancialAccount>,
    boxes: Vec<CashBox>,
    movements: Vec<LedgerMovement>,
    record_after_next_read: Option<LedgerMovement>,
}

impl LedgerState {
    fn apply(&mut self, delta: Option<CashBoxDelta>) -> AppResult<()> {
        let Some(delta) = delta else {
            return Ok(());
        };
        let cash_box = self
            .boxes
            .iter_mut()
            .find(|b| b.id == delta.cash_box_id)
            .ok_or_else(|| AppError::NotFound(format!("cash box {}", delta.cash_box_id)))?;
        cash_box.current_balance += delta.amount;
        Ok(())
    }
}

/// Ledger store that applies cash-box deltas like the SQL one does.
#[derive(Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn add_account(
        &self,
        agency_id: AgencyId,
        currency: Currency,
        initial_balance: Decimal,
    ) -> FinancialAccountId {
        let id = FinancialAccountId::new();
        lock(&self.state).accounts.push(FinancialAccount {
            id,
            agency_id,
            name: format!("{currency} account"),
            account_type: "BANK".to_string(),
            currency,
            initial_balance,
            is_active: true,
        });
        id
    }

    pub fn add_cash_box(
        &self,
        agency_id: AgencyId,
        currency: Currency,
        initial_balance: Decimal,
    ) -> CashBoxId {
        let id = CashBoxId::new();
        lock(&self.state).boxes.push(CashBox {
            id,
            agency_id,
            name: format!("{currency} box"),
            currency,
            initial_balance,
            current_balance: initial_balance,
            is_default: false,
            is_active: true,
        });
        id
    }

    pub fn deactivate_cash_box(&self, id: CashBoxId) {
        if let Some(b) = lock(&self.state).boxes.iter_mut().find(|b| b.id == id) {
            b.is_active = false;
        }
    }

    pub fn cash_box(&self, id: CashBoxId) -> Option<CashBox> {
        lock(&self.state).boxes.iter().find(|b| b.id == id).cloned()
    }

    pub fn movements(&self) -> Vec<LedgerMovement> {
        lock(&self.state).movements.clone()
    }

    /// Records `movement`, delta included, right after the next cash-box
    /// movement read returns, as a concurrent writer would.
    pub fn record_after_next_read(&self, movement: LedgerMovement) {
        lock(&self.state).record_after_next_read = Some(movement);
    }

    /// Appends without touching any cached balance.
    pub fn push_movement_raw(&self, movement: LedgerMovement) {
        lock(&self.state).movements.push(movement);
    }
}

fn visible(m: &LedgerMovement, as_of: Option<DateTime<Utc>>) -> bool {
    as_of.is_none_or(|t| m.created_at <= t)
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn find_account(
        &self,
        agency_id: AgencyId,
        id: FinancialAccountId,
    ) -> AppResult<Option<FinancialAccount>> {
        Ok(lock(&self.state)
            .accounts
            .iter()
            .find(|a| a.id == id && a.agency_id == agency_id)
            .cloned())
    }

    async fn find_cash_box(
        &self,
        agency_id: AgencyId,
        id: CashBoxId,
    ) -> AppResult<Option<CashBox>> {
        Ok(lock(&self.state)
            .boxes
            .iter()
            .find(|b| b.id == id && b.agency_id == agency_id)
            .cloned())
    }

    async fn find_movement(
        &self,
        agency_id: AgencyId,
        id: MovementId,
    ) -> AppResult<Option<LedgerMovement>> {
        Ok(lock(&self.state)
            .movements
            .iter()
            .find(|m| m.id == id && m.agency_id == agency_id)
            .cloned())
    }

    async fn insert_movement(
        &self,
        movement: &LedgerMovement,
        delta: Option<CashBoxDelta>,
    ) -> AppResult<()> {
        let mut state = lock(&self.state);
        state.apply(delta)?;
        state.movements.push(movement.clone());
        Ok(())
    }

    async fn delete_movement(
        &self,
        agency_id: AgencyId,
        id: MovementId,
        delta: Option<CashBoxDelta>,
    ) -> AppResult<bool> {
        let mut state = lock(&self.state);
        let Some(pos) = state
            .movements
            .iter()
            .position(|m| m.id == id && m.agency_id == agency_id)
        else {
            return Ok(false);
        };
        state.apply(delta)?;
        state.movements.remove(pos);
        Ok(true)
    }

    async fn movements_for_operation(
        &self,
        agency_id: AgencyId,
        operation_id: OperationId,
    ) -> AppResult<Vec<LedgerMovement>> {
        Ok(lock(&self.state)
            .movements
            .iter()
            .filter(|m| m.agency_id == agency_id && m.operation_id == Some(operation_id))
            .cloned()
            .collect())
    }

    async fn movements_for_account(
        &self,
        agency_id: AgencyId,
        account_id: FinancialAccountId,
        as_of: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<LedgerMovement>> {
        Ok(lock(&self.state)
            .movements
            .iter()
            .filter(|m| m.agency_id == agency_id && m.account_id == account_id && visible(m, as_of))
            .cloned()
            .collect())
    }

    async fn movements_for_cash_box(
        &self,
        agency_id: AgencyId,
        cash_box_id: CashBoxId,
        as_of: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<LedgerMovement>> {
        let mut state = lock(&self.state);
        let found: Vec<LedgerMovement> = state
            .movements
            .iter()
            .filter(|m| {
                m.agency_id == agency_id && m.cash_box_id == Some(cash_box_id) && visible(m, as_of)
            })
            .cloned()
            .collect();
        if let Some(movement) = state.record_after_next_read.take() {
            state.apply(cash_box_delta(&movement))?;
            state.movements.push(movement);
        }
        Ok(found)
    }

    async fn replace_cash_box_balance(
        &self,
        agency_id: AgencyId,
        cash_box_id: CashBoxId,
        expected: Decimal,
        balance: Decimal,
    ) -> AppResult<bool> {
        let mut state = lock(&self.state);
        let Some(cash_box) = state
            .boxes
            .iter_mut()
            .find(|b| b.id == cash_box_id && b.agency_id == agency_id)
        else {
            return Ok(false);
        };
        if cash_box.current_balance != expected {
            return Ok(false);
        }
        cash_box.current_balance = balance;
        Ok(true)
    }

    async fn list_active_cash_boxes(&self) -> AppResult<Vec<CashBox>> {
        Ok(lock(&self.state)
            .boxes
            .iter()
            .filter(|b| b.is_active)
            .cloned()
            .collect())
    }
}
