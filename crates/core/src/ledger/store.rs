//! Persistence port for the ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tesoro_shared::AppResult;
use tesoro_shared::types::{AgencyId, CashBoxId, FinancialAccountId, MovementId, OperationId};

use super::types::{CashBox, CashBoxDelta, FinancialAccount, LedgerMovement};

/// Storage of movements, accounts and cash boxes.
///
/// Every query is scoped to an agency except [`LedgerStore::list_active_cash_boxes`],
/// which feeds the cross-tenant reconciliation job.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Finds a financial account.
    async fn find_account(
        &self,
        agency_id: AgencyId,
        id: FinancialAccountId,
    ) -> AppResult<Option<FinancialAccount>>;

    /// Finds a cash box.
    async fn find_cash_box(&self, agency_id: AgencyId, id: CashBoxId)
    -> AppResult<Option<CashBox>>;

    /// Finds a movement.
    async fn find_movement(
        &self,
        agency_id: AgencyId,
        id: MovementId,
    ) -> AppResult<Option<LedgerMovement>>;

    /// Appends a movement and applies `delta` to the box's cached balance in
    /// the same transaction.
    async fn insert_movement(
        &self,
        movement: &LedgerMovement,
        delta: Option<CashBoxDelta>,
    ) -> AppResult<()>;

    /// Deletes a movement and applies `delta` in the same transaction.
    /// Returns false when the movement no longer exists.
    async fn delete_movement(
        &self,
        agency_id: AgencyId,
        id: MovementId,
        delta: Option<CashBoxDelta>,
    ) -> AppResult<bool>;

    /// Movements linked to an operation.
    async fn movements_for_operation(
        &self,
        agency_id: AgencyId,
        operation_id: OperationId,
    ) -> AppResult<Vec<LedgerMovement>>;

    /// Movements of an account created at or before `as_of`.
    async fn movements_for_account(
        &self,
        agency_id: AgencyId,
        account_id: FinancialAccountId,
        as_of: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<LedgerMovement>>;

    /// Movements routed to a cash box created at or before `as_of`.
    async fn movements_for_cash_box(
        &self,
        agency_id: AgencyId,
        cash_box_id: CashBoxId,
        as_of: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<LedgerMovement>>;

    /// Replaces the cached balance of a box if it still equals `expected`.
    /// Returns false when the box is gone or its balance changed meanwhile.
    async fn replace_cash_box_balance(
        &self,
        agency_id: AgencyId,
        cash_box_id: CashBoxId,
        expected: Decimal,
        balance: Decimal,
    ) -> AppResult<bool>;

    /// Every active cash box of every agency.
    async fn list_active_cash_boxes(&self) -> AppResult<Vec<CashBox>>;
}
