//! Ledger repository: movements, financial accounts and cash boxes.
//!
//! Movement writes and the matching cash-box delta share one transaction.
//! The delta is applied as `current_balance = current_balance + delta` so
//! concurrent writers never lose an update.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tesoro_core::ledger::{CashBox, CashBoxDelta, FinancialAccount, LedgerMovement, LedgerStore};
use tesoro_shared::types::{
    AgencyId, CashBoxId, Currency, FinancialAccountId, LeadId, MovementId, OperationId,
    OperatorId, SellerId, UserId,
};
use tesoro_shared::{AppError, AppResult};
use tracing::debug;

use crate::entities::{cash_boxes, financial_accounts, ledger_movements};
use crate::error::{RowError, db_err, parse_column};

/// Input for creating a financial account.
#[derive(Debug, Clone)]
pub struct CreateAccountInput {
    /// Owning agency.
    pub agency_id: AgencyId,
    /// Display name.
    pub name: String,
    /// Free-form account type.
    pub account_type: String,
    /// Account currency.
    pub currency: Currency,
    /// Opening balance.
    pub initial_balance: Decimal,
}

/// Input for creating a cash box.
#[derive(Debug, Clone)]
pub struct CreateCashBoxInput {
    /// Owning agency.
    pub agency_id: AgencyId,
    /// Display name.
    pub name: String,
    /// Box currency.
    pub currency: Currency,
    /// Opening balance; also the starting cached balance.
    pub initial_balance: Decimal,
    /// Default box for its currency.
    pub is_default: bool,
}

/// Ledger repository.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    db: DatabaseConnection,
}

impl LedgerRepository {
    /// Creates a new ledger repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a financial account.
    pub async fn create_account(&self, input: CreateAccountInput) -> AppResult<FinancialAccount> {
        let now = Utc::now().into();
        let model = financial_accounts::ActiveModel {
            id: Set(FinancialAccountId::new().into_inner()),
            agency_id: Set(input.agency_id.into_inner()),
            name: Set(input.name),
            account_type: Set(input.account_type),
            currency: Set(input.currency.as_str().to_string()),
            initial_balance: Set(input.initial_balance),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let inserted = model.insert(&self.db).await.map_err(db_err)?;
        Ok(account_to_domain(inserted)?)
    }

    /// Creates a cash box whose cached balance starts at its opening balance.
    pub async fn create_cash_box(&self, input: CreateCashBoxInput) -> AppResult<CashBox> {
        let now = Utc::now().into();
        let model = cash_boxes::ActiveModel {
            id: Set(CashBoxId::new().into_inner()),
            agency_id: Set(input.agency_id.into_inner()),
            name: Set(input.name),
            currency: Set(input.currency.as_str().to_string()),
            initial_balance: Set(input.initial_balance),
            current_balance: Set(input.initial_balance),
            is_default: Set(input.is_default),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let inserted = model.insert(&self.db).await.map_err(db_err)?;
        Ok(cash_box_to_domain(inserted)?)
    }
}

const MOVEMENTS: &str = "ledger_movements";

fn movement_to_domain(model: ledger_movements::Model) -> Result<LedgerMovement, RowError> {
    Ok(LedgerMovement {
        id: MovementId::from_uuid(model.id),
        agency_id: AgencyId::from_uuid(model.agency_id),
        operation_id: model.operation_id.map(OperationId::from_uuid),
        lead_id: model.lead_id.map(LeadId::from_uuid),
        movement_type: parse_column(MOVEMENTS, "movement_type", &model.movement_type)?,
        concept: model.concept,
        currency: parse_column(MOVEMENTS, "currency", &model.currency)?,
        amount_original: model.amount_original,
        exchange_rate: model.exchange_rate,
        amount_ars_equivalent: model.amount_ars_equivalent,
        method: parse_column(MOVEMENTS, "method", &model.method)?,
        account_id: FinancialAccountId::from_uuid(model.account_id),
        cash_box_id: model.cash_box_id.map(CashBoxId::from_uuid),
        operator_id: model.operator_id.map(OperatorId::from_uuid),
        seller_id: model.seller_id.map(SellerId::from_uuid),
        movement_date: model.movement_date,
        created_by: UserId::from_uuid(model.created_by),
        created_at: model.created_at.with_timezone(&Utc),
    })
}

fn movement_to_active(movement: &LedgerMovement) -> ledger_movements::ActiveModel {
    ledger_movements::ActiveModel {
        id: Set(movement.id.into_inner()),
        agency_id: Set(movement.agency_id.into_inner()),
        operation_id: Set(movement.operation_id.map(OperationId::into_inner)),
        lead_id: Set(movement.lead_id.map(LeadId::into_inner)),
        movement_type: Set(movement.movement_type.as_str().to_string()),
        concept: Set(movement.concept.clone()),
        currency: Set(movement.currency.as_str().to_string()),
        amount_original: Set(movement.amount_original),
        exchange_rate: Set(movement.exchange_rate),
        amount_ars_equivalent: Set(movement.amount_ars_equivalent),
        method: Set(movement.method.as_str().to_string()),
        account_id: Set(movement.account_id.into_inner()),
        cash_box_id: Set(movement.cash_box_id.map(CashBoxId::into_inner)),
        operator_id: Set(movement.operator_id.map(OperatorId::into_inner)),
        seller_id: Set(movement.seller_id.map(SellerId::into_inner)),
        movement_date: Set(movement.movement_date),
        created_by: Set(movement.created_by.into_inner()),
        created_at: Set(movement.created_at.into()),
    }
}

fn account_to_domain(model: financial_accounts::Model) -> Result<FinancialAccount, RowError> {
    Ok(FinancialAccount {
        id: FinancialAccountId::from_uuid(model.id),
        agency_id: AgencyId::from_uuid(model.agency_id),
        name: model.name,
        account_type: model.account_type,
        currency: parse_column("financial_accounts", "currency", &model.currency)?,
        initial_balance: model.initial_balance,
        is_active: model.is_active,
    })
}

fn cash_box_to_domain(model: cash_boxes::Model) -> Result<CashBox, RowError> {
    Ok(CashBox {
        id: CashBoxId::from_uuid(model.id),
        agency_id: AgencyId::from_uuid(model.agency_id),
        name: model.name,
        currency: parse_column("cash_boxes", "currency", &model.currency)?,
        initial_balance: model.initial_balance,
        current_balance: model.current_balance,
        is_default: model.is_default,
        is_active: model.is_active,
    })
}

fn movements_to_domain(rows: Vec<ledger_movements::Model>) -> AppResult<Vec<LedgerMovement>> {
    rows.into_iter()
        .map(|row| movement_to_domain(row).map_err(AppError::from))
        .collect()
}

/// Adds `delta` to the box's cached balance.
async fn apply_delta<C: ConnectionTrait>(
    conn: &C,
    agency_id: AgencyId,
    delta: CashBoxDelta,
) -> AppResult<()> {
    let result = cash_boxes::Entity::update_many()
        .col_expr(
            cash_boxes::Column::CurrentBalance,
            Expr::col(cash_boxes::Column::CurrentBalance).add(delta.amount),
        )
        .filter(cash_boxes::Column::Id.eq(delta.cash_box_id.into_inner()))
        .filter(cash_boxes::Column::AgencyId.eq(agency_id.into_inner()))
        .exec(conn)
        .await
        .map_err(db_err)?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound(format!(
            "Cash box {} not found",
            delta.cash_box_id
        )));
    }
    Ok(())
}

#[async_trait]
impl LedgerStore for LedgerRepository {
    async fn find_account(
        &self,
        agency_id: AgencyId,
        id: FinancialAccountId,
    ) -> AppResult<Option<FinancialAccount>> {
        let row = financial_accounts::Entity::find_by_id(id.into_inner())
            .filter(financial_accounts::Column::AgencyId.eq(agency_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(row.map(account_to_domain).transpose()?)
    }

    async fn find_cash_box(
        &self,
        agency_id: AgencyId,
        id: CashBoxId,
    ) -> AppResult<Option<CashBox>> {
        let row = cash_boxes::Entity::find_by_id(id.into_inner())
            .filter(cash_boxes::Column::AgencyId.eq(agency_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(row.map(cash_box_to_domain).transpose()?)
    }

    async fn find_movement(
        &self,
        agency_id: AgencyId,
        id: MovementId,
    ) -> AppResult<Option<LedgerMovement>> {
        let row = ledger_movements::Entity::find_by_id(id.into_inner())
            .filter(ledger_movements::Column::AgencyId.eq(agency_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(row.map(movement_to_domain).transpose()?)
    }

    async fn insert_movement(
        &self,
        movement: &LedgerMovement,
        delta: Option<CashBoxDelta>,
    ) -> AppResult<()> {
        let txn = self.db.begin().await.map_err(db_err)?;

        ledger_movements::Entity::insert(movement_to_active(movement))
            .exec_without_returning(&txn)
            .await
            .map_err(db_err)?;
        if let Some(delta) = delta {
            apply_delta(&txn, movement.agency_id, delta).await?;
        }

        txn.commit().await.map_err(db_err)?;
        debug!(movement_id = %movement.id, delta = ?delta.map(|d| d.amount), "movement stored");
        Ok(())
    }

    async fn delete_movement(
        &self,
        agency_id: AgencyId,
        id: MovementId,
        delta: Option<CashBoxDelta>,
    ) -> AppResult<bool> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let deleted = ledger_movements::Entity::delete_many()
            .filter(ledger_movements::Column::Id.eq(id.into_inner()))
            .filter(ledger_movements::Column::AgencyId.eq(agency_id.into_inner()))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        if deleted.rows_affected == 0 {
            txn.rollback().await.map_err(db_err)?;
            return Ok(false);
        }
        if let Some(delta) = delta {
            apply_delta(&txn, agency_id, delta).await?;
        }

        txn.commit().await.map_err(db_err)?;
        Ok(true)
    }

    async fn movements_for_operation(
        &self,
        agency_id: AgencyId,
        operation_id: OperationId,
    ) -> AppResult<Vec<LedgerMovement>> {
        let rows = ledger_movements::Entity::find()
            .filter(ledger_movements::Column::AgencyId.eq(agency_id.into_inner()))
            .filter(ledger_movements::Column::OperationId.eq(operation_id.into_inner()))
            .order_by_asc(ledger_movements::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        movements_to_domain(rows)
    }

    async fn movements_for_account(
        &self,
        agency_id: AgencyId,
        account_id: FinancialAccountId,
        as_of: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<LedgerMovement>> {
        let mut query = ledger_movements::Entity::find()
            .filter(ledger_movements::Column::AgencyId.eq(agency_id.into_inner()))
            .filter(ledger_movements::Column::AccountId.eq(account_id.into_inner()));
        if let Some(as_of) = as_of {
            query = query.filter(ledger_movements::Column::CreatedAt.lte(as_of));
        }
        let rows = query.all(&self.db).await.map_err(db_err)?;
        movements_to_domain(rows)
    }

    async fn movements_for_cash_box(
        &self,
        agency_id: AgencyId,
        cash_box_id: CashBoxId,
        as_of: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<LedgerMovement>> {
        let mut query = ledger_movements::Entity::find()
            .filter(ledger_movements::Column::AgencyId.eq(agency_id.into_inner()))
            .filter(ledger_movements::Column::CashBoxId.eq(cash_box_id.into_inner()));
        if let Some(as_of) = as_of {
            query = query.filter(ledger_movements::Column::CreatedAt.lte(as_of));
        }
        let rows = query.all(&self.db).await.map_err(db_err)?;
        movements_to_domain(rows)
    }

    async fn replace_cash_box_balance(
        &self,
        agency_id: AgencyId,
        cash_box_id: CashBoxId,
        expected: Decimal,
        balance: Decimal,
    ) -> AppResult<bool> {
        let result = cash_boxes::Entity::update_many()
            .col_expr(cash_boxes::Column::CurrentBalance, Expr::value(balance))
            .filter(cash_boxes::Column::Id.eq(cash_box_id.into_inner()))
            .filter(cash_boxes::Column::AgencyId.eq(agency_id.into_inner()))
            .filter(cash_boxes::Column::CurrentBalance.eq(expected))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected == 1)
    }

    async fn list_active_cash_boxes(&self) -> AppResult<Vec<CashBox>> {
        let rows = cash_boxes::Entity::find()
            .filter(cash_boxes::Column::IsActive.eq(true))
            .order_by_asc(cash_boxes::Column::AgencyId)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        rows.into_iter()
            .map(|row| cash_box_to_domain(row).map_err(AppError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use tesoro_core::ledger::{MovementType, PaymentMethod};
    use uuid::Uuid;

    fn row() -> ledger_movements::Model {
        let now = Utc::now();
        ledger_movements::Model {
            id: Uuid::now_v7(),
            agency_id: Uuid::now_v7(),
            operation_id: Some(Uuid::now_v7()),
            lead_id: None,
            movement_type: "INCOME".to_string(),
            concept: "Seña".to_string(),
            currency: "USD".to_string(),
            amount_original: dec!(100),
            exchange_rate: Some(dec!(1000)),
            amount_ars_equivalent: dec!(100000.00),
            method: "BANK".to_string(),
            account_id: Uuid::now_v7(),
            cash_box_id: None,
            operator_id: None,
            seller_id: None,
            movement_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            created_by: Uuid::now_v7(),
            created_at: now.into(),
        }
    }

    #[test]
    fn test_movement_row_decodes() {
        let model = row();
        let movement = movement_to_domain(model.clone()).unwrap();
        assert_eq!(movement.movement_type, MovementType::Income);
        assert_eq!(movement.method, PaymentMethod::Bank);
        assert_eq!(movement.currency, Currency::Usd);
        assert_eq!(movement.amount_ars_equivalent, dec!(100000.00));
        assert_eq!(movement.id.into_inner(), model.id);
    }

    #[test]
    fn test_movement_row_with_unknown_type_is_rejected() {
        let mut model = row();
        model.movement_type = "REFUND".to_string();
        let err = movement_to_domain(model).unwrap_err();
        assert!(err.to_string().contains("ledger_movements.movement_type"));
    }

    #[test]
    fn test_movement_to_active_keeps_codes() {
        let movement = movement_to_domain(row()).unwrap();
        let active = movement_to_active(&movement);
        assert_eq!(active.movement_type.as_ref(), "INCOME");
        assert_eq!(active.currency.as_ref(), "USD");
        assert_eq!(*active.exchange_rate.as_ref(), Some(dec!(1000)));
    }
}
