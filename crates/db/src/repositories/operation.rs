//! Operation financial snapshots and operator payables.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use tesoro_core::operation::{
    OperationFinancials, OperationStore, OperatorPayment, OperatorPaymentStatus,
    OperatorPaymentStore,
};
use tesoro_shared::types::{AgencyId, OperationId, OperatorId, OperatorPaymentId};
use tesoro_shared::{AppError, AppResult};

use crate::entities::{operation_financials, operator_payments};
use crate::error::{RowError, db_err, parse_column};

/// Repository of operation financial snapshots.
#[derive(Debug, Clone)]
pub struct OperationRepository {
    db: DatabaseConnection,
}

impl OperationRepository {
    /// Creates a new operation repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

const FINANCIALS: &str = "operation_financials";

fn financials_to_domain(
    model: operation_financials::Model,
) -> Result<OperationFinancials, RowError> {
    Ok(OperationFinancials {
        agency_id: AgencyId::from_uuid(model.agency_id),
        operation_id: OperationId::from_uuid(model.operation_id),
        sale_amount: model.sale_amount,
        sale_currency: parse_column(FINANCIALS, "sale_currency", &model.sale_currency)?,
        operator_cost: model.operator_cost,
        operator_cost_currency: parse_column(
            FINANCIALS,
            "operator_cost_currency",
            &model.operator_cost_currency,
        )?,
        operator_id: model.operator_id.map(OperatorId::from_uuid),
        exchange_rate: model.exchange_rate,
        payment_due_date: model.payment_due_date,
    })
}

#[async_trait]
impl OperationStore for OperationRepository {
    async fn find_financials(
        &self,
        agency_id: AgencyId,
        operation_id: OperationId,
    ) -> AppResult<Option<OperationFinancials>> {
        let row = operation_financials::Entity::find_by_id(operation_id.into_inner())
            .filter(operation_financials::Column::AgencyId.eq(agency_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(row.map(financials_to_domain).transpose()?)
    }

    async fn save_financials(&self, financials: &OperationFinancials) -> AppResult<()> {
        let now = Utc::now().into();
        let model = operation_financials::ActiveModel {
            operation_id: Set(financials.operation_id.into_inner()),
            agency_id: Set(financials.agency_id.into_inner()),
            sale_amount: Set(financials.sale_amount),
            sale_currency: Set(financials.sale_currency.as_str().to_string()),
            operator_cost: Set(financials.operator_cost),
            operator_cost_currency: Set(financials.operator_cost_currency.as_str().to_string()),
            operator_id: Set(financials.operator_id.map(OperatorId::into_inner)),
            exchange_rate: Set(financials.exchange_rate),
            payment_due_date: Set(financials.payment_due_date),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let rows = operation_financials::Entity::insert(model)
            .on_conflict(
                OnConflict::column(operation_financials::Column::OperationId)
                    .update_columns([
                        operation_financials::Column::SaleAmount,
                        operation_financials::Column::SaleCurrency,
                        operation_financials::Column::OperatorCost,
                        operation_financials::Column::OperatorCostCurrency,
                        operation_financials::Column::OperatorId,
                        operation_financials::Column::ExchangeRate,
                        operation_financials::Column::PaymentDueDate,
                        operation_financials::Column::UpdatedAt,
                    ])
                    .action_and_where(
                        Expr::col((
                            operation_financials::Entity,
                            operation_financials::Column::AgencyId,
                        ))
                        .eq(financials.agency_id.into_inner()),
                    )
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(db_err)?;

        if rows == 0 {
            return Err(AppError::Conflict(format!(
                "Operation {} belongs to another agency",
                financials.operation_id
            )));
        }
        Ok(())
    }

    async fn delete_financials(
        &self,
        agency_id: AgencyId,
        operation_id: OperationId,
    ) -> AppResult<bool> {
        let result = operation_financials::Entity::delete_many()
            .filter(operation_financials::Column::OperationId.eq(operation_id.into_inner()))
            .filter(operation_financials::Column::AgencyId.eq(agency_id.into_inner()))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected > 0)
    }
}

/// Repository of operator payables.
#[derive(Debug, Clone)]
pub struct OperatorPaymentRepository {
    db: DatabaseConnection,
}

impl OperatorPaymentRepository {
    /// Creates a new operator payment repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Marks a payable as paid; it no longer follows the operation's cost.
    pub async fn mark_paid(&self, agency_id: AgencyId, id: OperatorPaymentId) -> AppResult<()> {
        let result = operator_payments::Entity::update_many()
            .col_expr(
                operator_payments::Column::Status,
                Expr::value(OperatorPaymentStatus::Paid.as_str()),
            )
            .filter(operator_payments::Column::Id.eq(id.into_inner()))
            .filter(operator_payments::Column::AgencyId.eq(agency_id.into_inner()))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Operator payment {id} not found")));
        }
        Ok(())
    }
}

fn payment_to_domain(model: operator_payments::Model) -> Result<OperatorPayment, RowError> {
    Ok(OperatorPayment {
        id: OperatorPaymentId::from_uuid(model.id),
        agency_id: AgencyId::from_uuid(model.agency_id),
        operation_id: OperationId::from_uuid(model.operation_id),
        operator_id: OperatorId::from_uuid(model.operator_id),
        amount: model.amount,
        currency: parse_column("operator_payments", "currency", &model.currency)?,
        due_date: model.due_date,
        status: parse_column("operator_payments", "status", &model.status)?,
    })
}

#[async_trait]
impl OperatorPaymentStore for OperatorPaymentRepository {
    async fn find(
        &self,
        agency_id: AgencyId,
        operation_id: OperationId,
        operator_id: OperatorId,
    ) -> AppResult<Option<OperatorPayment>> {
        let row = operator_payments::Entity::find()
            .filter(operator_payments::Column::AgencyId.eq(agency_id.into_inner()))
            .filter(operator_payments::Column::OperationId.eq(operation_id.into_inner()))
            .filter(operator_payments::Column::OperatorId.eq(operator_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(row.map(payment_to_domain).transpose()?)
    }

    async fn upsert(&self, payment: &OperatorPayment) -> AppResult<()> {
        let now = Utc::now().into();
        let model = operator_payments::ActiveModel {
            id: Set(payment.id.into_inner()),
            agency_id: Set(payment.agency_id.into_inner()),
            operation_id: Set(payment.operation_id.into_inner()),
            operator_id: Set(payment.operator_id.into_inner()),
            amount: Set(payment.amount),
            currency: Set(payment.currency.as_str().to_string()),
            due_date: Set(payment.due_date),
            status: Set(payment.status.as_str().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        // A paid row is frozen even if a stale caller tries to overwrite it
        let rows = operator_payments::Entity::insert(model)
            .on_conflict(
                OnConflict::column(operator_payments::Column::Id)
                    .update_columns([
                        operator_payments::Column::Amount,
                        operator_payments::Column::Currency,
                        operator_payments::Column::DueDate,
                        operator_payments::Column::Status,
                        operator_payments::Column::UpdatedAt,
                    ])
                    .action_and_where(
                        Expr::col((operator_payments::Entity, operator_payments::Column::AgencyId))
                            .eq(payment.agency_id.into_inner())
                            .and(
                                Expr::col((
                                    operator_payments::Entity,
                                    operator_payments::Column::Status,
                                ))
                                .eq(OperatorPaymentStatus::Pending.as_str()),
                            ),
                    )
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(db_err)?;

        if rows == 0 {
            return Err(AppError::Conflict(format!(
                "Operator payment {} is paid or belongs to another agency",
                payment.id
            )));
        }
        Ok(())
    }

    async fn delete_pending(
        &self,
        agency_id: AgencyId,
        operation_id: OperationId,
        operator_id: Option<OperatorId>,
    ) -> AppResult<u64> {
        let mut query = operator_payments::Entity::delete_many()
            .filter(operator_payments::Column::AgencyId.eq(agency_id.into_inner()))
            .filter(operator_payments::Column::OperationId.eq(operation_id.into_inner()))
            .filter(operator_payments::Column::Status.eq(OperatorPaymentStatus::Pending.as_str()));
        if let Some(operator_id) = operator_id {
            query = query.filter(operator_payments::Column::OperatorId.eq(operator_id.into_inner()));
        }
        let result = query.exec(&self.db).await.map_err(db_err)?;
        Ok(result.rows_affected)
    }
}
