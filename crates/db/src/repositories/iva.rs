//! IVA repository: one sales and one purchase record per operation.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use tesoro_core::iva::{IvaPurchaseRecord, IvaSaleRecord, IvaStore};
use tesoro_shared::types::{AgencyId, OperationId};
use tesoro_shared::{AppError, AppResult};

use crate::entities::{iva_purchases, iva_sales};
use crate::error::{db_err, parse_column};

/// IVA repository.
#[derive(Debug, Clone)]
pub struct IvaRepository {
    db: DatabaseConnection,
}

impl IvaRepository {
    /// Creates a new IVA repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn foreign_operation(operation_id: OperationId) -> AppError {
    AppError::Conflict(format!(
        "Operation {operation_id} belongs to another agency"
    ))
}

#[async_trait]
impl IvaStore for IvaRepository {
    async fn upsert_sale(&self, record: &IvaSaleRecord) -> AppResult<()> {
        let now = Utc::now().into();
        let model = iva_sales::ActiveModel {
            operation_id: Set(record.operation_id.into_inner()),
            agency_id: Set(record.agency_id.into_inner()),
            sale_amount_total: Set(record.sale_amount_total),
            operator_cost_total: Set(record.operator_cost_total),
            net_amount: Set(record.net_amount),
            iva_amount: Set(record.iva_amount),
            currency: Set(record.currency.as_str().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        // Update in place, never across agencies
        let rows = iva_sales::Entity::insert(model)
            .on_conflict(
                OnConflict::column(iva_sales::Column::OperationId)
                    .update_columns([
                        iva_sales::Column::SaleAmountTotal,
                        iva_sales::Column::OperatorCostTotal,
                        iva_sales::Column::NetAmount,
                        iva_sales::Column::IvaAmount,
                        iva_sales::Column::Currency,
                        iva_sales::Column::UpdatedAt,
                    ])
                    .action_and_where(
                        Expr::col((iva_sales::Entity, iva_sales::Column::AgencyId))
                            .eq(record.agency_id.into_inner()),
                    )
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(db_err)?;

        if rows == 0 {
            return Err(foreign_operation(record.operation_id));
        }
        Ok(())
    }

    async fn upsert_purchase(&self, record: &IvaPurchaseRecord) -> AppResult<()> {
        let now = Utc::now().into();
        let model = iva_purchases::ActiveModel {
            operation_id: Set(record.operation_id.into_inner()),
            agency_id: Set(record.agency_id.into_inner()),
            operator_cost_total: Set(record.operator_cost_total),
            net_amount: Set(record.net_amount),
            iva_amount: Set(record.iva_amount),
            currency: Set(record.currency.as_str().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let rows = iva_purchases::Entity::insert(model)
            .on_conflict(
                OnConflict::column(iva_purchases::Column::OperationId)
                    .update_columns([
                        iva_purchases::Column::OperatorCostTotal,
                        iva_purchases::Column::NetAmount,
                        iva_purchases::Column::IvaAmount,
                        iva_purchases::Column::Currency,
                        iva_purchases::Column::UpdatedAt,
                    ])
                    .action_and_where(
                        Expr::col((iva_purchases::Entity, iva_purchases::Column::AgencyId))
                            .eq(record.agency_id.into_inner()),
                    )
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(db_err)?;

        if rows == 0 {
            return Err(foreign_operation(record.operation_id));
        }
        Ok(())
    }

    async fn delete_sale(&self, agency_id: AgencyId, operation_id: OperationId) -> AppResult<bool> {
        let result = iva_sales::Entity::delete_many()
            .filter(iva_sales::Column::OperationId.eq(operation_id.into_inner()))
            .filter(iva_sales::Column::AgencyId.eq(agency_id.into_inner()))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected > 0)
    }

    async fn delete_purchase(
        &self,
        agency_id: AgencyId,
        operation_id: OperationId,
    ) -> AppResult<bool> {
        let result = iva_purchases::Entity::delete_many()
            .filter(iva_purchases::Column::OperationId.eq(operation_id.into_inner()))
            .filter(iva_purchases::Column::AgencyId.eq(agency_id.into_inner()))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected > 0)
    }

    async fn find_sale(
        &self,
        agency_id: AgencyId,
        operation_id: OperationId,
    ) -> AppResult<Option<IvaSaleRecord>> {
        let Some(row) = iva_sales::Entity::find_by_id(operation_id.into_inner())
            .filter(iva_sales::Column::AgencyId.eq(agency_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(db_err)?
        else {
            return Ok(None);
        };

        Ok(Some(IvaSaleRecord {
            operation_id,
            agency_id,
            sale_amount_total: row.sale_amount_total,
            operator_cost_total: row.operator_cost_total,
            net_amount: row.net_amount,
            iva_amount: row.iva_amount,
            currency: parse_column("iva_sales", "currency", &row.currency)?,
        }))
    }

    async fn find_purchase(
        &self,
        agency_id: AgencyId,
        operation_id: OperationId,
    ) -> AppResult<Option<IvaPurchaseRecord>> {
        let Some(row) = iva_purchases::Entity::find_by_id(operation_id.into_inner())
            .filter(iva_purchases::Column::AgencyId.eq(agency_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(db_err)?
        else {
            return Ok(None);
        };

        Ok(Some(IvaPurchaseRecord {
            operation_id,
            agency_id,
            operator_cost_total: row.operator_cost_total,
            net_amount: row.net_amount,
            iva_amount: row.iva_amount,
            currency: parse_column("iva_purchases", "currency", &row.currency)?,
        }))
    }
}
