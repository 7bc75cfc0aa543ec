//! `SeaORM` Entity for operation_financials table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "operation_financials")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub operation_id: Uuid,
    pub agency_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub sale_amount: Decimal,
    pub sale_currency: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub operator_cost: Decimal,
    pub operator_cost_currency: String,
    pub operator_id: Option<Uuid>,
    #[sea_orm(column_type = "Decimal(Some((19, 6)))", nullable)]
    pub exchange_rate: Option<Decimal>,
    pub payment_due_date: Option<Date>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
