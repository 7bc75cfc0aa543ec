//! `SeaORM` Entity for iva_purchases table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "iva_purchases")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub operation_id: Uuid,
    pub agency_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub operator_cost_total: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub net_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub iva_amount: Decimal,
    pub currency: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
