//! `SeaORM` Entity for ledger_movements table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "ledger_movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub agency_id: Uuid,
    pub operation_id: Option<Uuid>,
    pub lead_id: Option<Uuid>,
    pub movement_type: String,
    #[sea_orm(column_type = "Text")]
    pub concept: String,
    pub currency: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub amount_original: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 6)))", nullable)]
    pub exchange_rate: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub amount_ars_equivalent: Decimal,
    pub method: String,
    pub account_id: Uuid,
    pub cash_box_id: Option<Uuid>,
    pub operator_id: Option<Uuid>,
    pub seller_id: Option<Uuid>,
    pub movement_date: Date,
    pub created_by: Uuid,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::financial_accounts::Entity",
        from = "Column::AccountId",
        to = "super::financial_accounts::Column::Id"
    )]
    FinancialAccounts,
    #[sea_orm(
        belongs_to = "super::cash_boxes::Entity",
        from = "Column::CashBoxId",
        to = "super::cash_boxes::Column::Id"
    )]
    CashBoxes,
}

impl Related<super::financial_accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FinancialAccounts.def()
    }
}

impl Related<super::cash_boxes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CashBoxes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
