//! `SeaORM` Entity for fiscal_settings table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "fiscal_settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub agency_id: Uuid,
    pub cuit: i64,
    pub pto_vta: i32,
    pub environment: String,
    pub cert_alias: Option<String>,
    pub onboarding_status: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub onboarding_error: Option<String>,
    pub onboarding_started_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
