//! `SeaORM` Entity for subscriptions table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "subscriptions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub agency_id: Uuid,
    pub plan_id: String,
    pub status: String,
    #[sea_orm(unique)]
    pub mp_preapproval_id: Option<String>,
    pub mp_status: Option<String>,
    pub current_period_start: Option<DateTimeWithTimeZone>,
    pub current_period_end: Option<DateTimeWithTimeZone>,
    pub trial_start: Option<DateTimeWithTimeZone>,
    pub trial_end: Option<DateTimeWithTimeZone>,
    pub payment_attempts: i32,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::agencies::Entity",
        from = "Column::AgencyId",
        to = "super::agencies::Column::Id"
    )]
    Agencies,
    #[sea_orm(has_many = "super::billing_events::Entity")]
    BillingEvents,
}

impl Related<super::agencies::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Agencies.def()
    }
}

impl Related<super::billing_events::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BillingEvents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
