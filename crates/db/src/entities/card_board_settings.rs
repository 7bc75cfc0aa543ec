//! `SeaORM` Entity for card_board_settings table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "card_board_settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub board_id: String,
    pub agency_id: Uuid,
    /// List id -> lead status.
    #[sea_orm(column_type = "JsonBinary")]
    pub list_status: Json,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
