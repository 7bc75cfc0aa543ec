//! `SeaORM` Entity for invoices table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub agency_id: Uuid,
    pub operation_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub cbte_tipo: i32,
    pub pto_vta: i32,
    pub cbte_nro: Option<i64>,
    pub cae: Option<String>,
    pub cae_fch_vto: Option<Date>,
    pub concepto: i32,
    pub doc_tipo: i32,
    pub doc_nro: i64,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub imp_neto: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub imp_iva: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub imp_op_ex: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub imp_tot_conc: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub imp_trib: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub imp_total: Decimal,
    #[sea_orm(column_type = "JsonBinary")]
    pub iva_lines: Json,
    pub moneda: String,
    #[sea_orm(column_type = "Decimal(Some((19, 6)))", nullable)]
    pub moneda_cotizacion: Option<Decimal>,
    pub fch_serv_desde: Option<Date>,
    pub fch_serv_hasta: Option<Date>,
    pub fch_vto_pago: Option<Date>,
    pub status: String,
    pub fecha_emision: Option<Date>,
    #[sea_orm(column_type = "JsonBinary")]
    pub observations: Json,
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
}

impl Related<super::agencies::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Agencies.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
