//! Invoice repository.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use tesoro_core::fiscal::{Concept, Invoice, InvoiceStore, VoucherType};
use tesoro_shared::types::{AgencyId, CustomerId, InvoiceId, OperationId};
use tesoro_shared::{AppError, AppResult};

use crate::entities::invoices;
use crate::error::{RowError, db_err, from_json, parse_column, to_json};

const TABLE: &str = "invoices";

/// Invoice repository.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    db: DatabaseConnection,
}

impl InvoiceRepository {
    /// Creates a new invoice repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts a new invoice.
    pub async fn insert(&self, invoice: &Invoice) -> AppResult<()> {
        let model = to_active(invoice)?;
        invoices::Entity::insert(model)
            .exec_without_returning(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Lists the invoices of an operation, oldest first.
    pub async fn list_for_operation(
        &self,
        agency_id: AgencyId,
        operation_id: OperationId,
    ) -> AppResult<Vec<Invoice>> {
        let rows = invoices::Entity::find()
            .filter(invoices::Column::AgencyId.eq(agency_id.into_inner()))
            .filter(invoices::Column::OperationId.eq(operation_id.into_inner()))
            .order_by_asc(invoices::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        rows.into_iter()
            .map(|row| to_domain(row).map_err(AppError::from))
            .collect()
    }
}

fn to_domain(model: invoices::Model) -> Result<Invoice, RowError> {
    let invalid = |column: &'static str, message: String| RowError::InvalidValue {
        table: TABLE,
        column,
        message,
    };

    Ok(Invoice {
        id: InvoiceId::from_uuid(model.id),
        agency_id: AgencyId::from_uuid(model.agency_id),
        operation_id: model.operation_id.map(OperationId::from_uuid),
        customer_id: model.customer_id.map(CustomerId::from_uuid),
        cbte_tipo: VoucherType::try_from(model.cbte_tipo).map_err(|m| invalid("cbte_tipo", m))?,
        pto_vta: model.pto_vta,
        cbte_nro: model.cbte_nro,
        cae: model.cae,
        cae_fch_vto: model.cae_fch_vto,
        concepto: Concept::try_from(model.concepto).map_err(|m| invalid("concepto", m))?,
        doc_tipo: model.doc_tipo,
        doc_nro: model.doc_nro,
        imp_neto: model.imp_neto,
        imp_iva: model.imp_iva,
        imp_op_ex: model.imp_op_ex,
        imp_tot_conc: model.imp_tot_conc,
        imp_trib: model.imp_trib,
        imp_total: model.imp_total,
        iva_lines: from_json(TABLE, "iva_lines", model.iva_lines)?,
        moneda: parse_column(TABLE, "moneda", &model.moneda)?,
        moneda_cotizacion: model.moneda_cotizacion,
        fch_serv_desde: model.fch_serv_desde,
        fch_serv_hasta: model.fch_serv_hasta,
        fch_vto_pago: model.fch_vto_pago,
        status: parse_column(TABLE, "status", &model.status)?,
        fecha_emision: model.fecha_emision,
        observations: from_json(TABLE, "observations", model.observations)?,
    })
}

fn to_active(invoice: &Invoice) -> AppResult<invoices::ActiveModel> {
    let now = Utc::now().into();
    Ok(invoices::ActiveModel {
        id: Set(invoice.id.into_inner()),
        agency_id: Set(invoice.agency_id.into_inner()),
        operation_id: Set(invoice.operation_id.map(OperationId::into_inner)),
        customer_id: Set(invoice.customer_id.map(CustomerId::into_inner)),
        cbte_tipo: Set(invoice.cbte_tipo.code()),
        pto_vta: Set(invoice.pto_vta),
        cbte_nro: Set(invoice.cbte_nro),
        cae: Set(invoice.cae.clone()),
        cae_fch_vto: Set(invoice.cae_fch_vto),
        concepto: Set(invoice.concepto.code()),
        doc_tipo: Set(invoice.doc_tipo),
        doc_nro: Set(invoice.doc_nro),
        imp_neto: Set(invoice.imp_neto),
        imp_iva: Set(invoice.imp_iva),
        imp_op_ex: Set(invoice.imp_op_ex),
        imp_tot_conc: Set(invoice.imp_tot_conc),
        imp_trib: Set(invoice.imp_trib),
        imp_total: Set(invoice.imp_total),
        iva_lines: Set(to_json(&invoice.iva_lines)?),
        moneda: Set(invoice.moneda.as_str().to_string()),
        moneda_cotizacion: Set(invoice.moneda_cotizacion),
        fch_serv_desde: Set(invoice.fch_serv_desde),
        fch_serv_hasta: Set(invoice.fch_serv_hasta),
        fch_vto_pago: Set(invoice.fch_vto_pago),
        status: Set(invoice.status.as_str().to_string()),
        fecha_emision: Set(invoice.fecha_emision),
        observations: Set(to_json(&invoice.observations)?),
        created_at: Set(now),
        updated_at: Set(now),
    })
}

#[async_trait]
impl InvoiceStore for InvoiceRepository {
    async fn find(&self, agency_id: AgencyId, id: InvoiceId) -> AppResult<Option<Invoice>> {
        let row = invoices::Entity::find_by_id(id.into_inner())
            .filter(invoices::Column::AgencyId.eq(agency_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(row.map(to_domain).transpose()?)
    }

    async fn update(&self, invoice: &Invoice) -> AppResult<()> {
        let mut model = to_active(invoice)?;
        model.id = NotSet;
        model.agency_id = NotSet;
        model.created_at = NotSet;

        let result = invoices::Entity::update_many()
            .set(model)
            .filter(invoices::Column::Id.eq(invoice.id.into_inner()))
            .filter(invoices::Column::AgencyId.eq(invoice.agency_id.into_inner()))
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Invoice {} not found", invoice.id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use tesoro_core::fiscal::{AuthorityMessage, InvoiceStatus, IvaLine, IvaRateBucket};
    use tesoro_shared::types::Currency;
    use uuid::Uuid;

    fn row() -> invoices::Model {
        let now = Utc::now().into();
        invoices::Model {
            id: Uuid::now_v7(),
            agency_id: Uuid::now_v7(),
            operation_id: None,
            customer_id: None,
            cbte_tipo: 6,
            pto_vta: 3,
            cbte_nro: Some(42),
            cae: Some("74123456789012".into()),
            cae_fch_vto: NaiveDate::from_ymd_opt(2026, 10, 26),
            concepto: 2,
            doc_tipo: 96,
            doc_nro: 30_111_222,
            imp_neto: dec!(1000.00),
            imp_iva: dec!(210.00),
            imp_op_ex: dec!(0),
            imp_tot_conc: dec!(0),
            imp_trib: dec!(0),
            imp_total: dec!(1210.00),
            iva_lines: serde_json::json!([{"bucket": 5, "base": "1000.00", "amount": "210.00"}]),
            moneda: "ARS".into(),
            moneda_cotizacion: None,
            fch_serv_desde: NaiveDate::from_ymd_opt(2026, 10, 1),
            fch_serv_hasta: NaiveDate::from_ymd_opt(2026, 10, 10),
            fch_vto_pago: NaiveDate::from_ymd_opt(2026, 10, 20),
            status: "authorized".into(),
            fecha_emision: NaiveDate::from_ymd_opt(2026, 10, 16),
            observations: serde_json::json!([{"code": 10017, "message": "Observed"}]),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_row_decodes_codes_and_json_columns() {
        let invoice = to_domain(row()).unwrap();
        assert_eq!(invoice.cbte_tipo, VoucherType::FacturaB);
        assert_eq!(invoice.concepto, Concept::Services);
        assert_eq!(invoice.status, InvoiceStatus::Authorized);
        assert_eq!(invoice.moneda, Currency::Ars);
        assert_eq!(
            invoice.iva_lines,
            vec![IvaLine {
                bucket: IvaRateBucket::TwentyOne,
                base: dec!(1000.00),
                amount: dec!(210.00),
            }]
        );
        assert_eq!(
            invoice.observations,
            vec![AuthorityMessage {
                code: 10017,
                message: "Observed".into(),
            }]
        );
    }

    #[test]
    fn test_unknown_voucher_code_is_row_error() {
        let mut model = row();
        model.cbte_tipo = 99;
        let err = to_domain(model).unwrap_err();
        assert!(err.to_string().starts_with("Invalid invoices.cbte_tipo"));
    }

    #[test]
    fn test_active_model_stores_codes() {
        let invoice = to_domain(row()).unwrap();
        let active = to_active(&invoice).unwrap();
        assert_eq!(active.cbte_tipo.as_ref(), &6);
        assert_eq!(active.concepto.as_ref(), &2);
        assert_eq!(active.status.as_ref(), "authorized");
    }
}
