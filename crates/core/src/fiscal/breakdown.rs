//! Builds and validates the monetary breakdown sent to the authority.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tesoro_shared::types::Currency;

use super::error::FiscalError;
use super::types::{Invoice, IvaAlicuota, IvaLine, IvaRateBucket, VoucherRequest};

/// Authority currency code.
#[must_use]
pub const fn currency_code(currency: Currency) -> &'static str {
    match currency {
        Currency::Ars => "PES",
        Currency::Usd => "DOL",
    }
}

/// Sums IVA lines per bucket, ordered by bucket id.
#[must_use]
pub fn group_iva(lines: &[IvaLine]) -> Vec<IvaAlicuota> {
    let mut grouped: BTreeMap<i32, (Decimal, Decimal)> = BTreeMap::new();
    for line in lines {
        let entry = grouped.entry(line.bucket.id()).or_default();
        entry.0 += line.base;
        entry.1 += line.amount;
    }
    grouped
        .into_iter()
        .map(|(id, (base_imp, importe))| IvaAlicuota {
            id,
            base_imp,
            importe,
        })
        .collect()
}

/// Checks that the invoice's amounts add up.
///
/// # Errors
///
/// Returns `FiscalError::InvalidBreakdown` describing the first inconsistency.
pub fn validate_totals(invoice: &Invoice) -> Result<(), FiscalError> {
    let amounts = [
        invoice.imp_neto,
        invoice.imp_iva,
        invoice.imp_op_ex,
        invoice.imp_tot_conc,
        invoice.imp_trib,
    ];
    if amounts.iter().any(Decimal::is_sign_negative) {
        return Err(FiscalError::InvalidBreakdown(
            "amounts must not be negative".into(),
        ));
    }

    let expected_total: Decimal = amounts.iter().sum();
    if invoice.imp_total != expected_total {
        return Err(FiscalError::InvalidBreakdown(format!(
            "total {} does not equal net + iva + exempt + untaxed + taxes ({expected_total})",
            invoice.imp_total
        )));
    }
    if invoice.imp_total <= Decimal::ZERO {
        return Err(FiscalError::InvalidBreakdown("total must be positive".into()));
    }

    if invoice.cbte_tipo.discriminates_iva() {
        if invoice.imp_neto > Decimal::ZERO && invoice.iva_lines.is_empty() {
            return Err(FiscalError::InvalidBreakdown(
                "net amount requires at least one IVA line".into(),
            ));
        }
        let iva_sum: Decimal = invoice.iva_lines.iter().map(|l| l.amount).sum();
        if iva_sum != invoice.imp_iva {
            return Err(FiscalError::InvalidBreakdown(format!(
                "IVA lines add up to {iva_sum}, expected {}",
                invoice.imp_iva
            )));
        }
        let base_sum: Decimal = invoice.iva_lines.iter().map(|l| l.base).sum();
        if base_sum != invoice.imp_neto {
            return Err(FiscalError::InvalidBreakdown(format!(
                "IVA bases add up to {base_sum}, expected {}",
                invoice.imp_neto
            )));
        }
        for line in &invoice.iva_lines {
            let expected = crate::currency::round_money(line.base * line.bucket.rate());
            if (line.amount - expected).abs() > Decimal::new(1, 2) {
                return Err(FiscalError::InvalidBreakdown(format!(
                    "IVA {} on base {} does not match rate id {}",
                    line.amount,
                    line.base,
                    line.bucket.id()
                )));
            }
        }
    } else if !invoice.imp_iva.is_zero() || !invoice.iva_lines.is_empty() {
        return Err(FiscalError::InvalidBreakdown(
            "class C vouchers carry no IVA".into(),
        ));
    }

    if invoice.concepto.requires_service_dates() {
        match (
            invoice.fch_serv_desde,
            invoice.fch_serv_hasta,
            invoice.fch_vto_pago,
        ) {
            (Some(from), Some(to), Some(_)) if from <= to => {}
            (Some(_), Some(_), Some(_)) => {
                return Err(FiscalError::InvalidBreakdown(
                    "service period ends before it starts".into(),
                ));
            }
            _ => {
                return Err(FiscalError::InvalidBreakdown(
                    "service period and payment due date are required for services".into(),
                ));
            }
        }
    }

    if invoice.moneda == Currency::Usd
        && !invoice
            .moneda_cotizacion
            .is_some_and(|q| q > Decimal::ZERO)
    {
        return Err(FiscalError::InvalidBreakdown(
            "USD invoices require a positive quote".into(),
        ));
    }
    Ok(())
}

/// Builds the authorization request for voucher number `cbte_nro`.
///
/// # Errors
///
/// Returns `FiscalError::InvalidBreakdown` if the invoice does not validate.
pub fn build_voucher_request(
    invoice: &Invoice,
    cbte_nro: i64,
    issue_date: NaiveDate,
) -> Result<VoucherRequest, FiscalError> {
    validate_totals(invoice)?;
    let services = invoice.concepto.requires_service_dates();
    let iva = if invoice.cbte_tipo.discriminates_iva() {
        group_iva(&invoice.iva_lines)
    } else {
        Vec::new()
    };
    Ok(VoucherRequest {
        pto_vta: invoice.pto_vta,
        cbte_tipo: invoice.cbte_tipo.code(),
        cbte_nro,
        concepto: invoice.concepto.code(),
        doc_tipo: invoice.doc_tipo,
        doc_nro: invoice.doc_nro,
        cbte_fch: issue_date,
        imp_total: invoice.imp_total,
        imp_tot_conc: invoice.imp_tot_conc,
        imp_neto: invoice.imp_neto,
        imp_op_ex: invoice.imp_op_ex,
        imp_iva: invoice.imp_iva,
        imp_trib: invoice.imp_trib,
        mon_id: currency_code(invoice.moneda).to_string(),
        mon_cotiz: match invoice.moneda {
            Currency::Ars => Decimal::ONE,
            Currency::Usd => invoice.moneda_cotizacion.unwrap_or(Decimal::ONE),
        },
        iva,
        fch_serv_desde: invoice.fch_serv_desde.filter(|_| services),
        fch_serv_hasta: invoice.fch_serv_hasta.filter(|_| services),
        fch_vto_pago: invoice.fch_vto_pago.filter(|_| services),
    })
}

/// IVA line for a base at a supported rate.
#[must_use]
pub fn iva_line(bucket: IvaRateBucket, base: Decimal) -> IvaLine {
    IvaLine {
        bucket,
        base,
        amount: crate::currency::round_money(base * bucket.rate()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiscal::types::{Concept, VoucherType};
    use crate::testing::draft_invoice;
    use rust_decimal_macros::dec;
    use tesoro_shared::types::AgencyId;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    #[test]
    fn test_group_iva_sums_per_bucket() {
        let lines = [
            iva_line(IvaRateBucket::TwentyOne, dec!(100)),
            iva_line(IvaRateBucket::TenFive, dec!(200)),
            iva_line(IvaRateBucket::TwentyOne, dec!(50)),
        ];
        let grouped = group_iva(&lines);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].id, 4);
        assert_eq!(grouped[0].importe, dec!(21.00));
        assert_eq!(grouped[1].id, 5);
        assert_eq!(grouped[1].base_imp, dec!(150));
        assert_eq!(grouped[1].importe, dec!(31.50));
    }

    #[test]
    fn test_valid_invoice_builds_request() {
        let invoice = draft_invoice(AgencyId::new(), 1);
        let request = build_voucher_request(&invoice, 42, date(15)).unwrap();
        assert_eq!(request.cbte_nro, 42);
        assert_eq!(request.mon_id, "PES");
        assert_eq!(request.mon_cotiz, Decimal::ONE);
        assert_eq!(request.iva.len(), 1);
        assert_eq!(request.iva[0].id, 5);
        assert_eq!(request.fch_serv_desde, None);
    }

    #[test]
    fn test_total_mismatch_rejected() {
        let mut invoice = draft_invoice(AgencyId::new(), 1);
        invoice.imp_total += dec!(0.01);
        assert!(matches!(
            validate_totals(&invoice),
            Err(FiscalError::InvalidBreakdown(_))
        ));
    }

    #[test]
    fn test_services_require_dates() {
        let mut invoice = draft_invoice(AgencyId::new(), 1);
        invoice.concepto = Concept::Services;
        assert!(validate_totals(&invoice).is_err());

        invoice.fch_serv_desde = Some(date(1));
        invoice.fch_serv_hasta = Some(date(31));
        invoice.fch_vto_pago = Some(date(31));
        let request = build_voucher_request(&invoice, 1, date(15)).unwrap();
        assert_eq!(request.concepto, 2);
        assert_eq!(request.fch_serv_desde, Some(date(1)));

        invoice.fch_serv_hasta = Some(NaiveDate::from_ymd_opt(2024, 12, 1).unwrap());
        assert!(validate_totals(&invoice).is_err());
    }

    #[test]
    fn test_class_c_has_no_iva() {
        let mut invoice = draft_invoice(AgencyId::new(), 1);
        invoice.cbte_tipo = VoucherType::FacturaC;
        assert!(validate_totals(&invoice).is_err());

        invoice.imp_iva = Decimal::ZERO;
        invoice.iva_lines.clear();
        invoice.imp_total = invoice.imp_neto;
        let request = build_voucher_request(&invoice, 7, date(15)).unwrap();
        assert!(request.iva.is_empty());
        assert_eq!(request.cbte_tipo, 11);
    }

    #[test]
    fn test_usd_requires_quote() {
        let mut invoice = draft_invoice(AgencyId::new(), 1);
        invoice.moneda = Currency::Usd;
        assert!(validate_totals(&invoice).is_err());
        invoice.moneda_cotizacion = Some(dec!(1050.5));
        let request = build_voucher_request(&invoice, 1, date(15)).unwrap();
        assert_eq!(request.mon_id, "DOL");
        assert_eq!(request.mon_cotiz, dec!(1050.5));
    }
}
