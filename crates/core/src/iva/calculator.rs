//! Pure IVA arithmetic.

use rust_decimal::Decimal;
use tesoro_shared::types::Currency;

use super::error::IvaError;
use crate::currency::{convert_between, round_money};

/// IVA rate applied in this domain (21%).
pub const IVA_RATE: Decimal = Decimal::from_parts(21, 0, 0, false, 2);

/// `1 + IVA_RATE`, the divisor that backs net out of a VAT-inclusive amount.
const IVA_INCLUSIVE_FACTOR: Decimal = Decimal::from_parts(121, 0, 0, false, 2);

/// Sales-side position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleIva {
    /// Sale minus operator cost, in the sale currency.
    pub margin: Decimal,
    /// Margin after IVA.
    pub net_amount: Decimal,
    /// IVA on the margin.
    pub iva_amount: Decimal,
}

/// Purchase-side position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseIva {
    /// Cost without IVA.
    pub net_amount: Decimal,
    /// IVA included in the cost.
    pub iva_amount: Decimal,
}

/// IVA over the margin. A non-positive margin yields zero tax.
///
/// `operator_cost` must already be in the sale currency.
#[must_use]
pub fn sale_iva(sale_amount: Decimal, operator_cost: Decimal) -> SaleIva {
    let margin = sale_amount - operator_cost;
    if margin <= Decimal::ZERO {
        return SaleIva {
            margin,
            net_amount: Decimal::ZERO,
            iva_amount: Decimal::ZERO,
        };
    }
    let iva_amount = round_money(margin * IVA_RATE);
    SaleIva {
        margin,
        net_amount: margin - iva_amount,
        iva_amount,
    }
}

/// IVA contained in a VAT-inclusive operator cost.
#[must_use]
pub fn purchase_iva(operator_cost: Decimal) -> PurchaseIva {
    let iva_amount = round_money(operator_cost * IVA_RATE / IVA_INCLUSIVE_FACTOR);
    PurchaseIva {
        net_amount: operator_cost - iva_amount,
        iva_amount,
    }
}

/// Expresses the operator cost in the sale currency.
///
/// Uses the operation's own rate (ARS per USD). Parity is never assumed.
///
/// # Errors
///
/// Returns `IvaError::MissingExchangeRate` when the currencies differ and no
/// usable rate is available.
pub fn cost_in_sale_currency(
    operator_cost: Decimal,
    cost_currency: Currency,
    sale_currency: Currency,
    operation_rate: Option<Decimal>,
) -> Result<Decimal, IvaError> {
    if cost_currency == sale_currency {
        return Ok(operator_cost);
    }
    operation_rate
        .filter(|rate| *rate > Decimal::ZERO)
        .and_then(|rate| convert_between(operator_cost, cost_currency, sale_currency, rate))
        .ok_or(IvaError::MissingExchangeRate {
            from: cost_currency,
            to: sale_currency,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_iva_rate_constant() {
        assert_eq!(IVA_RATE, dec!(0.21));
        assert_eq!(IVA_INCLUSIVE_FACTOR, dec!(1.21));
    }

    #[test]
    fn test_sale_iva_on_margin() {
        let iva = sale_iva(dec!(3000), dec!(2400));
        assert_eq!(iva.margin, dec!(600));
        assert_eq!(iva.iva_amount, dec!(126.00));
        assert_eq!(iva.net_amount, dec!(474.00));
    }

    #[test]
    fn test_sale_iva_negative_margin_is_zero() {
        let iva = sale_iva(dec!(1000), dec!(1500));
        assert_eq!(iva.margin, dec!(-500));
        assert_eq!(iva.iva_amount, Decimal::ZERO);
        assert_eq!(iva.net_amount, Decimal::ZERO);
    }

    #[test]
    fn test_purchase_iva_backs_out_net() {
        let iva = purchase_iva(dec!(2400));
        assert_eq!(iva.iva_amount, dec!(416.53));
        assert_eq!(iva.net_amount, dec!(1983.47));
    }

    #[test]
    fn test_cost_conversion_uses_operation_rate() {
        assert_eq!(
            cost_in_sale_currency(dec!(100000), Currency::Ars, Currency::Usd, Some(dec!(1000)))
                .unwrap(),
            dec!(100.00)
        );
        assert_eq!(
            cost_in_sale_currency(dec!(100), Currency::Usd, Currency::Ars, Some(dec!(1000)))
                .unwrap(),
            dec!(100000.00)
        );
        assert_eq!(
            cost_in_sale_currency(dec!(100), Currency::Usd, Currency::Usd, None).unwrap(),
            dec!(100)
        );
    }

    #[test]
    fn test_cost_conversion_refuses_parity() {
        let err = cost_in_sale_currency(dec!(100), Currency::Usd, Currency::Ars, None).unwrap_err();
        assert!(matches!(err, IvaError::MissingExchangeRate { .. }));
        assert!(
            cost_in_sale_currency(dec!(100), Currency::Usd, Currency::Ars, Some(dec!(0))).is_err()
        );
    }
}
