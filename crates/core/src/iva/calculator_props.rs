//! Property-based tests for IVA arithmetic.

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::calculator::{IVA_RATE, purchase_iva, sale_iva};

fn amount() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Sale IVA is never negative, whatever the cost.
    #[test]
    fn prop_sale_iva_non_negative(sale in amount(), cost in amount()) {
        let iva = sale_iva(sale, cost);
        prop_assert!(iva.iva_amount >= Decimal::ZERO);
        prop_assert!(iva.net_amount >= Decimal::ZERO);
        if iva.margin > Decimal::ZERO {
            prop_assert_eq!(iva.net_amount + iva.iva_amount, iva.margin);
        }
    }

    /// Purchase IVA equals cost - cost/1.21 within a cent.
    #[test]
    fn prop_purchase_iva_matches_inclusive_formula(cost in amount()) {
        let iva = purchase_iva(cost);
        let exact = cost - cost / (Decimal::ONE + IVA_RATE);
        prop_assert!((iva.iva_amount - exact).abs() <= Decimal::new(1, 2));
        prop_assert_eq!(iva.net_amount + iva.iva_amount, cost);
    }

    /// Same inputs always give the same position.
    #[test]
    fn prop_sale_iva_deterministic(sale in amount(), cost in amount()) {
        prop_assert_eq!(sale_iva(sale, cost), sale_iva(sale, cost));
    }
}
