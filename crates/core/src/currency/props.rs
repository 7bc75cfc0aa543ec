//! Property-based tests for currency conversion.

use proptest::prelude::*;
use rust_decimal::Decimal;
use tesoro_shared::types::Currency;

use super::conversion::{convert_between, convert_to_base, round_money};

/// Strategy to generate positive decimal amounts (0.01 to 1,000,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate positive exchange rates (0.0001 to 10000.0000).
fn positive_rate() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|v| Decimal::new(v, 4))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// The base equivalent is the product rounded to 2 places.
    #[test]
    fn prop_base_equivalent_is_rounded_product(
        amount in positive_amount(),
        rate in positive_rate(),
    ) {
        let converted = convert_to_base(amount, rate);
        prop_assert_eq!(converted, round_money(amount * rate));
        prop_assert!(converted.scale() <= 2);
        prop_assert!((converted - amount * rate).abs() <= Decimal::new(5, 3));
    }

    /// Converted amounts are never negative for positive inputs.
    #[test]
    fn prop_conversion_non_negative(
        amount in positive_amount(),
        rate in positive_rate(),
    ) {
        prop_assert!(convert_to_base(amount, rate) >= Decimal::ZERO);
    }

    /// Same-currency conversion is the identity.
    #[test]
    fn prop_same_currency_identity(
        amount in positive_amount(),
        rate in positive_rate(),
    ) {
        prop_assert_eq!(convert_between(amount, Currency::Usd, Currency::Usd, rate), Some(amount));
        prop_assert_eq!(convert_between(amount, Currency::Ars, Currency::Ars, rate), Some(amount));
    }

    /// Rounding is idempotent.
    #[test]
    fn prop_round_money_idempotent(amount in positive_amount(), rate in positive_rate()) {
        let once = round_money(amount * rate);
        prop_assert_eq!(round_money(once), once);
    }
}
