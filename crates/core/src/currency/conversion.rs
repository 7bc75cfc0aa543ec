//! Currency conversion logic.
//!
//! CRITICAL: Rounding strategy for money:
//! - Always round to 2 decimal places
//! - Use standard rounding (half away from zero)
//! - Store both original and converted amounts

use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;
use tesoro_shared::types::Currency;

/// Decimal places kept for every stored amount.
pub const MONEY_DECIMAL_PLACES: u32 = 2;

/// Rounds a monetary value to 2 decimal places, half away from zero.
#[must_use]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Converts a USD amount to ARS using an "ARS per USD" rate.
#[must_use]
pub fn convert_to_base(amount: Decimal, rate: Decimal) -> Decimal {
    round_money(amount * rate)
}

/// Converts an amount between the two supported currencies.
///
/// `rate` is always quoted as ARS per 1 USD. Returns `None` when a
/// conversion is needed and the rate is zero.
#[must_use]
pub fn convert_between(amount: Decimal, from: Currency, to: Currency, rate: Decimal) -> Option<Decimal> {
    match (from, to) {
        (a, b) if a == b => Some(amount),
        (Currency::Usd, Currency::Ars) => Some(convert_to_base(amount, rate)),
        (Currency::Ars, Currency::Usd) => {
            if rate.is_zero() {
                None
            } else {
                Some(round_money(amount / rate))
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_convert_to_base() {
        // 100 USD * 1000 = 100,000 ARS
        assert_eq!(convert_to_base(dec!(100), dec!(1000)), dec!(100000.00));
    }

    #[test]
    fn test_convert_rounds_half_up() {
        // 10.005 rounds up, not to even
        assert_eq!(round_money(dec!(10.005)), dec!(10.01));
        assert_eq!(round_money(dec!(10.015)), dec!(10.02));
        assert_eq!(round_money(dec!(10.004)), dec!(10.00));
        assert_eq!(convert_to_base(dec!(0.5), dec!(0.01)), dec!(0.01));
    }

    #[test]
    fn test_convert_between() {
        assert_eq!(
            convert_between(dec!(50), Currency::Usd, Currency::Usd, dec!(1000)),
            Some(dec!(50))
        );
        assert_eq!(
            convert_between(dec!(50), Currency::Usd, Currency::Ars, dec!(1000)),
            Some(dec!(50000.00))
        );
        assert_eq!(
            convert_between(dec!(50000), Currency::Ars, Currency::Usd, dec!(1000)),
            Some(dec!(50.00))
        );
        assert_eq!(
            convert_between(dec!(1), Currency::Ars, Currency::Usd, dec!(0)),
            None
        );
    }
}
