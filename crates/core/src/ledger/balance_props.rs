//! Property-based tests for balance projection.

use proptest::prelude::*;
use rust_decimal::Decimal;
use tesoro_shared::types::{AgencyId, Currency};

use super::balance::project;
use super::types::{LedgerMovement, MovementType};
use crate::testing::movement;

fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn movement_type() -> impl Strategy<Value = MovementType> {
    prop_oneof![
        Just(MovementType::Income),
        Just(MovementType::Expense),
        Just(MovementType::FxGain),
        Just(MovementType::FxLoss),
        Just(MovementType::Commission),
        Just(MovementType::OperatorPayment),
        Just(MovementType::PartnerWithdrawal),
    ]
}

fn movements() -> impl Strategy<Value = Vec<LedgerMovement>> {
    let agency = AgencyId::new();
    prop::collection::vec((movement_type(), positive_amount()), 0..40).prop_map(move |items| {
        items
            .into_iter()
            .map(|(kind, amount)| movement(agency, kind, Currency::Ars, amount))
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// The fold equals initial plus inflows minus outflows.
    #[test]
    fn prop_projection_matches_signed_sum(
        initial in positive_amount(),
        items in movements(),
    ) {
        let expected = items.iter().fold(initial, |acc, m| {
            if matches!(m.movement_type, MovementType::Income | MovementType::FxGain) {
                acc + m.amount_original
            } else {
                acc - m.amount_original
            }
        });
        prop_assert_eq!(project(initial, Currency::Ars, &items, None), expected);
    }

    /// Storage order never changes the balance.
    #[test]
    fn prop_projection_is_order_independent(
        initial in positive_amount(),
        (items, shuffled) in movements().prop_flat_map(|items| {
            let shuffled = Just(items.clone()).prop_shuffle();
            (Just(items), shuffled)
        }),
    ) {
        prop_assert_eq!(
            project(initial, Currency::Ars, &items, None),
            project(initial, Currency::Ars, &shuffled, None)
        );
    }
}
