//! Property-based tests for the ledger arithmetic behind stock transfers.
//!
//! The book is driven the same way the service drives it: lock the keys an
//! operation touches, mutate, and write back only when every step succeeded.

use std::collections::BTreeMap;

use fuelops_api::{
    entities::filling_history::TransType,
    errors::ServiceError,
    services::reconciliation::{LedgerBook, LedgerKey, Movement, TransferEffect},
};
use proptest::prelude::*;
use rust_decimal::Decimal;

type Ledger = BTreeMap<LedgerKey, Decimal>;

/// Runs `reverse(old)` (when editing) then `apply(new)` against `ledger`,
/// committing only on success.
fn run(
    ledger: &mut Ledger,
    old: Option<&TransferEffect>,
    new: &TransferEffect,
) -> Result<Vec<Movement>, ServiceError> {
    let keys = old
        .into_iter()
        .flat_map(|e| e.keys())
        .chain(new.keys());
    let mut book = LedgerBook::with_levels(keys.map(|k| (k, ledger.get(&k).copied())));

    let mut movements = Vec::new();
    if let Some(old) = old {
        movements.extend(book.reverse(old)?);
    }
    movements.extend(book.apply(new)?);

    for change in book.changes() {
        ledger.insert(change.key, change.stock);
    }
    Ok(movements)
}

fn total(ledger: &Ledger) -> Decimal {
    ledger.values().copied().sum()
}

fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..200_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn key_strategy() -> impl Strategy<Value = LedgerKey> {
    (1i32..4, 1i32..4).prop_map(|(station, product)| LedgerKey::new(station, product))
}

fn effect_strategy() -> impl Strategy<Value = TransferEffect> {
    (key_strategy(), key_strategy(), quantity_strategy())
        .prop_filter("source and destination differ", |(s, d, _)| s != d)
        .prop_map(|(source, destination, quantity)| TransferEffect {
            source,
            destination,
            quantity,
        })
}

fn ledger_strategy() -> impl Strategy<Value = Ledger> {
    prop::collection::btree_map(key_strategy(), amount_strategy(), 0..9)
}

/// A ledger plus a transfer and its replacement, where both sources hold
/// enough stock for the create and the edit to go through.
fn edit_case_strategy() -> impl Strategy<Value = (Ledger, TransferEffect, TransferEffect)> {
    (
        ledger_strategy(),
        effect_strategy(),
        effect_strategy(),
        amount_strategy(),
    )
        .prop_map(|(mut ledger, original, edited, extra)| {
            let floor = original.quantity + edited.quantity + extra;
            for source in [original.source, edited.source] {
                let stock = ledger.entry(source).or_insert(Decimal::ZERO);
                *stock += floor;
            }
            (ledger, original, edited)
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn create_conserves_the_two_rows_total(
        mut ledger in ledger_strategy(),
        effect in effect_strategy(),
    ) {
        let before = total(&ledger);
        if run(&mut ledger, None, &effect).is_ok() {
            prop_assert_eq!(total(&ledger), before);
        }
    }

    #[test]
    fn stock_never_goes_negative_and_failures_change_nothing(
        mut ledger in ledger_strategy(),
        effects in prop::collection::vec(effect_strategy(), 1..30),
    ) {
        for effect in &effects {
            let snapshot = ledger.clone();
            match run(&mut ledger, None, effect) {
                Ok(_) => {}
                Err(ServiceError::InsufficientStock { available, required, .. }) => {
                    prop_assert!(available < required);
                    prop_assert_eq!(&ledger, &snapshot);
                }
                Err(ServiceError::NotFound(_)) => {
                    prop_assert!(!snapshot.contains_key(&effect.source));
                    prop_assert_eq!(&ledger, &snapshot);
                }
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
            prop_assert!(ledger.values().all(|stock| *stock >= Decimal::ZERO));
        }
    }

    #[test]
    fn repeating_an_edit_is_a_no_op(
        (mut ledger, original, edited) in edit_case_strategy(),
    ) {
        run(&mut ledger, None, &original).expect("seeded source covers the create");
        run(&mut ledger, Some(&original), &edited).expect("seeded source covers the edit");
        let after_first = ledger.clone();

        run(&mut ledger, Some(&edited), &edited).expect("re-applying the same edit succeeds");
        prop_assert_eq!(ledger, after_first);
    }

    #[test]
    fn quantity_edit_equals_one_direct_adjustment(
        extra in amount_strategy(),
        dest_stock in amount_strategy(),
        q1 in quantity_strategy(),
        q2 in quantity_strategy(),
    ) {
        let source_stock = extra + q1.max(q2);
        let source = LedgerKey::new(1, 1);
        let destination = LedgerKey::new(2, 1);
        let mut ledger: Ledger = [(source, source_stock), (destination, dest_stock)].into();

        let original = TransferEffect { source, destination, quantity: q1 };
        let edited = TransferEffect { quantity: q2, ..original };
        run(&mut ledger, None, &original).unwrap();
        let after_create = ledger.clone();
        run(&mut ledger, Some(&original), &edited).unwrap();

        let diff = q2 - q1;
        prop_assert_eq!(ledger[&source], after_create[&source] - diff);
        prop_assert_eq!(ledger[&destination], after_create[&destination] + diff);
    }

    #[test]
    fn applied_movements_are_symmetric(
        mut ledger in ledger_strategy(),
        effect in effect_strategy(),
    ) {
        if let Ok(movements) = run(&mut ledger, None, &effect) {
            prop_assert_eq!(movements.len(), 2);
            let (out, inward) = (&movements[0], &movements[1]);
            prop_assert_eq!(out.direction, TransType::Outward);
            prop_assert_eq!(inward.direction, TransType::Inward);
            prop_assert_eq!(out.delta, -inward.delta);
            prop_assert_eq!(Some(&out.stock_after), ledger.get(&effect.source));
            prop_assert_eq!(Some(&inward.stock_after), ledger.get(&effect.destination));
            for m in &movements {
                prop_assert_eq!(m.stock_after, m.stock_before + m.delta);
                prop_assert!(!m.reversal);
            }
        }
    }
}
