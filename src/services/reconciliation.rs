//! Storage-free ledger arithmetic for stock transfers.
//!
//! A [`LedgerBook`] holds the levels of every ledger row an operation has
//! locked. Transfers are applied to (and reversed from) the book in memory;
//! the caller then persists [`LedgerBook::changes`] and journals the returned
//! [`Movement`]s inside the same transaction.

use crate::entities::filling_history::TransType;
use crate::errors::ServiceError;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Identity of one stock ledger row. Orders by station, then product, which
/// is also the order rows are locked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LedgerKey {
    pub station_id: i32,
    pub product_id: i32,
}

impl LedgerKey {
    pub fn new(station_id: i32, product_id: i32) -> Self {
        Self {
            station_id,
            product_id,
        }
    }
}

impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "station {} / product {}", self.station_id, self.product_id)
    }
}

/// What one transfer does to the ledger: move `quantity` from `source` to
/// `destination`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferEffect {
    pub source: LedgerKey,
    pub destination: LedgerKey,
    pub quantity: Decimal,
}

impl TransferEffect {
    pub fn keys(&self) -> [LedgerKey; 2] {
        [self.source, self.destination]
    }
}

/// One journaled change to a single ledger row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Movement {
    pub key: LedgerKey,
    pub direction: TransType,
    pub stock_before: Decimal,
    /// Signed: negative for `Outward`, positive for `Inward`.
    pub delta: Decimal,
    pub stock_after: Decimal,
    pub reversal: bool,
}

impl Movement {
    fn new(key: LedgerKey, stock_before: Decimal, stock_after: Decimal, reversal: bool) -> Self {
        let delta = stock_after - stock_before;
        let direction = if delta.is_sign_negative() && !delta.is_zero() {
            TransType::Outward
        } else {
            TransType::Inward
        };
        Self {
            key,
            direction,
            stock_before,
            delta,
            stock_after,
            reversal,
        }
    }

    fn outward(key: LedgerKey, stock_before: Decimal, stock_after: Decimal, reversal: bool) -> Self {
        Self {
            direction: TransType::Outward,
            ..Self::new(key, stock_before, stock_after, reversal)
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    /// Level as loaded; `None` when the row does not exist in storage.
    original: Option<Decimal>,
    stock: Option<Decimal>,
}

/// A row that must be written back after the book was mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelChange {
    pub key: LedgerKey,
    pub stock: Decimal,
    /// False when the row has to be inserted.
    pub existed: bool,
}

/// Working set of locked ledger levels.
#[derive(Debug, Clone, Default)]
pub struct LedgerBook {
    slots: BTreeMap<LedgerKey, Slot>,
}

impl LedgerBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the stored level of `key`; `None` when there is no row.
    pub fn load(&mut self, key: LedgerKey, stock: Option<Decimal>) {
        self.slots.insert(
            key,
            Slot {
                original: stock,
                stock,
            },
        );
    }

    pub fn with_levels<I>(levels: I) -> Self
    where
        I: IntoIterator<Item = (LedgerKey, Option<Decimal>)>,
    {
        let mut book = Self::new();
        for (key, stock) in levels {
            book.load(key, stock);
        }
        book
    }

    pub fn stock(&self, key: LedgerKey) -> Option<Decimal> {
        self.slots.get(&key).and_then(|slot| slot.stock)
    }

    /// Sum of every level in the book. Absent rows count as zero.
    pub fn total(&self) -> Decimal {
        self.slots.values().filter_map(|slot| slot.stock).sum()
    }

    fn slot_mut(&mut self, key: LedgerKey) -> Result<&mut Slot, ServiceError> {
        self.slots.get_mut(&key).ok_or_else(|| {
            ServiceError::InternalError(format!("ledger row {} was not locked", key))
        })
    }

    fn set(&mut self, key: LedgerKey, stock: Decimal) -> Result<(), ServiceError> {
        self.slot_mut(key)?.stock = Some(stock);
        Ok(())
    }

    /// Debits the source and credits the destination.
    ///
    /// Fails without touching the book when the source row is missing or
    /// holds less than `effect.quantity`. Returns the Outward movement at the
    /// source followed by the Inward movement at the destination.
    pub fn apply(&mut self, effect: &TransferEffect) -> Result<[Movement; 2], ServiceError> {
        let source = effect.source;
        let destination = effect.destination;

        let available = self
            .slot_mut(source)?
            .stock
            .ok_or_else(|| ServiceError::NotFound(format!("no stock for source {}", source)))?;
        // The destination must be locked even when it does not exist yet
        self.slot_mut(destination)?;

        if available < effect.quantity {
            return Err(ServiceError::InsufficientStock {
                station_id: source.station_id,
                product_id: source.product_id,
                available,
                required: effect.quantity,
            });
        }

        let new_source = available - effect.quantity;
        self.set(source, new_source)?;

        let dest_before = self.stock(destination).unwrap_or(Decimal::ZERO);
        let new_dest = dest_before + effect.quantity;
        self.set(destination, new_dest)?;

        Ok([
            Movement::outward(source, available, new_source, false),
            Movement::new(destination, dest_before, new_dest, false),
        ])
    }

    /// Undoes a previously applied effect.
    ///
    /// The source is credited in full. The destination is debited but never
    /// below zero, so a destination that has since been drawn down absorbs
    /// only what it still holds. Returns the Inward movement at the source
    /// followed by the Outward movement at the destination; the latter is
    /// omitted when the destination had nothing left to give back.
    pub fn reverse(&mut self, effect: &TransferEffect) -> Result<Vec<Movement>, ServiceError> {
        let source = effect.source;
        let destination = effect.destination;
        self.slot_mut(source)?;
        self.slot_mut(destination)?;

        let source_before = self.stock(source).unwrap_or(Decimal::ZERO);
        let source_after = source_before + effect.quantity;
        self.set(source, source_after)?;

        let mut movements = vec![Movement::new(source, source_before, source_after, true)];

        if let Some(dest_before) = self.stock(destination) {
            let dest_after = (dest_before - effect.quantity).max(Decimal::ZERO);
            if dest_after != dest_before {
                self.set(destination, dest_after)?;
                movements.push(Movement::outward(destination, dest_before, dest_after, true));
            }
        }

        Ok(movements)
    }

    /// Rows whose level differs from what was loaded, in key order.
    pub fn changes(&self) -> Vec<LevelChange> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.stock != slot.original)
            .filter_map(|(key, slot)| {
                slot.stock.map(|stock| LevelChange {
                    key: *key,
                    stock,
                    existed: slot.original.is_some(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use rstest::rstest;

    const A1: LedgerKey = LedgerKey {
        station_id: 1,
        product_id: 1,
    };
    const B1: LedgerKey = LedgerKey {
        station_id: 2,
        product_id: 1,
    };

    fn effect(quantity: Decimal) -> TransferEffect {
        TransferEffect {
            source: A1,
            destination: B1,
            quantity,
        }
    }

    #[test]
    fn apply_moves_stock_and_creates_destination() {
        let mut book = LedgerBook::with_levels([(A1, Some(dec!(100))), (B1, None)]);

        let [out, inward] = book.apply(&effect(dec!(30))).unwrap();

        assert_eq!(book.stock(A1), Some(dec!(70)));
        assert_eq!(book.stock(B1), Some(dec!(30)));
        assert_eq!(book.total(), dec!(100));
        assert_eq!(out.direction, TransType::Outward);
        assert_eq!((out.stock_before, out.delta, out.stock_after), (dec!(100), dec!(-30), dec!(70)));
        assert_eq!(inward.direction, TransType::Inward);
        assert_eq!((inward.stock_before, inward.delta, inward.stock_after), (dec!(0), dec!(30), dec!(30)));

        let changes = book.changes();
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().any(|c| c.key == B1 && !c.existed));
    }

    #[test]
    fn apply_rejects_overdraw_without_mutation() {
        let mut book = LedgerBook::with_levels([(A1, Some(dec!(10))), (B1, Some(dec!(5)))]);

        let err = book.apply(&effect(dec!(30))).unwrap_err();

        assert_matches!(
            err,
            ServiceError::InsufficientStock { available, required, .. }
                if available == dec!(10) && required == dec!(30)
        );
        assert_eq!(book.stock(A1), Some(dec!(10)));
        assert!(book.changes().is_empty());
    }

    #[test]
    fn apply_requires_source_row() {
        let mut book = LedgerBook::with_levels([(A1, None), (B1, None)]);
        assert_matches!(book.apply(&effect(dec!(1))), Err(ServiceError::NotFound(_)));
    }

    #[test]
    fn apply_refuses_unlocked_rows() {
        let mut book = LedgerBook::with_levels([(A1, Some(dec!(10)))]);
        assert_matches!(
            book.apply(&effect(dec!(1))),
            Err(ServiceError::InternalError(_))
        );
        assert_eq!(book.stock(A1), Some(dec!(10)));
    }

    #[test]
    fn reverse_clamps_destination_at_zero() {
        let mut book = LedgerBook::with_levels([(A1, Some(dec!(70))), (B1, Some(dec!(12)))]);

        let movements = book.reverse(&effect(dec!(30))).unwrap();
        let [back_in, back_out] = movements.as_slice() else {
            panic!("expected two movements, got {:?}", movements);
        };

        assert_eq!(book.stock(A1), Some(dec!(100)));
        assert_eq!(book.stock(B1), Some(dec!(0)));
        assert!(back_in.reversal && back_out.reversal);
        assert_eq!(back_in.direction, TransType::Inward);
        assert_eq!(back_out.direction, TransType::Outward);
        assert_eq!(back_out.delta, dec!(-12));
    }

    #[rstest]
    #[case::missing_row(None)]
    #[case::empty_row(Some(dec!(0)))]
    fn reverse_journals_nothing_for_an_empty_destination(#[case] destination: Option<Decimal>) {
        let mut book = LedgerBook::with_levels([(A1, Some(dec!(70))), (B1, destination)]);

        let movements = book.reverse(&effect(dec!(30))).unwrap();

        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].key, A1);
        assert_eq!(movements[0].direction, TransType::Inward);
        assert_eq!(book.stock(B1), destination);
        assert_eq!(book.changes().len(), 1);
    }

    #[test]
    fn reverse_then_apply_same_effect_is_a_no_op() {
        let mut book = LedgerBook::with_levels([(A1, Some(dec!(70))), (B1, Some(dec!(30)))]);

        book.reverse(&effect(dec!(30))).unwrap();
        book.apply(&effect(dec!(30))).unwrap();

        assert_eq!(book.stock(A1), Some(dec!(70)));
        assert_eq!(book.stock(B1), Some(dec!(30)));
        assert!(book.changes().is_empty());
    }
}
