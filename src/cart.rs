//! An editable cart built from a digitized receipt.
//!
//! Once the user starts changing quantities, the totals printed on the
//! receipt no longer apply. From then on the cart's own recomputed total is
//! the only one that matters.

use crate::{
    errors::IndexError,
    money::Money,
    prelude::*,
    receipt::{LineItem, Receipt},
};

/// The current receipt's line items and total, with quantity editing.
#[derive(Clone, Debug)]
pub struct CartModel {
    receipt: Receipt,
}

impl Default for CartModel {
    fn default() -> Self {
        Self {
            receipt: Receipt::empty(),
        }
    }
}

impl CartModel {
    /// Create an empty cart.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cart's contents with a new receipt.
    ///
    /// We recompute every line sum and the total on the way in, so the cart's
    /// invariants hold even for a receipt that was built by hand.
    pub fn load(&mut self, mut receipt: Receipt) {
        for item in &mut receipt.items {
            item.recompute();
        }
        receipt.recompute_total();
        debug!(
            items = receipt.items.len(),
            total_sum = %receipt.total_sum,
            "Loaded receipt into cart"
        );
        self.receipt = receipt;
    }

    /// Empty the cart.
    pub fn clear(&mut self) {
        self.receipt = Receipt::empty();
    }

    /// Add one unit to an item.
    pub fn increment_quantity(&mut self, index: usize) -> Result<&LineItem, IndexError> {
        self.edit_quantity(index, |quantity| quantity.saturating_add(1))
    }

    /// Remove one unit from an item. Quantities stop at zero, and the item
    /// stays in the cart.
    pub fn decrement_quantity(&mut self, index: usize) -> Result<&LineItem, IndexError> {
        self.edit_quantity(index, |quantity| quantity.saturating_sub(1))
    }

    /// Add `delta` units to an item, or remove them if `delta` is negative.
    /// The quantity is clamped to `0..=u32::MAX`.
    pub fn adjust_quantity(
        &mut self,
        index: usize,
        delta: i64,
    ) -> Result<&LineItem, IndexError> {
        self.edit_quantity(index, |quantity| {
            let adjusted = i64::from(quantity).saturating_add(delta);
            u32::try_from(adjusted.max(0)).unwrap_or(u32::MAX)
        })
    }

    /// Change an item's quantity, and restore our invariants.
    fn edit_quantity(
        &mut self,
        index: usize,
        f: impl FnOnce(u32) -> u32,
    ) -> Result<&LineItem, IndexError> {
        let len = self.receipt.items.len();
        let item = self
            .receipt
            .items
            .get_mut(index)
            .ok_or(IndexError { index, len })?;
        item.quantity = f(item.quantity);
        item.recompute();
        trace!(index, quantity = item.quantity, line_sum = %item.line_sum, "Edited item");
        self.receipt.recompute_total();
        Ok(&self.receipt.items[index])
    }

    /// The full receipt, including any advisory totals.
    pub fn receipt(&self) -> &Receipt {
        &self.receipt
    }

    /// Line items, in receipt order.
    pub fn items(&self) -> &[LineItem] {
        &self.receipt.items
    }

    /// The recomputed total of all line sums.
    pub fn total_sum(&self) -> Money {
        self.receipt.total_sum
    }

    /// Does the cart have no items?
    pub fn is_empty(&self) -> bool {
        self.receipt.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use crate::receipt::AdvisoryTotals;

    use super::*;

    fn money(s: &str) -> Money {
        s.parse().unwrap()
    }

    fn sample_cart() -> CartModel {
        let mut cart = CartModel::new();
        cart.load(Receipt::from_items(
            vec![
                LineItem::new("Milk", 2, money("1.50")),
                LineItem::new("Eggs", 1, money("0.33")),
                LineItem::new("Bread", 0, money("2.10")),
            ],
            AdvisoryTotals::default(),
        ));
        cart
    }

    /// Check every invariant the cart promises.
    fn assert_invariants(cart: &CartModel) {
        for item in cart.items() {
            assert_eq!(item.line_sum, item.unit_cost.times(item.quantity));
        }
        let sum: Money = cart.items().iter().map(|item| item.line_sum).sum();
        assert_eq!(cart.total_sum(), sum);
    }

    #[test]
    fn test_load_computes_total() {
        let cart = sample_cart();
        assert_eq!(cart.total_sum(), money("3.33"));
        assert_invariants(&cart);
    }

    #[test]
    fn test_load_repairs_stale_sums() {
        let mut receipt = Receipt::from_items(
            vec![LineItem::new("Milk", 1, money("1.50"))],
            AdvisoryTotals::default(),
        );
        receipt.items[0].line_sum = money("999.00");
        receipt.total_sum = money("1.00");
        let mut cart = CartModel::new();
        cart.load(receipt);
        assert_eq!(cart.total_sum(), money("1.50"));
        assert_invariants(&cart);
    }

    #[test]
    fn test_increment_and_decrement() {
        let mut cart = sample_cart();
        let item = cart.increment_quantity(1).unwrap();
        assert_eq!(item.quantity, 2);
        assert_eq!(item.line_sum, money("0.66"));
        assert_eq!(cart.total_sum(), money("3.66"));

        let item = cart.decrement_quantity(0).unwrap();
        assert_eq!(item.quantity, 1);
        assert_eq!(cart.total_sum(), money("2.16"));
        assert_invariants(&cart);
    }

    #[test]
    fn test_decrement_floors_at_zero() {
        let mut cart = sample_cart();
        let item = cart.decrement_quantity(2).unwrap();
        assert_eq!(item.quantity, 0);
        assert!(item.line_sum.is_zero());
        assert_eq!(cart.items().len(), 3);
        assert_eq!(cart.total_sum(), money("3.33"));
    }

    #[test]
    fn test_adjust_quantity_clamps() {
        let mut cart = sample_cart();
        assert_eq!(cart.adjust_quantity(0, 3).unwrap().quantity, 5);
        assert_eq!(cart.adjust_quantity(0, -2).unwrap().quantity, 3);
        assert_eq!(cart.adjust_quantity(0, i64::MIN).unwrap().quantity, 0);
        assert_invariants(&cart);

        let item = cart.adjust_quantity(1, i64::MAX).unwrap();
        assert_eq!(item.quantity, u32::MAX);
        assert_eq!(item.line_sum, money("1417339207.35"));
        assert_eq!(cart.increment_quantity(1).unwrap().quantity, u32::MAX);
        assert_invariants(&cart);

        assert!(cart.adjust_quantity(3, 1).is_err());
    }

    #[test]
    fn test_out_of_bounds_is_an_error() {
        let mut cart = sample_cart();
        let before = cart.receipt().clone();
        assert_eq!(
            cart.increment_quantity(3).unwrap_err(),
            IndexError { index: 3, len: 3 }
        );
        assert_eq!(
            cart.decrement_quantity(usize::MAX).unwrap_err(),
            IndexError {
                index: usize::MAX,
                len: 3
            }
        );
        assert_eq!(cart.receipt(), &before);
        assert!(CartModel::new().increment_quantity(0).is_err());
    }

    #[test]
    fn test_invariants_hold_across_edit_sequences() {
        let mut cart = sample_cart();
        // A fixed but irregular walk over the items.
        let ops = [
            (0, true),
            (2, false),
            (1, true),
            (1, true),
            (0, false),
            (0, false),
            (0, false),
            (2, true),
            (1, false),
            (2, true),
            (0, true),
        ];
        for _ in 0..50 {
            for &(index, up) in &ops {
                if up {
                    cart.increment_quantity(index).unwrap();
                } else {
                    cart.decrement_quantity(index).unwrap();
                }
                assert_invariants(&cart);
            }
        }
    }

    #[test]
    fn test_clear_empties_cart() {
        let mut cart = sample_cart();
        cart.clear();
        assert!(cart.is_empty());
        assert!(cart.total_sum().is_zero());
    }
}
