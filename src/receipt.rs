//! Our receipt data model.

use schemars::JsonSchema;

use crate::{money::Money, prelude::*};

/// One purchased product on a receipt.
#[derive(Clone, Debug, PartialEq, Eq, JsonSchema, Serialize)]
pub struct LineItem {
    /// The product name, as printed on the receipt.
    pub name: String,

    /// How many units were bought. May be edited down to zero, but items are
    /// never removed automatically.
    pub quantity: u32,

    /// The price of a single unit.
    pub unit_cost: Money,

    /// `unit_cost * quantity`, rounded to two places. Always recomputed
    /// locally.
    pub line_sum: Money,
}

impl LineItem {
    /// Create a new line item, computing its line sum.
    pub fn new(name: impl Into<String>, quantity: u32, unit_cost: Money) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit_cost,
            line_sum: unit_cost.times(quantity),
        }
    }

    /// Restore `line_sum` after `quantity` changed.
    pub fn recompute(&mut self) {
        self.line_sum = self.unit_cost.times(self.quantity);
    }
}

/// Totals printed on the receipt which we carry through, but never use
/// to check our own arithmetic.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdvisoryTotals {
    /// The total before taxes.
    pub total_sum_no_tax: Option<Money>,

    /// The tax amount.
    pub tax: Option<Money>,

    /// The amount the customer was asked to pay.
    pub amount_due: Option<Money>,
}

/// A digitized receipt.
#[derive(Clone, Debug, PartialEq, Eq, JsonSchema, Serialize)]
pub struct Receipt {
    /// Line items, in the order they appear on the receipt.
    pub items: Vec<LineItem>,

    /// The sum of all `line_sum` values.
    pub total_sum: Money,

    /// The pre-tax total printed on the receipt, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_sum_no_tax: Option<Money>,

    /// The tax printed on the receipt, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax: Option<Money>,

    /// The amount due printed on the receipt, or our own total if the
    /// receipt didn't show one. Only meaningful until the cart is edited.
    pub amount_due: Money,
}

impl Receipt {
    /// Build a receipt from normalized items, computing the total ourselves.
    pub fn from_items(items: Vec<LineItem>, advisory: AdvisoryTotals) -> Self {
        let total_sum = items.iter().map(|item| item.line_sum).sum();
        Self {
            items,
            total_sum,
            total_sum_no_tax: advisory.total_sum_no_tax,
            tax: advisory.tax,
            amount_due: advisory.amount_due.unwrap_or(total_sum),
        }
    }

    /// An empty receipt.
    pub fn empty() -> Self {
        Self::from_items(vec![], AdvisoryTotals::default())
    }

    /// Restore `total_sum` after any item changed.
    pub fn recompute_total(&mut self) {
        self.total_sum = self.items.iter().map(|item| item.line_sum).sum();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn money(s: &str) -> Money {
        s.parse().unwrap()
    }

    #[test]
    fn test_from_items_computes_total() {
        let receipt = Receipt::from_items(
            vec![
                LineItem::new("Milk", 2, money("1.50")),
                LineItem::new("Bread", 1, money("2.25")),
            ],
            AdvisoryTotals::default(),
        );
        assert_eq!(receipt.total_sum, money("5.25"));
        assert_eq!(receipt.amount_due, money("5.25"));
    }

    #[test]
    fn test_advisory_amount_due_is_kept() {
        let receipt = Receipt::from_items(
            vec![LineItem::new("Milk", 1, money("1.50"))],
            AdvisoryTotals {
                amount_due: Some(money("1.00")),
                ..AdvisoryTotals::default()
            },
        );
        assert_eq!(receipt.total_sum, money("1.50"));
        assert_eq!(receipt.amount_due, money("1.00"));
    }

    #[test]
    fn test_serialized_shape() {
        let receipt = Receipt::from_items(
            vec![LineItem::new("Milk", 1, money("1.5"))],
            AdvisoryTotals::default(),
        );
        let value = serde_json::to_value(&receipt).unwrap();
        assert_eq!(
            value,
            json!({
                "items": [{
                    "name": "Milk",
                    "quantity": 1,
                    "unit_cost": "1.50",
                    "line_sum": "1.50",
                }],
                "total_sum": "1.50",
                "amount_due": "1.50",
            })
        );
    }
}
