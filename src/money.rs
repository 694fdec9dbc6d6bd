//! Monetary amounts.
//!
//! Every amount on a receipt is held as a [`Decimal`] with exactly two
//! decimal places. We never touch `f32` or `f64` for money, so repeated cart
//! edits can't accumulate floating-point drift.

use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign},
    str::FromStr,
};

use rust_decimal::{Decimal, RoundingStrategy};
use schemars::{
    JsonSchema,
    r#gen::SchemaGenerator,
    schema::{InstanceType, Metadata, Schema, SchemaObject, StringValidation},
};

/// Number of decimal places we keep for every amount.
const SCALE: u32 = 2;

/// Round a decimal to two places, with midpoints rounded away from zero.
pub fn round2(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(SCALE);
    rounded
}

/// A monetary amount, always rounded to two decimal places.
///
/// Serialized as a string (`"3.00"`) so that amounts survive a JSON round
/// trip exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Money(Decimal);

impl Money {
    /// Zero, as `0.00`.
    pub const ZERO: Money = Money(Decimal::from_parts(0, 0, 0, false, SCALE));

    /// The largest magnitude we accept from outside, 10^12. A unit cost this
    /// size times `u32::MAX` units still fits in a [`Decimal`] many times over.
    pub const MAX_ABS: Money = Money(Decimal::from_parts(276_447_232, 23_283, 0, false, SCALE));

    /// Create an amount, rounding to two places.
    pub fn new(value: Decimal) -> Self {
        Money(round2(value))
    }

    /// Create an amount from a whole number of cents.
    pub fn from_cents(cents: i64) -> Self {
        Money::new(Decimal::new(cents, SCALE))
    }

    /// The underlying decimal value.
    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Multiply by a quantity, rounding the result to two places. Saturates
    /// at [`Decimal::MAX`] instead of panicking.
    pub fn times(&self, quantity: u32) -> Money {
        Money::new(self.0.saturating_mul(Decimal::from(quantity)))
    }

    /// Is this amount within [`Money::MAX_ABS`]?
    pub fn is_in_range(&self) -> bool {
        self.0.abs() <= Money::MAX_ABS.0
    }

    /// Is this amount zero?
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::ZERO
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Money::new(value)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        Money::new(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Money) {
        *self = *self + other;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Money::new(Decimal::from_str(s.trim())?))
    }
}

impl TryFrom<String> for Money {
    type Error = rust_decimal::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Money> for String {
    fn from(value: Money) -> Self {
        value.to_string()
    }
}

impl JsonSchema for Money {
    fn schema_name() -> String {
        "Money".to_owned()
    }

    fn json_schema(_generator: &mut SchemaGenerator) -> Schema {
        SchemaObject {
            instance_type: Some(InstanceType::String.into()),
            metadata: Some(Box::new(Metadata {
                description: Some(
                    "A monetary amount with exactly two decimal places.".to_owned(),
                ),
                ..Default::default()
            })),
            string: Some(Box::new(StringValidation {
                pattern: Some(r"^-?[0-9]+\.[0-9]{2}$".to_owned()),
                ..Default::default()
            })),
            ..Default::default()
        }
        .into()
    }
}
