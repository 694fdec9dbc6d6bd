//! Turn raw structuring-service output into a [`Receipt`].
//!
//! The model is asked to emit only JSON in a fixed shape, but nothing forces
//! it to. So we treat its output as untrusted input: we check every field we
//! use, coerce the numeric fields ourselves, and recompute every derived
//! amount rather than trusting the model's arithmetic.

use std::{str::FromStr as _, sync::LazyLock};

use regex::Regex;
use rust_decimal::{Decimal, prelude::ToPrimitive as _};
use serde_json::Map;

use crate::{
    errors::ValidationError,
    money::Money,
    prelude::*,
    receipt::{AdvisoryTotals, LineItem, Receipt},
};

/// Top-level keys we know about.
const RECEIPT_KEYS: &[&str] =
    &["items", "total_sum", "total_sum_no_taxes", "tax_20", "to_pay"];

/// Item keys we know about.
const ITEM_KEYS: &[&str] = &["name", "cost", "sum", "quantity"];

/// Matches a single Markdown code fence wrapping the whole output.
static CODE_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A\s*```[A-Za-z]*\s*\n(.*?)\n?\s*```\s*\z")
        .expect("failed to compile regex")
});

/// Raw text returned by the structuring service. Claimed, but not
/// guaranteed, to be JSON.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawModelOutput(pub String);

impl RawModelOutput {
    /// The raw text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Parse and normalize raw model output into a [`Receipt`].
#[instrument(level = "debug", skip_all)]
pub fn parse(raw: &RawModelOutput) -> Result<Receipt, ValidationError> {
    let text = strip_code_fence(raw.as_str());
    let value = serde_json::from_str::<Value>(text).map_err(|err| {
        ValidationError::MalformedOutput {
            reason: err.to_string(),
        }
    })?;
    trace!(%value, "Parsed model output");

    let obj = match value {
        Value::Object(obj) => obj,
        other => {
            return Err(ValidationError::schema(
                "$",
                format!("expected a JSON object, found {}", json_type_name(&other)),
            ));
        }
    };
    warn_unknown_keys("$", &obj, RECEIPT_KEYS);

    let items = match obj.get("items") {
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(ValidationError::schema(
                "items",
                format!("expected an array, found {}", json_type_name(other)),
            ));
        }
        None => return Err(ValidationError::schema("items", "missing")),
    };
    let items = items
        .iter()
        .enumerate()
        .map(|(idx, item)| parse_item(idx, item))
        .collect::<Result<Vec<_>, _>>()?;

    // We never use the model's total, but it's useful to know when it
    // disagrees with ours.
    let claimed_total = optional_money(&obj, "total_sum", "total_sum")?;
    let advisory = AdvisoryTotals {
        total_sum_no_tax: optional_money(&obj, "total_sum_no_taxes", "total_sum_no_taxes")?,
        tax: optional_money(&obj, "tax_20", "tax_20")?,
        amount_due: optional_money(&obj, "to_pay", "to_pay")?,
    };
    let receipt = Receipt::from_items(items, advisory);
    if let Some(claimed_total) = claimed_total
        && claimed_total != receipt.total_sum
    {
        debug!(
            %claimed_total,
            total_sum = %receipt.total_sum,
            "Model's total disagrees with recomputed total"
        );
    }
    Ok(receipt)
}

/// Parse a single line item.
fn parse_item(idx: usize, value: &Value) -> Result<LineItem, ValidationError> {
    let path = format!("items[{idx}]");
    let Value::Object(obj) = value else {
        return Err(ValidationError::schema(
            path,
            format!("expected an object, found {}", json_type_name(value)),
        ));
    };
    warn_unknown_keys(&path, obj, ITEM_KEYS);

    let name = match obj.get("name") {
        Some(Value::String(name)) => name.trim().to_owned(),
        Some(other) => {
            return Err(ValidationError::schema(
                format!("{path}.name"),
                format!("expected a string, found {}", json_type_name(other)),
            ));
        }
        None => return Err(ValidationError::schema(format!("{path}.name"), "missing")),
    };
    let cost_path = format!("{path}.cost");
    let unit_cost = match obj.get("cost") {
        Some(value) => parse_money(&cost_path, value)?,
        None => return Err(ValidationError::schema(cost_path, "missing")),
    };
    let quantity = normalize_quantity(
        &format!("{path}.quantity"),
        required_decimal(obj, &path, "quantity")?,
    )?;

    let claimed_sum = optional_money(obj, &format!("{path}.sum"), "sum")?;

    let item = LineItem::new(name, quantity, unit_cost);
    if let Some(claimed_sum) = claimed_sum
        && claimed_sum != item.line_sum
    {
        debug!(
            item = %path,
            claimed_sum = %claimed_sum,
            line_sum = %item.line_sum,
            "Model's line sum disagrees with recomputed line sum"
        );
    }
    Ok(item)
}

/// Truncate a quantity to a whole number of units.
fn normalize_quantity(path: &str, quantity: Decimal) -> Result<u32, ValidationError> {
    let whole = quantity.trunc();
    if whole.is_zero() {
        return Ok(0);
    }
    if whole.is_sign_negative() {
        return Err(ValidationError::schema(
            path,
            format!("quantity may not be negative: {quantity}"),
        ));
    }
    whole
        .to_u32()
        .ok_or_else(|| ValidationError::schema(path, format!("quantity too large: {quantity}")))
}

/// Look up a numeric field which must be present.
fn required_decimal(
    obj: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<Decimal, ValidationError> {
    let path = format!("{path}.{key}");
    match obj.get(key) {
        Some(value) => parse_decimal(&path, value),
        None => Err(ValidationError::schema(path, "missing")),
    }
}

/// Look up a monetary field which may be absent or `null`.
fn optional_money(
    obj: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<Option<Money>, ValidationError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => Ok(Some(parse_money(path, value)?)),
    }
}

/// Parse a monetary amount, rejecting anything too large to do arithmetic
/// with safely.
fn parse_money(path: &str, value: &Value) -> Result<Money, ValidationError> {
    let money = Money::new(parse_decimal(path, value)?);
    if !money.is_in_range() {
        return Err(ValidationError::schema(
            path,
            format!("amount too large: {money} exceeds {}", Money::MAX_ABS),
        ));
    }
    Ok(money)
}

/// Parse a JSON number, or a string containing a number, as a decimal.
///
/// Models drift between `1.5`, `"1.5"` and `"1,50"` from one run to the
/// next, so we accept all of them.
fn parse_decimal(path: &str, value: &Value) -> Result<Decimal, ValidationError> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => normalize_number_text(s),
        other => {
            return Err(ValidationError::schema(
                path,
                format!("expected a number, found {}", json_type_name(other)),
            ));
        }
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| {
            ValidationError::schema(path, format!("not a decimal number: {value}"))
        })
}

/// Normalize decimal separators in a numeric string.
fn normalize_number_text(s: &str) -> String {
    let s = s.trim();
    match (s.contains('.'), s.matches(',').count()) {
        // "1,234.50"
        (true, n) if n > 0 => s.replace(',', ""),
        // "1,50"
        (false, 1) => s.replace(',', "."),
        _ => s.to_owned(),
    }
}

/// Remove a Markdown code fence wrapped around the whole output, if any.
fn strip_code_fence(text: &str) -> &str {
    match CODE_FENCE_RE.captures(text).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str(),
        None => text,
    }
}

/// Log any keys we weren't expecting.
fn warn_unknown_keys(path: &str, obj: &Map<String, Value>, known: &[&str]) {
    for key in obj.keys().filter(|key| !known.contains(&key.as_str())) {
        debug!(%path, %key, "Ignoring unexpected key in model output");
    }
}

/// A short name for the type of a JSON value, for error messages.
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(s: &str) -> RawModelOutput {
        RawModelOutput(s.to_owned())
    }

    fn money(s: &str) -> Money {
        s.parse().unwrap()
    }

    fn schema_path(err: ValidationError) -> String {
        match err {
            ValidationError::Schema { path, .. } => path,
            other => panic!("expected a schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_not_json_is_malformed() {
        let err = parse(&raw("not json")).unwrap_err();
        assert!(matches!(err, ValidationError::MalformedOutput { .. }));
    }

    #[test]
    fn test_truncated_json_is_malformed() {
        let err = parse(&raw(r#"{"items":[{"name":"Milk","cost":"1.50""#)).unwrap_err();
        assert!(matches!(err, ValidationError::MalformedOutput { .. }));
    }

    #[test]
    fn test_surrounding_prose_is_malformed() {
        let err = parse(&raw(r#"Here is your receipt: {"items": []}"#)).unwrap_err();
        assert!(matches!(err, ValidationError::MalformedOutput { .. }));
    }

    #[test]
    fn test_model_sums_are_recomputed() {
        let receipt = parse(&raw(
            r#"{"items":[{"name":"Milk","cost":"1.50","quantity":"2","sum":"999.00"}],"total_sum":"1.00"}"#,
        ))
        .unwrap();
        assert_eq!(receipt.items.len(), 1);
        assert_eq!(receipt.items[0].name, "Milk");
        assert_eq!(receipt.items[0].quantity, 2);
        assert_eq!(receipt.items[0].unit_cost, money("1.50"));
        assert_eq!(receipt.items[0].line_sum, money("3.00"));
        assert_eq!(receipt.total_sum, money("3.00"));
    }

    #[test]
    fn test_code_fence_is_stripped() {
        let receipt = parse(&raw(
            "```json\n{\"items\":[{\"name\":\"Tea\",\"cost\":2,\"quantity\":1}]}\n```",
        ))
        .unwrap();
        assert_eq!(receipt.total_sum, money("2.00"));
    }

    #[test]
    fn test_numeric_coercions() {
        let receipt = parse(&raw(
            r#"{"items":[
                {"name":" Apples ","cost":"0,99","quantity":3},
                {"name":"Cheese","cost":12.345,"quantity":"2.7"},
                {"name":"TV","cost":"1,299.00","quantity":1.0}
            ]}"#,
        ))
        .unwrap();
        let items = &receipt.items;
        assert_eq!(items[0].name, "Apples");
        assert_eq!(items[0].line_sum, money("2.97"));
        assert_eq!(items[1].quantity, 2);
        assert_eq!(items[1].unit_cost, money("12.35"));
        assert_eq!(items[1].line_sum, money("24.70"));
        assert_eq!(items[2].unit_cost, money("1299.00"));
        assert_eq!(receipt.total_sum, money("1326.67"));
    }

    #[test]
    fn test_advisory_fields_are_carried_through() {
        let receipt = parse(&raw(
            r#"{"items":[{"name":"Milk","cost":"1.50","quantity":1}],
                "total_sum_no_taxes":"1.25","tax_20":"0.25","to_pay":"1.60"}"#,
        ))
        .unwrap();
        assert_eq!(receipt.total_sum, money("1.50"));
        assert_eq!(receipt.total_sum_no_tax, Some(money("1.25")));
        assert_eq!(receipt.tax, Some(money("0.25")));
        assert_eq!(receipt.amount_due, money("1.60"));
    }

    #[test]
    fn test_null_advisory_fields_are_absent() {
        let receipt = parse(&raw(
            r#"{"items":[{"name":"Milk","cost":"1.50","quantity":1}],"tax_20":null}"#,
        ))
        .unwrap();
        assert_eq!(receipt.tax, None);
        assert_eq!(receipt.amount_due, money("1.50"));
    }

    #[test]
    fn test_empty_items_is_an_empty_receipt() {
        let receipt = parse(&raw(r#"{"items":[]}"#)).unwrap();
        assert!(receipt.items.is_empty());
        assert_eq!(
            serde_json::to_value(&receipt).unwrap(),
            json!({ "items": [], "total_sum": "0.00", "amount_due": "0.00" })
        );
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let receipt = parse(&raw(
            r#"{"items":[{"name":"Milk","cost":1,"quantity":1,"sku":"X"}],"store":"Acme"}"#,
        ))
        .unwrap();
        assert_eq!(receipt.items.len(), 1);
    }

    #[test]
    fn test_schema_violations() {
        let cases = [
            (r#"[1, 2]"#, "$"),
            (r#"{"total_sum": "1.00"}"#, "items"),
            (r#"{"items": {"name": "Milk"}}"#, "items"),
            (r#"{"items": ["Milk"]}"#, "items[0]"),
            (r#"{"items": [{"cost": 1, "quantity": 1}]}"#, "items[0].name"),
            (r#"{"items": [{"name": 7, "cost": 1, "quantity": 1}]}"#, "items[0].name"),
            (r#"{"items": [{"name": "Milk", "quantity": 1}]}"#, "items[0].cost"),
            (r#"{"items": [{"name": "Milk", "cost": 1}]}"#, "items[0].quantity"),
            (
                r#"{"items": [{"name": "Milk", "cost": "cheap", "quantity": 1}]}"#,
                "items[0].cost",
            ),
            (
                r#"{"items": [{"name": "Milk", "cost": null, "quantity": 1}]}"#,
                "items[0].cost",
            ),
            (
                r#"{"items": [{"name": "Milk", "cost": 1, "quantity": "-2"}]}"#,
                "items[0].quantity",
            ),
            (
                r#"{"items": [{"name": "Milk", "cost": 1, "quantity": 1e12}]}"#,
                "items[0].quantity",
            ),
            (
                r#"{"items": [{"name": "A", "cost": 1, "quantity": 1},
                              {"name": "B", "cost": 1, "quantity": true}]}"#,
                "items[1].quantity",
            ),
            (
                r#"{"items": [], "to_pay": "a lot"}"#,
                "to_pay",
            ),
            (
                r#"{"items": [{"name": "Milk", "cost": 1, "quantity": 1, "sum": "lots"}]}"#,
                "items[0].sum",
            ),
            (
                r#"{"items": [{"name": "Milk", "cost": 1, "quantity": 1, "sum": [1]}]}"#,
                "items[0].sum",
            ),
            (
                r#"{"items": [], "total_sum": "lots"}"#,
                "total_sum",
            ),
        ];
        for (input, expected_path) in cases {
            let err = parse(&raw(input)).unwrap_err();
            assert_eq!(schema_path(err), expected_path, "input: {input}");
        }
    }

    #[test]
    fn test_null_item_sum_is_fine() {
        let receipt = parse(&raw(
            r#"{"items":[{"name":"Milk","cost":"1.50","quantity":2,"sum":null}]}"#,
        ))
        .unwrap();
        assert_eq!(receipt.items[0].line_sum, money("3.00"));
    }

    #[test]
    fn test_huge_amounts_are_schema_errors() {
        let cases = [
            (
                r#"{"items":[{"name":"X","cost":"79228162514264337593543950335","quantity":2}]}"#,
                "items[0].cost",
            ),
            (
                r#"{"items":[{"name":"A","cost":"5e28","quantity":1},
                             {"name":"B","cost":"5e28","quantity":1}]}"#,
                "items[0].cost",
            ),
            (
                r#"{"items":[{"name":"X","cost":"-1000000000000.01","quantity":1}]}"#,
                "items[0].cost",
            ),
            (
                r#"{"items":[{"name":"X","cost":1,"quantity":1,"sum":1e20}]}"#,
                "items[0].sum",
            ),
            (r#"{"items":[],"to_pay":"1e15"}"#, "to_pay"),
        ];
        for (input, expected_path) in cases {
            let err = parse(&raw(input)).unwrap_err();
            assert_eq!(schema_path(err), expected_path, "input: {input}");
        }
    }

    #[test]
    fn test_largest_amounts_do_not_overflow() {
        let receipt = parse(&raw(
            r#"{"items":[{"name":"A","cost":"1000000000000","quantity":4294967295},
                         {"name":"B","cost":"1000000000000","quantity":4294967295}]}"#,
        ))
        .unwrap();
        assert_eq!(receipt.items[0].line_sum, money("4294967295000000000000.00"));
        assert_eq!(receipt.total_sum, money("8589934590000000000000.00"));
    }

    #[test]
    fn test_fractional_negative_quantity_truncates_to_zero() {
        let receipt =
            parse(&raw(r#"{"items":[{"name":"Milk","cost":1,"quantity":-0.5}]}"#)).unwrap();
        assert_eq!(receipt.items[0].quantity, 0);
    }
}
