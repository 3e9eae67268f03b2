//! Invoice totals engine.
//!
//! Derives `subtotal`, `tax` and `total` from line items and a tax percent.
//! Input comes straight from untrusted request bodies (JSON or multipart text
//! fields), so every coercion here degrades to a neutral value instead of
//! failing: numbers fall back to `0`, item lists fall back to empty.

use crate::models::LineItem;
use serde::Serialize;
use serde_json::Value;

/// The three derived money fields of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Totals {
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
}

impl Totals {
    fn from_subtotal(subtotal: f64, tax_percent: f64) -> Self {
        let tax = subtotal * tax_percent / 100.0;
        Self {
            subtotal,
            tax,
            total: subtotal + tax,
        }
    }

    /// Totals for already-normalized line items.
    pub fn from_line_items(items: &[LineItem], tax_percent: f64) -> Self {
        let subtotal = items.iter().map(LineItem::amount).sum();
        Self::from_subtotal(subtotal, tax_percent)
    }
}

/// Coerce a loosely-typed value to a finite `f64`.
///
/// Numbers pass through, numeric strings are parsed after trimming. Missing,
/// empty, non-numeric and non-finite values all become `0`.
pub fn parse_number_or_zero(value: &Value) -> f64 {
    let n = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                0.0
            } else {
                s.parse::<f64>().unwrap_or(0.0)
            }
        }
        _ => 0.0,
    };

    if n.is_finite() { n } else { 0.0 }
}

/// Normalize an items field that may be a native array or a JSON-encoded one.
///
/// Strings are deserialized; a string that is not valid JSON, or that decodes
/// to something other than an array, yields an empty list. Any other shape
/// (null, number, object) is also an empty list.
pub fn parse_sequence_or_empty(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(items)) => items,
            Ok(_) => Vec::new(),
            Err(e) => {
                tracing::debug!(error = %e, "Discarding unparseable items field");
                Vec::new()
            }
        },
        _ => Vec::new(),
    }
}

/// `null`, `false`, `0`, and `""` are treated as absent entries.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Look up an item's quantity, accepting the legacy `qty` key.
pub(crate) fn quantity_field(item: &serde_json::Map<String, Value>) -> &Value {
    match item.get("quantity") {
        Some(v) if !v.is_null() => v,
        _ => item.get("qty").unwrap_or(&Value::Null),
    }
}

fn item_amount(item: &Value) -> f64 {
    match item.as_object() {
        Some(obj) => {
            let quantity = parse_number_or_zero(quantity_field(obj));
            let unit_price = parse_number_or_zero(obj.get("unitPrice").unwrap_or(&Value::Null));
            quantity * unit_price
        }
        None => 0.0,
    }
}

/// Compute totals from raw request values.
///
/// `items` must already be a list to contribute; use
/// [`parse_sequence_or_empty`] first when it may arrive JSON-encoded.
pub fn compute_totals(items: &Value, tax_percent: &Value) -> Totals {
    let subtotal = match items {
        Value::Array(items) => items
            .iter()
            .filter(|item| is_truthy(item))
            .map(item_amount)
            .sum(),
        _ => 0.0,
    };

    Totals::from_subtotal(subtotal, parse_number_or_zero(tax_percent))
}

/// Parse, filter and coerce an items field into typed line items.
pub fn normalize_items(value: &Value) -> Vec<LineItem> {
    parse_sequence_or_empty(value)
        .iter()
        .filter_map(LineItem::from_value)
        .collect()
}
