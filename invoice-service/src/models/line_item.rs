//! Line item model for invoice-service.

use super::text_value;
use crate::totals::{is_truthy, parse_number_or_zero, quantity_field};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One billable row on an invoice.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub unit_price: f64,
}

impl LineItem {
    /// `quantity * unit_price`.
    pub fn amount(&self) -> f64 {
        self.quantity * self.unit_price
    }

    /// Build a line item from an untrusted request value.
    ///
    /// Falsy and non-object entries yield `None`. Numeric fields are coerced
    /// with the totals rules, text fields default to empty strings.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !is_truthy(value) {
            return None;
        }
        let obj = value.as_object()?;

        Some(Self {
            id: text_field(obj.get("id")),
            description: text_field(obj.get("description")),
            quantity: parse_number_or_zero(quantity_field(obj)),
            unit_price: parse_number_or_zero(obj.get("unitPrice").unwrap_or(&Value::Null)),
        })
    }
}

fn text_field(value: Option<&Value>) -> String {
    value.and_then(text_value).unwrap_or_default()
}
