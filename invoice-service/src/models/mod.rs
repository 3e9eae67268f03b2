pub mod business_profile;
pub mod invoice;
pub mod line_item;

pub use business_profile::{BusinessProfile, BusinessProfileFields};
pub use invoice::{
    BrandingUploads, Client, Invoice, InvoiceDefaults, InvoiceFields, InvoiceKey, InvoiceStatus,
};
pub use line_item::LineItem;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Text form of a scalar request value.
///
/// Numbers and booleans are cast to their string form. Null, arrays and
/// objects have no text form.
pub fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Deserialize an optional text field without rejecting non-string scalars.
pub(crate) fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(|v| text_value(&v))
}

/// Keep a field raw, marking it as present even when it is `null`.
pub(crate) fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}
