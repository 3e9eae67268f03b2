//! Invoice model for invoice-service.

use super::{lenient_text, present, text_value, LineItem};
use crate::totals::{normalize_items, parse_number_or_zero, Totals};
use chrono::{DateTime, Utc};
use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use service_core::error::AppError;
use uuid::Uuid;

/// Invoice status.
///
/// Any status may be set from any other; there is no transition graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Unpaid,
    Paid,
    Overdue,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Unpaid => "unpaid",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
        }
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(InvoiceStatus::Draft),
            "unpaid" => Ok(InvoiceStatus::Unpaid),
            "paid" => Ok(InvoiceStatus::Paid),
            "overdue" => Ok(InvoiceStatus::Overdue),
            _ => Err(format!("Invalid invoice status: {}", s)),
        }
    }
}

/// Parse an optional status; blank means "not supplied".
pub fn parse_status(raw: Option<&str>) -> Result<Option<InvoiceStatus>, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|e: String| AppError::BadRequest(anyhow::anyhow!(e))),
    }
}

/// Billed party.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Client {
    pub name: String,
    pub email: String,
    pub address: String,
    pub phone: String,
}

impl Client {
    /// Accepts an object, or an object encoded as a JSON string (multipart
    /// forms). Anything else is an empty client.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(obj) => {
                let text = |key: &str| obj.get(key).and_then(text_value).unwrap_or_default();
                Self {
                    name: text("name"),
                    email: text("email"),
                    address: text("address"),
                    phone: text("phone"),
                }
            }
            Value::String(raw) => serde_json::from_str::<Value>(raw)
                .ok()
                .filter(Value::is_object)
                .map(|v| Self::from_value(&v))
                .unwrap_or_default(),
            _ => Self::default(),
        }
    }
}

/// Deployment policy for fields a new invoice does not specify.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceDefaults {
    pub currency: String,
    pub status: InvoiceStatus,
    pub tax_percent: f64,
}

impl Default for InvoiceDefaults {
    fn default() -> Self {
        Self {
            currency: "INR".to_string(),
            status: InvoiceStatus::Draft,
            tax_percent: 18.0,
        }
    }
}

/// Public URLs of branding assets uploaded with a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrandingUploads {
    pub logo: Option<String>,
    pub stamp: Option<String>,
    pub signature: Option<String>,
}

/// How a path segment addresses an invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoiceKey {
    Id(String),
    Number(String),
}

impl InvoiceKey {
    /// UUIDs address the document id, anything else the invoice number.
    pub fn parse(raw: &str) -> Self {
        match Uuid::parse_str(raw) {
            Ok(id) => InvoiceKey::Id(id.to_string()),
            Err(_) => InvoiceKey::Number(raw.to_string()),
        }
    }

    pub fn matches(&self, invoice: &Invoice) -> bool {
        match self {
            InvoiceKey::Id(id) => invoice.id == *id,
            InvoiceKey::Number(number) => invoice.invoice_number == *number,
        }
    }

    pub fn filter(&self) -> Document {
        match self {
            InvoiceKey::Id(id) => doc! { "_id": id.as_str() },
            InvoiceKey::Number(number) => doc! { "invoice_number": number.as_str() },
        }
    }
}

/// Client-supplied invoice fields for create and update.
///
/// Derived totals, `owner` and ids are not part of this type, so any such keys
/// in a request body are dropped during deserialization. Items, tax percent
/// and client stay raw so they can be coerced leniently; numeric or boolean
/// values in text fields are cast to strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceFields {
    #[serde(default, deserialize_with = "lenient_text")]
    pub invoice_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub issue_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub due_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub from_business_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub from_email: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub from_address: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub from_phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub from_gst: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub client: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub items: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub tax_percent: Option<Value>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub logo_data_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub stamp_data_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub signature_data_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub signature_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub signature_title: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub notes: Option<String>,
}

impl InvoiceFields {
    pub fn from_map(map: Map<String, Value>) -> Result<Self, AppError> {
        serde_json::from_value(Value::Object(map))
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid invoice payload: {}", e)))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Invoice document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(rename = "_id")]
    pub id: String,
    pub owner: String,
    pub invoice_number: String,
    pub issue_date: String,
    pub due_date: String,
    pub from_business_name: String,
    pub from_email: String,
    pub from_address: String,
    pub from_phone: String,
    pub from_gst: String,
    pub client: Client,
    pub items: Vec<LineItem>,
    pub currency: String,
    pub status: InvoiceStatus,
    pub tax_percent: f64,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    pub logo_data_url: Option<String>,
    pub stamp_data_url: Option<String>,
    pub signature_data_url: Option<String>,
    pub signature_name: String,
    pub signature_title: String,
    pub notes: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Build a new invoice owned by `owner`.
    ///
    /// Missing number, issue date, currency, status and tax percent come from
    /// `defaults`; a tax percent that is present but unusable coerces to `0`.
    pub fn create(
        owner: &str,
        fields: InvoiceFields,
        uploads: BrandingUploads,
        defaults: &InvoiceDefaults,
        now: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        let status = parse_status(fields.status.as_deref())?.unwrap_or(defaults.status);
        let tax_percent = fields
            .tax_percent
            .as_ref()
            .map(parse_number_or_zero)
            .unwrap_or(defaults.tax_percent);

        let mut invoice = Self {
            id: Uuid::new_v4().to_string(),
            owner: owner.to_string(),
            invoice_number: non_blank(fields.invoice_number)
                .unwrap_or_else(|| format!("INV-{}", now.timestamp_millis())),
            issue_date: non_blank(fields.issue_date)
                .unwrap_or_else(|| now.format("%Y-%m-%d").to_string()),
            due_date: fields.due_date.unwrap_or_default(),
            from_business_name: fields.from_business_name.unwrap_or_default(),
            from_email: fields.from_email.unwrap_or_default(),
            from_address: fields.from_address.unwrap_or_default(),
            from_phone: fields.from_phone.unwrap_or_default(),
            from_gst: fields.from_gst.unwrap_or_default(),
            client: fields
                .client
                .as_ref()
                .map(Client::from_value)
                .unwrap_or_default(),
            items: fields
                .items
                .as_ref()
                .map(normalize_items)
                .unwrap_or_default(),
            currency: non_blank(fields.currency).unwrap_or_else(|| defaults.currency.clone()),
            status,
            tax_percent,
            subtotal: 0.0,
            tax: 0.0,
            total: 0.0,
            logo_data_url: uploads.logo.or(fields.logo_data_url),
            stamp_data_url: uploads.stamp.or(fields.stamp_data_url),
            signature_data_url: uploads.signature.or(fields.signature_data_url),
            signature_name: fields.signature_name.unwrap_or_default(),
            signature_title: fields.signature_title.unwrap_or_default(),
            notes: fields.notes.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        invoice.recompute_totals();

        Ok(invoice)
    }

    /// Merge `fields` into this invoice, then recompute totals from the merged
    /// items and tax percent.
    pub fn apply_patch(
        &mut self,
        fields: InvoiceFields,
        uploads: BrandingUploads,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if let Some(status) = parse_status(fields.status.as_deref())? {
            self.status = status;
        }
        if let Some(number) = non_blank(fields.invoice_number) {
            self.invoice_number = number;
        }
        if let Some(currency) = non_blank(fields.currency) {
            self.currency = currency;
        }

        let assign = |target: &mut String, value: Option<String>| {
            if let Some(v) = value {
                *target = v;
            }
        };
        assign(&mut self.issue_date, fields.issue_date);
        assign(&mut self.due_date, fields.due_date);
        assign(&mut self.from_business_name, fields.from_business_name);
        assign(&mut self.from_email, fields.from_email);
        assign(&mut self.from_address, fields.from_address);
        assign(&mut self.from_phone, fields.from_phone);
        assign(&mut self.from_gst, fields.from_gst);
        assign(&mut self.signature_name, fields.signature_name);
        assign(&mut self.signature_title, fields.signature_title);
        assign(&mut self.notes, fields.notes);

        if let Some(client) = &fields.client {
            self.client = Client::from_value(client);
        }
        if let Some(items) = &fields.items {
            self.items = normalize_items(items);
        }
        if let Some(tax_percent) = &fields.tax_percent {
            self.tax_percent = parse_number_or_zero(tax_percent);
        }

        if let Some(url) = uploads.logo.or(fields.logo_data_url) {
            self.logo_data_url = Some(url);
        }
        if let Some(url) = uploads.stamp.or(fields.stamp_data_url) {
            self.stamp_data_url = Some(url);
        }
        if let Some(url) = uploads.signature.or(fields.signature_data_url) {
            self.signature_data_url = Some(url);
        }

        self.recompute_totals();
        self.updated_at = now;
        Ok(())
    }

    /// Overwrite the derived fields from the current items and tax percent.
    pub fn recompute_totals(&mut self) {
        let totals = Totals::from_line_items(&self.items, self.tax_percent);
        self.subtotal = totals.subtotal;
        self.tax = totals.tax;
        self.total = totals.total;
    }

    pub fn totals(&self) -> Totals {
        Totals {
            subtotal: self.subtotal,
            tax: self.tax,
            total: self.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> InvoiceFields {
        match value {
            Value::Object(map) => InvoiceFields::from_map(map).unwrap(),
            _ => panic!("expected object"),
        }
    }

    fn new_invoice(value: Value) -> Invoice {
        Invoice::create(
            "user_1",
            fields(value),
            BrandingUploads::default(),
            &InvoiceDefaults::default(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn create_applies_defaults() {
        let now = Utc::now();
        let invoice = Invoice::create(
            "user_1",
            InvoiceFields::default(),
            BrandingUploads::default(),
            &InvoiceDefaults::default(),
            now,
        )
        .unwrap();

        assert_eq!(invoice.owner, "user_1");
        assert_eq!(invoice.invoice_number, format!("INV-{}", now.timestamp_millis()));
        assert_eq!(invoice.issue_date, now.format("%Y-%m-%d").to_string());
        assert_eq!(invoice.currency, "INR");
        assert_eq!(invoice.status, InvoiceStatus::Draft);
        assert_eq!(invoice.tax_percent, 18.0);
        assert!(invoice.items.is_empty());
        assert_eq!(invoice.totals(), Totals::default());
    }

    #[test]
    fn create_ignores_client_supplied_totals() {
        let invoice = new_invoice(json!({
            "items": [{"quantity": 3, "unitPrice": 100}, {"quantity": 1, "unitPrice": 50}],
            "taxPercent": 18,
            "subtotal": 1,
            "tax": 2,
            "total": 3,
            "owner": "someone_else"
        }));

        assert_eq!(invoice.owner, "user_1");
        assert_eq!(invoice.subtotal, 350.0);
        assert_eq!(invoice.tax, 63.0);
        assert_eq!(invoice.total, 413.0);
    }

    #[test]
    fn create_accepts_form_encoded_values() {
        let invoice = new_invoice(json!({
            "items": "[{\"id\":\"1\",\"description\":\"Audit\",\"qty\":\"2\",\"unitPrice\":\"250\"}]",
            "taxPercent": "10",
            "client": "{\"name\":\"Acme\",\"email\":\"ap@acme.test\"}",
            "status": "unpaid"
        }));

        assert_eq!(invoice.items.len(), 1);
        assert_eq!(invoice.items[0].description, "Audit");
        assert_eq!(invoice.client.name, "Acme");
        assert_eq!(invoice.status, InvoiceStatus::Unpaid);
        assert_eq!(invoice.total, 550.0);
    }

    #[test]
    fn scalar_text_fields_are_cast_to_strings() {
        let invoice = new_invoice(json!({
            "invoiceNumber": 1001,
            "fromPhone": 9876543210u64,
            "notes": true,
            "fromGst": {"nested": "ignored"},
            "client": {"name": "Acme", "phone": 5550100},
            "items": [{"qty": 1, "unitPrice": 10}]
        }));

        assert_eq!(invoice.invoice_number, "1001");
        assert_eq!(invoice.from_phone, "9876543210");
        assert_eq!(invoice.notes, "true");
        assert_eq!(invoice.from_gst, "");
        assert_eq!(invoice.client.phone, "5550100");
        assert_eq!(invoice.subtotal, 10.0);
    }

    #[test]
    fn present_but_malformed_tax_percent_is_zero() {
        let invoice = new_invoice(json!({
            "items": [{"quantity": 1, "unitPrice": 100}],
            "taxPercent": "lots"
        }));
        assert_eq!(invoice.tax_percent, 0.0);
        assert_eq!(invoice.total, 100.0);
    }

    #[test]
    fn unknown_status_is_rejected() {
        let result = Invoice::create(
            "user_1",
            fields(json!({"status": "cancelled"})),
            BrandingUploads::default(),
            &InvoiceDefaults::default(),
            Utc::now(),
        );
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn patch_recomputes_from_merged_state() {
        let mut invoice = new_invoice(json!({
            "items": [{"quantity": 5, "unitPrice": 100}],
            "taxPercent": 100
        }));
        assert_eq!(invoice.total, 1000.0);

        invoice
            .apply_patch(
                fields(json!({"taxPercent": 10, "total": 1000})),
                BrandingUploads::default(),
                Utc::now(),
            )
            .unwrap();

        assert_eq!(invoice.items.len(), 1);
        assert_eq!(invoice.subtotal, 500.0);
        assert_eq!(invoice.total, 550.0);
    }

    #[test]
    fn patch_keeps_fields_that_are_not_supplied() {
        let mut invoice = new_invoice(json!({
            "invoiceNumber": "INV-42",
            "client": {"name": "Acme"},
            "notes": "Net 30"
        }));

        invoice
            .apply_patch(
                fields(json!({"status": "paid", "invoiceNumber": "  "})),
                BrandingUploads {
                    logo: Some("http://localhost:4000/uploads/logo.png".to_string()),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap();

        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert_eq!(invoice.invoice_number, "INV-42");
        assert_eq!(invoice.client.name, "Acme");
        assert_eq!(invoice.notes, "Net 30");
        assert_eq!(
            invoice.logo_data_url.as_deref(),
            Some("http://localhost:4000/uploads/logo.png")
        );
    }

    #[test]
    fn status_can_move_backwards() {
        let mut invoice = new_invoice(json!({"status": "paid"}));
        invoice
            .apply_patch(fields(json!({"status": "draft"})), BrandingUploads::default(), Utc::now())
            .unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Draft);
    }

    #[test]
    fn key_parsing_distinguishes_ids_from_numbers() {
        let id = Uuid::new_v4().to_string();
        assert_eq!(InvoiceKey::parse(&id), InvoiceKey::Id(id.clone()));
        assert_eq!(
            InvoiceKey::parse("INV-1700000000000"),
            InvoiceKey::Number("INV-1700000000000".to_string())
        );
    }
}
