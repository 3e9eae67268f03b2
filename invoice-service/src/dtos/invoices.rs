use crate::models::{Client, Invoice, InvoiceStatus, LineItem};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemResponse {
    pub id: String,
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub amount: f64,
}

impl From<LineItem> for LineItemResponse {
    fn from(item: LineItem) -> Self {
        let amount = item.amount();
        Self {
            id: item.id,
            description: item.description,
            quantity: item.quantity,
            unit_price: item.unit_price,
            amount,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResponse {
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
    pub items: Vec<LineItemResponse>,
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
    pub created_at: String,
    pub updated_at: String,
}

impl From<Invoice> for InvoiceResponse {
    fn from(invoice: Invoice) -> Self {
        Self {
            id: invoice.id,
            owner: invoice.owner,
            invoice_number: invoice.invoice_number,
            issue_date: invoice.issue_date,
            due_date: invoice.due_date,
            from_business_name: invoice.from_business_name,
            from_email: invoice.from_email,
            from_address: invoice.from_address,
            from_phone: invoice.from_phone,
            from_gst: invoice.from_gst,
            client: invoice.client,
            items: invoice.items.into_iter().map(Into::into).collect(),
            currency: invoice.currency,
            status: invoice.status,
            tax_percent: invoice.tax_percent,
            subtotal: invoice.subtotal,
            tax: invoice.tax,
            total: invoice.total,
            logo_data_url: invoice.logo_data_url,
            stamp_data_url: invoice.stamp_data_url,
            signature_data_url: invoice.signature_data_url,
            signature_name: invoice.signature_name,
            signature_title: invoice.signature_title,
            notes: invoice.notes,
            created_at: invoice.created_at.to_rfc3339(),
            updated_at: invoice.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListInvoicesParams {
    pub status: Option<String>,
}

/// Paid and outstanding amounts for one currency.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencySummary {
    pub invoice_count: u64,
    pub paid_count: u64,
    pub total_paid: f64,
    pub total_unpaid: f64,
    /// Share of the invoiced amount that is paid, 0 when nothing is invoiced.
    pub paid_percentage: f64,
}

/// Dashboard KPIs over an owner's invoices.
///
/// Anything not `paid` counts as unpaid. Amounts are grouped by currency and
/// never converted.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceSummary {
    pub total_invoices: u64,
    pub paid_count: u64,
    pub unpaid_count: u64,
    /// Share of invoices (by count) that are paid.
    pub paid_rate: f64,
    pub by_currency: BTreeMap<String, CurrencySummary>,
}

fn percentage(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}

impl InvoiceSummary {
    pub fn from_invoices<'a>(invoices: impl IntoIterator<Item = &'a Invoice>) -> Self {
        let mut summary = Self::default();

        for invoice in invoices {
            let entry = summary
                .by_currency
                .entry(invoice.currency.clone())
                .or_default();
            entry.invoice_count += 1;
            summary.total_invoices += 1;

            if invoice.status == InvoiceStatus::Paid {
                entry.paid_count += 1;
                entry.total_paid += invoice.total;
                summary.paid_count += 1;
            } else {
                entry.total_unpaid += invoice.total;
                summary.unpaid_count += 1;
            }
        }

        for entry in summary.by_currency.values_mut() {
            entry.paid_percentage =
                percentage(entry.total_paid, entry.total_paid + entry.total_unpaid);
        }
        summary.paid_rate = percentage(summary.paid_count as f64, summary.total_invoices as f64);

        summary
    }
}
