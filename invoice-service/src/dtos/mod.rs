pub mod business_profile;
pub mod invoices;

pub use business_profile::BusinessProfileResponse;
pub use invoices::{InvoiceResponse, InvoiceSummary, LineItemResponse, ListInvoicesParams};

use serde::Serialize;

/// Success envelope shared by every API endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}
