pub mod business_profile;
pub mod health;
pub mod invoices;

pub use business_profile::{create_profile, get_my_profile, update_my_profile};
pub use health::{health_check, metrics_endpoint, readiness_check, root};
pub use invoices::{
    create_invoice, delete_invoice, get_invoice, invoice_summary, list_invoices, update_invoice,
};

use crate::extract::UploadedFile;
use crate::models::BrandingUploads;
use crate::services::storage::{key_from_url, store_branding};
use crate::startup::AppState;
use service_core::error::AppError;

async fn store_uploads(
    state: &AppState,
    files: &[UploadedFile],
) -> Result<BrandingUploads, AppError> {
    store_branding(
        state.storage.as_ref(),
        &state.config.uploads.public_base_url,
        files,
    )
    .await
}

/// Best-effort removal of files stored for a request that then failed.
async fn discard_uploads(state: &AppState, uploads: &BrandingUploads) {
    let urls = [&uploads.logo, &uploads.stamp, &uploads.signature];
    for url in urls.into_iter().flatten() {
        if let Some(key) = key_from_url(&state.config.uploads.public_base_url, url) {
            if let Err(e) = state.storage.delete(key).await {
                tracing::warn!(key = %key, error = %e, "Failed to discard upload");
            }
        }
    }
}
