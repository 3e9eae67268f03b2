use crate::dtos::{ApiResponse, InvoiceResponse, InvoiceSummary, ListInvoicesParams, MessageResponse};
use crate::extract::FormPayload;
use crate::middleware::Owner;
use crate::models::{invoice::parse_status, Invoice, InvoiceFields, InvoiceKey};
use crate::services::metrics::record_invoice_event;
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use service_core::error::AppError;

fn not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Invoice not found"))
}

#[tracing::instrument(skip(state))]
pub async fn list_invoices(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Query(params): Query<ListInvoicesParams>,
) -> Result<impl IntoResponse, AppError> {
    let status = parse_status(params.status.as_deref())?;
    let invoices = state.store.list_invoices(&owner, status).await?;

    tracing::debug!(count = invoices.len(), "Listed invoices");

    let data: Vec<InvoiceResponse> = invoices.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::ok(data)))
}

#[tracing::instrument(skip(state))]
pub async fn invoice_summary(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<impl IntoResponse, AppError> {
    let invoices = state.store.list_invoices(&owner, None).await?;
    Ok(Json(ApiResponse::ok(InvoiceSummary::from_invoices(&invoices))))
}

#[tracing::instrument(skip(state))]
pub async fn get_invoice(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let invoice = state
        .store
        .find_invoice(&InvoiceKey::parse(&id))
        .await?
        .ok_or_else(not_found)?;

    if invoice.owner != owner {
        tracing::warn!(invoice_id = %invoice.id, "Invoice requested by non-owner");
        return Err(AppError::Forbidden(anyhow::anyhow!("Forbidden")));
    }

    Ok(Json(ApiResponse::ok(InvoiceResponse::from(invoice))))
}

#[tracing::instrument(skip(state, payload))]
pub async fn create_invoice(
    State(state): State<AppState>,
    Owner(owner): Owner,
    payload: FormPayload,
) -> Result<impl IntoResponse, AppError> {
    let fields = InvoiceFields::from_map(payload.fields)?;
    let uploads = super::store_uploads(&state, &payload.files).await?;

    let invoice = match Invoice::create(
        &owner,
        fields,
        uploads.clone(),
        &state.config.invoice_defaults,
        Utc::now(),
    ) {
        Ok(invoice) => invoice,
        Err(e) => {
            super::discard_uploads(&state, &uploads).await;
            return Err(e);
        }
    };

    if let Err(e) = state.store.insert_invoice(&invoice).await {
        super::discard_uploads(&state, &uploads).await;
        return Err(e);
    }

    tracing::info!(
        invoice_id = %invoice.id,
        invoice_number = %invoice.invoice_number,
        total = invoice.total,
        "Invoice created"
    );
    record_invoice_event("created", invoice.status.as_str());

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(InvoiceResponse::from(invoice))),
    ))
}

#[tracing::instrument(skip(state, payload))]
pub async fn update_invoice(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
    payload: FormPayload,
) -> Result<impl IntoResponse, AppError> {
    let fields = InvoiceFields::from_map(payload.fields)?;
    let mut invoice = state
        .store
        .find_owned_invoice(&owner, &InvoiceKey::parse(&id))
        .await?
        .ok_or_else(not_found)?;

    let uploads = super::store_uploads(&state, &payload.files).await?;
    if let Err(e) = invoice.apply_patch(fields, uploads.clone(), Utc::now()) {
        super::discard_uploads(&state, &uploads).await;
        return Err(e);
    }

    if let Err(e) = state.store.replace_invoice(&invoice).await {
        super::discard_uploads(&state, &uploads).await;
        return Err(e);
    }

    tracing::info!(invoice_id = %invoice.id, total = invoice.total, "Invoice updated");
    record_invoice_event("updated", invoice.status.as_str());

    Ok(Json(ApiResponse::ok(InvoiceResponse::from(invoice))))
}

#[tracing::instrument(skip(state))]
pub async fn delete_invoice(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let invoice = state
        .store
        .delete_owned_invoice(&owner, &InvoiceKey::parse(&id))
        .await?
        .ok_or_else(not_found)?;

    tracing::info!(invoice_id = %invoice.id, "Invoice deleted");
    record_invoice_event("deleted", invoice.status.as_str());

    Ok(Json(MessageResponse::new("Invoice deleted successfully")))
}
