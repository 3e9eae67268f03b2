use crate::dtos::{ApiResponse, BusinessProfileResponse};
use crate::extract::FormPayload;
use crate::middleware::Owner;
use crate::models::{BusinessProfile, BusinessProfileFields};
use crate::services::metrics::record_profile_event;
use crate::services::storage::key_from_url;
use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use service_core::error::AppError;

#[tracing::instrument(skip(state))]
pub async fn get_my_profile(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<impl IntoResponse, AppError> {
    let profile = state
        .store
        .find_profile(&owner)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Business profile not found")))?;

    Ok(Json(ApiResponse::ok(BusinessProfileResponse::from(profile))))
}

#[tracing::instrument(skip(state, payload))]
pub async fn create_profile(
    State(state): State<AppState>,
    Owner(owner): Owner,
    payload: FormPayload,
) -> Result<impl IntoResponse, AppError> {
    if state.store.find_profile(&owner).await?.is_some() {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Business profile already exists"
        )));
    }

    let fields = BusinessProfileFields::from_map(payload.fields)?;
    let uploads = super::store_uploads(&state, &payload.files).await?;

    let created = BusinessProfile::create(
        &owner,
        fields,
        uploads.clone(),
        state.config.invoice_defaults.tax_percent,
        Utc::now(),
    );
    let profile = match created {
        Ok(profile) => profile,
        Err(e) => {
            super::discard_uploads(&state, &uploads).await;
            return Err(e);
        }
    };

    if let Err(e) = state.store.insert_profile(&profile).await {
        super::discard_uploads(&state, &uploads).await;
        return Err(e);
    }

    tracing::info!(profile_id = %profile.id, "Business profile created");
    record_profile_event("created");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(BusinessProfileResponse::from(profile))),
    ))
}

#[tracing::instrument(skip(state, payload))]
pub async fn update_my_profile(
    State(state): State<AppState>,
    Owner(owner): Owner,
    payload: FormPayload,
) -> Result<impl IntoResponse, AppError> {
    let fields = BusinessProfileFields::from_map(payload.fields)?;
    let mut profile = state
        .store
        .find_profile(&owner)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Business profile not found")))?;

    let uploads = super::store_uploads(&state, &payload.files).await?;
    let replaced = match profile.apply_patch(fields, uploads.clone(), Utc::now()) {
        Ok(replaced) => replaced,
        Err(e) => {
            super::discard_uploads(&state, &uploads).await;
            return Err(e);
        }
    };

    if let Err(e) = state.store.replace_profile(&profile).await {
        super::discard_uploads(&state, &uploads).await;
        return Err(e);
    }

    for url in &replaced {
        if let Some(key) = key_from_url(&state.config.uploads.public_base_url, url) {
            if let Err(e) = state.storage.delete(key).await {
                tracing::warn!(key = %key, error = %e, "Failed to remove replaced asset");
            }
        }
    }

    tracing::info!(profile_id = %profile.id, replaced = replaced.len(), "Business profile updated");
    record_profile_event("updated");

    Ok(Json(ApiResponse::ok(BusinessProfileResponse::from(profile))))
}
