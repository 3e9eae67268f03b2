//! Request body extractor shared by the invoice and profile write endpoints.
//!
//! Browsers submit these forms as multipart when branding images are attached
//! and as JSON otherwise, so the handlers accept either and see one shape.

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::{header::CONTENT_TYPE, StatusCode},
    Form,
};
use serde_json::{Map, Value};
use service_core::error::AppError;
use std::collections::HashMap;

/// A file part of a multipart body.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Text fields of a write request plus any attached files.
///
/// Multipart and urlencoded values arrive as strings; the models coerce them.
#[derive(Debug, Default)]
pub struct FormPayload {
    pub fields: Map<String, Value>,
    pub files: Vec<UploadedFile>,
}

fn reject(status: StatusCode, message: impl std::fmt::Display) -> AppError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(anyhow::anyhow!("Request body is too large"))
    } else {
        AppError::BadRequest(anyhow::anyhow!("Invalid request body: {}", message))
    }
}

#[async_trait]
impl<S> FromRequest<S> for FormPayload
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| reject(e.status(), e))?;
            return read_multipart(&mut multipart).await;
        }

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(values) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| reject(e.status(), e))?;
            let fields = values
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            return Ok(Self {
                fields,
                files: Vec::new(),
            });
        }

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| reject(e.status(), e))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Object(fields)) => Ok(Self {
                fields,
                files: Vec::new(),
            }),
            Ok(_) => Err(AppError::BadRequest(anyhow::anyhow!(
                "Request body must be a JSON object"
            ))),
            Err(e) => Err(AppError::BadRequest(anyhow::anyhow!(
                "Invalid JSON body: {}",
                e
            ))),
        }
    }
}

async fn read_multipart(multipart: &mut Multipart) -> Result<FormPayload, AppError> {
    let mut payload = FormPayload::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| reject(e.status(), e))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name.is_empty() {
            continue;
        }

        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(|e| reject(e.status(), e))?;
                payload.files.push(UploadedFile {
                    field: name,
                    file_name: Some(file_name),
                    content_type,
                    data: data.to_vec(),
                });
            }
            None => {
                let text = field.text().await.map_err(|e| reject(e.status(), e))?;
                payload.fields.insert(name, Value::String(text));
            }
        }
    }

    Ok(payload)
}
