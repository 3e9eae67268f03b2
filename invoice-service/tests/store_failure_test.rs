mod common;

use async_trait::async_trait;
use common::{TestApp, TEST_USER_ID};
use invoice_service::models::{BusinessProfile, Invoice, InvoiceKey, InvoiceStatus};
use invoice_service::services::{InvoiceStore, MemoryStore};
use serde_json::{json, Value};
use service_core::error::AppError;
use std::sync::Arc;

/// Memory store whose invoice and profile writes fail after setup.
struct WriteFailingStore {
    inner: MemoryStore,
}

fn write_failed() -> AppError {
    AppError::DatabaseError(anyhow::anyhow!("write rejected"))
}

#[async_trait]
impl InvoiceStore for WriteFailingStore {
    async fn health_check(&self) -> Result<(), AppError> {
        self.inner.health_check().await
    }

    async fn insert_invoice(&self, _invoice: &Invoice) -> Result<(), AppError> {
        Err(write_failed())
    }

    async fn find_invoice(&self, key: &InvoiceKey) -> Result<Option<Invoice>, AppError> {
        self.inner.find_invoice(key).await
    }

    async fn find_owned_invoice(
        &self,
        owner: &str,
        key: &InvoiceKey,
    ) -> Result<Option<Invoice>, AppError> {
        self.inner.find_owned_invoice(owner, key).await
    }

    async fn list_invoices(
        &self,
        owner: &str,
        status: Option<InvoiceStatus>,
    ) -> Result<Vec<Invoice>, AppError> {
        self.inner.list_invoices(owner, status).await
    }

    async fn replace_invoice(&self, _invoice: &Invoice) -> Result<(), AppError> {
        Err(write_failed())
    }

    async fn delete_owned_invoice(
        &self,
        owner: &str,
        key: &InvoiceKey,
    ) -> Result<Option<Invoice>, AppError> {
        self.inner.delete_owned_invoice(owner, key).await
    }

    async fn find_profile(&self, owner: &str) -> Result<Option<BusinessProfile>, AppError> {
        self.inner.find_profile(owner).await
    }

    async fn insert_profile(&self, profile: &BusinessProfile) -> Result<(), AppError> {
        self.inner.insert_profile(profile).await
    }

    async fn replace_profile(&self, _profile: &BusinessProfile) -> Result<(), AppError> {
        Err(write_failed())
    }
}

fn logo_form() -> reqwest::multipart::Form {
    reqwest::multipart::Form::new()
        .text("items", r#"[{"qty":1,"unitPrice":10}]"#)
        .part(
            "logo",
            reqwest::multipart::Part::bytes(b"fake-png".to_vec())
                .file_name("logo.png")
                .mime_str("image/png")
                .unwrap(),
        )
}

async fn failing_app() -> (TestApp, Arc<WriteFailingStore>) {
    let store = Arc::new(WriteFailingStore {
        inner: MemoryStore::new(),
    });
    let app = TestApp::spawn_with_store(store.clone()).await;
    (app, store)
}

#[tokio::test]
async fn failed_invoice_insert_discards_uploads() {
    let (app, _store) = failing_app().await;

    let response = app
        .post("/api/invoice", TEST_USER_ID)
        .multipart(logo_form())
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 500);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"], "Database error");
    assert_eq!(app.stored_upload_count().await, 0);

    app.cleanup().await;
}

#[tokio::test]
async fn failed_invoice_replace_discards_uploads() {
    let (app, store) = failing_app().await;

    let invoice = Invoice::create(
        TEST_USER_ID,
        Default::default(),
        Default::default(),
        &Default::default(),
        chrono::Utc::now(),
    )
    .unwrap();
    store.inner.insert_invoice(&invoice).await.unwrap();

    let response = app
        .put(&format!("/api/invoice/{}", invoice.id), TEST_USER_ID)
        .multipart(logo_form())
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 500);
    assert_eq!(app.stored_upload_count().await, 0);

    let stored = store
        .inner
        .find_invoice(&InvoiceKey::Id(invoice.id.clone()))
        .await
        .unwrap()
        .unwrap();
    assert!(stored.logo_data_url.is_none());

    app.cleanup().await;
}

#[tokio::test]
async fn failed_profile_replace_keeps_existing_files() {
    let (app, _store) = failing_app().await;

    let created = app
        .post("/api/businessProfile", TEST_USER_ID)
        .multipart(
            reqwest::multipart::Form::new()
                .text("businessName", "Acme")
                .part(
                    "stamp",
                    reqwest::multipart::Part::bytes(b"stamp".to_vec())
                        .file_name("stamp.png")
                        .mime_str("image/png")
                        .unwrap(),
                ),
        )
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(created.status(), 201);
    assert_eq!(app.stored_upload_count().await, 1);

    let response = app
        .put("/api/businessProfile/me", TEST_USER_ID)
        .multipart(
            reqwest::multipart::Form::new().part(
                "stamp",
                reqwest::multipart::Part::bytes(b"new-stamp".to_vec())
                    .file_name("stamp.png")
                    .mime_str("image/png")
                    .unwrap(),
            ),
        )
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 500);
    assert_eq!(app.stored_upload_count().await, 1);

    app.cleanup().await;
}
