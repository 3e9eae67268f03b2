use crate::models::{BusinessProfile, Invoice, InvoiceKey, InvoiceStatus};
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::{
    bson::doc,
    error::{ErrorKind, WriteFailure},
    options::{FindOptions, IndexOptions},
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Persistence for invoices and business profiles.
///
/// Owner scoping is explicit in the method signatures: only `find_invoice`
/// looks across owners, so the caller can tell "missing" from "forbidden".
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), AppError>;
    async fn find_invoice(&self, key: &InvoiceKey) -> Result<Option<Invoice>, AppError>;
    async fn find_owned_invoice(
        &self,
        owner: &str,
        key: &InvoiceKey,
    ) -> Result<Option<Invoice>, AppError>;
    /// Newest first.
    async fn list_invoices(
        &self,
        owner: &str,
        status: Option<InvoiceStatus>,
    ) -> Result<Vec<Invoice>, AppError>;
    async fn replace_invoice(&self, invoice: &Invoice) -> Result<(), AppError>;
    async fn delete_owned_invoice(
        &self,
        owner: &str,
        key: &InvoiceKey,
    ) -> Result<Option<Invoice>, AppError>;

    async fn find_profile(&self, owner: &str) -> Result<Option<BusinessProfile>, AppError>;
    /// Fails with `Conflict` when the owner already has a profile.
    async fn insert_profile(&self, profile: &BusinessProfile) -> Result<(), AppError>;
    async fn replace_profile(&self, profile: &BusinessProfile) -> Result<(), AppError>;
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == 11000
    )
}

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for invoice-service");

        let owner_index = IndexModel::builder()
            .keys(doc! { "owner": 1, "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("owner_recent_lookup".to_string())
                    .build(),
            )
            .build();
        self.invoices()
            .create_index(owner_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create owner index on invoices collection: {}", e);
                AppError::from(e)
            })?;
        tracing::info!("Created index on invoices.(owner, created_at)");

        let number_index = IndexModel::builder()
            .keys(doc! { "invoice_number": 1 })
            .options(
                IndexOptions::builder()
                    .name("invoice_number_lookup".to_string())
                    .build(),
            )
            .build();
        self.invoices()
            .create_index(number_index, None)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to create invoice_number index on invoices collection: {}",
                    e
                );
                AppError::from(e)
            })?;
        tracing::info!("Created index on invoices.invoice_number");

        let profile_owner_index = IndexModel::builder()
            .keys(doc! { "owner": 1 })
            .options(
                IndexOptions::builder()
                    .name("profile_owner_unique".to_string())
                    .unique(true)
                    .build(),
            )
            .build();
        self.business_profiles()
            .create_index(profile_owner_index, None)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to create owner index on business_profiles collection: {}",
                    e
                );
                AppError::from(e)
            })?;
        tracing::info!("Created unique index on business_profiles.owner");

        Ok(())
    }

    pub fn invoices(&self) -> Collection<Invoice> {
        self.db.collection("invoices")
    }

    pub fn business_profiles(&self) -> Collection<BusinessProfile> {
        self.db.collection("business_profiles")
    }
}

#[async_trait]
impl InvoiceStore for MongoDb {
    async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::from(e)
            })?;
        Ok(())
    }

    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), AppError> {
        self.invoices().insert_one(invoice, None).await?;
        Ok(())
    }

    async fn find_invoice(&self, key: &InvoiceKey) -> Result<Option<Invoice>, AppError> {
        Ok(self.invoices().find_one(key.filter(), None).await?)
    }

    async fn find_owned_invoice(
        &self,
        owner: &str,
        key: &InvoiceKey,
    ) -> Result<Option<Invoice>, AppError> {
        let mut filter = key.filter();
        filter.insert("owner", owner);
        Ok(self.invoices().find_one(filter, None).await?)
    }

    async fn list_invoices(
        &self,
        owner: &str,
        status: Option<InvoiceStatus>,
    ) -> Result<Vec<Invoice>, AppError> {
        let mut filter = doc! { "owner": owner };
        if let Some(status) = status {
            filter.insert("status", status.as_str());
        }

        let find_options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();

        let cursor = self.invoices().find(filter, find_options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn replace_invoice(&self, invoice: &Invoice) -> Result<(), AppError> {
        let result = self
            .invoices()
            .replace_one(
                doc! { "_id": invoice.id.as_str(), "owner": invoice.owner.as_str() },
                invoice,
                None,
            )
            .await?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Invoice not found")));
        }
        Ok(())
    }

    async fn delete_owned_invoice(
        &self,
        owner: &str,
        key: &InvoiceKey,
    ) -> Result<Option<Invoice>, AppError> {
        let mut filter = key.filter();
        filter.insert("owner", owner);
        Ok(self.invoices().find_one_and_delete(filter, None).await?)
    }

    async fn find_profile(&self, owner: &str) -> Result<Option<BusinessProfile>, AppError> {
        Ok(self
            .business_profiles()
            .find_one(doc! { "owner": owner }, None)
            .await?)
    }

    async fn insert_profile(&self, profile: &BusinessProfile) -> Result<(), AppError> {
        self.business_profiles()
            .insert_one(profile, None)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    AppError::Conflict(anyhow::anyhow!("Business profile already exists"))
                } else {
                    AppError::from(e)
                }
            })?;
        Ok(())
    }

    async fn replace_profile(&self, profile: &BusinessProfile) -> Result<(), AppError> {
        let result = self
            .business_profiles()
            .replace_one(
                doc! { "_id": profile.id.as_str(), "owner": profile.owner.as_str() },
                profile,
                None,
            )
            .await?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Business profile not found")));
        }
        Ok(())
    }
}

/// Process-local store for tests and runs without MongoDB.
#[derive(Default)]
pub struct MemoryStore {
    invoices: RwLock<Vec<Invoice>>,
    profiles: RwLock<HashMap<String, BusinessProfile>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InvoiceStore for MemoryStore {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), AppError> {
        self.invoices.write().await.push(invoice.clone());
        Ok(())
    }

    async fn find_invoice(&self, key: &InvoiceKey) -> Result<Option<Invoice>, AppError> {
        let invoices = self.invoices.read().await;
        Ok(invoices.iter().find(|inv| key.matches(inv)).cloned())
    }

    async fn find_owned_invoice(
        &self,
        owner: &str,
        key: &InvoiceKey,
    ) -> Result<Option<Invoice>, AppError> {
        let invoices = self.invoices.read().await;
        Ok(invoices
            .iter()
            .find(|inv| inv.owner == owner && key.matches(inv))
            .cloned())
    }

    async fn list_invoices(
        &self,
        owner: &str,
        status: Option<InvoiceStatus>,
    ) -> Result<Vec<Invoice>, AppError> {
        let invoices = self.invoices.read().await;
        // Reverse first so equal timestamps still come back newest-inserted first.
        let mut owned: Vec<Invoice> = invoices
            .iter()
            .rev()
            .filter(|inv| inv.owner == owner)
            .filter(|inv| status.map_or(true, |s| inv.status == s))
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn replace_invoice(&self, invoice: &Invoice) -> Result<(), AppError> {
        let mut invoices = self.invoices.write().await;
        let slot = invoices
            .iter_mut()
            .find(|inv| inv.id == invoice.id && inv.owner == invoice.owner)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;
        *slot = invoice.clone();
        Ok(())
    }

    async fn delete_owned_invoice(
        &self,
        owner: &str,
        key: &InvoiceKey,
    ) -> Result<Option<Invoice>, AppError> {
        let mut invoices = self.invoices.write().await;
        let position = invoices
            .iter()
            .position(|inv| inv.owner == owner && key.matches(inv));
        Ok(position.map(|idx| invoices.remove(idx)))
    }

    async fn find_profile(&self, owner: &str) -> Result<Option<BusinessProfile>, AppError> {
        Ok(self.profiles.read().await.get(owner).cloned())
    }

    async fn insert_profile(&self, profile: &BusinessProfile) -> Result<(), AppError> {
        let mut profiles = self.profiles.write().await;
        if profiles.contains_key(&profile.owner) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Business profile already exists"
            )));
        }
        profiles.insert(profile.owner.clone(), profile.clone());
        Ok(())
    }

    async fn replace_profile(&self, profile: &BusinessProfile) -> Result<(), AppError> {
        let mut profiles = self.profiles.write().await;
        match profiles.get_mut(&profile.owner) {
            Some(existing) if existing.id == profile.id => {
                *existing = profile.clone();
                Ok(())
            }
            _ => Err(AppError::NotFound(anyhow::anyhow!(
                "Business profile not found"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BrandingUploads, InvoiceDefaults, InvoiceFields};
    use chrono::{Duration, Utc};

    fn invoice(owner: &str, number: &str, offset_secs: i64) -> Invoice {
        let fields = InvoiceFields {
            invoice_number: Some(number.to_string()),
            ..Default::default()
        };
        Invoice::create(
            owner,
            fields,
            BrandingUploads::default(),
            &InvoiceDefaults::default(),
            Utc::now() + Duration::seconds(offset_secs),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn list_is_owner_scoped_and_newest_first() {
        let store = MemoryStore::new();
        store.insert_invoice(&invoice("alice", "A-1", 0)).await.unwrap();
        store.insert_invoice(&invoice("bob", "B-1", 5)).await.unwrap();
        store.insert_invoice(&invoice("alice", "A-2", 10)).await.unwrap();

        let listed = store.list_invoices("alice", None).await.unwrap();
        let numbers: Vec<_> = listed.iter().map(|i| i.invoice_number.as_str()).collect();
        assert_eq!(numbers, vec!["A-2", "A-1"]);
    }

    #[tokio::test]
    async fn owned_lookup_and_delete_respect_owner() {
        let store = MemoryStore::new();
        let inv = invoice("alice", "A-1", 0);
        store.insert_invoice(&inv).await.unwrap();

        let by_number = InvoiceKey::parse("A-1");
        let by_id = InvoiceKey::parse(&inv.id);

        assert!(store.find_invoice(&by_number).await.unwrap().is_some());
        assert!(store.find_owned_invoice("bob", &by_id).await.unwrap().is_none());
        assert!(store.delete_owned_invoice("bob", &by_id).await.unwrap().is_none());
        assert!(store.delete_owned_invoice("alice", &by_id).await.unwrap().is_some());
        assert!(store.find_invoice(&by_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_profile_for_owner_conflicts() {
        let store = MemoryStore::new();
        let fields = crate::models::BusinessProfileFields {
            business_name: Some("Acme".to_string()),
            ..Default::default()
        };
        let profile = BusinessProfile::create(
            "alice",
            fields,
            BrandingUploads::default(),
            18.0,
            Utc::now(),
        )
        .unwrap();

        store.insert_profile(&profile).await.unwrap();
        let again = store.insert_profile(&profile).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
    }
}
