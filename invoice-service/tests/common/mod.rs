#![allow(dead_code)]

use invoice_service::config::{
    AuthConfig, CorsConfig, InvoiceConfig, MongoConfig, RateLimitConfig, StoreBackend,
    StoreConfig, UploadConfig,
};
use invoice_service::models::InvoiceDefaults;
use invoice_service::services::{Claims, InvoiceStore, JwtVerifier, LocalStorage};
use invoice_service::startup::{router, AppState, Application};
use jsonwebtoken::{encode, EncodingKey, Header};
use service_core::config::Config as CoreConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "integration-test-secret";
pub const TEST_USER_ID: &str = "user_test_123";
pub const OTHER_USER_ID: &str = "user_other_456";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub uploads_path: String,
    pub client: reqwest::Client,
}

pub fn test_config(uploads_path: &str) -> InvoiceConfig {
    InvoiceConfig {
        common: CoreConfig {
            port: 0,
            log_level: "debug".to_string(),
        },
        store: StoreConfig {
            backend: StoreBackend::Memory,
        },
        mongodb: MongoConfig {
            uri: String::new(),
            database: "invoice_test".to_string(),
        },
        uploads: UploadConfig {
            local_path: uploads_path.to_string(),
            public_base_url: "http://localhost:4000".to_string(),
            max_bytes: 1024 * 1024,
        },
        auth: AuthConfig {
            jwt_secret: Some(TEST_JWT_SECRET.to_string()),
            jwt_public_key_path: None,
            issuer: None,
        },
        invoice_defaults: InvoiceDefaults::default(),
        cors: CorsConfig {
            allowed_origin: "http://localhost:5173".to_string(),
        },
        rate_limit: RateLimitConfig {
            requests: 1000,
            window_seconds: 60,
        },
        otlp_endpoint: None,
    }
}

pub fn token_for(user_id: &str) -> String {
    let exp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock before epoch")
        .as_secs() as usize
        + 3600;
    let claims = Claims {
        sub: user_id.to_string(),
        exp,
        iat: None,
        iss: None,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .expect("Failed to sign test token")
}

fn temp_uploads_path() -> String {
    std::env::temp_dir()
        .join(format!("invoice-test-uploads-{}", Uuid::new_v4()))
        .to_string_lossy()
        .to_string()
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    pub async fn spawn_with(customize: impl FnOnce(&mut InvoiceConfig)) -> Self {
        let uploads_path = temp_uploads_path();

        let mut config = test_config(&uploads_path);
        customize(&mut config);

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        Self::connect(port, uploads_path).await
    }

    /// Serve the router over `store` instead of the configured backend.
    pub async fn spawn_with_store(store: Arc<dyn InvoiceStore>) -> Self {
        let uploads_path = temp_uploads_path();
        let config = test_config(&uploads_path);

        let storage = LocalStorage::new(&uploads_path)
            .await
            .expect("Failed to create upload storage");
        let state = AppState {
            jwt: JwtVerifier::from_secret(TEST_JWT_SECRET, None),
            config: Arc::new(config),
            store,
            storage: Arc::new(storage),
        };
        let app = router(state).expect("Failed to build router");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind random port");
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .ok();
        });

        Self::connect(port, uploads_path).await
    }

    async fn connect(port: u16, uploads_path: String) -> Self {
        let address = format!("http://127.0.0.1:{}", port);

        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        }

        TestApp {
            address,
            port,
            uploads_path,
            client,
        }
    }

    /// Number of files currently in the uploads directory.
    pub async fn stored_upload_count(&self) -> usize {
        let mut count = 0;
        if let Ok(mut entries) = tokio::fs::read_dir(&self.uploads_path).await {
            while let Ok(Some(_)) = entries.next_entry().await {
                count += 1;
            }
        }
        count
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub fn get(&self, path: &str, user: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(token_for(user))
    }

    pub fn post(&self, path: &str, user: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(token_for(user))
    }

    pub fn put(&self, path: &str, user: &str) -> reqwest::RequestBuilder {
        self.client.put(self.url(path)).bearer_auth(token_for(user))
    }

    pub fn delete(&self, path: &str, user: &str) -> reqwest::RequestBuilder {
        self.client.delete(self.url(path)).bearer_auth(token_for(user))
    }

    /// Create an invoice for `user` and return the `data` object.
    pub async fn create_invoice(&self, user: &str, body: serde_json::Value) -> serde_json::Value {
        let response = self
            .post("/api/invoice", user)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status(), 201);
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        body["data"].clone()
    }

    pub async fn cleanup(&self) {
        let _ = tokio::fs::remove_dir_all(&self.uploads_path).await;
    }
}
