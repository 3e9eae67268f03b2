use crate::config::{InvoiceConfig, StoreBackend};
use crate::handlers;
use crate::middleware::auth_middleware;
use crate::services::{init_metrics, InvoiceStore, JwtVerifier, LocalStorage, MemoryStore, MongoDb, Storage};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware},
    security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<InvoiceConfig>,
    pub store: Arc<dyn InvoiceStore>,
    pub storage: Arc<dyn Storage>,
    pub jwt: JwtVerifier,
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
}

async fn build_store(config: &InvoiceConfig) -> Result<Arc<dyn InvoiceStore>, AppError> {
    match config.store.backend {
        StoreBackend::Mongo => {
            let db = MongoDb::connect(&config.mongodb.uri, &config.mongodb.database).await?;
            db.initialize_indexes().await.map_err(|e| {
                tracing::error!("Failed to initialize database indexes: {}", e);
                e
            })?;
            Ok(Arc::new(db))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

fn cors_layer(config: &InvoiceConfig) -> Result<CorsLayer, AppError> {
    let origin = HeaderValue::from_str(&config.cors.allowed_origin).map_err(|e| {
        AppError::ConfigError(anyhow::anyhow!(
            "Invalid CORS origin {}: {}",
            config.cors.allowed_origin,
            e
        ))
    })?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}

/// Assemble the HTTP router for `state`.
pub fn router(state: AppState) -> Result<Router, AppError> {
    let config = state.config.clone();
    let limiter = create_ip_rate_limiter(
        config.rate_limit.requests,
        config.rate_limit.window_seconds,
    );

    let invoice_routes = Router::new()
        .route(
            "/",
            get(handlers::list_invoices).post(handlers::create_invoice),
        )
        .route("/summary", get(handlers::invoice_summary))
        .route(
            "/:id",
            get(handlers::get_invoice)
                .put(handlers::update_invoice)
                .delete(handlers::delete_invoice),
        );

    let profile_routes = Router::new()
        .route("/", axum::routing::post(handlers::create_profile))
        .route(
            "/me",
            get(handlers::get_my_profile).put(handlers::update_my_profile),
        );

    let api = Router::new()
        .nest("/invoice", invoice_routes)
        .nest("/businessProfile", profile_routes)
        .route_layer(middleware::from_fn_with_state(
            state.jwt.clone(),
            auth_middleware,
        ))
        .layer(middleware::from_fn_with_state(limiter, ip_rate_limit_middleware));

    let app = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .nest("/api", api)
        .nest_service("/uploads", ServeDir::new(&config.uploads.local_path))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(DefaultBodyLimit::max(config.uploads.max_bytes))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors_layer(&config)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

impl Application {
    pub async fn build(config: InvoiceConfig) -> Result<Self, AppError> {
        init_metrics();

        let store = build_store(&config).await?;

        let storage: Arc<dyn Storage> = Arc::new(
            LocalStorage::new(&config.uploads.local_path)
                .await
                .map_err(|e| {
                    tracing::error!(
                        "Failed to initialize upload storage at {}: {}",
                        config.uploads.local_path,
                        e
                    );
                    e
                })?,
        );

        let jwt = JwtVerifier::from_config(&config.auth).await?;

        let state = AppState {
            config: Arc::new(config),
            store,
            storage,
            jwt,
        };

        let backend = state.config.store.backend;
        let port = state.config.common.port;
        let app = router(state)?;

        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            port,
            backend = ?backend,
            "invoice-service listening"
        );

        let server = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        );

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}
