use crate::models::{InvoiceDefaults, InvoiceStatus};
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone)]
pub struct InvoiceConfig {
    pub common: core_config::Config,
    pub store: StoreConfig,
    pub mongodb: MongoConfig,
    pub uploads: UploadConfig,
    pub auth: AuthConfig,
    pub invoice_defaults: InvoiceDefaults,
    pub cors: CorsConfig,
    pub rate_limit: RateLimitConfig,
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StoreBackend::Mongo),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(format!("Invalid store backend: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub local_path: String,
    /// Origin used to build public asset URLs, without a trailing slash.
    pub public_base_url: String,
    pub max_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: Option<String>,
    pub jwt_public_key_path: Option<String>,
    pub issuer: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origin: String,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests: u32,
    pub window_seconds: u64,
}

const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

impl InvoiceConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common_config = core_config::Config::load()?;

        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let backend: StoreBackend = parse_env("STORE_BACKEND", Some("mongo"), is_prod)?;
        let mongo_uri = match backend {
            StoreBackend::Mongo => get_env("MONGODB_URI", None, is_prod)?,
            StoreBackend::Memory => env::var("MONGODB_URI").unwrap_or_default(),
        };

        let status: InvoiceStatus = parse_env("INVOICE_DEFAULT_STATUS", Some("draft"), is_prod)?;

        let auth = AuthConfig {
            jwt_secret: optional_env("JWT_SECRET"),
            jwt_public_key_path: optional_env("JWT_PUBLIC_KEY_PATH"),
            issuer: optional_env("JWT_ISSUER"),
        };
        if auth.jwt_secret.is_none() && auth.jwt_public_key_path.is_none() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Either JWT_SECRET or JWT_PUBLIC_KEY_PATH must be set"
            )));
        }

        Ok(InvoiceConfig {
            common: common_config,
            store: StoreConfig { backend },
            mongodb: MongoConfig {
                uri: mongo_uri,
                database: get_env("MONGODB_DATABASE", Some("invoice_db"), is_prod)?,
            },
            uploads: UploadConfig {
                local_path: get_env("UPLOADS_LOCAL_PATH", Some("uploads"), is_prod)?,
                public_base_url: get_env(
                    "UPLOADS_PUBLIC_BASE_URL",
                    Some("http://localhost:4000"),
                    is_prod,
                )?
                .trim_end_matches('/')
                .to_string(),
                max_bytes: parse_env(
                    "UPLOADS_MAX_BYTES",
                    Some(&DEFAULT_MAX_UPLOAD_BYTES.to_string()),
                    is_prod,
                )?,
            },
            auth,
            invoice_defaults: InvoiceDefaults {
                currency: get_env("INVOICE_DEFAULT_CURRENCY", Some("INR"), is_prod)?,
                status,
                tax_percent: parse_env("INVOICE_DEFAULT_TAX_PERCENT", Some("18"), is_prod)?,
            },
            cors: CorsConfig {
                allowed_origin: get_env(
                    "CORS_ALLOWED_ORIGIN",
                    Some("http://localhost:5173"),
                    is_prod,
                )?,
            },
            rate_limit: RateLimitConfig {
                requests: parse_env("RATE_LIMIT_REQUESTS", Some("300"), is_prod)?,
                window_seconds: parse_env("RATE_LIMIT_WINDOW_SECONDS", Some("60"), is_prod)?,
            },
            otlp_endpoint: optional_env("OTLP_ENDPOINT"),
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: Option<&str>, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(key, default, is_prod)?;
    raw.parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("Invalid value for {}: {}", key, e))
    })
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}
