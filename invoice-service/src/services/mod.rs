pub mod database;
pub mod jwt;
pub mod metrics;
pub mod storage;

pub use database::{InvoiceStore, MemoryStore, MongoDb};
pub use jwt::{Claims, JwtVerifier};
pub use self::metrics::{get_metrics, init_metrics};
pub use storage::{LocalStorage, Storage};
