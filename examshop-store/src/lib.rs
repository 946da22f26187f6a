pub mod app_config;
pub mod catalog_repo;
pub mod database;
pub mod order_repo;
pub mod paystack;
pub mod redis_repo;
pub mod sms;

pub use app_config::Config;
pub use catalog_repo::PgCatalogStore;
pub use database::DbClient;
pub use order_repo::PgOrderRepository;
pub use paystack::{verify_signature, PaystackGateway, SIGNATURE_HEADER};
pub use redis_repo::RedisClient;
pub use sms::HttpSmsNotifier;
