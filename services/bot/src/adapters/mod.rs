pub mod catalog;
pub mod geocoder;
pub mod opencart;
#[cfg(feature = "redis-store")]
pub mod redis_store;
pub mod state_store;
pub mod telegram;

pub use catalog::SqlCatalog;
pub use geocoder::YandexGeocoder;
pub use opencart::OpenCartAdapter;
#[cfg(feature = "redis-store")]
pub use redis_store::RedisStateStore;
pub use state_store::MemoryStateStore;
pub use telegram::TelegramTransport;
