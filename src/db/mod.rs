// Storage layer: the transactional store seam and its connection pools

pub mod diesel_pool;
pub mod memory_store;
pub mod pg_store;
pub mod redis_config;
pub mod redis_pool;
pub mod store;

pub use diesel_pool::{
    check_diesel_health, create_diesel_pool, mask_connection_string, DieselDatabaseConfig,
    DieselPool,
};
pub use memory_store::InMemoryBookingStore;
pub use pg_store::PgBookingStore;
pub use redis_config::RedisConfig;
pub use redis_pool::{RedisHealth, RedisPool};
pub use store::{BookingStore, BookingTx, Committed, TxFuture};
