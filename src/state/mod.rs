pub mod store;
pub mod cache;
pub mod sled_store;
pub mod redis_store;
pub mod factory;

pub use store::*;
pub use cache::*;
pub use sled_store::SledStore;
pub use redis_store::RedisStore;
pub use factory::{create_store, create_in_memory_store};
