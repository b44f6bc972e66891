pub mod rest;
pub mod store;

pub use rest::{DbError, RestClient};
pub use store::{EphemeralStore, MemoryStore, RedisStore};
