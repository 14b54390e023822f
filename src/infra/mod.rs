//! Infrastructure adapters for the shared store and completion sinks.

pub mod sink;
pub mod store;

pub use sink::{FileSink, InMemorySink};
pub use store::InMemoryStore;
#[cfg(feature = "redis-store")]
pub use store::RedisStore;
