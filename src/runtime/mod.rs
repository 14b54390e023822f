//! Runtime adapters: tokio spawning and the HTTP surface.

pub mod api;
pub mod tokio_spawner;

pub use api::{task_router, ErrorResponse, MessageResponse};
pub use tokio_spawner::TokioSpawner;
