//! Core queueing abstractions: admission, per-principal queues, and draining.

pub mod drain;
pub(crate) mod drain_loop;
pub mod error;
pub mod ingress;
pub mod principal;
pub mod processor;
pub mod rate_counter;
pub mod store;
pub mod task_store;

pub use drain::{DrainCoordinator, DrainDispatch, DrainSettings, DrainState, DrainStats, Spawn};
pub use error::{AppResult, QueueError};
pub use ingress::{Accepted, IngressGateway};
pub use principal::{KeySpace, Principal, Task};
pub use processor::{CompletionLogProcessor, CompletionSink, TaskProcessor};
pub use rate_counter::RateCounter;
pub use store::{AtomicStore, KeyTtl};
pub use task_store::TaskStore;
