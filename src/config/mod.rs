//! Service configuration: limits, timing, backends, and the listening port.

pub mod service;

pub use service::ServiceConfig;
