//! Builders to construct the admission and drain pipeline from configuration.

pub mod service_builder;

pub use service_builder::{build_gateway, build_processor};
