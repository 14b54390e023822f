//! Unit tests for individual components

mod builders_test;
mod config_test;
mod error_test;
mod rate_counter_test;
mod runtime_test;
mod sink_test;
mod task_store_test;
