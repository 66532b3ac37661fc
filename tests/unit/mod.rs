//! Unit tests for individual components

mod async_error_test;
mod builders_test;
mod config_test;
mod device_test;
mod error_test;
mod runtime_test;
