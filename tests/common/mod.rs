//! Common utilities for integration tests

pub mod fixtures;

// Re-export commonly used items
pub use fixtures::{bca_params, normalizer_params, write_run, Run};
