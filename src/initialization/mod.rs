//! Application initialization and resource setup.
//!
//! This module provides functions to initialize process-wide resources:
//! - The logger (plain or JSON output)
//! - The database pool
//! - The registration store and rate limiter for the configured backend
//! - The shared statistics table
//!
//! All initialization functions return proper error types for error handling.

mod logger;
mod state;

use std::sync::Arc;

use crate::error_handling::ProcessingStats;

// Re-export public API
pub use crate::storage::init_db_pool_with_path;
pub use logger::init_logger_with;
pub use state::{init_client_registry, init_rate_limiter};

/// Initializes the shared statistics table.
///
/// One instance is shared by the admission path, every worker and the
/// status endpoints.
pub fn init_stats() -> Arc<ProcessingStats> {
    Arc::new(ProcessingStats::new())
}
