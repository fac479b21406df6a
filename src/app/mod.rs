//! Service lifecycle helpers.
//!
//! Progress logging, final statistics and shutdown handling used by the
//! service runner.

pub mod logging;
pub mod shutdown;

// Re-export public API
pub use logging::{log_progress, print_statistics};
pub use shutdown::{shutdown_gracefully, wait_for_shutdown_signal};
