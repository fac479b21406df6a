//! Error handling and processing statistics.
//!
//! This module provides:
//! - Error type definitions for every layer (initialization, storage,
//!   registration, admission, queue, rate limiting, completion sink)
//! - Processing statistics tracking (errors and submission outcomes)
//!
//! Error types are categorized into:
//! - **Errors**: Failures observed while admitting or processing work
//! - **Info**: Submission outcomes (accepted, throttled, rejected)

mod stats;
mod types;

// Re-export public API
pub use stats::ProcessingStats;
pub use types::{
    AdmissionError, DatabaseError, ErrorType, InfoType, InitializationError, QueueError,
    RateLimitError, RegistrationError, SinkError,
};
pub(crate) use types::retry_after_secs;
