// storage/mod.rs
// SQLite storage: pool setup and schema migrations

pub mod migrations;
pub mod pool;
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used items
pub use migrations::run_migrations;
pub use pool::{init_db_pool_with_path, init_memory_pool};

/// Milliseconds since the Unix epoch, the time unit stored in every table.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
