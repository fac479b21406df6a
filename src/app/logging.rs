//! Progress logging utilities.

use log::info;
use strum::IntoEnumIterator;

use crate::error_handling::{ErrorType, InfoType, ProcessingStats};

/// Logs throughput since `start_time`.
///
/// # Arguments
///
/// * `start_time` - When the service started
/// * `stats` - Shared counters
/// * `queue_depth` - Current queue depth, if the broker answered
pub fn log_progress(
    start_time: std::time::Instant,
    stats: &ProcessingStats,
    queue_depth: Option<u64>,
) {
    let elapsed_secs = start_time.elapsed().as_secs_f64();
    let processed = stats.get_info_count(InfoType::TaskProcessed);
    let rate = if elapsed_secs > 0.0 {
        processed as f64 / elapsed_secs
    } else {
        0.0
    };
    let depth = queue_depth.map_or_else(|| "unknown".to_string(), |d| d.to_string());
    info!(
        "Accepted {} submission(s) ({} throttled), processed {} task(s) in {:.2} seconds (~{:.2} tasks/sec), queue depth {}",
        stats.get_info_count(InfoType::SubmissionAccepted)
            + stats.get_info_count(InfoType::SubmissionThrottled),
        stats.get_info_count(InfoType::SubmissionThrottled),
        processed,
        elapsed_secs,
        rate,
        depth
    );
}

/// Logs every non-zero counter, grouped into errors and events.
pub fn print_statistics(stats: &ProcessingStats) {
    let total_errors = stats.total_errors();
    if total_errors > 0 {
        info!("Error Counts ({} total):", total_errors);
        for error_type in ErrorType::iter() {
            let count = stats.get_error_count(error_type);
            if count > 0 {
                info!("   {}: {}", error_type.as_str(), count);
            }
        }
    }

    let total_info = stats.total_info();
    if total_info > 0 {
        info!("Event Counts ({} total):", total_info);
        for info_type in InfoType::iter() {
            let count = stats.get_info_count(info_type);
            if count > 0 {
                info!("   {}: {}", info_type.as_str(), count);
            }
        }
    }
}
