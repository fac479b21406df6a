// Shared test helpers for starting the service and inspecting its output.
//
// This module provides common utilities used across multiple test files to reduce duplication.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use task_intake::{run_service_with_listener, Config, ServiceReport, StateBackend};

/// A service instance bound to an ephemeral port, writing into a temp directory.
#[allow(dead_code)] // Not every test file uses every field
pub struct TestService {
    pub base_url: String,
    pub cancel: CancellationToken,
    pub handle: JoinHandle<anyhow::Result<ServiceReport>>,
    pub db_path: PathBuf,
    pub task_log: PathBuf,
    pub dir: TempDir,
}

impl TestService {
    /// Stops the service and returns its final report.
    #[allow(dead_code)]
    pub async fn stop(self) -> ServiceReport {
        self.cancel.cancel();
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("service did not stop in time")
            .expect("service task panicked")
            .expect("service returned an error")
    }
}

/// Config pointing at files inside `dir`, with fast polling and two workers.
pub fn test_config(dir: &Path) -> Config {
    Config {
        db_path: dir.join("task_intake.db"),
        task_log: dir.join("task.log"),
        workers: 2,
        queue_poll_ms: 20,
        state: StateBackend::Shared,
        ..Default::default()
    }
}

/// Starts the service in the background on 127.0.0.1 with an ephemeral port.
#[allow(dead_code)]
pub async fn start_service(dir: TempDir, config: Config) -> TestService {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("listener has no address");
    let cancel = CancellationToken::new();
    let db_path = config.db_path.clone();
    let task_log = config.task_log.clone();
    let handle = tokio::spawn(run_service_with_listener(config, listener, cancel.clone()));

    TestService {
        base_url: format!("http://{addr}"),
        cancel,
        handle,
        db_path,
        task_log,
        dir,
    }
}

/// Reads the completion log, treating a missing file as empty.
#[allow(dead_code)]
pub fn read_log_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .map(|s| s.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Waits until the completion log holds at least `count` lines.
#[allow(dead_code)]
pub async fn wait_for_log_lines(path: &Path, count: usize) -> Vec<String> {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let lines = read_log_lines(path);
            if lines.len() >= count {
                return lines;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("completion log did not reach the expected length")
}
