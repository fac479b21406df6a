//! Graceful shutdown handling.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Stops the background tasks and waits for them.
///
/// Workers finish the item they hold before exiting; an item claimed but
/// not acknowledged is redelivered by the durable queue.
pub async fn shutdown_gracefully(
    cancel: CancellationToken,
    logging_task: Option<JoinHandle<()>>,
    workers: Option<JoinHandle<()>>,
) {
    cancel.cancel();
    if let Some(logging_task) = logging_task {
        let _ = logging_task.await;
    }
    if let Some(workers) = workers {
        if let Err(e) = workers.await {
            log::warn!("Worker supervisor ended abnormally: {e}");
        }
    }
}

/// Completes on Ctrl-C, SIGINT or SIGTERM.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_cancels_and_joins_tasks() {
        let cancel = CancellationToken::new();
        let child = cancel.child_token();
        let logging = tokio::spawn(async move { child.cancelled().await });
        let child = cancel.child_token();
        let workers = tokio::spawn(async move { child.cancelled().await });

        tokio::time::timeout(
            Duration::from_secs(5),
            shutdown_gracefully(cancel.clone(), Some(logging), Some(workers)),
        )
        .await
        .unwrap();
        assert!(cancel.is_cancelled());
    }
}
