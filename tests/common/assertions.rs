//! Helpers for waiting on events and processes

use std::path::Path;
use std::time::Duration;

use lfs_fetchd::Event;
use tokio::sync::broadcast;

/// Wait for the first event matching `predicate`
///
/// Returns `None` on timeout or when the channel closes.
pub async fn wait_for_event<F>(
    events: &mut broadcast::Receiver<Event>,
    timeout: Duration,
    predicate: F,
) -> Option<Event>
where
    F: Fn(&Event) -> bool,
{
    tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

/// Wait until `path` exists and return its trimmed contents
pub async fn wait_for_file(path: &Path, timeout: Duration) -> Option<String> {
    tokio::time::timeout(timeout, async {
        loop {
            if let Ok(contents) = std::fs::read_to_string(path)
                && !contents.trim().is_empty()
            {
                return contents.trim().to_string();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .ok()
}

/// Whether a process with this pid still exists (zombies included)
pub fn process_exists(pid: i32) -> bool {
    // SAFETY: signal 0 only checks for existence and permissions.
    unsafe { libc::kill(pid, 0) == 0 }
}

/// Status line of a raw HTTP response
pub fn status_line(response: &str) -> &str {
    response.lines().next().unwrap_or_default()
}

/// Body of a raw HTTP response
pub fn body(response: &str) -> &str {
    response
        .split_once("\r\n\r\n")
        .map(|(_, body)| body)
        .unwrap_or_default()
}
