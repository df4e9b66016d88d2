//! Legacy queued mode: newer requests supersede unread work

#![cfg(unix)]

mod common;

use common::{TestServer, body, queued_config, status_line, wait_for_event, wait_for_file};
use lfs_fetchd::Event;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn test_second_request_supersedes_first() {
    let dir = tempfile::tempdir().unwrap();
    // Records each resource, then takes long enough for R2 to arrive.
    let config = queued_config(dir.path(), "echo \"$3\" >> pulled.log; sleep 0.3");
    let server = TestServer::start_with(dir, config).await;
    let mut events = server.fetcher.subscribe();
    let worker = server.fetcher.start_queue_worker().unwrap();

    let r1 = server
        .post(
            "/pull-lfs",
            r#"{"note": "r1.md", "resources": ["r1-a.png", "r1-b.png", "r1-c.png"]}"#,
        )
        .await;
    assert!(status_line(&r1).contains("202"), "{r1}");
    assert!(body(&r1).contains(r#""generation":1"#));

    let log_path = server.dir().join("pulled.log");
    assert_eq!(wait_for_file(&log_path, TIMEOUT).await.as_deref(), Some("r1-a.png"));

    let r2 = server
        .post("/pull-lfs", r#"{"note": "r2.md", "resources": ["r2-a.png"]}"#)
        .await;
    assert!(status_line(&r2).contains("202"), "{r2}");

    let superseded = wait_for_event(&mut events, TIMEOUT, |e| {
        matches!(e, Event::BatchSuperseded { from: 1, .. })
    })
    .await;
    assert_eq!(
        superseded,
        Some(Event::BatchSuperseded {
            from: 1,
            to: 2,
            abandoned: 2
        })
    );

    let pulled = wait_for_event(&mut events, TIMEOUT, |e| {
        matches!(e, Event::ResourcePulled { resource, .. } if resource == "r2-a.png")
    })
    .await;
    assert!(pulled.is_some());

    let log = std::fs::read_to_string(&log_path).unwrap();
    assert_eq!(log.lines().collect::<Vec<_>>(), vec!["r1-a.png", "r2-a.png"]);

    server.stop().await;
    worker.await.unwrap();
}
