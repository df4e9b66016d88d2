use super::*;
use crate::Config;
use crate::error::ApiError;
use axum::body::Body;
use axum::extract::Request;
use axum::http::{StatusCode, header};
use axum::response::Response;
use tower::ServiceExt;


const ANDROID_UA: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36";
const DESKTOP_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) obsidian/1.5.12 Electron/28";

fn router_for(config: Config) -> Router {
    create_router(Arc::new(LfsFetcher::new(config)))
}

fn post_json(uri: &str, body: &str) -> Request {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::USER_AGENT, DESKTOP_UA)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

async fn api_error(response: Response) -> ApiError {
    body_json(response).await
}

#[tokio::test]
async fn test_api_server_spawns_and_stops() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config {
        working_dir: dir.path().to_path_buf(),
        dry_run: true,
        ..Default::default()
    };
    // Port 0 = OS assigns a free port
    config.server.port = 0;
    let fetcher = Arc::new(LfsFetcher::new(config));

    let api_handle = tokio::spawn(start_api_server(Arc::clone(&fetcher)));
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    fetcher.shutdown();
    let result = tokio::time::timeout(std::time::Duration::from_secs(5), api_handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}
