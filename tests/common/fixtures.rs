//! Fake pull tools, configs and a running server for integration tests

use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use lfs_fetchd::api::{self, PeerListener};
use lfs_fetchd::{Config, DispatchMode, LfsFetcher};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

/// Script that records its pid and then blocks, standing in for a slow pull
pub const SLOW_TOOL: &str = "echo $$ > tool.pid\nexec sleep 30";

/// Write `body` as the working tree's fake pull tool
///
/// The script runs in the working tree and receives
/// `pull --include <list>` as `$1..$3`.
pub fn write_fake_tool(dir: &Path, body: &str) -> String {
    let tool = dir.join("fake-lfs");
    std::fs::write(&tool, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
    tool.to_string_lossy().into_owned()
}

/// Config running `body` as the pull tool inside `dir`, polling every 20 ms
pub fn fake_tool_config(dir: &Path, body: &str) -> Config {
    let mut config = Config {
        working_dir: dir.to_path_buf(),
        ..Default::default()
    };
    config.lfs.command = vec![write_fake_tool(dir, body)];
    config.lfs.poll_interval = Duration::from_millis(20);
    config.lfs.terminate_grace = Duration::from_millis(500);
    config
}

/// Same as [`fake_tool_config`], in queued mode
pub fn queued_config(dir: &Path, body: &str) -> Config {
    Config {
        mode: DispatchMode::Queued,
        ..fake_tool_config(dir, body)
    }
}

/// A daemon serving on an ephemeral localhost port
pub struct TestServer {
    pub addr: SocketAddr,
    pub fetcher: Arc<LfsFetcher>,
    pub handle: JoinHandle<lfs_fetchd::Result<()>>,
    dir: TempDir,
}

impl TestServer {
    /// Start a server whose pull tool runs `body`
    pub async fn start(body: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = fake_tool_config(dir.path(), body);
        Self::start_with(dir, config).await
    }

    /// Start a server for an existing working tree and config
    pub async fn start_with(dir: TempDir, config: Config) -> Self {
        let fetcher = Arc::new(LfsFetcher::new(config));
        let listener = PeerListener::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = axum::serve::Listener::local_addr(&listener).unwrap();

        let shutdown = fetcher.shutdown_token();
        let handle = tokio::spawn(api::serve(
            Arc::clone(&fetcher),
            listener,
            async move { shutdown.cancelled_owned().await },
        ));

        Self {
            addr,
            fetcher,
            handle,
            dir,
        }
    }

    /// Working tree the pull tool runs in
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Open a raw connection and send a `POST` with a JSON body
    pub async fn send_post(&self, path: &str, body: &str) -> TcpStream {
        let mut stream = TcpStream::connect(self.addr).await.unwrap();
        let request = format!(
            "POST {path} HTTP/1.1\r\n\
             Host: {addr}\r\n\
             User-Agent: Mozilla/5.0 (Linux; Android 14)\r\n\
             Content-Type: application/json\r\n\
             Content-Length: {len}\r\n\
             Connection: close\r\n\
             \r\n\
             {body}",
            addr = self.addr,
            len = body.len(),
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        stream
    }

    /// Send a `POST` and read the whole response as text
    pub async fn post(&self, path: &str, body: &str) -> String {
        let mut stream = self.send_post(path, body).await;
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    /// Shut the daemon down and wait for the server to stop
    pub async fn stop(self) {
        self.fetcher.shutdown();
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
