//! Configuration types for lfs-fetchd

use serde::{Deserialize, Serialize};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    time::Duration,
};

use crate::error::{Error, Result};

/// Main configuration for the daemon
///
/// Fields are organized into sub-configs:
/// - [`server`](ServerConfig) - bind address and port
/// - [`lfs`](LfsConfig) - pull tool invocation and polling
/// - [`cors`](CorsConfig) - client kind to origin mapping
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Working tree the pull tool runs in; resource paths are relative to it
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,

    /// Prefix every pull command with `echo` instead of executing it
    #[serde(default)]
    pub dry_run: bool,

    /// How pull requests are dispatched
    #[serde(default)]
    pub mode: DispatchMode,

    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Pull tool settings
    #[serde(default)]
    pub lfs: LfsConfig,

    /// Cross-origin settings
    #[serde(default)]
    pub cors: CorsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            working_dir: default_working_dir(),
            dry_run: false,
            mode: DispatchMode::default(),
            server: ServerConfig::default(),
            lfs: LfsConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

impl Config {
    /// Load a configuration file (JSON). Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| Error::Config {
            message: format!("failed to parse {}: {e}", path.display()),
            key: None,
        })
    }

    /// Check the settings that cannot be defaulted.
    pub fn validate(&self) -> Result<()> {
        if !self.working_dir.is_dir() {
            return Err(Error::WorkingDirectory(self.working_dir.clone()));
        }
        if self.lfs.command.is_empty() {
            return Err(Error::Config {
                message: "pull command must name a program".to_string(),
                key: Some("lfs.command".to_string()),
            });
        }
        if self.lfs.poll_interval.is_zero() {
            return Err(Error::Config {
                message: "poll interval must be greater than zero".to_string(),
                key: Some("lfs.poll_interval_ms".to_string()),
            });
        }
        Ok(())
    }
}

/// How an incoming pull request is turned into work
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// One pull invocation per request, supervised until the client gets its answer
    #[default]
    Batched,
    /// Legacy mode: each request replaces a shared queue drained by one worker
    Queued,
}

impl DispatchMode {
    /// Name used in logs and the health endpoint
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchMode::Batched => "batched",
            DispatchMode::Queued => "queued",
        }
    }
}

/// HTTP listener configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1)
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// Port to listen on (default: 3322)
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// Full socket address to listen on
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

/// Pull tool configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LfsConfig {
    /// Program and leading arguments; `pull --include <list>` is appended (default: ["git", "lfs"])
    #[serde(default = "default_lfs_command")]
    pub command: Vec<String>,

    /// How long a single wait on the running tool may block before the
    /// client connection is checked again (default: 1000 ms)
    #[serde(
        default = "default_poll_interval",
        with = "duration_millis_serde",
        rename = "poll_interval_ms"
    )]
    pub poll_interval: Duration,

    /// Time a terminated tool gets to exit before it is killed (default: 5000 ms)
    #[serde(
        default = "default_terminate_grace",
        with = "duration_millis_serde",
        rename = "terminate_grace_ms"
    )]
    pub terminate_grace: Duration,
}

impl Default for LfsConfig {
    fn default() -> Self {
        Self {
            command: default_lfs_command(),
            poll_interval: default_poll_interval(),
            terminate_grace: default_terminate_grace(),
        }
    }
}

/// Kind of client calling the daemon, derived from its `User-Agent`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientKind {
    /// Mobile app (webview served from localhost)
    Mobile,
    /// Desktop app
    Desktop,
}

/// Maps a `User-Agent` marker to a client kind and the origin it is allowed to use
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientOrigin {
    /// Substring searched for in the `User-Agent` header
    pub marker: String,
    /// Client kind this marker identifies
    pub kind: ClientKind,
    /// Value sent back in `Access-Control-Allow-Origin`
    pub origin: String,
}

/// Cross-origin configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Known clients, checked in order (default: Android → http://localhost)
    #[serde(default = "default_cors_clients")]
    pub clients: Vec<ClientOrigin>,

    /// Origin used when no marker matches (default: app://obsidian.md)
    #[serde(default = "default_fallback_origin")]
    pub fallback_origin: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            clients: default_cors_clients(),
            fallback_origin: default_fallback_origin(),
        }
    }
}

impl CorsConfig {
    /// Resolve the client kind and allowed origin for a `User-Agent` value
    pub fn resolve(&self, user_agent: &str) -> (ClientKind, &str) {
        self.clients
            .iter()
            .find(|client| user_agent.contains(&client.marker))
            .map(|client| (client.kind, client.origin.as_str()))
            .unwrap_or((ClientKind::Desktop, self.fallback_origin.as_str()))
    }
}

fn default_working_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_port() -> u16 {
    3322
}

fn default_lfs_command() -> Vec<String> {
    vec!["git".to_string(), "lfs".to_string()]
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(1000)
}

fn default_terminate_grace() -> Duration {
    Duration::from_millis(5000)
}

fn default_cors_clients() -> Vec<ClientOrigin> {
    vec![ClientOrigin {
        marker: "Android".to_string(),
        kind: ClientKind::Mobile,
        origin: "http://localhost".to_string(),
    }]
}

fn default_fallback_origin() -> String {
    "app://obsidian.md".to_string()
}

// Duration serialization helper (milliseconds)
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
