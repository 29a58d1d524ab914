use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, ensure};
use serde::Deserialize;

/// Names a YAML configuration file to load.
pub const CONFIG_ENV: &str = "HTTPD_CONFIG";
/// Overrides `server.listen_addr`.
pub const LISTEN_ENV: &str = "LISTEN";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    /// File receiving one line per request, in addition to tracing output
    pub access_log: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Connections idle this long are evicted
    pub idle_timeout_secs: u64,
    /// Upper bound on one readiness wait, so sweeps run without traffic
    pub poll_timeout_secs: u64,
    /// `max` advertised in the `Keep-Alive` header
    pub keep_alive_max: u32,
    pub max_connections: usize,
    /// Largest request (head and body) buffered for one connection
    pub max_request_bytes: usize,
    /// Accepts per listener event before yielding to other work
    pub accept_burst: usize,
    /// Reads per connection event before yielding to other work
    pub read_burst: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            idle_timeout_secs: 30,
            poll_timeout_secs: 60,
            keep_alive_max: 100,
            max_connections: 1024,
            max_request_bytes: 64 * 1024,
            accept_burst: 128,
            read_burst: 64,
        }
    }
}

impl ServerConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listen_addr
            .parse()
            .with_context(|| format!("invalid listen address {:?}", self.listen_addr))
    }
}

impl Config {
    /// Loads from `HTTPD_CONFIG` (if set) and applies the `LISTEN` override.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let listen = std::env::var(LISTEN_ENV).ok();
        Self::resolve(path.as_deref(), listen)
    }

    pub fn resolve(path: Option<&Path>, listen_override: Option<String>) -> anyhow::Result<Self> {
        let mut cfg = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        if let Some(addr) = listen_override {
            cfg.server.listen_addr = addr;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    pub fn from_yaml_str(content: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let server = &self.server;
        server.socket_addr()?;
        ensure!(server.idle_timeout_secs > 0, "idle_timeout_secs must be positive");
        ensure!(server.poll_timeout_secs > 0, "poll_timeout_secs must be positive");
        ensure!(server.max_connections > 0, "max_connections must be positive");
        ensure!(server.max_request_bytes > 0, "max_request_bytes must be positive");
        ensure!(server.accept_burst > 0, "accept_burst must be positive");
        ensure!(server.read_burst > 0, "read_burst must be positive");
        Ok(())
    }
}
