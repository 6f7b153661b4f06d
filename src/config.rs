//! Server configuration.

use crate::storage::RetryPolicy;
use std::path::{Path, PathBuf};

/// Default Redis connection URL.
pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";

/// Default listen host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default listen port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default directory holding the built client bundle.
pub const DEFAULT_STATIC_DIR: &str = "frontend/build";

/// Entry document served for client-side routes.
const INDEX_FILE: &str = "index.html";

/// Which key-value backend to run against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Redis { url: String, retry: RetryPolicy },
    Memory,
}

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,

    /// Port to bind
    pub port: u16,

    /// Directory with the built client application
    pub static_dir: PathBuf,

    /// Store backend
    pub backend: Backend,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            backend: Backend::Redis {
                url: DEFAULT_REDIS_URL.to_string(),
                retry: RetryPolicy::default(),
            },
        }
    }
}

impl ServerConfig {
    /// Config backed by an in-memory store, serving `static_dir`.
    pub fn in_memory(static_dir: impl Into<PathBuf>) -> Self {
        Self {
            static_dir: static_dir.into(),
            backend: Backend::Memory,
            ..Self::default()
        }
    }

    /// Address to bind, as `host:port`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the static directory.
    pub fn static_dir(&self) -> &Path {
        &self.static_dir
    }

    /// Get the SPA entry document path.
    pub fn index_path(&self) -> PathBuf {
        self.static_dir.join(INDEX_FILE)
    }
}
