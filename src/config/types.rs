// Configuration sections
// Every key is optional; missing keys take the values from the `Default` impls

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root of the configuration tree
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    pub routes: RoutesConfig,
}

/// `[server]`: bind address and runtime size
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Tokio worker threads; one per core when unset
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            workers: None,
        }
    }
}

/// `[storage]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Flat directory holding every uploaded image, created at startup
    pub upload_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploaded_images"),
        }
    }
}

/// `[logging]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `error`, `warn` or `info`
    pub level: String,
    pub access_log: bool,
    /// `combined`, `common`, `json`, or a `$variable` pattern
    pub access_log_format: String,
    /// Stdout when unset
    pub access_log_file: Option<String>,
    /// Stderr when unset
    pub error_log_file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            access_log: true,
            access_log_format: "combined".to_string(),
            access_log_file: None,
            error_log_file: None,
        }
    }
}

/// `[performance]`: timeouts are in seconds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Longest wait for the next request head on a kept-alive connection.
    /// Zero disables keep-alive.
    pub keep_alive_timeout: u64,
    /// With `write_timeout`, bounds one request from head to response
    pub read_timeout: u64,
    pub write_timeout: u64,
    /// Concurrent connection cap; unbounded when unset
    pub max_connections: Option<u64>,
}

impl PerformanceConfig {
    pub const fn keep_alive(&self) -> bool {
        self.keep_alive_timeout > 0
    }

    /// Wait allowed for a request head, idle keep-alive time included
    pub const fn header_timeout(&self) -> Duration {
        if self.keep_alive() {
            Duration::from_secs(self.keep_alive_timeout)
        } else {
            Duration::from_secs(self.read_timeout)
        }
    }

    /// Budget for one request, upload body included; the response body
    /// transfer is not counted
    pub const fn request_timeout(&self) -> Duration {
        if self.read_timeout > self.write_timeout {
            Duration::from_secs(self.read_timeout)
        } else {
            Duration::from_secs(self.write_timeout)
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            keep_alive_timeout: 75,
            read_timeout: 30,
            write_timeout: 30,
            max_connections: None,
        }
    }
}

/// `[http]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Value of the `Server` response header
    pub server_name: String,
    /// Largest accepted upload body, in bytes
    pub max_body_size: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            server_name: concat!("image-drop/", env!("CARGO_PKG_VERSION")).to_string(),
            max_body_size: 10 * 1024 * 1024,
        }
    }
}

/// `[routes]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RoutesConfig {
    pub health: HealthConfig,
}

/// `[routes.health]`: liveness probe for orchestrators
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub enabled: bool,
    pub liveness_path: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            liveness_path: "/healthz".to_string(),
        }
    }
}
