// Configuration module entry point
// Manages application configuration and shared runtime state

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{
    Config, HealthConfig, HttpConfig, LoggingConfig, PerformanceConfig, RoutesConfig,
    ServerConfig, StorageConfig,
};

/// Prefix for environment overrides, e.g. `IMAGE_DROP_SERVER__PORT=9000`
const ENV_PREFIX: &str = "IMAGE_DROP";

impl Config {
    /// Layer `config_path` (any format the `config` crate knows, extension
    /// optional, may be absent) under `IMAGE_DROP_*` environment overrides
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        // Missing keys fall back to the `Default` impls in `types`
        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn test_defaults_without_file() {
        let cfg = Config::load_from("definitely/not/a/config/file").unwrap();
        assert_eq!(cfg.storage.upload_dir, PathBuf::from("uploaded_images"));
        assert_eq!(cfg.http.max_body_size, 10_485_760);
        assert_eq!(cfg.performance.read_timeout, 30);
        assert!(cfg.routes.health.enabled);
        assert_eq!(cfg.routes.health.liveness_path, "/healthz");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[server]\nport = 9100\n\n[storage]\nupload_dir = \"/srv/images\"\n\n[logging]\naccess_log = false"
        )
        .unwrap();

        let stem = dir.path().join("server");
        let cfg = Config::load_from(stem.to_str().unwrap()).unwrap();
        assert_eq!(cfg.server.port, 9100);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.storage.upload_dir, PathBuf::from("/srv/images"));
        assert!(!cfg.logging.access_log);
        assert_eq!(cfg.logging.access_log_format, "combined");
    }

    #[test]
    fn test_environment_overrides() {
        // No other test reads this key, so setting it cannot race them
        let key = "IMAGE_DROP_PERFORMANCE__MAX_CONNECTIONS";
        std::env::set_var(key, "64");
        let cfg = Config::load_from("definitely/not/a/config/file");
        std::env::remove_var(key);

        assert_eq!(cfg.unwrap().performance.max_connections, Some(64));
    }

    #[test]
    fn test_performance_helpers() {
        use std::time::Duration;

        let mut perf = PerformanceConfig::default();
        assert!(perf.keep_alive());
        assert_eq!(perf.header_timeout(), Duration::from_secs(75));
        perf.read_timeout = 10;
        perf.write_timeout = 45;
        assert_eq!(perf.request_timeout(), Duration::from_secs(45));
        perf.keep_alive_timeout = 0;
        assert!(!perf.keep_alive());
        assert_eq!(perf.header_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_socket_addr() {
        let mut cfg = Config::default();
        cfg.server.host = "127.0.0.1".to_string();
        cfg.server.port = 8123;
        assert_eq!(cfg.get_socket_addr().unwrap().port(), 8123);

        cfg.server.host = "not an address".to_string();
        assert!(cfg.get_socket_addr().is_err());
    }
}
