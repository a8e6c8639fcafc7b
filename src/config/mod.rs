// Configuration module entry point
// Loads the configuration bundle and holds the per-process application state

mod state;
mod types;

use std::net::SocketAddr;
use thiserror::Error;

// Re-export public types
pub use state::AppState;
pub use types::{
    AppConfig, Config, CustomRouteConfig, HttpConfig, LoggingConfig, PerformanceConfig,
    RouteAction, RoutesConfig, ServerConfig,
};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("missing mandatory setting: {0}")]
    Missing(&'static str),

    #[error("invalid setting {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 1337)?
            .set_default("app.mount_path", "/1")?
            .set_default("app.public_dir", "public")?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.server_name", "rust-appserver/0.1")?
            .set_default("http.enable_cors", false)?
            .set_default("http.max_body_size", 10_485_760)? // 10MB
            .build()?;

        let mut cfg: Self = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check mandatory settings and normalize the mount path.
    ///
    /// The mount path always starts with `/` and never ends with one
    /// (unless it is exactly `/`, which is rejected).
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.app.app_id.trim().is_empty() {
            return Err(ConfigError::Missing("app.app_id"));
        }
        if self.app.database_uri.trim().is_empty() {
            return Err(ConfigError::Missing("app.database_uri"));
        }
        if self.server.workers == Some(0) {
            return Err(ConfigError::Invalid {
                key: "server.workers",
                message: "worker thread count must be at least 1".to_string(),
            });
        }

        let trimmed = self.app.mount_path.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(ConfigError::Invalid {
                key: "app.mount_path",
                message: "mount path cannot be the site root".to_string(),
            });
        }
        self.app.mount_path = if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        };
        Ok(())
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| ConfigError::Invalid {
                key: "server.host",
                message: format!("Invalid address: {e}"),
            })
    }
}
