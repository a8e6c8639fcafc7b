// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub app: AppConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    #[serde(default)]
    pub routes: RoutesConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Application bundle supplied by the deployment environment
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Application identifier clients must present in `X-Application-Id`
    #[serde(default)]
    pub app_id: String,
    /// Master credential, grants unrestricted access when presented
    #[serde(default)]
    pub master_key: Option<String>,
    /// Data store connection string (e.g. `memory://`)
    #[serde(default)]
    pub database_uri: String,
    /// Path prefix under which the data API is mounted
    #[serde(default = "default_mount_path")]
    pub mount_path: String,
    /// Root directory for static assets
    #[serde(default = "default_public_dir")]
    pub public_dir: String,
    /// Document returned for client-side routed paths.
    /// Defaults to `<public_dir>/index.html` when unset.
    #[serde(default)]
    pub spa_document: Option<String>,
}

impl AppConfig {
    /// Resolved path of the SPA fallback document
    pub fn spa_document_path(&self) -> String {
        self.spa_document.clone().unwrap_or_else(|| {
            format!("{}/index.html", self.public_dir.trim_end_matches('/'))
        })
    }
}

#[allow(clippy::missing_const_for_fn)]
fn default_mount_path() -> String {
    "/1".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_public_dir() -> String {
    "public".to_string()
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub enable_cors: bool,
    pub max_body_size: u64,
}

/// Routes configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct RoutesConfig {
    /// Custom routes declared in the config file, matched in order
    #[serde(default)]
    pub custom: Vec<CustomRouteConfig>,
}

/// A custom route declared in configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CustomRouteConfig {
    /// HTTP method, or `None`/`"*"` for any method
    #[serde(default)]
    pub method: Option<String>,
    /// Path pattern (`/exact`, `/items/:id`, `/docs/*`)
    pub path: String,
    /// Action to take when matched
    #[serde(flatten)]
    pub action: RouteAction,
}

/// Route action - what to do when a configured route matches
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouteAction {
    /// Serve a specific file
    File { path: String },
    /// HTTP redirect
    Redirect {
        target: String,
        #[serde(default = "default_redirect_code")]
        code: u16,
    },
    /// Direct response
    Direct {
        status: u16,
        #[serde(default)]
        body: Option<String>,
        #[serde(default)]
        content_type: Option<String>,
    },
}

#[allow(clippy::missing_const_for_fn)]
fn default_redirect_code() -> u16 {
    302
}
