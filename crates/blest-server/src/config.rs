//! Configuration management for the BLEST server.
//!
//! Configuration merges three sources, later ones winning:
//! 1. Default values (hardcoded)
//! 2. Configuration file (YAML)
//! 3. Environment variables (override)
//!
//! Environment variables are prefixed with `BLEST_` and use `__` as the
//! nested key separator, e.g. `BLEST_SERVER__PORT=9090` overrides
//! `server.port` and `BLEST_HTTP__CORS=true` overrides `http.cors`.

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use blest_core::RouterOptions;

/// Server configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    /// Network settings
    #[serde(default)]
    pub server: ServerSettings,

    /// Router defaults
    #[serde(default)]
    pub router: RouterSettings,

    /// Response header settings
    #[serde(default)]
    pub http: HttpSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Network settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ServerSettings {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path the batch endpoint is served on
    #[serde(default = "default_url")]
    pub url: String,

    /// Maximum request body size in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            url: default_url(),
            body_limit: default_body_limit(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_url() -> String {
    "/".to_string()
}

fn default_body_limit() -> usize {
    1024 * 1024
}

/// Options for the router served by this process.
///
/// Routers are constructed from these settings via
/// [`RouterOptions::from`]; [`crate::serve`] warns when the router it is
/// handed was built with different options, since route timeouts are fixed
/// at registration time and cannot be rewritten at serve time.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct RouterSettings {
    /// Default per-route timeout in milliseconds; 0 disables timeouts
    #[serde(default)]
    pub timeout_ms: u64,

    /// Serve the `_routes` introspection route
    #[serde(default)]
    pub introspection: bool,
}

impl From<&RouterSettings> for RouterOptions {
    fn from(settings: &RouterSettings) -> Self {
        RouterOptions::new()
            .with_timeout_ms(settings.timeout_ms)
            .with_introspection(settings.introspection)
    }
}

/// Security response headers.
///
/// Every field overrides one response header; unset fields keep the strict
/// defaults. `cors` is a shortcut that sets `access-control-allow-origin` to
/// `*` unless an explicit origin is configured.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct HttpSettings {
    /// Send `access-control-allow-origin: *`
    #[serde(default)]
    pub cors: bool,

    pub access_control_allow_origin: Option<String>,
    pub content_security_policy: Option<String>,
    pub cross_origin_opener_policy: Option<String>,
    pub cross_origin_resource_policy: Option<String>,
    pub origin_agent_cluster: Option<String>,
    pub referrer_policy: Option<String>,
    pub strict_transport_security: Option<String>,
    pub x_content_type_options: Option<String>,
    pub x_dns_prefetch_control: Option<String>,
    pub x_download_options: Option<String>,
    pub x_frame_options: Option<String>,
    pub x_permitted_cross_domain_policies: Option<String>,
    pub x_xss_protection: Option<String>,
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON format (true for production, false for development)
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let config = Config::builder()
            .add_source(Config::try_from(&ServerConfig::default())?)
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(
                Environment::with_prefix("BLEST")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let server_config: ServerConfig = config.try_deserialize()?;
        server_config.validate()?;

        Ok(server_config)
    }

    /// Load configuration from environment variables only.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let config = Config::builder()
            .add_source(Config::try_from(&ServerConfig::default())?)
            .add_source(
                Environment::with_prefix("BLEST")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let server_config: ServerConfig = config.try_deserialize()?;
        server_config.validate()?;

        Ok(server_config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.server.port == 0 {
            return Err(ConfigLoadError::Invalid {
                message: "server.port must be greater than 0".to_string(),
            });
        }

        if !self.server.url.starts_with('/') {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "server.url must start with '/', got: {}",
                    self.server.url
                ),
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "logging.level must be one of: {:?}, got: {}",
                    valid_levels, self.logging.level
                ),
            });
        }

        Ok(())
    }
}
