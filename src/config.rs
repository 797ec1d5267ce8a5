//! Configuration loading and types for bucketdav.
//!
//! Configuration is read from a YAML file and deserialized into the
//! [`Config`] struct.  Each subsection governs a different part of the
//! system: networking, the single credential pair, the object store
//! backend, logging, and observability.  Every field has a default, so an
//! empty file (or [`Config::default`]) yields a runnable server.

use serde::Deserialize;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Basic authentication settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Object store backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Observability settings (metrics + health probe).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind host address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,

    /// Maximum PUT body size in bytes (default 5 GiB).
    #[serde(default = "default_max_object_size")]
    pub max_object_size: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout: default_shutdown_timeout(),
            max_object_size: default_max_object_size(),
        }
    }
}

/// Environment variable that overrides `auth.username`.
pub const AUTH_USERNAME_ENV: &str = "BUCKETDAV_AUTH_USERNAME";

/// Environment variable that overrides `auth.password`.
pub const AUTH_PASSWORD_ENV: &str = "BUCKETDAV_AUTH_PASSWORD";

/// Authentication settings: the one accepted credential pair.
///
/// There is no built-in credential pair.  Both values must come from the
/// configuration file or the environment; see [`AuthConfig::validate`].
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Expected Basic-auth user name (also accepts `user`).
    #[serde(alias = "user", default)]
    pub username: String,

    /// Expected Basic-auth password.
    #[serde(default)]
    pub password: String,

    /// Realm advertised in the `WWW-Authenticate` challenge.
    #[serde(default = "default_realm")]
    pub realm: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            realm: default_realm(),
        }
    }
}

impl AuthConfig {
    /// Replace the credential pair with non-empty values found by `lookup`
    /// under [`AUTH_USERNAME_ENV`] and [`AUTH_PASSWORD_ENV`].
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(username) = lookup(AUTH_USERNAME_ENV).filter(|v| !v.is_empty()) {
            self.username = username;
        }
        if let Some(password) = lookup(AUTH_PASSWORD_ENV).filter(|v| !v.is_empty()) {
            self.password = password;
        }
    }

    /// Refuse to serve without a usable credential pair.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.username.is_empty() || self.password.is_empty() {
            anyhow::bail!(
                "auth.username and auth.password must be configured \
                 (or set {AUTH_USERNAME_ENV} and {AUTH_PASSWORD_ENV})"
            );
        }
        if self.username.contains(':') {
            anyhow::bail!("auth.username must not contain ':'");
        }
        Ok(())
    }
}

/// Object store backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Backend type: `memory` or `sqlite`.
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// Memory backend configuration.
    #[serde(default)]
    pub memory: MemoryStorageConfig,

    /// SQLite backend configuration.
    #[serde(default)]
    pub sqlite: SqliteStorageConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            memory: MemoryStorageConfig::default(),
            sqlite: SqliteStorageConfig::default(),
        }
    }
}

/// Memory storage backend configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MemoryStorageConfig {
    /// Maximum total size in bytes (0 = unlimited).
    #[serde(default)]
    pub max_size_bytes: u64,
}

/// SQLite storage backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_sqlite_path")]
    pub path: String,
}

impl Default for SqliteStorageConfig {
    fn default() -> Self {
        Self {
            path: default_sqlite_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.  `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Observability settings.
///
/// Both the Prometheus endpoint and the health probe are enabled by default.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Enable Prometheus metrics collection and the metrics endpoint.
    #[serde(default = "default_true")]
    pub metrics: bool,

    /// Enable the health endpoint.
    #[serde(default = "default_true")]
    pub health_check: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics: true,
            health_check: true,
        }
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_realm() -> String {
    "WebDAV Server".to_string()
}

fn default_storage_backend() -> String {
    "memory".to_string()
}

fn default_sqlite_path() -> String {
    "./data/objects.db".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_max_object_size() -> u64 {
    5_368_709_120 // 5 GiB
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Loader ------------------------------------------------------------------

/// Load and parse configuration from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    parse_config(&contents)
}

/// Parse configuration from YAML text.  Blank input yields the defaults.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
}
