//! Configuration loading and types for mediafs.
//!
//! Configuration is read from a YAML file and deserialized into the
//! [`Config`] struct.  Each named entry under `filesystems` describes one
//! virtual filesystem: the backing bucket, the key prefix namespacing its
//! objects, and the virtual mount path it is served under.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Name of the default media filesystem.
pub const MEDIA_FILESYSTEM_NAME: &str = "media";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Named filesystem definitions, keyed by registry name.
    #[serde(default)]
    pub filesystems: HashMap<String, FilesystemConfig>,
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
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
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

/// One named filesystem: an immutable configuration snapshot.
///
/// A changed configuration replaces the whole snapshot; snapshots are
/// never mutated in place.
#[derive(Debug, Clone, Deserialize)]
pub struct FilesystemConfig {
    /// Store backend: `aws` or `memory` (local development / tests).
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Backing bucket name.
    #[serde(default)]
    pub bucket: String,

    /// Key prefix namespacing this filesystem's objects in the bucket.
    #[serde(default)]
    pub key_prefix: String,

    /// AWS region.
    #[serde(default = "default_region")]
    pub region: String,

    /// Custom S3-compatible endpoint (e.g. MinIO, LocalStack).
    #[serde(default)]
    pub endpoint_url: String,

    /// Force path-style URL addressing (required for MinIO).
    #[serde(default)]
    pub use_path_style: bool,

    /// Explicit access key (falls back to env/credential chain).
    #[serde(default)]
    pub access_key_id: String,

    /// Explicit secret key (falls back to env/credential chain).
    #[serde(default)]
    pub secret_access_key: String,

    /// Virtual mount path this filesystem is served under, e.g. `/media`.
    #[serde(default = "default_virtual_path")]
    pub virtual_path: String,

    /// Canned ACL applied to every write.  Media is publicly served, so
    /// the default is `public-read`; override for private buckets.
    #[serde(default = "default_acl")]
    pub acl: String,

    /// Server-side encryption algorithm (e.g. `AES256`).  Off by default.
    #[serde(default)]
    pub server_side_encryption: Option<String>,
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            bucket: String::new(),
            key_prefix: String::new(),
            region: default_region(),
            endpoint_url: String::new(),
            use_path_style: false,
            access_key_id: String::new(),
            secret_access_key: String::new(),
            virtual_path: default_virtual_path(),
            acl: default_acl(),
            server_side_encryption: None,
        }
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9040
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_backend() -> String {
    "aws".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_virtual_path() -> String {
    "/media".to_string()
}

fn default_acl() -> String {
    "public-read".to_string()
}

// -- Loader ------------------------------------------------------------------

/// Load and parse configuration from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let config: Config = serde_yaml::from_str(&contents)?;
    Ok(config)
}
