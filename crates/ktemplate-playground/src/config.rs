//! Configuration loading and typed config structures for the playground
//! server.
//!
//! Configuration lives in an optional YAML file (`playground.yaml` by
//! default, or the path in `PLAYGROUND_CONFIG`). Every field has a
//! default, so a missing file simply means "all defaults". A handful of
//! environment variables override the file:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `PLAYGROUND_HOST` | `server.host` |
//! | `PLAYGROUND_PORT` | `server.port` |
//! | `PLAYGROUND_MOUNT_PREFIX` | `server.mount_prefix` |
//! | `PLAYGROUND_STATIC_DIR` | `server.static_dir` |
//! | `PLAYGROUND_LOG_FORMAT` | `logging.format` |

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Environment variable naming the config file.
pub const CONFIG_PATH_VAR: &str = "PLAYGROUND_CONFIG";

/// Config file used when [`CONFIG_PATH_VAR`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "playground.yaml";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// The file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        #[from]
        source: serde_yml::Error,
    },

    /// An environment override has an unusable value.
    #[error("invalid value for {var}: {message}")]
    Env {
        /// The offending variable.
        var: &'static str,
        /// Why the value was rejected.
        message: String,
    },
}

/// Top-level playground configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PlaygroundConfig {
    /// HTTP listener and routing settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PlaygroundConfig {
    /// Load configuration the way the binary does: the file named by
    /// `PLAYGROUND_CONFIG` (or `playground.yaml`) if it exists, then
    /// environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_VAR)
            .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.apply_overrides(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Load configuration from a YAML file, without environment
    /// overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply overrides looked up through `lookup` (normally the process
    /// environment).
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(host) = lookup("PLAYGROUND_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PLAYGROUND_PORT") {
            self.server.port = port.parse().map_err(|e| ConfigError::Env {
                var: "PLAYGROUND_PORT",
                message: format!("{port:?}: {e}"),
            })?;
        }
        if let Some(prefix) = lookup("PLAYGROUND_MOUNT_PREFIX") {
            self.server.mount_prefix = prefix;
        }
        if let Some(dir) = lookup("PLAYGROUND_STATIC_DIR") {
            self.server.static_dir = PathBuf::from(dir);
        }
        if let Some(format) = lookup("PLAYGROUND_LOG_FORMAT") {
            self.logging.format = match format.as_str() {
                "pretty" => LogFormat::Pretty,
                "json" => LogFormat::Json,
                other => {
                    return Err(ConfigError::Env {
                        var: "PLAYGROUND_LOG_FORMAT",
                        message: format!("expected \"pretty\" or \"json\", got {other:?}"),
                    })
                }
            };
        }
        Ok(())
    }
}

/// HTTP listener and routing settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// The host address to bind to (e.g. `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: String,

    /// The TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Optional path prefix the playground is mounted under. Stripped
    /// from request paths before routing. Empty disables stripping.
    #[serde(default = "default_mount_prefix")]
    pub mount_prefix: String,

    /// Directory static assets (`app.js`, `style.css`) are served from.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    /// Largest request body accepted, in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            mount_prefix: default_mount_prefix(),
            static_dir: default_static_dir(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive (trace, debug, info, warn, error) when
    /// `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, for terminals.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    8080
}

fn default_mount_prefix() -> String {
    String::from("/ktemplate")
}

fn default_static_dir() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/www"))
}

const fn default_max_body_bytes() -> usize {
    64 * 1024
}

fn default_log_level() -> String {
    String::from("info")
}
