//! # Configuration Module
//!
//! Service configuration for the `kudy` binary.
//!
//! Values come from three layers, later ones winning:
//!
//! 1. A YAML file (every section and key optional)
//! 2. Environment variables
//! 3. Command-line flags (applied by the CLI)
//!
//! ```yaml
//! server:
//!   addr: 0.0.0.0:8080
//!   stack_size: 0x8000
//!   health_endpoint: true
//! routes:
//!   dir: ./routes
//!   recursive: true
//! logging:
//!   level: info
//!   format: json
//! ```
//!
//! ## Environment Variables
//!
//! - `KUDY_ADDR`: listen address
//! - `KUDY_ROUTES_DIR`: route tree root
//! - `KUDY_RECURSIVE`: `true`/`false`
//! - `KUDY_STACK_SIZE`: coroutine stack size, decimal (`32768`) or hex (`0x8000`)
//! - `KUDY_LOG_*`: see [`crate::logging`]

use serde::{Deserialize, Deserializer, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::logging::LogConfig;

/// Default coroutine stack size (32 KB).
pub const DEFAULT_STACK_SIZE: usize = 0x8000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid value {value:?} for {key}")]
    InvalidEnv { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    #[serde(deserialize_with = "deserialize_stack_size")]
    pub stack_size: usize,
    /// Answer `GET /health` when no loaded route claims it.
    pub health_endpoint: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
            stack_size: DEFAULT_STACK_SIZE,
            health_endpoint: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutesConfig {
    pub dir: PathBuf,
    pub recursive: bool,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./routes"),
            recursive: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub routes: RoutesConfig,
    pub logging: LogConfig,
}

impl ServiceConfig {
    /// Read a YAML config file. An empty file yields the defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// # Errors
    ///
    /// Returns the YAML error when `text` is not a valid config document.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Load `path` if given, otherwise start from the defaults, then apply
    /// the environment.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] from loading or from an invalid variable.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.with_env_overrides()
    }

    /// Apply `KUDY_*` variables from the process environment.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidEnv`] when a variable cannot be parsed.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|key| env::var(key).ok())
    }

    /// Apply `KUDY_*` overrides from an arbitrary lookup.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidEnv`] when a variable cannot be parsed.
    pub fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(addr) = lookup("KUDY_ADDR") {
            self.server.addr = addr;
        }
        if let Some(dir) = lookup("KUDY_ROUTES_DIR") {
            self.routes.dir = PathBuf::from(dir);
        }
        if let Some(value) = lookup("KUDY_RECURSIVE") {
            self.routes.recursive = parse_bool(&value).ok_or_else(|| ConfigError::InvalidEnv {
                key: "KUDY_RECURSIVE",
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup("KUDY_STACK_SIZE") {
            self.server.stack_size =
                parse_stack_size(&value).ok_or_else(|| ConfigError::InvalidEnv {
                    key: "KUDY_STACK_SIZE",
                    value: value.clone(),
                })?;
        }
        self.logging = self.logging.with_overrides_from(&lookup);
        Ok(self)
    }
}

/// Parse a stack size in decimal or `0x` hex.
#[must_use]
pub fn parse_stack_size(raw: &str) -> Option<usize> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn deserialize_stack_size<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(usize),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(text) => parse_stack_size(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid stack size {text:?}"))),
    }
}
