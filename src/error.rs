//! Load-time error types.
//!
//! Everything that goes wrong while turning a directory tree into registered
//! routes surfaces as a [`LoaderError`]. Request-time failures never use these
//! types: handler errors are plain [`anyhow::Error`] values recovered by the
//! [`ErrorPolicy`](crate::policy::ErrorPolicy), and validation failures are
//! [`ValidationFailure`](crate::middleware::ValidationFailure) values.

use std::io;
use std::path::PathBuf;

use crate::middleware::Section;

/// Fatal error raised while loading routes from a directory.
///
/// Loading fails fast: the first error aborts the whole load and no partially
/// loaded router is returned.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// The directory itself could not be listed.
    #[error("failed to read route directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A directory entry could not be inspected.
    #[error("failed to inspect {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A route file could not be resolved into a module.
    #[error("failed to resolve route module {path}: {source}")]
    Unresolved {
        path: PathBuf,
        #[source]
        source: ResolveError,
    },

    /// The module resolved but does not describe a route.
    #[error("{path} is not a route: expected a route definition or a route factory")]
    NotARoute { path: PathBuf },

    /// A route factory returned an error.
    #[error("route factory in {path} failed: {source:#}")]
    Factory {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// A directory decorator resolved but failed when invoked.
    #[error("router decorator in {path} failed: {source:#}")]
    Decorator {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// A route declared a schema the validator could not compile.
    #[error("route {method} {route} has an invalid {section} schema: {message}")]
    InvalidSchema {
        method: String,
        route: String,
        section: Section,
        message: String,
    },
}

/// Why a module file could not be turned into a [`Module`](crate::module::Module).
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("failed to read module file: {0}")]
    Io(#[from] io::Error),

    #[error("unsupported module extension {0:?}")]
    UnsupportedExtension(String),

    #[error("malformed module: {0}")]
    Parse(String),

    #[error("invalid HTTP method {0:?}")]
    InvalidMethod(String),

    #[error("unknown {kind} {name:?}")]
    UnknownName { kind: &'static str, name: String },

    #[error("module declares {0}")]
    Shape(&'static str),
}

impl From<serde_yaml::Error> for ResolveError {
    fn from(err: serde_yaml::Error) -> Self {
        ResolveError::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for ResolveError {
    fn from(err: serde_json::Error) -> Self {
        ResolveError::Parse(err.to_string())
    }
}

impl From<toml::de::Error> for ResolveError {
    fn from(err: toml::de::Error) -> Self {
        ResolveError::Parse(err.to_string())
    }
}
