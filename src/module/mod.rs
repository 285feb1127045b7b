//! # Module Module
//!
//! Turning files into routes and router decorators.
//!
//! The loader never interprets files itself. It asks a [`ModuleResolver`]
//! for a directory's index entry and for the [`Module`] each file defines.
//! The bundled [`ManifestResolver`] reads declarative YAML, JSON or TOML
//! manifests and binds the handler, middleware, factory and decorator names
//! they mention against a [`Registry`] of compiled-in functions.

mod manifest;
mod registry;

pub use manifest::{ManifestResolver, INDEX_STEM, MANIFEST_EXTENSIONS};
pub use registry::Registry;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::ResolveError;
use crate::route::RouteProvider;
use crate::router::RouterNode;

/// Directory decorator: receives the parent router and the loader's construct
/// parameters, returns the router the directory's routes register on.
///
/// Returning the parent itself is allowed; returning a new router that is
/// not mounted anywhere makes the directory's routes unreachable.
pub type Decorator<P> = Arc<dyn Fn(&RouterNode, &P) -> anyhow::Result<RouterNode> + Send + Sync>;

/// What a module file defines.
pub enum Module<P> {
    /// A route, directly or through a factory.
    Route(RouteProvider<P>),
    /// A router decorator, normally found in a directory index.
    Decorator(Decorator<P>),
    /// A module that parsed but exports nothing usable.
    Empty,
}

impl<P> fmt::Debug for Module<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Module::Route(provider) => f.debug_tuple("Route").field(provider).finish(),
            Module::Decorator(_) => f.write_str("Decorator"),
            Module::Empty => f.write_str("Empty"),
        }
    }
}

/// Module resolution capability consumed by the loader.
pub trait ModuleResolver<P> {
    /// Path of the index entry of `dir`, if it has one.
    fn resolve_index(&self, dir: &Path) -> Option<PathBuf>;

    /// Load the module defined by `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when the file cannot be read or does not
    /// form a valid module.
    fn load(&self, path: &Path) -> Result<Module<P>, ResolveError>;
}

/// File identity used to tell the index entry apart from route files.
///
/// Two paths that reach the same file (through a symlink or a different
/// spelling) compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleId {
    #[cfg(unix)]
    Inode { dev: u64, ino: u64 },
    Path(PathBuf),
}

impl ModuleId {
    /// Identify the file `path` points at, following symlinks.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the file cannot be inspected.
    pub fn of(path: &Path) -> io::Result<Self> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            let meta = std::fs::metadata(path)?;
            Ok(ModuleId::Inode {
                dev: meta.dev(),
                ino: meta.ino(),
            })
        }
        #[cfg(not(unix))]
        {
            Ok(ModuleId::Path(std::fs::canonicalize(path)?))
        }
    }
}
