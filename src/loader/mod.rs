//! # Loader Module
//!
//! Convention-based route loading from a directory tree.
//!
//! [`RouteLoader::append_routes_from_dir`] walks one directory at a time:
//!
//! 1. Entries whose names start with `.` or `_` are skipped entirely.
//! 2. The directory's index entry, when the resolver finds one, supplies a
//!    decorator that receives the parent router and returns the router this
//!    directory registers on. Without a usable index the parent is reused.
//! 3. Every other file must define a route, directly or through a factory
//!    that receives the loader's construct parameters.
//! 4. Each route gets its middleware chain from the [`MiddlewareComposer`]
//!    and is registered on the directory's router.
//! 5. Subdirectories are loaded the same way, with the directory's router as
//!    their parent, unless recursion is disabled.
//!
//! Loading is sequential and fails fast: the first malformed route aborts
//! the whole load.
//!
//! ## Example
//!
//! ```rust,no_run
//! use kudy::loader::RouteLoader;
//! use kudy::module::{ManifestResolver, Registry};
//! use kudy::router::RouterNode;
//!
//! let resolver = ManifestResolver::new(Registry::with_builtins());
//! let loader = RouteLoader::new((), resolver);
//! let root = RouterNode::new();
//! loader.append_routes_from_dir(&root, "./routes")?;
//! let table = root.build()?;
//! println!("{} routes", table.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod compose;
mod walk;

pub use compose::MiddlewareComposer;
pub use walk::{classify, EntryKind};

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::LoaderError;
use crate::middleware::ValidationFailure;
use crate::module::{Module, ModuleId, ModuleResolver};
use crate::policy::{ErrorCatchHandler, ErrorPolicy, InvalidInputHandler};
use crate::request::RequestContext;
use crate::response::Response;
use crate::router::RouterNode;
use crate::schema::SchemaValidator;

/// Loader-level configuration.
#[derive(Clone)]
pub struct LoaderOptions {
    /// Replaces the default JSON 500 for errors raised anywhere in a chain.
    pub error_catch_handler: Option<ErrorCatchHandler>,
    /// Replaces the default JSON 422 for inputs that fail validation.
    pub invalid_input_handler: Option<InvalidInputHandler>,
    /// Descend into subdirectories.
    pub recursive: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            error_catch_handler: None,
            invalid_input_handler: None,
            recursive: true,
        }
    }
}

impl fmt::Debug for LoaderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderOptions")
            .field("error_catch_handler", &self.error_catch_handler.is_some())
            .field("invalid_input_handler", &self.invalid_input_handler.is_some())
            .field("recursive", &self.recursive)
            .finish()
    }
}

impl LoaderOptions {
    #[must_use]
    pub fn with_error_catch_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&anyhow::Error, &RequestContext) -> Response + Send + Sync + 'static,
    {
        self.error_catch_handler = Some(Arc::new(handler));
        self
    }

    #[must_use]
    pub fn with_invalid_input_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ValidationFailure, &RequestContext) -> Response + Send + Sync + 'static,
    {
        self.invalid_input_handler = Some(Arc::new(handler));
        self
    }

    #[must_use]
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }
}

/// Loads route files into a router.
///
/// `P` is the construct parameter type handed to route factories and
/// directory decorators.
pub struct RouteLoader<P, R> {
    params: P,
    resolver: R,
    validator: SchemaValidator,
    policy: Arc<ErrorPolicy>,
    recursive: bool,
}

impl<P, R> fmt::Debug for RouteLoader<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteLoader")
            .field("validator", &self.validator)
            .field("recursive", &self.recursive)
            .finish_non_exhaustive()
    }
}

impl<P, R: ModuleResolver<P>> RouteLoader<P, R> {
    /// A loader with the default error policy and recursion enabled.
    #[must_use]
    pub fn new(params: P, resolver: R) -> Self {
        Self::with_options(params, resolver, LoaderOptions::default())
    }

    #[must_use]
    pub fn with_options(params: P, resolver: R, options: LoaderOptions) -> Self {
        Self {
            params,
            resolver,
            validator: SchemaValidator::default(),
            policy: Arc::new(ErrorPolicy::new(
                options.error_catch_handler,
                options.invalid_input_handler,
            )),
            recursive: options.recursive,
        }
    }

    /// Replace the schema validator used to compile route schemas.
    #[must_use]
    pub fn with_validator(mut self, validator: SchemaValidator) -> Self {
        self.validator = validator;
        self
    }

    #[must_use]
    pub fn params(&self) -> &P {
        &self.params
    }

    #[must_use]
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Load the routes under `dir` onto `parent`.
    ///
    /// Returns the router the directory's routes were registered on: the
    /// router produced by the directory's decorator, or `parent` itself.
    ///
    /// # Errors
    ///
    /// Returns the first [`LoaderError`] met; nothing loaded before the
    /// failure should be served.
    pub fn append_routes_from_dir(
        &self,
        parent: &RouterNode,
        dir: impl AsRef<Path>,
    ) -> Result<RouterNode, LoaderError> {
        let dir = dir.as_ref();
        debug!(dir = %dir.display(), "Loading route directory");

        let listing = walk::list(dir)?;
        let (router, index_id) = self.decorate(parent, dir)?;
        let composer = MiddlewareComposer::new(self.validator, Arc::clone(&self.policy));

        for file in &listing.files {
            if let Some(index_id) = &index_id {
                let id = ModuleId::of(file).map_err(|source| LoaderError::Stat {
                    path: file.clone(),
                    source,
                })?;
                if &id == index_id {
                    continue;
                }
            }
            self.load_route(&router, &composer, file)?;
        }

        if self.recursive {
            for subdir in &listing.directories {
                self.append_routes_from_dir(&router, subdir)?;
            }
        } else if !listing.directories.is_empty() {
            debug!(
                dir = %dir.display(),
                skipped = listing.directories.len(),
                "Recursion disabled, subdirectories skipped"
            );
        }

        Ok(router)
    }

    fn decorate(
        &self,
        parent: &RouterNode,
        dir: &Path,
    ) -> Result<(RouterNode, Option<ModuleId>), LoaderError> {
        let Some(index) = self.resolver.resolve_index(dir) else {
            return Ok((parent.clone(), None));
        };
        let index_id = ModuleId::of(&index).map_err(|source| LoaderError::Stat {
            path: index.clone(),
            source,
        })?;

        let router = match self.resolver.load(&index) {
            Ok(Module::Decorator(decorate)) => {
                let router = decorate(parent, &self.params).map_err(|source| {
                    LoaderError::Decorator {
                        path: index.clone(),
                        source,
                    }
                })?;
                debug!(
                    index = %index.display(),
                    new_router = !router.ptr_eq(parent),
                    "Router decorated"
                );
                router
            }
            Ok(other) => {
                debug!(
                    index = %index.display(),
                    module = ?other,
                    "Index does not define a decorator, reusing parent router"
                );
                parent.clone()
            }
            Err(e) => {
                debug!(
                    index = %index.display(),
                    error = %e,
                    "Index failed to resolve, reusing parent router"
                );
                parent.clone()
            }
        };
        Ok((router, Some(index_id)))
    }

    fn load_route(
        &self,
        router: &RouterNode,
        composer: &MiddlewareComposer,
        file: &Path,
    ) -> Result<(), LoaderError> {
        let module = self
            .resolver
            .load(file)
            .map_err(|source| LoaderError::Unresolved {
                path: file.to_path_buf(),
                source,
            })?;
        let Module::Route(provider) = module else {
            return Err(LoaderError::NotARoute {
                path: file.to_path_buf(),
            });
        };
        let route = provider
            .instantiate(&self.params)
            .map_err(|source| LoaderError::Factory {
                path: file.to_path_buf(),
                source,
            })?;

        let method = route.method().clone();
        let path = route.path().to_string();
        let chain = composer.chain(route)?;
        info!(
            method = %method,
            path = %path,
            file = %file.display(),
            stages = chain.stage_count(),
            "Route loaded"
        );
        router.register(method, &path, chain);
        Ok(())
    }
}
