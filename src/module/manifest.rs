//! Declarative module manifests.
//!
//! A route file looks like this (YAML shown; JSON and TOML carry the same
//! keys):
//!
//! ```yaml
//! method: post
//! path: /body-schema
//! bodySchema:
//!   type: object
//!   properties:
//!     id: { type: integer }
//!   required: [id]
//! preMiddleware: audit
//! middleware: [authenticate, rateLimit]
//! handler: createThing
//! ```
//!
//! A route built at load time names a registered factory instead:
//!
//! ```yaml
//! factory: getAsyncRoute
//! ```
//!
//! A directory index decorates the router for its directory. `mount`
//! creates a child router under the prefix, `decorator` runs a registered
//! decorator, and `middleware` attaches router-level middleware, in that
//! order:
//!
//! ```yaml
//! mount: /v0
//! decorator: auditTrail
//! middleware: tracing
//! ```

use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{Decorator, Module, ModuleResolver, Registry};
use crate::error::ResolveError;
use crate::middleware::Middleware;
use crate::route::{parse_method, RouteDefinition, RouteProvider};
use crate::router::RouterNode;
use crate::schema::Schema;

/// File stem of a directory's index entry.
pub const INDEX_STEM: &str = "index";

/// Extensions a manifest may use, in index lookup order.
pub const MANIFEST_EXTENSIONS: [&str; 4] = ["yaml", "yml", "json", "toml"];

/// A single name or a list of names.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
enum OneOrMany {
    #[default]
    None,
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn names(&self) -> &[String] {
        match self {
            OneOrMany::None => &[],
            OneOrMany::One(name) => std::slice::from_ref(name),
            OneOrMany::Many(names) => names,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct Manifest {
    method: Option<String>,
    path: Option<String>,
    full_path: Option<String>,
    body_schema: Option<Value>,
    query_schema: Option<Value>,
    parameters_schema: Option<Value>,
    #[serde(default)]
    pre_middleware: OneOrMany,
    #[serde(default)]
    middleware: OneOrMany,
    handler: Option<String>,
    factory: Option<String>,
    decorator: Option<String>,
    mount: Option<String>,
}

impl Manifest {
    fn declares_inline_route(&self) -> bool {
        self.method.is_some() || self.path.is_some() || self.handler.is_some()
    }

    fn declares_decorator(&self) -> bool {
        self.decorator.is_some() || self.mount.is_some()
    }
}

/// Resolves manifest files against a [`Registry`].
pub struct ManifestResolver<P> {
    registry: Arc<Registry<P>>,
}

impl<P> Clone for ManifestResolver<P> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<P> fmt::Debug for ManifestResolver<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManifestResolver")
            .field("registry", &self.registry)
            .finish()
    }
}

impl<P: 'static> ManifestResolver<P> {
    #[must_use]
    pub fn new(registry: Registry<P>) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Registry<P> {
        &self.registry
    }

    fn read(path: &Path) -> Result<Manifest, ResolveError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let text = std::fs::read_to_string(path)?;
        let manifest = match ext.as_str() {
            "yaml" | "yml" => {
                if text.trim().is_empty() {
                    Manifest::default()
                } else {
                    serde_yaml::from_str(&text)?
                }
            }
            "json" => serde_json::from_str(&text)?,
            "toml" => toml::from_str(&text)?,
            _ => return Err(ResolveError::UnsupportedExtension(ext)),
        };
        Ok(manifest)
    }

    fn bind(&self, manifest: Manifest) -> Result<Module<P>, ResolveError> {
        if let Some(factory) = &manifest.factory {
            if manifest.declares_inline_route() || manifest.declares_decorator() {
                return Err(ResolveError::Shape(
                    "a factory together with other route or index keys",
                ));
            }
            let factory = self.registry.factory(factory)?;
            return Ok(Module::Route(RouteProvider::Factory(factory)));
        }

        if manifest.declares_inline_route() {
            if manifest.declares_decorator() {
                return Err(ResolveError::Shape("both route and index keys"));
            }
            return self.bind_route(manifest);
        }

        if manifest.declares_decorator() || !manifest.middleware.names().is_empty() {
            return self.bind_decorator(manifest);
        }

        if !manifest.pre_middleware.names().is_empty()
            || manifest.full_path.is_some()
            || manifest.body_schema.is_some()
            || manifest.query_schema.is_some()
            || manifest.parameters_schema.is_some()
        {
            return Err(ResolveError::Shape("route keys without method, path and handler"));
        }

        Ok(Module::Empty)
    }

    fn bind_route(&self, manifest: Manifest) -> Result<Module<P>, ResolveError> {
        let (Some(method), Some(path), Some(handler)) =
            (manifest.method, manifest.path, manifest.handler)
        else {
            return Err(ResolveError::Shape(
                "an incomplete route: method, path and handler are all required",
            ));
        };
        let method = parse_method(&method).map_err(ResolveError::InvalidMethod)?;
        let handler = self.registry.handler(&handler)?;

        let mut route = RouteDefinition::from_handler(method, path, handler);
        if let Some(full_path) = manifest.full_path {
            route = route.with_full_path(full_path);
        }
        if let Some(schema) = manifest.body_schema {
            route = route.with_body_schema(Schema::new(schema));
        }
        if let Some(schema) = manifest.query_schema {
            route = route.with_query_schema(Schema::new(schema));
        }
        if let Some(schema) = manifest.parameters_schema {
            route = route.with_parameters_schema(Schema::new(schema));
        }
        for name in manifest.pre_middleware.names() {
            route = route.with_pre_middleware(self.registry.middleware(name)?);
        }
        for name in manifest.middleware.names() {
            route = route.with_middleware(self.registry.middleware(name)?);
        }
        Ok(Module::Route(RouteProvider::Instance(route.into_route())))
    }

    fn bind_decorator(&self, manifest: Manifest) -> Result<Module<P>, ResolveError> {
        let decorator = manifest
            .decorator
            .as_deref()
            .map(|name| self.registry.decorator(name))
            .transpose()?;
        let middleware: Vec<Arc<dyn Middleware>> = manifest
            .middleware
            .names()
            .iter()
            .map(|name| self.registry.middleware(name))
            .collect::<Result<_, _>>()?;
        let mount = manifest.mount;

        let composed: Decorator<P> = Arc::new(
            move |parent: &RouterNode, params: &P| -> anyhow::Result<RouterNode> {
                let mut router = parent.clone();
                if let Some(prefix) = &mount {
                    let child = RouterNode::new();
                    parent.mount(prefix, &child)?;
                    router = child;
                }
                if let Some(decorator) = &decorator {
                    router = decorator(&router, params)?;
                }
                for mw in &middleware {
                    router.use_middleware(Arc::clone(mw));
                }
                Ok(router)
            },
        );
        Ok(Module::Decorator(composed))
    }
}

impl<P: 'static> ModuleResolver<P> for ManifestResolver<P> {
    fn resolve_index(&self, dir: &Path) -> Option<PathBuf> {
        MANIFEST_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{INDEX_STEM}.{ext}")))
            .find(|candidate| candidate.is_file())
    }

    fn load(&self, path: &Path) -> Result<Module<P>, ResolveError> {
        let manifest = Self::read(path)?;
        self.bind(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::SetRequestHeader;
    use crate::response::Response;
    use http::Method;
    use std::fs;

    fn resolver() -> ManifestResolver<String> {
        let mut registry = Registry::with_builtins();
        registry
            .register_middleware("marker", Arc::new(SetRequestHeader::new("x-marker", "1")))
            .register_factory("fromParams", |path: &String| {
                Ok(RouteDefinition::get(path.clone(), |_ctx| Ok(Response::default())).into_route())
            });
        ManifestResolver::new(registry)
    }

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_yaml_route_with_schema_and_middleware() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "PostBody.yaml",
            "method: post\npath: /body-schema\nbodySchema:\n  type: object\n  required: [id]\nmiddleware: [marker]\nhandler: empty\n",
        );
        let Module::Route(RouteProvider::Instance(route)) = resolver().load(&path).unwrap() else {
            panic!("expected a route instance");
        };
        assert_eq!(route.method(), &Method::POST);
        assert_eq!(route.path(), "/body-schema");
        assert!(route.body_schema().is_some());
        assert_eq!(route.middleware().len(), 1);
        assert!(route.pre_middleware().is_empty());
    }

    #[test]
    fn test_json_and_toml_routes() {
        let dir = tempfile::tempdir().unwrap();
        let json = write(
            dir.path(),
            "a.json",
            r#"{"method": "GET", "path": "/a", "handler": "echo", "preMiddleware": "marker"}"#,
        );
        let toml = write(
            dir.path(),
            "b.toml",
            "method = \"delete\"\npath = \"/b\"\nhandler = \"empty\"\n",
        );
        let resolver = resolver();
        let Module::Route(RouteProvider::Instance(a)) = resolver.load(&json).unwrap() else {
            panic!("expected a route instance");
        };
        assert_eq!(a.pre_middleware().len(), 1);
        let Module::Route(RouteProvider::Instance(b)) = resolver.load(&toml).unwrap() else {
            panic!("expected a route instance");
        };
        assert_eq!(b.method(), &Method::DELETE);
    }

    #[test]
    fn test_factory_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "GetAsync.yaml", "factory: fromParams\n");
        let Module::Route(provider) = resolver().load(&path).unwrap() else {
            panic!("expected a route");
        };
        let route = provider.instantiate(&"/async".to_string()).unwrap();
        assert_eq!(route.path(), "/async");
    }

    #[test]
    fn test_index_manifest_is_a_decorator() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "index.yaml", "mount: /v0\nmiddleware: marker\n");
        let Module::Decorator(decorate) = resolver().load(&path).unwrap() else {
            panic!("expected a decorator");
        };
        let root = RouterNode::new();
        let child = decorate(&root, &String::new()).unwrap();
        assert!(!child.ptr_eq(&root));
        child.get("/test", |_ctx| Ok(Response::default()));
        let routes = root.routes().unwrap();
        assert_eq!(routes[0].path, "/v0/test");
    }

    #[test]
    fn test_empty_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "Nothing.yaml", "");
        assert!(matches!(resolver().load(&path).unwrap(), Module::Empty));
    }

    #[test]
    fn test_errors() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver();

        let path = write(dir.path(), "a.yaml", "method: GET\npath: /a\n");
        assert!(matches!(resolver.load(&path), Err(ResolveError::Shape(_))));

        let path = write(dir.path(), "b.yaml", "method: GET\npath: /b\nhandler: nope\n");
        assert!(matches!(
            resolver.load(&path),
            Err(ResolveError::UnknownName { kind: "handler", .. })
        ));

        let path = write(dir.path(), "c.yaml", "method: 'NOT VALID'\npath: /c\nhandler: echo\n");
        assert!(matches!(resolver.load(&path), Err(ResolveError::InvalidMethod(_))));

        let path = write(dir.path(), "d.yaml", "methd: GET\n");
        assert!(matches!(resolver.load(&path), Err(ResolveError::Parse(_))));

        let path = write(dir.path(), "e.md", "# notes\n");
        assert!(matches!(
            resolver.load(&path),
            Err(ResolveError::UnsupportedExtension(_))
        ));
    }

    #[test]
    fn test_resolve_index_prefers_yaml() {
        let dir = tempfile::tempdir().unwrap();
        assert!(resolver().resolve_index(dir.path()).is_none());
        write(dir.path(), "index.json", "{}");
        write(dir.path(), "index.yaml", "{}");
        assert_eq!(
            resolver().resolve_index(dir.path()),
            Some(dir.path().join("index.yaml"))
        );
    }
}
