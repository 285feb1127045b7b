use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::ServiceConfig;
use crate::loader::{LoaderOptions, RouteLoader};
use crate::logging::init_logging;
use crate::module::{ManifestResolver, Registry};
use crate::router::{RouteSummary, RouteTable, RouterNode};
use crate::server::{AppService, HttpServer};

/// Command-line interface for kudy
#[derive(Parser)]
#[command(name = "kudy")]
#[command(about = "Serve a directory of route manifests", long_about = None)]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Load a route tree and serve it
    Serve {
        /// YAML service configuration
        #[arg(short, long, env = "KUDY_CONFIG")]
        config: Option<PathBuf>,

        /// Route tree root (overrides config and KUDY_ROUTES_DIR)
        #[arg(short, long)]
        routes: Option<PathBuf>,

        /// Address and port to bind the server to
        #[arg(long)]
        addr: Option<String>,

        /// Load only the top-level directory
        #[arg(long, default_value_t = false)]
        no_recursive: bool,
    },
    /// Load a route tree and print the registered routes
    Routes {
        /// YAML service configuration
        #[arg(short, long, env = "KUDY_CONFIG")]
        config: Option<PathBuf>,

        /// Route tree root (overrides config and KUDY_ROUTES_DIR)
        #[arg(short, long)]
        routes: Option<PathBuf>,

        /// Load only the top-level directory
        #[arg(long, default_value_t = false)]
        no_recursive: bool,
    },
}

/// Resolve the effective configuration: file, then environment, then flags.
///
/// # Errors
///
/// Returns an error if the config file cannot be read or a variable is invalid.
pub fn effective_config(
    config: Option<&Path>,
    routes: Option<&Path>,
    addr: Option<&str>,
    no_recursive: bool,
) -> Result<ServiceConfig> {
    let mut resolved = ServiceConfig::resolve(config)?;
    if let Some(routes) = routes {
        resolved.routes.dir = routes.to_path_buf();
    }
    if let Some(addr) = addr {
        resolved.server.addr = addr.to_string();
    }
    if no_recursive {
        resolved.routes.recursive = false;
    }
    Ok(resolved)
}

/// Load the configured route tree with the built-in registry.
///
/// Route factories and decorators receive the service configuration as
/// their construct parameters.
///
/// # Errors
///
/// Returns an error if loading fails or the router tree has a mount cycle.
pub fn load_router(config: &ServiceConfig) -> Result<RouterNode> {
    let resolver = ManifestResolver::new(Registry::with_builtins());
    let options = LoaderOptions::default().recursive(config.routes.recursive);
    let loader = RouteLoader::with_options(config.clone(), resolver, options);
    let root = RouterNode::new();
    loader
        .append_routes_from_dir(&root, &config.routes.dir)
        .with_context(|| format!("failed to load routes from {}", config.routes.dir.display()))?;
    Ok(root)
}

/// Load the configured route tree and compile it.
///
/// # Errors
///
/// See [`load_router`].
pub fn load_table(config: &ServiceConfig) -> Result<RouteTable> {
    Ok(load_router(config)?.build()?)
}

/// Render route summaries as an aligned table.
#[must_use]
pub fn format_routes(routes: &[RouteSummary]) -> String {
    let width = routes
        .iter()
        .map(|r| r.method.as_str().len())
        .max()
        .unwrap_or(0);
    let mut out = String::new();
    for route in routes {
        out.push_str(&format!(
            "{:width$}  {}  ({} stages)\n",
            route.method.as_str(),
            route.path,
            route.stages,
        ));
    }
    out
}

/// Run the CLI with the process arguments.
///
/// # Errors
///
/// Returns an error if configuration, loading or the server fails.
pub fn run_cli() -> Result<()> {
    run(Cli::parse())
}

/// Run a parsed command line.
///
/// # Errors
///
/// See [`run_cli`].
pub fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Serve {
            config,
            routes,
            addr,
            no_recursive,
        } => {
            let config = effective_config(
                config.as_deref(),
                routes.as_deref(),
                addr.as_deref(),
                *no_recursive,
            )?;
            init_logging(&config.logging)?;
            may::config().set_stack_size(config.server.stack_size);
            info!(
                stack_size = config.server.stack_size,
                routes_dir = %config.routes.dir.display(),
                recursive = config.routes.recursive,
                "Starting kudy"
            );

            let table = load_table(&config)?;
            let service =
                AppService::new(table).with_health_endpoint(config.server.health_endpoint);
            let handle = HttpServer(service)
                .start(config.server.addr.as_str())
                .with_context(|| format!("failed to bind {}", config.server.addr))?;
            handle.wait_ready()?;
            wait_for_shutdown(handle)
        }
        Commands::Routes {
            config,
            routes,
            no_recursive,
        } => {
            let config =
                effective_config(config.as_deref(), routes.as_deref(), None, *no_recursive)?;
            let summaries = load_router(&config)?.routes()?;
            print!("{}", format_routes(&summaries));
            Ok(())
        }
    }
}

#[cfg(unix)]
fn wait_for_shutdown(handle: crate::server::ServerHandle) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("failed to install signal handlers")?;
    if let Some(signal) = signals.forever().next() {
        info!(signal, "Shutdown signal received");
    }
    handle.stop();
    Ok(())
}

#[cfg(not(unix))]
fn wait_for_shutdown(handle: crate::server::ServerHandle) -> Result<()> {
    handle
        .join()
        .map_err(|e| anyhow::anyhow!("server coroutine panicked: {e:?}"))
}
