//! # CLI Module
//!
//! The `kudy` command line.
//!
//! ## Commands
//!
//! ### `serve`
//!
//! Load a route tree with the built-in registry and serve it:
//!
//! ```bash
//! kudy serve --routes ./routes --addr 127.0.0.1:8080
//! ```
//!
//! Options:
//! - `--config <FILE>` - YAML service configuration
//! - `--routes <DIR>` - Route tree root
//! - `--addr <ADDR>` - Listen address
//! - `--no-recursive` - Skip subdirectories
//!
//! The server stops on SIGINT or SIGTERM.
//!
//! ### `routes`
//!
//! Load a route tree and print what would be served:
//!
//! ```bash
//! kudy routes --routes ./routes
//! ```

mod commands;


pub use commands::{
    effective_config, format_routes, load_router, load_table, run, run_cli, Cli, Commands,
};
