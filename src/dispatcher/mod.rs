//! # Dispatcher Module
//!
//! Runs matched routes. The route table hands each matched request to the
//! route's [`Chain`], which walks router-level middleware, the composed
//! validation and user middleware stages, and finally the handler, with
//! panic recovery around every step.

mod core;

pub use core::Chain;
