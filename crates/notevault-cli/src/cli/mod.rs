//! # CLI Layer
//!
//! The only place that knows about terminal I/O, argument parsing and exit
//! codes. Everything it does goes through `notevault::api::Vault`.
//!
//! - [`setup`]: clap definitions
//! - `commands`: dispatch and handlers
//! - `render`: human-readable output

mod commands;
mod render;
pub mod setup;

pub use commands::run;
