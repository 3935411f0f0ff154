//! Bookshelf application library
//!
//! Authors and their books over a REST API, plus the bootstrap entry points
//! shared by the server binary and the CLI.

pub mod app;
pub mod modules;
pub mod utils;

/// Re-export commonly used types
pub use modules::*;
