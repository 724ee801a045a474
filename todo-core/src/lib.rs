//! Todo Core - shared infrastructure for the TODO tool server
//!
//! Error types, logging bootstrap, configuration and the task entity used by
//! every other crate in the workspace.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use types::*;

// Re-export commonly used external types
pub use tracing;
