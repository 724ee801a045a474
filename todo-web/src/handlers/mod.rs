//! HTTP request handlers for the TODO tool server
//!
//! This module contains all the HTTP request handlers organized by functionality.

pub mod admin;
pub mod health;
pub mod mcp;
pub mod todos;
pub mod types;

pub use admin::*;
pub use health::*;
pub use mcp::handle_mcp;
pub use todos::*;

pub use types::*;
