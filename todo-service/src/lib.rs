//! Todo Service - application layer of the TODO tool server
//!
//! This crate holds everything that does not depend on HTTP:
//!
//! - **auth**: permissions, roles and the authenticated identity
//! - **store**: task persistence (in-memory and SQLite)
//! - **tools**: the tool catalogue and dispatcher invoked over JSON-RPC

pub mod auth;
pub mod store;
pub mod tools;

pub use auth::{AuthenticatedUser, Permission, PermissionModel, Role};
pub use store::{create_store, MemoryTodoStore, TodoStore};
pub use tools::{ToolDefinition, TodoTools};

#[cfg(feature = "sqlite")]
pub use store::SqliteTodoStore;
