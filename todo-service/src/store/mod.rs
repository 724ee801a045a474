//! Task persistence
//!
//! One trait, two backends: an in-memory map and a SQLite table. Both assign
//! ids monotonically starting at 1.

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::MemoryTodoStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteTodoStore;

use std::sync::Arc;
use todo_core::{config_error, Todo, TodoResult};

/// Storage operations on the single task entity
#[async_trait::async_trait]
pub trait TodoStore: Send + Sync {
    /// Insert a new, not yet completed task
    async fn add(&self, text: &str) -> TodoResult<Todo>;

    /// All tasks ordered by id
    async fn list(&self) -> TodoResult<Vec<Todo>>;

    /// Mark a task completed; false when the id does not exist
    async fn complete(&self, id: i64) -> TodoResult<bool>;

    /// Replace a task's text; false when the id does not exist
    async fn update_text(&self, id: i64, text: &str) -> TodoResult<bool>;

    /// Remove a task, returning it if it existed
    async fn delete(&self, id: i64) -> TodoResult<Option<Todo>>;

    /// Short backend name for logs and health output
    fn backend(&self) -> &'static str;
}

/// Create a store from a database URL (`memory` or `sqlite:...`)
pub async fn create_store(database_url: &str) -> TodoResult<Arc<dyn TodoStore>> {
    if database_url == "memory" {
        return Ok(Arc::new(MemoryTodoStore::new()));
    }

    if database_url.starts_with("sqlite:") {
        return connect_sqlite(database_url).await;
    }

    Err(config_error!(
        format!("Unsupported database URL: {}", database_url),
        "store"
    ))
}

#[cfg(feature = "sqlite")]
async fn connect_sqlite(database_url: &str) -> TodoResult<Arc<dyn TodoStore>> {
    Ok(Arc::new(SqliteTodoStore::connect(database_url).await?))
}

#[cfg(not(feature = "sqlite"))]
async fn connect_sqlite(database_url: &str) -> TodoResult<Arc<dyn TodoStore>> {
    Err(config_error!(
        format!("SQLite support is not compiled in: {}", database_url),
        "store"
    ))
}
