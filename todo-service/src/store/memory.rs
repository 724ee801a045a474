use super::TodoStore;
use std::collections::BTreeMap;
use todo_core::{Todo, TodoResult};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    todos: BTreeMap<i64, Todo>,
}

/// In-memory task storage
#[derive(Debug, Default)]
pub struct MemoryTodoStore {
    inner: RwLock<Inner>,
}

impl MemoryTodoStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl TodoStore for MemoryTodoStore {
    async fn add(&self, text: &str) -> TodoResult<Todo> {
        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let todo = Todo::new(inner.next_id, text);
        inner.todos.insert(todo.id, todo.clone());
        debug!("Stored todo {}", todo.id);
        Ok(todo)
    }

    async fn list(&self) -> TodoResult<Vec<Todo>> {
        let inner = self.inner.read().await;
        Ok(inner.todos.values().cloned().collect())
    }

    async fn complete(&self, id: i64) -> TodoResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(match inner.todos.get_mut(&id) {
            Some(todo) => {
                todo.completed = true;
                true
            }
            None => false,
        })
    }

    async fn update_text(&self, id: i64, text: &str) -> TodoResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(match inner.todos.get_mut(&id) {
            Some(todo) => {
                todo.text = text.to_string();
                true
            }
            None => false,
        })
    }

    async fn delete(&self, id: i64) -> TodoResult<Option<Todo>> {
        let mut inner = self.inner.write().await;
        Ok(inner.todos.remove(&id))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
