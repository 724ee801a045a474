use super::TodoStore;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use todo_core::{storage_error, Todo, TodoResult};
use tracing::{debug, info};

/// SQLite-backed task storage
pub struct SqliteTodoStore {
    pool: SqlitePool,
}

impl SqliteTodoStore {
    /// Connect and create the table if needed
    pub async fn connect(database_url: &str) -> TodoResult<Self> {
        info!("Connecting to database: {}", database_url);

        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");

        let mut options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| storage_error!("Invalid SQLite URL", "sqlite", e))?
            .create_if_missing(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // An in-memory database lives and dies with its connection
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| storage_error!("Failed to connect to database", "sqlite", e))?;

        let store = Self { pool };
        store.create_tables().await?;
        info!("Database initialized");

        Ok(store)
    }

    async fn create_tables(&self) -> TodoResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS todos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                text TEXT NOT NULL,
                completed INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| storage_error!("Failed to create todos table", "sqlite", e))?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl TodoStore for SqliteTodoStore {
    async fn add(&self, text: &str) -> TodoResult<Todo> {
        debug!("Adding todo");
        let result = sqlx::query("INSERT INTO todos (text, completed) VALUES (?, 0)")
            .bind(text)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_error!("Failed to insert todo", "sqlite", e))?;

        Ok(Todo::new(result.last_insert_rowid(), text))
    }

    async fn list(&self) -> TodoResult<Vec<Todo>> {
        let rows = sqlx::query("SELECT id, text, completed FROM todos ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error!("Failed to list todos", "sqlite", e))?;

        rows.into_iter()
            .map(|row| -> Result<Todo, sqlx::Error> {
                Ok(Todo {
                    id: row.try_get("id")?,
                    text: row.try_get("text")?,
                    completed: row.try_get::<i64, _>("completed")? != 0,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| storage_error!("Failed to decode todo row", "sqlite", e))
    }

    async fn complete(&self, id: i64) -> TodoResult<bool> {
        let result = sqlx::query("UPDATE todos SET completed = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_error!("Failed to complete todo", "sqlite", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_text(&self, id: i64, text: &str) -> TodoResult<bool> {
        let result = sqlx::query("UPDATE todos SET text = ? WHERE id = ?")
            .bind(text)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_error!("Failed to update todo", "sqlite", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: i64) -> TodoResult<Option<Todo>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| storage_error!("Failed to start transaction", "sqlite", e))?;

        let row = sqlx::query("SELECT id, text, completed FROM todos WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| storage_error!("Failed to load todo", "sqlite", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let todo = Todo {
            id: row
                .try_get("id")
                .map_err(|e| storage_error!("Failed to decode todo row", "sqlite", e))?,
            text: row
                .try_get("text")
                .map_err(|e| storage_error!("Failed to decode todo row", "sqlite", e))?,
            completed: row
                .try_get::<i64, _>("completed")
                .map_err(|e| storage_error!("Failed to decode todo row", "sqlite", e))?
                != 0,
        };

        sqlx::query("DELETE FROM todos WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| storage_error!("Failed to delete todo", "sqlite", e))?;

        tx.commit()
            .await
            .map_err(|e| storage_error!("Failed to commit delete", "sqlite", e))?;

        Ok(Some(todo))
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}
