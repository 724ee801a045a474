//! REST handlers over the task store
//!
//! Every route here sits behind a guard layer, so the caller has already been
//! authenticated and authorized when these run.

use super::types::{ApiError, TodoTextRequest};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use todo_core::{not_found_error, validation_error, Todo, TodoResult};
use todo_service::AuthenticatedUser;
use tracing::info;

fn validated_text(request: &TodoTextRequest) -> TodoResult<&str> {
    let text = request.text.trim();
    if text.is_empty() {
        return Err(validation_error!("text must not be empty", "text", "todos"));
    }
    Ok(text)
}

fn todo_not_found(id: i64) -> ApiError {
    not_found_error!(format!("TODO with id {} not found.", id), "todos").into()
}

/// List all tasks
pub async fn list_todos(State(state): State<AppState>) -> Result<Json<Vec<Todo>>, ApiError> {
    Ok(Json(state.store().list().await?))
}

/// Create a task
pub async fn create_todo(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<TodoTextRequest>,
) -> Result<(StatusCode, Json<Todo>), ApiError> {
    let text = validated_text(&request)?;
    let todo = state.store().add(text).await?;
    info!(id = todo.id, role = %user.role, "Created todo");
    Ok((StatusCode::CREATED, Json(todo)))
}

/// Mark a task completed
pub async fn complete_todo(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if state.store().complete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(todo_not_found(id))
    }
}

/// Replace a task's text
pub async fn update_todo(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<TodoTextRequest>,
) -> Result<StatusCode, ApiError> {
    let text = validated_text(&request)?;
    if state.store().update_text(id, text).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(todo_not_found(id))
    }
}

/// Delete a task, returning it
pub async fn delete_todo(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Todo>, ApiError> {
    match state.store().delete(id).await? {
        Some(todo) => {
            info!(id, role = %user.role, "Deleted todo");
            Ok(Json(todo))
        }
        None => Err(todo_not_found(id)),
    }
}
