//! Tool catalogue and dispatcher
//!
//! Tools are looked up by name and invoked with JSON arguments that are
//! validated before they reach the store. Results are plain text.

use crate::store::TodoStore;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use todo_core::{
    log_operation_error, log_operation_start, log_operation_success, validation_error,
    ErrorContext, TodoError, TodoResult,
};

/// Tool names shared by the dispatcher and the permission table
pub mod names {
    pub const ADD_TODO: &str = "add_todo";
    pub const LIST_TODOS: &str = "list_todos";
    pub const COMPLETE_TODO: &str = "complete_todo";
    pub const DELETE_TODO: &str = "delete_todo";
    pub const UPDATE_TODO_TEXT: &str = "update_todo_text";

    pub const ALL: [&str; 5] = [
        ADD_TODO,
        LIST_TODOS,
        COMPLETE_TODO,
        DELETE_TODO,
        UPDATE_TODO_TEXT,
    ];
}

/// Tool description advertised through `tools/list`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct TextArgs {
    text: String,
}

#[derive(Debug, Deserialize)]
struct IdArgs {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct UpdateTextArgs {
    id: i64,
    text: String,
}

/// Dispatcher over the TODO tools
#[derive(Clone)]
pub struct TodoTools {
    store: Arc<dyn TodoStore>,
}

impl TodoTools {
    pub fn new(store: Arc<dyn TodoStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn TodoStore> {
        &self.store
    }

    /// Every tool this dispatcher can run
    pub fn definitions() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: names::ADD_TODO,
                description: "Add a new TODO item to the list. Provide a text for the task you want to add. Returns a confirmation message with the new TODO id.",
                input_schema: json!({
                    "type": "object",
                    "properties": { "text": { "type": "string" } },
                    "required": ["text"],
                }),
            },
            ToolDefinition {
                name: names::LIST_TODOS,
                description: "List all TODO items. Returns a formatted list of all tasks with their ids, texts, and completion status.",
                input_schema: json!({
                    "type": "object",
                    "properties": {},
                    "required": [],
                }),
            },
            ToolDefinition {
                name: names::COMPLETE_TODO,
                description: "Mark a TODO item as completed. Provide the id of the task to mark as done. Returns a confirmation message or an error if the id does not exist.",
                input_schema: json!({
                    "type": "object",
                    "properties": { "id": { "type": "integer" } },
                    "required": ["id"],
                }),
            },
            ToolDefinition {
                name: names::DELETE_TODO,
                description: "Delete a TODO item from the list. Provide the id of the task to delete. Returns a confirmation message or an error if the id does not exist.",
                input_schema: json!({
                    "type": "object",
                    "properties": { "id": { "type": "integer" } },
                    "required": ["id"],
                }),
            },
            ToolDefinition {
                name: names::UPDATE_TODO_TEXT,
                description: "Update the text of a TODO item. Provide the id of the task and its new text.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer" },
                        "text": { "type": "string" }
                    },
                    "required": ["id", "text"],
                }),
            },
        ]
    }

    /// Invoke a tool by name
    pub async fn call(&self, name: &str, arguments: Value) -> TodoResult<String> {
        log_operation_start!("call_tool", tool = name);

        let result = self.dispatch(name, arguments).await;

        match &result {
            Ok(_) => log_operation_success!("call_tool", tool = name),
            Err(e) => log_operation_error!("call_tool", e, tool = name),
        }

        result
    }

    async fn dispatch(&self, name: &str, arguments: Value) -> TodoResult<String> {
        let arguments = if arguments.is_null() {
            json!({})
        } else {
            arguments
        };

        match name {
            names::ADD_TODO => {
                let args: TextArgs = parse_args(arguments)?;
                let text = require_text(&args.text)?;
                let todo = self.store.add(text).await?;
                Ok(format!("Added TODO: {} (id: {})", todo.text, todo.id))
            }
            names::LIST_TODOS => {
                let todos = self.store.list().await?;
                if todos.is_empty() {
                    Ok("No TODOs found.".to_string())
                } else {
                    Ok(todos
                        .iter()
                        .map(|todo| todo.render_line())
                        .collect::<Vec<_>>()
                        .join("\n"))
                }
            }
            names::COMPLETE_TODO => {
                let args: IdArgs = parse_args(arguments)?;
                let id = require_id(args.id)?;
                if self.store.complete(id).await? {
                    Ok(format!("Marked TODO {} as completed.", id))
                } else {
                    Ok(not_found(id))
                }
            }
            names::DELETE_TODO => {
                let args: IdArgs = parse_args(arguments)?;
                let id = require_id(args.id)?;
                match self.store.delete(id).await? {
                    Some(todo) => Ok(format!("Deleted TODO: {} (id: {})", todo.text, id)),
                    None => Ok(not_found(id)),
                }
            }
            names::UPDATE_TODO_TEXT => {
                let args: UpdateTextArgs = parse_args(arguments)?;
                let id = require_id(args.id)?;
                let text = require_text(&args.text)?;
                if self.store.update_text(id, text).await? {
                    Ok(format!("Updated text for todo with id {} to \"{}\"", id, text))
                } else {
                    Ok(not_found(id))
                }
            }
            _ => Err(TodoError::UnknownTool {
                name: name.to_string(),
                context: ErrorContext::new("tools").with_operation("call"),
            }),
        }
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(arguments: Value) -> TodoResult<T> {
    serde_json::from_value(arguments).map_err(|e| TodoError::Validation {
        message: format!("Invalid arguments: {}", e),
        field: None,
        context: ErrorContext::new("tools").with_operation("parse_args"),
    })
}

fn require_text(text: &str) -> TodoResult<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(validation_error!(
            "Invalid arguments: text: must not be empty",
            "text",
            "tools"
        ));
    }
    Ok(trimmed)
}

fn require_id(id: i64) -> TodoResult<i64> {
    if id < 1 {
        return Err(validation_error!(
            "Invalid arguments: id: must be a positive integer",
            "id",
            "tools"
        ));
    }
    Ok(id)
}

fn not_found(id: i64) -> String {
    format!("TODO with id {} not found.", id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PermissionModel;
    use crate::store::MemoryTodoStore;

    fn tools() -> TodoTools {
        TodoTools::new(Arc::new(MemoryTodoStore::new()))
    }

    #[test]
    fn test_every_tool_has_a_permission_entry() {
        let model = PermissionModel::standard();
        for definition in TodoTools::definitions() {
            assert!(
                model.required_permissions_for_tool(definition.name).is_some(),
                "tool {} has no permission entry",
                definition.name
            );
        }
        let mut defined: Vec<&str> = TodoTools::definitions().iter().map(|d| d.name).collect();
        defined.sort_unstable();
        assert_eq!(defined, model.tool_names());
    }

    #[tokio::test]
    async fn test_add_and_list() {
        let tools = tools();

        let empty = tools.call(names::LIST_TODOS, Value::Null).await.unwrap();
        assert_eq!(empty, "No TODOs found.");

        let added = tools
            .call(names::ADD_TODO, json!({ "text": "Buy milk" }))
            .await
            .unwrap();
        assert_eq!(added, "Added TODO: Buy milk (id: 1)");

        tools
            .call(names::ADD_TODO, json!({ "text": "Walk dog" }))
            .await
            .unwrap();
        tools
            .call(names::COMPLETE_TODO, json!({ "id": 1 }))
            .await
            .unwrap();

        let listed = tools.call(names::LIST_TODOS, json!({})).await.unwrap();
        assert_eq!(listed, "1. Buy milk [x]\n2. Walk dog [ ]");
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let tools = tools();
        tools
            .call(names::ADD_TODO, json!({ "text": "Buy milk" }))
            .await
            .unwrap();

        let updated = tools
            .call(names::UPDATE_TODO_TEXT, json!({ "id": 1, "text": "Buy oat milk" }))
            .await
            .unwrap();
        assert_eq!(updated, "Updated text for todo with id 1 to \"Buy oat milk\"");

        let deleted = tools
            .call(names::DELETE_TODO, json!({ "id": 1 }))
            .await
            .unwrap();
        assert_eq!(deleted, "Deleted TODO: Buy oat milk (id: 1)");

        let missing = tools
            .call(names::DELETE_TODO, json!({ "id": 1 }))
            .await
            .unwrap();
        assert_eq!(missing, "TODO with id 1 not found.");

        let missing = tools
            .call(names::UPDATE_TODO_TEXT, json!({ "id": 9, "text": "x" }))
            .await
            .unwrap();
        assert_eq!(missing, "TODO with id 9 not found.");
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        let tools = tools();

        let err = tools.call(names::ADD_TODO, json!({})).await.unwrap_err();
        assert!(matches!(err, TodoError::Validation { .. }));
        assert!(err.to_string().contains("Invalid arguments"));

        let err = tools
            .call(names::ADD_TODO, json!({ "text": "   " }))
            .await
            .unwrap_err();
        assert!(matches!(err, TodoError::Validation { .. }));

        let err = tools
            .call(names::COMPLETE_TODO, json!({ "id": "one" }))
            .await
            .unwrap_err();
        assert!(matches!(err, TodoError::Validation { .. }));

        let err = tools
            .call(names::COMPLETE_TODO, json!({ "id": 0 }))
            .await
            .unwrap_err();
        assert!(matches!(err, TodoError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let err = tools().call("drop_table", json!({})).await.unwrap_err();
        assert!(matches!(err, TodoError::UnknownTool { .. }));
    }
}
