//! Request and response types shared by the handlers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use todo_core::TodoError;
use todo_service::{AuthenticatedUser, Permission, Role};

use crate::auth::ErrorBody;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
    pub store: String,
}

/// Body of `POST /api/todos` and `PUT /api/todos/{id}`
#[derive(Debug, Deserialize)]
pub struct TodoTextRequest {
    pub text: String,
}

/// `GET /api/me`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoAmIResponse {
    pub user: AuthenticatedUser,
    pub effective_permissions: BTreeSet<Permission>,
}

/// `GET /api/admin/permissions`
#[derive(Debug, Serialize, Deserialize)]
pub struct PermissionTablesResponse {
    pub roles: BTreeMap<Role, BTreeSet<Permission>>,
    pub tools: BTreeMap<String, BTreeSet<Permission>>,
}

/// Handler failure rendered with the same body shape as auth rejections
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody::new(error),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.body = self.body.with_message(message);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<TodoError> for ApiError {
    fn from(error: TodoError) -> Self {
        error.log();
        match &error {
            TodoError::Validation { message, .. } => {
                ApiError::new(StatusCode::BAD_REQUEST, "Invalid request").with_message(message.clone())
            }
            TodoError::NotFound { resource, .. } => {
                ApiError::new(StatusCode::NOT_FOUND, "Not found").with_message(resource.clone())
            }
            TodoError::UnknownTool { .. } => ApiError::new(StatusCode::BAD_REQUEST, "Unknown tool"),
            _ => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
