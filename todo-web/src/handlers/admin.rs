//! Identity and permission table introspection

use super::types::{PermissionTablesResponse, WhoAmIResponse};
use crate::AppState;
use axum::{extract::State, response::Json};
use todo_service::AuthenticatedUser;

/// The caller's identity and the permissions that apply to it
pub async fn whoami(State(state): State<AppState>, user: AuthenticatedUser) -> Json<WhoAmIResponse> {
    let effective_permissions = state.permissions.effective_permissions(&user);
    Json(WhoAmIResponse {
        user,
        effective_permissions,
    })
}

/// Dump of the role and tool tables (admin only)
pub async fn permission_tables(State(state): State<AppState>) -> Json<PermissionTablesResponse> {
    Json(PermissionTablesResponse {
        roles: state.permissions.role_table(),
        tools: state.permissions.tool_table(),
    })
}
