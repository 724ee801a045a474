//! Authorization guards
//!
//! A guard is a static rule checked against the caller identity. Guards only
//! read the identity and the permission tables; they never change either.

use super::ErrorBody;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use todo_core::LogPolicy;
use todo_service::{AuthenticatedUser, Permission, PermissionModel, Role};
use tracing::{info, warn};

/// A single authorization rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// Caller must hold this permission
    Permission(Permission),
    /// Caller must have exactly this role
    Role(Role),
    /// Caller must hold one of the permissions the tool accepts
    Tool(String),
}

/// Why a guard rejected the request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessDenied {
    #[error("Authentication required")]
    Unauthenticated,
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Missing permission {required} for role {user_role}")]
    InsufficientPermission { required: Permission, user_role: Role },
    #[error("Role {user_role} does not match required role {required}")]
    InsufficientRole { required: Role, user_role: Role },
    #[error("No permission for tool {tool}")]
    InsufficientToolPermission {
        tool: String,
        required: Vec<Permission>,
        user_role: Role,
    },
}

impl AccessDenied {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AccessDenied::Unauthenticated => StatusCode::UNAUTHORIZED,
            AccessDenied::UnknownTool(_) => StatusCode::BAD_REQUEST,
            AccessDenied::InsufficientPermission { .. }
            | AccessDenied::InsufficientRole { .. }
            | AccessDenied::InsufficientToolPermission { .. } => StatusCode::FORBIDDEN,
        }
    }

    pub fn body(&self) -> ErrorBody {
        match self {
            AccessDenied::Unauthenticated => ErrorBody::new("Authentication required"),
            AccessDenied::UnknownTool(_) => ErrorBody::new("Unknown tool"),
            AccessDenied::InsufficientPermission {
                required,
                user_role,
            } => ErrorBody::new("Insufficient permissions")
                .with_required(required)
                .with_user_role(*user_role),
            AccessDenied::InsufficientRole {
                required,
                user_role,
            } => ErrorBody::new("Insufficient role")
                .with_required(required)
                .with_user_role(*user_role),
            AccessDenied::InsufficientToolPermission {
                tool,
                required,
                user_role,
            } => ErrorBody::new("Insufficient permissions for this tool")
                .with_tool(tool)
                .with_required(required)
                .with_user_role(*user_role),
        }
    }
}

impl IntoResponse for AccessDenied {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.body())).into_response()
    }
}

/// Checks guards against the shared permission model
#[derive(Clone)]
pub struct Authorizer {
    model: Arc<PermissionModel>,
    log_policy: LogPolicy,
}

impl Authorizer {
    pub fn new(model: Arc<PermissionModel>, log_policy: LogPolicy) -> Self {
        Self { model, log_policy }
    }

    pub fn check(&self, guard: &Guard, user: Option<&AuthenticatedUser>) -> Result<(), AccessDenied> {
        match guard {
            Guard::Permission(permission) => self.require_permission(*permission, user),
            Guard::Role(role) => self.require_role(*role, user),
            Guard::Tool(name) => self.require_tool(name, user),
        }
    }

    pub fn require_permission(
        &self,
        permission: Permission,
        user: Option<&AuthenticatedUser>,
    ) -> Result<(), AccessDenied> {
        let policy = self.log_policy;
        let Some(user) = user else {
            warn!("Authorization check failed: no authenticated caller");
            return Err(AccessDenied::Unauthenticated);
        };

        if !self.model.has_permission(user, permission) {
            warn!(
                user = %policy.redact(&user.id),
                permission = %policy.redact(permission),
                "Authorization failed: missing permission"
            );
            return Err(AccessDenied::InsufficientPermission {
                required: permission,
                user_role: user.role,
            });
        }

        info!(
            user = %policy.redact(&user.id),
            permission = %policy.redact(permission),
            "Authorization granted"
        );
        Ok(())
    }

    pub fn require_role(&self, role: Role, user: Option<&AuthenticatedUser>) -> Result<(), AccessDenied> {
        let policy = self.log_policy;
        let Some(user) = user else {
            warn!("Role check failed: no authenticated caller");
            return Err(AccessDenied::Unauthenticated);
        };

        // Exact match; roles are not ranked
        if user.role != role {
            warn!(
                user = %policy.redact(&user.id),
                role = %policy.redact(user.role),
                required = %policy.redact(role),
                "Role check failed"
            );
            return Err(AccessDenied::InsufficientRole {
                required: role,
                user_role: user.role,
            });
        }

        info!(user = %policy.redact(&user.id), "Role check passed");
        Ok(())
    }

    /// Unknown tools are rejected before the caller is looked at
    pub fn require_tool(&self, tool: &str, user: Option<&AuthenticatedUser>) -> Result<(), AccessDenied> {
        let policy = self.log_policy;
        let Some(required) = self.model.required_permissions_for_tool(tool) else {
            warn!(tool = %policy.redact(tool), "Unknown tool");
            return Err(AccessDenied::UnknownTool(tool.to_string()));
        };

        let Some(user) = user else {
            warn!(tool = %policy.redact(tool), "Tool access denied: no authenticated caller");
            return Err(AccessDenied::Unauthenticated);
        };

        if !self.model.has_any_permission(user, required) {
            warn!(
                user = %policy.redact(&user.id),
                tool = %policy.redact(tool),
                "Tool access denied"
            );
            return Err(AccessDenied::InsufficientToolPermission {
                tool: tool.to_string(),
                required: required.iter().copied().collect(),
                user_role: user.role,
            });
        }

        info!(
            user = %policy.redact(&user.id),
            tool = %policy.redact(tool),
            "Tool access granted"
        );
        Ok(())
    }
}

/// State for [`guard_middleware`]: the app plus the rule for one route
#[derive(Clone)]
pub struct GuardLayerState {
    pub app: AppState,
    pub guard: Guard,
}

impl GuardLayerState {
    pub fn new(app: AppState, guard: Guard) -> Self {
        Self { app, guard }
    }
}

/// Authenticate, run the route's guard, then hand the identity on
pub async fn guard_middleware(
    State(layer): State<GuardLayerState>,
    mut request: Request,
    next: Next,
) -> Response {
    let user = match layer.app.authenticator.authenticate(request.headers()) {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    if let Err(denied) = layer.app.authorizer.check(&layer.guard, Some(&user)) {
        return denied.into_response();
    }

    request.extensions_mut().insert(user);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use todo_service::tools::names;

    fn authorizer() -> Authorizer {
        Authorizer::new(Arc::new(PermissionModel::standard()), LogPolicy::production())
    }

    fn user(role: Role) -> AuthenticatedUser {
        AuthenticatedUser::new("u-1", role)
    }

    #[test]
    fn test_readonly_cannot_update() {
        let err = authorizer()
            .check(
                &Guard::Permission(Permission::UpdateTodos),
                Some(&user(Role::Readonly)),
            )
            .unwrap_err();

        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        let body = serde_json::to_value(err.body()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "error": "Insufficient permissions",
                "required": "update:todos",
                "userRole": "readonly"
            })
        );
    }

    #[test]
    fn test_missing_identity_is_unauthenticated() {
        let authorizer = authorizer();
        for guard in [
            Guard::Permission(Permission::ReadTodos),
            Guard::Role(Role::Admin),
            Guard::Tool(names::LIST_TODOS.to_string()),
        ] {
            let err = authorizer.check(&guard, None).unwrap_err();
            assert_eq!(err, AccessDenied::Unauthenticated);
            assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn test_role_guard_is_exact() {
        let authorizer = authorizer();
        assert!(authorizer
            .check(&Guard::Role(Role::Admin), Some(&user(Role::Admin)))
            .is_ok());

        // A readonly guard does not admit admins
        let err = authorizer
            .check(&Guard::Role(Role::Readonly), Some(&user(Role::Admin)))
            .unwrap_err();
        let body = serde_json::to_value(err.body()).unwrap();
        assert_eq!(body["error"], "Insufficient role");
        assert_eq!(body["required"], "readonly");
        assert_eq!(body["userRole"], "admin");
    }

    #[test]
    fn test_unknown_tool_even_for_admin() {
        let err = authorizer()
            .check(&Guard::Tool("drop_table".to_string()), Some(&user(Role::Admin)))
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            serde_json::to_value(err.body()).unwrap(),
            serde_json::json!({ "error": "Unknown tool" })
        );
    }

    #[test]
    fn test_tool_guard() {
        let authorizer = authorizer();
        let delete = Guard::Tool(names::DELETE_TODO.to_string());

        assert!(authorizer.check(&delete, Some(&user(Role::Admin))).is_ok());

        let err = authorizer.check(&delete, Some(&user(Role::User))).unwrap_err();
        let body = serde_json::to_value(err.body()).unwrap();
        assert_eq!(body["error"], "Insufficient permissions for this tool");
        assert_eq!(body["tool"], names::DELETE_TODO);
        assert_eq!(body["required"], serde_json::json!(["delete:todos"]));
        assert_eq!(body["userRole"], "user");
    }

    #[test]
    fn test_empty_tool_permission_set_denies() {
        let model = PermissionModel::new(
            PermissionModel::standard().role_table().into_iter().collect(),
            [("locked".to_string(), Default::default())].into_iter().collect(),
        );
        let authorizer = Authorizer::new(Arc::new(model), LogPolicy::production());

        let err = authorizer
            .check(&Guard::Tool("locked".to_string()), Some(&user(Role::Admin)))
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_list_tools_only_caller() {
        let authorizer = authorizer();
        let caller = user(Role::Admin).with_permissions([Permission::ListTools]);

        assert!(authorizer
            .check(&Guard::Permission(Permission::ListTools), Some(&caller))
            .is_ok());
        assert!(authorizer
            .check(&Guard::Permission(Permission::CallTools), Some(&caller))
            .is_err());
        assert!(authorizer
            .check(&Guard::Tool(names::LIST_TODOS.to_string()), Some(&caller))
            .is_err());
    }
}
