//! Authentication and authorization for the HTTP surface
//!
//! Authentication turns request headers into an [`AuthenticatedUser`] or an
//! [`AuthError`]. Authorization (see [`guards`]) then checks that identity
//! against the permission model. Authentication always runs first.

pub mod api_keys;
pub mod guards;
pub mod jwt;


pub use api_keys::ApiKeyAllowList;
pub use guards::{guard_middleware, AccessDenied, Authorizer, Guard, GuardLayerState};
pub use jwt::{AuthError, Claims, JwtIssuer, JwtVerifier};

use crate::AppState;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use todo_core::{LogPolicy, TodoConfig};
use todo_service::{AuthenticatedUser, Permission, PermissionModel, Role};
use tracing::{info, warn};

/// Header carrying service credentials
pub const API_KEY_HEADER: &str = "x-api-key";

/// Remaining lifetime at or below which a token triggers an expiry warning
pub const EXPIRY_WARNING_SECS: i64 = 300;

/// JSON body of every authentication or authorization rejection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// A single permission or role, or a list of permissions for tools
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_role: Option<Role>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
            tool: None,
            required: None,
            user_role: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    pub fn with_required(mut self, required: impl Serialize) -> Self {
        self.required = serde_json::to_value(required).ok();
        self
    }

    pub fn with_user_role(mut self, role: Role) -> Self {
        self.user_role = Some(role);
        self
    }
}

/// Seconds left on the identity when it is close enough to expiry to warn
pub fn expiry_advisory(user: &AuthenticatedUser, now: i64) -> Option<i64> {
    user.seconds_until_expiry(now)
        .filter(|remaining| *remaining <= EXPIRY_WARNING_SECS)
}

/// Token from an `Authorization: Bearer <token>` header
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn has_bearer_scheme(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("Bearer "))
}

/// Turns request headers into a caller identity
#[derive(Clone)]
pub struct Authenticator {
    verifier: JwtVerifier,
    api_keys: ApiKeyAllowList,
    service_permissions: BTreeSet<Permission>,
    log_policy: LogPolicy,
}

impl Authenticator {
    /// Service callers receive the full admin permission set from `model`
    pub fn new(
        verifier: JwtVerifier,
        api_keys: ApiKeyAllowList,
        model: &PermissionModel,
        log_policy: LogPolicy,
    ) -> Self {
        Self {
            verifier,
            api_keys,
            service_permissions: model.permissions_for_role(Role::Admin),
            log_policy,
        }
    }

    pub fn from_config(config: &TodoConfig, model: &PermissionModel) -> Self {
        Self::new(
            JwtVerifier::from_settings(&config.auth),
            ApiKeyAllowList::new(&config.auth.api_keys),
            model,
            LogPolicy::new(config.log_mode),
        )
    }

    pub fn verifier(&self) -> &JwtVerifier {
        &self.verifier
    }

    pub fn api_keys(&self) -> &ApiKeyAllowList {
        &self.api_keys
    }

    /// Bearer-token flow
    pub fn authenticate_bearer(&self, headers: &HeaderMap) -> Result<AuthenticatedUser, AuthError> {
        self.authenticate_bearer_at(headers, Utc::now().timestamp())
    }

    /// Bearer-token flow against an explicit clock
    pub fn authenticate_bearer_at(
        &self,
        headers: &HeaderMap,
        now: i64,
    ) -> Result<AuthenticatedUser, AuthError> {
        let policy = self.log_policy;

        let Some(token) = bearer_token(headers) else {
            warn!("Authentication failed: no bearer token provided");
            return Err(AuthError::MissingBearer);
        };

        let user = self.verifier.verify_at(token, now).map_err(|e| {
            warn!(reason = %policy.redact(&e), "Authentication failed");
            e
        })?;

        if let Some(remaining) = expiry_advisory(&user, now) {
            warn!(
                user = %policy.redact(&user.id),
                seconds_left = %policy.redact(remaining),
                "Token expiring soon"
            );
        }

        info!(
            user = %policy.redact(&user.id),
            role = %policy.redact(user.role),
            "User authenticated"
        );
        Ok(user)
    }

    /// Service-credential flow
    pub fn authenticate_api_key(&self, headers: &HeaderMap) -> Result<AuthenticatedUser, AuthError> {
        let presented = headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        if !self.api_keys.contains(presented) {
            warn!("API key authentication failed");
            return Err(AuthError::InvalidApiKey);
        }

        info!("Service authenticated via API key");
        Ok(AuthenticatedUser::service(self.service_permissions.clone()))
    }

    /// Bearer when the `Bearer` scheme is present, otherwise API key, otherwise reject
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<AuthenticatedUser, AuthError> {
        if has_bearer_scheme(headers) {
            self.authenticate_bearer(headers)
        } else if headers.contains_key(API_KEY_HEADER) {
            self.authenticate_api_key(headers)
        } else {
            warn!("No authentication method provided");
            Err(AuthError::MissingCredentials)
        }
    }
}

/// Extracts the caller through the combined flow
///
/// Reuses an identity already placed in request extensions by
/// [`guard_middleware`], so a guarded route authenticates once.
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(user.clone());
        }

        state.authenticator.authenticate(&parts.headers)
    }
}
