//! Caller identity
//!
//! One value per request, built from verified token claims or synthesized for
//! service credentials. Never persisted.

use super::permissions::{Permission, Role};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Identifier given to callers that authenticate with an API key
pub const SERVICE_USER_ID: &str = "service";
/// Email given to callers that authenticate with an API key
pub const SERVICE_USER_EMAIL: &str = "service@internal";

/// Authenticated caller information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// Subject identifier
    pub id: String,
    /// Informational only
    pub email: Option<String>,
    pub role: Role,
    /// Explicit grant; replaces the role-derived set when present
    pub permissions: Option<BTreeSet<Permission>>,
    /// Seconds since epoch
    pub issued_at: Option<i64>,
    /// Seconds since epoch
    pub expires_at: Option<i64>,
}

impl AuthenticatedUser {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            email: None,
            role,
            permissions: None,
            issued_at: None,
            expires_at: None,
        }
    }

    /// Identity used for service-to-service callers
    pub fn service(permissions: BTreeSet<Permission>) -> Self {
        Self::new(SERVICE_USER_ID, Role::Admin)
            .with_email(SERVICE_USER_EMAIL)
            .with_permissions(permissions)
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.permissions = Some(permissions.into_iter().collect());
        self
    }

    pub fn with_timestamps(mut self, issued_at: Option<i64>, expires_at: Option<i64>) -> Self {
        self.issued_at = issued_at;
        self.expires_at = expires_at;
        self
    }

    /// Seconds left before expiry, if the identity expires at all
    pub fn seconds_until_expiry(&self, now: i64) -> Option<i64> {
        self.expires_at.map(|exp| exp - now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_identity() {
        let user = AuthenticatedUser::service(BTreeSet::from([Permission::ReadTodos]));
        assert_eq!(user.id, SERVICE_USER_ID);
        assert_eq!(user.email.as_deref(), Some(SERVICE_USER_EMAIL));
        assert_eq!(user.role, Role::Admin);
        assert!(user.expires_at.is_none());
    }

    #[test]
    fn test_seconds_until_expiry() {
        let user = AuthenticatedUser::new("u", Role::User).with_timestamps(Some(100), Some(400));
        assert_eq!(user.seconds_until_expiry(250), Some(150));
        assert_eq!(AuthenticatedUser::new("u", Role::User).seconds_until_expiry(0), None);
    }
}
