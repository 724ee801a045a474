//! JWT verification and issuance
//!
//! Tokens are HS256 only. The algorithm is pinned, issuer and audience must
//! match exactly, and `exp` is mandatory with no leeway.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use todo_core::{config_error, AuthSettings, TodoResult};
use todo_service::{AuthenticatedUser, Permission, Role};
use tracing::{debug, warn};

use super::ErrorBody;

/// Message returned when bearer verification is attempted without a secret
pub const MISSING_SECRET_MESSAGE: &str = "JWT_SECRET environment variable is required";

/// Audience claim, a single value or a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject identifier
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Role name, validated after signature checks
    pub role: String,
    /// Explicit grant, validated after signature checks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    pub exp: i64,
    pub iss: String,
    pub aud: Audience,
}

impl Claims {
    /// Map verified claims onto an identity
    pub fn into_identity(self) -> Result<AuthenticatedUser, AuthError> {
        let role: Role = self
            .role
            .parse()
            .map_err(|_| AuthError::UnknownRole(self.role.clone()))?;

        let permissions = self
            .permissions
            .map(|list| {
                list.iter()
                    .map(|p| p.parse::<Permission>().map_err(AuthError::InvalidToken))
                    .collect::<Result<BTreeSet<_>, _>>()
            })
            .transpose()?;

        let mut user = AuthenticatedUser::new(self.id, role).with_timestamps(self.iat, Some(self.exp));
        user.email = self.email;
        user.permissions = permissions;
        Ok(user)
    }
}

/// Authentication failures
///
/// Each variant maps to exactly one status code and response body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Bearer token must be provided in Authorization header")]
    MissingBearer,
    #[error("Provide either Bearer token or X-API-Key header")]
    MissingCredentials,
    #[error("Invalid API key")]
    InvalidApiKey,
    #[error("Token expired")]
    ExpiredToken,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Invalid token: unknown role '{0}'")]
    UnknownRole(String),
    #[error("{}", MISSING_SECRET_MESSAGE)]
    VerifierMisconfigured,
    #[error("Token creation failed")]
    TokenCreation,
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingBearer | AuthError::MissingCredentials | AuthError::InvalidApiKey => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::ExpiredToken | AuthError::InvalidToken(_) | AuthError::UnknownRole(_) => {
                StatusCode::FORBIDDEN
            }
            AuthError::VerifierMisconfigured | AuthError::TokenCreation => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn body(&self) -> ErrorBody {
        match self {
            AuthError::MissingBearer | AuthError::MissingCredentials => {
                ErrorBody::new("Authentication required").with_message(self.to_string())
            }
            AuthError::InvalidApiKey => ErrorBody::new("Invalid API key"),
            AuthError::ExpiredToken | AuthError::InvalidToken(_) | AuthError::UnknownRole(_) => {
                ErrorBody::new("Invalid token").with_message(self.to_string())
            }
            AuthError::VerifierMisconfigured => {
                ErrorBody::new("Server misconfigured").with_message(self.to_string())
            }
            AuthError::TokenCreation => ErrorBody::new("Token creation failed"),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.body())).into_response()
    }
}

fn classify(error: jsonwebtoken::errors::Error) -> AuthError {
    let reason = match error.kind() {
        ErrorKind::ExpiredSignature => return AuthError::ExpiredToken,
        ErrorKind::InvalidSignature => "invalid signature".to_string(),
        ErrorKind::InvalidAlgorithm => "invalid algorithm".to_string(),
        ErrorKind::InvalidIssuer => "jwt issuer invalid".to_string(),
        ErrorKind::InvalidAudience => "jwt audience invalid".to_string(),
        ErrorKind::MissingRequiredClaim(claim) => format!("missing required claim '{}'", claim),
        ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Utf8(_) => {
            "jwt malformed".to_string()
        }
        ErrorKind::Json(_) => "malformed claims".to_string(),
        _ => "token verification failed".to_string(),
    };
    AuthError::InvalidToken(reason)
}

/// Bearer token verifier
#[derive(Clone)]
pub struct JwtVerifier {
    key: Option<DecodingKey>,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: Option<&str>, issuer: &str, audience: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.leeway = 0;
        // Expiry is compared against the caller-supplied clock in `verify_at`
        validation.validate_exp = false;

        Self {
            key: secret
                .filter(|s| !s.is_empty())
                .map(|s| DecodingKey::from_secret(s.as_bytes())),
            validation,
        }
    }

    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::new(
            settings.jwt_secret.as_deref(),
            &settings.issuer,
            &settings.audience,
        )
    }

    /// Whether a signing secret is available
    pub fn is_configured(&self) -> bool {
        self.key.is_some()
    }

    /// Verify a token against the current time
    pub fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verify a token against `now` (seconds since epoch)
    pub fn verify_at(&self, token: &str, now: i64) -> Result<AuthenticatedUser, AuthError> {
        let key = self.key.as_ref().ok_or(AuthError::VerifierMisconfigured)?;

        let data = decode::<Claims>(token, key, &self.validation).map_err(|e| {
            debug!("Token verification failed: {}", e);
            classify(e)
        })?;

        if data.claims.exp < now {
            return Err(AuthError::ExpiredToken);
        }

        data.claims.into_identity()
    }
}

/// Mints HS256 tokens accepted by [`JwtVerifier`] with the same settings
#[derive(Clone)]
pub struct JwtIssuer {
    key: EncodingKey,
    issuer: String,
    audience: String,
    lifetime: Duration,
}

impl JwtIssuer {
    pub fn new(
        secret: &str,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        lifetime: Duration,
    ) -> Self {
        Self {
            key: EncodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            audience: audience.into(),
            lifetime,
        }
    }

    pub fn from_settings(settings: &AuthSettings) -> TodoResult<Self> {
        let secret = settings
            .jwt_secret
            .as_deref()
            .ok_or_else(|| config_error!(MISSING_SECRET_MESSAGE, "jwt"))?;

        Ok(Self::new(
            secret,
            settings.issuer.clone(),
            settings.audience.clone(),
            settings.token_lifetime()?,
        ))
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Claims for `user`, issued at `now`
    ///
    /// Fails when `now` plus the lifetime does not fit a timestamp.
    pub fn claims_for(&self, user: &AuthenticatedUser, now: i64) -> Result<Claims, AuthError> {
        let exp = i64::try_from(self.lifetime.as_secs())
            .ok()
            .and_then(|lifetime| now.checked_add(lifetime))
            .ok_or_else(|| {
                warn!("Token lifetime overflows the expiry timestamp");
                AuthError::TokenCreation
            })?;

        Ok(Claims {
            id: user.id.clone(),
            email: user.email.clone(),
            role: user.role.to_string(),
            permissions: user
                .permissions
                .as_ref()
                .map(|set| set.iter().map(|p| p.to_string()).collect()),
            iat: Some(now),
            exp,
            iss: self.issuer.clone(),
            aud: Audience::One(self.audience.clone()),
        })
    }

    /// Sign arbitrary claims
    pub fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.key).map_err(|e| {
            warn!("Failed to encode JWT token: {}", e);
            AuthError::TokenCreation
        })
    }

    /// Issue a token for `user` valid from now
    pub fn issue(&self, user: &AuthenticatedUser) -> Result<String, AuthError> {
        self.sign(&self.claims_for(user, Utc::now().timestamp())?)
    }
}
