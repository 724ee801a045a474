//! Configuration management
//!
//! Settings come from defaults, an optional TOML file, then environment variables
//! (`.env` is loaded by the binaries before this runs).

use crate::error::{ErrorContext, TodoError, TodoResult};
use crate::logging::LogMode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_ISSUER: &str = "urn:foo";
pub const DEFAULT_AUDIENCE: &str = "urn:bar";
pub const DEFAULT_TOKEN_EXPIRY: &str = "1h";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TodoConfig {
    pub server: ServerConfig,
    pub auth: AuthSettings,
    pub log_mode: LogMode,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins accepted by the CORS layer
    pub allowed_origins: Vec<String>,
    /// `memory` or a `sqlite:` URL
    pub database_url: String,
    pub request_timeout_secs: u64,
    pub body_limit_bytes: usize,
    /// Requests allowed per client within one window; 0 disables limiting
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
    /// Key rate limits on the first `X-Forwarded-For` hop instead of the peer
    /// address. Only safe behind a proxy that overwrites the header.
    pub trust_proxy: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            allowed_origins: vec!["https://localhost:3000".to_string()],
            database_url: "memory".to_string(),
            request_timeout_secs: 30,
            body_limit_bytes: 10 * 1024 * 1024,
            rate_limit_requests: 100,
            rate_limit_window_secs: 15 * 60,
            trust_proxy: false,
        }
    }
}

impl ServerConfig {
    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Token verification and service credential settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Pre-shared HS256 secret; bearer auth fails closed without it
    pub jwt_secret: Option<String>,
    pub issuer: String,
    pub audience: String,
    /// Lifetime of issued tokens, e.g. `1h`
    pub token_expiry: String,
    /// Accepted `X-API-Key` values
    pub api_keys: Vec<String>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            issuer: DEFAULT_ISSUER.to_string(),
            audience: DEFAULT_AUDIENCE.to_string(),
            token_expiry: DEFAULT_TOKEN_EXPIRY.to_string(),
            api_keys: Vec::new(),
        }
    }
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<set>"))
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("token_expiry", &self.token_expiry)
            .field("api_keys", &self.api_keys.len())
            .finish()
    }
}

impl AuthSettings {
    /// Parsed lifetime of issued tokens
    pub fn token_lifetime(&self) -> TodoResult<Duration> {
        parse_duration(&self.token_expiry)
    }
}

impl TodoConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> TodoResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| TodoError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: TodoConfig = toml::from_str(&content).map_err(|e| TodoError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })?;

        Ok(config)
    }

    /// Override settings from an environment lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT").and_then(|p| p.trim().parse().ok()) {
            self.server.port = port;
        }
        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            self.server.allowed_origins = split_list(&origins);
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.server.database_url = url;
        }
        if let Some(secret) = lookup("JWT_SECRET").filter(|s| !s.is_empty()) {
            self.auth.jwt_secret = Some(secret);
        }
        if let Some(issuer) = lookup("JWT_ISSUER") {
            self.auth.issuer = issuer;
        }
        if let Some(audience) = lookup("JWT_AUDIENCE") {
            self.auth.audience = audience;
        }
        if let Some(expiry) = lookup("JWT_EXPIRY") {
            self.auth.token_expiry = expiry;
        }
        if let Some(keys) = lookup("API_KEYS") {
            self.auth.api_keys = split_list(&keys);
        }
        if let Some(trust) = lookup("TRUST_PROXY") {
            self.server.trust_proxy = matches!(trust.trim(), "1" | "true" | "yes");
        }
        if let Some(env) = lookup("APP_ENV") {
            self.log_mode = LogMode::from_env_value(Some(&env));
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> TodoResult<()> {
        if self.server.port == 0 {
            return Err(TodoError::Config {
                message: "Server port must be greater than 0".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set PORT to a positive value"),
            });
        }

        if self.server.request_timeout_secs == 0 {
            return Err(TodoError::Config {
                message: "Request timeout must be greater than 0".to_string(),
                source: None,
                context: ErrorContext::new("config").with_operation("validate"),
            });
        }

        if self.server.rate_limit_requests > 0 && self.server.rate_limit_window_secs == 0 {
            return Err(TodoError::Config {
                message: "Rate limit window must be greater than 0".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set rate_limit_requests = 0 to disable rate limiting"),
            });
        }

        if self.auth.issuer.is_empty() || self.auth.audience.is_empty() {
            return Err(TodoError::Config {
                message: "JWT issuer and audience must not be empty".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set JWT_ISSUER and JWT_AUDIENCE"),
            });
        }

        self.auth.token_lifetime()?;

        Ok(())
    }
}

/// Split a comma-separated list, dropping blanks
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `30s`, `15m`, `1h`, `7d` or a bare number of seconds
pub fn parse_duration(value: &str) -> TodoResult<Duration> {
    let value = value.trim();
    let invalid = || TodoError::Config {
        message: format!("Invalid duration: '{}'", value),
        source: None,
        context: ErrorContext::new("config")
            .with_operation("parse_duration")
            .with_suggestion("Use a number followed by s, m, h or d (e.g. 1h)"),
    };

    let (digits, multiplier) = match value.char_indices().last() {
        Some((idx, 's')) => (&value[..idx], 1),
        Some((idx, 'm')) => (&value[..idx], 60),
        Some((idx, 'h')) => (&value[..idx], 3600),
        Some((idx, 'd')) => (&value[..idx], 86_400),
        Some(_) => (value, 1),
        None => return Err(invalid()),
    };

    let amount: u64 = digits.trim().parse().map_err(|_| invalid())?;
    if amount == 0 {
        return Err(invalid());
    }

    // Lifetimes end up in signed `exp` timestamps
    let seconds = amount
        .checked_mul(multiplier)
        .filter(|secs| i64::try_from(*secs).is_ok())
        .ok_or_else(invalid)?;

    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("15m").unwrap(), Duration::from_secs(900));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("7d").unwrap(), Duration::from_secs(604_800));
        assert_eq!(parse_duration("120").unwrap(), Duration::from_secs(120));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("0h").is_err());
    }

    #[test]
    fn test_parse_duration_overflow() {
        assert!(parse_duration("999999999999999999d").is_err());
        assert!(parse_duration("18446744073709551615").is_err());
        assert!(parse_duration(&i64::MAX.to_string()).is_ok());

        let mut config = TodoConfig::default();
        config.auth.token_expiry = "999999999999999999d".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("PORT", "4000"),
            ("JWT_SECRET", "s3cret"),
            ("JWT_ISSUER", "mcp-server"),
            ("JWT_AUDIENCE", "mcp-client"),
            ("API_KEYS", "key-one, ,key-two"),
            ("APP_ENV", "development"),
            ("TRUST_PROXY", "true"),
        ]
        .into_iter()
        .collect();

        let mut config = TodoConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 4000);
        assert_eq!(config.auth.jwt_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.auth.issuer, "mcp-server");
        assert_eq!(config.auth.audience, "mcp-client");
        assert_eq!(config.auth.api_keys, vec!["key-one", "key-two"]);
        assert_eq!(config.log_mode, LogMode::Development);
        assert!(config.server.trust_proxy);
    }

    #[test]
    fn test_empty_secret_is_treated_as_missing() {
        let mut config = TodoConfig::default();
        config.apply_env(|key| (key == "JWT_SECRET").then(String::new));
        assert!(config.auth.jwt_secret.is_none());
    }

    #[test]
    fn test_validation() {
        let mut config = TodoConfig::default();
        assert!(config.validate().is_ok());

        config.auth.token_expiry = "soon".to_string();
        assert!(matches!(config.validate(), Err(TodoError::Config { .. })));
    }

    #[test]
    fn test_debug_hides_secret() {
        let mut settings = AuthSettings::default();
        settings.jwt_secret = Some("top-secret".to_string());
        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains("top-secret"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todo.toml");
        std::fs::write(
            &path,
            "log_mode = \"development\"\n[server]\nport = 8081\n[auth]\nissuer = \"mcp-server\"\n",
        )
        .unwrap();

        let config = TodoConfig::from_file(&path).unwrap();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.auth.issuer, "mcp-server");
        assert_eq!(config.auth.audience, DEFAULT_AUDIENCE);
        assert_eq!(config.log_mode, LogMode::Development);
    }
}
