//! TODO CLI - operator utility for the TODO tool server
//!
//! Mints bearer tokens for local testing and prints the permission tables the
//! server enforces.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use rand::RngCore;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use todo_core::{init_logging, parse_duration, LoggingConfig, TodoConfig};
use todo_service::{AuthenticatedUser, Permission, PermissionModel, Role, TodoTools};
use todo_web::auth::JwtIssuer;

#[derive(Parser)]
#[command(name = "todo")]
#[command(about = "Token and permission utility for the TODO tool server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path; environment variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Mint an HS256 bearer token
    Token {
        /// Subject identifier
        #[arg(long, default_value = "demo-user")]
        id: String,

        #[arg(long, default_value = "user")]
        role: Role,

        #[arg(long)]
        email: Option<String>,

        /// Explicit permission grant, replaces the role's set (repeatable)
        #[arg(long = "permission")]
        permissions: Vec<Permission>,

        /// Token lifetime such as `30m` or `1h`
        #[arg(long)]
        expiry: Option<String>,

        /// Sign with a fresh random secret instead of JWT_SECRET
        #[arg(long)]
        generate_secret: bool,

        /// Write the settings and token into this env file
        #[arg(long)]
        write_env: Option<PathBuf>,
    },

    /// List tools and the permissions they require
    Tools,

    /// Show the role to permission table
    Permissions {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();

    // Logs share stdout with the token, so stay quiet unless asked
    let logging = LoggingConfig {
        level: if cli.verbose { "debug" } else { "warn" }.to_string(),
        filter_directives: Vec::new(),
        ..LoggingConfig::default()
    };
    init_logging(&logging).map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    let config = load_config(cli.config.as_deref())?;
    let model = PermissionModel::standard();

    match cli.command {
        Commands::Token {
            id,
            role,
            email,
            permissions,
            expiry,
            generate_secret,
            write_env,
        } => {
            let mut user = AuthenticatedUser::new(id, role);
            if let Some(email) = email {
                user = user.with_email(email);
            }
            if !permissions.is_empty() {
                user = user.with_permissions(permissions);
            }

            let request = TokenRequest {
                user,
                expiry,
                generate_secret,
            };
            let minted = mint_token(&config, request)?;

            if let Some(path) = write_env {
                write_env_file(&path, &minted.env_entries(&config))?;
                info!("Wrote token settings to {}", path.display());
            }

            let expires = Utc
                .timestamp_opt(minted.expires_at, 0)
                .single()
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| minted.expires_at.to_string());
            eprintln!("Token expires at {}", expires);
            println!("{}", minted.token);
        }
        Commands::Tools => print!("{}", render_tools(&model)),
        Commands::Permissions { json } => {
            if json {
                let tables = serde_json::json!({
                    "roles": model.role_table(),
                    "tools": model.tool_table(),
                });
                println!("{}", serde_json::to_string_pretty(&tables)?);
            } else {
                print!("{}", render_roles(&model));
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<TodoConfig> {
    let mut config = match path {
        Some(path) => TodoConfig::from_file(path)?,
        None => TodoConfig::default(),
    };
    config.apply_env(|key| std::env::var(key).ok());
    Ok(config)
}

struct TokenRequest {
    user: AuthenticatedUser,
    expiry: Option<String>,
    generate_secret: bool,
}

struct MintedToken {
    token: String,
    /// Present when the secret was generated for this token
    secret: Option<String>,
    expiry: String,
    expires_at: i64,
}

impl MintedToken {
    /// `KEY=value` pairs for an env file
    fn env_entries(&self, config: &TodoConfig) -> Vec<(&'static str, String)> {
        let mut entries = vec![
            ("JWT_AUDIENCE", config.auth.audience.clone()),
            ("JWT_ISSUER", config.auth.issuer.clone()),
            ("JWT_EXPIRY", self.expiry.clone()),
        ];
        if let Some(secret) = &self.secret {
            entries.push(("JWT_SECRET", secret.clone()));
        }
        entries.push(("JWT_TOKEN", self.token.clone()));
        entries
    }
}

/// Random 256-bit secret, base64 encoded
fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

fn mint_token(config: &TodoConfig, request: TokenRequest) -> Result<MintedToken> {
    let mut settings = config.auth.clone();
    if let Some(expiry) = request.expiry {
        parse_duration(&expiry)?;
        settings.token_expiry = expiry;
    }

    let secret = if request.generate_secret {
        warn!("Signing with a generated secret; the server must use the same JWT_SECRET");
        let secret = generate_secret();
        settings.jwt_secret = Some(secret.clone());
        Some(secret)
    } else {
        None
    };

    let issuer = JwtIssuer::from_settings(&settings)
        .context("Set JWT_SECRET or pass --generate-secret")?;
    let claims = issuer.claims_for(&request.user, Utc::now().timestamp())?;
    let token = issuer.sign(&claims)?;

    info!(id = %request.user.id, role = %request.user.role, "Issued token");

    Ok(MintedToken {
        token,
        secret,
        expiry: settings.token_expiry,
        expires_at: claims.exp,
    })
}

/// Insert or replace `entries` in an env file, keeping unrelated lines
fn write_env_file(path: &Path, entries: &[(&str, String)]) -> Result<()> {
    let existing = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };

    let mut lines: Vec<String> = existing
        .lines()
        .filter(|line| {
            let key = line.split('=').next().unwrap_or_default().trim();
            !entries.iter().any(|(name, _)| *name == key)
        })
        .map(str::to_string)
        .collect();
    lines.extend(
        entries
            .iter()
            .map(|(name, value)| format!("{}=\"{}\"", name, value)),
    );

    let mut content = lines.join("\n");
    content.push('\n');
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

fn render_tools(model: &PermissionModel) -> String {
    let mut out = String::new();
    for tool in TodoTools::definitions() {
        let required = model
            .required_permissions_for_tool(tool.name)
            .map(|set| {
                set.iter()
                    .map(|p| p.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_else(|| "(denied)".to_string());
        out.push_str(&format!("{:<18} {:<14} {}\n", tool.name, required, tool.description));
    }
    out
}

fn render_roles(model: &PermissionModel) -> String {
    model
        .role_table()
        .into_iter()
        .map(|(role, permissions)| {
            let granted: Vec<&str> = permissions.iter().map(|p| p.as_str()).collect();
            format!("{:<10} {}\n", role.as_str(), granted.join(", "))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use todo_web::auth::JwtVerifier;

    fn config_with_secret() -> TodoConfig {
        let mut config = TodoConfig::default();
        config.auth.jwt_secret = Some("cli-test-secret".to_string());
        config
    }

    fn request(user: AuthenticatedUser) -> TokenRequest {
        TokenRequest {
            user,
            expiry: None,
            generate_secret: false,
        }
    }

    #[test]
    fn test_args_parsing() {
        let cli = Cli::parse_from([
            "todo",
            "token",
            "--role",
            "readonly",
            "--permission",
            "list:tools",
            "--expiry",
            "15m",
        ]);
        match cli.command {
            Commands::Token {
                role,
                permissions,
                expiry,
                ..
            } => {
                assert_eq!(role, Role::Readonly);
                assert_eq!(permissions, vec![Permission::ListTools]);
                assert_eq!(expiry.as_deref(), Some("15m"));
            }
            _ => panic!("expected token command"),
        }

        assert!(Cli::try_parse_from(["todo", "token", "--role", "root"]).is_err());
    }

    #[test]
    fn test_minted_token_verifies() {
        let config = config_with_secret();
        let user = AuthenticatedUser::new("alice", Role::User).with_email("alice@example.com");

        let minted = mint_token(&config, request(user)).unwrap();
        assert!(minted.secret.is_none());
        assert_eq!(minted.expiry, "1h");

        let verified = JwtVerifier::from_settings(&config.auth)
            .verify(&minted.token)
            .unwrap();
        assert_eq!(verified.id, "alice");
        assert_eq!(verified.email.as_deref(), Some("alice@example.com"));
        assert_eq!(verified.role, Role::User);
        assert_eq!(verified.expires_at, Some(minted.expires_at));
    }

    #[test]
    fn test_missing_secret_requires_generation() {
        let config = TodoConfig::default();
        let user = AuthenticatedUser::new("alice", Role::User);
        assert!(mint_token(&config, request(user.clone())).is_err());

        let minted = mint_token(
            &config,
            TokenRequest {
                user,
                expiry: Some("30m".to_string()),
                generate_secret: true,
            },
        )
        .unwrap();
        let secret = minted.secret.clone().unwrap();
        assert_eq!(STANDARD.decode(&secret).unwrap().len(), 32);

        let mut settings = config.auth.clone();
        settings.jwt_secret = Some(secret);
        assert!(JwtVerifier::from_settings(&settings).verify(&minted.token).is_ok());
    }

    #[test]
    fn test_bad_expiry_is_rejected() {
        let request = TokenRequest {
            user: AuthenticatedUser::new("alice", Role::User),
            expiry: Some("soon".to_string()),
            generate_secret: false,
        };
        assert!(mint_token(&config_with_secret(), request).is_err());

        let request = TokenRequest {
            user: AuthenticatedUser::new("alice", Role::User),
            expiry: Some("999999999999999999d".to_string()),
            generate_secret: false,
        };
        assert!(mint_token(&config_with_secret(), request).is_err());
    }

    #[test]
    fn test_write_env_file_replaces_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "PORT=4000\nJWT_TOKEN=\"old\"\n").unwrap();

        let entries = vec![
            ("JWT_EXPIRY", "1h".to_string()),
            ("JWT_TOKEN", "new".to_string()),
        ];
        write_env_file(&path, &entries).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "PORT=4000\nJWT_EXPIRY=\"1h\"\nJWT_TOKEN=\"new\"\n");
    }

    #[test]
    fn test_tables_render() {
        let model = PermissionModel::standard();

        let tools = render_tools(&model);
        assert_eq!(tools.lines().count(), 5);
        assert!(tools.contains("delete_todo"));
        assert!(tools.contains("delete:todos"));

        let roles = render_roles(&model);
        assert!(roles.contains("readonly   read:todos, list:tools"));
    }
}
