//! TODO tool server binary

use clap::Parser;
use std::path::PathBuf;
use todo_core::{init_logging, LogMode, LoggingConfig, TodoConfig};
use todo_web::TodoServerBuilder;

/// TODO tool server with JWT and API-key authentication
#[derive(Parser)]
#[command(name = "todo-web")]
#[command(about = "JSON-RPC TODO tool server")]
#[command(version)]
struct Args {
    /// TOML configuration file; environment variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Server port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// `memory` or a `sqlite:` URL
    #[arg(long)]
    database_url: Option<String>,

    /// Log full payloads instead of redacting them
    #[arg(long)]
    dev: bool,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,
}

fn load_config(args: &Args) -> Result<TodoConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => TodoConfig::from_file(path)?,
        None => TodoConfig::default(),
    };
    config.apply_env(|key| std::env::var(key).ok());

    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(url) = &args.database_url {
        config.server.database_url = url.clone();
    }
    if args.dev {
        config.log_mode = LogMode::Development;
    }

    Ok(config)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let mut logging = LoggingConfig::for_mode(config.log_mode);
    if args.json_logs {
        logging.format = todo_core::LogFormat::Json;
    }
    if let Err(e) = init_logging(&logging) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let server = match TodoServerBuilder::with_config(config).build().await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to build server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.start().await {
        tracing::error!("Server failed: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["todo-web"]);
        assert!(args.config.is_none());
        assert!(args.port.is_none());
        assert!(!args.dev);

        let args = Args::parse_from(["todo-web", "--host", "0.0.0.0", "--port", "4000", "--dev"]);
        assert_eq!(args.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(args.port, Some(4000));
        assert!(args.dev);
    }

    #[test]
    fn test_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todo.toml");
        std::fs::write(&path, "[server]\nport = 8081\ndatabase_url = \"memory\"\n").unwrap();

        let args = Args::parse_from([
            "todo-web",
            "--config",
            path.to_str().unwrap(),
            "--database-url",
            "sqlite::memory:",
        ]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.server.database_url, "sqlite::memory:");
    }
}
