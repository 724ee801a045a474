//! TODO tool server
//!
//! Binds the listener and serves the application router until shutdown.

use crate::{create_app, AppState, WebError, WebResult};
use axum::serve;
use std::net::SocketAddr;
use todo_core::TodoConfig;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Main server
pub struct TodoServer {
    config: TodoConfig,
    state: AppState,
}

impl TodoServer {
    /// Validate configuration and build application state
    pub async fn new(config: TodoConfig) -> WebResult<Self> {
        config.validate().map_err(WebError::Service)?;
        let state = AppState::new(config.clone()).await?;

        Ok(Self { config, state })
    }

    /// Start the web server
    pub async fn start(self) -> WebResult<()> {
        let address = self.config.server.address();

        info!("Starting TODO tool server");
        info!("Server address: http://{}", address);
        info!("Log mode: {}", self.config.log_mode);

        let app = create_app(self.state.clone());

        let listener = TcpListener::bind(&address)
            .await
            .map_err(WebError::Server)?;

        info!("MCP endpoint: http://{}/mcp", address);

        // Peer addresses feed the rate limiter
        let service = app.into_make_service_with_connect_info::<SocketAddr>();
        if let Err(e) = serve(listener, service)
            .with_graceful_shutdown(shutdown_signal())
            .await
        {
            error!("Server error: {}", e);
            return Err(WebError::Server(e));
        }

        info!("Server shutdown complete");
        Ok(())
    }

    /// Get server configuration
    pub fn config(&self) -> &TodoConfig {
        &self.config
    }

}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down server...");
}

/// Builder for TodoServer
pub struct TodoServerBuilder {
    config: TodoConfig,
}

impl TodoServerBuilder {
    /// Start from an explicit configuration
    pub fn with_config(config: TodoConfig) -> Self {
        Self { config }
    }

    /// Build the server
    pub async fn build(self) -> WebResult<TodoServer> {
        TodoServer::new(self.config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_creation() {
        let server = TodoServerBuilder::with_config(TodoConfig::default())
            .build()
            .await;
        assert!(server.is_ok());
    }

    #[tokio::test]
    async fn test_builder_connects_configured_store() {
        let mut config = TodoConfig::default();
        config.server.database_url = "sqlite::memory:".to_string();

        let server = TodoServerBuilder::with_config(config).build().await.unwrap();
        assert_eq!(server.config().server.database_url, "sqlite::memory:");
        assert_eq!(server.state.store().backend(), "sqlite");
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = TodoConfig::default();
        config.auth.token_expiry = "forever".to_string();
        assert!(TodoServer::new(config).await.is_err());
    }
}
