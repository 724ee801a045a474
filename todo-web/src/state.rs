//! Application state shared by every handler

use crate::auth::{Authenticator, Authorizer};
use crate::{WebError, WebResult};
use std::sync::Arc;
use todo_core::{LogPolicy, TodoConfig};
use todo_service::{create_store, PermissionModel, TodoStore, TodoTools};
use tracing::{info, warn};

/// Cloned into every request; everything inside is shared or cheap to copy
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<TodoConfig>,
    /// Immutable role and tool tables, built once
    pub permissions: Arc<PermissionModel>,
    pub authenticator: Authenticator,
    pub authorizer: Authorizer,
    pub tools: TodoTools,
}

impl AppState {
    /// Build state from configuration, connecting the configured store
    pub async fn new(config: TodoConfig) -> WebResult<Self> {
        let store = create_store(&config.server.database_url)
            .await
            .map_err(WebError::Service)?;
        Ok(Self::with_store(config, store))
    }

    /// Build state around an existing store
    pub fn with_store(config: TodoConfig, store: Arc<dyn TodoStore>) -> Self {
        let permissions = Arc::new(PermissionModel::standard());
        let log_policy = LogPolicy::new(config.log_mode);

        let authenticator = Authenticator::from_config(&config, &permissions);
        if !authenticator.verifier().is_configured() {
            warn!("JWT_SECRET is not set; bearer authentication will fail");
        }
        info!(
            store = store.backend(),
            api_keys = authenticator.api_keys().len(),
            log_mode = %config.log_mode,
            "Application state initialized"
        );

        Self {
            authorizer: Authorizer::new(permissions.clone(), log_policy),
            authenticator,
            permissions,
            tools: TodoTools::new(store),
            config: Arc::new(config),
        }
    }

    pub fn store(&self) -> &Arc<dyn TodoStore> {
        self.tools.store()
    }
}
