//! Route definitions for the TODO tool server
//!
//! Each protected route carries its own guard layer. The JSON-RPC endpoint
//! authenticates through its extractor and checks guards per method.

use crate::auth::{guard_middleware, Guard, GuardLayerState};
use crate::{handlers, AppState};
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use todo_service::{Permission, Role};

/// Wrap `router` so every route in it runs `guard` first
fn guarded(state: &AppState, guard: Guard, router: Router<AppState>) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(
        GuardLayerState::new(state.clone(), guard),
        guard_middleware,
    ))
}

/// Create API routes
pub fn api_routes(state: &AppState) -> Router<AppState> {
    let read = guarded(
        state,
        Guard::Permission(Permission::ReadTodos),
        Router::new().route("/todos", get(handlers::list_todos)),
    );
    let create = guarded(
        state,
        Guard::Permission(Permission::CreateTodos),
        Router::new().route("/todos", post(handlers::create_todo)),
    );
    let update = guarded(
        state,
        Guard::Permission(Permission::UpdateTodos),
        Router::new()
            .route("/todos/{id}/complete", post(handlers::complete_todo))
            .route("/todos/{id}", put(handlers::update_todo)),
    );
    let remove = guarded(
        state,
        Guard::Permission(Permission::DeleteTodos),
        Router::new().route("/todos/{id}", delete(handlers::delete_todo)),
    );
    let admin = guarded(
        state,
        Guard::Role(Role::Admin),
        Router::new().route("/admin/permissions", get(handlers::permission_tables)),
    );

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Any authenticated caller
        .route("/me", get(handlers::whoami))
        .merge(read)
        .merge(create)
        .merge(update)
        .merge(remove)
        .merge(admin)
}

/// Create the JSON-RPC tool route
pub fn mcp_routes() -> Router<AppState> {
    Router::new().route("/mcp", post(handlers::handle_mcp))
}
