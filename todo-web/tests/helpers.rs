//! Shared helpers for the HTTP integration tests
//!
//! Requests go straight into the router with `tower::ServiceExt::oneshot`,
//! no sockets involved.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use todo_core::TodoConfig;
use todo_service::{AuthenticatedUser, MemoryTodoStore, Role};
use todo_web::auth::{JwtIssuer, API_KEY_HEADER};
use todo_web::{create_app, AppState};
use tower::ServiceExt;

pub const SECRET: &str = "integration-test-secret";
pub const API_KEY: &str = "integration-service-key";

/// How a request authenticates
pub enum Credentials {
    None,
    Bearer(String),
    ApiKey(String),
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub struct TestApp {
    pub router: Router,
    pub issuer: JwtIssuer,
    pub config: TodoConfig,
}

pub fn test_config() -> TodoConfig {
    let mut config = TodoConfig::default();
    config.auth.jwt_secret = Some(SECRET.to_string());
    config.auth.api_keys = vec![API_KEY.to_string()];
    config.server.rate_limit_requests = 0;
    config
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: TodoConfig) -> Self {
        let state = AppState::with_store(config.clone(), Arc::new(MemoryTodoStore::new()));
        let issuer = JwtIssuer::new(
            SECRET,
            config.auth.issuer.clone(),
            config.auth.audience.clone(),
            Duration::from_secs(3600),
        );

        Self {
            router: create_app(state),
            issuer,
            config,
        }
    }

    pub fn token(&self, user: &AuthenticatedUser) -> String {
        self.issuer.issue(user).unwrap()
    }

    pub fn bearer(&self, role: Role) -> Credentials {
        Credentials::Bearer(self.token(&AuthenticatedUser::new(format!("{}-user", role), role)))
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        credentials: &Credentials,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        builder = match credentials {
            Credentials::None => builder,
            Credentials::Bearer(token) => {
                builder.header(header::AUTHORIZATION, format!("Bearer {}", token))
            }
            Credentials::ApiKey(key) => builder.header(API_KEY_HEADER, key.as_str()),
        };

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Send one JSON-RPC request to `/mcp`
    pub async fn rpc(&self, credentials: &Credentials, method: &str, params: Value) -> TestResponse {
        self.request(
            Method::POST,
            "/mcp",
            credentials,
            Some(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": method,
                "params": params,
            })),
        )
        .await
    }

    pub async fn call_tool(
        &self,
        credentials: &Credentials,
        name: &str,
        arguments: Value,
    ) -> TestResponse {
        self.rpc(
            credentials,
            "tools/call",
            json!({ "name": name, "arguments": arguments }),
        )
        .await
    }
}

/// Text of the first content item in a `tools/call` result
pub fn tool_text(response: &TestResponse) -> &str {
    response.body["result"]["content"][0]["text"]
        .as_str()
        .unwrap_or_default()
}
