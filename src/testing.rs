//! Stub remote endpoints for tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};

use crate::domain::Credentials;

pub const GOOD_PASSWORD: &str = "correct-horse";
pub const MALFORMED_EMAIL: &str = "malformed@example.com";

/// Serve `router` on an ephemeral local port.
pub async fn spawn(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// An address nothing listens on.
pub async fn dead_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Login API: accepts [`GOOD_PASSWORD`], answers [`MALFORMED_EMAIL`] without a user.
pub fn login_api() -> Router {
    Router::new().route(
        "/api/auth/login",
        post(|Json(creds): Json<Credentials>| async move {
            if creds.email == MALFORMED_EMAIL {
                return (StatusCode::OK, Json(json!({ "access_token": "abc" })));
            }
            if creds.password != GOOD_PASSWORD {
                return (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "detail": "Incorrect email or password" })),
                );
            }
            (
                StatusCode::OK,
                Json(json!({
                    "user": { "id": "u-1", "email": creds.email, "name": "Jane" },
                    "access_token": "backend-token",
                    "token_type": "bearer"
                })),
            )
        }),
    )
}

/// Rules API returning a fixed status and body, counting calls.
#[derive(Clone)]
pub struct RulesApi {
    pub calls: Arc<AtomicUsize>,
    status: StatusCode,
    body: Arc<String>,
}

impl RulesApi {
    pub fn json(status: StatusCode, body: Value) -> Self {
        Self::raw(status, body.to_string())
    }

    pub fn raw(status: StatusCode, body: impl Into<String>) -> Self {
        RulesApi {
            calls: Arc::new(AtomicUsize::new(0)),
            status,
            body: Arc::new(body.into()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route(
                "/api/create_rules",
                post(
                    |State(api): State<RulesApi>, Json(_body): Json<Value>| async move {
                        api.calls.fetch_add(1, Ordering::SeqCst);
                        (
                            api.status,
                            [(axum::http::header::CONTENT_TYPE, "application/json")],
                            api.body.as_str().to_string(),
                        )
                    },
                ),
            )
            .with_state(self.clone())
    }
}
