use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use tracing::{debug, warn};

use crate::observability::MetricsRegistry;

use super::session::{SessionContext, SessionState, Unauthenticated};
use super::token::{SessionCodec, SESSION_COOKIE};

/// Result of checking a request against the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow(SessionContext),
    Redirect {
        location: String,
        reason: Unauthenticated,
    },
}

/// Server-side check guarding protected routes.
pub struct AccessGate {
    codec: Arc<SessionCodec>,
    signin_path: String,
    metrics: Arc<MetricsRegistry>,
}

impl AccessGate {
    pub fn new(
        codec: Arc<SessionCodec>,
        signin_path: impl Into<String>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        AccessGate {
            codec,
            signin_path: signin_path.into(),
            metrics,
        }
    }

    /// Decide from the session token alone.
    pub fn check(&self, token: Option<&str>) -> GateDecision {
        match self.codec.inspect(token) {
            SessionState::Authenticated(ctx) => GateDecision::Allow(ctx),
            SessionState::Unauthenticated(reason) => GateDecision::Redirect {
                location: self.signin_path.clone(),
                reason,
            },
        }
    }

    pub fn signin_path(&self) -> &str {
        &self.signin_path
    }
}

/// Cookie carrying a freshly issued session token.
pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Cookie that clears the session token.
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

/// Middleware: redirect without a valid session, otherwise expose the
/// [`SessionContext`] to the handler and re-issue aging tokens.
pub async fn require_session(
    State(gate): State<Arc<AccessGate>>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let token = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());

    let ctx = match gate.check(token.as_deref()) {
        GateDecision::Allow(ctx) => ctx,
        GateDecision::Redirect { location, reason } => {
            debug!(path = %req.uri().path(), reason = reason.as_str(), "Redirecting to sign-in");
            gate.metrics.record_gate_redirect();
            let jar = match reason {
                Unauthenticated::Missing => jar,
                _ => jar.remove(removal_cookie()),
            };
            return (jar, Redirect::to(&location)).into_response();
        }
    };

    let now = Utc::now();
    let refreshed = if gate.codec.needs_refresh(&ctx, now) {
        match gate.codec.refresh(&ctx, now) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(user_id = %ctx.user_id(), error = %e, "Failed to refresh session");
                None
            }
        }
    } else {
        None
    };

    req.extensions_mut().insert(ctx);
    let response = next.run(req).await;

    match refreshed {
        Some(token) => {
            gate.metrics.record_refresh();
            (jar.add(session_cookie(token)), response).into_response()
        }
        None => response,
    }
}
