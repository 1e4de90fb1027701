use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{delete, get, post, put},
    Extension, Form, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::auth::gate::{removal_cookie, session_cookie};
use crate::auth::{
    require_session, AccessGate, AuthError, CredentialVerifier, HttpCredentialVerifier,
    SessionCodec, SessionContext, SessionState, SESSION_COOKIE,
};
use crate::client::{HttpRulesClient, RuleSubmitter};
use crate::config::{Config, ConfigError};
use crate::domain::Credentials;
use crate::form::{FormError, FormStore, RuleForm};
use crate::observability::MetricsRegistry;

use super::page;
use super::request::{SetFieldRequest, SigninQuery};
use super::response::{ErrorResponse, HealthResponse, SubmitResponse};

/// Shared application state.
pub struct AppState {
    /// Verifies sign-in credentials
    pub verifier: Arc<dyn CredentialVerifier>,

    /// Sends rule sets to the rules API
    pub submitter: Arc<dyn RuleSubmitter>,

    /// Session token codec
    pub codec: Arc<SessionCodec>,

    /// Gate in front of the protected routes
    pub gate: Arc<AccessGate>,

    /// Per-user rule forms
    pub forms: Arc<FormStore>,

    pub metrics: Arc<MetricsRegistry>,

    /// Page-side session refresh period in seconds
    pub refresh_secs: u64,

    /// Application start time
    pub start_time: Instant,

    /// Application version
    pub version: String,
}

impl AppState {
    /// Wire the HTTP-backed verifier and rules client from configuration.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let endpoints = config.endpoints()?;
        let http = reqwest::Client::new();

        let verifier = Arc::new(HttpCredentialVerifier::new(
            http.clone(),
            endpoints.login_url,
        ));
        let submitter = Arc::new(HttpRulesClient::new(http, endpoints.create_rules_url));

        Ok(AppState::new(
            verifier,
            submitter,
            SessionCodec::new(
                endpoints.session_secret.as_bytes(),
                config.session_ttl(),
                config.session_refresh_interval(),
            ),
            &config.signin_path,
            config.session_refresh_secs,
        ))
    }

    pub fn new(
        verifier: Arc<dyn CredentialVerifier>,
        submitter: Arc<dyn RuleSubmitter>,
        codec: SessionCodec,
        signin_path: &str,
        refresh_secs: u64,
    ) -> Self {
        let codec = Arc::new(codec);
        let metrics = Arc::new(MetricsRegistry::new());
        let gate = Arc::new(AccessGate::new(
            Arc::clone(&codec),
            signin_path,
            Arc::clone(&metrics),
        ));

        AppState {
            verifier,
            submitter,
            codec,
            gate,
            forms: Arc::new(FormStore::new()),
            metrics,
            refresh_secs,
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    fn session(&self, jar: &CookieJar) -> SessionState {
        let token = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
        self.codec.inspect(token.as_deref())
    }
}

/// Create the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/", get(handle_page))
        .route("/api/form", get(handle_form))
        .route("/api/form/rules", post(handle_append))
        .route("/api/form/rules/:index", delete(handle_remove))
        .route("/api/form/fields", put(handle_set_field))
        .route("/api/form/reset", post(handle_reset))
        .route("/api/form/submit", post(handle_submit))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.gate),
            require_session,
        ));

    let public = Router::new()
        .route("/signin", get(handle_signin_page))
        .route("/api/auth/callback/credentials", post(handle_signin))
        .route(
            "/api/auth/session",
            get(handle_session).post(handle_session_refresh),
        )
        .route("/api/auth/signout", post(handle_signout))
        .route("/health", get(handle_health))
        .route("/healthz", get(|| async { Redirect::permanent("/health") }))
        .route("/metrics", get(handle_metrics));

    protected
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Protected rules page.
async fn handle_page(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
) -> Html<String> {
    let form = state.forms.snapshot(session.user_id());
    Html(page::render_rules_page(
        &session.identity,
        &form,
        state.refresh_secs,
    ))
}

/// Current form state.
async fn handle_form(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
) -> Json<RuleForm> {
    Json(state.forms.snapshot(session.user_id()))
}

/// Add an empty rule.
async fn handle_append(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
) -> impl IntoResponse {
    let form = state.forms.with_form(session.user_id(), |form| {
        form.append();
        form.clone()
    });
    (StatusCode::CREATED, Json(form))
}

/// Remove one rule; the last one stays.
async fn handle_remove(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(index): Path<usize>,
) -> Response {
    let result = state
        .forms
        .with_form(session.user_id(), |form| form.remove(index).map(|_| form.clone()));

    match result {
        Ok(form) => (StatusCode::OK, Json(form)).into_response(),
        Err(e) => form_error_response(e),
    }
}

/// Update one input.
async fn handle_set_field(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Json(req): Json<SetFieldRequest>,
) -> Response {
    let result = state.forms.with_form(session.user_id(), |form| {
        form.set_field(req.target, req.value).map(|_| form.clone())
    });

    match result {
        Ok(form) => (StatusCode::OK, Json(form)).into_response(),
        Err(e) => form_error_response(e),
    }
}

/// Back to one blank rule.
async fn handle_reset(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
) -> Json<RuleForm> {
    Json(state.forms.with_form(session.user_id(), |form| {
        form.reset();
        form.clone()
    }))
}

/// Validate and send the form to the rules API.
async fn handle_submit(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
) -> Response {
    let user_id = session.user_id();
    let result = state.forms.submit(user_id, state.submitter.as_ref()).await;
    state.metrics.record_submission(&result);

    match result {
        Ok(message) => {
            info!(user_id = %user_id, kind = ?message.kind, "Submission finished");
            let form = state.forms.snapshot(user_id);
            (StatusCode::OK, Json(SubmitResponse { message, form })).into_response()
        }
        Err(e) => form_error_response(e),
    }
}

fn form_error_response(e: FormError) -> Response {
    match e {
        FormError::Invalid(fields) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse::validation(fields)),
        )
            .into_response(),
        FormError::Busy | FormError::LastRule => {
            (StatusCode::CONFLICT, Json(ErrorResponse::conflict(e.to_string()))).into_response()
        }
        FormError::IndexOutOfRange { .. } => {
            (StatusCode::NOT_FOUND, Json(ErrorResponse::not_found(e.to_string()))).into_response()
        }
    }
}

/// Sign-in page.
async fn handle_signin_page(Query(query): Query<SigninQuery>) -> Html<String> {
    Html(page::render_signin(query.error.as_deref()))
}

/// Credentials sign-in: verify, start the session, go to the rules page.
async fn handle_signin(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(credentials): Form<Credentials>,
) -> Response {
    let result = state.verifier.authorize(&credentials).await;
    state.metrics.record_signin(&result);

    let identity = match result {
        Ok(identity) => identity,
        Err(e) => {
            warn!(email = %credentials.email, kind = e.kind(), error = %e, "Sign-in failed");
            let code = match e {
                AuthError::Rejected { .. } => "CredentialsSignin",
                AuthError::Network(_) => "LoginUnavailable",
                AuthError::Malformed(_) => "LoginFailed",
            };
            let location = format!("{}?error={}", state.gate.signin_path(), code);
            return Redirect::to(&location).into_response();
        }
    };

    match state.codec.issue(&identity, Utc::now()) {
        Ok(token) => {
            info!(user_id = %identity.id, "Signed in");
            (jar.add(session_cookie(token)), Redirect::to("/")).into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to issue session token");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::internal_error("could not start session")),
            )
                .into_response()
        }
    }
}

/// Current session, or `{}` when there is none.
async fn handle_session(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    match state.session(&jar) {
        SessionState::Authenticated(ctx) => Json(ctx.view()).into_response(),
        SessionState::Unauthenticated(_) => Json(serde_json::json!({})).into_response(),
    }
}

/// Refresh triggered by the page (interval or window refocus).
async fn handle_session_refresh(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let ctx = match state.session(&jar) {
        SessionState::Authenticated(ctx) => ctx,
        SessionState::Unauthenticated(_) => {
            return Json(serde_json::json!({})).into_response();
        }
    };

    let now = Utc::now();
    match state.codec.refresh(&ctx, now) {
        Ok(token) => {
            state.metrics.record_refresh();
            let ctx = SessionContext {
                identity: ctx.identity,
                issued_at: now,
                expires_at: state.codec.expires_at(now),
            };
            (jar.add(session_cookie(token)), Json(ctx.view())).into_response()
        }
        Err(e) => {
            warn!(user_id = %ctx.user_id(), error = %e, "Failed to refresh session");
            Json(ctx.view()).into_response()
        }
    }
}

/// End the session and drop the user's form.
async fn handle_signout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if let SessionState::Authenticated(ctx) = state.session(&jar) {
        state.forms.discard(ctx.user_id());
        state.metrics.record_signout();
        info!(user_id = %ctx.user_id(), "Signed out");
    }

    (
        jar.remove(removal_cookie()),
        Redirect::to(state.gate.signin_path()),
    )
        .into_response()
}

/// Health check endpoint.
async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_forms: state.forms.len(),
    })
}

/// Metrics endpoint (Prometheus format).
async fn handle_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let metrics = format!(
        r#"# HELP rulegate_uptime_seconds Application uptime in seconds
# TYPE rulegate_uptime_seconds counter
rulegate_uptime_seconds {}

# HELP rulegate_active_forms Rule forms held in memory
# TYPE rulegate_active_forms gauge
rulegate_active_forms {}

{}"#,
        state.start_time.elapsed().as_secs(),
        state.forms.len(),
        state.metrics.to_prometheus(),
    );

    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; charset=utf-8",
        )],
        metrics,
    )
}
