use std::sync::atomic::{AtomicU64, Ordering};

use crate::auth::AuthError;
use crate::form::{FormError, MessageKind, SubmitMessage};

/// Metrics registry for the application.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Sign-in attempts by outcome
    pub signins_total: AtomicU64,
    pub signins_ok: AtomicU64,
    pub signins_rejected: AtomicU64,
    pub signins_network_error: AtomicU64,
    pub signins_malformed: AtomicU64,

    /// Session lifecycle
    pub sessions_refreshed: AtomicU64,
    pub gate_redirects: AtomicU64,
    pub signouts_total: AtomicU64,

    /// Rule submissions by outcome
    pub submissions_total: AtomicU64,
    pub submissions_ok: AtomicU64,
    pub submissions_failed: AtomicU64,
    pub submissions_invalid: AtomicU64,
    pub submissions_busy: AtomicU64,

    /// Rules the rules API reported as created
    pub rules_created_total: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        MetricsRegistry::default()
    }

    /// Record a sign-in attempt.
    pub fn record_signin<T>(&self, result: &Result<T, AuthError>) {
        self.signins_total.fetch_add(1, Ordering::Relaxed);

        let counter = match result {
            Ok(_) => &self.signins_ok,
            Err(AuthError::Rejected { .. }) => &self.signins_rejected,
            Err(AuthError::Network(_)) => &self.signins_network_error,
            Err(AuthError::Malformed(_)) => &self.signins_malformed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_refresh(&self) {
        self.sessions_refreshed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_gate_redirect(&self) {
        self.gate_redirects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_signout(&self) {
        self.signouts_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a submit request, including ones refused before reaching the rules API.
    pub fn record_submission(&self, result: &Result<SubmitMessage, FormError>) {
        self.submissions_total.fetch_add(1, Ordering::Relaxed);

        let counter = match result {
            Ok(msg) if msg.kind == MessageKind::Success => &self.submissions_ok,
            Ok(_) => &self.submissions_failed,
            Err(FormError::Busy) => &self.submissions_busy,
            Err(_) => &self.submissions_invalid,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        if let Ok(SubmitMessage {
            created: Some(count),
            ..
        }) = result
        {
            self.rules_created_total
                .fetch_add(*count as u64, Ordering::Relaxed);
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        format!(
            r#"# HELP rulegate_signins_total Total sign-in attempts
# TYPE rulegate_signins_total counter
rulegate_signins_total {}

# HELP rulegate_signins Sign-in attempts by outcome
# TYPE rulegate_signins counter
rulegate_signins{{outcome="ok"}} {}
rulegate_signins{{outcome="rejected"}} {}
rulegate_signins{{outcome="network"}} {}
rulegate_signins{{outcome="malformed"}} {}

# HELP rulegate_sessions_refreshed_total Session tokens re-issued
# TYPE rulegate_sessions_refreshed_total counter
rulegate_sessions_refreshed_total {}

# HELP rulegate_gate_redirects_total Requests redirected to sign-in
# TYPE rulegate_gate_redirects_total counter
rulegate_gate_redirects_total {}

# HELP rulegate_signouts_total Explicit sign-outs
# TYPE rulegate_signouts_total counter
rulegate_signouts_total {}

# HELP rulegate_submissions_total Total submit requests
# TYPE rulegate_submissions_total counter
rulegate_submissions_total {}

# HELP rulegate_submissions Submit requests by outcome
# TYPE rulegate_submissions counter
rulegate_submissions{{outcome="ok"}} {}
rulegate_submissions{{outcome="failed"}} {}
rulegate_submissions{{outcome="invalid"}} {}
rulegate_submissions{{outcome="busy"}} {}

# HELP rulegate_rules_created_total Rules created by the rules API
# TYPE rulegate_rules_created_total counter
rulegate_rules_created_total {}
"#,
            self.signins_total.load(Ordering::Relaxed),
            self.signins_ok.load(Ordering::Relaxed),
            self.signins_rejected.load(Ordering::Relaxed),
            self.signins_network_error.load(Ordering::Relaxed),
            self.signins_malformed.load(Ordering::Relaxed),
            self.sessions_refreshed.load(Ordering::Relaxed),
            self.gate_redirects.load(Ordering::Relaxed),
            self.signouts_total.load(Ordering::Relaxed),
            self.submissions_total.load(Ordering::Relaxed),
            self.submissions_ok.load(Ordering::Relaxed),
            self.submissions_failed.load(Ordering::Relaxed),
            self.submissions_invalid.load(Ordering::Relaxed),
            self.submissions_busy.load(Ordering::Relaxed),
            self.rules_created_total.load(Ordering::Relaxed),
        )
    }
}
