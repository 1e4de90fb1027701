use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{UserId, UserIdentity};

use super::token::SessionClaims;

/// Identity of the signed-in user for the current request.
///
/// Created by the access gate from a verified token and handed to handlers
/// through request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub identity: UserIdentity,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionContext {
    pub fn from_claims(claims: &SessionClaims) -> Self {
        SessionContext {
            identity: claims.identity(),
            issued_at: DateTime::from_timestamp(claims.iat, 0).unwrap_or_default(),
            expires_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or_default(),
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.identity.id
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            user: self.identity.clone(),
            expires: self.expires_at,
        }
    }
}

/// Why a request has no session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unauthenticated {
    Missing,
    Expired,
    Invalid,
}

impl Unauthenticated {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unauthenticated::Missing => "missing",
            Unauthenticated::Expired => "expired",
            Unauthenticated::Invalid => "invalid",
        }
    }
}

/// Session state of a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Authenticated(SessionContext),
    Unauthenticated(Unauthenticated),
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }
}

/// Session as reported to the page.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub user: UserIdentity,
    pub expires: DateTime<Utc>,
}
