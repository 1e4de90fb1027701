use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{UserId, UserIdentity};

use super::session::{SessionContext, SessionState, Unauthenticated};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "rulegate.session-token";

/// Errors produced while signing or verifying session tokens.
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("failed to sign session token: {0}")]
    Sign(#[source] jsonwebtoken::errors::Error),

    #[error("session token expired")]
    Expired,

    #[error("invalid session token: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),
}

/// Claims embedded in a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id
    pub sub: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Issued at (seconds since epoch)
    pub iat: i64,
    /// Expiry (seconds since epoch)
    pub exp: i64,
}

impl SessionClaims {
    pub fn identity(&self) -> UserIdentity {
        UserIdentity {
            id: UserId::new(&self.sub),
            email: self.email.clone(),
            name: self.name.clone(),
        }
    }
}

/// Signs and verifies HS256 session tokens.
pub struct SessionCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
    refresh_after_secs: i64,
}

impl SessionCodec {
    /// Create a codec. Tokens live for `ttl` and are re-issued once older than `refresh_after`.
    pub fn new(secret: &[u8], ttl: Duration, refresh_after: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        SessionCodec {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl_secs: i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX),
            refresh_after_secs: i64::try_from(refresh_after.as_secs()).unwrap_or(i64::MAX),
        }
    }

    /// Sign a token for `identity`, valid from `now` for the configured TTL.
    pub fn issue(&self, identity: &UserIdentity, now: DateTime<Utc>) -> Result<String, TokenError> {
        let iat = now.timestamp();
        let claims = SessionClaims {
            sub: identity.id.as_str().to_string(),
            email: identity.email.clone(),
            name: identity.name.clone(),
            iat,
            exp: iat.saturating_add(self.ttl_secs),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(TokenError::Sign)
    }

    /// Verify signature and expiry against the system clock.
    pub fn decode(&self, token: &str) -> Result<SessionClaims, TokenError> {
        jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e),
            })
    }

    /// Classify a request's token, if any.
    pub fn inspect(&self, token: Option<&str>) -> SessionState {
        let Some(token) = token else {
            return SessionState::Unauthenticated(Unauthenticated::Missing);
        };

        match self.decode(token) {
            Ok(claims) => SessionState::Authenticated(SessionContext::from_claims(&claims)),
            Err(TokenError::Expired) => SessionState::Unauthenticated(Unauthenticated::Expired),
            Err(_) => SessionState::Unauthenticated(Unauthenticated::Invalid),
        }
    }

    /// Whether a session issued at `ctx.issued_at` is due for re-issue at `now`.
    pub fn needs_refresh(&self, ctx: &SessionContext, now: DateTime<Utc>) -> bool {
        (now - ctx.issued_at).num_seconds() >= self.refresh_after_secs
    }

    /// Re-issue the session with a fresh expiry, keeping its identity.
    pub fn refresh(&self, ctx: &SessionContext, now: DateTime<Utc>) -> Result<String, TokenError> {
        self.issue(&ctx.identity, now)
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Expiry of a token issued at `now`.
    pub fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::try_seconds(self.ttl_secs)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> SessionCodec {
        SessionCodec::new(
            b"test-secret",
            Duration::from_secs(3600),
            Duration::from_secs(180),
        )
    }

    fn jane() -> UserIdentity {
        UserIdentity::new("u-1", "jane@example.com").with_name("Jane")
    }

    #[test]
    fn test_issue_and_decode() {
        let codec = codec();
        let now = Utc::now();

        let token = codec.issue(&jane(), now).unwrap();
        let claims = codec.decode(&token).unwrap();

        assert_eq!(claims.sub, "u-1");
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(claims.identity(), jane());
    }

    #[test]
    fn test_expired_token() {
        let codec = codec();
        let two_hours_ago = Utc::now() - chrono::Duration::hours(2);

        let token = codec.issue(&jane(), two_hours_ago).unwrap();

        assert!(matches!(codec.decode(&token), Err(TokenError::Expired)));
        assert_eq!(
            codec.inspect(Some(&token)),
            SessionState::Unauthenticated(Unauthenticated::Expired)
        );
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let other = SessionCodec::new(
            b"another-secret",
            Duration::from_secs(3600),
            Duration::from_secs(180),
        );
        let token = other.issue(&jane(), Utc::now()).unwrap();

        assert!(matches!(codec().decode(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn test_inspect_states() {
        let codec = codec();
        assert_eq!(
            codec.inspect(None),
            SessionState::Unauthenticated(Unauthenticated::Missing)
        );
        assert_eq!(
            codec.inspect(Some("garbage")),
            SessionState::Unauthenticated(Unauthenticated::Invalid)
        );

        let token = codec.issue(&jane(), Utc::now()).unwrap();
        match codec.inspect(Some(&token)) {
            SessionState::Authenticated(ctx) => assert_eq!(ctx.identity, jane()),
            other => panic!("expected authenticated, got {:?}", other),
        }
    }

    #[test]
    fn test_needs_refresh() {
        let codec = codec();
        let issued = Utc::now() - chrono::Duration::minutes(5);
        let token = codec.issue(&jane(), issued).unwrap();

        let SessionState::Authenticated(ctx) = codec.inspect(Some(&token)) else {
            panic!("expected authenticated");
        };

        assert!(codec.needs_refresh(&ctx, Utc::now()));
        assert!(!codec.needs_refresh(&ctx, issued + chrono::Duration::seconds(60)));

        let refreshed = codec.refresh(&ctx, Utc::now()).unwrap();
        let claims = codec.decode(&refreshed).unwrap();
        assert!(claims.iat > issued.timestamp());
        assert_eq!(claims.email, "jane@example.com");
    }

    #[test]
    fn test_oversized_ttl_saturates() {
        let codec = SessionCodec::new(
            b"test-secret",
            Duration::from_secs(u64::MAX),
            Duration::from_secs(180),
        );
        let now = Utc::now();

        assert_eq!(codec.ttl_secs(), i64::MAX);
        let token = codec.issue(&jane(), now).unwrap();
        let claims = codec.decode(&token).unwrap();
        assert_eq!(claims.exp, i64::MAX);
        assert_eq!(codec.expires_at(now), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_expires_at() {
        let codec = codec();
        let now = Utc::now();

        assert_eq!(codec.expires_at(now), now + chrono::Duration::seconds(3600));
    }
}
