use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::domain::{Credentials, UserIdentity};

/// Why a sign-in attempt did not produce an identity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The login API could not be reached.
    #[error("login endpoint unreachable: {0}")]
    Network(String),

    /// The login API answered with a non-success status.
    #[error("credentials rejected (HTTP {status})")]
    Rejected { status: u16 },

    /// The login API answered 2xx without a usable user object.
    #[error("malformed login response: {0}")]
    Malformed(String),
}

impl AuthError {
    /// Whether trying again later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::Network(_))
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Network(_) => "network",
            AuthError::Rejected { .. } => "rejected",
            AuthError::Malformed(_) => "malformed",
        }
    }
}

/// Verifies credentials and yields the identity to seed a session with.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn authorize(&self, credentials: &Credentials) -> Result<UserIdentity, AuthError>;
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(default)]
    user: Option<UserIdentity>,
}

/// Verifier backed by the remote login endpoint.
pub struct HttpCredentialVerifier {
    client: reqwest::Client,
    login_url: Url,
}

impl HttpCredentialVerifier {
    pub fn new(client: reqwest::Client, login_url: Url) -> Self {
        HttpCredentialVerifier { client, login_url }
    }
}

#[async_trait]
impl CredentialVerifier for HttpCredentialVerifier {
    async fn authorize(&self, credentials: &Credentials) -> Result<UserIdentity, AuthError> {
        let response = self
            .client
            .post(self.login_url.clone())
            .json(credentials)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Login request failed");
                AuthError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            debug!(email = %credentials.email, status = status.as_u16(), "Login rejected");
            return Err(AuthError::Rejected {
                status: status.as_u16(),
            });
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Malformed(e.to_string()))?;

        body.user
            .ok_or_else(|| AuthError::Malformed("response has no user object".to_string()))
    }
}
