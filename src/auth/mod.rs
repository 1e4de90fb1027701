pub mod gate;
pub mod session;
pub mod token;
pub mod verifier;

pub use gate::{require_session, AccessGate, GateDecision};
pub use session::{SessionContext, SessionState, SessionView, Unauthenticated};
pub use token::{SessionClaims, SessionCodec, TokenError, SESSION_COOKIE};
pub use verifier::{AuthError, CredentialVerifier, HttpCredentialVerifier};
