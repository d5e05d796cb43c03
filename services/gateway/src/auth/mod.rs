//! Authentication seam
//!
//! Account management is delegated to an [`AuthProvider`]. The gateway only
//! ever sees the outcome: account identities, session tokens and, for every
//! authenticated request, an explicit [`AuthUser`] context built from the
//! bearer token.

use async_trait::async_trait;
use common::models::{AccountInfo, SessionTokens};
use thiserror::Error;
use uuid::Uuid;

pub mod hosted;
pub mod jwt;
pub mod memory;

pub use hosted::HostedAuth;
pub use jwt::{Claims, TokenService};
pub use memory::MemoryAuth;

/// Caller identity attached to every authenticated request
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
    /// The bearer token the request carried
    pub access_token: String,
    /// Expiry of the access token, seconds since the epoch
    pub expires_at: u64,
}

/// Profile data sent along with a sign-up
#[derive(Debug, Clone)]
pub struct SignUpMetadata {
    pub username: String,
    pub full_name: Option<String>,
}

/// Result of a sign-up: the provider may or may not open a session right away
/// (it does not when e-mail confirmation is required)
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub account: AccountInfo,
    pub session: Option<SessionTokens>,
}

/// An authenticated session
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub account: AccountInfo,
    pub tokens: SessionTokens,
}

/// Errors reported by an auth provider
#[derive(Error, Debug)]
pub enum AuthError {
    /// Wrong e-mail or password
    #[error("Invalid login credentials")]
    InvalidCredentials,

    /// Missing, malformed, expired or revoked token
    #[error("Invalid or expired token")]
    InvalidToken,

    /// The provider refused the request (weak password, duplicate e-mail...)
    #[error("{0}")]
    Rejected(String),

    /// The provider could not be reached or answered unexpectedly
    #[error("Auth provider error: {0}")]
    Upstream(String),

    /// Local failure (token signing, hashing, deny-list)
    #[error("Auth internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Upstream(err.to_string())
    }
}

/// Type alias for Result with AuthError
pub type AuthResult<T> = Result<T, AuthError>;

/// Account and session management
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Create an account
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> AuthResult<SignUpOutcome>;

    /// Open a session with e-mail and password
    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession>;

    /// Exchange a refresh token for a new session
    async fn refresh(&self, refresh_token: &str) -> AuthResult<AuthSession>;

    /// Close the caller's session; its access token stops being accepted
    async fn sign_out(&self, user: &AuthUser) -> AuthResult<()>;

    /// Resolve a bearer token into the caller's identity
    async fn verify(&self, access_token: &str) -> AuthResult<AuthUser>;

    /// Remove an account
    async fn delete_user(&self, user_id: Uuid) -> AuthResult<()>;
}
