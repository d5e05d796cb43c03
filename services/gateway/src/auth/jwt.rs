//! JWT service for access token issuing and validation
//!
//! The hosted auth provider signs access tokens with HS256 using the
//! project's JWT secret and the `authenticated` audience. The gateway
//! validates those tokens locally; the in-memory provider also issues them.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AuthError, AuthResult, AuthUser};

/// Audience used by the hosted provider for signed-in users
pub const DEFAULT_AUDIENCE: &str = "authenticated";

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// Audience
    pub aud: String,
    /// E-mail of the account, when known
    #[serde(default)]
    pub email: Option<String>,
    /// Database role the token maps to
    #[serde(default)]
    pub role: Option<String>,
    /// Issued at time
    #[serde(default)]
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
    /// Session the token belongs to
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

/// Signs and validates access tokens
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    audience: String,
}

impl TokenService {
    pub fn new(secret: &str, audience: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_audience(&[audience]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            audience: audience.to_string(),
        }
    }

    /// Issue an access token valid for `ttl_seconds`
    pub fn issue(&self, user_id: Uuid, email: Option<&str>, ttl_seconds: u64) -> AuthResult<String> {
        let now = now_secs()?;
        let claims = Claims {
            sub: user_id,
            aud: self.audience.clone(),
            email: email.map(str::to_string),
            role: Some(DEFAULT_AUDIENCE.to_string()),
            iat: now,
            exp: now + ttl_seconds,
            session_id: Some(Uuid::new_v4()),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Validate a token and return the claims
    pub fn validate(&self, token: &str) -> AuthResult<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Rejected access token: {}", e);
                AuthError::InvalidToken
            })
    }

    /// Validate a token and build the request context from it
    pub fn authenticate(&self, token: &str) -> AuthResult<AuthUser> {
        let claims = self.validate(token)?;
        Ok(AuthUser {
            id: claims.sub,
            email: claims.email,
            access_token: token.to_string(),
            expires_at: claims.exp,
        })
    }
}

/// Current time in seconds since the epoch
pub fn now_secs() -> AuthResult<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| AuthError::Internal(format!("Failed to get current time: {}", e)))
}

/// Seconds left before `expires_at`, at least one so deny-list entries are
/// never written without a TTL
pub fn remaining_secs(expires_at: u64) -> AuthResult<u64> {
    Ok(expires_at.saturating_sub(now_secs()?).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_validate() {
        let service = TokenService::new("test-secret", DEFAULT_AUDIENCE);
        let user_id = Uuid::new_v4();

        let token = service.issue(user_id, Some("a@b.io"), 60).unwrap();
        let user = service.authenticate(&token).unwrap();

        assert_eq!(user.id, user_id);
        assert_eq!(user.email.as_deref(), Some("a@b.io"));
        assert_eq!(user.access_token, token);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = TokenService::new("one", DEFAULT_AUDIENCE)
            .issue(Uuid::new_v4(), None, 60)
            .unwrap();
        let other = TokenService::new("two", DEFAULT_AUDIENCE);
        assert!(matches!(other.validate(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn wrong_audience_is_rejected() {
        let token = TokenService::new("secret", "anon")
            .issue(Uuid::new_v4(), None, 60)
            .unwrap();
        let service = TokenService::new("secret", DEFAULT_AUDIENCE);
        assert!(matches!(service.validate(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let service = TokenService::new("secret", DEFAULT_AUDIENCE);
        let now = now_secs().unwrap();
        let claims = Claims {
            sub: Uuid::new_v4(),
            aud: DEFAULT_AUDIENCE.to_string(),
            email: None,
            role: None,
            iat: now - 7200,
            exp: now - 3600,
            session_id: None,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        assert!(matches!(service.validate(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn garbage_is_rejected() {
        let service = TokenService::new("secret", DEFAULT_AUDIENCE);
        assert!(service.validate("not-a-jwt").is_err());
    }
}
