//! Client for the hosted auth provider's REST API (GoTrue dialect)
//!
//! Sign-up, sign-in, refresh, sign-out and account deletion are forwarded to
//! the provider. Access tokens are validated locally with the project's JWT
//! secret, then checked against the Redis deny-list when one is configured.

use async_trait::async_trait;
use common::models::{AccountInfo, SessionTokens};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    AuthError, AuthProvider, AuthResult, AuthSession, AuthUser, SignUpMetadata, SignUpOutcome,
    TokenService, jwt,
};
use crate::{cache::RedisPool, settings::HostedConfig};

#[derive(Debug, Deserialize)]
struct ProviderUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderSession {
    access_token: String,
    refresh_token: String,
    #[serde(default = "bearer")]
    token_type: String,
    expires_in: u64,
    user: ProviderUser,
}

/// Sign-up answers with a session when accounts are auto-confirmed and with
/// the bare user otherwise
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpBody {
    Session(ProviderSession),
    User(ProviderUser),
}

#[derive(Debug, Default, Deserialize)]
struct ProviderErrorBody {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl ProviderErrorBody {
    fn into_message(self) -> Option<String> {
        self.msg
            .or(self.message)
            .or(self.error_description)
            .or(self.error)
    }
}

fn bearer() -> String {
    "bearer".to_string()
}

impl From<ProviderSession> for AuthSession {
    fn from(session: ProviderSession) -> Self {
        AuthSession {
            account: AccountInfo {
                id: session.user.id,
                email: session.user.email,
            },
            tokens: SessionTokens {
                access_token: session.access_token,
                refresh_token: session.refresh_token,
                token_type: session.token_type,
                expires_in: session.expires_in,
            },
        }
    }
}

/// Auth provider backed by the hosted service
#[derive(Clone)]
pub struct HostedAuth {
    http: Client,
    auth_url: String,
    anon_key: String,
    service_role_key: String,
    tokens: TokenService,
    denylist: Option<RedisPool>,
}

impl HostedAuth {
    pub fn new(config: &HostedConfig, denylist: Option<RedisPool>) -> Self {
        if denylist.is_none() {
            warn!("No Redis configured: signed-out tokens stay valid until they expire");
        }
        Self {
            http: Client::new(),
            auth_url: format!("{}/auth/v1", config.url.trim_end_matches('/')),
            anon_key: config.anon_key.clone(),
            service_role_key: config.service_role_key.clone(),
            tokens: TokenService::new(&config.jwt_secret, &config.jwt_audience),
            denylist,
        }
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http
            .post(format!("{}{}", self.auth_url, path))
            .header("apikey", &self.anon_key)
    }

    async fn password_grant(&self, body: serde_json::Value, grant: &str) -> AuthResult<AuthSession> {
        let response = self
            .post(&format!("/token?grant_type={}", grant))
            .json(&body)
            .send()
            .await?;
        let session: ProviderSession = checked(response).await?.json().await?;
        Ok(session.into())
    }
}

/// Turn a non-success answer into an [`AuthError`]
async fn checked(response: Response) -> AuthResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body: ProviderErrorBody = response.json().await.unwrap_or_default();
    let message = body
        .into_message()
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());

    Err(match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY | StatusCode::TOO_MANY_REQUESTS => {
            AuthError::Rejected(message)
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AuthError::InvalidToken,
        _ => AuthError::Upstream(format!("{}: {}", status, message)),
    })
}

#[async_trait]
impl AuthProvider for HostedAuth {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> AuthResult<SignUpOutcome> {
        info!("Signing up {}", email);

        let response = self
            .post("/signup")
            .json(&json!({
                "email": email,
                "password": password,
                "data": {
                    "username": metadata.username,
                    "full_name": metadata.full_name,
                },
            }))
            .send()
            .await?;

        let outcome = match checked(response).await?.json::<SignUpBody>().await? {
            SignUpBody::Session(session) => {
                let session = AuthSession::from(session);
                SignUpOutcome {
                    account: session.account,
                    session: Some(session.tokens),
                }
            }
            SignUpBody::User(user) => SignUpOutcome {
                account: AccountInfo {
                    id: user.id,
                    email: user.email,
                },
                session: None,
            },
        };
        Ok(outcome)
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        self.password_grant(json!({ "email": email, "password": password }), "password")
            .await
            .map_err(|e| match e {
                AuthError::Rejected(_) | AuthError::InvalidToken => AuthError::InvalidCredentials,
                other => other,
            })
    }

    async fn refresh(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        self.password_grant(json!({ "refresh_token": refresh_token }), "refresh_token")
            .await
            .map_err(|e| match e {
                AuthError::Rejected(_) => AuthError::InvalidToken,
                other => other,
            })
    }

    async fn sign_out(&self, user: &AuthUser) -> AuthResult<()> {
        let response = self
            .post("/logout")
            .bearer_auth(&user.access_token)
            .send()
            .await?;
        checked(response).await?;

        if let Some(denylist) = &self.denylist {
            let ttl = jwt::remaining_secs(user.expires_at)?;
            denylist.revoke(&user.access_token, ttl).await?;
        }
        info!("Signed out user {}", user.id);
        Ok(())
    }

    async fn verify(&self, access_token: &str) -> AuthResult<AuthUser> {
        let user = self.tokens.authenticate(access_token)?;

        if let Some(denylist) = &self.denylist {
            if denylist.is_revoked(access_token).await? {
                return Err(AuthError::InvalidToken);
            }
        }
        Ok(user)
    }

    async fn delete_user(&self, user_id: Uuid) -> AuthResult<()> {
        let response = self
            .http
            .delete(format!("{}/admin/users/{}", self.auth_url, user_id))
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
            .send()
            .await?;
        checked(response).await?;

        info!("Deleted auth user {}", user_id);
        Ok(())
    }
}
