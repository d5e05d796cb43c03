//! In-process auth provider for local development and tests
//!
//! Accounts live in memory with argon2 password hashes; access tokens are
//! real HS256 JWTs signed with a per-process secret.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::{SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use common::models::{AccountInfo, SessionTokens};
use rand::{Rng, distributions::Alphanumeric};
use tracing::info;
use uuid::Uuid;

use super::{
    AuthError, AuthProvider, AuthResult, AuthSession, AuthUser, SignUpMetadata, SignUpOutcome,
    TokenService, jwt,
};

const ACCESS_TOKEN_TTL: u64 = 3600;

#[derive(Debug, Clone)]
struct Account {
    id: Uuid,
    email: String,
    password_hash: String,
}

#[derive(Default)]
struct Inner {
    /// Accounts keyed by lower-cased e-mail
    accounts: HashMap<String, Account>,
    refresh_tokens: HashMap<String, Uuid>,
    revoked: HashSet<String>,
}

/// Auth provider keeping everything in process memory
pub struct MemoryAuth {
    tokens: TokenService,
    inner: Mutex<Inner>,
}

impl Default for MemoryAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self {
            tokens: TokenService::new(&random_token(48), jwt::DEFAULT_AUDIENCE),
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> AuthResult<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| AuthError::Internal("auth state poisoned".to_string()))
    }

    fn open_session(&self, account: &Account) -> AuthResult<AuthSession> {
        let access_token = self
            .tokens
            .issue(account.id, Some(&account.email), ACCESS_TOKEN_TTL)?;
        let refresh_token = random_token(40);
        self.lock()?
            .refresh_tokens
            .insert(refresh_token.clone(), account.id);

        Ok(AuthSession {
            account: AccountInfo {
                id: account.id,
                email: Some(account.email.clone()),
            },
            tokens: SessionTokens {
                access_token,
                refresh_token,
                token_type: "bearer".to_string(),
                expires_in: ACCESS_TOKEN_TTL,
            },
        })
    }
}

/// Argon2id with small parameters; memory accounts are for development only
fn hasher() -> AuthResult<Argon2<'static>> {
    let params = Params::new(1024, 1, 1, None)
        .map_err(|e| AuthError::Internal(format!("Invalid argon2 parameters: {}", e)))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> AuthResult<SignUpOutcome> {
        let key = email.trim().to_lowercase();
        if key.is_empty() || !key.contains('@') {
            return Err(AuthError::Rejected("Unable to validate email address".to_string()));
        }
        if password.len() < 6 {
            return Err(AuthError::Rejected(
                "Password should be at least 6 characters".to_string(),
            ));
        }
        if self.lock()?.accounts.contains_key(&key) {
            return Err(AuthError::Rejected("User already registered".to_string()));
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = hasher()?
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Internal(format!("Failed to hash password: {}", e)))?
            .to_string();

        let account = Account {
            id: Uuid::new_v4(),
            email: key.clone(),
            password_hash,
        };
        {
            let mut inner = self.lock()?;
            if inner.accounts.contains_key(&key) {
                return Err(AuthError::Rejected("User already registered".to_string()));
            }
            inner.accounts.insert(key, account.clone());
        }
        info!("Created in-memory account {} for {}", account.id, metadata.username);

        let session = self.open_session(&account)?;
        Ok(SignUpOutcome {
            account: session.account,
            session: Some(session.tokens),
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        let account = self
            .lock()?
            .accounts
            .get(&email.trim().to_lowercase())
            .cloned()
            .ok_or(AuthError::InvalidCredentials)?;

        let parsed = PasswordHash::new(&account.password_hash)
            .map_err(|e| AuthError::Internal(format!("Failed to parse password hash: {}", e)))?;
        hasher()?
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| AuthError::InvalidCredentials)?;

        self.open_session(&account)
    }

    async fn refresh(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        let account = {
            let mut inner = self.lock()?;
            let user_id = inner
                .refresh_tokens
                .remove(refresh_token)
                .ok_or(AuthError::InvalidToken)?;
            inner
                .accounts
                .values()
                .find(|a| a.id == user_id)
                .cloned()
                .ok_or(AuthError::InvalidToken)?
        };
        self.open_session(&account)
    }

    async fn sign_out(&self, user: &AuthUser) -> AuthResult<()> {
        let mut inner = self.lock()?;
        inner.revoked.insert(user.access_token.clone());
        inner.refresh_tokens.retain(|_, id| *id != user.id);
        Ok(())
    }

    async fn verify(&self, access_token: &str) -> AuthResult<AuthUser> {
        let user = self.tokens.authenticate(access_token)?;
        let inner = self.lock()?;
        if inner.revoked.contains(access_token) || !inner.accounts.values().any(|a| a.id == user.id)
        {
            return Err(AuthError::InvalidToken);
        }
        Ok(user)
    }

    async fn delete_user(&self, user_id: Uuid) -> AuthResult<()> {
        let mut inner = self.lock()?;
        inner.accounts.retain(|_, account| account.id != user_id);
        inner.refresh_tokens.retain(|_, id| *id != user_id);
        Ok(())
    }
}
