//! Redis-backed token deny-list
//!
//! Signed-out access tokens stay cryptographically valid until they expire,
//! so the gateway remembers them here for their remaining lifetime.

use redis::{AsyncCommands, Client};
use serde::Deserialize;
use tracing::info;

use crate::auth::{AuthError, AuthResult};

const REVOKED_PREFIX: &str = "revoked_token:";

/// Configuration for Redis connection
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
}

/// Redis connection handle; cheap to clone
#[derive(Clone)]
pub struct RedisPool {
    client: Client,
}

impl RedisPool {
    pub fn new(config: &RedisConfig) -> anyhow::Result<Self> {
        let client = Client::open(config.url.as_str())?;
        info!("Redis client initialized with URL: {}", config.url);
        Ok(RedisPool { client })
    }

    async fn connection(&self) -> AuthResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AuthError::Internal(format!("Redis connection failed: {}", e)))
    }

    /// Deny `token` for the next `ttl_seconds`
    pub async fn revoke(&self, token: &str, ttl_seconds: u64) -> AuthResult<()> {
        let mut conn = self.connection().await?;
        let _: () = conn
            .set_ex(revoked_key(token), 1i32, ttl_seconds)
            .await
            .map_err(|e| AuthError::Internal(format!("Failed to revoke token: {}", e)))?;
        Ok(())
    }

    /// Whether `token` was revoked and has not expired yet
    pub async fn is_revoked(&self, token: &str) -> AuthResult<bool> {
        let mut conn = self.connection().await?;
        conn.exists(revoked_key(token))
            .await
            .map_err(|e| AuthError::Internal(format!("Failed to check token: {}", e)))
    }

    /// Check if Redis is reachable
    pub async fn health_check(&self) -> anyhow::Result<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }
}

fn revoked_key(token: &str) -> String {
    format!("{}{}", REVOKED_PREFIX, token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced() {
        assert_eq!(revoked_key("abc"), "revoked_token:abc");
    }

    #[test]
    fn invalid_url_is_rejected() {
        let config = RedisConfig {
            url: "not a url".to_string(),
        };
        assert!(RedisPool::new(&config).is_err());
    }
}
