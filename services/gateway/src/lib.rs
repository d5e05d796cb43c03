//! Pindrop gateway
//!
//! HTTP gateway for pins, circles and profiles. Accounts, rows and files are
//! delegated to a hosted backend (auth provider, PostgreSQL, S3-compatible
//! storage) or, with the `memory` backend, kept in process.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

pub mod auth;
pub mod cache;
pub mod database;
pub mod error;
pub mod extract;
pub mod feed;
pub mod middleware;
pub mod rate_limiter;
pub mod repositories;
pub mod routes;
pub mod settings;
pub mod state;
pub mod storage;
pub mod upload;

pub use routes::create_router;
pub use state::AppState;

use crate::{
    auth::{HostedAuth, MemoryAuth},
    cache::RedisPool,
    rate_limiter::{AttemptLimiter, RateLimiterConfig},
    repositories::{CircleRepository, MemoryStore, PinRepository, ProfileRepository},
    settings::{BackendKind, Settings},
    storage::{Buckets, MemoryStorage, S3Storage},
    upload::UploadLimits,
};

/// In-process collaborators, kept around so callers can inspect them
#[derive(Clone)]
pub struct MemoryBackend {
    pub auth: Arc<MemoryAuth>,
    pub store: Arc<MemoryStore>,
    pub storage: Arc<MemoryStorage>,
}

impl MemoryBackend {
    pub fn new(public_url: impl Into<String>) -> Self {
        Self {
            auth: Arc::new(MemoryAuth::new()),
            store: Arc::new(MemoryStore::new()),
            storage: Arc::new(MemoryStorage::new(public_url)),
        }
    }

    /// State with default limits and bucket names
    pub fn state(&self) -> AppState {
        self.state_with(
            Buckets::default(),
            UploadLimits::default(),
            RateLimiterConfig::default(),
        )
    }

    pub fn state_with(
        &self,
        buckets: Buckets,
        uploads: UploadLimits,
        sign_in_limit: RateLimiterConfig,
    ) -> AppState {
        AppState {
            auth: self.auth.clone(),
            profiles: self.store.clone(),
            circles: self.store.clone(),
            pins: self.store.clone(),
            storage: self.storage.clone(),
            buckets,
            uploads,
            sign_in_limiter: AttemptLimiter::new(sign_in_limit),
        }
    }
}

/// Build the application state for the configured backend
pub async fn build_state(settings: &Settings) -> anyhow::Result<AppState> {
    if settings.backend == BackendKind::Memory {
        info!("Using the in-memory backend");
        return Ok(MemoryBackend::new(settings.storage.public_url.clone()).state_with(
            Buckets::from(&settings.storage),
            settings.uploads.clone(),
            settings.sign_in_limit.clone(),
        ));
    }

    let pool = database::init_pool(&settings.database)
        .await
        .context("Failed to connect to the database")?;
    if database::health_check(&pool).await? {
        info!("Database connection successful");
    }

    let denylist = settings
        .redis
        .as_ref()
        .map(RedisPool::new)
        .transpose()
        .context("Failed to initialize Redis")?;
    if let Some(redis) = &denylist {
        if redis.health_check().await.context("Redis is unreachable")? {
            info!("Redis connection successful");
        }
    }

    Ok(AppState {
        auth: Arc::new(HostedAuth::new(&settings.hosted, denylist)),
        profiles: Arc::new(ProfileRepository::new(pool.clone())),
        circles: Arc::new(CircleRepository::new(pool.clone())),
        pins: Arc::new(PinRepository::new(pool)),
        storage: Arc::new(S3Storage::new(&settings.storage).await),
        buckets: Buckets::from(&settings.storage),
        uploads: settings.uploads.clone(),
        sign_in_limiter: AttemptLimiter::new(settings.sign_in_limit.clone()),
    })
}
