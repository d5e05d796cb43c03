//! Application state shared across handlers

use std::sync::Arc;

use crate::{
    auth::AuthProvider,
    rate_limiter::AttemptLimiter,
    repositories::{CircleStore, PinStore, ProfileStore},
    storage::{Buckets, ObjectStorage},
    upload::UploadLimits,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<dyn AuthProvider>,
    pub profiles: Arc<dyn ProfileStore>,
    pub circles: Arc<dyn CircleStore>,
    pub pins: Arc<dyn PinStore>,
    pub storage: Arc<dyn ObjectStorage>,
    pub buckets: Buckets,
    pub uploads: UploadLimits,
    pub sign_in_limiter: AttemptLimiter,
}
