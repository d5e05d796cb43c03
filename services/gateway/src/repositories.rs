//! Repositories for the relational store
//!
//! Each table sits behind a trait so the gateway can run against PostgreSQL
//! or against the in-memory store.

use async_trait::async_trait;
use common::models::{Circle, Member, NewPin, Pin, Profile};
use sqlx::Error as SqlxError;
use thiserror::Error;
use uuid::Uuid;

pub mod circles;
pub mod memory;
pub mod pins;
pub mod profiles;

pub use circles::CircleRepository;
pub use memory::MemoryStore;
pub use pins::PinRepository;
pub use profiles::ProfileRepository;

/// Custom error type for store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),

    /// A unique constraint was hit
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A row could not be mapped to the domain model
    #[error("Invalid row: {0}")]
    InvalidRow(String),
}

impl StoreError {
    /// Map a query error, turning unique violations into [`StoreError::Conflict`]
    pub(crate) fn from_query(err: SqlxError, conflict: &str) -> Self {
        match &err {
            SqlxError::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(conflict.to_string())
            }
            _ => StoreError::Query(err),
        }
    }
}

impl From<SqlxError> for StoreError {
    fn from(err: SqlxError) -> Self {
        StoreError::Query(err)
    }
}

/// Type alias for Result with StoreError
pub type StoreResult<T> = Result<T, StoreError>;

/// `profiles` table
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Insert a profile; a taken username is a conflict
    async fn create(&self, profile: &Profile) -> StoreResult<Profile>;
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Profile>>;
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Profile>>;
    /// Write username, full name and avatar URL
    async fn update(&self, profile: &Profile) -> StoreResult<Option<Profile>>;
    /// Delete a profile together with everything it owns
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
}

/// `circles` and `members` tables
#[async_trait]
pub trait CircleStore: Send + Sync {
    /// Insert a circle and make its owner the first member
    async fn create(&self, circle: &Circle) -> StoreResult<Circle>;
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Circle>>;
    async fn find_by_access_code(&self, code: &str) -> StoreResult<Option<Circle>>;
    /// Circles the user owns or belongs to
    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Circle>>;
    async fn list_public(&self) -> StoreResult<Vec<Circle>>;
    /// Ids of the circles the user belongs to
    async fn circle_ids_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>>;
    /// Write name, visibility and access code
    async fn update(&self, circle: &Circle) -> StoreResult<Option<Circle>>;
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
    async fn list_members(&self, circle_id: Uuid) -> StoreResult<Vec<Member>>;
    async fn is_member(&self, circle_id: Uuid, user_id: Uuid) -> StoreResult<bool>;
    /// Add a member; `None` when the user already belongs to the circle
    async fn add_member(&self, circle_id: Uuid, user_id: Uuid) -> StoreResult<Option<Member>>;
    async fn remove_member(&self, circle_id: Uuid, user_id: Uuid) -> StoreResult<bool>;
}

/// `pins` table
#[async_trait]
pub trait PinStore: Send + Sync {
    async fn create(&self, pin: NewPin) -> StoreResult<Pin>;
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Pin>>;
    /// All public pins
    async fn list_public(&self) -> StoreResult<Vec<Pin>>;
    /// Every pin of the owner, whatever its visibility
    async fn list_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Pin>>;
    /// Public pins not owned by `owner_id`
    async fn list_public_excluding(&self, owner_id: Uuid) -> StoreResult<Vec<Pin>>;
    /// Social pins not owned by `owner_id` shared with any of `circle_ids`
    async fn list_social_excluding(
        &self,
        owner_id: Uuid,
        circle_ids: &[Uuid],
    ) -> StoreResult<Vec<Pin>>;
    /// Write every mutable column of the pin
    async fn update(&self, pin: &Pin) -> StoreResult<Option<Pin>>;
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
}
