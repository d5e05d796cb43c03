//! Profile repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::models::Profile;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{ProfileStore, StoreError, StoreResult};

#[derive(FromRow)]
struct ProfileRow {
    id: Uuid,
    username: String,
    full_name: Option<String>,
    avatar_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Profile {
            id: row.id,
            username: row.username,
            full_name: row.full_name,
            avatar_url: row.avatar_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Profile repository
#[derive(Clone)]
pub struct ProfileRepository {
    pool: PgPool,
}

impl ProfileRepository {
    /// Create a new profile repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for ProfileRepository {
    async fn create(&self, profile: &Profile) -> StoreResult<Profile> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            INSERT INTO profiles (id, username, full_name, avatar_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, username, full_name, avatar_url, created_at, updated_at
            "#,
        )
        .bind(profile.id)
        .bind(&profile.username)
        .bind(&profile.full_name)
        .bind(&profile.avatar_url)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::from_query(e, "Username is already taken"))?;

        Ok(row.into())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Profile>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT id, username, full_name, avatar_url, created_at, updated_at
            FROM profiles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Profile::from))
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Profile>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT id, username, full_name, avatar_url, created_at, updated_at
            FROM profiles
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Profile::from))
    }

    async fn update(&self, profile: &Profile) -> StoreResult<Option<Profile>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            UPDATE profiles
            SET username = $2, full_name = $3, avatar_url = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING id, username, full_name, avatar_url, created_at, updated_at
            "#,
        )
        .bind(profile.id)
        .bind(&profile.username)
        .bind(&profile.full_name)
        .bind(&profile.avatar_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::from_query(e, "Username is already taken"))?;

        Ok(row.map(Profile::from))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
