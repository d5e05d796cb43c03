//! Circle and membership repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::models::{Circle, Member, Visibility};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{CircleStore, StoreError, StoreResult};

const CIRCLE_COLUMNS: &str =
    "c.id, c.name, c.owner_id, c.visibility, c.access_code, c.created_at, c.updated_at";

#[derive(FromRow)]
struct CircleRow {
    id: Uuid,
    name: String,
    owner_id: Uuid,
    visibility: String,
    access_code: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CircleRow> for Circle {
    type Error = StoreError;

    fn try_from(row: CircleRow) -> Result<Self, Self::Error> {
        let visibility = row
            .visibility
            .parse::<Visibility>()
            .map_err(|e| StoreError::InvalidRow(format!("circle {}: {}", row.id, e)))?;
        Ok(Circle {
            id: row.id,
            name: row.name,
            owner_id: row.owner_id,
            visibility,
            access_code: Some(row.access_code),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct MemberRow {
    user_id: Uuid,
    circle_id: Uuid,
    joined_at: DateTime<Utc>,
}

impl From<MemberRow> for Member {
    fn from(row: MemberRow) -> Self {
        Member {
            user_id: row.user_id,
            circle_id: row.circle_id,
            joined_at: row.joined_at,
        }
    }
}

fn into_circles(rows: Vec<CircleRow>) -> StoreResult<Vec<Circle>> {
    rows.into_iter().map(Circle::try_from).collect()
}

/// Circle repository
#[derive(Clone)]
pub struct CircleRepository {
    pool: PgPool,
}

impl CircleRepository {
    /// Create a new circle repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CircleStore for CircleRepository {
    async fn create(&self, circle: &Circle) -> StoreResult<Circle> {
        let access_code = circle
            .access_code
            .as_deref()
            .ok_or_else(|| StoreError::InvalidRow("circle without access code".to_string()))?;

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, CircleRow>(
            r#"
            INSERT INTO circles (id, name, owner_id, visibility, access_code, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, name, owner_id, visibility, access_code, created_at, updated_at
            "#,
        )
        .bind(circle.id)
        .bind(&circle.name)
        .bind(circle.owner_id)
        .bind(circle.visibility.as_str())
        .bind(access_code)
        .bind(circle.created_at)
        .bind(circle.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| StoreError::from_query(e, "Access code already in use"))?;

        sqlx::query("INSERT INTO members (user_id, circle_id) VALUES ($1, $2)")
            .bind(circle.owner_id)
            .bind(circle.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Circle>> {
        let row = sqlx::query_as::<_, CircleRow>(&format!(
            "SELECT {} FROM circles c WHERE c.id = $1",
            CIRCLE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Circle::try_from).transpose()
    }

    async fn find_by_access_code(&self, code: &str) -> StoreResult<Option<Circle>> {
        let row = sqlx::query_as::<_, CircleRow>(&format!(
            "SELECT {} FROM circles c WHERE c.access_code = $1",
            CIRCLE_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Circle::try_from).transpose()
    }

    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Circle>> {
        let rows = sqlx::query_as::<_, CircleRow>(&format!(
            r#"
            SELECT {} FROM circles c
            WHERE c.owner_id = $1
               OR EXISTS (SELECT 1 FROM members m WHERE m.circle_id = c.id AND m.user_id = $1)
            ORDER BY c.created_at DESC
            "#,
            CIRCLE_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        into_circles(rows)
    }

    async fn list_public(&self) -> StoreResult<Vec<Circle>> {
        let rows = sqlx::query_as::<_, CircleRow>(&format!(
            "SELECT {} FROM circles c WHERE c.visibility = 'public' ORDER BY c.created_at DESC",
            CIRCLE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        into_circles(rows)
    }

    async fn circle_ids_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT circle_id FROM members WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(ids)
    }

    async fn update(&self, circle: &Circle) -> StoreResult<Option<Circle>> {
        let row = sqlx::query_as::<_, CircleRow>(
            r#"
            UPDATE circles
            SET name = $2, visibility = $3, access_code = COALESCE($4, access_code), updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, owner_id, visibility, access_code, created_at, updated_at
            "#,
        )
        .bind(circle.id)
        .bind(&circle.name)
        .bind(circle.visibility.as_str())
        .bind(circle.access_code.as_deref())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::from_query(e, "Access code already in use"))?;

        row.map(Circle::try_from).transpose()
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM circles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_members(&self, circle_id: Uuid) -> StoreResult<Vec<Member>> {
        let rows = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT user_id, circle_id, joined_at
            FROM members
            WHERE circle_id = $1
            ORDER BY joined_at ASC
            "#,
        )
        .bind(circle_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Member::from).collect())
    }

    async fn is_member(&self, circle_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM members WHERE circle_id = $1 AND user_id = $2)",
        )
        .bind(circle_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn add_member(&self, circle_id: Uuid, user_id: Uuid) -> StoreResult<Option<Member>> {
        // The primary key decides: a concurrent join of the same user inserts nothing.
        let row = sqlx::query_as::<_, MemberRow>(
            r#"
            INSERT INTO members (user_id, circle_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, circle_id) DO NOTHING
            RETURNING user_id, circle_id, joined_at
            "#,
        )
        .bind(user_id)
        .bind(circle_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Member::from))
    }

    async fn remove_member(&self, circle_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM members WHERE circle_id = $1 AND user_id = $2")
            .bind(circle_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
