//! Pin repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::models::{NewPin, Pin, Visibility};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{PinStore, StoreError, StoreResult};

const PIN_COLUMNS: &str = "id, name, description, latitude, longitude, location_query, \
     image_urls, audio_url, owner_id, visibility, social_circle_ids, created_at, updated_at";

#[derive(FromRow)]
struct PinRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    latitude: f64,
    longitude: f64,
    location_query: Option<String>,
    image_urls: Vec<String>,
    audio_url: Option<String>,
    owner_id: Uuid,
    visibility: String,
    social_circle_ids: Vec<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PinRow> for Pin {
    type Error = StoreError;

    fn try_from(row: PinRow) -> Result<Self, Self::Error> {
        let visibility = row
            .visibility
            .parse::<Visibility>()
            .map_err(|e| StoreError::InvalidRow(format!("pin {}: {}", row.id, e)))?;
        Ok(Pin {
            id: row.id,
            name: row.name,
            description: row.description,
            latitude: row.latitude,
            longitude: row.longitude,
            location_query: row.location_query,
            image_urls: row.image_urls,
            audio_url: row.audio_url,
            owner_id: row.owner_id,
            private_pin: visibility == Visibility::Private,
            visibility,
            social_circle_ids: row.social_circle_ids,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_pins(rows: Vec<PinRow>) -> StoreResult<Vec<Pin>> {
    rows.into_iter().map(Pin::try_from).collect()
}

/// Pin repository
#[derive(Clone)]
pub struct PinRepository {
    pool: PgPool,
}

impl PinRepository {
    /// Create a new pin repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PinStore for PinRepository {
    async fn create(&self, pin: NewPin) -> StoreResult<Pin> {
        let pin = Pin::from_new(pin);
        let row = sqlx::query_as::<_, PinRow>(&format!(
            r#"
            INSERT INTO pins (id, name, description, latitude, longitude, location_query,
                              image_urls, audio_url, owner_id, visibility, social_circle_ids,
                              created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {}
            "#,
            PIN_COLUMNS
        ))
        .bind(pin.id)
        .bind(&pin.name)
        .bind(&pin.description)
        .bind(pin.latitude)
        .bind(pin.longitude)
        .bind(&pin.location_query)
        .bind(&pin.image_urls)
        .bind(&pin.audio_url)
        .bind(pin.owner_id)
        .bind(pin.visibility.as_str())
        .bind(&pin.social_circle_ids)
        .bind(pin.created_at)
        .bind(pin.updated_at)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Pin>> {
        let row = sqlx::query_as::<_, PinRow>(&format!(
            "SELECT {} FROM pins WHERE id = $1",
            PIN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Pin::try_from).transpose()
    }

    async fn list_public(&self) -> StoreResult<Vec<Pin>> {
        let rows = sqlx::query_as::<_, PinRow>(&format!(
            "SELECT {} FROM pins WHERE visibility = 'public' ORDER BY created_at DESC",
            PIN_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        into_pins(rows)
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Pin>> {
        let rows = sqlx::query_as::<_, PinRow>(&format!(
            "SELECT {} FROM pins WHERE owner_id = $1 ORDER BY created_at DESC",
            PIN_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        into_pins(rows)
    }

    async fn list_public_excluding(&self, owner_id: Uuid) -> StoreResult<Vec<Pin>> {
        let rows = sqlx::query_as::<_, PinRow>(&format!(
            r#"
            SELECT {} FROM pins
            WHERE visibility = 'public' AND owner_id <> $1
            ORDER BY created_at DESC
            "#,
            PIN_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        into_pins(rows)
    }

    async fn list_social_excluding(
        &self,
        owner_id: Uuid,
        circle_ids: &[Uuid],
    ) -> StoreResult<Vec<Pin>> {
        if circle_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, PinRow>(&format!(
            r#"
            SELECT {} FROM pins
            WHERE visibility = 'social' AND owner_id <> $1 AND social_circle_ids && $2
            ORDER BY created_at DESC
            "#,
            PIN_COLUMNS
        ))
        .bind(owner_id)
        .bind(circle_ids)
        .fetch_all(&self.pool)
        .await?;

        into_pins(rows)
    }

    async fn update(&self, pin: &Pin) -> StoreResult<Option<Pin>> {
        let row = sqlx::query_as::<_, PinRow>(&format!(
            r#"
            UPDATE pins
            SET name = $2, description = $3, latitude = $4, longitude = $5,
                location_query = $6, image_urls = $7, audio_url = $8, visibility = $9,
                social_circle_ids = $10, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PIN_COLUMNS
        ))
        .bind(pin.id)
        .bind(&pin.name)
        .bind(&pin.description)
        .bind(pin.latitude)
        .bind(pin.longitude)
        .bind(&pin.location_query)
        .bind(&pin.image_urls)
        .bind(&pin.audio_url)
        .bind(pin.visibility.as_str())
        .bind(&pin.social_circle_ids)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Pin::try_from).transpose()
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM pins WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
